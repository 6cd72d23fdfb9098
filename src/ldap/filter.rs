//! LDAP filter construction (RFC 4515).

/// `LDAP_MATCHING_RULE_IN_CHAIN`, walks nested group memberships on Active
/// Directory.
pub const IN_CHAIN: &str = "1.2.840.113556.1.4.1941";

/// Escape a value placed inside a filter assertion.
pub fn escape_ldap(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '*' => out.push_str(r"\2a"),
            '(' => out.push_str(r"\28"),
            ')' => out.push_str(r"\29"),
            '\\' => out.push_str(r"\5c"),
            '\0' => out.push_str(r"\00"),
            c => out.push(c),
        }
    }
    out
}

/// `(attr=value)` with `value` escaped.
pub fn eq(attr: &str, value: &str) -> String {
    format!("({attr}={})", escape_ldap(value))
}

/// `(attr:1.2.840.113556.1.4.1941:=value)` with `value` escaped.
pub fn in_chain(attr: &str, value: &str) -> String {
    format!("({attr}:{IN_CHAIN}:={})", escape_ldap(value))
}

/// Membership assertion on `attr` (`member` or `memberOf`), recursive when
/// `nested` is set.
pub fn membership(attr: &str, dn: &str, nested: bool) -> String {
    if nested {
        in_chain(attr, dn)
    } else {
        eq(attr, dn)
    }
}

/// Wrap a raw filter in parentheses when it is missing them.
pub fn parenthesize(filter: &str) -> String {
    let filter = filter.trim();
    if filter.starts_with('(') && filter.ends_with(')') {
        filter.to_owned()
    } else {
        format!("({filter})")
    }
}

/// `(&..)` of every non-empty part. A single part is returned as is.
pub fn and<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let parts = parts
        .into_iter()
        .filter(|p| !p.as_ref().trim().is_empty())
        .map(|p| parenthesize(p.as_ref()))
        .collect::<Vec<_>>();

    match parts.len() {
        0 => "(objectClass=*)".to_owned(),
        1 => parts[0].clone(),
        _ => format!("(&{})", parts.concat()),
    }
}
