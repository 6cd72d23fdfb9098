//! Error handler for redap.
//!
//! Two shapes reach clients: the generic [`ResponseError`] for application
//! errors, and [`LdapResponseError`] (generic shape plus LDAP diagnostics)
//! whenever the directory server refused an operation.

use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use ldap3::LdapError;
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::ldap::result_description;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Json(#[from] JsonRejection),

    /// Application error, answered with the generic shape.
    #[error("{message}")]
    Application { message: String, status: StatusCode },

    /// Any error coming from the directory server or the LDAP client.
    #[error("LDAP operation failed: {0}")]
    Ldap(#[from] LdapError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("internal server error, {details}")]
    Internal {
        details: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ServerError {
    /// Application error with the default `400 Bad Request` status.
    pub fn application(message: impl Into<String>) -> Self {
        ServerError::Application {
            message: message.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }

    /// Override the status of an application error.
    pub fn with_status(self, code: StatusCode) -> Self {
        match self {
            ServerError::Application { message, .. } => ServerError::Application {
                message,
                status: code,
            },
            other => other,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::application(message).with_status(StatusCode::UNAUTHORIZED)
    }

    pub fn not_found(kind: &str, id: &str) -> Self {
        Self::application(format!("{kind} `{id}` not found"))
            .with_status(StatusCode::NOT_FOUND)
    }

    pub fn internal<E>(details: impl Into<String>, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ServerError::Internal {
            details: details.into(),
            source: Box::new(err),
        }
    }

    /// LDAP result code carried by the error, if the server answered one.
    pub fn result_code(&self) -> Option<u32> {
        match self {
            ServerError::Ldap(LdapError::LdapResult { result }) => Some(result.rc),
            _ => None,
        }
    }
}

/// Structure for detailed error responses.
#[derive(Debug, Serialize)]
pub struct ResponseError {
    r#type: Option<String>,
    title: String,
    status: u16,
    detail: String,
    instance: Option<String>,
    errors: Option<Vec<FieldError>>,
}

impl ResponseError {
    /// Update error status code.
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code.as_u16();
        self
    }

    /// Update `title` field.
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.into();
        self
    }

    /// Add detailed error.
    pub fn details(mut self, description: &str) -> Self {
        self.detail = description.into();
        self
    }

    /// Automatically add errors field.
    pub fn errors(mut self, errors: &ValidationErrors) -> Self {
        self.errors = Some(parse_validation_errors(errors));
        self
    }
}

impl Default for ResponseError {
    fn default() -> Self {
        Self {
            r#type: None,
            title: "Internal server error.".to_owned(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            detail: String::default(),
            instance: None,
            errors: None,
        }
    }
}

/// Generic shape enriched with the directory server answer.
#[derive(Debug, Serialize)]
pub struct LdapResponseError {
    #[serde(flatten)]
    error: ResponseError,
    result_code: Option<u32>,
    description: Option<&'static str>,
    matched_dn: Option<String>,
}

impl LdapResponseError {
    fn new(err: &LdapError) -> Self {
        let error = ResponseError::default()
            .title("LDAP operation failed.")
            .details(&err.to_string());

        match err {
            LdapError::LdapResult { result } => Self {
                error: error.details(&result.text),
                result_code: Some(result.rc),
                description: Some(result_description(result.rc)),
                matched_dn: (!result.matched.is_empty())
                    .then(|| result.matched.clone()),
            },
            _ => Self {
                error,
                result_code: None,
                description: None,
                matched_dn: None,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct FieldError {
    field: String,
    message: String,
}

fn parse_validation_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, issues)| {
            issues.iter().map(move |issue| FieldError {
                field: field.to_string(),
                message: issue
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| issue.code.to_string()),
            })
        })
        .collect()
}

fn json_response<T: Serialize>(status: u16, body: &T) -> Response {
    match serde_json::to_string(body) {
        Ok(body) => Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap_or_else(|_| internal_server_error()),
        Err(_) => internal_server_error(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let response = ResponseError::default()
            .title("There were validation errors with your request.")
            .details(&self.to_string())
            .status(StatusCode::BAD_REQUEST);

        let response = match &self {
            ServerError::Validation(validation_errors) => {
                response.errors(validation_errors)
            },

            ServerError::Json(rejection) => response
                .title("Invalid request body.")
                .details(&rejection.body_text()),

            ServerError::Application { message, status } => response
                .title(status.canonical_reason().unwrap_or("Error."))
                .details(message)
                .status(*status),

            ServerError::Ldap(err) => {
                tracing::warn!(error = %err, "ldap operation failed");
                let body = LdapResponseError::new(err);
                return json_response(body.error.status, &body);
            },

            ServerError::Config(_) | ServerError::Internal { .. } => {
                tracing::error!(error = %self, "server returned 500 status");

                ResponseError::default()
            },
        };

        json_response(response.status, &response)
    }
}

fn internal_server_error() -> Response {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(
            serde_json::json!({
                "type": null,
                "title": "Internal server error.",
                "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                "detail": null,
                "instance": null,
                "errors": null,
            })
            .to_string()
            .into(),
        )
        .unwrap_or_else(|_| Response::new("Internal server error".into()))
}
