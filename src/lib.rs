//! redap exposes LDAP and Active Directory account management over HTTP.

#![forbid(unsafe_code)]
pub mod config;
pub mod error;
pub mod group;
pub mod ldap;
mod router;
pub mod schema;
mod service;
pub mod telemetry;
pub mod user;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, StatusCode, header};
use axum::routing::get;
use axum::{Router, middleware as AxumMiddleware};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer,
};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

pub use error::ServerError;

use crate::group::GroupService;
use crate::user::UserService;

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    app: Router,
    method: Method,
    path: &str,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    app.oneshot(
        Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub users: UserService,
    pub groups: GroupService,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Build services on top of `directory`.
    pub fn new(
        config: config::Configuration,
        directory: Arc<dyn ldap::Directory>,
        metrics: Option<PrometheusHandle>,
    ) -> Result<Self, ServerError> {
        let missing = |entry: &str| ServerError::Config(format!("missing `{entry}` entry"));

        let ldap = config.ldap.as_ref().ok_or_else(|| missing("ldap"))?;
        let users = config.users.clone().ok_or_else(|| missing("users"))?;
        let groups = config.groups.clone().ok_or_else(|| missing("groups"))?;

        Ok(Self {
            users: UserService::new(
                Arc::clone(&directory),
                ldap.directory,
                &ldap.base_dn,
                users.clone(),
                groups.clone(),
            ),
            groups: GroupService::new(
                directory,
                ldap.directory,
                &ldap.base_dn,
                groups,
                users,
            ),
            config: Arc::new(config),
            metrics,
        })
    }
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Tag every request with an `x-request-id`.
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        // Set a timeout.
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(30)))
        // Remove senstive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
                .allow_headers(Any),
        );

    Router::new()
        // `GET /status.json` goes to `status`.
        .route("/status.json", get(router::status::status))
        .route("/metrics", get(telemetry::metrics))
        .nest("/users", router::users::router())
        .nest("/groups", router::groups::router())
        .with_state(state)
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .layer(middleware)
}

/// Read configuration, connect to the directory and build the application state.
pub async fn initialize_state(
    config: config::Configuration,
) -> Result<AppState, Box<dyn std::error::Error>> {
    let metrics = if config.telemetry.metrics {
        Some(telemetry::setup_metrics_recorder()?)
    } else {
        None
    };

    let Some(cfg) = &config.ldap else {
        return Err(ServerError::Config("missing `ldap` entry".into()).into());
    };

    let directory = ldap::Ldap::connect(
        cfg.connection()?,
        cfg.user.as_deref(),
        cfg.password.as_deref(),
    )
    .await?;

    Ok(AppState::new(config, Arc::new(directory), metrics)?)
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;
    use crate::ldap::DirectoryKind;
    use crate::ldap::memory::MemoryDirectory;

    #[tokio::test]
    async fn test_status() {
        let app = app(router::state(&MemoryDirectory::new(), DirectoryKind::ActiveDirectory));

        let response =
            make_request(app, Method::GET, "/status.json", String::default()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: router::status::Status = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.name, "redap");
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(body.directory.as_deref(), Some("active_directory"));
    }

    #[tokio::test]
    async fn test_metrics_disabled() {
        let app = app(router::state(&MemoryDirectory::new(), DirectoryKind::Ldap));

        let response =
            make_request(app, Method::GET, "/metrics", String::default()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_metrics_enabled() {
        use metrics_exporter_prometheus::PrometheusBuilder;

        let recorder = PrometheusBuilder::new().build_recorder();
        metrics::with_local_recorder(&recorder, || {
            metrics::counter!("http_requests_total", "path" => "/status.json").increment(3);
        });

        let mut state = router::state(&MemoryDirectory::new(), DirectoryKind::Ldap);
        state.metrics = Some(recorder.handle());
        let app = app(state);

        let response =
            make_request(app, Method::GET, "/metrics", String::default()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("http_requests_total{path=\"/status.json\"} 3"));
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let app = app(router::state(&MemoryDirectory::new(), DirectoryKind::Ldap));

        let response =
            make_request(app, Method::GET, "/status.json", String::default()).await;
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[test]
    fn test_state_requires_schemas() {
        let mut config =
            config::Configuration::from_yaml(config::tests::CONFIG).unwrap();
        config.groups = None;

        let err = AppState::new(config, Arc::new(MemoryDirectory::new()), None);
        assert!(matches!(err, Err(ServerError::Config(_))));
    }
}
