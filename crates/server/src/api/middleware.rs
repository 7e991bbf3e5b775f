//! Authentication and metrics middleware for API routes.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use loket_core::{Actor, AuthError, AuthRequest, Identity};

use super::error::ApiError;
use crate::metrics::{
    normalize_path, AUTH_FAILURES_TOTAL, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL,
    HTTP_REQUEST_DURATION,
};
use crate::state::{run_blocking, AppState};

/// Metrics middleware that tracks HTTP request duration and counts.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    HTTP_REQUESTS_IN_FLIGHT.inc();

    let response = next.run(request).await;

    HTTP_REQUESTS_IN_FLIGHT.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}

/// Authentication middleware that validates requests using the configured authenticator.
///
/// On success the [`Identity`] is stored in the request extensions and the
/// caller's profile is cached for ticket enrichment. Failures return 401.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let headers: HashMap<String, String> = request
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect();

    // Get source IP (default to localhost if not available)
    let source_ip = request
        .extensions()
        .get::<std::net::SocketAddr>()
        .map(|addr| addr.ip())
        .unwrap_or_else(|| std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST));

    let auth_request = AuthRequest { headers, source_ip };

    match state.authenticator().authenticate(&auth_request).await {
        Ok(identity) => {
            let profile = identity.profile();
            match run_blocking(&state, move |s| s.ticket_store().upsert_user(&profile)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(user_id = %identity.user_id, error = %e, "Failed to cache user profile")
                }
                Err(e) => {
                    warn!(user_id = %identity.user_id, error = %e, "Profile cache task failed")
                }
            }
            debug!(user_id = %identity.user_id, role = %identity.role, "Authenticated");
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(AuthError::NotAuthenticated) => {
            AUTH_FAILURES_TOTAL
                .with_label_values(&["not_authenticated"])
                .inc();
            ApiError::unauthenticated("Authentication required").into_response()
        }
        Err(AuthError::InvalidCredentials(reason)) => {
            AUTH_FAILURES_TOTAL
                .with_label_values(&["invalid_credentials"])
                .inc();
            ApiError::unauthenticated(format!("Invalid credentials: {}", reason)).into_response()
        }
        Err(e) => {
            AUTH_FAILURES_TOTAL
                .with_label_values(&["internal_error"])
                .inc();
            ApiError::internal(e.to_string()).into_response()
        }
    }
}

/// Extractor for the authenticated caller as a queue [`Actor`].
///
/// Rejects with 401 when the auth middleware did not run or found no identity.
#[derive(Debug, Clone)]
pub struct AuthActor(pub Actor);

impl<S> FromRequestParts<S> for AuthActor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let actor = parts
            .extensions
            .get::<Identity>()
            .map(|identity| AuthActor(identity.actor()))
            .ok_or_else(|| ApiError::unauthenticated("Authentication required"));
        std::future::ready(actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::{header, Request, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use http_body_util::BodyExt;
    use loket_core::{
        audit::{AuditHandle, AuditStore, SqliteAuditStore},
        config::{
            AuthConfig, AuthMethod, DatabaseConfig, LoggingConfig, QrConfig, QueueConfig,
            ServerConfig,
        },
        create_authenticator, Config, SqliteTicketStore, TicketStore,
    };
    use tower::ServiceExt;

    async fn actor_handler(AuthActor(actor): AuthActor) -> String {
        format!("{}:{}", actor.role(), actor.id())
    }

    fn create_test_state(auth: AuthConfig) -> (Arc<AppState>, Arc<SqliteTicketStore>) {
        let config = Config {
            auth: auth.clone(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            queue: QueueConfig::default(),
            qr: QrConfig::default(),
            logging: LoggingConfig::default(),
        };
        let authenticator: Arc<dyn loket_core::Authenticator> =
            Arc::from(create_authenticator(&auth).unwrap());
        let audit_store: Arc<dyn AuditStore> = Arc::new(SqliteAuditStore::in_memory().unwrap());
        let ticket_store = Arc::new(SqliteTicketStore::in_memory().unwrap());
        let state = Arc::new(AppState::new(
            config,
            authenticator,
            AuditHandle::disabled(),
            audit_store,
            ticket_store.clone() as Arc<dyn TicketStore>,
            None,
        ));
        (state, ticket_store)
    }

    fn app(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/test", get(actor_handler))
            .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
            .with_state(state)
    }

    fn trusted() -> AuthConfig {
        AuthConfig {
            method: AuthMethod::TrustedHeaders,
            api_key: None,
        }
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_trusted_headers_yield_actor() {
        let (state, _) = create_test_state(trusted());
        let request = Request::builder()
            .uri("/test")
            .header("X-User-Id", "op-1")
            .header("X-User-Role", "operator")
            .body(Body::empty())
            .unwrap();

        let response = app(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "OPERATOR:op-1");
    }

    #[tokio::test]
    async fn test_missing_identity_is_unauthorized() {
        let (state, _) = create_test_state(trusted());
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();

        let response = app(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["code"], "unauthenticated");
    }

    #[tokio::test]
    async fn test_unknown_role_is_unauthorized() {
        let (state, _) = create_test_state(trusted());
        let request = Request::builder()
            .uri("/test")
            .header("X-User-Id", "u-1")
            .header("X-User-Role", "superuser")
            .body(Body::empty())
            .unwrap();

        let response = app(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_profile_is_cached() {
        let (state, store) = create_test_state(trusted());
        let request = Request::builder()
            .uri("/test")
            .header("X-User-Id", "v-1")
            .header("X-User-Role", "VISITOR")
            .header("X-User-Name", "Siti")
            .body(Body::empty())
            .unwrap();

        let response = app(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let profile = store.get_user("v-1").unwrap().unwrap();
        assert_eq!(profile.name.as_deref(), Some("Siti"));
    }

    #[tokio::test]
    async fn test_api_key_auth() {
        let (state, _) = create_test_state(AuthConfig {
            method: AuthMethod::ApiKey,
            api_key: Some("secret-key".to_string()),
        });

        let valid = Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, "Bearer secret-key")
            .header("X-User-Id", "admin-1")
            .header("X-User-Role", "ADMIN")
            .body(Body::empty())
            .unwrap();
        let response = app(state.clone()).oneshot(valid).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "ADMIN:admin-1");

        let wrong_key = Request::builder()
            .uri("/test")
            .header("X-API-Key", "wrong-key")
            .header("X-User-Id", "admin-1")
            .header("X-User-Role", "ADMIN")
            .body(Body::empty())
            .unwrap();
        let response = app(state).oneshot(wrong_key).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
