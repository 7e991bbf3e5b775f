//! Shared fixture for in-process API tests.
//!
//! Builds the real router over a temp-file SQLite database, with the
//! `MockQrEncoder` standing in for QR rendering.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use loket_core::{
    audit::{create_audit_system, AuditStore, SqliteAuditStore},
    config::{
        AuthConfig, AuthMethod, DatabaseConfig, LoggingConfig, QrConfig, QueueConfig,
        ServerConfig,
    },
    create_authenticator,
    qr::QrEncoder,
    testing::MockQrEncoder,
    Config, SqliteTicketStore, TicketStore,
};
use loket_server::{api::create_router, state::AppState};

/// A caller as the session gateway would present it.
#[derive(Debug, Clone, Copy)]
pub struct As<'a> {
    pub user_id: &'a str,
    pub role: &'a str,
}

pub const VISITOR: As<'static> = As {
    user_id: "visitor-1",
    role: "VISITOR",
};
pub const OTHER_VISITOR: As<'static> = As {
    user_id: "visitor-2",
    role: "VISITOR",
};
pub const OPERATOR: As<'static> = As {
    user_id: "operator-1",
    role: "OPERATOR",
};
pub const OTHER_OPERATOR: As<'static> = As {
    user_id: "operator-2",
    role: "OPERATOR",
};
pub const ADMIN: As<'static> = As {
    user_id: "admin-1",
    role: "ADMIN",
};

pub struct TestFixture {
    pub router: Router,
    pub ticket_store: Arc<SqliteTicketStore>,
    pub audit_store: Arc<SqliteAuditStore>,
    pub qr: Arc<MockQrEncoder>,
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::with_queue(QueueConfig {
            // Scenario dates are fixed.
            allow_past_dates: true,
            max_days_ahead: 0,
            ..QueueConfig::default()
        })
        .await
    }

    pub async fn with_queue(queue: QueueConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let config = Config {
            auth: AuthConfig {
                method: AuthMethod::TrustedHeaders,
                api_key: None,
            },
            server: ServerConfig::default(),
            database: DatabaseConfig {
                path: db_path.clone(),
                ..DatabaseConfig::default()
            },
            queue,
            qr: QrConfig::default(),
            logging: LoggingConfig::default(),
        };

        let authenticator =
            Arc::from(create_authenticator(&config.auth).expect("Failed to create authenticator"));
        let ticket_store =
            Arc::new(SqliteTicketStore::new(&db_path).expect("Failed to create ticket store"));
        let audit_store =
            Arc::new(SqliteAuditStore::new(&db_path).expect("Failed to create audit store"));
        let qr = Arc::new(MockQrEncoder::new());

        let (audit_handle, audit_writer) =
            create_audit_system(Arc::clone(&audit_store) as Arc<dyn AuditStore>, 100);
        tokio::spawn(audit_writer.run());

        let state = Arc::new(AppState::new(
            config,
            authenticator,
            audit_handle,
            Arc::clone(&audit_store) as Arc<dyn AuditStore>,
            Arc::clone(&ticket_store) as Arc<dyn TicketStore>,
            Some(Arc::clone(&qr) as Arc<dyn QrEncoder>),
        ));

        Self {
            router: create_router(state),
            ticket_store,
            audit_store,
            qr,
            temp_dir,
        }
    }

    pub async fn get(&self, path: &str, caller: Option<As<'_>>) -> TestResponse {
        self.request("GET", path, caller, None).await
    }

    pub async fn post(&self, path: &str, caller: As<'_>, body: Value) -> TestResponse {
        self.request("POST", path, Some(caller), Some(body)).await
    }

    pub async fn patch(&self, path: &str, caller: As<'_>) -> TestResponse {
        self.request("PATCH", path, Some(caller), None).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, caller: As<'_>, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .header("X-User-Id", caller.user_id)
            .header("X-User-Role", caller.role)
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        caller: Option<As<'_>>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(caller) = caller {
            builder = builder
                .header("X-User-Id", caller.user_id)
                .header("X-User-Role", caller.role);
        }

        let body = if let Some(json_body) = body {
            builder = builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }

    /// Book a ticket on 2026-03-10 and return its JSON.
    pub async fn book(&self, caller: As<'_>, service_type: &str) -> Value {
        let response = self
            .post(
                "/api/v1/tickets",
                caller,
                serde_json::json!({
                    "service_type": service_type,
                    "scheduled_date": "2026-03-10",
                    "scheduled_time": "08:00",
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}
