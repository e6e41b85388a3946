#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};

// ---------------------------------------------------------------------------
// Mock HTTP server
// ---------------------------------------------------------------------------

/// A request as the mock server received it.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: String,
}

impl SeenRequest {
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

pub type Responder = Arc<dyn Fn(&SeenRequest) -> (StatusCode, String) + Send + Sync>;

#[derive(Clone)]
struct MockState {
    seen: Arc<Mutex<Vec<SeenRequest>>>,
    responder: Responder,
}

pub struct MockServer {
    pub base_url: String,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl MockServer {
    /// Serves every request through `responder` on an ephemeral local port.
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&SeenRequest) -> (StatusCode, String) + Send + Sync + 'static,
    {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            seen: seen.clone(),
            responder: Arc::new(responder),
        };
        let app = Router::new().fallback(record).with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            seen,
        }
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

async fn record(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let request = SeenRequest {
        method,
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body,
    };
    let (status, body) = (state.responder)(&request);
    state.seen.lock().unwrap().push(request);

    if body.is_empty() {
        return status.into_response();
    }
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

/// An address nothing listens on.
pub async fn closed_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn make_jwt(sub: &str, exp: DateTime<Utc>) -> String {
    let claims = serde_json::json!({
        "sub": sub,
        "email": format!("{}@example.com", sub),
        "given_name": sub,
        "exp": exp.timestamp(),
    });
    format!(
        "{}.{}.sig",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

pub fn fresh_jwt(sub: &str) -> String {
    make_jwt(sub, Utc::now() + Duration::hours(1))
}

pub fn item_json(id: &str, topic: &str, status: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "topic": topic,
        "status": status,
        "createdAt": "2025-03-01T12:00:00Z",
        "updatedAt": "2025-03-01T12:30:00Z",
    })
}

pub fn auth_result(id_token: &str, refresh_token: Option<&str>) -> String {
    let mut result = serde_json::json!({
        "IdToken": id_token,
        "AccessToken": "access-token",
        "ExpiresIn": 3600,
        "TokenType": "Bearer",
    });
    if let Some(refresh) = refresh_token {
        result["RefreshToken"] = serde_json::Value::String(refresh.to_string());
    }
    serde_json::json!({ "AuthenticationResult": result, "ChallengeParameters": {} }).to_string()
}

pub fn cognito_error(kind: &str, message: &str) -> (StatusCode, String) {
    (
        StatusCode::BAD_REQUEST,
        serde_json::json!({ "__type": kind, "message": message }).to_string(),
    )
}
