use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::{app::build_app, state::AppState};

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_state(AppState::fake())
    }

    pub fn with_state(state: AppState) -> Self {
        let router = build_app(state.clone());
        Self { state, router }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();
        self.send_raw(req).await
    }

    pub async fn send_raw(&self, req: Request<Body>) -> (StatusCode, Value) {
        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }

    /// Registers `email` and returns `(user id, token)`.
    pub async fn register(&self, email: &str) -> (String, String) {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/users/register",
                None,
                Some(json!({ "email": email, "password": "pw-123456" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        (
            body["id"].as_str().unwrap().to_string(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    pub async fn create_task(&self, token: &str, body: Value) -> Value {
        let (status, task) = self.send(Method::POST, "/api/tasks", Some(token), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {task}");
        task
    }
}

/// Serves a fresh in-memory app on an ephemeral port; returns its base URL.
pub async fn spawn_server() -> String {
    let app = build_app(AppState::fake());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
