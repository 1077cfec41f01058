//! Shared fixtures for router tests: a wiremock upstream, an in-memory
//! credential store and `oneshot` request helpers.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request};
use axum::response::Response;
use scaleboard_core::provider::ProviderKind;
use scaleboard_storage::MemoryBackend;
use serde_json::Value;
use tower::ServiceExt;
use wiremock::MockServer;

use crate::app::build_router;
use crate::config::ServerConfig;
use crate::state::AppState;

/// Boot-time API key used by [`TestApp`].
pub const TEST_API_KEY: &str = "tskey-api-test.0123456789";

/// A configuration pointing at `url`, with a generous general rate limit.
pub fn config_for(url: &str, api_key: &str) -> ServerConfig {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("HEADSCALE_URL", url),
        ("HEADSCALE_API_KEY", api_key),
        ("SESSION_SECRET", "test-session-secret"),
        ("RATE_LIMIT_MAX", "1000"),
    ]);
    ServerConfig::from_lookup(|name| vars.get(name).map(|v| (*v).to_owned())).unwrap()
}

pub struct TestApp {
    pub router: Router,
    pub upstream: MockServer,
    pub state: Arc<AppState>,
}

impl TestApp {
    /// REST provider bound to a fresh mock upstream.
    pub async fn spawn() -> Self {
        Self::with_provider(ProviderKind::Api).await
    }

    pub async fn with_provider(provider: ProviderKind) -> Self {
        let upstream = MockServer::start().await;
        let mut config = config_for(&upstream.uri(), TEST_API_KEY);
        config.provider = provider;

        let state = AppState::bootstrap(&config, Arc::new(MemoryBackend::new()))
            .await
            .unwrap();
        let router = build_router(Arc::clone(&state), &config);
        Self {
            router,
            upstream,
            state,
        }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> Response {
        self.request(Method::POST, uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> Response {
        self.request(Method::PUT, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> Response {
        self.request(Method::DELETE, uri, None).await
    }
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
