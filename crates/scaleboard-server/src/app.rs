//! Router assembly: API routes, rate limiting, static frontend and the
//! cross-cutting tower layers.

use std::any::Any;
use std::sync::Arc;

use axum::Router;
use axum::http::header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS};
use axum::http::{HeaderValue, Method};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::rate_limit::{self, RateLimiter};
use crate::routes;
use crate::state::AppState;

/// Requests processed at once across the whole server.
const MAX_CONCURRENT_REQUESTS: usize = 256;

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let general = Arc::new(RateLimiter::new(
        config.rate_limit_max,
        config.rate_limit_window,
    ));
    let strict = Arc::new(RateLimiter::strict());

    let api = routes::router(&strict)
        .layer(middleware::from_fn_with_state(general, rate_limit::enforce))
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ));

    let app = Router::new().nest("/api", api);
    let app = if let Some(dir) = &config.static_dir {
        // Unknown paths fall back to index.html for client-side routing.
        let spa = ServeDir::new(dir)
            .append_index_html_on_directories(true)
            .fallback(ServeFile::new(dir.join("index.html")));
        app.fallback_service(spa)
    } else {
        app.fallback(routes::not_found)
    };

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .cors_origin
                .clone()
                .map_or_else(AllowOrigin::any, AllowOrigin::exact),
        )
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    app.layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(GlobalConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS))
        .with_state(state)
}

/// Generic 500 for a panicking handler. The panic payload is not echoed.
#[allow(clippy::needless_pass_by_value)]
fn panic_response(_payload: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!("request handler panicked");
    AppError::Internal("internal server error".to_owned()).into_response()
}
