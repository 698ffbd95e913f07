//! HTTP surface.
//!
//! Routing, CORS and shared state for the axum server. Handlers live in
//! [`handlers`], request-scoped layers in [`middleware`].

pub mod handlers;
pub mod middleware;

use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, ORIGIN},
        request::Parts,
        HeaderName, HeaderValue, Method,
    },
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::auth::TokenSigner;
use crate::config::{Config, ServerConfig};
use crate::service::{TypingService, UserService};
use crate::store::Database;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserService>,
    pub typing: Arc<TypingService>,
    pub secure_cookies: bool,
}

impl AppState {
    pub fn new(db: Arc<Database>, config: &Config) -> Self {
        let signer = TokenSigner::from_config(&config.auth);
        Self {
            users: Arc::new(UserService::new(
                db.clone(),
                signer,
                config.auth.bcrypt_cost,
                config.stats.top_performers,
            )),
            typing: Arc::new(TypingService::new(db.clone(), db, &config.stats)),
            secure_cookies: config.server.secure_cookies,
        }
    }
}

/// Build the application router.
pub fn build_router(state: AppState, server: &ServerConfig) -> Router {
    let protected = Router::new()
        .route("/api/typing", post(handlers::submit_test))
        .route("/api/userData", get(handlers::user_data))
        .route("/api/topPerformer", get(handlers::top_performers))
        .route("/api/allUser", get(handlers::dashboard))
        .route("/api/typingWord", get(handlers::typing_word))
        .route("/dashboard/recentTest", get(handlers::recent_tests))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/signup", post(handlers::signup))
        .route("/auth/signin", post(handlers::signin))
        .route("/auth/refresh", post(handlers::refresh))
        .merge(protected)
        .layer(cors_layer(server))
        .layer(from_fn(middleware::trace_requests))
        .with_state(state)
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let exact = server.cors_origins.clone();
    let suffixes = server.cors_origin_suffixes.clone();

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _: &Parts| {
                origin
                    .to_str()
                    .map(|o| origin_allowed(o, &exact, &suffixes))
                    .unwrap_or(false)
            },
        ))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([ORIGIN, CONTENT_TYPE, ACCEPT, AUTHORIZATION])
        .expose_headers([HeaderName::from_static(middleware::REQUEST_ID_HEADER)])
        .allow_credentials(true)
        .max_age(Duration::from_secs(12 * 60 * 60))
}

/// Exact origins match verbatim; suffixes only match HTTPS origins.
fn origin_allowed(origin: &str, exact: &[String], suffixes: &[String]) -> bool {
    if exact.iter().any(|o| o == origin) {
        return true;
    }
    origin.starts_with("https://") && suffixes.iter().any(|s| origin.ends_with(s.as_str()))
}
