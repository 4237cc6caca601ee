use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{from_fn_with_state, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use rush_store::app_config::CorsConfig;
use rush_store::redis_repo::rate_limit_key;
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub mod auth;
pub mod cars;
pub mod error;
pub mod events;
pub mod middleware;
pub mod roles;
pub mod state;
pub mod trips;
pub mod users;
pub mod validation;

pub use state::{AppState, AuthConfig, Repositories};

pub fn app(state: AppState) -> Router {
    let protected = Router::new()
        .merge(users::routes())
        .merge(roles::routes())
        .merge(cars::routes())
        .merge(trips::routes())
        .route_layer(from_fn_with_state(state.clone(), middleware::user_auth_middleware));

    Router::new()
        .route("/", get(|| async { "welcome to Api campus rush" }))
        .route("/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .merge(auth::routes())
        .merge(protected)
        .layer(cors_layer(&state.cors))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .with_state(state)
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

async fn rate_limit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(redis) = state.redis.as_ref() else {
        return next.run(req).await;
    };

    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match redis
        .check_rate_limit(
            &rate_limit_key(&client),
            state.rate_limit.requests_per_window,
            state.rate_limit.window_seconds,
        )
        .await
    {
        Ok(true) => next.run(req).await,
        Ok(false) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "Rate limit exceeded" })),
        )
            .into_response(),
        Err(e) => {
            // Fail open
            warn!("Rate limiter unavailable: {}", e);
            next.run(req).await
        }
    }
}
