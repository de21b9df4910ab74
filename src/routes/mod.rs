// src/routes/mod.rs
pub mod chat;
pub mod health;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::error::AppError;
use crate::services::rate_limiter::RateDecision;
use crate::state::SharedState;
use axum::{
    Router,
    extract::{ConnectInfo, DefaultBodyLimit, Request, State},
    http::{HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use chat::chat_handler;
use health::health_handler;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Same request body cap as the usual JSON body parser default.
pub const MAX_BODY_BYTES: usize = 100 * 1024;

pub fn create_router(state: SharedState) -> Router {
    let chat_routes = Router::new()
        .route("/chat", post(chat_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware));

    Router::new()
        .merge(chat_routes)
        .route("/health", get(health_handler))
        // Embeddable widget loader and its wasm bundle.
        .fallback_service(ServeDir::new(&state.public_dir))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors_layer(&state))
        .layer(middleware::from_fn_with_state(state.clone(), origin_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(state: &SharedState) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if state.allow_any_origin {
        return layer.allow_origin(Any);
    }

    let origins = state
        .allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok());
    layer.allow_origin(AllowOrigin::list(origins))
}

async fn origin_middleware(
    State(state): State<SharedState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let allowed = match req.headers().get(header::ORIGIN) {
        None => true,
        Some(value) => value
            .to_str()
            .is_ok_and(|origin| state.origin_allowed(Some(origin))),
    };

    if !allowed {
        tracing::warn!(origin = ?req.headers().get(header::ORIGIN), "origin not allowed by CORS");
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(next.run(req).await)
}

async fn rate_limit_middleware(
    State(state): State<SharedState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = client_ip(&req, state.trust_proxy);
    match state.limiter.check(ip).await {
        RateDecision::Allowed { .. } => Ok(next.run(req).await),
        RateDecision::Limited { retry_after } => {
            tracing::warn!(%ip, ?retry_after, "rate limit exceeded");
            Err(AppError::RateLimited { retry_after })
        }
    }
}

/// Client address used as the rate-limit key.
///
/// Behind a proxy only the entry appended by that proxy (the rightmost one)
/// is trusted; anything to its left came from the client.
fn client_ip(req: &Request, trust_proxy: bool) -> IpAddr {
    if trust_proxy {
        let forwarded = req
            .headers()
            .get_all("x-forwarded-for")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .last()
            .and_then(|last| last.trim().parse::<IpAddr>().ok());
        if let Some(ip) = forwarded {
            return ip;
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}
