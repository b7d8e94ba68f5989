//! API 路由模块
//!
//! - [`health`] - 健康检查
//! - [`orders`] - 下单、推进状态、取消、外卖结账
//! - [`tables`] - 桌台查询、整桌结账、清台、账单查询
//! - [`menu`] - 售罄开关、店铺设置查询
//! - [`topics`] - 主题快照 + SSE 变更流（客户端同步）
//!
//! `POST /api/commands` 接收完整的 `OrderCommand`，供同步客户端使用。

mod command;

pub mod health;
pub mod menu;
pub mod orders;
pub mod tables;
pub mod topics;

use axum::{Router, middleware, routing::post};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::ServerState;

/// HTTP 请求日志中间件
async fn log_request(
    request: http::Request<axum::body::Body>,
    next: middleware::Next,
) -> http::Response<axum::body::Body> {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    tracing::info!(target: "http_access", %method, %uri, status = %response.status(), "request");
    response
}

/// Build the router with all routes registered (no middleware, no state)
pub fn build_router() -> Router<ServerState> {
    Router::new()
        .merge(health::router())
        .merge(orders::router())
        .merge(tables::router())
        .merge(menu::router())
        .merge(topics::router())
        .route("/api/commands", post(command::submit_envelope))
}

/// 同时处理的请求上限，超出的排队等待
const MAX_IN_FLIGHT_REQUESTS: usize = 512;

/// Build a fully configured application with middleware and state
pub fn build_app(state: ServerState) -> Router {
    build_router()
        .with_state(state)
        .layer(ConcurrencyLimitLayer::new(MAX_IN_FLIGHT_REQUESTS))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(log_request))
}
