//! Dining Table API 模块
//!
//! 桌台状态由引擎维护，这里只暴露查询、结账和清台。

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .nest("/api/shops/{shop_id}/tables", routes())
        .route("/api/shops/{shop_id}/bills/{id}", get(handler::get_bill))
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/bill", post(handler::bill))
        .route("/{id}/bill/preview", get(handler::preview_bill))
        .route("/{id}/clear", post(handler::clear))
}
