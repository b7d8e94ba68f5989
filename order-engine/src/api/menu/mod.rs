//! Menu availability API 模块
//!
//! 菜品 CRUD 属于管理端，这里只有售罄开关和查询。

mod handler;

use axum::{
    Router,
    routing::{get, put},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/shops/{shop_id}/menu-items", get(handler::list))
        .route(
            "/api/shops/{shop_id}/menu-items/{id}/availability",
            put(handler::set_availability),
        )
        .route("/api/shops/{shop_id}/settings", get(handler::settings))
}
