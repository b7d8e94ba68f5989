//! Order API 模块
//!
//! 写操作全部转成 `OrderCommand` 交给 OrdersManager；读操作直接查存储。

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/shops/{shop_id}/orders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list).post(handler::create))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/events", get(handler::events))
        .route("/{id}/transition", post(handler::transition))
        .route("/{id}/cancel", post(handler::cancel))
        .route("/{id}/bill", post(handler::bill))
        .route("/{id}/bill/preview", get(handler::preview_bill))
}
