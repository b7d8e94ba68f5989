//! Order API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use shared::error::CommandResponse;
use shared::models::{BillBreakdown, BillOptions};
use shared::order::{
    Order, OrderCommandPayload, OrderEvent, OrderItemInput, OrderStatus, ServiceType,
};

use crate::api::command::{CommandMeta, submit};
use crate::core::ServerState;
use crate::utils::{ApiResponse, AppError, AppResult, ok};

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(flatten)]
    pub meta: CommandMeta,
    #[serde(default)]
    pub table_id: Option<String>,
    pub service_type: ServiceType,
    pub items: Vec<OrderItemInput>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub session_otp: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    #[serde(flatten)]
    pub meta: CommandMeta,
    pub target: OrderStatus,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    #[serde(flatten)]
    pub meta: CommandMeta,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BillRequest {
    #[serde(flatten)]
    pub meta: CommandMeta,
    #[serde(default)]
    pub options: BillOptions,
}

/// GET /api/shops/{shop_id}/orders
pub async fn list(
    State(state): State<ServerState>,
    Path(shop_id): Path<String>,
) -> AppResult<Json<ApiResponse<Vec<Order>>>> {
    Ok(ok(state.orders.list_orders(&shop_id)?))
}

/// GET /api/shops/{shop_id}/orders/{id}
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path((shop_id, id)): Path<(String, String)>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let order = state
        .orders
        .get_order(&shop_id, &id)?
        .ok_or_else(|| AppError::not_found(format!("Order {id}")))?;
    Ok(ok(order))
}

/// GET /api/shops/{shop_id}/orders/{id}/events - 审计日志
pub async fn events(
    State(state): State<ServerState>,
    Path((shop_id, id)): Path<(String, String)>,
) -> AppResult<Json<ApiResponse<Vec<OrderEvent>>>> {
    Ok(ok(state.orders.get_events_for_order(&shop_id, &id)?))
}

/// POST /api/shops/{shop_id}/orders
pub async fn create(
    State(state): State<ServerState>,
    Path(shop_id): Path<String>,
    Json(req): Json<CreateOrderRequest>,
) -> AppResult<Json<ApiResponse<CommandResponse>>> {
    let payload = OrderCommandPayload::CreateOrder {
        table_id: req.table_id,
        service_type: req.service_type,
        items: req.items,
        customer_name: req.customer_name,
        customer_phone: req.customer_phone,
        note: req.note,
        session_otp: req.session_otp,
    };
    submit(&state, shop_id, req.meta, payload).await
}

/// POST /api/shops/{shop_id}/orders/{id}/transition
pub async fn transition(
    State(state): State<ServerState>,
    Path((shop_id, id)): Path<(String, String)>,
    Json(req): Json<TransitionRequest>,
) -> AppResult<Json<ApiResponse<CommandResponse>>> {
    let payload = OrderCommandPayload::TransitionOrder {
        order_id: id,
        target: req.target,
        expected_version: req.expected_version,
    };
    submit(&state, shop_id, req.meta, payload).await
}

/// POST /api/shops/{shop_id}/orders/{id}/cancel
pub async fn cancel(
    State(state): State<ServerState>,
    Path((shop_id, id)): Path<(String, String)>,
    Json(req): Json<CancelRequest>,
) -> AppResult<Json<ApiResponse<CommandResponse>>> {
    let payload = OrderCommandPayload::CancelOrder {
        order_id: id,
        reason: req.reason,
    };
    submit(&state, shop_id, req.meta, payload).await
}

/// POST /api/shops/{shop_id}/orders/{id}/bill - 外卖/外送单独结账
pub async fn bill(
    State(state): State<ServerState>,
    Path((shop_id, id)): Path<(String, String)>,
    Json(req): Json<BillRequest>,
) -> AppResult<Json<ApiResponse<CommandResponse>>> {
    let payload = OrderCommandPayload::BillOrder {
        order_id: id,
        options: req.options,
    };
    submit(&state, shop_id, req.meta, payload).await
}

/// GET /api/shops/{shop_id}/orders/{id}/bill/preview
pub async fn preview_bill(
    State(state): State<ServerState>,
    Path((shop_id, id)): Path<(String, String)>,
    Query(options): Query<BillOptions>,
) -> AppResult<Json<ApiResponse<BillBreakdown>>> {
    Ok(ok(state.orders.preview_order_bill(&shop_id, &id, &options)?))
}
