//! Dining Table API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use shared::error::CommandResponse;
use shared::models::{Bill, BillBreakdown, BillOptions, DiningTable};
use shared::order::OrderCommandPayload;

use crate::api::command::{CommandMeta, submit};
use crate::core::ServerState;
use crate::utils::{ApiResponse, AppError, AppResult, ok};

#[derive(Debug, Deserialize)]
pub struct BillTableRequest {
    #[serde(flatten)]
    pub meta: CommandMeta,
    #[serde(default)]
    pub options: BillOptions,
}

/// GET /api/shops/{shop_id}/tables
pub async fn list(
    State(state): State<ServerState>,
    Path(shop_id): Path<String>,
) -> AppResult<Json<ApiResponse<Vec<DiningTable>>>> {
    Ok(ok(state.orders.list_tables(&shop_id)?))
}

/// GET /api/shops/{shop_id}/tables/{id}
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path((shop_id, id)): Path<(String, String)>,
) -> AppResult<Json<ApiResponse<DiningTable>>> {
    let table = state
        .orders
        .get_table(&shop_id, &id)?
        .ok_or_else(|| AppError::not_found(format!("Table {id}")))?;
    Ok(ok(table))
}

/// POST /api/shops/{shop_id}/tables/{id}/bill - 结账并锁定桌台
pub async fn bill(
    State(state): State<ServerState>,
    Path((shop_id, id)): Path<(String, String)>,
    Json(req): Json<BillTableRequest>,
) -> AppResult<Json<ApiResponse<CommandResponse>>> {
    let payload = OrderCommandPayload::BillTable {
        table_id: id,
        options: req.options,
    };
    submit(&state, shop_id, req.meta, payload).await
}

/// GET /api/shops/{shop_id}/tables/{id}/bill/preview
pub async fn preview_bill(
    State(state): State<ServerState>,
    Path((shop_id, id)): Path<(String, String)>,
    Query(options): Query<BillOptions>,
) -> AppResult<Json<ApiResponse<BillBreakdown>>> {
    Ok(ok(state.orders.preview_table_bill(&shop_id, &id, &options)?))
}

/// POST /api/shops/{shop_id}/tables/{id}/clear
pub async fn clear(
    State(state): State<ServerState>,
    Path((shop_id, id)): Path<(String, String)>,
    Json(meta): Json<CommandMeta>,
) -> AppResult<Json<ApiResponse<CommandResponse>>> {
    submit(&state, shop_id, meta, OrderCommandPayload::ClearTable { table_id: id }).await
}

/// GET /api/shops/{shop_id}/bills/{id}
pub async fn get_bill(
    State(state): State<ServerState>,
    Path((shop_id, id)): Path<(String, String)>,
) -> AppResult<Json<ApiResponse<Bill>>> {
    let bill = state
        .orders
        .get_bill(&shop_id, &id)?
        .ok_or_else(|| AppError::not_found(format!("Bill {id}")))?;
    Ok(ok(bill))
}
