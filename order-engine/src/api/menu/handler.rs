//! Menu availability API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use shared::error::CommandResponse;
use shared::models::{MenuItemAvailability, ShopSettings};
use shared::order::OrderCommandPayload;

use crate::api::command::{CommandMeta, submit};
use crate::core::ServerState;
use crate::utils::{ApiResponse, AppResult, ok};

#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    #[serde(flatten)]
    pub meta: CommandMeta,
    pub is_available: bool,
}

/// GET /api/shops/{shop_id}/menu-items
pub async fn list(
    State(state): State<ServerState>,
    Path(shop_id): Path<String>,
) -> AppResult<Json<ApiResponse<Vec<MenuItemAvailability>>>> {
    Ok(ok(state.orders.list_menu_items(&shop_id)?))
}

/// PUT /api/shops/{shop_id}/menu-items/{id}/availability - 售罄 / 恢复供应
pub async fn set_availability(
    State(state): State<ServerState>,
    Path((shop_id, id)): Path<(String, String)>,
    Json(req): Json<AvailabilityRequest>,
) -> AppResult<Json<ApiResponse<CommandResponse>>> {
    let payload = OrderCommandPayload::SetItemAvailability {
        menu_item_id: id,
        is_available: req.is_available,
    };
    submit(&state, shop_id, req.meta, payload).await
}

/// GET /api/shops/{shop_id}/settings
pub async fn settings(
    State(state): State<ServerState>,
    Path(shop_id): Path<String>,
) -> AppResult<Json<ApiResponse<ShopSettings>>> {
    Ok(ok(state.orders.get_settings(&shop_id)?))
}
