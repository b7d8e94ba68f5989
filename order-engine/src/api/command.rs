//! 命令提交的公共部分
//!
//! 所有写操作都走 `OrdersManager::execute`，HTTP 层只负责拼装 `OrderCommand`。

use axum::{Json, extract::State};
use serde::Deserialize;
use shared::error::CommandResponse;
use shared::order::{OrderCommand, OrderCommandPayload};

use crate::core::ServerState;
use crate::utils::{ApiResponse, AppResult, ok};

/// 每个写请求都带的操作者信息
///
/// `command_id` 由客户端生成时，重试同一请求不会重复执行。
#[derive(Debug, Clone, Deserialize)]
pub struct CommandMeta {
    #[serde(default)]
    pub command_id: Option<String>,
    pub operator_id: String,
    #[serde(default)]
    pub operator_name: String,
}

pub async fn submit(
    state: &ServerState,
    shop_id: String,
    meta: CommandMeta,
    payload: OrderCommandPayload,
) -> AppResult<Json<ApiResponse<CommandResponse>>> {
    let mut cmd = OrderCommand::new(shop_id, meta.operator_id, meta.operator_name, payload);
    if let Some(command_id) = meta.command_id {
        cmd = cmd.with_command_id(command_id);
    }
    execute(state, cmd).await
}

/// POST /api/commands - 客户端直接提交完整命令
///
/// 同步客户端自己生成 `command_id`，超时后原样重发即可。
pub async fn submit_envelope(
    State(state): State<ServerState>,
    Json(cmd): Json<OrderCommand>,
) -> AppResult<Json<ApiResponse<CommandResponse>>> {
    execute(&state, cmd).await
}

async fn execute(
    state: &ServerState,
    cmd: OrderCommand,
) -> AppResult<Json<ApiResponse<CommandResponse>>> {
    let mut response = state.orders.execute(cmd).await;
    if let Some(err) = response.error.take() {
        return Err(err.into());
    }
    Ok(ok(response))
}
