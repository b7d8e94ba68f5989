//! 统一错误处理
//!
//! - [`AppError`] - HTTP 层错误，错误码与 `shared::error::ErrorCode` 一致
//! - [`ApiResponse`] - API 响应结构
//!
//! ```ignore
//! // 返回错误
//! Err(AppError::not_found("Table t9"))
//!
//! // 返回成功响应
//! Ok(ok(data))
//! ```

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use shared::error::{CommandError, ErrorCode, UnavailableItem};

use crate::orders::ManagerError;

/// API 统一响应结构
///
/// ```json
/// { "code": 0, "message": "Success", "data": { ... } }
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: ErrorCode,
    pub message: String,
    /// 给终端用户看的提示
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unavailable_items: Vec<UnavailableItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// 应用错误
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 命令 / 查询失败，保留业务错误码
    #[error("{}", .0.message)]
    Command(CommandError),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    fn into_command_error(self) -> CommandError {
        match self {
            AppError::Command(err) => err,
            AppError::NotFound(resource) => CommandError::not_found(resource),
            AppError::Validation(msg) => CommandError::validation(msg),
            AppError::Internal(msg) => CommandError::internal(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let err = self.into_command_error();
        let status = err.code.http_status();
        let category = err.code.category().name();
        if status.is_server_error() {
            tracing::error!(code = ?err.code, category, error = %err.message, "Request failed");
        } else {
            tracing::debug!(code = ?err.code, category, error = %err.message, "Request rejected");
        }

        let body = Json(ApiResponse::<()> {
            code: err.code,
            user_message: Some(err.user_message().to_string()),
            message: err.message,
            unavailable_items: err.unavailable_items,
            data: None,
        });
        (status, body).into_response()
    }
}

impl From<CommandError> for AppError {
    fn from(err: CommandError) -> Self {
        AppError::Command(err)
    }
}

impl From<ManagerError> for AppError {
    fn from(err: ManagerError) -> Self {
        AppError::Command(err.into())
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Create a successful response
pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code: ErrorCode::Success,
        message: "Success".to_string(),
        user_message: None,
        unavailable_items: Vec::new(),
        data: Some(data),
    })
}
