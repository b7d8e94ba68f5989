use std::time::Duration;

use super::super::traits::OrderError;
use crate::store::StorageError;
use shared::error::{CommandError, ErrorCode};
use thiserror::Error;

/// Manager errors
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// 将存储错误转换为错误码
fn classify_storage_error(e: &StorageError) -> ErrorCode {
    match e {
        StorageError::VersionConflict { .. } => ErrorCode::Conflict,
        StorageError::Database(_) | StorageError::Transaction(_) => ErrorCode::Unavailable,
        StorageError::Serialization(_) => ErrorCode::InternalError,
        _ => ErrorCode::StorageError,
    }
}

impl From<OrderError> for CommandError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Validation(msg) => CommandError::validation(msg),
            OrderError::NotFound(what) => CommandError::not_found(what),
            OrderError::InvalidTransition(msg) => CommandError::invalid_transition(msg),
            OrderError::Conflict(msg) => CommandError::conflict(msg),
            OrderError::ItemUnavailable(items) => CommandError::item_unavailable(items),
            OrderError::NoActiveOrders(table_id) => CommandError::new(
                ErrorCode::NoActiveOrders,
                format!("Table {table_id} has no active orders"),
            ),
            OrderError::EmptySession(msg) => CommandError::new(ErrorCode::EmptySession, msg),
            OrderError::AlreadyBilled(msg) => CommandError::new(ErrorCode::AlreadyBilled, msg),
            OrderError::Unavailable(msg) => CommandError::new(ErrorCode::Unavailable, msg),
            OrderError::Storage(msg) => {
                tracing::error!(error = %msg, "Storage error during command");
                CommandError::new(ErrorCode::StorageError, msg)
            }
        }
    }
}

impl From<ManagerError> for CommandError {
    fn from(err: ManagerError) -> Self {
        match err {
            ManagerError::Storage(e) => {
                let code = classify_storage_error(&e);
                let message = e.to_string(); // 保留技术细节用于日志/调试
                if code != ErrorCode::Conflict {
                    tracing::error!(error = %e, error_code = ?code, "Storage error occurred");
                }
                CommandError::new(code, message)
            }
            ManagerError::Order(e) => e.into(),
            ManagerError::Timeout(d) => CommandError::new(
                ErrorCode::Timeout,
                format!("Command timed out after {} ms", d.as_millis()),
            ),
            ManagerError::Internal(msg) => CommandError::internal(msg),
        }
    }
}

pub type ManagerResult<T> = Result<T, ManagerError>;
