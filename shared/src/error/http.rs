//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // Success
            Self::Success => StatusCode::OK,

            // 400 Bad Request
            Self::ValidationFailed => StatusCode::BAD_REQUEST,

            // 404 Not Found
            Self::NotFound => StatusCode::NOT_FOUND,

            // 409 Conflict (refetch then retry)
            Self::Conflict | Self::AlreadyBilled => StatusCode::CONFLICT,

            // 422 业务规则
            Self::InvalidTransition
            | Self::ItemUnavailable
            | Self::NoActiveOrders
            | Self::EmptySession => StatusCode::UNPROCESSABLE_ENTITY,

            // 5xx
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Unknown | Self::StorageError | Self::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
