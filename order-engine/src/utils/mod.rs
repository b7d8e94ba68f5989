//! 工具模块
//!
//! - [`AppError`] - HTTP 层错误
//! - [`ApiResponse`] - API 响应结构
//! - 日志初始化

pub mod error;
pub mod logger;

pub use error::{ApiResponse, AppError, AppResult, ok};
