//! Topic API
//!
//! 客户端（重新）连接时先打开变更流，再拉全量快照，之后只应用增量事件。
//! 主题格式：`shop:{shop}` / `table:{shop}:{table}` / `order:{shop}:{order}`。
//!
//! 变更流是 SSE：
//! - `change` 事件，data 为 `ChangeEvent` JSON
//! - `lagged` 事件，订阅者落后被丢弃了消息，随后流结束，客户端必须重同步

use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use futures::Stream;
use shared::error::{CommandError, ErrorCode};
use shared::message::{Topic, TopicSnapshot};
use tokio::sync::broadcast::error::RecvError;

use crate::core::ServerState;
use crate::message::OwnedSubscription;
use crate::utils::{ApiResponse, AppError, AppResult, ok};

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/topics/{topic}/snapshot", get(snapshot))
        .route("/api/topics/{topic}/events", get(events))
}

fn parse_topic(raw: &str) -> Result<Topic, AppError> {
    raw.parse()
        .map_err(|e: shared::message::InvalidTopic| AppError::validation(e.to_string()))
}

/// GET /api/topics/{topic}/snapshot
pub async fn snapshot(
    State(state): State<ServerState>,
    Path(topic): Path<String>,
) -> AppResult<Json<ApiResponse<TopicSnapshot>>> {
    let topic = parse_topic(&topic)?;
    Ok(ok(state.orders.topic_snapshot(&topic)?))
}

/// GET /api/topics/{topic}/events - SSE 变更流
pub async fn events(
    State(state): State<ServerState>,
    Path(topic): Path<String>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let topic = parse_topic(&topic)?;
    // 连接断开（流被 drop）时自动退订
    let subscription = state
        .bus()
        .subscribe_owned(&topic)
        .map_err(|e| AppError::Command(CommandError::new(ErrorCode::Unavailable, e.to_string())))?;
    tracing::info!(topic = %topic, "Change feed opened");

    Ok(Sse::new(change_stream(subscription)).keep_alive(KeepAlive::default()))
}

fn change_stream(subscription: OwnedSubscription) -> impl Stream<Item = Result<Event, Infallible>> {
    futures::stream::unfold(Some(subscription), |subscription| async move {
        let mut subscription = subscription?;
        loop {
            match subscription.recv().await {
                Ok(change) => match Event::default()
                    .event("change")
                    .id(change.event_id.clone())
                    .json_data(&change)
                {
                    Ok(event) => return Some((Ok(event), Some(subscription))),
                    Err(e) => {
                        tracing::error!(event_id = %change.event_id, error = %e, "Failed to encode change event");
                    }
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(topic = ?subscription.topic(), skipped, "Change feed lagged, closing");
                    let event = Event::default().event("lagged").data(skipped.to_string());
                    return Some((Ok(event), None));
                }
                Err(RecvError::Closed) => {
                    tracing::info!(topic = ?subscription.topic(), "Change feed closed");
                    return None;
                }
            }
        }
    })
}
