//! HTTP transport
//!
//! - 快照：`GET /api/topics/{topic}/snapshot`
//! - 命令：`POST /api/commands`
//! - 变更流：`GET /api/topics/{topic}/events` (SSE)

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use shared::error::{CommandError, CommandResponse, ErrorCode, UnavailableItem};
use shared::message::{ChangeEvent, Topic, TopicSnapshot};
use shared::order::OrderCommand;

use super::{Authority, ChangeFeed, ChangeStream};
use crate::error::{ClientError, ClientResult};

/// 服务端统一响应格式
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: ErrorCode,
    #[serde(default)]
    message: String,
    #[serde(default)]
    unavailable_items: Vec<UnavailableItem>,
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn into_error(self) -> CommandError {
        CommandError {
            code: self.code,
            message: self.message,
            unavailable_items: self.unavailable_items,
        }
    }
}

/// HTTP client for the order engine
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    request_timeout: Duration,
}

impl HttpTransport {
    /// 不设整体超时（SSE 是长连接），快照和命令请求单独带超时
    pub fn new(base_url: &str, request_timeout: Duration) -> ClientResult<Self> {
        let client = Client::builder().connect_timeout(request_timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// 解析响应；失败时还原服务端的 `CommandError`
    async fn read_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> ClientResult<Result<T, CommandError>> {
        let status = response.status();
        let text = response.text().await?;
        let envelope: Envelope<T> = serde_json::from_str(&text).map_err(|e| {
            ClientError::InvalidResponse(format!("HTTP {status}: {e}"))
        })?;

        if status.is_success() && envelope.code == ErrorCode::Success {
            envelope
                .data
                .map(Ok)
                .ok_or_else(|| ClientError::InvalidResponse("Missing response data".to_string()))
        } else {
            Ok(Err(envelope.into_error()))
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> ClientError {
        if e.is_timeout() {
            ClientError::Timeout(format!("request exceeded {:?}", self.request_timeout))
        } else {
            ClientError::Http(e)
        }
    }
}

#[async_trait]
impl Authority for HttpTransport {
    async fn snapshot(&self, topic: &Topic) -> ClientResult<TopicSnapshot> {
        let response = self
            .client
            .get(self.url(&format!("/api/topics/{topic}/snapshot")))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        Self::read_envelope(response).await?.map_err(ClientError::Server)
    }

    async fn submit(&self, cmd: OrderCommand) -> ClientResult<CommandResponse> {
        let command_id = cmd.command_id.clone();
        let response = self
            .client
            .post(self.url("/api/commands"))
            .timeout(self.request_timeout)
            .json(&cmd)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        match Self::read_envelope::<CommandResponse>(response).await? {
            Ok(resp) => Ok(resp),
            // 服务端超时/不可用：结果未知，交给调用方用同一个 command_id 重发
            Err(err) if err.is_retryable() => Err(ClientError::Server(err)),
            Err(err) => Ok(CommandResponse::error(command_id, err)),
        }
    }
}

#[async_trait]
impl ChangeFeed for HttpTransport {
    async fn subscribe(&self, topic: &Topic) -> ClientResult<ChangeStream> {
        let response = self
            .client
            .get(self.url(&format!("/api/topics/{topic}/events")))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return match Self::read_envelope::<()>(response).await? {
                Err(err) => Err(ClientError::Server(err)),
                Ok(()) => Err(ClientError::InvalidResponse("Unexpected subscribe response".into())),
            };
        }

        tracing::debug!(topic = %topic, "Change feed connected");
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();
        Ok(sse_changes(body))
    }
}

// ============================================================================
// SSE decoding
// ============================================================================

#[derive(Debug, Default, PartialEq)]
struct SseFrame {
    event: Option<String>,
    data: String,
}

/// 从缓冲区取出第一个完整的帧（以空行结束）
fn take_frame(buffer: &mut Vec<u8>) -> Option<SseFrame> {
    let end = buffer.windows(2).position(|w| w == b"\n\n")?;
    let raw: Vec<u8> = buffer.drain(..end + 2).collect();
    let text = String::from_utf8_lossy(&raw[..end]);

    let mut frame = SseFrame::default();
    for line in text.lines() {
        if let Some(value) = line.strip_prefix("event:") {
            frame.event = Some(value.trim_start().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            if !frame.data.is_empty() {
                frame.data.push('\n');
            }
            frame.data.push_str(value.strip_prefix(' ').unwrap_or(value));
        }
        // `id:` 和 `:` 注释 (keep-alive) 忽略
    }
    Some(frame)
}

/// `None` 表示该帧不是变更（keep-alive 等）
fn decode_frame(frame: SseFrame) -> Option<ClientResult<ChangeEvent>> {
    match frame.event.as_deref() {
        Some("lagged") => {
            let skipped = frame.data.trim().parse().unwrap_or(0);
            Some(Err(ClientError::Lagged(skipped)))
        }
        Some("change") | None if !frame.data.is_empty() => {
            Some(serde_json::from_str(&frame.data).map_err(ClientError::from))
        }
        _ => None,
    }
}

struct SseState {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    buffer: Vec<u8>,
    finished: bool,
}

fn sse_changes(body: BoxStream<'static, reqwest::Result<Vec<u8>>>) -> ChangeStream {
    let state = SseState {
        body,
        buffer: Vec::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return None;
            }
            if let Some(frame) = take_frame(&mut state.buffer) {
                match decode_frame(frame) {
                    Some(Ok(change)) => return Some((Ok(change), state)),
                    Some(Err(e)) => {
                        // lagged 之后服务端会断开，剩下的不再可信
                        state.finished = true;
                        return Some((Err(e), state));
                    }
                    None => continue,
                }
            }
            match state.body.next().await {
                Some(Ok(chunk)) => state
                    .buffer
                    .extend(chunk.into_iter().filter(|b| *b != b'\r')),
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(ClientError::Disconnected(e.to_string())), state));
                }
                None => return None,
            }
        }
    })
    .boxed()
}
