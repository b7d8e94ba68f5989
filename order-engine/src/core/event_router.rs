//! Event Router - 事件路由与分发
//!
//! 解耦 OrdersManager 和下游 Worker，每个 Worker 一个独立通道。
//!
//! ```text
//! OrdersManager (broadcast)
//!        │
//!        └── EventRouter
//!               └── mpsc ──► NotificationWorker (created / status / cancelled) [best-effort]
//! ```
//!
//! 推送是 fire-and-forget：通道满则丢弃，绝不反压命令处理。

use shared::order::{OrderEvent, OrderEventType};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

/// 会触发推送的事件类型
const NOTIFY_EVENTS: &[OrderEventType] = &[
    OrderEventType::OrderCreated,
    OrderEventType::OrderStatusChanged,
    OrderEventType::OrderCancelled,
];

/// 事件通道集合
pub struct EventChannels {
    /// 推送事件
    pub notify_rx: mpsc::Receiver<Arc<OrderEvent>>,
}

/// 事件路由器
///
/// 订阅 OrdersManager 的 broadcast，按类型分发到独立的 mpsc 通道。
pub struct EventRouter {
    notify_tx: mpsc::Sender<Arc<OrderEvent>>,
}

impl EventRouter {
    pub fn new(notify_buffer: usize) -> (Self, EventChannels) {
        let (notify_tx, notify_rx) = mpsc::channel(notify_buffer);
        (Self { notify_tx }, EventChannels { notify_rx })
    }

    /// 运行路由器，直到源通道关闭或收到 shutdown
    pub async fn run(self, mut source: broadcast::Receiver<OrderEvent>, shutdown: CancellationToken) {
        tracing::info!("Event router started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Event router shutting down");
                    break;
                }
                received = source.recv() => match received {
                    Ok(event) => self.dispatch(event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // 只影响推送，订单数据已落库
                        tracing::warn!(skipped = n, "Event router lagged, notifications skipped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Source channel closed, event router stopping");
                        break;
                    }
                }
            }
        }
    }

    fn dispatch(&self, event: OrderEvent) {
        if !NOTIFY_EVENTS.contains(&event.event_type) {
            return;
        }

        match self.notify_tx.try_send(Arc::new(event)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(
                    order_id = %event.order_id,
                    event_type = ?event.event_type,
                    "Notify channel full, notification dropped"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("Notify channel closed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::{EventPayload, OrderStatus};

    fn make_test_event(payload: EventPayload, sequence: u64) -> OrderEvent {
        OrderEvent::new(
            sequence,
            "s1",
            "o1",
            "user-1",
            "Test User",
            uuid::Uuid::new_v4().to_string(),
            None,
            payload,
        )
    }

    fn status_changed(sequence: u64) -> OrderEvent {
        make_test_event(
            EventPayload::OrderStatusChanged {
                from: OrderStatus::Queued,
                to: OrderStatus::Preparing,
            },
            sequence,
        )
    }

    #[tokio::test]
    async fn test_event_routing_filters_billed() {
        let (router, mut channels) = EventRouter::new(16);
        let (tx, rx) = broadcast::channel(16);
        tokio::spawn(router.run(rx, CancellationToken::new()));

        tx.send(make_test_event(
            EventPayload::OrderBilled {
                bill_id: "b1".to_string(),
            },
            1,
        ))
        .unwrap();
        tx.send(status_changed(2)).unwrap();

        // OrderBilled 不推送，先收到的是 sequence 2
        let routed = channels.notify_rx.recv().await.unwrap();
        assert_eq!(routed.sequence, 2);
    }

    #[tokio::test]
    async fn test_full_channel_drops_instead_of_blocking() {
        let (router, mut channels) = EventRouter::new(1);
        let (tx, rx) = broadcast::channel(16);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(router.run(rx, shutdown.clone()));

        for seq in 1..=3 {
            tx.send(status_changed(seq)).unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        assert_eq!(channels.notify_rx.recv().await.unwrap().sequence, 1);
        assert!(channels.notify_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_router_stops_on_shutdown() {
        let (router, _channels) = EventRouter::new(4);
        let (_tx, rx) = broadcast::channel::<OrderEvent>(4);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(router.run(rx, shutdown.clone()));

        shutdown.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
