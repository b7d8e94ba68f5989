//! Notification Worker
//!
//! 监听 EventRouter 的推送通道，查询订单当前状态后交给 PushDispatcher。
//! 推送有超时，失败只记日志。

use super::{PushDispatcher, PushNotification};
use crate::orders::OrdersManager;
use shared::order::OrderEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub struct NotificationWorker {
    manager: OrdersManager,
    dispatcher: Arc<dyn PushDispatcher>,
    timeout: Duration,
}

impl NotificationWorker {
    pub fn new(manager: OrdersManager, dispatcher: Arc<dyn PushDispatcher>, timeout: Duration) -> Self {
        Self {
            manager,
            dispatcher,
            timeout,
        }
    }

    /// 运行工作者（阻塞直到通道关闭或收到 shutdown）
    pub async fn run(self, mut event_rx: mpsc::Receiver<Arc<OrderEvent>>, shutdown: CancellationToken) {
        tracing::info!("Notification worker started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Notification worker received shutdown signal");
                    break;
                }
                event = event_rx.recv() => {
                    let Some(event) = event else {
                        tracing::info!("Notify channel closed, notification worker stopping");
                        break;
                    };
                    self.handle(&event).await;
                }
            }
        }
    }

    async fn handle(&self, event: &OrderEvent) {
        let order = match self.manager.get_order(&event.shop_id, &event.order_id) {
            Ok(Some(order)) => order,
            Ok(None) => {
                tracing::warn!(order_id = %event.order_id, "Order vanished before notification");
                return;
            }
            Err(e) => {
                tracing::warn!(order_id = %event.order_id, error = %e, "Failed to load order for notification");
                return;
            }
        };

        let Some(notification) = PushNotification::from_event(event, &order) else {
            return;
        };

        match tokio::time::timeout(self.timeout, self.dispatcher.dispatch(&notification)).await {
            Ok(Ok(())) => {
                tracing::debug!(order_id = %notification.order_id, kind = ?notification.kind, "Notification sent");
            }
            Ok(Err(e)) => {
                tracing::warn!(order_id = %notification.order_id, error = %e, "Push dispatch failed");
            }
            Err(_) => {
                tracing::warn!(order_id = %notification.order_id, timeout = ?self.timeout, "Push dispatch timed out");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{NotificationKind, PushError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use rust_decimal::Decimal;
    use shared::models::{DiningTable, MenuItemAvailability};
    use shared::order::{OrderCommand, OrderCommandPayload, OrderItemInput, OrderStatus, ServiceType};

    #[derive(Default)]
    struct Recording {
        sent: Mutex<Vec<PushNotification>>,
    }

    #[async_trait]
    impl PushDispatcher for Recording {
        async fn dispatch(&self, notification: &PushNotification) -> Result<(), PushError> {
            self.sent.lock().push(notification.clone());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl PushDispatcher for Failing {
        async fn dispatch(&self, _: &PushNotification) -> Result<(), PushError> {
            Err(PushError::Transport("gateway down".to_string()))
        }
    }

    struct Hanging;

    #[async_trait]
    impl PushDispatcher for Hanging {
        async fn dispatch(&self, _: &PushNotification) -> Result<(), PushError> {
            futures::future::pending::<()>().await;
            Ok(())
        }
    }

    fn manager_with_order() -> (OrdersManager, Vec<OrderEvent>) {
        let manager = OrdersManager::in_memory().unwrap();
        manager
            .upsert_table(DiningTable::new("t1", "s1", "Table 1", 4))
            .unwrap();
        manager
            .upsert_menu_item(MenuItemAvailability::new("tea", "s1", "Tea", Decimal::new(300, 2)))
            .unwrap();

        let mut rx = manager.subscribe();
        let resp = manager.execute_command(OrderCommand::new(
            "s1",
            "staff-1",
            "Staff",
            OrderCommandPayload::CreateOrder {
                table_id: Some("t1".to_string()),
                service_type: ServiceType::DineIn,
                items: vec![OrderItemInput {
                    menu_item_id: "tea".to_string(),
                    quantity: 1,
                    notes: None,
                }],
                customer_name: None,
                customer_phone: None,
                note: None,
                session_otp: None,
            },
        ));
        assert!(resp.success);
        let created = rx.try_recv().unwrap();

        let resp = manager.execute_command(OrderCommand::new(
            "s1",
            "staff-1",
            "Staff",
            OrderCommandPayload::TransitionOrder {
                order_id: created.order_id.clone(),
                target: OrderStatus::Preparing,
                expected_version: None,
            },
        ));
        assert!(resp.success);
        let changed = rx.try_recv().unwrap();
        (manager, vec![created, changed])
    }

    async fn run_worker(
        manager: OrdersManager,
        dispatcher: Arc<dyn PushDispatcher>,
        events: Vec<OrderEvent>,
    ) {
        let (tx, rx) = mpsc::channel(8);
        for event in events {
            tx.send(Arc::new(event)).await.unwrap();
        }
        drop(tx);
        let worker = NotificationWorker::new(manager, dispatcher, Duration::from_millis(50));
        worker.run(rx, CancellationToken::new()).await;
    }

    #[tokio::test]
    async fn test_worker_dispatches_created_and_status_changes() {
        let (manager, events) = manager_with_order();
        let recording = Arc::new(Recording::default());
        run_worker(manager, recording.clone(), events).await;

        let sent = recording.sent.lock();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].kind, NotificationKind::OrderPlaced);
        assert_eq!(sent[1].kind, NotificationKind::StatusChanged);
        assert_eq!(sent[0].order_number, "A-001");
    }

    #[tokio::test]
    async fn test_dispatch_failures_do_not_stop_worker() {
        let (manager, events) = manager_with_order();
        // 通道关闭后正常退出即说明失败被吞掉
        run_worker(manager.clone(), Arc::new(Failing), events.clone()).await;
        run_worker(manager.clone(), Arc::new(Hanging), events).await;

        let orders = manager.list_orders("s1").unwrap();
        assert_eq!(orders[0].status, OrderStatus::Preparing);
    }
}
