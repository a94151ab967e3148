//! Background low-stock monitor.
//!
//! Subscribes to the event bus and raises an alert whenever a committed stock
//! adjustment leaves an active product below its low-stock threshold or out
//! of stock. Alerts are informational and never feed back into the event
//! stream.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock, mpsc};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use forgepos_core::TenantId;
use forgepos_events::{EventEnvelope, Subscription};
use forgepos_inventory::{AdjustmentType, StockLevel, StockStatus};
use forgepos_products::{PRODUCT_AGGREGATE, ProductEvent, ProductId};

use crate::projections::ReadModels;

const MAX_ALERTS: usize = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LowStockAlert {
    #[serde(skip)]
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub sku: String,
    pub product_name: String,
    pub stock: i64,
    pub low_stock_threshold: i64,
    pub status: StockStatus,
    pub adjustment_type: AdjustmentType,
    pub raised_at: DateTime<Utc>,
}

/// Bounded, most-recent-first alert history.
#[derive(Debug, Default)]
pub struct AlertLog {
    inner: RwLock<VecDeque<LowStockAlert>>,
}

impl AlertLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, alert: LowStockAlert) {
        if let Ok(mut alerts) = self.inner.write() {
            alerts.push_front(alert);
            alerts.truncate(MAX_ALERTS);
        }
    }

    /// Alerts for one tenant, newest first.
    pub fn list(&self, tenant_id: TenantId) -> Vec<LowStockAlert> {
        match self.inner.read() {
            Ok(alerts) => alerts.iter().filter(|a| a.tenant_id == tenant_id).cloned().collect(),
            Err(_) => vec![],
        }
    }
}

/// Decide whether `envelope` warrants an alert.
///
/// Reads the product's threshold, name and active flag from the catalog read
/// model, which is updated before the event is published.
pub fn evaluate(envelope: &EventEnvelope<JsonValue>, read_models: &ReadModels) -> Option<LowStockAlert> {
    if envelope.aggregate_type() != PRODUCT_AGGREGATE {
        return None;
    }
    let ProductEvent::StockAdjusted(e) = serde_json::from_value::<ProductEvent>(envelope.payload().clone()).ok()? else {
        return None;
    };

    let product_id = ProductId::new(e.adjustment.product_id);
    let product = read_models.products.get(envelope.tenant_id(), &product_id)?;
    if !product.is_active {
        return None;
    }

    let level = StockLevel::new(e.adjustment.new_stock, product.low_stock_threshold);
    if !level.needs_reorder() {
        return None;
    }

    Some(LowStockAlert {
        tenant_id: envelope.tenant_id(),
        product_id,
        sku: product.sku,
        product_name: e.adjustment.product_name,
        stock: level.stock,
        low_stock_threshold: level.low_stock_threshold,
        status: level.status(),
        adjustment_type: e.adjustment.adjustment_type,
        raised_at: envelope.occurred_at(),
    })
}

/// Handle for the running monitor thread.
#[derive(Debug)]
pub struct LowStockMonitorHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl LowStockMonitorHandle {
    /// Stop the thread and wait for it to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

impl Drop for LowStockMonitorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Clone)]
pub struct LowStockMonitor {
    /// How long to block on the bus before checking for shutdown.
    pub poll_interval: Duration,
}

impl Default for LowStockMonitor {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(200),
        }
    }
}

impl LowStockMonitor {
    pub fn spawn(
        &self,
        subscription: Subscription<EventEnvelope<JsonValue>>,
        read_models: Arc<ReadModels>,
        alerts: Arc<AlertLog>,
    ) -> std::io::Result<LowStockMonitorHandle> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let poll = self.poll_interval;

        let join = thread::Builder::new()
            .name("low-stock-monitor".to_string())
            .spawn(move || monitor_loop(poll, shutdown_rx, subscription, read_models, alerts))?;

        info!("low-stock monitor started");
        Ok(LowStockMonitorHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

fn monitor_loop(
    poll: Duration,
    shutdown_rx: mpsc::Receiver<()>,
    subscription: Subscription<EventEnvelope<JsonValue>>,
    read_models: Arc<ReadModels>,
    alerts: Arc<AlertLog>,
) {
    loop {
        match shutdown_rx.try_recv() {
            Ok(()) | Err(mpsc::TryRecvError::Disconnected) => break,
            Err(mpsc::TryRecvError::Empty) => {}
        }

        match subscription.recv_timeout(poll) {
            Ok(envelope) => {
                if let Some(alert) = evaluate(&envelope, &read_models) {
                    warn!(
                        tenant_id = %alert.tenant_id,
                        product_id = %alert.product_id,
                        sku = %alert.sku,
                        stock = alert.stock,
                        threshold = alert.low_stock_threshold,
                        status = ?alert.status,
                        "product needs reorder"
                    );
                    alerts.record(alert);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                debug!("event bus closed");
                break;
            }
        }
    }
    info!("low-stock monitor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use crate::catalog::NewProduct;
    use crate::event_store::EventStore;
    use crate::stock::StockUpdate;
    use crate::testing::manager;
    use forgepos_core::Money;

    fn alert(tenant_id: TenantId, stock: i64) -> LowStockAlert {
        LowStockAlert {
            tenant_id,
            product_id: ProductId::new(forgepos_core::AggregateId::new()),
            sku: "SKU".to_string(),
            product_name: "Thing".to_string(),
            stock,
            low_stock_threshold: 5,
            status: StockStatus::Low,
            adjustment_type: AdjustmentType::Loss,
            raised_at: Utc::now(),
        }
    }

    #[test]
    fn alert_log_is_bounded_and_newest_first() {
        let log = AlertLog::new();
        let tenant_id = TenantId::new();
        for stock in 0..(MAX_ALERTS as i64 + 5) {
            log.record(alert(tenant_id, stock));
        }
        let alerts = log.list(tenant_id);
        assert_eq!(alerts.len(), MAX_ALERTS);
        assert_eq!(alerts[0].stock, MAX_ALERTS as i64 + 4);
        assert!(log.list(TenantId::new()).is_empty());
    }

    #[tokio::test]
    async fn only_stock_changes_below_threshold_are_flagged() {
        let backend = Backend::in_memory();
        let p = manager(TenantId::new());
        let product = backend
            .catalog
            .create_product(
                &p,
                NewProduct {
                    sku: "EGG-12".to_string(),
                    name: "Eggs x12".to_string(),
                    price: Money::new(400),
                    cost: Money::new(250),
                    initial_stock: 6,
                    low_stock_threshold: 5,
                    category_id: None,
                },
            )
            .await
            .unwrap();

        let adjust = |quantity| StockUpdate {
            product_id: product.product_id,
            quantity,
            adjustment_type: AdjustmentType::Loss,
            supplier_id: None,
            notes: None,
        };
        backend.stock.update_stock(&p, adjust(-1)).await.unwrap();
        backend.stock.update_stock(&p, adjust(-2)).await.unwrap();

        let stream = backend
            .dispatcher
            .store()
            .load_stream(p.active_tenant_id, product.product_id.0)
            .await
            .unwrap();
        assert_eq!(stream.len(), 3);

        let read_models = backend.dispatcher.read_models();
        // created, then 6 -> 5 (not below threshold), then 5 -> 3
        assert!(evaluate(&stream[0].to_envelope(), read_models).is_none());
        assert!(evaluate(&stream[1].to_envelope(), read_models).is_none());
        let raised = evaluate(&stream[2].to_envelope(), read_models).unwrap();
        assert_eq!(raised.stock, 3);
        assert_eq!(raised.status, StockStatus::Low);
        assert_eq!(raised.sku, "EGG-12");
    }
}
