//! Wiring: store, bus, read models, services and the background monitor.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{error, info};

use forgepos_events::{EventBus, EventEnvelope, InMemoryEventBus};

use crate::catalog::CatalogService;
use crate::checkout::CheckoutService;
use crate::command_dispatcher::CommandDispatcher;
use crate::config::{AppConfig, ConfigError};
use crate::event_store::{EventStore, EventStoreError, InMemoryEventStore, PostgresEventStore};
use crate::monitor::{AlertLog, LowStockMonitor, LowStockMonitorHandle};
use crate::parties::PartyService;
use crate::projections::{ProjectionError, ReadModels};
use crate::reports::ReportService;
use crate::stock::StockService;

pub type SharedEventStore = Arc<dyn EventStore>;
pub type SharedEventBus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
pub type Dispatcher = CommandDispatcher<SharedEventStore, SharedEventBus>;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("event store unavailable: {0}")]
    Store(#[from] EventStoreError),

    #[error("failed to rebuild read models: {0}")]
    Rebuild(#[from] ProjectionError),
}

/// The assembled application core the API serves.
pub struct Backend {
    pub dispatcher: Arc<Dispatcher>,
    pub catalog: CatalogService,
    pub parties: PartyService,
    pub stock: StockService,
    pub checkout: CheckoutService,
    pub reports: ReportService,
    pub alerts: Arc<AlertLog>,
    // Dropped last: by then the bus is gone and the monitor thread exits at once.
    monitor: Option<LowStockMonitorHandle>,
}

impl Backend {
    /// Fresh in-memory backend with empty read models.
    pub fn in_memory() -> Self {
        Self::assemble(Arc::new(InMemoryEventStore::new()), Arc::new(ReadModels::new()))
    }

    /// Build from configuration. With persistent stores the schema is
    /// ensured and every read model is rebuilt from the event log.
    pub async fn from_config(config: &AppConfig) -> Result<Self, BackendError> {
        if !config.use_persistent_stores {
            info!("using in-memory event store");
            return Ok(Self::in_memory());
        }

        let url = config
            .database_url
            .as_deref()
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let store = PostgresEventStore::connect(url).await?;
        store.ensure_schema().await?;

        let history = store.load_all().await?;
        let read_models = Arc::new(ReadModels::new());
        let applied = read_models.rebuild(&history)?;
        info!(events = applied, "read models rebuilt from postgres event store");

        Ok(Self::assemble(Arc::new(store), read_models))
    }

    fn assemble(store: SharedEventStore, read_models: Arc<ReadModels>) -> Self {
        let bus: SharedEventBus = Arc::new(InMemoryEventBus::new());
        let alerts = Arc::new(AlertLog::new());

        let monitor = match LowStockMonitor::default().spawn(bus.subscribe(), read_models.clone(), alerts.clone()) {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!(error = %e, "failed to start low-stock monitor; alerts disabled");
                None
            }
        };

        let dispatcher = Arc::new(CommandDispatcher::new(store, bus, read_models));
        Self {
            catalog: CatalogService::new(dispatcher.clone()),
            parties: PartyService::new(dispatcher.clone()),
            stock: StockService::new(dispatcher.clone(), alerts.clone()),
            checkout: CheckoutService::new(dispatcher.clone()),
            reports: ReportService::new(dispatcher.clone()),
            dispatcher,
            alerts,
            monitor,
        }
    }

    pub fn monitor_running(&self) -> bool {
        self.monitor.is_some()
    }
}
