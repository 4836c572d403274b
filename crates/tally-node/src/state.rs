//! Application state.

use std::sync::Arc;

use tally_core::{DebtConfig, Result, SystemClock};
use tally_engine::DebtService;
use tally_state::{BroadcastNotifier, InMemoryDebtStore, InMemoryUserDirectory};

/// Capacity of the outbound notification channel.
const NOTIFICATION_BUFFER: usize = 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// The debt engine.
    pub service: Arc<DebtService>,

    /// Debt records.
    pub store: Arc<InMemoryDebtStore>,

    /// User profiles, registered through the API.
    pub directory: Arc<InMemoryUserDirectory>,

    /// Outbound messages, streamed to the transport.
    pub notifier: Arc<BroadcastNotifier>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(config: DebtConfig) -> Result<Self> {
        let store = Arc::new(InMemoryDebtStore::new());
        let directory = Arc::new(InMemoryUserDirectory::new());
        let notifier = Arc::new(BroadcastNotifier::new(NOTIFICATION_BUFFER));

        let service = DebtService::new(
            config,
            store.clone(),
            directory.clone(),
            notifier.clone(),
            Arc::new(SystemClock),
        )?;

        Ok(Self {
            service: Arc::new(service),
            store,
            directory,
            notifier,
        })
    }
}
