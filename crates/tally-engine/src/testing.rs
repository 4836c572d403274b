//! Shared fixtures for engine tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use tally_core::{Debt, DebtConfig, FixedClock, ReactionEvent, Result, TallyError, User};
use tally_state::{BroadcastNotifier, DebtStore, InMemoryDebtStore, InMemoryUserDirectory};

use crate::dispatcher::ReactionDispatcher;
use crate::ledger::DebtLedger;
use crate::service::DebtService;
use crate::worker::WorkerContext;

/// Wall-clock time on a fixed day, UTC.
pub fn at_hour(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 12, hour, minute, 0).unwrap()
}

/// An order world: lender "lender" and borrowers "b1", "b2", interval 60s,
/// max duration 300s, clock at noon UTC, operator channel "COPS".
pub struct Harness {
    pub config: Arc<DebtConfig>,
    pub store: Arc<InMemoryDebtStore>,
    pub directory: Arc<InMemoryUserDirectory>,
    pub notifier: Arc<BroadcastNotifier>,
    pub clock: FixedClock,
    pub ledger: Arc<DebtLedger>,
    pub lender: User,
    pub b1: User,
    pub b2: User,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(adjust: impl FnOnce(&mut DebtConfig)) -> Self {
        let mut config = DebtConfig {
            reminder_interval_secs: 60,
            max_duration_secs: 300,
            self_id: "UBOT".to_string(),
            operator_transport_id: Some("COPS".to_string()),
            ..DebtConfig::default()
        };
        adjust(&mut config);

        let lender = User::new("lender", "Lena Host", "TL");
        let b1 = User::new("b1", "Bo One", "TB1");
        let b2 = User::new("b2", "Bea Two", "TB2");

        let store = Arc::new(InMemoryDebtStore::new());
        let directory = Arc::new(InMemoryUserDirectory::with_users([
            lender.clone(),
            b1.clone(),
            b2.clone(),
        ]));
        let notifier = Arc::new(BroadcastNotifier::default());
        let ledger = Arc::new(DebtLedger::new(
            store.clone(),
            directory.clone(),
            notifier.clone(),
        ));

        Self {
            config: Arc::new(config),
            store,
            directory,
            notifier,
            clock: FixedClock::new(at_hour(12, 0)),
            ledger,
            lender,
            b1,
            b2,
        }
    }

    /// Create a debt owed to the harness lender.
    pub async fn create(&self, order_id: &str, borrower: &User, amount: Decimal) -> Debt {
        self.ledger
            .create_debt(amount, order_id, "C1", "m1", borrower, &self.lender)
            .await
            .unwrap()
    }

    pub fn context(&self) -> WorkerContext {
        self.context_with_ledger(self.ledger.clone())
    }

    pub fn context_with_store(&self, store: Arc<dyn DebtStore>) -> WorkerContext {
        let ledger = Arc::new(DebtLedger::new(
            store,
            self.directory.clone(),
            self.notifier.clone(),
        ));
        self.context_with_ledger(ledger)
    }

    fn context_with_ledger(&self, ledger: Arc<DebtLedger>) -> WorkerContext {
        WorkerContext::new(
            ledger,
            self.directory.clone(),
            self.notifier.clone(),
            self.config.clone(),
            Arc::new(self.clock.clone()),
        )
        .unwrap()
    }

    pub fn dispatcher(&self) -> ReactionDispatcher {
        ReactionDispatcher::new(
            self.ledger.clone(),
            self.directory.clone(),
            self.notifier.clone(),
            self.config.clone(),
        )
        .unwrap()
    }

    pub fn service(&self) -> DebtService {
        DebtService::new(
            self.config.as_ref().clone(),
            self.store.clone(),
            self.directory.clone(),
            self.notifier.clone(),
            Arc::new(self.clock.clone()),
        )
        .unwrap()
    }

    /// `user` reacting with `reaction` on the rates message of `order_id`.
    pub fn reaction(&self, user: &User, reaction: &str, order_id: &str) -> ReactionEvent {
        ReactionEvent {
            reaction: reaction.to_string(),
            from_user_id: user.transport_id.clone(),
            message_user_id: self.config.self_id.clone(),
            message_text: format!("Rates for order ID {order_id}. Pay up"),
            channel: "C1".to_string(),
        }
    }
}

/// Store whose first `failures` list calls fail.
pub struct FlakyStore {
    inner: Arc<InMemoryDebtStore>,
    failures: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<InMemoryDebtStore>, failures: usize) -> Self {
        Self {
            inner,
            failures: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl DebtStore for FlakyStore {
    async fn create_debt(&self, debt: Debt) -> Result<()> {
        self.inner.create_debt(debt).await
    }

    async fn create_debt_checked(&self, debt: Debt) -> Result<()> {
        self.inner.create_debt_checked(debt).await
    }

    async fn list_debts_for_order(&self, order_id: &str) -> Result<Vec<Debt>> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TallyError::store("connection reset"));
        }
        self.inner.list_debts_for_order(order_id).await
    }

    async fn remove_debt(&self, order_id: &str, debt_id: &str) -> Result<bool> {
        self.inner.remove_debt(order_id, debt_id).await
    }

    async fn take_debts_for_order(&self, order_id: &str) -> Result<Vec<Debt>> {
        self.inner.take_debts_for_order(order_id).await
    }

    async fn orders(&self) -> Result<Vec<String>> {
        self.inner.orders().await
    }
}
