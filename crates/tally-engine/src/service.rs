//! Debt service: wires the ledger, the worker registry and the dispatcher
//! behind the two entry points the ingestion layer calls.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_core::{Clock, Debt, DebtConfig, Notification, ReactionEvent, Result, TallyError};
use tally_state::{DebtStore, Notifier, UserDirectory};
use tracing::{error, info, warn};

use crate::dispatcher::{ReactionDispatcher, ReactionOutcome};
use crate::ledger::DebtLedger;
use crate::messages;
use crate::registry::WorkerRegistry;
use crate::worker::WorkerContext;

/// One borrower's share of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Share {
    pub user_id: String,
    pub amount: Decimal,
}

/// Per-borrower amounts produced by the rate split of one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSplit {
    pub order_id: String,
    /// Channel the rates message was posted to.
    pub initiated_transport: String,
    /// The rates message.
    pub message_id: String,
    /// Internal id of the host who paid.
    pub lender_id: String,
    pub shares: Vec<Share>,
}

/// What tracking an order set up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingSummary {
    pub order_id: String,
    pub debts: Vec<Debt>,
    /// Share holders no debt was created for.
    pub skipped: Vec<String>,
    pub worker_started: bool,
}

/// The debt lifecycle engine.
pub struct DebtService {
    config: Arc<DebtConfig>,
    ledger: Arc<DebtLedger>,
    directory: Arc<dyn UserDirectory>,
    notifier: Arc<dyn Notifier>,
    registry: WorkerRegistry,
    dispatcher: ReactionDispatcher,
}

impl DebtService {
    /// Validate `config` and assemble the engine.
    pub fn new(
        config: DebtConfig,
        store: Arc<dyn DebtStore>,
        directory: Arc<dyn UserDirectory>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);

        let ledger = Arc::new(DebtLedger::new(store, directory.clone(), notifier.clone()));
        let ctx = WorkerContext::new(
            ledger.clone(),
            directory.clone(),
            notifier.clone(),
            config.clone(),
            clock,
        )?;
        let dispatcher = ReactionDispatcher::new(
            ledger.clone(),
            directory.clone(),
            notifier.clone(),
            config.clone(),
        )?;

        Ok(Self {
            config,
            ledger,
            directory,
            notifier,
            registry: WorkerRegistry::new(ctx),
            dispatcher,
        })
    }

    pub fn config(&self) -> &DebtConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<DebtLedger> {
        &self.ledger
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    /// Handle one inbound reaction. Never fails.
    pub async fn handle_reaction(&self, event: &ReactionEvent) -> ReactionOutcome {
        self.dispatcher.handle_reaction(event).await
    }

    /// Start the order's reminder worker.
    pub async fn start_worker(&self, order_id: &str) -> Result<()> {
        self.registry.start(order_id).await
    }

    /// Create one debt per borrower share and start reminding.
    ///
    /// The lender's own share is skipped. Borrowers that cannot be resolved
    /// are announced in the rates thread and skipped; creation failures are
    /// logged and skipped.
    pub async fn track_order(&self, split: OrderSplit) -> Result<TrackingSummary> {
        let order_id = split.order_id.as_str();
        let mut summary = TrackingSummary {
            order_id: split.order_id.clone(),
            debts: Vec::new(),
            skipped: Vec::new(),
            worker_started: false,
        };

        let lender = match self.directory.get_user(&split.lender_id).await {
            Ok(lender) => lender,
            Err(e) => {
                warn!(order_id, lender_id = %split.lender_id, error = %e, "host not found, not tracking");
                self.inform_thread(&split, messages::lender_unknown(&split.lender_id, order_id))
                    .await;
                summary.skipped = split.shares.into_iter().map(|s| s.user_id).collect();
                return Ok(summary);
            }
        };

        let reactions = &self.config.reactions;
        self.inform_thread(
            &split,
            messages::tracking_started(
                &reactions.mark_paid,
                &lender.transport_id,
                &reactions.host_cancel,
                order_id,
            ),
        )
        .await;

        for share in &split.shares {
            if share.user_id == lender.id {
                continue;
            }

            let borrower = match self.directory.get_user(&share.user_id).await {
                Ok(borrower) => borrower,
                Err(e) => {
                    warn!(order_id, user_id = %share.user_id, error = %e, "borrower not found, not tracking");
                    self.inform_thread(&split, messages::borrower_unknown(&share.user_id))
                        .await;
                    summary.skipped.push(share.user_id.clone());
                    continue;
                }
            };

            match self
                .ledger
                .create_debt(
                    share.amount,
                    order_id,
                    &split.initiated_transport,
                    &split.message_id,
                    &borrower,
                    &lender,
                )
                .await
            {
                Ok(debt) => summary.debts.push(debt),
                Err(e) => {
                    error!(order_id, user_id = %borrower.id, error = %e, "creating debt failed");
                    summary.skipped.push(share.user_id.clone());
                }
            }
        }

        if summary.debts.is_empty() {
            info!(order_id, "no debts to track");
            return Ok(summary);
        }

        match self.registry.start(order_id).await {
            Ok(()) => summary.worker_started = true,
            // The live worker re-reads the store and picks the new debts up.
            Err(TallyError::WorkerAlreadyRunning { .. }) => {
                info!(order_id, "reminder worker already running");
            }
            Err(e) => return Err(e),
        }

        info!(order_id, debts = summary.debts.len(), "tracking order");
        Ok(summary)
    }

    /// Stop all reminder workers, keeping their debts.
    pub async fn shutdown(&self) {
        let stopped = self.registry.shutdown().await;
        info!(count = stopped.len(), "debt service stopped");
    }

    async fn inform_thread(&self, split: &OrderSplit, text: String) {
        self.notifier
            .send(
                Notification::new(split.initiated_transport.clone(), text)
                    .in_thread(split.message_id.clone()),
            )
            .await;
    }
}
