//! Per-order reminder worker.
//!
//! A worker owns nothing but its order id. Every interval tick it re-reads
//! the order's debts from the ledger and reminds each borrower outside their
//! quiet hours. It terminates when the order has no debts left, when the
//! maximum tracking duration elapses (cancelling the order), or when it is
//! told to stop.

use std::sync::Arc;

use chrono_tz::Tz;
use tally_core::timezone::{local_hour, resolve_timezone};
use tally_core::{Clock, Debt, DebtConfig, Notification, Result, Termination, TimezoneResolution};
use tally_state::{Notifier, UserDirectory};
use tokio::sync::watch;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::ledger::{CancelReason, DebtLedger};
use crate::messages;
use crate::operator::OperatorReporter;

/// Dependencies shared by every worker.
#[derive(Clone)]
pub struct WorkerContext {
    pub ledger: Arc<DebtLedger>,
    pub directory: Arc<dyn UserDirectory>,
    pub notifier: Arc<dyn Notifier>,
    pub config: Arc<DebtConfig>,
    pub clock: Arc<dyn Clock>,
    pub operator: OperatorReporter,
    default_tz: Tz,
}

impl WorkerContext {
    pub fn new(
        ledger: Arc<DebtLedger>,
        directory: Arc<dyn UserDirectory>,
        notifier: Arc<dyn Notifier>,
        config: Arc<DebtConfig>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let default_tz = config.default_tz()?;
        let operator = OperatorReporter::new(notifier.clone(), config.operator_transport_id.clone());
        Ok(Self {
            ledger,
            directory,
            notifier,
            config,
            clock,
            operator,
            default_tz,
        })
    }
}

/// What one reminder attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reminder {
    Sent,
    /// Borrower is inside their quiet hours.
    Suppressed,
}

/// Result of one interval tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The order has no debts left.
    Exhausted,
    /// Debts were listed and each borrower handled.
    Reminded {
        sent: usize,
        suppressed: usize,
        failed: usize,
    },
    /// Listing debts failed; retried next tick.
    ListFailed,
}

/// Reminder worker for a single order.
pub struct ReminderWorker {
    order_id: String,
    ctx: WorkerContext,
}

impl ReminderWorker {
    pub fn new(order_id: impl Into<String>, ctx: WorkerContext) -> Self {
        Self {
            order_id: order_id.into(),
            ctx,
        }
    }

    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    /// Run until the order is exhausted, times out, or `stop` flips to true.
    ///
    /// When interval and deadline fire together the tick runs first, so a
    /// duration that is a multiple of the interval still gets its last cycle.
    pub async fn run(self, mut stop: watch::Receiver<bool>) -> Termination {
        let start = Instant::now();
        let period = self.ctx.config.reminder_interval();
        let mut ticker = interval_at(start + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let deadline = sleep_until(start + self.ctx.config.max_duration());
        tokio::pin!(deadline);

        info!(order_id = %self.order_id, "reminder worker started");

        let termination = loop {
            tokio::select! {
                biased;

                _ = ticker.tick() => {
                    if self.tick().await == TickOutcome::Exhausted {
                        break Termination::DebtsCleared;
                    }
                }
                _ = &mut deadline => {
                    if let Err(e) = self
                        .ctx
                        .ledger
                        .cancel_order(&self.order_id, CancelReason::TimeoutReached)
                        .await
                    {
                        self.ctx
                            .operator
                            .report(&format!("cancelling timed out order {}", self.order_id), &e)
                            .await;
                    }
                    break Termination::TimedOut;
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break Termination::Stopped;
                    }
                }
            }
        };

        info!(order_id = %self.order_id, ?termination, "reminder worker terminated");
        termination
    }

    /// One reminder cycle over the order's current debts.
    pub async fn tick(&self) -> TickOutcome {
        let debts = match self.ctx.ledger.list_debts_for_order(&self.order_id).await {
            Ok(debts) => debts,
            Err(e) => {
                self.ctx
                    .operator
                    .report(&format!("listing debts of order {}", self.order_id), &e)
                    .await;
                return TickOutcome::ListFailed;
            }
        };

        if debts.is_empty() {
            return TickOutcome::Exhausted;
        }

        let (mut sent, mut suppressed, mut failed) = (0, 0, 0);
        for debt in &debts {
            match self.remind(debt).await {
                Ok(Reminder::Sent) => sent += 1,
                Ok(Reminder::Suppressed) => suppressed += 1,
                Err(e) => {
                    failed += 1;
                    self.ctx
                        .operator
                        .report(&format!("reminding debt {} of order {}", debt.id, debt.order_id), &e)
                        .await;
                }
            }
        }

        debug!(order_id = %self.order_id, sent, suppressed, failed, "reminder cycle done");
        TickOutcome::Reminded {
            sent,
            suppressed,
            failed,
        }
    }

    async fn remind(&self, debt: &Debt) -> Result<Reminder> {
        let borrower = self.ctx.directory.get_user(&debt.borrower_id).await?;

        let tz = match resolve_timezone(borrower.timezone.as_deref()) {
            TimezoneResolution::Resolved(tz) => tz,
            TimezoneResolution::Unspecified => self.ctx.default_tz,
            TimezoneResolution::Invalid(name) => {
                warn!(user_id = %borrower.id, timezone = %name, "unknown timezone, using default");
                self.ctx.default_tz
            }
        };

        let hour = local_hour(self.ctx.clock.now(), tz);
        if self.ctx.config.quiet_hours.contains(hour) {
            debug!(
                user_id = %borrower.id,
                name = %borrower.full_name,
                %tz,
                hour,
                "quiet hours, not reminding"
            );
            return Ok(Reminder::Suppressed);
        }

        // The mention degrades to the raw id if the lender is gone.
        let lender_transport = match self.ctx.directory.get_user(&debt.lender_id).await {
            Ok(lender) => lender.transport_id,
            Err(_) => debt.lender_id.clone(),
        };

        let mark_paid = &self.ctx.config.reactions.mark_paid;
        let text = messages::reminder(
            debt.display_amount(),
            &self.ctx.config.currency,
            &lender_transport,
            &debt.order_id,
            mark_paid,
        );
        self.ctx
            .notifier
            .send(Notification::new(borrower.transport_id, text).with_reaction(mark_paid.clone()))
            .await;

        Ok(Reminder::Sent)
    }
}
