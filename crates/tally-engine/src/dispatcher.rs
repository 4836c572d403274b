//! Reaction dispatch.
//!
//! Maps inbound reactions on the system's own rates messages to ledger
//! mutations. The dispatcher is the outermost boundary for reaction
//! handling: every failure is logged and reported, never returned, so the
//! platform does not redeliver the event.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tally_core::{
    DebtConfig, Notification, OrderMatch, OrderPattern, ReactionEvent, ReactionKind, Result,
    TallyError,
};
use tally_state::{Notifier, UserDirectory};
use tracing::{debug, info, warn};

use crate::ledger::{CancelReason, DebtLedger};
use crate::messages;
use crate::operator::OperatorReporter;

/// Why a reaction was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Not one of the recognized reactions.
    UnrecognizedReaction,
    /// The reacted-to message was not written by the system.
    ForeignMessage,
    /// The reacted-to message does not reference an order.
    NotAnOrderMessage,
}

/// What handling a reaction did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReactionOutcome {
    Ignored { reason: IgnoreReason },
    /// One debt of the reacting borrower was removed.
    MarkedPaid { order_id: String, debt_id: String },
    /// The order has no debt the reaction applies to.
    NothingToDo { order_id: String },
    /// The host cancelled the order.
    Cancelled { order_id: String, removed: usize },
    /// A non-host tried to cancel the order.
    PermissionDenied { order_id: String },
    /// Handling failed; already logged and reported.
    Failed { message: String },
}

/// Routes reactions to the ledger.
pub struct ReactionDispatcher {
    ledger: Arc<DebtLedger>,
    directory: Arc<dyn UserDirectory>,
    notifier: Arc<dyn Notifier>,
    config: Arc<DebtConfig>,
    pattern: OrderPattern,
    operator: OperatorReporter,
}

impl ReactionDispatcher {
    pub fn new(
        ledger: Arc<DebtLedger>,
        directory: Arc<dyn UserDirectory>,
        notifier: Arc<dyn Notifier>,
        config: Arc<DebtConfig>,
    ) -> Result<Self> {
        let pattern = config.order_pattern()?;
        let operator = OperatorReporter::new(notifier.clone(), config.operator_transport_id.clone());
        Ok(Self {
            ledger,
            directory,
            notifier,
            config,
            pattern,
            operator,
        })
    }

    /// Handle one reaction event. Never fails.
    pub async fn handle_reaction(&self, event: &ReactionEvent) -> ReactionOutcome {
        match self.dispatch(event).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.operator
                    .report(&format!("handling :{}: reaction", event.reaction), &e)
                    .await;
                ReactionOutcome::Failed {
                    message: e.to_string(),
                }
            }
        }
    }

    async fn dispatch(&self, event: &ReactionEvent) -> Result<ReactionOutcome> {
        // Reactions arrive for every message; only our own count.
        let Some(kind) = self.config.reactions.classify(&event.reaction) else {
            return Ok(ReactionOutcome::Ignored {
                reason: IgnoreReason::UnrecognizedReaction,
            });
        };
        if event.message_user_id != self.config.self_id {
            return Ok(ReactionOutcome::Ignored {
                reason: IgnoreReason::ForeignMessage,
            });
        }

        let order_id = match self.pattern.extract(&event.message_text) {
            OrderMatch::Order(order_id) => order_id,
            OrderMatch::NoMatch => {
                debug!("reaction on a message without an order id, ignoring");
                return Ok(ReactionOutcome::Ignored {
                    reason: IgnoreReason::NotAnOrderMessage,
                });
            }
            OrderMatch::MalformedInput(message) => {
                return Err(TallyError::MalformedInput { message });
            }
        };

        match kind {
            ReactionKind::MarkPaid => self.mark_paid(&order_id, event).await,
            ReactionKind::HostCancel => self.host_cancel(&order_id, event).await,
        }
    }

    /// Remove the first debt of the order owed by the reacting user.
    async fn mark_paid(&self, order_id: &str, event: &ReactionEvent) -> Result<ReactionOutcome> {
        let debts = self.ledger.list_debts_for_order(order_id).await?;

        for debt in debts {
            let borrower = match self.directory.get_user(&debt.borrower_id).await {
                Ok(borrower) => borrower,
                Err(e) => {
                    warn!(order_id, borrower_id = %debt.borrower_id, error = %e, "borrower lookup failed");
                    continue;
                }
            };
            if borrower.transport_id != event.from_user_id {
                continue;
            }

            if !self.ledger.remove_debt(order_id, &debt.id).await? {
                // A concurrent mutation got there first.
                continue;
            }
            info!(order_id, debt_id = %debt.id, borrower = %borrower.id, "debt marked as paid");

            self.notifier
                .send(Notification::new(
                    borrower.transport_id.clone(),
                    messages::debt_removed(order_id),
                ))
                .await;

            let text = messages::marked_paid(&borrower.transport_id, order_id);
            let notice = match self.directory.get_user(&debt.lender_id).await {
                Ok(lender) => Notification::new(lender.transport_id, text),
                Err(e) => {
                    warn!(order_id, lender_id = %debt.lender_id, error = %e, "lender lookup failed, notifying origin channel");
                    Notification::new(event.channel.clone(), text).in_thread(debt.message_id.clone())
                }
            };
            self.notifier.send(notice).await;

            return Ok(ReactionOutcome::MarkedPaid {
                order_id: order_id.to_string(),
                debt_id: debt.id,
            });
        }

        Ok(ReactionOutcome::NothingToDo {
            order_id: order_id.to_string(),
        })
    }

    /// Cancel the whole order if the reacting user is its host.
    async fn host_cancel(&self, order_id: &str, event: &ReactionEvent) -> Result<ReactionOutcome> {
        let Some(host_id) = self.ledger.host_for_order(order_id).await? else {
            return Ok(ReactionOutcome::NothingToDo {
                order_id: order_id.to_string(),
            });
        };

        let host = self.directory.get_user(&host_id).await?;
        if host.transport_id != event.from_user_id {
            info!(order_id, from = %event.from_user_id, "non-host tried to cancel order");
            self.notifier
                .send(Notification::new(
                    event.from_user_id.clone(),
                    messages::host_only(&host.transport_id),
                ))
                .await;
            return Ok(ReactionOutcome::PermissionDenied {
                order_id: order_id.to_string(),
            });
        }

        let removed = self
            .ledger
            .cancel_order(order_id, CancelReason::HostRequested)
            .await?;
        Ok(ReactionOutcome::Cancelled {
            order_id: order_id.to_string(),
            removed,
        })
    }
}
