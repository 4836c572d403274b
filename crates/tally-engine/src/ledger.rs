//! Debt ledger: the only component that mutates debt records.

use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_core::{Debt, Notification, Result, User};
use tally_state::{DebtStore, Notifier, UserDirectory};
use tracing::{info, warn};

use crate::messages;

/// Why every debt of an order was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The host reacted with the cancel reaction.
    HostRequested,
    /// The order's maximum tracking duration elapsed.
    TimeoutReached,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::HostRequested => f.write_str("host requested cancellation"),
            CancelReason::TimeoutReached => f.write_str("timeout reached"),
        }
    }
}

/// Creates, lists and removes debts on top of a [`DebtStore`].
///
/// Orders are single-lender: the lender of an order is whichever lender its
/// debts name, and creating a debt owed to anyone else is refused. A borrower
/// owes at most one debt per order.
pub struct DebtLedger {
    store: Arc<dyn DebtStore>,
    directory: Arc<dyn UserDirectory>,
    notifier: Arc<dyn Notifier>,
}

impl DebtLedger {
    pub fn new(
        store: Arc<dyn DebtStore>,
        directory: Arc<dyn UserDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            directory,
            notifier,
        }
    }

    /// Record that `borrower` owes `lender` `amount` for an order.
    pub async fn create_debt(
        &self,
        amount: Decimal,
        order_id: &str,
        initiated_transport: &str,
        message_id: &str,
        borrower: &User,
        lender: &User,
    ) -> Result<Debt> {
        let debt = Debt::new(
            order_id,
            &borrower.id,
            &lender.id,
            amount,
            initiated_transport,
            message_id,
        )?;

        self.store.create_debt_checked(debt.clone()).await?;
        info!(
            order_id,
            debt_id = %debt.id,
            borrower = %borrower.id,
            amount = %debt.amount,
            "debt created"
        );
        Ok(debt)
    }

    /// Debts of an order in insertion order; empty if none.
    pub async fn list_debts_for_order(&self, order_id: &str) -> Result<Vec<Debt>> {
        self.store.list_debts_for_order(order_id).await
    }

    /// Remove one debt. Returns `false` if it was already gone.
    pub async fn remove_debt(&self, order_id: &str, debt_id: &str) -> Result<bool> {
        let removed = self.store.remove_debt(order_id, debt_id).await?;
        if !removed {
            warn!(order_id, debt_id, "debt already removed");
        }
        Ok(removed)
    }

    /// Lender of the order's first debt, or `None` if nothing is tracked.
    pub async fn host_for_order(&self, order_id: &str) -> Result<Option<String>> {
        let debts = self.store.list_debts_for_order(order_id).await?;
        Ok(debts.into_iter().next().map(|d| d.lender_id))
    }

    /// Remove every debt of the order and tell the lender why.
    ///
    /// Returns the number of debts removed. Concurrent calls for the same
    /// order converge: only the call that drained debts notifies.
    pub async fn cancel_order(&self, order_id: &str, reason: CancelReason) -> Result<usize> {
        let removed = self.store.take_debts_for_order(order_id).await?;
        let Some(first) = removed.first() else {
            return Ok(0);
        };

        info!(order_id, count = removed.len(), %reason, "order cancelled");

        let text = messages::order_cancelled(order_id, &reason.to_string());
        let notification = match self.directory.get_user(&first.lender_id).await {
            Ok(lender) => Notification::new(lender.transport_id, text),
            Err(e) => {
                warn!(order_id, error = %e, "lender lookup failed, notifying origin channel");
                Notification::new(first.initiated_transport.clone(), text)
                    .in_thread(first.message_id.clone())
            }
        };
        self.notifier.send(notification).await;

        Ok(removed.len())
    }
}
