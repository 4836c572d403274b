//! The debt record.
//!
//! A debt is immutable once created: it is only ever added to or removed
//! from the store.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TallyError};

/// One borrower's share of an order, owed to the order's lender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Debt {
    /// Identifier, unique within the order.
    pub id: String,

    /// Order this debt belongs to.
    pub order_id: String,

    /// Internal user id of the borrower.
    pub borrower_id: String,

    /// Internal user id of the lender (the order's host).
    pub lender_id: String,

    /// Amount owed, always positive.
    pub amount: Decimal,

    /// Message that announced the order's rates.
    pub message_id: String,

    /// Transport (channel) the order was initiated from.
    pub initiated_transport: String,

    /// When the debt was recorded.
    pub created_at: DateTime<Utc>,
}

impl Debt {
    /// Create a validated debt with a fresh id.
    pub fn new(
        order_id: impl Into<String>,
        borrower_id: impl Into<String>,
        lender_id: impl Into<String>,
        amount: Decimal,
        initiated_transport: impl Into<String>,
        message_id: impl Into<String>,
    ) -> Result<Self> {
        let debt = Self {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.into(),
            borrower_id: borrower_id.into(),
            lender_id: lender_id.into(),
            amount,
            message_id: message_id.into(),
            initiated_transport: initiated_transport.into(),
            created_at: Utc::now(),
        };
        debt.validate()?;
        Ok(debt)
    }

    /// Check the record's invariants.
    pub fn validate(&self) -> Result<()> {
        if self.order_id.is_empty() {
            return Err(TallyError::InvalidDebt {
                message: "order id is empty".to_string(),
            });
        }
        if self.amount <= Decimal::ZERO {
            return Err(TallyError::InvalidDebt {
                message: format!("amount must be positive, got {}", self.amount),
            });
        }
        if self.borrower_id == self.lender_id {
            return Err(TallyError::InvalidDebt {
                message: format!("{} cannot owe themselves", self.borrower_id),
            });
        }
        Ok(())
    }

    /// Check that this debt can join an order already holding `order`.
    ///
    /// Orders have a single lender and at most one debt per borrower.
    pub fn check_against(&self, order: &[Debt]) -> Result<()> {
        if let Some(first) = order.first() {
            if first.lender_id != self.lender_id {
                return Err(TallyError::LenderConflict {
                    order_id: self.order_id.clone(),
                    existing: first.lender_id.clone(),
                    requested: self.lender_id.clone(),
                });
            }
        }
        if order.iter().any(|d| d.borrower_id == self.borrower_id) {
            return Err(TallyError::DuplicateDebt {
                order_id: self.order_id.clone(),
                borrower_id: self.borrower_id.clone(),
            });
        }
        Ok(())
    }

    /// Amount rounded for display.
    pub fn display_amount(&self) -> Decimal {
        self.amount.round_dp(2)
    }
}
