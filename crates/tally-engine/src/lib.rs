//! # Tally Engine
//!
//! The debt lifecycle engine:
//! - [`DebtLedger`] - creates and removes debts, cancels orders
//! - [`ReminderWorker`] - one per active order, reminds and enforces the
//!   maximum tracking duration
//! - [`WorkerRegistry`] - at most one live worker per order
//! - [`ReactionDispatcher`] - maps mark-paid / host-cancel reactions to the
//!   ledger
//! - [`DebtService`] - the entry points used by the ingestion layer

pub mod dispatcher;
pub mod ledger;
pub mod messages;
pub mod operator;
pub mod registry;
pub mod service;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::{IgnoreReason, ReactionDispatcher, ReactionOutcome};
pub use ledger::{CancelReason, DebtLedger};
pub use operator::OperatorReporter;
pub use registry::WorkerRegistry;
pub use service::{DebtService, OrderSplit, Share, TrackingSummary};
pub use worker::{Reminder, ReminderWorker, TickOutcome, WorkerContext};
