//! # Tally Core
//!
//! Core primitives and types for Tally, the group-order debt tracker.
//!
//! This crate provides the fundamental building blocks:
//! - [`Debt`] - One borrower's share owed to the lender of an order
//! - [`User`] - A resolved chat-platform profile
//! - [`DebtConfig`] - Startup configuration injected into the engine
//! - [`OrderPattern`] - Extraction of order ids from message text
//! - [`TallyError`] - Error types

pub mod clock;
pub mod config;
pub mod debt;
pub mod error;
pub mod order_ref;
pub mod timezone;
pub mod types;

// Re-exports for convenience
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{DebtConfig, QuietHours, ReactionNames};
pub use debt::Debt;
pub use error::{Result, TallyError};
pub use order_ref::{OrderMatch, OrderPattern};
pub use timezone::{resolve_timezone, TimezoneResolution};
pub use types::*;

