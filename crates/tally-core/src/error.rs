//! Error types for Tally.

use thiserror::Error;

/// Main error type for Tally operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TallyError {
    /// Debt store read or write failed.
    #[error("Debt store error: {message}")]
    Store { message: String },

    /// A user profile could not be resolved.
    #[error("User lookup failed for {user_id}: {message}")]
    DirectoryLookup { user_id: String, message: String },

    /// A debt violates its invariants (non-positive amount, self-debt).
    #[error("Invalid debt: {message}")]
    InvalidDebt { message: String },

    /// An order already tracks debts owed to another lender.
    #[error("Order {order_id} is owed to {existing}, refusing debt owed to {requested}")]
    LenderConflict {
        order_id: String,
        existing: String,
        requested: String,
    },

    /// Message text matched the order marker but the order id is unusable.
    #[error("Malformed order reference: {message}")]
    MalformedInput { message: String },

    /// Configuration rejected at startup.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The borrower already owes a debt for the order.
    #[error("Borrower {borrower_id} already has a debt in order {order_id}")]
    DuplicateDebt { order_id: String, borrower_id: String },

    /// A reminder worker is already live for the order.
    #[error("Reminder worker already running for order {order_id}")]
    WorkerAlreadyRunning { order_id: String },
}

impl TallyError {
    /// Create a store error from any displayable cause.
    pub fn store(message: impl Into<String>) -> Self {
        TallyError::Store {
            message: message.into(),
        }
    }

    /// Create a directory lookup error for a user id.
    pub fn lookup(user_id: impl Into<String>, message: impl Into<String>) -> Self {
        TallyError::DirectoryLookup {
            user_id: user_id.into(),
            message: message.into(),
        }
    }

    /// Returns true if retrying on the next cycle may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TallyError::Store { .. } | TallyError::DirectoryLookup { .. }
        )
    }
}

/// Convenience Result type for Tally operations.
pub type Result<T> = std::result::Result<T, TallyError>;

impl From<regex::Error> for TallyError {
    fn from(err: regex::Error) -> Self {
        TallyError::InvalidConfig {
            message: format!("order pattern: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(TallyError::store("disk full").is_transient());
        assert!(TallyError::lookup("u1", "timeout").is_transient());
        assert!(!TallyError::InvalidDebt {
            message: "self-debt".into()
        }
        .is_transient());
        assert!(!TallyError::DuplicateDebt {
            order_id: "ABC123".into(),
            borrower_id: "b1".into()
        }
        .is_transient());
        assert!(!TallyError::WorkerAlreadyRunning {
            order_id: "ABC123".into()
        }
        .is_transient());
    }

    #[test]
    fn test_display() {
        let err = TallyError::LenderConflict {
            order_id: "ABC123".into(),
            existing: "lender-a".into(),
            requested: "lender-b".into(),
        };
        assert_eq!(
            err.to_string(),
            "Order ABC123 is owed to lender-a, refusing debt owed to lender-b"
        );
    }
}
