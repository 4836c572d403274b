//! Debt store implementations.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tally_core::{Debt, Result, TallyError};
use tokio::sync::RwLock;

/// Durable storage of debt records, keyed by order id.
///
/// Implementations must be safe to call concurrently from every reminder
/// worker and the reaction dispatcher.
#[async_trait]
pub trait DebtStore: Send + Sync {
    /// Persist a new debt.
    async fn create_debt(&self, debt: Debt) -> Result<()>;

    /// Persist a new debt if it fits its order: same lender as the debts
    /// already there, and no other debt for the same borrower.
    ///
    /// The default implementation lists then inserts; stores that can make
    /// the check and the insert atomic should override it.
    async fn create_debt_checked(&self, debt: Debt) -> Result<()> {
        let order = self.list_debts_for_order(&debt.order_id).await?;
        debt.check_against(&order)?;
        self.create_debt(debt).await
    }

    /// All debts of an order, in insertion order.
    async fn list_debts_for_order(&self, order_id: &str) -> Result<Vec<Debt>>;

    /// Remove one debt. Returns `false` if it was already gone.
    async fn remove_debt(&self, order_id: &str, debt_id: &str) -> Result<bool>;

    /// Remove and return every debt of an order.
    ///
    /// Only debts actually removed by this call are returned, so concurrent
    /// drains of the same order never both observe the same debt.
    async fn take_debts_for_order(&self, order_id: &str) -> Result<Vec<Debt>> {
        let mut taken = Vec::new();
        for debt in self.list_debts_for_order(order_id).await? {
            if self.remove_debt(order_id, &debt.id).await? {
                taken.push(debt);
            }
        }
        Ok(taken)
    }

    /// Ids of orders that still have debts.
    async fn orders(&self) -> Result<Vec<String>>;
}

/// In-memory implementation of DebtStore.
#[derive(Clone, Default)]
pub struct InMemoryDebtStore {
    /// order_id -> debts in insertion order.
    debts: Arc<RwLock<HashMap<String, Vec<Debt>>>>,
}

impl InMemoryDebtStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of debts across all orders.
    pub async fn len(&self) -> usize {
        self.debts.read().await.values().map(Vec::len).sum()
    }

    /// Returns true if no debts are stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl DebtStore for InMemoryDebtStore {
    async fn create_debt(&self, debt: Debt) -> Result<()> {
        let mut debts = self.debts.write().await;
        let order = debts.entry(debt.order_id.clone()).or_default();

        if order.iter().any(|d| d.id == debt.id) {
            return Err(TallyError::store(format!(
                "debt {} already exists in order {}",
                debt.id, debt.order_id
            )));
        }

        order.push(debt);
        Ok(())
    }

    async fn create_debt_checked(&self, debt: Debt) -> Result<()> {
        let mut debts = self.debts.write().await;
        if let Some(order) = debts.get(&debt.order_id) {
            debt.check_against(order)?;
        }
        debts.entry(debt.order_id.clone()).or_default().push(debt);
        Ok(())
    }

    async fn list_debts_for_order(&self, order_id: &str) -> Result<Vec<Debt>> {
        let debts = self.debts.read().await;
        Ok(debts.get(order_id).cloned().unwrap_or_default())
    }

    async fn remove_debt(&self, order_id: &str, debt_id: &str) -> Result<bool> {
        let mut debts = self.debts.write().await;

        let Some(order) = debts.get_mut(order_id) else {
            return Ok(false);
        };
        let before = order.len();
        order.retain(|d| d.id != debt_id);
        let removed = order.len() < before;

        if order.is_empty() {
            debts.remove(order_id);
        }

        Ok(removed)
    }

    async fn take_debts_for_order(&self, order_id: &str) -> Result<Vec<Debt>> {
        let mut debts = self.debts.write().await;
        Ok(debts.remove(order_id).unwrap_or_default())
    }

    async fn orders(&self) -> Result<Vec<String>> {
        let debts = self.debts.read().await;
        let mut orders: Vec<String> = debts.keys().cloned().collect();
        orders.sort();
        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn debt(order: &str, borrower: &str) -> Debt {
        owed_to(order, borrower, "lender")
    }

    fn owed_to(order: &str, borrower: &str, lender: &str) -> Debt {
        Debt::new(order, borrower, lender, dec!(12.50), "C1", "m1").unwrap()
    }

    #[tokio::test]
    async fn test_create_and_list_in_insertion_order() {
        let store = InMemoryDebtStore::new();

        for borrower in ["b3", "b1", "b2"] {
            store.create_debt(debt("ABC123", borrower)).await.unwrap();
        }
        store.create_debt(debt("OTHER", "b1")).await.unwrap();

        let listed = store.list_debts_for_order("ABC123").await.unwrap();
        let borrowers: Vec<&str> = listed.iter().map(|d| d.borrower_id.as_str()).collect();
        assert_eq!(borrowers, vec!["b3", "b1", "b2"]);
        assert_eq!(store.len().await, 4);
    }

    #[tokio::test]
    async fn test_list_unknown_order_is_empty() {
        let store = InMemoryDebtStore::new();
        assert!(store.list_debts_for_order("NOPE").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let store = InMemoryDebtStore::new();
        let d = debt("ABC123", "b1");

        store.create_debt(d.clone()).await.unwrap();
        let err = store.create_debt(d).await.unwrap_err();
        assert!(matches!(err, TallyError::Store { .. }));
    }

    #[tokio::test]
    async fn test_checked_create_keeps_one_debt_per_borrower() {
        let store = InMemoryDebtStore::new();
        store.create_debt_checked(debt("ABC123", "b1")).await.unwrap();

        let err = store
            .create_debt_checked(debt("ABC123", "b1"))
            .await
            .unwrap_err();
        assert!(matches!(err, TallyError::DuplicateDebt { .. }));

        // Same borrower in another order is fine.
        store.create_debt_checked(debt("OTHER", "b1")).await.unwrap();
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_checked_creates_keep_one_lender() {
        let store = InMemoryDebtStore::new();

        let (a, b) = tokio::join!(
            store.create_debt_checked(owed_to("ABC123", "b1", "lender-a")),
            store.create_debt_checked(owed_to("ABC123", "b2", "lender-b")),
        );
        assert!(a.is_ok() != b.is_ok());
        assert!(matches!(
            a.err().or(b.err()),
            Some(TallyError::LenderConflict { .. })
        ));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove_tolerates_missing() {
        let store = InMemoryDebtStore::new();
        let d = debt("ABC123", "b1");
        store.create_debt(d.clone()).await.unwrap();

        assert!(store.remove_debt("ABC123", &d.id).await.unwrap());
        assert!(!store.remove_debt("ABC123", &d.id).await.unwrap());
        assert!(!store.remove_debt("NOPE", "x").await.unwrap());
        assert!(store.is_empty().await);
        assert!(store.orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_take_drains_once() {
        let store = InMemoryDebtStore::new();
        store.create_debt(debt("ABC123", "b1")).await.unwrap();
        store.create_debt(debt("ABC123", "b2")).await.unwrap();
        store.create_debt(debt("KEEP", "b1")).await.unwrap();

        let taken = store.take_debts_for_order("ABC123").await.unwrap();
        assert_eq!(taken.len(), 2);
        assert!(store.take_debts_for_order("ABC123").await.unwrap().is_empty());
        assert_eq!(store.orders().await.unwrap(), vec!["KEEP".to_string()]);
    }
}
