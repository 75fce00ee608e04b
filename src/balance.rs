use std::sync::Arc;

use crate::amount::Amount;
use crate::errors::LedgerResult;
use crate::storage::{COLLECTION_BALANCES, Store};
use crate::types::Balance;

/// Balance access keyed by the canonical `owner_element` id, which is also
/// the semaphore name guarding mutations.
pub struct BalanceStore {
    store: Arc<Store>,
    seed: Amount,
}

impl BalanceStore {
    pub fn new(store: Arc<Store>, seed: Amount) -> Self {
        Self { store, seed }
    }

    pub fn build_id(owner: &str, element: &str) -> String {
        format!("{owner}_{element}")
    }

    /// Returns the stored balance, or a synthesized record carrying the
    /// configured seed amount. The synthesized record is not persisted until
    /// the first `set`.
    pub fn get(&self, owner: &str, element: &str) -> LedgerResult<Balance> {
        let id = Self::build_id(owner, element);
        match self.store.get_doc::<Balance>(COLLECTION_BALANCES, &id)? {
            Some(balance) => Ok(balance),
            None => Ok(Balance {
                id,
                owner: owner.to_string(),
                element: element.to_string(),
                amount: self.seed.clone(),
            }),
        }
    }

    /// Upserts the balance with a new amount. Callers must hold the
    /// `owner_element` semaphore.
    pub fn set(&self, balance: &mut Balance, amount: Amount) -> LedgerResult<()> {
        balance.amount = amount;
        self.store.put_doc(COLLECTION_BALANCES, &balance.id, balance)
    }

    pub fn has_balance(&self, owner: &str, element: &str, amount: &Amount) -> LedgerResult<bool> {
        Ok(self.get(owner, element)?.amount >= *amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn absent_balance_carries_seed_without_persisting() {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path()).unwrap());
        let balances = BalanceStore::new(store.clone(), Amount::from_u64(10_000));
        let balance = balances.get("alice", "nsh").unwrap();
        assert_eq!(balance.amount, Amount::from_u64(10_000));
        assert!(
            store
                .get_doc::<Balance>(COLLECTION_BALANCES, "alice_nsh")
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn set_persists_under_the_canonical_id() {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path()).unwrap());
        let balances = BalanceStore::new(store, Amount::zero());
        let mut balance = balances.get("alice", "nsh").unwrap();
        balances.set(&mut balance, Amount::from_u64(250)).unwrap();
        let reloaded = balances.get("alice", "nsh").unwrap();
        assert_eq!(reloaded.amount, Amount::from_u64(250));
        assert_eq!(reloaded.id, "alice_nsh");
    }

    #[test]
    fn has_balance_compares_amounts() {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path()).unwrap());
        let balances = BalanceStore::new(store, Amount::zero());
        let mut balance = balances.get("bob", "nsh").unwrap();
        balances.set(&mut balance, Amount::parse("100.5").unwrap()).unwrap();
        assert!(balances.has_balance("bob", "nsh", &Amount::from_u64(100)).unwrap());
        assert!(!balances.has_balance("bob", "nsh", &Amount::from_u64(101)).unwrap());
    }
}
