//! Buy-in accounting.
//!
//! Balances live in an external account service. Rooms only need to
//! take a buy-in and pay it back out, so that service is reached through
//! the [`Ledger`] trait.

use std::collections::HashMap;

use tokio::sync::Mutex;
use unotable_protocol::{ErrorKind, PlayerId};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Insufficient funds for the buy-in")]
    InsufficientFunds,

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientFunds => ErrorKind::Capacity,
            Self::Unavailable(_) => ErrorKind::Internal,
        }
    }
}

/// Moves buy-in money in and out of player balances.
pub trait Ledger: Send + Sync + 'static {
    /// Takes `amount` from the player, or fails without taking anything.
    fn debit(
        &self,
        player: &PlayerId,
        amount: f64,
    ) -> impl std::future::Future<Output = Result<(), LedgerError>> + Send;

    /// Pays `amount` to the player.
    fn credit(
        &self,
        player: &PlayerId,
        amount: f64,
    ) -> impl std::future::Future<Output = Result<(), LedgerError>> + Send;
}

/// Accepts every debit. For free-play servers and development.
#[derive(Debug, Clone, Copy, Default)]
pub struct FreePlayLedger;

impl Ledger for FreePlayLedger {
    async fn debit(&self, _: &PlayerId, _: f64) -> Result<(), LedgerError> {
        Ok(())
    }

    async fn credit(&self, _: &PlayerId, _: f64) -> Result<(), LedgerError> {
        Ok(())
    }
}

/// Balances held in memory. Unknown players start at `opening_balance`.
#[derive(Debug)]
pub struct InMemoryLedger {
    balances: Mutex<HashMap<PlayerId, f64>>,
    opening_balance: f64,
}

impl InMemoryLedger {
    pub fn new(opening_balance: f64) -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            opening_balance,
        }
    }

    pub async fn balance(&self, player: &PlayerId) -> f64 {
        self.balances
            .lock()
            .await
            .get(player)
            .copied()
            .unwrap_or(self.opening_balance)
    }
}

impl Ledger for InMemoryLedger {
    async fn debit(
        &self,
        player: &PlayerId,
        amount: f64,
    ) -> Result<(), LedgerError> {
        let mut balances = self.balances.lock().await;
        let balance = balances
            .entry(player.clone())
            .or_insert(self.opening_balance);
        if *balance < amount {
            return Err(LedgerError::InsufficientFunds);
        }
        *balance -= amount;
        Ok(())
    }

    async fn credit(
        &self,
        player: &PlayerId,
        amount: f64,
    ) -> Result<(), LedgerError> {
        let mut balances = self.balances.lock().await;
        *balances
            .entry(player.clone())
            .or_insert(self.opening_balance) += amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_debit_reduces_balance() {
        let ledger = InMemoryLedger::new(10.0);
        let p = PlayerId::from("a");

        ledger.debit(&p, 4.0).await.unwrap();

        assert_eq!(ledger.balance(&p).await, 6.0);
    }

    #[tokio::test]
    async fn test_in_memory_debit_insufficient_leaves_balance() {
        let ledger = InMemoryLedger::new(3.0);
        let p = PlayerId::from("a");

        let result = ledger.debit(&p, 4.0).await;

        assert!(matches!(result, Err(LedgerError::InsufficientFunds)));
        assert_eq!(ledger.balance(&p).await, 3.0);
    }

    #[tokio::test]
    async fn test_in_memory_credit_adds() {
        let ledger = InMemoryLedger::new(0.0);
        let p = PlayerId::from("a");

        ledger.credit(&p, 2.5).await.unwrap();

        assert_eq!(ledger.balance(&p).await, 2.5);
    }
}
