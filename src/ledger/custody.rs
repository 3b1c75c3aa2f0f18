// Currency-transfer collaborator: moves real funds in and out of the
// market's custody. The engine treats it as the only fallible external step.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::FundsError;
use crate::models::{Address, Amount};

/// Deposit/withdraw service with allowance semantics
pub trait CurrencyService: Send {
    /// Move `amount` from `from`'s wallet into custody, consuming allowance
    fn pull(&mut self, from: &Address, amount: Amount) -> Result<(), FundsError>;

    /// Pay `amount` out of custody into `to`'s wallet
    fn push(&mut self, to: &Address, amount: Amount) -> Result<(), FundsError>;

    /// Funds currently held in custody
    fn custody_balance(&self) -> Amount;
}

/// In-memory wallet bank used by the driver and tests
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryBank {
    wallets: BTreeMap<Address, Amount>,
    allowances: BTreeMap<Address, Amount>,
    custody: Amount,
}

impl InMemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit a wallet out of thin air (faucet)
    pub fn mint(&mut self, to: &Address, amount: Amount) {
        let balance = self.wallets.entry(to.clone()).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    /// Set the amount the market may pull from `owner`
    pub fn approve(&mut self, owner: &Address, amount: Amount) {
        self.allowances.insert(owner.clone(), amount);
    }

    pub fn balance_of(&self, owner: &Address) -> Amount {
        self.wallets.get(owner).copied().unwrap_or(0)
    }

    pub fn allowance(&self, owner: &Address) -> Amount {
        self.allowances.get(owner).copied().unwrap_or(0)
    }

    /// Mint and approve in one step
    pub fn fund(&mut self, owner: &Address, amount: Amount) {
        self.mint(owner, amount);
        let allowed = self.allowance(owner).saturating_add(amount);
        self.approve(owner, allowed);
    }
}

impl CurrencyService for InMemoryBank {
    fn pull(&mut self, from: &Address, amount: Amount) -> Result<(), FundsError> {
        let allowed = self.allowance(from);
        if allowed < amount {
            return Err(FundsError::InsufficientAllowance { allowed, requested: amount });
        }
        let available = self.balance_of(from);
        if available < amount {
            return Err(FundsError::InsufficientBalance { available, requested: amount });
        }
        let custody = self.custody.checked_add(amount).ok_or(FundsError::Overflow)?;

        self.allowances.insert(from.clone(), allowed - amount);
        self.wallets.insert(from.clone(), available - amount);
        self.custody = custody;
        Ok(())
    }

    fn push(&mut self, to: &Address, amount: Amount) -> Result<(), FundsError> {
        if self.custody < amount {
            return Err(FundsError::InsufficientBalance { available: self.custody, requested: amount });
        }
        let balance = self.balance_of(to).checked_add(amount).ok_or(FundsError::Overflow)?;

        self.custody -= amount;
        self.wallets.insert(to.clone(), balance);
        Ok(())
    }

    fn custody_balance(&self) -> Amount {
        self.custody
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pull_requires_allowance() {
        let mut bank = InMemoryBank::new();
        let alice = Address::from("alice");
        bank.mint(&alice, 100);

        let err = bank.pull(&alice, 50).unwrap_err();
        assert_eq!(err, FundsError::InsufficientAllowance { allowed: 0, requested: 50 });

        bank.approve(&alice, 60);
        bank.pull(&alice, 50).unwrap();
        assert_eq!(bank.balance_of(&alice), 50);
        assert_eq!(bank.allowance(&alice), 10);
        assert_eq!(bank.custody_balance(), 50);
    }

    #[test]
    fn test_pull_requires_balance() {
        let mut bank = InMemoryBank::new();
        let bob = Address::from("bob");
        bank.mint(&bob, 10);
        bank.approve(&bob, 1_000);

        let err = bank.pull(&bob, 11).unwrap_err();
        assert_eq!(err, FundsError::InsufficientBalance { available: 10, requested: 11 });
        // failed pull changes nothing
        assert_eq!(bank.balance_of(&bob), 10);
        assert_eq!(bank.allowance(&bob), 1_000);
    }

    #[test]
    fn test_push_pays_out_of_custody() {
        let mut bank = InMemoryBank::new();
        let alice = Address::from("alice");
        bank.fund(&alice, 100);
        bank.pull(&alice, 100).unwrap();

        bank.push(&alice, 40).unwrap();
        assert_eq!(bank.custody_balance(), 60);
        assert_eq!(bank.balance_of(&alice), 40);
        assert!(bank.push(&alice, 61).is_err());
    }
}
