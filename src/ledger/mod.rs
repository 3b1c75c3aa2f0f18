// ============================================================================
// Fee Ledger - accumulated balances awaiting withdrawal
// ============================================================================
//
// Every payment that enters custody is either credited to an accumulated
// balance, credited to the treasury, or held as pool escrow. Balances only
// grow through settlement and drop to zero on claim.
//
// Conservation:
//   sum(balances) + treasury + escrow == paid_in - paid_out
//
// ============================================================================

pub mod custody;
pub mod settlement;

pub use custody::*;
pub use settlement::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::errors::{StateError, ValidationError};
use crate::models::{Address, Amount};

/// Per-account accumulated balances plus treasury and custody totals
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeeLedger {
    balances: BTreeMap<Address, Amount>,
    treasury: Amount,
    /// Every amount ever pulled into custody
    paid_in: u128,
    /// Every amount ever pushed out of custody
    paid_out: u128,
    /// Settlements applied so far, the source of settlement ids
    #[serde(default)]
    settlements: u64,
}

impl FeeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, address: &Address) -> Amount {
        self.balances.get(address).copied().unwrap_or(0)
    }

    pub fn treasury_balance(&self) -> Amount {
        self.treasury
    }

    /// Sum of all account balances, excluding treasury
    pub fn total_accumulated(&self) -> u128 {
        self.balances.values().map(|b| *b as u128).sum()
    }

    pub fn paid_in(&self) -> u128 {
        self.paid_in
    }

    pub fn paid_out(&self) -> u128 {
        self.paid_out
    }

    /// Accounts holding a non-zero balance, sorted by address
    pub fn accounts(&self) -> Vec<(Address, Amount)> {
        self.balances
            .iter()
            .filter(|(_, b)| **b > 0)
            .map(|(a, b)| (a.clone(), *b))
            .collect()
    }

    /// Record funds that entered custody
    pub fn record_inflow(&mut self, amount: Amount) {
        self.paid_in += amount as u128;
    }

    /// Record funds that left custody
    pub fn record_outflow(&mut self, amount: Amount) {
        self.paid_out += amount as u128;
    }

    /// Settle a payment across basis-point shares and credit every line
    pub fn settle(&mut self, amount: Amount, shares: &[ShareLine]) -> Result<Settlement, ValidationError> {
        let mut plan = plan_by_shares(amount, shares)?;
        self.apply(&mut plan);
        Ok(plan)
    }

    /// Credit a planned settlement and stamp its id. Infallible so nothing
    /// partial is observable.
    pub fn apply(&mut self, settlement: &mut Settlement) {
        self.settlements += 1;
        settlement.id = settlement_id(self.settlements);

        for (recipient, amount) in &settlement.credits {
            self.credit(recipient, *amount);
        }
        self.treasury = self.treasury.saturating_add(settlement.remainder);
        debug!(
            settlement_id = %settlement.id,
            amount = settlement.amount,
            remainder = settlement.remainder,
            "settlement applied"
        );
    }

    fn credit(&mut self, recipient: &Recipient, amount: Amount) {
        match recipient {
            Recipient::Treasury => self.treasury = self.treasury.saturating_add(amount),
            Recipient::Account(address) => {
                let balance = self.balances.entry(address.clone()).or_insert(0);
                *balance = balance.saturating_add(amount);
            }
        }
    }

    /// Balance that `claim` would pay out, or `NoFeesToClaim`
    pub fn claimable(&self, address: &Address) -> Result<Amount, StateError> {
        match self.balance(address) {
            0 => Err(StateError::NoFeesToClaim),
            amount => Ok(amount),
        }
    }

    /// Zero an account's balance and return what it held
    pub fn take(&mut self, address: &Address) -> Amount {
        self.balances.remove(address).unwrap_or(0)
    }

    /// Claim the full accumulated balance
    pub fn claim(&mut self, address: &Address) -> Result<Amount, StateError> {
        let amount = self.claimable(address)?;
        self.take(address);
        Ok(amount)
    }

    /// Zero the treasury and return what it held
    pub fn take_treasury(&mut self) -> Amount {
        std::mem::take(&mut self.treasury)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shares(owner: &str, creator: &str, split: (u64, u64, u64)) -> Vec<ShareLine> {
        vec![
            ShareLine::new(Recipient::account(owner), split.0),
            ShareLine::new(Recipient::account(creator), split.1),
            ShareLine::new(Recipient::Treasury, split.2),
        ]
    }

    #[test]
    fn test_settle_credits_all_lines() {
        let mut ledger = FeeLedger::new();
        ledger.record_inflow(1_000);
        ledger.settle(1_000, &shares("alice", "carol", (9_500, 300, 200))).unwrap();

        assert_eq!(ledger.balance(&Address::from("alice")), 950);
        assert_eq!(ledger.balance(&Address::from("carol")), 30);
        assert_eq!(ledger.treasury_balance(), 20);
        assert_eq!(ledger.total_accumulated() + ledger.treasury_balance() as u128, ledger.paid_in());
    }

    #[test]
    fn test_invalid_shares_credit_nothing() {
        let mut ledger = FeeLedger::new();
        let result = ledger.settle(1_000, &shares("alice", "carol", (9_000, 300, 200)));
        assert!(result.is_err());
        assert_eq!(ledger.balance(&Address::from("alice")), 0);
        assert_eq!(ledger.treasury_balance(), 0);
    }

    #[test]
    fn test_same_recipient_twice_is_additive() {
        let mut ledger = FeeLedger::new();
        ledger.settle(1_000, &shares("alice", "alice", (9_500, 300, 200))).unwrap();
        assert_eq!(ledger.balance(&Address::from("alice")), 980);
    }

    #[test]
    fn test_claim_zeroes_balance() {
        let mut ledger = FeeLedger::new();
        let alice = Address::from("alice");
        ledger.settle(100, &shares("alice", "bob", (8_700, 300, 1_000))).unwrap();

        assert_eq!(ledger.claim(&alice).unwrap(), 87);
        assert_eq!(ledger.balance(&alice), 0);
        assert_eq!(ledger.claim(&alice).unwrap_err(), StateError::NoFeesToClaim);
    }

    #[test]
    fn test_settlement_ids_follow_apply_order() {
        let split = shares("alice", "bob", (9_500, 300, 200));
        let mut first = FeeLedger::new();
        let mut second = FeeLedger::new();

        let a1 = first.settle(100, &split).unwrap();
        let a2 = first.settle(200, &split).unwrap();
        let b1 = second.settle(100, &split).unwrap();

        assert_eq!(a1.id, b1.id);
        assert_eq!(a1.id, settlement_id(1));
        assert_ne!(a1.id, a2.id);
        assert!(a2.id.starts_with("stl_"));

        // planned but never applied settlements carry no id
        assert!(plan_by_shares(100, &split).unwrap().id.is_empty());
    }
}
