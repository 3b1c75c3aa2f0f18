// ============================================================================
// Settlement Planning
// ============================================================================
//
// A settlement splits one payment across an ordered list of recipients.
// Planning is pure and may fail; applying a plan is infallible, so a
// settlement is either fully credited or not at all.
//
// Integer division leaves a remainder of at most (recipients - 1) units.
// It is always credited to the treasury, never dropped.
//
// Ids are assigned by the ledger when a settlement is applied, from its
// running settlement count, so replaying the same operations reproduces
// the same ids.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{total_bps, BPS_DENOMINATOR};
use crate::errors::ValidationError;
use crate::models::{Address, Amount};

/// Who receives a settlement line
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "address")]
pub enum Recipient {
    Account(Address),
    Treasury,
}

impl Recipient {
    pub fn account(address: impl Into<Address>) -> Self {
        Recipient::Account(address.into())
    }
}

/// One recipient and its share of a payment in basis points
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareLine {
    pub recipient: Recipient,
    pub bps: u64,
}

impl ShareLine {
    pub fn new(recipient: Recipient, bps: u64) -> Self {
        Self { recipient, bps }
    }

    pub fn percent(recipient: Recipient, percent: u64) -> Self {
        Self { recipient, bps: percent.saturating_mul(100) }
    }
}

/// Namespace for v5 settlement ids
const SETTLEMENT_NAMESPACE: Uuid = Uuid::from_u128(0x6f70_696e_696f_6e2d_6d61_726b_6574_0001);

/// Id of the `sequence`-th applied settlement
pub fn settlement_id(sequence: u64) -> String {
    let uuid = Uuid::new_v5(&SETTLEMENT_NAMESPACE, &sequence.to_be_bytes());
    format!("stl_{}", &uuid.simple().to_string()[..12])
}

/// Fully computed settlement, ready to apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Empty until the ledger applies it
    pub id: String,
    pub amount: Amount,
    pub credits: Vec<(Recipient, Amount)>,
    /// Rounding remainder credited to the treasury
    pub remainder: Amount,
}

impl Settlement {
    fn new(amount: Amount, credits: Vec<(Recipient, Amount)>) -> Self {
        let credited: u128 = credits.iter().map(|(_, a)| *a as u128).sum();
        let remainder = (amount as u128).saturating_sub(credited) as Amount;
        Self {
            id: String::new(),
            amount,
            credits,
            remainder,
        }
    }

    /// Sum of every credited line including the remainder
    pub fn total(&self) -> Amount {
        self.credits.iter().map(|(_, a)| *a).sum::<Amount>() + self.remainder
    }

    /// Replace every line paid to `recipient` with a nested settlement of the
    /// same total, planned from that total. Returns the rerouted amount.
    pub fn reroute<E>(
        &mut self,
        recipient: &Recipient,
        plan: impl FnOnce(Amount) -> Result<Settlement, E>,
    ) -> Result<Amount, E> {
        let share: Amount = self
            .credits
            .iter()
            .filter(|(r, _)| r == recipient)
            .map(|(_, a)| *a)
            .sum();
        let nested = plan(share)?;
        debug_assert_eq!(nested.amount, share);

        self.credits.retain(|(r, _)| r != recipient);
        self.credits.extend(nested.credits);
        self.remainder += nested.remainder;
        Ok(share)
    }

    /// Add a line on top of the planned amount
    pub fn with_line(mut self, recipient: Recipient, amount: Amount) -> Self {
        if amount > 0 {
            self.amount += amount;
            self.credits.push((recipient, amount));
        }
        self
    }

    /// Amount credited to a specific recipient across all lines
    pub fn credited_to(&self, recipient: &Recipient) -> Amount {
        let lines: Amount = self
            .credits
            .iter()
            .filter(|(r, _)| r == recipient)
            .map(|(_, a)| *a)
            .sum();
        if *recipient == Recipient::Treasury {
            lines + self.remainder
        } else {
            lines
        }
    }
}

/// Plan a settlement from basis-point shares that must total 100%
pub fn plan_by_shares(amount: Amount, shares: &[ShareLine]) -> Result<Settlement, ValidationError> {
    let bps: Vec<u64> = shares.iter().map(|s| s.bps).collect();
    let total = total_bps(&bps);
    if total != BPS_DENOMINATOR as u128 || shares.is_empty() {
        return Err(ValidationError::InvalidShares { total_bps: total.min(u64::MAX as u128) as u64 });
    }

    let credits = shares
        .iter()
        .map(|s| {
            let part = amount as u128 * s.bps as u128 / BPS_DENOMINATOR as u128;
            (s.recipient.clone(), part as Amount)
        })
        .collect();

    Ok(Settlement::new(amount, credits))
}

/// Plan a settlement proportional to arbitrary weights (pool contributions)
pub fn plan_pro_rata(amount: Amount, weights: &[(Address, Amount)]) -> Result<Settlement, ValidationError> {
    let total_weight: u128 = weights.iter().map(|(_, w)| *w as u128).sum();
    if total_weight == 0 {
        return Err(ValidationError::ZeroAmount);
    }

    let credits = weights
        .iter()
        .filter(|(_, w)| *w > 0)
        .map(|(address, weight)| {
            let part = amount as u128 * *weight as u128 / total_weight;
            (Recipient::Account(address.clone()), part as Amount)
        })
        .collect();

    Ok(Settlement::new(amount, credits))
}
