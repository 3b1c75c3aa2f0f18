// ============================================================================
// Price Calculator - bonding curve for answer ownership
// ============================================================================
//
// next = last * (1 + step), where
//
//   step = min( (base + competition * per_trader) * decay , MAX_CHANGE )
//   decay = D / (D + elapsed)
//
// `competition` is the number of distinct traders on the opinion inside the
// recent window and `elapsed` the number of periods since the last trade, so
// contested answers climb faster and quiet ones climb slower. The result is
// clamped to [MIN_PRICE, last * (1 + MAX_CHANGE)].
//
// ============================================================================

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::{MarketConfig, BPS_DENOMINATOR};
use crate::models::{Address, Amount};

/// Inputs derived from an opinion's trade history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceInputs {
    pub last_price: Amount,
    /// Distinct traders within the competition window
    pub competition: u64,
    /// Periods since the last accepted trade
    pub elapsed_periods: u64,
}

impl PriceInputs {
    /// Derive competition and elapsed time from `(owner, period)` history
    /// records, oldest first.
    pub fn from_history<'a, I>(last_price: Amount, history: I, current_period: u64, window: u64) -> Self
    where
        I: IntoIterator<Item = (&'a Address, u64)>,
    {
        let earliest = current_period.saturating_sub(window);
        let mut traders: HashSet<&Address> = HashSet::new();
        let mut last_period = None;

        for (owner, period) in history {
            if period >= earliest {
                traders.insert(owner);
            }
            last_period = Some(period);
        }

        Self {
            last_price,
            competition: traders.len() as u64,
            elapsed_periods: last_period
                .map(|p| current_period.saturating_sub(p))
                .unwrap_or(0),
        }
    }
}

/// Pricing parameters snapshotted from config at call time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceCalculator {
    pub min_price: Amount,
    pub max_change_bps: u64,
    pub base_increase_bps: u64,
    pub competition_step_bps: u64,
    pub decay_periods: u64,
}

impl PriceCalculator {
    pub fn from_config(config: &MarketConfig) -> Self {
        Self {
            min_price: config.min_price,
            max_change_bps: config.max_price_change_bps,
            base_increase_bps: config.base_increase_bps,
            competition_step_bps: config.competition_step_bps,
            decay_periods: config.decay_periods.max(1),
        }
    }

    /// Highest price the next trade may cost
    pub fn ceiling(&self, last_price: Amount) -> Amount {
        let increase = last_price as u128 * self.max_change_bps as u128 / BPS_DENOMINATOR as u128;
        (last_price as u128 + increase).min(Amount::MAX as u128) as Amount
    }

    /// Step applied to the last price, in basis points, before clamping
    pub fn step_bps(&self, inputs: &PriceInputs) -> Decimal {
        let raw = Decimal::from(self.base_increase_bps)
            + Decimal::from(inputs.competition) * Decimal::from(self.competition_step_bps);

        let decay_periods = Decimal::from(self.decay_periods);
        let decay = decay_periods / (decay_periods + Decimal::from(inputs.elapsed_periods));

        (raw * decay).min(Decimal::from(self.max_change_bps))
    }

    /// Price of the next trade
    pub fn next_price(&self, inputs: &PriceInputs) -> Amount {
        let step = self.step_bps(inputs) / Decimal::from(BPS_DENOMINATOR);
        let last = Decimal::from(inputs.last_price);
        let ceiling = self.ceiling(inputs.last_price);

        let candidate = (last * (dec!(1) + step))
            .floor()
            .to_u64()
            .unwrap_or(ceiling);

        candidate.min(ceiling).max(self.min_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calculator() -> PriceCalculator {
        PriceCalculator {
            min_price: 10,
            max_change_bps: 20_000,
            base_increase_bps: 1_000,
            competition_step_bps: 1_500,
            decay_periods: 100,
        }
    }

    fn inputs(last_price: Amount, competition: u64, elapsed_periods: u64) -> PriceInputs {
        PriceInputs { last_price, competition, elapsed_periods }
    }

    #[test]
    fn test_first_trade_stays_within_cap() {
        let calc = calculator();
        let next = calc.next_price(&inputs(50, 0, 0));
        assert!((50..=150).contains(&next));
        // 10% base step
        assert_eq!(next, 55);
    }

    #[test]
    fn test_competition_raises_price() {
        let calc = calculator();
        let quiet = calc.next_price(&inputs(1_000, 0, 0));
        let contested = calc.next_price(&inputs(1_000, 4, 0));
        assert!(contested > quiet);
        // 10% + 4 * 15% = 70%
        assert_eq!(contested, 1_700);
    }

    #[test]
    fn test_cap_limits_bursts() {
        let calc = calculator();
        let next = calc.next_price(&inputs(1_000, 50, 0));
        assert_eq!(next, calc.ceiling(1_000));
        assert_eq!(next, 3_000);
    }

    #[test]
    fn test_elapsed_time_decays_step() {
        let calc = calculator();
        let fresh = calc.next_price(&inputs(1_000, 2, 0));
        let stale = calc.next_price(&inputs(1_000, 2, 100));
        assert!(stale < fresh);
        // step halves after `decay_periods`: 40% -> 20%
        assert_eq!(fresh, 1_400);
        assert_eq!(stale, 1_200);
        assert!(stale >= 1_000);
    }

    #[test]
    fn test_floor_applies() {
        let calc = PriceCalculator { min_price: 500, ..calculator() };
        assert_eq!(calc.next_price(&inputs(100, 0, 0)), 500);
    }

    #[test]
    fn test_zero_cap_freezes_price() {
        let calc = PriceCalculator { max_change_bps: 0, ..calculator() };
        assert_eq!(calc.next_price(&inputs(1_000, 5, 0)), 1_000);
    }

    #[test]
    fn test_inputs_from_history() {
        let alice = Address::from("alice");
        let bob = Address::from("bob");
        let history = vec![(&alice, 1), (&bob, 40), (&alice, 90), (&bob, 95)];

        let derived = PriceInputs::from_history(1_000, history, 100, 50);
        // alice@1 falls outside the window but alice@90 is inside
        assert_eq!(derived.competition, 2);
        assert_eq!(derived.elapsed_periods, 5);

        let empty: Vec<(&Address, u64)> = Vec::new();
        let derived = PriceInputs::from_history(1_000, empty, 100, 50);
        assert_eq!(derived.competition, 0);
        assert_eq!(derived.elapsed_periods, 0);
    }
}
