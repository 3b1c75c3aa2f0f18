// ============================================================================
// Rate Limiter - per-account, per-period trade counters
// ============================================================================
//
// An account may trade each opinion at most once per period and at most
// `max_trades_per_period` distinct opinions per period. Counters reset
// lazily: a stored counter whose period marker is older than the current
// period is treated as empty on the next check.
//
// Checking and recording are separate so the engine can check first, move
// funds, and only then record the trade.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::RateLimitError;
use crate::models::{Address, OpinionId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodTradeCounter {
    pub period: u64,
    pub count: u32,
    pub opinions: Vec<OpinionId>,
}

impl PeriodTradeCounter {
    fn in_period(&self, period: u64) -> bool {
        self.period == period
    }
}

/// Proof that a trade passed the limiter, consumed by `record`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradePermit {
    account: Address,
    opinion_id: OpinionId,
    period: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimiter {
    counters: BTreeMap<Address, PeriodTradeCounter>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `account` may trade `opinion_id` in `period`
    pub fn check(
        &self,
        account: &Address,
        opinion_id: OpinionId,
        period: u64,
        max_trades: u32,
    ) -> Result<TradePermit, RateLimitError> {
        if let Some(counter) = self.counters.get(account).filter(|c| c.in_period(period)) {
            if counter.opinions.contains(&opinion_id) {
                return Err(RateLimitError::OneTradePerPeriod { opinion_id });
            }
            if counter.count >= max_trades {
                return Err(RateLimitError::MaxPeriodTradesExceeded { max: max_trades });
            }
        }

        Ok(TradePermit {
            account: account.clone(),
            opinion_id,
            period,
        })
    }

    /// Record a permitted trade
    pub fn record(&mut self, permit: TradePermit) {
        let counter = self.counters.entry(permit.account).or_default();
        if !counter.in_period(permit.period) {
            *counter = PeriodTradeCounter {
                period: permit.period,
                count: 0,
                opinions: Vec::new(),
            };
        }
        counter.count += 1;
        counter.opinions.push(permit.opinion_id);
    }

    /// Check and record in one step
    pub fn record_trade(
        &mut self,
        account: &Address,
        opinion_id: OpinionId,
        period: u64,
        max_trades: u32,
    ) -> Result<(), RateLimitError> {
        let permit = self.check(account, opinion_id, period, max_trades)?;
        self.record(permit);
        Ok(())
    }

    /// Trades recorded for `account` in `period` (0 once the period advanced)
    pub fn trades_in_period(&self, account: &Address, period: u64) -> u32 {
        self.counters
            .get(account)
            .filter(|c| c.in_period(period))
            .map(|c| c.count)
            .unwrap_or(0)
    }
}
