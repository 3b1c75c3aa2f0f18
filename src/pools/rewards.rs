// Proceeds from reselling a pool-held answer position.
//
// When someone outbids a pool, the owner share of that trade would be
// credited to `pool:<id>`. The engine reroutes it through `plan_rewards`
// instead, so contributors are paid directly and the synthetic address
// never accumulates a balance.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::PoolRegistry;
use crate::config::PoolRewardPolicy;
use crate::errors::{MarketResult, StateError};
use crate::events::{EventLog, LedgerEvent};
use crate::ledger::{plan_pro_rata, Recipient, Settlement};
use crate::models::{Amount, CallContext, PoolId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardPlan {
    pub pool_id: PoolId,
    pub policy: PoolRewardPolicy,
    /// Owner share received by the pool
    pub amount: Amount,
    pub to_contributors: Amount,
    /// Excess over the funding cap plus rounding dust
    pub to_treasury: Amount,
}

impl PoolRegistry {
    /// Split `share` between contributors (pro-rata by contribution) and the
    /// treasury according to `policy`
    pub fn plan_rewards(
        &self,
        pool_id: PoolId,
        share: Amount,
        policy: PoolRewardPolicy,
    ) -> MarketResult<(Settlement, RewardPlan)> {
        let pool = self.get(pool_id)?;
        if pool.executed_price.is_none() {
            return Err(StateError::PoolNotActive(pool_id).into());
        }

        let eligible = match policy {
            PoolRewardPolicy::ResaleProceeds => share,
            PoolRewardPolicy::OriginalFunding => {
                let cap = pool.executed_price.unwrap_or(pool.total).saturating_sub(pool.distributed);
                share.min(cap)
            }
        };

        let settlement = plan_pro_rata(eligible, &pool.weights())?.with_line(Recipient::Treasury, share - eligible);
        let to_treasury = settlement.credited_to(&Recipient::Treasury);

        let plan = RewardPlan {
            pool_id,
            policy,
            amount: share,
            to_contributors: share - to_treasury,
            to_treasury,
        };
        Ok((settlement, plan))
    }

    /// Record a distribution planned by `plan_rewards`
    pub fn commit_rewards(&mut self, plan: &RewardPlan, ctx: &CallContext, events: &mut EventLog) -> MarketResult<()> {
        let pool = self.get_mut(plan.pool_id)?;
        pool.distributed = pool.distributed.saturating_add(plan.to_contributors);

        events.append(
            ctx.block,
            ctx.timestamp,
            LedgerEvent::PoolRewardsDistributed {
                pool_id: plan.pool_id,
                amount: plan.amount,
                to_treasury: plan.to_treasury,
            },
        );
        info!(
            pool_id = plan.pool_id,
            policy = ?plan.policy,
            to_contributors = plan.to_contributors,
            to_treasury = plan.to_treasury,
            "pool rewards distributed"
        );
        Ok(())
    }
}
