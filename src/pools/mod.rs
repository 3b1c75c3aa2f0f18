// ============================================================================
// Pool Registry - collective funding of an answer position
// ============================================================================
//
// Lifecycle:
//
//   Active ──(funds cover the quote)──> Executed
//      │
//      └──(deadline passes)──> Expired ──(refund)──> RefundedPartially ──> Refunded
//
// A pool's escrow holds every contribution until it executes or is refunded.
// Execution spends `price` of the escrow on an answer trade owned by the
// synthetic `pool:<id>` address; the surplus is returned pro-rata to the
// contributors' accumulated balances.
//
// Expiry is lazy: an Active pool whose deadline has passed behaves as
// Expired everywhere, and is marked Expired on its first refund or on
// `expire`.
//
//   rewards: redistribution of proceeds when a pool-held position is resold
//
// ============================================================================

pub mod rewards;

pub use rewards::*;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

use crate::config::MarketConfig;
use crate::errors::{FundsError, MarketResult, StateError, ValidationError};
use crate::events::{EventLog, LedgerEvent};
use crate::ledger::{plan_by_shares, plan_pro_rata, FeeLedger, Recipient, Settlement, ShareLine};
use crate::models::{Address, Amount, CallContext, OpinionId, PoolId};
use crate::opinions::{validate_optional_text, validate_text, OpinionRegistry};

// ============================================================================
// POOL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    Active,
    Executed,
    Expired,
    RefundedPartially,
    /// Every contributor has been refunded
    Refunded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: PoolId,
    pub opinion_id: OpinionId,
    pub proposed_answer: String,
    pub creator: Address,
    /// Unix seconds; contributions are accepted strictly before it
    pub deadline: u64,
    pub contributions: BTreeMap<Address, Amount>,
    /// Sum of every contribution ever made
    pub total: Amount,
    /// Funds currently held for the pool
    pub escrow: Amount,
    pub status: PoolStatus,
    pub name: String,
    pub metadata: Option<String>,
    pub refunded: BTreeSet<Address>,
    /// Price paid when the pool executed
    pub executed_price: Option<Amount>,
    /// Resale proceeds already paid out to contributors
    pub distributed: Amount,
    pub created_at: u64,
}

impl Pool {
    /// Status with lazy expiry applied
    pub fn effective_status(&self, now: u64) -> PoolStatus {
        if self.status == PoolStatus::Active && now >= self.deadline {
            PoolStatus::Expired
        } else {
            self.status
        }
    }

    pub fn address(&self) -> Address {
        Address::pool(self.id)
    }

    pub fn contribution_of(&self, address: &Address) -> Amount {
        self.contributions.get(address).copied().unwrap_or(0)
    }

    /// Contribution weights, ordered by address
    pub fn weights(&self) -> Vec<(Address, Amount)> {
        self.contributions.iter().map(|(a, v)| (a.clone(), *v)).collect()
    }

    /// Active and before the deadline
    pub fn ensure_accepting(&self, now: u64) -> Result<(), StateError> {
        if self.status != PoolStatus::Active {
            return Err(StateError::PoolNotActive(self.id));
        }
        if now >= self.deadline {
            return Err(StateError::PoolDeadlinePassed(self.id));
        }
        Ok(())
    }

    fn with_contribution(&self, contributor: &Address, amount: Amount) -> Result<Pool, FundsError> {
        let mut next = self.clone();
        let share = next.contribution_of(contributor).checked_add(amount).ok_or(FundsError::Overflow)?;
        next.total = next.total.checked_add(amount).ok_or(FundsError::Overflow)?;
        next.escrow = next.escrow.checked_add(amount).ok_or(FundsError::Overflow)?;
        next.contributions.insert(contributor.clone(), share);
        Ok(next)
    }

    /// Plan spending `price` of the escrow on the pool's answer
    pub fn plan_execution(&self, price: Amount, now: u64) -> MarketResult<ExecutionPlan> {
        self.ensure_accepting(now)?;
        if self.escrow < price {
            return Err(StateError::PoolTargetNotReached {
                pool_id: self.id,
                funded: self.escrow,
                price,
            }
            .into());
        }

        let surplus = self.escrow - price;
        let refund = if surplus > 0 {
            Some(plan_pro_rata(surplus, &self.weights())?)
        } else {
            None
        };

        Ok(ExecutionPlan {
            pool_id: self.id,
            opinion_id: self.opinion_id,
            price,
            surplus,
            refund,
        })
    }
}

/// One row of a pool's contributor list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    pub address: Address,
    pub amount: Amount,
    pub refunded: bool,
}

// ============================================================================
// PLANS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPool {
    pub opinion_id: OpinionId,
    pub proposed_answer: String,
    pub deadline: u64,
    pub contribution: Amount,
    pub name: String,
    #[serde(default)]
    pub metadata: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PoolCreatePlan {
    /// The pool as it will be stored, initial contribution included
    pub pool: Pool,
    pub creation_fee: Amount,
    pub fee_settlement: Settlement,
    /// Creation fee plus initial contribution
    pub charge: Amount,
}

#[derive(Debug, Clone)]
pub struct ContributionPlan {
    pub pool_id: PoolId,
    pub contributor: Address,
    pub amount: Amount,
    projected: Pool,
}

impl ContributionPlan {
    /// The pool after this contribution lands
    pub fn projected(&self) -> &Pool {
        &self.projected
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub pool_id: PoolId,
    pub opinion_id: OpinionId,
    pub price: Amount,
    pub surplus: Amount,
    refund: Option<Settlement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundPlan {
    pub pool_id: PoolId,
    pub contributor: Address,
    pub amount: Amount,
}

// ============================================================================
// REGISTRY
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolRegistry {
    pools: BTreeMap<PoolId, Pool>,
    next_id: PoolId,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self { pools: BTreeMap::new(), next_id: 1 }
    }

    pub fn get(&self, id: PoolId) -> Result<&Pool, StateError> {
        self.pools.get(&id).ok_or(StateError::PoolNotFound(id))
    }

    fn get_mut(&mut self, id: PoolId) -> Result<&mut Pool, StateError> {
        self.pools.get_mut(&id).ok_or(StateError::PoolNotFound(id))
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pool> {
        self.pools.values()
    }

    /// Funds held across every pool
    pub fn escrowed(&self) -> u128 {
        self.pools.values().map(|p| p.escrow as u128).sum()
    }

    pub fn contributors(&self, id: PoolId) -> Result<Vec<Contributor>, StateError> {
        let pool = self.get(id)?;
        Ok(pool
            .contributions
            .iter()
            .map(|(address, amount)| Contributor {
                address: address.clone(),
                amount: *amount,
                refunded: pool.refunded.contains(address),
            })
            .collect())
    }

    fn peek_id(&self) -> PoolId {
        self.next_id.max(1)
    }

    // === CREATE ===

    pub fn plan_create(
        &self,
        config: &MarketConfig,
        opinions: &OpinionRegistry,
        ctx: &CallContext,
        request: NewPool,
    ) -> MarketResult<PoolCreatePlan> {
        validate_text("proposed_answer", &request.proposed_answer, config.max_answer_len)?;
        validate_text("name", &request.name, config.max_pool_name_len)?;
        validate_optional_text("metadata", request.metadata.as_deref(), config.max_link_len)?;
        if request.contribution == 0 {
            return Err(ValidationError::ZeroAmount.into());
        }

        let earliest = ctx.timestamp.saturating_add(config.min_pool_duration_secs);
        let latest = ctx.timestamp.saturating_add(config.max_pool_duration_secs);
        if request.deadline < earliest {
            return Err(ValidationError::DeadlineTooShort { deadline: request.deadline, earliest }.into());
        }
        if request.deadline > latest {
            return Err(ValidationError::DeadlineTooLong { deadline: request.deadline, latest }.into());
        }

        let opinion = opinions.get(request.opinion_id)?;
        opinion.ensure_tradable()?;
        if opinion.current_answer == request.proposed_answer {
            return Err(ValidationError::SameAnswerAsCurrent.into());
        }

        let creation_fee = config.pool_creation_fee;
        let fee_settlement = plan_by_shares(creation_fee, &[ShareLine::percent(Recipient::Treasury, 100)])?;
        let charge = creation_fee.checked_add(request.contribution).ok_or(FundsError::Overflow)?;

        let mut contributions = BTreeMap::new();
        contributions.insert(ctx.caller.clone(), request.contribution);
        let pool = Pool {
            id: self.peek_id(),
            opinion_id: request.opinion_id,
            proposed_answer: request.proposed_answer,
            creator: ctx.caller.clone(),
            deadline: request.deadline,
            contributions,
            total: request.contribution,
            escrow: request.contribution,
            status: PoolStatus::Active,
            name: request.name,
            metadata: request.metadata,
            refunded: BTreeSet::new(),
            executed_price: None,
            distributed: 0,
            created_at: ctx.timestamp,
        };

        Ok(PoolCreatePlan { pool, creation_fee, fee_settlement, charge })
    }

    pub fn commit_create(
        &mut self,
        mut plan: PoolCreatePlan,
        ctx: &CallContext,
        ledger: &mut FeeLedger,
        events: &mut EventLog,
    ) -> PoolId {
        let pool = plan.pool;
        let id = pool.id;
        self.next_id = id + 1;

        ledger.apply(&mut plan.fee_settlement);
        events.append(
            ctx.block,
            ctx.timestamp,
            LedgerEvent::PoolCreated {
                pool_id: id,
                opinion_id: pool.opinion_id,
                creator: pool.creator.clone(),
                proposed_answer: pool.proposed_answer.clone(),
                deadline: pool.deadline,
                initial_contribution: pool.total,
                name: pool.name.clone(),
            },
        );
        info!(
            pool_id = id,
            opinion_id = pool.opinion_id,
            creator = %pool.creator,
            contribution = pool.total,
            fee = plan.creation_fee,
            "pool created"
        );
        self.pools.insert(id, pool);
        id
    }

    // === CONTRIBUTE ===

    pub fn plan_contribution(
        &self,
        pool_id: PoolId,
        contributor: &Address,
        amount: Amount,
        opinions: &OpinionRegistry,
        now: u64,
    ) -> MarketResult<ContributionPlan> {
        if amount == 0 {
            return Err(ValidationError::ZeroAmount.into());
        }
        let pool = self.get(pool_id)?;
        pool.ensure_accepting(now)?;
        opinions.get(pool.opinion_id)?.ensure_tradable()?;

        Ok(ContributionPlan {
            pool_id,
            contributor: contributor.clone(),
            amount,
            projected: pool.with_contribution(contributor, amount)?,
        })
    }

    pub fn commit_contribution(&mut self, plan: ContributionPlan, ctx: &CallContext, events: &mut EventLog) {
        let total = plan.projected.total;
        events.append(
            ctx.block,
            ctx.timestamp,
            LedgerEvent::PoolContribution {
                pool_id: plan.pool_id,
                contributor: plan.contributor.clone(),
                amount: plan.amount,
                total,
            },
        );
        info!(pool_id = plan.pool_id, contributor = %plan.contributor, amount = plan.amount, total, "pool contribution");
        self.pools.insert(plan.pool_id, plan.projected);
    }

    // === EXECUTE ===

    /// Mark the pool executed, empty its escrow and return the surplus
    pub fn commit_execution(
        &mut self,
        mut plan: ExecutionPlan,
        ctx: &CallContext,
        ledger: &mut FeeLedger,
        events: &mut EventLog,
    ) -> MarketResult<()> {
        let pool = self.get_mut(plan.pool_id)?;
        pool.status = PoolStatus::Executed;
        pool.escrow = 0;
        pool.executed_price = Some(plan.price);

        if let Some(refund) = &mut plan.refund {
            ledger.apply(refund);
            events.append(
                ctx.block,
                ctx.timestamp,
                LedgerEvent::FeesSettled {
                    settlement_id: refund.id.clone(),
                    opinion_id: Some(plan.opinion_id),
                    amount: refund.amount,
                    credits: refund.credits.clone(),
                    remainder: refund.remainder,
                },
            );
        }
        events.append(
            ctx.block,
            ctx.timestamp,
            LedgerEvent::PoolExecuted {
                pool_id: plan.pool_id,
                opinion_id: plan.opinion_id,
                price: plan.price,
                surplus: plan.surplus,
            },
        );
        info!(pool_id = plan.pool_id, price = plan.price, surplus = plan.surplus, "pool executed");
        Ok(())
    }

    // === EXPIRE / REFUND ===

    pub fn expire(&mut self, pool_id: PoolId, ctx: &CallContext, events: &mut EventLog) -> Result<(), StateError> {
        let pool = self.get_mut(pool_id)?;
        if pool.status != PoolStatus::Active {
            return Err(StateError::PoolNotActive(pool_id));
        }
        if ctx.timestamp < pool.deadline {
            return Err(StateError::PoolNotExpired(pool_id));
        }
        pool.status = PoolStatus::Expired;
        events.append(ctx.block, ctx.timestamp, LedgerEvent::PoolExpired { pool_id });
        info!(pool_id, "pool expired");
        Ok(())
    }

    pub fn plan_refund(&self, pool_id: PoolId, contributor: &Address, now: u64) -> Result<RefundPlan, StateError> {
        let pool = self.get(pool_id)?;
        match pool.effective_status(now) {
            PoolStatus::Active => return Err(StateError::PoolNotExpired(pool_id)),
            PoolStatus::Executed => return Err(StateError::PoolNotActive(pool_id)),
            PoolStatus::Expired | PoolStatus::RefundedPartially | PoolStatus::Refunded => {}
        }
        if pool.refunded.contains(contributor) {
            return Err(StateError::AlreadyRefunded);
        }
        let amount = pool.contribution_of(contributor);
        if amount == 0 {
            return Err(StateError::NotAContributor);
        }

        Ok(RefundPlan { pool_id, contributor: contributor.clone(), amount })
    }

    pub fn commit_refund(&mut self, plan: RefundPlan, ctx: &CallContext, events: &mut EventLog) -> Result<(), StateError> {
        let pool = self.get_mut(plan.pool_id)?;
        if pool.status == PoolStatus::Active {
            pool.status = PoolStatus::Expired;
            events.append(ctx.block, ctx.timestamp, LedgerEvent::PoolExpired { pool_id: plan.pool_id });
        }

        pool.escrow = pool.escrow.saturating_sub(plan.amount);
        pool.refunded.insert(plan.contributor.clone());
        pool.status = if pool.refunded.len() == pool.contributions.len() {
            PoolStatus::Refunded
        } else {
            PoolStatus::RefundedPartially
        };

        events.append(
            ctx.block,
            ctx.timestamp,
            LedgerEvent::PoolRefunded {
                pool_id: plan.pool_id,
                contributor: plan.contributor.clone(),
                amount: plan.amount,
            },
        );
        info!(pool_id = plan.pool_id, contributor = %plan.contributor, amount = plan.amount, "pool refund");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SECONDS_PER_DAY;
    use crate::errors::MarketError;
    use crate::models::UNIT;
    use crate::opinions::NewOpinion;

    const NOW: u64 = 1_700_000_000;

    struct Fixture {
        opinions: OpinionRegistry,
        pools: PoolRegistry,
        ledger: FeeLedger,
        events: EventLog,
        config: MarketConfig,
        opinion_id: OpinionId,
    }

    fn fixture() -> Fixture {
        let config = MarketConfig::default();
        let mut opinions = OpinionRegistry::new();
        let mut ledger = FeeLedger::new();
        let mut events = EventLog::new();
        let ctx = CallContext::new("carol", 1, NOW);
        let plan = opinions
            .plan_create(
                &config,
                &ctx.caller,
                NewOpinion {
                    question: "Best DEX?".into(),
                    answer: "Uniswap".into(),
                    description: None,
                    initial_price: 10 * UNIT,
                    categories: vec!["Crypto".into()],
                },
            )
            .unwrap();
        let opinion_id = opinions.commit_create(plan, &ctx, &mut ledger, &mut events);
        Fixture { opinions, pools: PoolRegistry::new(), ledger, events, config, opinion_id }
    }

    fn request(f: &Fixture, deadline: u64, contribution: Amount) -> NewPool {
        NewPool {
            opinion_id: f.opinion_id,
            proposed_answer: "Curve".into(),
            deadline,
            contribution,
            name: "curve gang".into(),
            metadata: None,
        }
    }

    fn create(f: &mut Fixture, contribution: Amount) -> PoolId {
        let ctx = CallContext::new("alice", 2, NOW);
        let plan = f
            .pools
            .plan_create(&f.config, &f.opinions, &ctx, request(f, NOW + 7 * SECONDS_PER_DAY, contribution))
            .unwrap();
        f.pools.commit_create(plan, &ctx, &mut f.ledger, &mut f.events)
    }

    fn contribute(f: &mut Fixture, who: &str, amount: Amount, now: u64) -> MarketResult<()> {
        let ctx = CallContext::new(who, 3, now);
        let plan = f.pools.plan_contribution(1, &ctx.caller, amount, &f.opinions, now)?;
        f.pools.commit_contribution(plan, &ctx, &mut f.events);
        Ok(())
    }

    #[test]
    fn test_deadline_bounds() {
        let f = fixture();
        let ctx = CallContext::new("alice", 2, NOW);

        let err = f
            .pools
            .plan_create(&f.config, &f.opinions, &ctx, request(&f, NOW + 3_600, UNIT))
            .unwrap_err();
        assert!(matches!(err, MarketError::Validation(ValidationError::DeadlineTooShort { .. })));

        let err = f
            .pools
            .plan_create(&f.config, &f.opinions, &ctx, request(&f, NOW + 400 * SECONDS_PER_DAY, UNIT))
            .unwrap_err();
        assert!(matches!(err, MarketError::Validation(ValidationError::DeadlineTooLong { .. })));

        assert!(f
            .pools
            .plan_create(&f.config, &f.opinions, &ctx, request(&f, NOW + SECONDS_PER_DAY, UNIT))
            .is_ok());
    }

    #[test]
    fn test_create_rejects_current_answer() {
        let f = fixture();
        let ctx = CallContext::new("alice", 2, NOW);
        let mut same = request(&f, NOW + 2 * SECONDS_PER_DAY, UNIT);
        same.proposed_answer = "Uniswap".into();
        let err = f.pools.plan_create(&f.config, &f.opinions, &ctx, same).unwrap_err();
        assert_eq!(err, MarketError::Validation(ValidationError::SameAnswerAsCurrent));

        let mut long_name = request(&f, NOW + 2 * SECONDS_PER_DAY, UNIT);
        long_name.name = "n".repeat(31);
        assert_eq!(
            f.pools.plan_create(&f.config, &f.opinions, &ctx, long_name).unwrap_err().tag(),
            "TextTooLong"
        );
    }

    #[test]
    fn test_create_charges_fee_and_escrows() {
        let mut f = fixture();
        let treasury_before = f.ledger.treasury_balance();
        let id = create(&mut f, 2 * UNIT);

        let pool = f.pools.get(id).unwrap();
        assert_eq!(id, 1);
        assert_eq!(pool.escrow, 2 * UNIT);
        assert_eq!(pool.contribution_of(&Address::from("alice")), 2 * UNIT);
        assert_eq!(f.ledger.treasury_balance() - treasury_before, f.config.pool_creation_fee);
        assert_eq!(f.pools.escrowed(), 2 * UNIT as u128);
    }

    #[test]
    fn test_contributions_accumulate() {
        let mut f = fixture();
        create(&mut f, 2 * UNIT);
        contribute(&mut f, "bob", 3 * UNIT, NOW + 10).unwrap();
        contribute(&mut f, "alice", UNIT, NOW + 20).unwrap();

        let pool = f.pools.get(1).unwrap();
        assert_eq!(pool.total, 6 * UNIT);
        assert_eq!(pool.contribution_of(&Address::from("alice")), 3 * UNIT);
        assert_eq!(f.pools.contributors(1).unwrap().len(), 2);

        let err = contribute(&mut f, "bob", 0, NOW + 30).unwrap_err();
        assert_eq!(err, MarketError::Validation(ValidationError::ZeroAmount));
        let err = contribute(&mut f, "bob", UNIT, NOW + 8 * SECONDS_PER_DAY).unwrap_err();
        assert_eq!(err, MarketError::State(StateError::PoolDeadlinePassed(1)));
    }

    #[test]
    fn test_execution_returns_surplus() {
        let mut f = fixture();
        create(&mut f, 8 * UNIT);
        contribute(&mut f, "bob", 4 * UNIT, NOW + 10).unwrap();

        let pool = f.pools.get(1).unwrap();
        let err = pool.plan_execution(13 * UNIT, NOW + 20).unwrap_err();
        assert!(matches!(err, MarketError::State(StateError::PoolTargetNotReached { .. })));

        let plan = pool.plan_execution(9 * UNIT, NOW + 20).unwrap();
        assert_eq!(plan.surplus, 3 * UNIT);
        let ctx = CallContext::new("bob", 4, NOW + 20);
        f.pools.commit_execution(plan, &ctx, &mut f.ledger, &mut f.events).unwrap();

        let pool = f.pools.get(1).unwrap();
        assert_eq!(pool.status, PoolStatus::Executed);
        assert_eq!(pool.escrow, 0);
        assert_eq!(pool.executed_price, Some(9 * UNIT));
        // 8:4 split of the 3 unit surplus
        assert_eq!(f.ledger.balance(&Address::from("alice")), 2 * UNIT);
        assert_eq!(f.ledger.balance(&Address::from("bob")), UNIT);

        let err = contribute(&mut f, "dave", UNIT, NOW + 30).unwrap_err();
        assert_eq!(err, MarketError::State(StateError::PoolNotActive(1)));
    }

    #[test]
    fn test_refund_exactly_once() {
        let mut f = fixture();
        create(&mut f, 2 * UNIT);
        contribute(&mut f, "bob", 3 * UNIT, NOW + 10).unwrap();

        let bob = Address::from("bob");
        assert_eq!(f.pools.plan_refund(1, &bob, NOW + 20), Err(StateError::PoolNotExpired(1)));

        let later = NOW + 8 * SECONDS_PER_DAY;
        let ctx = CallContext::new("bob", 9, later);
        let plan = f.pools.plan_refund(1, &bob, later).unwrap();
        assert_eq!(plan.amount, 3 * UNIT);
        f.pools.commit_refund(plan, &ctx, &mut f.events).unwrap();

        assert_eq!(f.pools.get(1).unwrap().status, PoolStatus::RefundedPartially);
        assert_eq!(f.pools.plan_refund(1, &bob, later), Err(StateError::AlreadyRefunded));
        assert_eq!(
            f.pools.plan_refund(1, &Address::from("mallory"), later),
            Err(StateError::NotAContributor)
        );

        let alice = Address::from("alice");
        let plan = f.pools.plan_refund(1, &alice, later).unwrap();
        f.pools.commit_refund(plan, &ctx.as_caller("alice"), &mut f.events).unwrap();
        let pool = f.pools.get(1).unwrap();
        assert_eq!(pool.status, PoolStatus::Refunded);
        assert_eq!(pool.escrow, 0);
    }

    #[test]
    fn test_expire_requires_deadline() {
        let mut f = fixture();
        create(&mut f, UNIT);
        let early = CallContext::new("anyone", 3, NOW + 10);
        assert_eq!(f.pools.expire(1, &early, &mut f.events), Err(StateError::PoolNotExpired(1)));

        let late = CallContext::new("anyone", 9, NOW + 8 * SECONDS_PER_DAY);
        f.pools.expire(1, &late, &mut f.events).unwrap();
        assert_eq!(f.pools.get(1).unwrap().status, PoolStatus::Expired);
        assert_eq!(f.pools.expire(1, &late, &mut f.events), Err(StateError::PoolNotActive(1)));
    }
}
