// ============================================================================
// Opinion Market Engine - single-writer state machine
// ============================================================================
//
// Every caller-facing operation runs the same sequence:
//
//   1. read config (paused / admin gate)
//   2. plan: validation, state checks, rate limit, pricing, settlement
//   3. move funds through the currency service (the only fallible
//      external step)
//   4. commit: infallible ledger credits and entity updates, events
//
// A failure in steps 1-3 leaves every table untouched. Operations are
// applied one at a time by the owner of `&mut OpinionMarket`; there is no
// locking inside.
//
// ============================================================================

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::config::{ConfigSource, MarketConfig, SharedConfig};
use crate::errors::{MarketResult, StateError};
use crate::events::{EventEntry, EventLog, EventSink, LedgerEvent};
use crate::ledger::{CurrencyService, FeeLedger, InMemoryBank, Recipient};
use crate::models::{Address, Amount, CallContext, OpinionId, PoolId};
use crate::opinions::{
    AnswerRecord, AnswerSubmission, NewOpinion, Opinion, OpinionRegistry, QuestionPurchaseReceipt, TradeKind,
    TradePlan, TradeReceipt,
};
use crate::pools::{Contributor, ExecutionPlan, NewPool, Pool, PoolRegistry, RewardPlan};
use crate::question_market::{QuestionListing, QuestionMarket};
use crate::rate_limit::RateLimiter;

/// Logs a rejected operation and passes the error through
trait LogRejection {
    fn log_rejection(self, op: &'static str, ctx: &CallContext) -> Self;
}

impl<T> LogRejection for MarketResult<T> {
    fn log_rejection(self, op: &'static str, ctx: &CallContext) -> Self {
        if let Err(e) = &self {
            warn!(op, caller = %ctx.caller, block = ctx.block, kind = ?e.kind(), tag = e.tag(), "rejected: {}", e);
        }
        self
    }
}

/// Trade planned on a pool's behalf, with any reroute of its proceeds
struct PoolExecution {
    trade: TradePlan,
    reward: Option<RewardPlan>,
    execution: ExecutionPlan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionOutcome {
    pub pool_id: PoolId,
    pub total: Amount,
    /// Whether this contribution triggered execution
    pub executed: bool,
}

/// Snapshot of the conservation invariant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConservationReport {
    pub balances: u128,
    pub treasury: u128,
    pub escrow: u128,
    pub paid_in: u128,
    pub paid_out: u128,
    /// Funds the currency service reports in custody
    pub custody: u128,
}

impl ConservationReport {
    pub fn holds(&self) -> bool {
        let held = self.balances + self.treasury + self.escrow;
        self.paid_in >= self.paid_out && held == self.paid_in - self.paid_out && held == self.custody
    }
}

#[derive(Debug)]
pub struct OpinionMarket<B: CurrencyService = InMemoryBank> {
    config: SharedConfig,
    bank: B,
    ledger: FeeLedger,
    limiter: RateLimiter,
    opinions: OpinionRegistry,
    pools: PoolRegistry,
    events: EventLog,
}

impl<B: CurrencyService> OpinionMarket<B> {
    pub fn new(config: SharedConfig, bank: B) -> Self {
        Self {
            config,
            bank,
            ledger: FeeLedger::new(),
            limiter: RateLimiter::new(),
            opinions: OpinionRegistry::new(),
            pools: PoolRegistry::new(),
            events: EventLog::new(),
        }
    }

    pub fn with_config(config: MarketConfig, bank: B) -> Self {
        Self::new(SharedConfig::new(config), bank)
    }

    fn begin(&self, ctx: &CallContext) -> MarketResult<MarketConfig> {
        let config = self.config.current();
        if config.paused {
            return Err(StateError::Paused.into());
        }
        if ctx.caller.as_pool().is_some() {
            return Err(StateError::Unauthorized.into());
        }
        Ok(config)
    }

    /// Admin operations stay available while paused
    fn begin_admin(&self, ctx: &CallContext) -> MarketResult<MarketConfig> {
        let config = self.config.current();
        if !config.is_admin(&ctx.caller) {
            return Err(StateError::Unauthorized.into());
        }
        Ok(config)
    }

    // ========================================================================
    // OPINIONS
    // ========================================================================

    pub fn create_opinion(&mut self, ctx: &CallContext, request: NewOpinion) -> MarketResult<OpinionId> {
        self.try_create_opinion(ctx, request).log_rejection("create_opinion", ctx)
    }

    fn try_create_opinion(&mut self, ctx: &CallContext, request: NewOpinion) -> MarketResult<OpinionId> {
        let config = self.begin(ctx)?;
        let plan = self.opinions.plan_create(&config, &ctx.caller, request)?;

        self.bank.pull(&ctx.caller, plan.creation_fee)?;
        self.ledger.record_inflow(plan.creation_fee);

        Ok(self.opinions.commit_create(plan, ctx, &mut self.ledger, &mut self.events))
    }

    pub fn submit_answer(
        &mut self,
        ctx: &CallContext,
        opinion_id: OpinionId,
        submission: AnswerSubmission,
    ) -> MarketResult<TradeReceipt> {
        self.trade(ctx, opinion_id, submission, TradeKind::Answer)
            .log_rejection("submit_answer", ctx)
    }

    pub fn submit_final_answer(
        &mut self,
        ctx: &CallContext,
        opinion_id: OpinionId,
        submission: AnswerSubmission,
    ) -> MarketResult<TradeReceipt> {
        self.trade(ctx, opinion_id, submission, TradeKind::Final)
            .log_rejection("submit_final_answer", ctx)
    }

    fn trade(
        &mut self,
        ctx: &CallContext,
        opinion_id: OpinionId,
        submission: AnswerSubmission,
        kind: TradeKind,
    ) -> MarketResult<TradeReceipt> {
        let config = self.begin(ctx)?;
        let mut plan =
            self.opinions
                .plan_trade(opinion_id, &ctx.caller, submission, kind, &config, ctx.block, &self.limiter)?;
        let reward = self.reroute_pool_share(&mut plan, &config)?;

        self.bank.pull(&ctx.caller, plan.price)?;
        self.ledger.record_inflow(plan.price);

        self.commit_trade(plan, reward, ctx)
    }

    /// Replace a pool-held owner share with its contributor distribution
    fn reroute_pool_share(&self, plan: &mut TradePlan, config: &MarketConfig) -> MarketResult<Option<RewardPlan>> {
        let Some(pool_id) = plan.previous_owner.as_pool() else {
            return Ok(None);
        };
        let owner = Recipient::Account(plan.previous_owner.clone());
        let policy = config.pool_reward_policy;
        let mut reward = None;

        plan.settlement.reroute(&owner, |share| -> MarketResult<_> {
            let (settlement, rewards) = self.pools.plan_rewards(pool_id, share, policy)?;
            reward = Some(rewards);
            Ok(settlement)
        })?;
        Ok(reward)
    }

    fn commit_trade(
        &mut self,
        plan: TradePlan,
        reward: Option<RewardPlan>,
        ctx: &CallContext,
    ) -> MarketResult<TradeReceipt> {
        let receipt = self
            .opinions
            .commit_trade(plan, ctx, &mut self.ledger, &mut self.limiter, &mut self.events)?;
        if let Some(reward) = reward {
            self.pools.commit_rewards(&reward, ctx, &mut self.events)?;
        }
        Ok(receipt)
    }

    /// Price the next answer trade would cost in the caller's period
    pub fn quote_next_price(&self, ctx: &CallContext, opinion_id: OpinionId) -> MarketResult<Amount> {
        let config = self.config.current();
        Ok(self.opinions.quote(opinion_id, &config, ctx.block)?)
    }

    // ========================================================================
    // QUESTION MARKET
    // ========================================================================

    pub fn list_question_for_sale(&mut self, ctx: &CallContext, opinion_id: OpinionId, price: Amount) -> MarketResult<()> {
        let result = self.begin(ctx).and_then(|_| {
            QuestionMarket::new(&mut self.opinions).list(opinion_id, price, ctx, &mut self.events)
        });
        result.log_rejection("list_question_for_sale", ctx)
    }

    pub fn cancel_question_sale(&mut self, ctx: &CallContext, opinion_id: OpinionId) -> MarketResult<()> {
        let result = self
            .begin(ctx)
            .and_then(|_| QuestionMarket::new(&mut self.opinions).cancel(opinion_id, ctx, &mut self.events));
        result.log_rejection("cancel_question_sale", ctx)
    }

    pub fn buy_question(&mut self, ctx: &CallContext, opinion_id: OpinionId) -> MarketResult<QuestionPurchaseReceipt> {
        self.try_buy_question(ctx, opinion_id).log_rejection("buy_question", ctx)
    }

    fn try_buy_question(&mut self, ctx: &CallContext, opinion_id: OpinionId) -> MarketResult<QuestionPurchaseReceipt> {
        let config = self.begin(ctx)?;
        let mut market = QuestionMarket::new(&mut self.opinions);
        let plan = market.plan_purchase(opinion_id, &ctx.caller, &config)?;

        self.bank.pull(&ctx.caller, plan.price)?;
        self.ledger.record_inflow(plan.price);

        market.commit_purchase(plan, ctx, &mut self.ledger, &mut self.events)
    }

    // ========================================================================
    // FEES
    // ========================================================================

    /// Pay the caller's entire accumulated balance out of custody
    pub fn claim_accumulated_fees(&mut self, ctx: &CallContext) -> MarketResult<Amount> {
        self.try_claim(ctx).log_rejection("claim_accumulated_fees", ctx)
    }

    fn try_claim(&mut self, ctx: &CallContext) -> MarketResult<Amount> {
        self.begin(ctx)?;
        let amount = self.ledger.claimable(&ctx.caller)?;

        self.bank.push(&ctx.caller, amount)?;
        self.ledger.take(&ctx.caller);
        self.ledger.record_outflow(amount);

        self.events.append(
            ctx.block,
            ctx.timestamp,
            LedgerEvent::FeesClaimed { account: ctx.caller.clone(), amount },
        );
        info!(account = %ctx.caller, amount, "fees claimed");
        Ok(amount)
    }

    /// Pay the treasury balance to the configured treasury account
    pub fn withdraw_treasury(&mut self, ctx: &CallContext) -> MarketResult<Amount> {
        self.try_withdraw_treasury(ctx).log_rejection("withdraw_treasury", ctx)
    }

    fn try_withdraw_treasury(&mut self, ctx: &CallContext) -> MarketResult<Amount> {
        let config = self.begin_admin(ctx)?;
        let amount = self.ledger.treasury_balance();
        if amount == 0 {
            return Err(StateError::NoFeesToClaim.into());
        }

        self.bank.push(&config.treasury, amount)?;
        self.ledger.take_treasury();
        self.ledger.record_outflow(amount);

        self.events.append(
            ctx.block,
            ctx.timestamp,
            LedgerEvent::TreasuryWithdrawn { to: config.treasury.clone(), amount },
        );
        info!(to = %config.treasury, amount, by = %ctx.caller, "treasury withdrawn");
        Ok(amount)
    }

    // ========================================================================
    // ADMIN
    // ========================================================================

    pub fn deactivate_opinion(&mut self, ctx: &CallContext, opinion_id: OpinionId) -> MarketResult<()> {
        let result = self
            .begin_admin(ctx)
            .and_then(|_| Ok(self.opinions.deactivate(opinion_id, ctx, &mut self.events)?));
        result.log_rejection("deactivate_opinion", ctx)
    }

    /// Replace the configuration; applies to subsequent operations only
    pub fn update_config(&mut self, ctx: &CallContext, config: MarketConfig) -> MarketResult<()> {
        let result = self.begin_admin(ctx).and_then(|_| {
            self.config.update(config)?;
            self.events
                .append(ctx.block, ctx.timestamp, LedgerEvent::ConfigUpdated { by: ctx.caller.clone() });
            info!(by = %ctx.caller, "config updated");
            Ok(())
        });
        result.log_rejection("update_config", ctx)
    }

    pub fn set_paused(&mut self, ctx: &CallContext, paused: bool) -> MarketResult<()> {
        let mut config = self.config.current();
        config.paused = paused;
        self.update_config(ctx, config)
    }

    // ========================================================================
    // POOLS
    // ========================================================================

    pub fn create_pool(&mut self, ctx: &CallContext, request: NewPool) -> MarketResult<PoolId> {
        self.try_create_pool(ctx, request).log_rejection("create_pool", ctx)
    }

    fn try_create_pool(&mut self, ctx: &CallContext, request: NewPool) -> MarketResult<PoolId> {
        let config = self.begin(ctx)?;
        let plan = self.pools.plan_create(&config, &self.opinions, ctx, request)?;
        let execution = self.plan_pool_execution(&plan.pool, &config, ctx, false)?;

        self.bank.pull(&ctx.caller, plan.charge)?;
        self.ledger.record_inflow(plan.charge);

        let pool_id = self.pools.commit_create(plan, ctx, &mut self.ledger, &mut self.events);
        if let Some(execution) = execution {
            self.commit_pool_execution(execution, ctx)?;
        }
        Ok(pool_id)
    }

    pub fn contribute_to_pool(
        &mut self,
        ctx: &CallContext,
        pool_id: PoolId,
        amount: Amount,
    ) -> MarketResult<ContributionOutcome> {
        self.try_contribute(ctx, pool_id, amount).log_rejection("contribute_to_pool", ctx)
    }

    fn try_contribute(&mut self, ctx: &CallContext, pool_id: PoolId, amount: Amount) -> MarketResult<ContributionOutcome> {
        let config = self.begin(ctx)?;
        let plan = self
            .pools
            .plan_contribution(pool_id, &ctx.caller, amount, &self.opinions, ctx.timestamp)?;
        let execution = self.plan_pool_execution(plan.projected(), &config, ctx, false)?;
        let total = plan.projected().total;

        self.bank.pull(&ctx.caller, amount)?;
        self.ledger.record_inflow(amount);

        self.pools.commit_contribution(plan, ctx, &mut self.events);
        let executed = execution.is_some();
        if let Some(execution) = execution {
            self.commit_pool_execution(execution, ctx)?;
        }
        Ok(ContributionOutcome { pool_id, total, executed })
    }

    /// Execute an Active pool whose escrow already covers the current quote
    pub fn execute_pool(&mut self, ctx: &CallContext, pool_id: PoolId) -> MarketResult<TradeReceipt> {
        self.try_execute_pool(ctx, pool_id).log_rejection("execute_pool", ctx)
    }

    fn try_execute_pool(&mut self, ctx: &CallContext, pool_id: PoolId) -> MarketResult<TradeReceipt> {
        let config = self.begin(ctx)?;
        let pool = self.pools.get(pool_id)?;
        pool.ensure_accepting(ctx.timestamp)?;

        let execution = self
            .plan_pool_execution(pool, &config, ctx, true)?
            .ok_or(StateError::PoolNotActive(pool_id))?;
        self.commit_pool_execution(execution, ctx)
    }

    /// Plan the pool's trade if its escrow covers the quote. With `required`
    /// an uncovered quote is an error instead of `None`.
    fn plan_pool_execution(
        &self,
        pool: &Pool,
        config: &MarketConfig,
        ctx: &CallContext,
        required: bool,
    ) -> MarketResult<Option<PoolExecution>> {
        let quote = self.opinions.quote(pool.opinion_id, config, ctx.block)?;
        if pool.escrow < quote && !required {
            return Ok(None);
        }
        let execution = pool.plan_execution(quote, ctx.timestamp)?;

        let mut trade = self.opinions.plan_trade(
            pool.opinion_id,
            &pool.address(),
            AnswerSubmission::new(pool.proposed_answer.clone()),
            TradeKind::Answer,
            config,
            ctx.block,
            &self.limiter,
        )?;
        let reward = self.reroute_pool_share(&mut trade, config)?;

        Ok(Some(PoolExecution { trade, reward, execution }))
    }

    fn commit_pool_execution(&mut self, execution: PoolExecution, ctx: &CallContext) -> MarketResult<TradeReceipt> {
        let receipt = self.commit_trade(execution.trade, execution.reward, ctx)?;
        self.pools
            .commit_execution(execution.execution, ctx, &mut self.ledger, &mut self.events)?;
        Ok(receipt)
    }

    /// Mark an Active pool past its deadline as Expired
    pub fn expire_pool(&mut self, ctx: &CallContext, pool_id: PoolId) -> MarketResult<()> {
        let result = self
            .begin(ctx)
            .and_then(|_| Ok(self.pools.expire(pool_id, ctx, &mut self.events)?));
        result.log_rejection("expire_pool", ctx)
    }

    /// Return the caller's exact contribution to an expired pool
    pub fn refund(&mut self, ctx: &CallContext, pool_id: PoolId) -> MarketResult<Amount> {
        self.try_refund(ctx, pool_id).log_rejection("refund", ctx)
    }

    fn try_refund(&mut self, ctx: &CallContext, pool_id: PoolId) -> MarketResult<Amount> {
        self.begin(ctx)?;
        let plan = self.pools.plan_refund(pool_id, &ctx.caller, ctx.timestamp)?;
        let amount = plan.amount;

        self.bank.push(&ctx.caller, amount)?;
        self.ledger.record_outflow(amount);

        self.pools.commit_refund(plan, ctx, &mut self.events)?;
        Ok(amount)
    }

    // ========================================================================
    // VIEWS
    // ========================================================================

    pub fn opinion(&self, opinion_id: OpinionId) -> MarketResult<&Opinion> {
        Ok(self.opinions.get(opinion_id)?)
    }

    pub fn answer_history(&self, opinion_id: OpinionId) -> MarketResult<&[AnswerRecord]> {
        Ok(self.opinions.history(opinion_id)?)
    }

    pub fn opinions(&self) -> impl Iterator<Item = &Opinion> {
        self.opinions.iter()
    }

    pub fn pool(&self, pool_id: PoolId) -> MarketResult<&Pool> {
        Ok(self.pools.get(pool_id)?)
    }

    pub fn pool_contributors(&self, pool_id: PoolId) -> MarketResult<Vec<Contributor>> {
        Ok(self.pools.contributors(pool_id)?)
    }

    pub fn question_listings(&self) -> Vec<QuestionListing> {
        QuestionMarket::open_listings(&self.opinions)
    }

    pub fn accumulated_balance(&self, address: &Address) -> Amount {
        self.ledger.balance(address)
    }

    pub fn treasury_balance(&self) -> Amount {
        self.ledger.treasury_balance()
    }

    pub fn trades_in_period(&self, address: &Address, period: u64) -> u32 {
        self.limiter.trades_in_period(address, period)
    }

    pub fn events(&self) -> &[EventEntry] {
        self.events.entries()
    }

    pub fn events_since(&self, sequence: u64) -> &[EventEntry] {
        self.events.since(sequence)
    }

    pub fn subscribe(&mut self, sink: Box<dyn EventSink>) {
        self.events.subscribe(sink);
    }

    pub fn config(&self) -> MarketConfig {
        self.config.current()
    }

    /// Handle for updating configuration from outside the engine
    pub fn config_handle(&self) -> SharedConfig {
        self.config.clone()
    }

    pub fn bank(&self) -> &B {
        &self.bank
    }

    pub fn bank_mut(&mut self) -> &mut B {
        &mut self.bank
    }

    pub fn conservation_report(&self) -> ConservationReport {
        ConservationReport {
            balances: self.ledger.total_accumulated(),
            treasury: self.ledger.treasury_balance() as u128,
            escrow: self.pools.escrowed(),
            paid_in: self.ledger.paid_in(),
            paid_out: self.ledger.paid_out(),
            custody: self.bank.custody_balance() as u128,
        }
    }
}

// ============================================================================
// PERSISTENCE
// ============================================================================

impl<B: CurrencyService + Serialize + DeserializeOwned> OpinionMarket<B> {
    pub fn to_json(&self) -> Result<String, String> {
        #[derive(Serialize)]
        struct PersistedState<'a, B> {
            config: MarketConfig,
            bank: &'a B,
            ledger: &'a FeeLedger,
            limiter: &'a RateLimiter,
            opinions: &'a OpinionRegistry,
            pools: &'a PoolRegistry,
            events: &'a EventLog,
        }

        let state = PersistedState {
            config: self.config.current(),
            bank: &self.bank,
            ledger: &self.ledger,
            limiter: &self.limiter,
            opinions: &self.opinions,
            pools: &self.pools,
            events: &self.events,
        };
        serde_json::to_string_pretty(&state).map_err(|e| format!("Failed to serialize state: {}", e))
    }

    pub fn from_json(json: &str) -> Result<Self, String> {
        #[derive(Deserialize)]
        struct PersistedState<B> {
            config: MarketConfig,
            bank: B,
            ledger: FeeLedger,
            limiter: RateLimiter,
            opinions: OpinionRegistry,
            pools: PoolRegistry,
            events: EventLog,
        }

        let state: PersistedState<B> =
            serde_json::from_str(json).map_err(|e| format!("Failed to deserialize state: {}", e))?;
        state
            .config
            .validate()
            .map_err(|e| format!("Invalid persisted config: {}", e))?;
        state
            .events
            .verify_chain()
            .map_err(|seq| format!("Event log hash chain broken at sequence {}", seq))?;

        Ok(Self {
            config: SharedConfig::new(state.config),
            bank: state.bank,
            ledger: state.ledger,
            limiter: state.limiter,
            opinions: state.opinions,
            pools: state.pools,
            events: state.events,
        })
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), String> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| format!("Failed to create {}: {}", dir.display(), e))?;
        }
        fs::write(path, self.to_json()?).map_err(|e| format!("Failed to write state file: {}", e))?;
        info!(path = %path.display(), events = self.events.len(), "state saved");
        Ok(())
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        let market = Self::from_json(&json)?;
        info!(path = %path.display(), opinions = market.opinions.len(), pools = market.pools.len(), "state restored");
        Ok(market)
    }
}

impl Default for OpinionMarket<InMemoryBank> {
    fn default() -> Self {
        Self::new(SharedConfig::default(), InMemoryBank::new())
    }
}
