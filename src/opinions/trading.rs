// ============================================================================
// Answer Trading - price discovery and fee settlement per trade
// ============================================================================
//
// Check order for every trade:
//   1. input validation
//   2. opinion state (active, not final, trader is not already the owner)
//   3. rate limiter
//   4. pricing + settlement plan
//
// Nothing is priced or settled for a trade rejected at steps 1-3.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{validate_optional_text, validate_text, AnswerRecord, OpinionRegistry};
use crate::config::MarketConfig;
use crate::errors::{FundsError, MarketResult, StateError, ValidationError};
use crate::events::{EventLog, LedgerEvent};
use crate::ledger::{plan_by_shares, FeeLedger, Recipient, Settlement, ShareLine};
use crate::models::{Address, Amount, CallContext, OpinionId};
use crate::pricing::{PriceCalculator, PriceInputs};
use crate::rate_limit::{RateLimiter, TradePermit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeKind {
    /// Regular answer trade priced by the bonding curve
    Answer,
    /// Terminal buyout at the fixed final-answer price
    Final,
}

/// New answer text supplied by a trader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSubmission {
    pub answer: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

impl AnswerSubmission {
    pub fn new(answer: impl Into<String>) -> Self {
        Self { answer: answer.into(), description: None, link: None }
    }

    pub fn validate(&self, config: &MarketConfig) -> Result<(), ValidationError> {
        validate_text("answer", &self.answer, config.max_answer_len)?;
        validate_optional_text("description", self.description.as_deref(), config.max_description_len)?;
        validate_optional_text("link", self.link.as_deref(), config.max_link_len)?;
        Ok(())
    }
}

/// A trade that passed every check, waiting for payment
#[derive(Debug, Clone)]
pub struct TradePlan {
    pub opinion_id: OpinionId,
    pub kind: TradeKind,
    pub trader: Address,
    pub previous_owner: Address,
    pub question_owner: Address,
    pub submission: AnswerSubmission,
    pub price: Amount,
    pub owner_share: Amount,
    pub creator_share: Amount,
    pub platform_share: Amount,
    /// Settlement of `price`; may be rerouted (pool-held positions) before commit
    pub settlement: Settlement,
    permit: TradePermit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub opinion_id: OpinionId,
    pub kind: TradeKind,
    pub new_owner: Address,
    pub previous_owner: Address,
    pub price: Amount,
    pub owner_share: Amount,
    pub creator_share: Amount,
    pub platform_share: Amount,
    pub settlement_id: String,
}

impl OpinionRegistry {
    /// Price the next answer trade would cost in `period`
    pub fn quote(&self, opinion_id: OpinionId, config: &MarketConfig, period: u64) -> Result<Amount, StateError> {
        let opinion = self.get(opinion_id)?;
        opinion.ensure_tradable()?;

        let inputs = PriceInputs::from_history(
            opinion.current_price,
            opinion.answer_history.iter().map(|r| (&r.owner, r.block)),
            period,
            config.competition_window,
        );
        Ok(PriceCalculator::from_config(config).next_price(&inputs))
    }

    /// Run every check for a trade and compute its price and settlement
    pub fn plan_trade(
        &self,
        opinion_id: OpinionId,
        trader: &Address,
        submission: AnswerSubmission,
        kind: TradeKind,
        config: &MarketConfig,
        period: u64,
        limiter: &RateLimiter,
    ) -> MarketResult<TradePlan> {
        submission.validate(config)?;

        let opinion = self.get(opinion_id)?;
        opinion.ensure_tradable()?;
        if kind == TradeKind::Answer && opinion.current_answer_owner == *trader {
            return Err(StateError::SameOwner.into());
        }

        let permit = limiter.check(trader, opinion_id, period, config.max_trades_per_period)?;

        let price = match kind {
            TradeKind::Answer => self.quote(opinion_id, config, period)?,
            TradeKind::Final => config.final_answer_price,
        };
        opinion.total_volume.checked_add(price).ok_or(FundsError::Overflow)?;

        let split = config.trade_split;
        let settlement = plan_by_shares(
            price,
            &[
                ShareLine::new(Recipient::Account(opinion.current_answer_owner.clone()), split.owner_bps),
                ShareLine::new(Recipient::Account(opinion.question_owner.clone()), split.creator_bps),
                ShareLine::new(Recipient::Treasury, split.platform_bps),
            ],
        )?;

        Ok(TradePlan {
            opinion_id,
            kind,
            trader: trader.clone(),
            previous_owner: opinion.current_answer_owner.clone(),
            question_owner: opinion.question_owner.clone(),
            submission,
            price,
            owner_share: settlement.credits[0].1,
            creator_share: settlement.credits[1].1,
            platform_share: settlement.credits[2].1 + settlement.remainder,
            settlement,
            permit,
        })
    }

    /// Apply a paid trade: settlement, rate-limit record, opinion update, history
    pub fn commit_trade(
        &mut self,
        mut plan: TradePlan,
        ctx: &CallContext,
        ledger: &mut FeeLedger,
        limiter: &mut RateLimiter,
        events: &mut EventLog,
    ) -> MarketResult<TradeReceipt> {
        let opinion = self.get_mut(plan.opinion_id)?;

        limiter.record(plan.permit);
        ledger.apply(&mut plan.settlement);

        opinion.last_price = opinion.current_price;
        opinion.current_price = plan.price;
        opinion.total_volume = opinion.total_volume.saturating_add(plan.price);
        opinion.current_answer = plan.submission.answer.clone();
        opinion.current_description = plan.submission.description.clone();
        opinion.current_link = plan.submission.link.clone();
        opinion.current_answer_owner = plan.trader.clone();
        opinion.answer_history.push(AnswerRecord {
            answer: plan.submission.answer.clone(),
            description: plan.submission.description.clone(),
            link: plan.submission.link.clone(),
            owner: plan.trader.clone(),
            price: plan.price,
            block: ctx.block,
            timestamp: ctx.timestamp,
        });
        if plan.kind == TradeKind::Final {
            opinion.is_final = true;
            opinion.sale_price = None;
        }

        let event = match plan.kind {
            TradeKind::Answer => LedgerEvent::AnswerSubmitted {
                opinion_id: plan.opinion_id,
                previous_owner: plan.previous_owner.clone(),
                new_owner: plan.trader.clone(),
                answer: plan.submission.answer.clone(),
                price: plan.price,
            },
            TradeKind::Final => LedgerEvent::FinalAnswerSubmitted {
                opinion_id: plan.opinion_id,
                owner: plan.trader.clone(),
                answer: plan.submission.answer.clone(),
                price: plan.price,
            },
        };
        events.append(ctx.block, ctx.timestamp, event);
        events.append(
            ctx.block,
            ctx.timestamp,
            LedgerEvent::FeesSettled {
                settlement_id: plan.settlement.id.clone(),
                opinion_id: Some(plan.opinion_id),
                amount: plan.settlement.amount,
                credits: plan.settlement.credits.clone(),
                remainder: plan.settlement.remainder,
            },
        );

        info!(
            opinion_id = plan.opinion_id,
            kind = ?plan.kind,
            trader = %plan.trader,
            previous_owner = %plan.previous_owner,
            price = plan.price,
            "answer trade settled"
        );

        Ok(TradeReceipt {
            opinion_id: plan.opinion_id,
            kind: plan.kind,
            new_owner: plan.trader,
            previous_owner: plan.previous_owner,
            price: plan.price,
            owner_share: plan.owner_share,
            creator_share: plan.creator_share,
            platform_share: plan.platform_share,
            settlement_id: plan.settlement.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeeSplit;
    use crate::errors::{MarketError, RateLimitError};
    use crate::opinions::NewOpinion;

    struct Fixture {
        registry: OpinionRegistry,
        ledger: FeeLedger,
        limiter: RateLimiter,
        events: EventLog,
        config: MarketConfig,
        id: OpinionId,
    }

    fn fixture(split: FeeSplit) -> Fixture {
        let config = MarketConfig {
            min_price: 10,
            max_initial_price: 1_000,
            min_creation_fee: 1,
            trade_split: split,
            ..MarketConfig::default()
        };
        let mut registry = OpinionRegistry::new();
        let mut ledger = FeeLedger::new();
        let mut events = EventLog::new();
        let ctx = CallContext::new("carol", 1, 100);
        let plan = registry
            .plan_create(
                &config,
                &ctx.caller,
                NewOpinion {
                    question: "Best chain?".into(),
                    answer: "Ethereum".into(),
                    description: None,
                    initial_price: 50,
                    categories: vec!["Crypto".into()],
                },
            )
            .unwrap();
        let id = registry.commit_create(plan, &ctx, &mut ledger, &mut events);
        Fixture { registry, ledger, limiter: RateLimiter::new(), events, config, id }
    }

    fn trade(f: &mut Fixture, trader: &str, block: u64, kind: TradeKind) -> MarketResult<TradeReceipt> {
        let ctx = CallContext::new(trader, block, block * 10);
        let plan = f.registry.plan_trade(
            f.id,
            &ctx.caller,
            AnswerSubmission::new(format!("answer by {}", trader)),
            kind,
            &f.config,
            ctx.block,
            &f.limiter,
        )?;
        f.registry.commit_trade(plan, &ctx, &mut f.ledger, &mut f.limiter, &mut f.events)
    }

    #[test]
    fn test_first_trade_price_and_split() {
        let mut f = fixture(FeeSplit::percent(87, 3, 10));
        let receipt = trade(&mut f, "alice", 2, TradeKind::Answer).unwrap();

        assert!((50..=150).contains(&receipt.price));
        assert_eq!(receipt.owner_share + receipt.creator_share + receipt.platform_share, receipt.price);
        assert_eq!(receipt.previous_owner, Address::from("carol"));

        let opinion = f.registry.get(f.id).unwrap();
        assert_eq!(opinion.current_answer_owner, Address::from("alice"));
        assert_eq!(opinion.current_price, receipt.price);
        assert_eq!(opinion.last_price, 50);
        assert_eq!(opinion.total_volume, 50 + receipt.price);
        assert_eq!(opinion.answer_history.len(), 2);
    }

    #[test]
    fn test_same_owner_rejected() {
        let mut f = fixture(FeeSplit::default());
        let err = trade(&mut f, "carol", 2, TradeKind::Answer).unwrap_err();
        assert_eq!(err, MarketError::State(StateError::SameOwner));
        assert_eq!(f.registry.get(f.id).unwrap().answer_history.len(), 1);
    }

    #[test]
    fn test_rate_limit_blocks_before_settlement() {
        let mut f = fixture(FeeSplit::default());
        trade(&mut f, "alice", 2, TradeKind::Answer).unwrap();
        trade(&mut f, "bob", 2, TradeKind::Answer).unwrap();
        let treasury_before = f.ledger.treasury_balance();

        let err = trade(&mut f, "alice", 2, TradeKind::Answer).unwrap_err();
        assert_eq!(err, MarketError::RateLimit(RateLimitError::OneTradePerPeriod { opinion_id: f.id }));
        assert_eq!(f.ledger.treasury_balance(), treasury_before);

        // next period alice can buy back
        trade(&mut f, "alice", 3, TradeKind::Answer).unwrap();
    }

    #[test]
    fn test_price_never_exceeds_cap() {
        let mut f = fixture(FeeSplit::default());
        let traders = ["a", "b", "c", "d", "e", "f", "g"];
        for (i, trader) in traders.iter().enumerate() {
            let before = f.registry.get(f.id).unwrap().current_price;
            let receipt = trade(&mut f, trader, 2 + i as u64, TradeKind::Answer).unwrap();
            assert!(receipt.price >= f.config.min_price);
            assert!(receipt.price <= before * 3);
        }
    }

    #[test]
    fn test_final_answer_is_terminal() {
        let mut f = fixture(FeeSplit::default());
        let receipt = trade(&mut f, "alice", 2, TradeKind::Final).unwrap();
        assert_eq!(receipt.price, f.config.final_answer_price);
        assert!(f.registry.get(f.id).unwrap().is_final);

        let err = trade(&mut f, "bob", 3, TradeKind::Answer).unwrap_err();
        assert_eq!(err, MarketError::State(StateError::OpinionIsFinal(f.id)));
        let err = trade(&mut f, "bob", 3, TradeKind::Final).unwrap_err();
        assert_eq!(err, MarketError::State(StateError::OpinionIsFinal(f.id)));
        assert!(f.registry.quote(f.id, &f.config, 3).is_err());
    }

    #[test]
    fn test_invalid_link_rejected() {
        let f = fixture(FeeSplit::default());
        let mut submission = AnswerSubmission::new("Solana");
        submission.link = Some("x".repeat(261));
        let err = f
            .registry
            .plan_trade(f.id, &Address::from("alice"), submission, TradeKind::Answer, &f.config, 2, &f.limiter)
            .unwrap_err();
        assert_eq!(err.tag(), "TextTooLong");
    }

    #[test]
    fn test_creator_royalty_goes_to_question_owner() {
        let mut f = fixture(FeeSplit::percent(95, 3, 2));
        let receipt = trade(&mut f, "alice", 2, TradeKind::Answer).unwrap();
        // carol is both previous owner and question owner
        assert_eq!(
            f.ledger.balance(&Address::from("carol")),
            receipt.owner_share + receipt.creator_share
        );
    }
}
