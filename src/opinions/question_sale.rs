// Question-owner resale: the holder of the creator royalty lists the
// question at a price, a buyer pays it and takes over the royalty.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::OpinionRegistry;
use crate::config::MarketConfig;
use crate::errors::{MarketResult, StateError, ValidationError};
use crate::events::{EventLog, LedgerEvent};
use crate::ledger::{plan_by_shares, FeeLedger, Recipient, Settlement, ShareLine};
use crate::models::{Address, Amount, CallContext, OpinionId};

#[derive(Debug, Clone)]
pub struct QuestionPurchasePlan {
    pub opinion_id: OpinionId,
    pub seller: Address,
    pub buyer: Address,
    pub price: Amount,
    pub settlement: Settlement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionPurchaseReceipt {
    pub opinion_id: OpinionId,
    pub seller: Address,
    pub buyer: Address,
    pub price: Amount,
    pub seller_share: Amount,
    pub platform_share: Amount,
}

impl OpinionRegistry {
    /// List the question for sale; only the current question owner may list
    pub fn list_question_for_sale(
        &mut self,
        opinion_id: OpinionId,
        price: Amount,
        ctx: &CallContext,
        events: &mut EventLog,
    ) -> MarketResult<()> {
        if price == 0 {
            return Err(ValidationError::ZeroAmount.into());
        }
        let opinion = self.get_mut(opinion_id)?;
        opinion.ensure_tradable()?;
        if opinion.question_owner != ctx.caller {
            return Err(StateError::Unauthorized.into());
        }

        opinion.sale_price = Some(price);
        events.append(
            ctx.block,
            ctx.timestamp,
            LedgerEvent::QuestionListed { opinion_id, seller: ctx.caller.clone(), price },
        );
        info!(opinion_id, seller = %ctx.caller, price, "question listed for sale");
        Ok(())
    }

    pub fn cancel_question_sale(
        &mut self,
        opinion_id: OpinionId,
        ctx: &CallContext,
        events: &mut EventLog,
    ) -> MarketResult<()> {
        let opinion = self.get_mut(opinion_id)?;
        opinion.ensure_tradable()?;
        if opinion.question_owner != ctx.caller {
            return Err(StateError::Unauthorized.into());
        }
        if opinion.sale_price.is_none() {
            return Err(StateError::NotForSale(opinion_id).into());
        }

        opinion.sale_price = None;
        events.append(
            ctx.block,
            ctx.timestamp,
            LedgerEvent::QuestionSaleCancelled { opinion_id, seller: ctx.caller.clone() },
        );
        Ok(())
    }

    pub fn plan_question_purchase(
        &self,
        opinion_id: OpinionId,
        buyer: &Address,
        config: &MarketConfig,
    ) -> MarketResult<QuestionPurchasePlan> {
        let opinion = self.get(opinion_id)?;
        opinion.ensure_tradable()?;
        let price = opinion.sale_price.ok_or(StateError::NotForSale(opinion_id))?;

        let split = config.question_sale_split;
        let settlement = plan_by_shares(
            price,
            &[
                ShareLine::new(Recipient::Account(opinion.question_owner.clone()), split.seller_bps),
                ShareLine::new(Recipient::Treasury, split.platform_bps),
            ],
        )?;

        Ok(QuestionPurchasePlan {
            opinion_id,
            seller: opinion.question_owner.clone(),
            buyer: buyer.clone(),
            price,
            settlement,
        })
    }

    /// Transfer the question-owner role and clear the listing
    pub fn commit_question_purchase(
        &mut self,
        mut plan: QuestionPurchasePlan,
        ctx: &CallContext,
        ledger: &mut FeeLedger,
        events: &mut EventLog,
    ) -> MarketResult<QuestionPurchaseReceipt> {
        let opinion = self.get_mut(plan.opinion_id)?;

        ledger.apply(&mut plan.settlement);
        opinion.question_owner = plan.buyer.clone();
        opinion.sale_price = None;

        events.append(
            ctx.block,
            ctx.timestamp,
            LedgerEvent::QuestionPurchased {
                opinion_id: plan.opinion_id,
                seller: plan.seller.clone(),
                buyer: plan.buyer.clone(),
                price: plan.price,
            },
        );
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
            seller = %plan.seller,
            buyer = %plan.buyer,
            price = plan.price,
            "question sold"
        );

        Ok(QuestionPurchaseReceipt {
            opinion_id: plan.opinion_id,
            seller_share: plan.settlement.credited_to(&Recipient::Account(plan.seller.clone())),
            platform_share: plan.settlement.credited_to(&Recipient::Treasury),
            seller: plan.seller,
            buyer: plan.buyer,
            price: plan.price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MarketError;
    use crate::opinions::NewOpinion;
    use crate::models::UNIT;

    fn setup() -> (OpinionRegistry, FeeLedger, EventLog, OpinionId) {
        let mut registry = OpinionRegistry::new();
        let mut ledger = FeeLedger::new();
        let mut events = EventLog::new();
        let ctx = CallContext::new("carol", 1, 100);
        let plan = registry
            .plan_create(
                &MarketConfig::default(),
                &ctx.caller,
                NewOpinion {
                    question: "Best editor?".into(),
                    answer: "Helix".into(),
                    description: None,
                    initial_price: 10 * UNIT,
                    categories: vec!["Technology".into()],
                },
            )
            .unwrap();
        let id = registry.commit_create(plan, &ctx, &mut ledger, &mut events);
        (registry, ledger, events, id)
    }

    #[test]
    fn test_list_and_buy_question() {
        let (mut registry, mut ledger, mut events, id) = setup();
        let carol = CallContext::new("carol", 2, 200);
        registry.list_question_for_sale(id, 100 * UNIT, &carol, &mut events).unwrap();

        let buyer = Address::from("dave");
        let plan = registry.plan_question_purchase(id, &buyer, &MarketConfig::default()).unwrap();
        let receipt = registry
            .commit_question_purchase(plan, &carol.as_caller("dave"), &mut ledger, &mut events)
            .unwrap();

        assert_eq!(receipt.seller_share, 90 * UNIT);
        assert_eq!(receipt.platform_share, 10 * UNIT);
        let opinion = registry.get(id).unwrap();
        assert_eq!(opinion.question_owner, buyer);
        assert_eq!(opinion.creator, Address::from("carol"));
        assert_eq!(opinion.sale_price, None);
        assert_eq!(ledger.balance(&Address::from("carol")), 90 * UNIT);
    }

    #[test]
    fn test_only_question_owner_lists() {
        let (mut registry, _, mut events, id) = setup();
        let mallory = CallContext::new("mallory", 2, 200);
        let err = registry.list_question_for_sale(id, UNIT, &mallory, &mut events).unwrap_err();
        assert_eq!(err, MarketError::State(StateError::Unauthorized));
    }

    #[test]
    fn test_cancel_listing() {
        let (mut registry, _, mut events, id) = setup();
        let carol = CallContext::new("carol", 2, 200);

        assert_eq!(
            registry.cancel_question_sale(id, &carol, &mut events).unwrap_err(),
            MarketError::State(StateError::NotForSale(id))
        );
        registry.list_question_for_sale(id, UNIT, &carol, &mut events).unwrap();
        registry.cancel_question_sale(id, &carol, &mut events).unwrap();
        assert!(registry
            .plan_question_purchase(id, &Address::from("dave"), &MarketConfig::default())
            .is_err());
    }

    #[test]
    fn test_zero_price_rejected() {
        let (mut registry, _, mut events, id) = setup();
        let carol = CallContext::new("carol", 2, 200);
        let err = registry.list_question_for_sale(id, 0, &carol, &mut events).unwrap_err();
        assert_eq!(err.tag(), "ZeroAmount");
    }
}
