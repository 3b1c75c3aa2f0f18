/// Question Market
///
/// Facade over the opinion registry's listing/purchase pair. Adds the
/// buyer-side checks: no buying your own question, no buying an inactive or
/// unlisted one.
use crate::config::MarketConfig;
use crate::errors::{MarketResult, StateError};
use crate::events::EventLog;
use crate::ledger::FeeLedger;
use crate::models::{Address, Amount, CallContext, OpinionId};
use crate::opinions::{OpinionRegistry, QuestionPurchasePlan, QuestionPurchaseReceipt};

/// An open question listing
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct QuestionListing {
    pub opinion_id: OpinionId,
    pub question: String,
    pub seller: Address,
    pub price: Amount,
}

pub struct QuestionMarket<'a> {
    opinions: &'a mut OpinionRegistry,
}

impl<'a> QuestionMarket<'a> {
    pub fn new(opinions: &'a mut OpinionRegistry) -> Self {
        Self { opinions }
    }

    pub fn list(&mut self, opinion_id: OpinionId, price: Amount, ctx: &CallContext, events: &mut EventLog) -> MarketResult<()> {
        self.opinions.list_question_for_sale(opinion_id, price, ctx, events)
    }

    pub fn cancel(&mut self, opinion_id: OpinionId, ctx: &CallContext, events: &mut EventLog) -> MarketResult<()> {
        self.opinions.cancel_question_sale(opinion_id, ctx, events)
    }

    pub fn plan_purchase(
        &self,
        opinion_id: OpinionId,
        buyer: &Address,
        config: &MarketConfig,
    ) -> MarketResult<QuestionPurchasePlan> {
        let opinion = self.opinions.get(opinion_id)?;
        if !opinion.is_active {
            return Err(StateError::OpinionNotActive(opinion_id).into());
        }
        if opinion.sale_price.is_none() {
            return Err(StateError::NotForSale(opinion_id).into());
        }
        if opinion.question_owner == *buyer {
            return Err(StateError::CannotBuyOwnQuestion.into());
        }
        self.opinions.plan_question_purchase(opinion_id, buyer, config)
    }

    pub fn commit_purchase(
        &mut self,
        plan: QuestionPurchasePlan,
        ctx: &CallContext,
        ledger: &mut FeeLedger,
        events: &mut EventLog,
    ) -> MarketResult<QuestionPurchaseReceipt> {
        self.opinions.commit_question_purchase(plan, ctx, ledger, events)
    }

    pub fn listings(&self) -> Vec<QuestionListing> {
        Self::open_listings(self.opinions)
    }

    /// Every open listing, ordered by opinion id
    pub fn open_listings(opinions: &OpinionRegistry) -> Vec<QuestionListing> {
        opinions
            .iter()
            .filter(|o| o.is_active && !o.is_final)
            .filter_map(|o| {
                o.sale_price.map(|price| QuestionListing {
                    opinion_id: o.id,
                    question: o.question.clone(),
                    seller: o.question_owner.clone(),
                    price,
                })
            })
            .collect()
    }
}
