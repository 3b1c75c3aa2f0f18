// ============================================================================
// Opinion Registry - Opinion entities and their lifecycle
// ============================================================================
//
// Lifecycle:
//
//   Active ──(submit_answer)──> Active ──(submit_final_answer)──> Final
//      │
//      └──(deactivate, admin only)──> Deactivated
//
// Opinions are never removed. Once final, only `is_active` may change.
// Every operation is split into a pure `plan_*` step that can fail and an
// infallible `commit_*` step, so the engine can move funds between them.
//
//   trading:       answer trades and final-answer buyouts
//   question_sale: resale of the question-owner role
//
// ============================================================================

pub mod question_sale;
pub mod trading;

pub use question_sale::*;
pub use trading::*;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::info;

use crate::config::MarketConfig;
use crate::errors::{StateError, ValidationError};
use crate::events::{EventLog, LedgerEvent};
use crate::ledger::{FeeLedger, Recipient, Settlement, ShareLine};
use crate::models::{Address, Amount, CallContext, OpinionId};

pub const MIN_CATEGORIES: usize = 1;
pub const MAX_CATEGORIES: usize = 3;

// ============================================================================
// OPINION
// ============================================================================

/// One accepted answer in an opinion's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub answer: String,
    pub description: Option<String>,
    pub link: Option<String>,
    pub owner: Address,
    pub price: Amount,
    /// Period marker of the trade
    pub block: u64,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpinionStatus {
    Active,
    Final,
    Deactivated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opinion {
    pub id: OpinionId,
    pub question: String,
    pub current_answer: String,
    pub current_description: Option<String>,
    pub current_link: Option<String>,
    pub current_answer_owner: Address,
    pub creator: Address,
    /// Holder of the creator royalty; starts as the creator
    pub question_owner: Address,
    /// Price paid by the latest trade (initial price before any trade)
    pub current_price: Amount,
    /// Price paid by the trade before that
    pub last_price: Amount,
    pub total_volume: Amount,
    /// Asking price while the question is listed for sale
    pub sale_price: Option<Amount>,
    pub is_active: bool,
    pub is_final: bool,
    pub categories: Vec<String>,
    pub answer_history: Vec<AnswerRecord>,
    pub created_at: u64,
}

impl Opinion {
    pub fn status(&self) -> OpinionStatus {
        if !self.is_active {
            OpinionStatus::Deactivated
        } else if self.is_final {
            OpinionStatus::Final
        } else {
            OpinionStatus::Active
        }
    }

    /// Active and not final
    pub fn ensure_tradable(&self) -> Result<(), StateError> {
        if !self.is_active {
            return Err(StateError::OpinionNotActive(self.id));
        }
        if self.is_final {
            return Err(StateError::OpinionIsFinal(self.id));
        }
        Ok(())
    }

    pub fn trade_count(&self) -> usize {
        self.answer_history.len().saturating_sub(1)
    }
}

// ============================================================================
// CREATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOpinion {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub description: Option<String>,
    pub initial_price: Amount,
    pub categories: Vec<String>,
}

/// Validated creation, ready to commit once the fee is paid
#[derive(Debug, Clone)]
pub struct CreatePlan {
    request: NewOpinion,
    pub creator: Address,
    pub creation_fee: Amount,
    pub settlement: Settlement,
}

// ============================================================================
// REGISTRY
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpinionRegistry {
    opinions: BTreeMap<OpinionId, Opinion>,
    next_id: OpinionId,
}

impl OpinionRegistry {
    pub fn new() -> Self {
        Self { opinions: BTreeMap::new(), next_id: 1 }
    }

    pub fn get(&self, id: OpinionId) -> Result<&Opinion, StateError> {
        self.opinions.get(&id).ok_or(StateError::OpinionNotFound(id))
    }

    fn get_mut(&mut self, id: OpinionId) -> Result<&mut Opinion, StateError> {
        self.opinions.get_mut(&id).ok_or(StateError::OpinionNotFound(id))
    }

    pub fn len(&self) -> usize {
        self.opinions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.opinions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Opinion> {
        self.opinions.values()
    }

    pub fn history(&self, id: OpinionId) -> Result<&[AnswerRecord], StateError> {
        Ok(&self.get(id)?.answer_history)
    }

    /// Validate a creation request and price its fee
    pub fn plan_create(
        &self,
        config: &MarketConfig,
        creator: &Address,
        request: NewOpinion,
    ) -> Result<CreatePlan, ValidationError> {
        validate_text("question", &request.question, config.max_question_len)?;
        validate_text("answer", &request.answer, config.max_answer_len)?;
        validate_optional_text("description", request.description.as_deref(), config.max_description_len)?;
        validate_categories(&request.categories, &config.categories)?;

        if request.initial_price < config.min_price {
            return Err(ValidationError::PriceTooLow {
                price: request.initial_price,
                min: config.min_price,
            });
        }
        if request.initial_price > config.max_initial_price {
            return Err(ValidationError::PriceTooHigh {
                price: request.initial_price,
                max: config.max_initial_price,
            });
        }

        let creation_fee = config.creation_fee(request.initial_price);
        let settlement = crate::ledger::plan_by_shares(
            creation_fee,
            &[ShareLine::percent(Recipient::Treasury, 100)],
        )?;

        Ok(CreatePlan {
            request,
            creator: creator.clone(),
            creation_fee,
            settlement,
        })
    }

    /// Insert the opinion and credit its creation fee
    pub fn commit_create(
        &mut self,
        mut plan: CreatePlan,
        ctx: &CallContext,
        ledger: &mut FeeLedger,
        events: &mut EventLog,
    ) -> OpinionId {
        let id = self.next_id.max(1);
        self.next_id = id + 1;

        ledger.apply(&mut plan.settlement);

        let request = plan.request;
        let opinion = Opinion {
            id,
            question: request.question.clone(),
            current_answer: request.answer.clone(),
            current_description: request.description.clone(),
            current_link: None,
            current_answer_owner: plan.creator.clone(),
            creator: plan.creator.clone(),
            question_owner: plan.creator.clone(),
            current_price: request.initial_price,
            last_price: request.initial_price,
            total_volume: request.initial_price,
            sale_price: None,
            is_active: true,
            is_final: false,
            categories: request.categories.clone(),
            answer_history: vec![AnswerRecord {
                answer: request.answer.clone(),
                description: request.description.clone(),
                link: None,
                owner: plan.creator.clone(),
                price: request.initial_price,
                block: ctx.block,
                timestamp: ctx.timestamp,
            }],
            created_at: ctx.timestamp,
        };
        self.opinions.insert(id, opinion);

        events.append(
            ctx.block,
            ctx.timestamp,
            LedgerEvent::OpinionCreated {
                opinion_id: id,
                creator: plan.creator.clone(),
                question: request.question,
                answer: request.answer,
                initial_price: request.initial_price,
                creation_fee: plan.creation_fee,
                categories: request.categories,
            },
        );
        info!(opinion_id = id, creator = %plan.creator, fee = plan.creation_fee, "opinion created");
        id
    }

    /// Externally triggered terminal deactivation
    pub fn deactivate(&mut self, id: OpinionId, ctx: &CallContext, events: &mut EventLog) -> Result<(), StateError> {
        let opinion = self.get_mut(id)?;
        if !opinion.is_active {
            return Err(StateError::OpinionNotActive(id));
        }
        opinion.is_active = false;

        events.append(
            ctx.block,
            ctx.timestamp,
            LedgerEvent::OpinionDeactivated { opinion_id: id, by: ctx.caller.clone() },
        );
        info!(opinion_id = id, by = %ctx.caller, "opinion deactivated");
        Ok(())
    }
}

// ============================================================================
// VALIDATION HELPERS
// ============================================================================

pub fn validate_text(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyText { field });
    }
    if value.chars().count() > max {
        return Err(ValidationError::TextTooLong { field, max });
    }
    Ok(())
}

pub fn validate_optional_text(field: &'static str, value: Option<&str>, max: usize) -> Result<(), ValidationError> {
    match value {
        Some(v) if v.chars().count() > max => Err(ValidationError::TextTooLong { field, max }),
        _ => Ok(()),
    }
}

fn validate_categories(categories: &[String], allowed: &[String]) -> Result<(), ValidationError> {
    if categories.len() < MIN_CATEGORIES || categories.len() > MAX_CATEGORIES {
        return Err(ValidationError::InvalidCategoryCount(categories.len()));
    }
    let mut seen = HashSet::new();
    for category in categories {
        if !allowed.iter().any(|a| a == category) {
            return Err(ValidationError::UnknownCategory(category.clone()));
        }
        if !seen.insert(category) {
            return Err(ValidationError::DuplicateCategory(category.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UNIT;

    fn request(price: Amount, categories: &[&str]) -> NewOpinion {
        NewOpinion {
            question: "Best L2?".to_string(),
            answer: "Base".to_string(),
            description: None,
            initial_price: price,
            categories: categories.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn create(registry: &mut OpinionRegistry, ledger: &mut FeeLedger, events: &mut EventLog) -> OpinionId {
        let config = MarketConfig::default();
        let ctx = CallContext::new("carol", 1, 1_000);
        let plan = registry
            .plan_create(&config, &ctx.caller, request(10 * UNIT, &["Crypto"]))
            .unwrap();
        registry.commit_create(plan, &ctx, ledger, events)
    }

    #[test]
    fn test_create_opinion() {
        let mut registry = OpinionRegistry::new();
        let mut ledger = FeeLedger::new();
        let mut events = EventLog::new();

        let id = create(&mut registry, &mut ledger, &mut events);
        let opinion = registry.get(id).unwrap();

        assert_eq!(id, 1);
        assert_eq!(opinion.status(), OpinionStatus::Active);
        assert_eq!(opinion.current_answer_owner, Address::from("carol"));
        assert_eq!(opinion.question_owner, Address::from("carol"));
        assert_eq!(opinion.total_volume, 10 * UNIT);
        assert_eq!(opinion.answer_history.len(), 1);
        assert_eq!(opinion.trade_count(), 0);
        // 20% of 10 is below the 5 unit floor
        assert_eq!(ledger.treasury_balance(), 5 * UNIT);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_create_validation() {
        let registry = OpinionRegistry::new();
        let config = MarketConfig::default();
        let creator = Address::from("carol");

        let no_categories = registry.plan_create(&config, &creator, request(10 * UNIT, &[]));
        assert!(matches!(no_categories, Err(ValidationError::InvalidCategoryCount(0))));

        let too_many = registry.plan_create(
            &config,
            &creator,
            request(10 * UNIT, &["Crypto", "Web", "Sports", "Other"]),
        );
        assert!(matches!(too_many, Err(ValidationError::InvalidCategoryCount(4))));

        let unknown = registry.plan_create(&config, &creator, request(10 * UNIT, &["Gossip"]));
        assert!(matches!(unknown, Err(ValidationError::UnknownCategory(_))));

        let duplicate = registry.plan_create(&config, &creator, request(10 * UNIT, &["Web", "Web"]));
        assert!(matches!(duplicate, Err(ValidationError::DuplicateCategory(_))));

        let cheap = registry.plan_create(&config, &creator, request(UNIT / 2, &["Web"]));
        assert!(matches!(cheap, Err(ValidationError::PriceTooLow { .. })));

        let pricey = registry.plan_create(&config, &creator, request(101 * UNIT, &["Web"]));
        assert!(matches!(pricey, Err(ValidationError::PriceTooHigh { .. })));

        let mut long_question = request(10 * UNIT, &["Web"]);
        long_question.question = "q".repeat(53);
        assert!(matches!(
            registry.plan_create(&config, &creator, long_question),
            Err(ValidationError::TextTooLong { field: "question", .. })
        ));

        let mut empty_answer = request(10 * UNIT, &["Web"]);
        empty_answer.answer = "   ".to_string();
        assert!(matches!(
            registry.plan_create(&config, &creator, empty_answer),
            Err(ValidationError::EmptyText { field: "answer" })
        ));
    }

    #[test]
    fn test_deactivate_is_terminal() {
        let mut registry = OpinionRegistry::new();
        let mut ledger = FeeLedger::new();
        let mut events = EventLog::new();
        let id = create(&mut registry, &mut ledger, &mut events);
        let ctx = CallContext::new("admin", 2, 2_000);

        registry.deactivate(id, &ctx, &mut events).unwrap();
        assert_eq!(registry.get(id).unwrap().status(), OpinionStatus::Deactivated);
        assert_eq!(
            registry.deactivate(id, &ctx, &mut events),
            Err(StateError::OpinionNotActive(id))
        );
        assert_eq!(registry.get(id).unwrap().ensure_tradable(), Err(StateError::OpinionNotActive(id)));
    }

    #[test]
    fn test_missing_opinion() {
        let registry = OpinionRegistry::new();
        assert_eq!(registry.get(9).unwrap_err(), StateError::OpinionNotFound(9));
    }
}
