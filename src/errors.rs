// ============================================================================
// Error Taxonomy - Opinion Market Ledger
// ============================================================================
//
// Every rejected operation surfaces exactly one specific tag from one of
// four classes. No operation mutates state before its last fallible step,
// so any error below implies the ledger is unchanged.
//
//   ValidationError - malformed input, rejected before any funds move
//   StateError      - entity in the wrong state for the operation
//   RateLimitError  - per-period trade limits
//   FundsError      - passed through from the currency collaborator
//
// ============================================================================

use serde::Serialize;
use std::fmt;

use crate::models::Amount;

/// Taxonomy class of a `MarketError`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    Validation,
    State,
    RateLimit,
    Funds,
}

// ============================================================================
// VALIDATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ValidationError {
    EmptyText { field: &'static str },
    TextTooLong { field: &'static str, max: usize },
    InvalidCategoryCount(usize),
    UnknownCategory(String),
    DuplicateCategory(String),
    PriceTooLow { price: Amount, min: Amount },
    PriceTooHigh { price: Amount, max: Amount },
    ZeroAmount,
    InvalidShares { total_bps: u64 },
    InvalidFeeSplit(String),
    DeadlineTooShort { deadline: u64, earliest: u64 },
    DeadlineTooLong { deadline: u64, latest: u64 },
    SameAnswerAsCurrent,
    InvalidConfig(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyText { field } => write!(f, "{} must not be empty", field),
            ValidationError::TextTooLong { field, max } => {
                write!(f, "{} exceeds {} characters", field, max)
            }
            ValidationError::InvalidCategoryCount(n) => {
                write!(f, "Invalid category count: {} (expected 1-3)", n)
            }
            ValidationError::UnknownCategory(c) => write!(f, "Unknown category: {}", c),
            ValidationError::DuplicateCategory(c) => write!(f, "Duplicate category: {}", c),
            ValidationError::PriceTooLow { price, min } => {
                write!(f, "Price {} is below minimum {}", price, min)
            }
            ValidationError::PriceTooHigh { price, max } => {
                write!(f, "Price {} exceeds maximum {}", price, max)
            }
            ValidationError::ZeroAmount => write!(f, "Amount must be greater than zero"),
            ValidationError::InvalidShares { total_bps } => {
                write!(f, "Settlement shares sum to {} bps, expected 10000", total_bps)
            }
            ValidationError::InvalidFeeSplit(msg) => write!(f, "Invalid fee split: {}", msg),
            ValidationError::DeadlineTooShort { deadline, earliest } => {
                write!(f, "Deadline {} is before earliest allowed {}", deadline, earliest)
            }
            ValidationError::DeadlineTooLong { deadline, latest } => {
                write!(f, "Deadline {} is after latest allowed {}", deadline, latest)
            }
            ValidationError::SameAnswerAsCurrent => {
                write!(f, "Proposed answer equals the current answer")
            }
            ValidationError::InvalidConfig(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StateError {
    Paused,
    Unauthorized,
    OpinionNotFound(u64),
    OpinionNotActive(u64),
    OpinionIsFinal(u64),
    SameOwner,
    NotForSale(u64),
    CannotBuyOwnQuestion,
    PoolNotFound(u64),
    PoolNotActive(u64),
    PoolDeadlinePassed(u64),
    PoolNotExpired(u64),
    NotAContributor,
    AlreadyRefunded,
    PoolTargetNotReached { pool_id: u64, funded: Amount, price: Amount },
    NoFeesToClaim,
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::Paused => write!(f, "Market is paused"),
            StateError::Unauthorized => write!(f, "Caller is not authorized"),
            StateError::OpinionNotFound(id) => write!(f, "Opinion not found: {}", id),
            StateError::OpinionNotActive(id) => write!(f, "Opinion not active: {}", id),
            StateError::OpinionIsFinal(id) => write!(f, "Opinion is final: {}", id),
            StateError::SameOwner => write!(f, "Trader already owns the current answer"),
            StateError::NotForSale(id) => write!(f, "Question is not listed for sale: {}", id),
            StateError::CannotBuyOwnQuestion => write!(f, "Cannot buy your own question"),
            StateError::PoolNotFound(id) => write!(f, "Pool not found: {}", id),
            StateError::PoolNotActive(id) => write!(f, "Pool not active: {}", id),
            StateError::PoolDeadlinePassed(id) => write!(f, "Pool deadline passed: {}", id),
            StateError::PoolNotExpired(id) => write!(f, "Pool has not expired: {}", id),
            StateError::NotAContributor => write!(f, "Caller has no contribution in this pool"),
            StateError::AlreadyRefunded => write!(f, "Contribution already refunded"),
            StateError::PoolTargetNotReached { pool_id, funded, price } => write!(
                f,
                "Pool {} holds {} but the answer costs {}",
                pool_id, funded, price
            ),
            StateError::NoFeesToClaim => write!(f, "No fees to claim"),
        }
    }
}

impl std::error::Error for StateError {}

// ============================================================================
// RATE LIMIT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RateLimitError {
    OneTradePerPeriod { opinion_id: u64 },
    MaxPeriodTradesExceeded { max: u32 },
}

impl fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitError::OneTradePerPeriod { opinion_id } => {
                write!(f, "Opinion {} already traded this period", opinion_id)
            }
            RateLimitError::MaxPeriodTradesExceeded { max } => {
                write!(f, "Maximum of {} trades per period reached", max)
            }
        }
    }
}

impl std::error::Error for RateLimitError {}

// ============================================================================
// FUNDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FundsError {
    InsufficientBalance { available: Amount, requested: Amount },
    InsufficientAllowance { allowed: Amount, requested: Amount },
    Overflow,
}

impl fmt::Display for FundsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FundsError::InsufficientBalance { available, requested } => {
                write!(f, "Insufficient balance: have {}, need {}", available, requested)
            }
            FundsError::InsufficientAllowance { allowed, requested } => {
                write!(f, "Insufficient allowance: approved {}, need {}", allowed, requested)
            }
            FundsError::Overflow => write!(f, "Amount overflow"),
        }
    }
}

impl std::error::Error for FundsError {}

// ============================================================================
// MARKET ERROR
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MarketError {
    Validation(ValidationError),
    State(StateError),
    RateLimit(RateLimitError),
    Funds(FundsError),
}

impl MarketError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MarketError::Validation(_) => ErrorKind::Validation,
            MarketError::State(_) => ErrorKind::State,
            MarketError::RateLimit(_) => ErrorKind::RateLimit,
            MarketError::Funds(_) => ErrorKind::Funds,
        }
    }

    /// Specific tag, e.g. "OpinionIsFinal"
    pub fn tag(&self) -> &'static str {
        match self {
            MarketError::Validation(e) => match e {
                ValidationError::EmptyText { .. } => "EmptyText",
                ValidationError::TextTooLong { .. } => "TextTooLong",
                ValidationError::InvalidCategoryCount(_) => "InvalidCategoryCount",
                ValidationError::UnknownCategory(_) => "UnknownCategory",
                ValidationError::DuplicateCategory(_) => "DuplicateCategory",
                ValidationError::PriceTooLow { .. } => "PriceTooLow",
                ValidationError::PriceTooHigh { .. } => "PriceTooHigh",
                ValidationError::ZeroAmount => "ZeroAmount",
                ValidationError::InvalidShares { .. } => "InvalidShares",
                ValidationError::InvalidFeeSplit(_) => "InvalidFeeSplit",
                ValidationError::DeadlineTooShort { .. } => "DeadlineTooShort",
                ValidationError::DeadlineTooLong { .. } => "DeadlineTooLong",
                ValidationError::SameAnswerAsCurrent => "SameAnswerAsCurrent",
                ValidationError::InvalidConfig(_) => "InvalidConfig",
            },
            MarketError::State(e) => match e {
                StateError::Paused => "Paused",
                StateError::Unauthorized => "Unauthorized",
                StateError::OpinionNotFound(_) => "OpinionNotFound",
                StateError::OpinionNotActive(_) => "OpinionNotActive",
                StateError::OpinionIsFinal(_) => "OpinionIsFinal",
                StateError::SameOwner => "SameOwner",
                StateError::NotForSale(_) => "NotForSale",
                StateError::CannotBuyOwnQuestion => "CannotBuyOwnQuestion",
                StateError::PoolNotFound(_) => "PoolNotFound",
                StateError::PoolNotActive(_) => "PoolNotActive",
                StateError::PoolDeadlinePassed(_) => "PoolDeadlinePassed",
                StateError::PoolNotExpired(_) => "PoolNotExpired",
                StateError::NotAContributor => "NotAContributor",
                StateError::AlreadyRefunded => "AlreadyRefunded",
                StateError::PoolTargetNotReached { .. } => "PoolTargetNotReached",
                StateError::NoFeesToClaim => "NoFeesToClaim",
            },
            MarketError::RateLimit(e) => match e {
                RateLimitError::OneTradePerPeriod { .. } => "OneTradePerPeriod",
                RateLimitError::MaxPeriodTradesExceeded { .. } => "MaxPeriodTradesExceeded",
            },
            MarketError::Funds(e) => match e {
                FundsError::InsufficientBalance { .. } => "InsufficientBalance",
                FundsError::InsufficientAllowance { .. } => "InsufficientAllowance",
                FundsError::Overflow => "Overflow",
            },
        }
    }
}

impl fmt::Display for MarketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketError::Validation(e) => write!(f, "Validation error: {}", e),
            MarketError::State(e) => write!(f, "State error: {}", e),
            MarketError::RateLimit(e) => write!(f, "Rate limited: {}", e),
            MarketError::Funds(e) => write!(f, "Funds error: {}", e),
        }
    }
}

impl std::error::Error for MarketError {}

impl From<ValidationError> for MarketError {
    fn from(err: ValidationError) -> Self {
        MarketError::Validation(err)
    }
}

impl From<StateError> for MarketError {
    fn from(err: StateError) -> Self {
        MarketError::State(err)
    }
}

impl From<RateLimitError> for MarketError {
    fn from(err: RateLimitError) -> Self {
        MarketError::RateLimit(err)
    }
}

impl From<FundsError> for MarketError {
    fn from(err: FundsError) -> Self {
        MarketError::Funds(err)
    }
}

pub type MarketResult<T> = Result<T, MarketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_tag() {
        let err: MarketError = StateError::OpinionIsFinal(3).into();
        assert_eq!(err.kind(), ErrorKind::State);
        assert_eq!(err.tag(), "OpinionIsFinal");

        let err: MarketError = RateLimitError::MaxPeriodTradesExceeded { max: 3 }.into();
        assert_eq!(err.kind(), ErrorKind::RateLimit);
        assert_eq!(err.tag(), "MaxPeriodTradesExceeded");
    }

    #[test]
    fn test_display_includes_detail() {
        let err: MarketError = FundsError::InsufficientBalance { available: 5, requested: 10 }.into();
        assert_eq!(err.to_string(), "Funds error: Insufficient balance: have 5, need 10");
    }
}
