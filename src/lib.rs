/// Opinion Market Ledger
/// Deterministic state machine for re-auctioned question/answer positions,
/// exported as a library crate for the driver binary and integration tests

pub mod config;
pub mod driver;
pub mod engine;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod models;
pub mod opinions;
pub mod pools;
pub mod pricing;
pub mod question_market;
pub mod rate_limit;

pub use config::{ConfigSource, FeeSplit, MarketConfig, PoolRewardPolicy, SaleSplit, SharedConfig, BPS_DENOMINATOR, SECONDS_PER_DAY};
pub use driver::{run_commands, Command, CommandOutcome, Envelope, RunSummary, SharedMarket};
pub use engine::{ConservationReport, ContributionOutcome, OpinionMarket};
pub use errors::{ErrorKind, FundsError, MarketError, MarketResult, RateLimitError, StateError, ValidationError};
pub use events::{EventEntry, EventLog, EventSink, LedgerEvent};
pub use ledger::{plan_by_shares, plan_pro_rata, CurrencyService, FeeLedger, InMemoryBank, Recipient, Settlement, ShareLine};
pub use models::{Address, Amount, CallContext, OpinionId, PoolId, UNIT};
pub use opinions::{AnswerRecord, AnswerSubmission, NewOpinion, Opinion, OpinionRegistry, OpinionStatus, TradeKind, TradeReceipt};
pub use pools::{Contributor, NewPool, Pool, PoolRegistry, PoolStatus, RewardPlan};
pub use pricing::{PriceCalculator, PriceInputs};
pub use question_market::{QuestionListing, QuestionMarket};
pub use rate_limit::RateLimiter;
