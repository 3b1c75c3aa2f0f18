// ============================================================================
// Market Configuration
// ============================================================================
//
// All admin-controlled values live here: pause flag, fee percentages, price
// bounds and pool duration bounds. The engine reads them through the
// `ConfigSource` trait at call time, so an update only affects operations
// applied after it. Nothing already recorded is recomputed.
//
// Percentages are expressed in basis points (10_000 = 100%).
//
// ============================================================================

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use crate::errors::ValidationError;
use crate::models::{Address, Amount, UNIT};

pub const BPS_DENOMINATOR: u64 = 10_000;

pub const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

// ============================================================================
// FEE SPLITS
// ============================================================================

/// Sum of basis-point shares, wide enough that no u64 inputs overflow
pub fn total_bps(shares: &[u64]) -> u128 {
    shares.iter().map(|bps| *bps as u128).sum()
}

/// Split of every answer trade between previous owner, question owner
/// (creator royalty) and treasury
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    pub owner_bps: u64,
    pub creator_bps: u64,
    pub platform_bps: u64,
}

impl FeeSplit {
    pub fn new(owner_bps: u64, creator_bps: u64, platform_bps: u64) -> Self {
        Self { owner_bps, creator_bps, platform_bps }
    }

    /// Whole-percent convenience constructor (87, 3, 10)
    pub fn percent(owner: u64, creator: u64, platform: u64) -> Self {
        Self::new(owner.saturating_mul(100), creator.saturating_mul(100), platform.saturating_mul(100))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let total = total_bps(&[self.owner_bps, self.creator_bps, self.platform_bps]);
        if total != BPS_DENOMINATOR as u128 {
            return Err(ValidationError::InvalidFeeSplit(format!(
                "trade split sums to {} bps",
                total
            )));
        }
        Ok(())
    }
}

impl Default for FeeSplit {
    fn default() -> Self {
        FeeSplit::percent(95, 3, 2)
    }
}

/// Split of a question sale between the selling question owner and treasury
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleSplit {
    pub seller_bps: u64,
    pub platform_bps: u64,
}

impl SaleSplit {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let total = total_bps(&[self.seller_bps, self.platform_bps]);
        if total != BPS_DENOMINATOR as u128 {
            return Err(ValidationError::InvalidFeeSplit(format!(
                "question sale split sums to {} bps",
                total
            )));
        }
        Ok(())
    }
}

impl Default for SaleSplit {
    fn default() -> Self {
        Self { seller_bps: 9_000, platform_bps: 1_000 }
    }
}

/// How a pool's share of a later resale is handed to its contributors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolRewardPolicy {
    /// The whole previous-owner share is split pro-rata to contributions
    ResaleProceeds,
    /// Pro-rata distribution capped at the pool's original funding; the
    /// excess goes to the treasury
    OriginalFunding,
}

impl Default for PoolRewardPolicy {
    fn default() -> Self {
        PoolRewardPolicy::ResaleProceeds
    }
}

impl FromStr for PoolRewardPolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "resale_proceeds" => Ok(PoolRewardPolicy::ResaleProceeds),
            "original_funding" => Ok(PoolRewardPolicy::OriginalFunding),
            other => Err(ValidationError::InvalidConfig(format!(
                "unknown pool reward policy: {}",
                other
            ))),
        }
    }
}

// ============================================================================
// MARKET CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Every mutating caller operation fails while set
    pub paused: bool,
    /// Account receiving platform fees and rounding remainders
    pub treasury: Address,
    /// Accounts allowed to deactivate opinions, withdraw treasury and update config
    pub admins: Vec<Address>,

    // === PRICING ===
    pub min_price: Amount,
    pub max_initial_price: Amount,
    /// Creation fee as a share of the initial price
    pub creation_fee_bps: u64,
    pub min_creation_fee: Amount,
    /// MAX_CHANGE_PCT: upper bound of a single price step
    pub max_price_change_bps: u64,
    /// Price step with no recent competition
    pub base_increase_bps: u64,
    /// Extra step per distinct recent trader
    pub competition_step_bps: u64,
    /// Periods of history counted as "recent" competition
    pub competition_window: u64,
    /// Periods after which the step is halved
    pub decay_periods: u64,
    /// Fixed buyout price of a final answer
    pub final_answer_price: Amount,

    // === FEES ===
    pub trade_split: FeeSplit,
    pub question_sale_split: SaleSplit,

    // === RATE LIMITS ===
    pub max_trades_per_period: u32,

    // === TEXT BOUNDS ===
    pub max_question_len: usize,
    pub max_answer_len: usize,
    pub max_description_len: usize,
    pub max_link_len: usize,
    pub max_pool_name_len: usize,
    pub categories: Vec<String>,

    // === POOLS ===
    pub min_pool_duration_secs: u64,
    pub max_pool_duration_secs: u64,
    pub pool_creation_fee: Amount,
    pub pool_reward_policy: PoolRewardPolicy,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            paused: false,
            treasury: Address::from("treasury"),
            admins: vec![Address::from("admin")],
            min_price: UNIT,
            max_initial_price: 100 * UNIT,
            creation_fee_bps: 2_000,
            min_creation_fee: 5 * UNIT,
            max_price_change_bps: 20_000,
            base_increase_bps: 1_000,
            competition_step_bps: 1_500,
            competition_window: 50,
            decay_periods: 100,
            final_answer_price: 100_000 * UNIT,
            trade_split: FeeSplit::default(),
            question_sale_split: SaleSplit::default(),
            max_trades_per_period: 3,
            max_question_len: 52,
            max_answer_len: 52,
            max_description_len: 120,
            max_link_len: 260,
            max_pool_name_len: 30,
            categories: [
                "Crypto",
                "Politics",
                "Science",
                "Technology",
                "Sports",
                "Entertainment",
                "Culture",
                "Web",
                "Social Media",
                "Other",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
            min_pool_duration_secs: SECONDS_PER_DAY,
            max_pool_duration_secs: 180 * SECONDS_PER_DAY,
            pool_creation_fee: 5 * UNIT,
            pool_reward_policy: PoolRewardPolicy::default(),
        }
    }
}

impl MarketConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.trade_split.validate()?;
        self.question_sale_split.validate()?;

        let invalid = |msg: &str| Err(ValidationError::InvalidConfig(msg.to_string()));

        if self.min_price == 0 {
            return invalid("min_price must be positive");
        }
        if self.max_initial_price < self.min_price {
            return invalid("max_initial_price below min_price");
        }
        if self.final_answer_price < self.min_price {
            return invalid("final_answer_price below min_price");
        }
        if self.creation_fee_bps > BPS_DENOMINATOR {
            return invalid("creation_fee_bps above 100%");
        }
        if self.decay_periods == 0 {
            return invalid("decay_periods must be positive");
        }
        if self.max_trades_per_period == 0 {
            return invalid("max_trades_per_period must be positive");
        }
        if self.min_pool_duration_secs > self.max_pool_duration_secs {
            return invalid("min pool duration exceeds max pool duration");
        }
        if self.categories.is_empty() {
            return invalid("at least one category is required");
        }
        if self.treasury.as_pool().is_some() {
            return invalid("treasury cannot be a pool address");
        }
        Ok(())
    }

    pub fn is_admin(&self, address: &Address) -> bool {
        self.admins.iter().any(|a| a == address)
    }

    /// Creation fee for an opinion: a share of the initial price, floored at
    /// `min_creation_fee`
    pub fn creation_fee(&self, initial_price: Amount) -> Amount {
        let proportional =
            (initial_price as u128 * self.creation_fee_bps as u128 / BPS_DENOMINATOR as u128) as Amount;
        proportional.max(self.min_creation_fee)
    }

    /// Load defaults overridden by `OPINION_*` environment variables
    pub fn from_env() -> Result<Self, ValidationError> {
        let mut config = MarketConfig::default();

        if let Ok(treasury) = std::env::var("OPINION_TREASURY") {
            config.treasury = Address::new(treasury);
        }
        if let Ok(admins) = std::env::var("OPINION_ADMINS") {
            config.admins = admins
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(Address::from)
                .collect();
        }
        if let Some(paused) = env_parse::<bool>("OPINION_PAUSED")? {
            config.paused = paused;
        }
        if let Some(v) = env_parse("OPINION_MIN_PRICE")? {
            config.min_price = v;
        }
        if let Some(v) = env_parse("OPINION_MAX_INITIAL_PRICE")? {
            config.max_initial_price = v;
        }
        if let Some(v) = env_parse("OPINION_MAX_PRICE_CHANGE_BPS")? {
            config.max_price_change_bps = v;
        }
        if let Some(v) = env_parse("OPINION_FINAL_ANSWER_PRICE")? {
            config.final_answer_price = v;
        }
        if let Some(v) = env_parse("OPINION_MAX_TRADES_PER_PERIOD")? {
            config.max_trades_per_period = v;
        }
        if let Some(v) = env_parse("OPINION_MIN_POOL_DURATION_SECS")? {
            config.min_pool_duration_secs = v;
        }
        if let Some(v) = env_parse("OPINION_MAX_POOL_DURATION_SECS")? {
            config.max_pool_duration_secs = v;
        }
        if let Some(v) = env_parse("OPINION_POOL_REWARD_POLICY")? {
            config.pool_reward_policy = v;
        }
        if let Ok(split) = std::env::var("OPINION_TRADE_SPLIT_BPS") {
            config.trade_split = parse_split(&split)?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, ValidationError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ValidationError::InvalidConfig(format!("{} has invalid value {:?}", key, raw))),
        Err(_) => Ok(None),
    }
}

/// Parses "owner,creator,platform" in basis points, e.g. "9500,300,200"
fn parse_split(raw: &str) -> Result<FeeSplit, ValidationError> {
    let parts: Vec<u64> = raw
        .split(',')
        .map(|p| p.trim().parse::<u64>())
        .collect::<Result<_, _>>()
        .map_err(|_| ValidationError::InvalidFeeSplit(format!("cannot parse {:?}", raw)))?;

    match parts.as_slice() {
        [owner, creator, platform] => {
            let split = FeeSplit::new(*owner, *creator, *platform);
            split.validate()?;
            Ok(split)
        }
        _ => Err(ValidationError::InvalidFeeSplit(format!(
            "expected three values, got {}",
            parts.len()
        ))),
    }
}

// ============================================================================
// CONFIG SOURCE
// ============================================================================

/// External configuration collaborator, read once per operation
pub trait ConfigSource: Send + Sync {
    fn current(&self) -> MarketConfig;
}

impl ConfigSource for MarketConfig {
    fn current(&self) -> MarketConfig {
        self.clone()
    }
}

/// In-process config handle that can be updated between operations
#[derive(Debug, Clone)]
pub struct SharedConfig {
    inner: Arc<RwLock<MarketConfig>>,
}

impl SharedConfig {
    pub fn new(config: MarketConfig) -> Self {
        Self { inner: Arc::new(RwLock::new(config)) }
    }

    /// Replace the configuration; applies to subsequent operations only
    pub fn update(&self, config: MarketConfig) -> Result<(), ValidationError> {
        config.validate()?;
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = config;
        Ok(())
    }

    /// Apply an in-place edit, validated as a whole
    pub fn modify(&self, edit: impl FnOnce(&mut MarketConfig)) -> Result<(), ValidationError> {
        let mut next = self.current();
        edit(&mut next);
        self.update(next)
    }
}

impl ConfigSource for SharedConfig {
    fn current(&self) -> MarketConfig {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self::new(MarketConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(MarketConfig::default().validate().is_ok());
    }

    #[test]
    fn test_split_must_sum_to_100_percent() {
        assert!(FeeSplit::percent(87, 3, 10).validate().is_ok());
        assert!(FeeSplit::new(9_750, 200, 50).validate().is_ok());
        assert!(matches!(
            FeeSplit::percent(90, 3, 10).validate(),
            Err(ValidationError::InvalidFeeSplit(_))
        ));
    }

    #[test]
    fn test_oversized_shares_do_not_wrap() {
        // u64::MAX + 10_001 wraps to exactly 10_000 in u64
        assert!(matches!(
            FeeSplit::new(u64::MAX, 10_001, 0).validate(),
            Err(ValidationError::InvalidFeeSplit(_))
        ));
        assert!(matches!(
            SaleSplit { seller_bps: u64::MAX, platform_bps: 10_001 }.validate(),
            Err(ValidationError::InvalidFeeSplit(_))
        ));
        assert!(FeeSplit::percent(u64::MAX, 0, 0).validate().is_err());
    }

    #[test]
    fn test_creation_fee_floor() {
        let config = MarketConfig::default();
        // 20% of 10 = 2, floored at 5
        assert_eq!(config.creation_fee(10 * UNIT), 5 * UNIT);
        // 20% of 100 = 20
        assert_eq!(config.creation_fee(100 * UNIT), 20 * UNIT);
    }

    #[test]
    fn test_shared_config_rejects_invalid_update() {
        let shared = SharedConfig::default();
        let result = shared.modify(|c| c.trade_split = FeeSplit::percent(50, 10, 10));
        assert!(result.is_err());
        assert_eq!(shared.current().trade_split, FeeSplit::default());

        shared.modify(|c| c.paused = true).unwrap();
        assert!(shared.current().paused);
    }

    #[test]
    fn test_parse_split() {
        assert_eq!(parse_split("8700, 300, 1000").unwrap(), FeeSplit::percent(87, 3, 10));
        assert!(parse_split("100,200").is_err());
        assert!(parse_split("a,b,c").is_err());
    }

    #[test]
    fn test_pool_reward_policy_from_str() {
        assert_eq!("original_funding".parse::<PoolRewardPolicy>().unwrap(), PoolRewardPolicy::OriginalFunding);
        assert!("other".parse::<PoolRewardPolicy>().is_err());
    }
}
