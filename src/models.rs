// Core identifiers and call context shared by every component

use serde::{Deserialize, Serialize};
use std::fmt;

/// Amounts are always in the smallest currency unit (6 decimals)
pub type Amount = u64;

/// One whole currency unit in smallest units
pub const UNIT: Amount = 1_000_000;

pub type OpinionId = u64;
pub type PoolId = u64;

/// Prefix used for the synthetic account that holds a pool's answer position
const POOL_ADDRESS_PREFIX: &str = "pool:";

// ============================================================================
// ADDRESS
// ============================================================================

/// Account address (wallet or synthetic pool account)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub String);

impl Address {
    pub fn new(value: impl Into<String>) -> Self {
        Address(value.into())
    }

    /// Synthetic address owning answer positions bought by a pool
    pub fn pool(pool_id: PoolId) -> Self {
        Address(format!("{}{}", POOL_ADDRESS_PREFIX, pool_id))
    }

    /// Returns the pool id if this is a pool-held address
    pub fn as_pool(&self) -> Option<PoolId> {
        self.0
            .strip_prefix(POOL_ADDRESS_PREFIX)
            .and_then(|id| id.parse().ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Address(value.to_string())
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Address(value)
    }
}

// ============================================================================
// CALL CONTEXT
// ============================================================================

/// Identity and ordering data supplied with every operation.
///
/// `block` is the period marker used by the rate limiter and the pricing
/// curve. `timestamp` (unix seconds) drives pool deadlines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    pub caller: Address,
    pub block: u64,
    pub timestamp: u64,
}

impl CallContext {
    pub fn new(caller: impl Into<Address>, block: u64, timestamp: u64) -> Self {
        Self {
            caller: caller.into(),
            block,
            timestamp,
        }
    }

    /// Same period and time, different caller
    pub fn as_caller(&self, caller: impl Into<Address>) -> Self {
        Self {
            caller: caller.into(),
            block: self.block,
            timestamp: self.timestamp,
        }
    }
}
