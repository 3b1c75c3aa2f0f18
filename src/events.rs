/// Append-only event log for external indexers
///
/// Every accepted transition appends exactly one or more events. Entries are
/// hash-chained (SHA-256 over the previous hash and the entry body) so an
/// indexer can detect gaps or tampering.
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ledger::Recipient;
use crate::models::{Address, Amount, OpinionId, PoolId};

const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

// ============================================================================
// EVENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    OpinionCreated {
        opinion_id: OpinionId,
        creator: Address,
        question: String,
        answer: String,
        initial_price: Amount,
        creation_fee: Amount,
        categories: Vec<String>,
    },
    AnswerSubmitted {
        opinion_id: OpinionId,
        previous_owner: Address,
        new_owner: Address,
        answer: String,
        price: Amount,
    },
    FinalAnswerSubmitted {
        opinion_id: OpinionId,
        owner: Address,
        answer: String,
        price: Amount,
    },
    FeesSettled {
        settlement_id: String,
        opinion_id: Option<OpinionId>,
        amount: Amount,
        credits: Vec<(Recipient, Amount)>,
        remainder: Amount,
    },
    QuestionListed {
        opinion_id: OpinionId,
        seller: Address,
        price: Amount,
    },
    QuestionSaleCancelled {
        opinion_id: OpinionId,
        seller: Address,
    },
    QuestionPurchased {
        opinion_id: OpinionId,
        seller: Address,
        buyer: Address,
        price: Amount,
    },
    FeesClaimed {
        account: Address,
        amount: Amount,
    },
    TreasuryWithdrawn {
        to: Address,
        amount: Amount,
    },
    OpinionDeactivated {
        opinion_id: OpinionId,
        by: Address,
    },
    PoolCreated {
        pool_id: PoolId,
        opinion_id: OpinionId,
        creator: Address,
        proposed_answer: String,
        deadline: u64,
        initial_contribution: Amount,
        name: String,
    },
    PoolContribution {
        pool_id: PoolId,
        contributor: Address,
        amount: Amount,
        total: Amount,
    },
    PoolExecuted {
        pool_id: PoolId,
        opinion_id: OpinionId,
        price: Amount,
        surplus: Amount,
    },
    PoolExpired {
        pool_id: PoolId,
    },
    PoolRefunded {
        pool_id: PoolId,
        contributor: Address,
        amount: Amount,
    },
    PoolRewardsDistributed {
        pool_id: PoolId,
        amount: Amount,
        to_treasury: Amount,
    },
    ConfigUpdated {
        by: Address,
    },
}

impl LedgerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::OpinionCreated { .. } => "opinion_created",
            LedgerEvent::AnswerSubmitted { .. } => "answer_submitted",
            LedgerEvent::FinalAnswerSubmitted { .. } => "final_answer_submitted",
            LedgerEvent::FeesSettled { .. } => "fees_settled",
            LedgerEvent::QuestionListed { .. } => "question_listed",
            LedgerEvent::QuestionSaleCancelled { .. } => "question_sale_cancelled",
            LedgerEvent::QuestionPurchased { .. } => "question_purchased",
            LedgerEvent::FeesClaimed { .. } => "fees_claimed",
            LedgerEvent::TreasuryWithdrawn { .. } => "treasury_withdrawn",
            LedgerEvent::OpinionDeactivated { .. } => "opinion_deactivated",
            LedgerEvent::PoolCreated { .. } => "pool_created",
            LedgerEvent::PoolContribution { .. } => "pool_contribution",
            LedgerEvent::PoolExecuted { .. } => "pool_executed",
            LedgerEvent::PoolExpired { .. } => "pool_expired",
            LedgerEvent::PoolRefunded { .. } => "pool_refunded",
            LedgerEvent::PoolRewardsDistributed { .. } => "pool_rewards_distributed",
            LedgerEvent::ConfigUpdated { .. } => "config_updated",
        }
    }
}

// ============================================================================
// LOG
// ============================================================================

/// Consumer of emitted events (indexer, websocket fan-out, ...)
pub trait EventSink: Send {
    fn emit(&mut self, entry: &EventEntry);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEntry {
    pub sequence: u64,
    pub block: u64,
    pub timestamp: u64,
    pub event: LedgerEvent,
    pub prev_hash: String,
    pub hash: String,
}

impl EventEntry {
    fn compute_hash(sequence: u64, block: u64, timestamp: u64, event: &LedgerEvent, prev_hash: &str) -> String {
        let body = serde_json::to_string(event).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(prev_hash.as_bytes());
        hasher.update(sequence.to_le_bytes());
        hasher.update(block.to_le_bytes());
        hasher.update(timestamp.to_le_bytes());
        hasher.update(body.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[derive(Default, Serialize, Deserialize)]
pub struct EventLog {
    entries: Vec<EventEntry>,
    #[serde(skip)]
    subscribers: Vec<Box<dyn EventSink>>,
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("entries", &self.entries.len())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, sink: Box<dyn EventSink>) {
        self.subscribers.push(sink);
    }

    pub fn append(&mut self, block: u64, timestamp: u64, event: LedgerEvent) -> &EventEntry {
        let sequence = self.entries.len() as u64;
        let prev_hash = self.head_hash().to_string();
        let hash = EventEntry::compute_hash(sequence, block, timestamp, &event, &prev_hash);

        let entry = EventEntry { sequence, block, timestamp, event, prev_hash, hash };
        for sink in self.subscribers.iter_mut() {
            sink.emit(&entry);
        }
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[EventEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn since(&self, sequence: u64) -> &[EventEntry] {
        let start = (sequence as usize).min(self.entries.len());
        &self.entries[start..]
    }

    pub fn head_hash(&self) -> &str {
        self.entries.last().map(|e| e.hash.as_str()).unwrap_or(GENESIS_HASH)
    }

    /// Recompute every hash; returns the first broken sequence number
    pub fn verify_chain(&self) -> Result<(), u64> {
        let mut prev = GENESIS_HASH.to_string();
        for entry in &self.entries {
            let expected = EventEntry::compute_hash(entry.sequence, entry.block, entry.timestamp, &entry.event, &prev);
            if entry.prev_hash != prev || entry.hash != expected {
                return Err(entry.sequence);
            }
            prev = entry.hash.clone();
        }
        Ok(())
    }
}

impl EventSink for EventLog {
    fn emit(&mut self, entry: &EventEntry) {
        self.append(entry.block, entry.timestamp, entry.event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Collector(Arc<Mutex<Vec<String>>>);

    impl EventSink for Collector {
        fn emit(&mut self, entry: &EventEntry) {
            self.0.lock().unwrap().push(entry.event.name().to_string());
        }
    }

    fn expired(pool_id: PoolId) -> LedgerEvent {
        LedgerEvent::PoolExpired { pool_id }
    }

    #[test]
    fn test_append_chains_hashes() {
        let mut log = EventLog::new();
        log.append(1, 100, expired(1));
        log.append(2, 200, expired(2));

        let entries = log.entries();
        assert_eq!(entries[0].prev_hash, GENESIS_HASH);
        assert_eq!(entries[1].prev_hash, entries[0].hash);
        assert_eq!(entries[1].sequence, 1);
        assert!(log.verify_chain().is_ok());
    }

    #[test]
    fn test_tampering_is_detected() {
        let mut log = EventLog::new();
        log.append(1, 100, expired(1));
        log.append(2, 200, expired(2));

        log.entries[0].event = expired(99);
        assert_eq!(log.verify_chain(), Err(0));
    }

    #[test]
    fn test_subscribers_receive_entries() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut log = EventLog::new();
        log.subscribe(Box::new(Collector(seen.clone())));

        log.append(1, 100, expired(1));
        assert_eq!(seen.lock().unwrap().as_slice(), ["pool_expired"]);
    }

    #[test]
    fn test_since() {
        let mut log = EventLog::new();
        for i in 0..5 {
            log.append(i, i, expired(i));
        }
        assert_eq!(log.since(3).len(), 2);
        assert!(log.since(10).is_empty());
    }
}
