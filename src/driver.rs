// ============================================================================
// Command Driver - newline-delimited JSON in, one outcome per line out
// ============================================================================
//
// Each input line is an envelope:
//
//   {"caller":"alice","block":12,"timestamp":1700000000,"op":"submit_answer",
//    "opinion_id":1,"answer":"Base"}
//
// `timestamp` defaults to the current wall clock. Commands are applied
// strictly in input order, each under the market lock for its whole
// duration, so the driver is the single writer the engine expects.
//
// ============================================================================

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::config::MarketConfig;
use crate::engine::OpinionMarket;
use crate::errors::{ErrorKind, MarketError, MarketResult, StateError};
use crate::ledger::InMemoryBank;
use crate::models::{Address, Amount, CallContext, OpinionId, PoolId};
use crate::opinions::{AnswerSubmission, NewOpinion};
use crate::pools::NewPool;

pub type SharedMarket = Arc<Mutex<OpinionMarket<InMemoryBank>>>;

pub fn shared(market: OpinionMarket<InMemoryBank>) -> SharedMarket {
    Arc::new(Mutex::new(market))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    /// Admin faucet: mint and approve wallet funds in the in-memory bank
    Fund { account: Address, amount: Amount },
    CreateOpinion {
        #[serde(flatten)]
        request: NewOpinion,
    },
    SubmitAnswer {
        opinion_id: OpinionId,
        #[serde(flatten)]
        submission: AnswerSubmission,
    },
    SubmitFinalAnswer {
        opinion_id: OpinionId,
        #[serde(flatten)]
        submission: AnswerSubmission,
    },
    QuoteNextPrice { opinion_id: OpinionId },
    ListQuestionForSale { opinion_id: OpinionId, price: Amount },
    CancelQuestionSale { opinion_id: OpinionId },
    BuyQuestion { opinion_id: OpinionId },
    ClaimFees,
    WithdrawTreasury,
    DeactivateOpinion { opinion_id: OpinionId },
    UpdateConfig { config: MarketConfig },
    SetPaused { paused: bool },
    CreatePool {
        #[serde(flatten)]
        request: NewPool,
    },
    ContributeToPool { pool_id: PoolId, amount: Amount },
    ExecutePool { pool_id: PoolId },
    ExpirePool { pool_id: PoolId },
    Refund { pool_id: PoolId },
    GetOpinion { opinion_id: OpinionId },
    GetHistory { opinion_id: OpinionId },
    GetPool { pool_id: PoolId },
    GetContributors { pool_id: PoolId },
    GetBalance { account: Address },
    GetTreasury,
    GetTradesInPeriod { account: Address },
    GetListings,
    GetConservation,
    GetEvents {
        #[serde(default)]
        since: u64,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    pub caller: Address,
    pub block: u64,
    #[serde(default)]
    pub timestamp: Option<u64>,
    #[serde(flatten)]
    pub command: Command,
}

impl Envelope {
    pub fn context(&self) -> CallContext {
        let timestamp = self
            .timestamp
            .unwrap_or_else(|| Utc::now().timestamp().max(0) as u64);
        CallContext::new(self.caller.clone(), self.block, timestamp)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub kind: String,
    pub tag: String,
    pub message: String,
}

impl From<&MarketError> for ErrorBody {
    fn from(err: &MarketError) -> Self {
        let kind = match err.kind() {
            ErrorKind::Validation => "validation",
            ErrorKind::State => "state",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Funds => "funds",
        };
        Self { kind: kind.to_string(), tag: err.tag().to_string(), message: err.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandOutcome {
    /// 1-based input line number
    pub line: usize,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl CommandOutcome {
    fn success(line: usize, result: Value) -> Self {
        Self { line, ok: true, result: Some(result), error: None }
    }

    fn failure(line: usize, error: ErrorBody) -> Self {
        Self { line, ok: false, result: None, error: Some(error) }
    }
}

/// Totals for one driver run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub commands: usize,
    pub failed: usize,
}

fn to_json<T: Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Apply one command to the market
pub fn apply(market: &mut OpinionMarket<InMemoryBank>, envelope: Envelope) -> MarketResult<Value> {
    let ctx = envelope.context();
    let value = match envelope.command {
        Command::Fund { account, amount } => {
            if !market.config().is_admin(&ctx.caller) {
                return Err(StateError::Unauthorized.into());
            }
            let bank = market.bank_mut();
            bank.fund(&account, amount);
            let (wallet, allowance) = (bank.balance_of(&account), bank.allowance(&account));
            json!({ "account": account, "wallet": wallet, "allowance": allowance })
        }
        Command::CreateOpinion { request } => json!({ "opinion_id": market.create_opinion(&ctx, request)? }),
        Command::SubmitAnswer { opinion_id, submission } => {
            to_json(market.submit_answer(&ctx, opinion_id, submission)?)
        }
        Command::SubmitFinalAnswer { opinion_id, submission } => {
            to_json(market.submit_final_answer(&ctx, opinion_id, submission)?)
        }
        Command::QuoteNextPrice { opinion_id } => json!({ "price": market.quote_next_price(&ctx, opinion_id)? }),
        Command::ListQuestionForSale { opinion_id, price } => {
            market.list_question_for_sale(&ctx, opinion_id, price)?;
            json!({ "opinion_id": opinion_id, "price": price })
        }
        Command::CancelQuestionSale { opinion_id } => {
            market.cancel_question_sale(&ctx, opinion_id)?;
            json!({ "opinion_id": opinion_id })
        }
        Command::BuyQuestion { opinion_id } => to_json(market.buy_question(&ctx, opinion_id)?),
        Command::ClaimFees => json!({ "claimed": market.claim_accumulated_fees(&ctx)? }),
        Command::WithdrawTreasury => json!({ "withdrawn": market.withdraw_treasury(&ctx)? }),
        Command::DeactivateOpinion { opinion_id } => {
            market.deactivate_opinion(&ctx, opinion_id)?;
            json!({ "opinion_id": opinion_id })
        }
        Command::UpdateConfig { config } => {
            market.update_config(&ctx, config)?;
            to_json(market.config())
        }
        Command::SetPaused { paused } => {
            market.set_paused(&ctx, paused)?;
            json!({ "paused": paused })
        }
        Command::CreatePool { request } => {
            let pool_id = market.create_pool(&ctx, request)?;
            to_json(market.pool(pool_id)?)
        }
        Command::ContributeToPool { pool_id, amount } => to_json(market.contribute_to_pool(&ctx, pool_id, amount)?),
        Command::ExecutePool { pool_id } => to_json(market.execute_pool(&ctx, pool_id)?),
        Command::ExpirePool { pool_id } => {
            market.expire_pool(&ctx, pool_id)?;
            json!({ "pool_id": pool_id })
        }
        Command::Refund { pool_id } => json!({ "refunded": market.refund(&ctx, pool_id)? }),
        Command::GetOpinion { opinion_id } => to_json(market.opinion(opinion_id)?),
        Command::GetHistory { opinion_id } => to_json(market.answer_history(opinion_id)?),
        Command::GetPool { pool_id } => to_json(market.pool(pool_id)?),
        Command::GetContributors { pool_id } => to_json(market.pool_contributors(pool_id)?),
        Command::GetBalance { account } => json!({
            "accumulated": market.accumulated_balance(&account),
            "wallet": market.bank().balance_of(&account),
            "account": account,
        }),
        Command::GetTreasury => json!({ "treasury": market.treasury_balance() }),
        Command::GetTradesInPeriod { account } => json!({
            "period": ctx.block,
            "trades": market.trades_in_period(&account, ctx.block),
            "max": market.config().max_trades_per_period,
            "account": account,
        }),
        Command::GetListings => to_json(market.question_listings()),
        Command::GetConservation => {
            let report = market.conservation_report();
            json!({ "holds": report.holds(), "report": report })
        }
        Command::GetEvents { since } => to_json(market.events_since(since)),
    };
    Ok(value)
}

fn handle_line(market: &SharedMarket, line_no: usize, line: &str) -> CommandOutcome {
    let envelope: Envelope = match serde_json::from_str(line) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(line = line_no, error = %e, "unparseable command");
            return CommandOutcome::failure(
                line_no,
                ErrorBody { kind: "input".to_string(), tag: "InvalidCommand".to_string(), message: e.to_string() },
            );
        }
    };
    debug!(line = line_no, caller = %envelope.caller, block = envelope.block, "applying command");

    let mut guard = market.lock().unwrap_or_else(|e| e.into_inner());
    match apply(&mut guard, envelope) {
        Ok(value) => CommandOutcome::success(line_no, value),
        Err(e) => CommandOutcome::failure(line_no, ErrorBody::from(&e)),
    }
}

/// Apply every command read from `reader`, writing one JSON outcome per line
/// to `writer`. Outcomes are streamed, not retained.
pub async fn run_commands<R, W>(reader: R, mut writer: W, market: &SharedMarket) -> std::io::Result<RunSummary>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut summary = RunSummary::default();
    let mut line_no = 0;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let outcome = handle_line(market, line_no, line);
        let mut encoded = serde_json::to_vec(&outcome)?;
        encoded.push(b'\n');
        writer.write_all(&encoded).await?;
        writer.flush().await?;

        summary.commands += 1;
        if !outcome.ok {
            summary.failed += 1;
        }
    }

    Ok(summary)
}
