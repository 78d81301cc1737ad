//! Position history scanner.
//!
//! Walks `[start_block, head]` in chunks and collects, per chunk, the position
//! manager's liquidity and fee logs for the token id, the farm's stake logs for the
//! owner and token id, and reward token transfers from the farm to the owner.
//! A failing query is logged and left out. Events come back timestamp ascending.

use super::batching::{BatchConfig, chunk_ranges, run_batched};
use anyhow::Result;
use async_trait::async_trait;
use clmm_yield_domain::entities::{EventPayload, PositionEvent, PositionEventKind, PositionId, Token};
use clmm_yield_domain::math::fixed_point::raw_to_decimal;
use primitive_types::U256;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// A decoded log relevant to one position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogKind {
    IncreaseLiquidity {
        liquidity: u128,
        amount0: U256,
        amount1: U256,
    },
    DecreaseLiquidity {
        liquidity: u128,
        amount0: U256,
        amount1: U256,
    },
    Collect {
        amount0: U256,
        amount1: U256,
    },
    FarmDeposit {
        liquidity: u128,
    },
    FarmWithdraw {
        liquidity: u128,
    },
    RewardTransfer {
        amount: U256,
    },
}

/// A decoded log with its chain position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLog {
    pub block_number: u64,
    pub log_index: u64,
    pub kind: LogKind,
}

/// Source of the logs the scanner needs.
#[async_trait]
pub trait PositionLogSource: Send + Sync {
    /// Latest block number.
    async fn head_block(&self) -> Result<u64>;

    /// Unix timestamp of a block.
    async fn block_timestamp(&self, block: u64) -> Result<u64>;

    /// IncreaseLiquidity, DecreaseLiquidity and Collect logs for the token id.
    async fn manager_logs(&self, token_id: PositionId, from: u64, to: u64)
    -> Result<Vec<DecodedLog>>;

    /// Farm Deposit and Withdraw logs for the owner and token id.
    async fn farm_logs(
        &self,
        token_id: PositionId,
        owner: &str,
        from: u64,
        to: u64,
    ) -> Result<Vec<DecodedLog>>;

    /// Reward token transfers from the farm to the owner.
    async fn reward_logs(&self, owner: &str, from: u64, to: u64) -> Result<Vec<DecodedLog>>;
}

/// What to scan.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub token_id: PositionId,
    pub owner: String,
    /// First block to scan, inclusive.
    pub start_block: u64,
    pub token0: Token,
    pub token1: Token,
    pub reward: Token,
}

/// Result of a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    /// New events, timestamp ascending.
    pub events: Vec<PositionEvent>,
    /// Last block covered by the scan.
    pub end_block: u64,
    /// Queries that failed and were left out.
    pub failed_queries: usize,
}

impl ScanOutcome {
    /// Whether every query succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed_queries == 0
    }
}

/// Position history scanner.
#[derive(Clone)]
pub struct EventScanner {
    source: Arc<dyn PositionLogSource>,
    config: BatchConfig,
}

impl EventScanner {
    /// Creates a scanner over a log source.
    #[must_use]
    pub fn new(source: Arc<dyn PositionLogSource>, config: BatchConfig) -> Self {
        Self { source, config }
    }

    /// Scans `[request.start_block, head]`.
    ///
    /// # Errors
    /// Returns an error only when the head block cannot be read.
    pub async fn scan(&self, request: &ScanRequest) -> Result<ScanOutcome> {
        let head = self.source.head_block().await?;
        if request.start_block > head {
            debug!(
                token_id = %request.token_id,
                start = request.start_block,
                head,
                "No new blocks to scan"
            );
            return Ok(ScanOutcome {
                events: Vec::new(),
                end_block: head,
                failed_queries: 0,
            });
        }

        let ranges = chunk_ranges(request.start_block, head, self.config.chunk_size);
        info!(
            token_id = %request.token_id,
            from = request.start_block,
            to = head,
            chunks = ranges.len(),
            "Scanning position events"
        );

        let chunks = run_batched(&ranges, &self.config, |from, to| {
            self.scan_chunk(request, from, to)
        })
        .await;

        let mut failed_queries = 0;
        let mut logs = Vec::new();
        for (chunk_logs, failures) in chunks {
            logs.extend(chunk_logs);
            failed_queries += failures;
        }
        logs.sort_by_key(|log| (log.block_number, log.log_index));

        let mut timestamps: HashMap<u64, u64> = HashMap::new();
        let mut events = Vec::with_capacity(logs.len());
        for log in logs {
            let timestamp = match timestamps.get(&log.block_number) {
                Some(ts) => *ts,
                None => match self.source.block_timestamp(log.block_number).await {
                    Ok(ts) => {
                        timestamps.insert(log.block_number, ts);
                        ts
                    }
                    Err(e) => {
                        error!(block = log.block_number, error = %e, "Failed to read block timestamp");
                        failed_queries += 1;
                        continue;
                    }
                },
            };
            match to_event(request, &log, timestamp) {
                Ok(event) => events.push(event),
                Err(e) => warn!(
                    token_id = %request.token_id,
                    block = log.block_number,
                    error = %e,
                    "Skipping undecodable log"
                ),
            }
        }
        events.sort_by_key(|e| e.timestamp);

        info!(
            token_id = %request.token_id,
            events = events.len(),
            failed_queries,
            "Scan finished"
        );
        Ok(ScanOutcome {
            events,
            end_block: head,
            failed_queries,
        })
    }

    async fn scan_chunk(&self, request: &ScanRequest, from: u64, to: u64) -> (Vec<DecodedLog>, usize) {
        let (manager, farm, reward) = futures::join!(
            self.source.manager_logs(request.token_id, from, to),
            self.source.farm_logs(request.token_id, &request.owner, from, to),
            self.source.reward_logs(&request.owner, from, to),
        );

        let mut logs = Vec::new();
        let mut failures = 0;
        for (name, result) in [("manager", manager), ("farm", farm), ("reward", reward)] {
            match result {
                Ok(found) => logs.extend(found),
                Err(e) => {
                    error!(query = name, from, to, error = %e, "Log query failed");
                    failures += 1;
                }
            }
        }
        (logs, failures)
    }
}

fn token_amounts(
    request: &ScanRequest,
    amount0: U256,
    amount1: U256,
) -> Result<(Decimal, Decimal, String)> {
    let a0 = raw_to_decimal(amount0, request.token0.decimals)?.normalize();
    let a1 = raw_to_decimal(amount1, request.token1.decimals)?.normalize();
    let details = format!(
        "{a0} {} / {a1} {}",
        request.token0.symbol, request.token1.symbol
    );
    Ok((a0, a1, details))
}

fn to_event(request: &ScanRequest, log: &DecodedLog, timestamp: u64) -> Result<PositionEvent> {
    let (kind, details, payload) = match &log.kind {
        LogKind::IncreaseLiquidity {
            amount0, amount1, ..
        }
        | LogKind::DecreaseLiquidity {
            amount0, amount1, ..
        }
        | LogKind::Collect { amount0, amount1 } => {
            let kind = match log.kind {
                LogKind::IncreaseLiquidity { .. } => PositionEventKind::Deposit,
                LogKind::DecreaseLiquidity { .. } => PositionEventKind::Withdrawal,
                _ => PositionEventKind::FeeClaimTokens,
            };
            let (a0, a1, details) = token_amounts(request, *amount0, *amount1)?;
            (
                kind,
                details,
                EventPayload::TokenAmounts {
                    amount0: a0,
                    amount1: a1,
                },
            )
        }
        LogKind::FarmDeposit { liquidity } => (
            PositionEventKind::StakedDeposit,
            liquidity.to_string(),
            EventPayload::Liquidity {
                liquidity: *liquidity,
            },
        ),
        LogKind::FarmWithdraw { liquidity } => (
            PositionEventKind::StakedWithdrawal,
            liquidity.to_string(),
            EventPayload::Liquidity {
                liquidity: *liquidity,
            },
        ),
        LogKind::RewardTransfer { amount } => {
            let amount = raw_to_decimal(*amount, request.reward.decimals)?.normalize();
            (
                PositionEventKind::FeeClaimReward,
                format!("{amount} {}", request.reward.symbol),
                EventPayload::RewardAmount { amount },
            )
        }
    };
    Ok(PositionEvent {
        token_id: request.token_id,
        kind,
        timestamp,
        block_number: log.block_number,
        log_index: log.log_index,
        details,
        payload,
    })
}
