//! Chain reader for PancakeSwap v3 over JSON-RPC.
//!
//! [`AlloyChainReader`] implements both [`ChainReader`] and [`PositionLogSource`]
//! on one alloy provider.

use super::batching::{BatchConfig, chunk_ranges, run_batched};
use super::bindings::{
    IERC20, IMasterChefV3, INonfungiblePositionManager, IPancakeV3Factory, IPancakeV3Pool,
};
use super::event_scanner::{DecodedLog, LogKind, PositionLogSource};
use super::Deployment;
use alloy_eips::{BlockId, BlockNumberOrTag};
use alloy_primitives::aliases::{I24, U24};
use alloy_primitives::{Address, B256, U256 as AlloyU256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types::{Filter, Log, TransactionRequest};
use alloy_sol_types::{SolCall, SolEvent};
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use clmm_yield_domain::entities::{PoolState, Position, PositionId, TickFeeGrowth, Token};
use primitive_types::U256;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::str::FromStr;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Block and deposit of a position's mint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintRecord {
    pub block: u64,
    /// Unix timestamp of the mint block.
    pub timestamp: u64,
    /// Raw token0 deposited.
    pub amount0: U256,
    /// Raw token1 deposited.
    pub amount1: U256,
}

/// Read access to positions, pools and tokens.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Latest block number.
    async fn head_block(&self) -> Result<u64>;

    /// Positions held by `owner` with liquidity.
    async fn owned_position_ids(&self, owner: &str) -> Result<Vec<PositionId>>;

    /// Farmed positions of `owner` recovered from recent farm deposits.
    async fn farmed_position_ids(&self, owner: &str) -> Result<Vec<PositionId>>;

    /// Current state of a position, with farm status and pending reward.
    async fn position(&self, id: PositionId, owner: &str) -> Result<Position>;

    /// Pool address for a token pair and fee tier.
    async fn pool_address(&self, token0: &str, token1: &str, fee_tier: u32) -> Result<String>;

    /// Pool state with fee growth at the two range ticks, at `block` or the head.
    async fn pool_state(
        &self,
        pool: &str,
        tick_lower: i32,
        tick_upper: i32,
        block: Option<u64>,
    ) -> Result<PoolState>;

    /// ERC-20 metadata.
    async fn token(&self, address: &str) -> Result<Token>;

    /// Mint block, timestamp and deposited amounts.
    async fn mint_record(&self, id: PositionId) -> Result<MintRecord>;
}

/// Finds the first block in `[1, head]` where `exists` holds, given that it keeps
/// holding for every later block.
///
/// # Errors
/// Propagates errors from `exists`.
pub async fn first_block_where<F, Fut>(head: u64, mut exists: F) -> Result<Option<u64>>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let (mut low, mut high) = (1u64, head);
    let mut found = None;
    while low <= high {
        let mid = low + (high - low) / 2;
        if exists(mid).await? {
            found = Some(mid);
            if mid == 1 {
                break;
            }
            high = mid - 1;
        } else {
            low = mid + 1;
        }
    }
    Ok(found)
}

fn to_u256(value: AlloyU256) -> U256 {
    U256::from_big_endian(&value.to_be_bytes::<32>())
}

fn token_topic(id: PositionId) -> B256 {
    B256::from(AlloyU256::from(id.0).to_be_bytes::<32>())
}

fn topic_to_id(topic: &B256) -> Option<PositionId> {
    u64::try_from(AlloyU256::from_be_bytes(topic.0))
        .ok()
        .map(PositionId)
}

/// Whether an RPC error payload means the position did not exist at the queried
/// block. Other failures, such as pruned state, are not absence.
fn is_missing_token(code: i64, message: &str) -> bool {
    let message = message.to_lowercase();
    code == 3
        || message.contains("revert")
        || message.contains("nonexistent token")
        || message.contains("invalid token id")
}

fn parse_address(value: &str) -> Result<Address> {
    Address::from_str(value).with_context(|| format!("Invalid address: {value}"))
}

/// Chain reader over an alloy HTTP provider.
pub struct AlloyChainReader {
    provider: DynProvider,
    deployment: Deployment,
    discovery: BatchConfig,
    farm_lookback: u64,
    tokens: RwLock<HashMap<Address, Token>>,
}

impl AlloyChainReader {
    /// Creates a reader over an existing provider.
    #[must_use]
    pub fn new(provider: DynProvider, deployment: Deployment) -> Self {
        Self {
            provider,
            deployment,
            discovery: BatchConfig::discovery(),
            farm_lookback: 100_000,
            tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Connects to an HTTP JSON-RPC endpoint.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid.
    pub fn connect(rpc_url: &str, deployment: Deployment) -> Result<Self> {
        let url: reqwest::Url = rpc_url
            .parse()
            .with_context(|| format!("Invalid RPC URL: {rpc_url}"))?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Ok(Self::new(provider, deployment))
    }

    /// Chain id reported by the endpoint.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    pub async fn chain_id(&self) -> Result<u64> {
        self.provider
            .get_chain_id()
            .await
            .context("Failed to read chain id")
    }

    /// Sets chunking and lookback for farm deposit discovery.
    #[must_use]
    pub fn with_discovery(mut self, config: BatchConfig, lookback_blocks: u64) -> Self {
        self.discovery = config;
        self.farm_lookback = lookback_blocks;
        self
    }

    async fn call<C: SolCall + Send + Sync>(
        &self,
        to: Address,
        call: &C,
        block: Option<u64>,
    ) -> Result<C::Return> {
        let tx = TransactionRequest::default()
            .to(to)
            .input(call.abi_encode().into());
        let mut request = self.provider.call(tx);
        if let Some(block) = block {
            request = request.block(BlockId::number(block));
        }
        let output = request.await.with_context(|| format!("eth_call to {to} failed"))?;
        C::abi_decode_returns(&output)
            .with_context(|| format!("Failed to decode return of {}", C::SIGNATURE))
    }

    async fn logs(&self, filter: &Filter) -> Result<Vec<Log>> {
        self.provider
            .get_logs(filter)
            .await
            .context("eth_getLogs failed")
    }

    /// Whether the position NFT exists at `block`.
    async fn exists_at(&self, id: PositionId, block: u64) -> Result<bool> {
        let call = INonfungiblePositionManager::ownerOfCall {
            tokenId: AlloyU256::from(id.0),
        };
        let tx = TransactionRequest::default()
            .to(self.deployment.position_manager)
            .input(call.abi_encode().into());
        match self.provider.call(tx).block(BlockId::number(block)).await {
            // empty output before the contract existed
            Ok(output) => {
                Ok(INonfungiblePositionManager::ownerOfCall::abi_decode_returns(&output).is_ok())
            }
            Err(e)
                if e
                    .as_error_resp()
                    .is_some_and(|payload| is_missing_token(payload.code, &payload.message)) =>
            {
                Ok(false)
            }
            Err(e) => Err(anyhow!(e).context(format!("ownerOf({id}) at block {block} failed"))),
        }
    }

    async fn owner_of(&self, id: PositionId) -> Result<Address> {
        self.call(
            self.deployment.position_manager,
            &INonfungiblePositionManager::ownerOfCall {
                tokenId: AlloyU256::from(id.0),
            },
            None,
        )
        .await
    }

    async fn raw_position(
        &self,
        id: PositionId,
    ) -> Result<INonfungiblePositionManager::positionsReturn> {
        self.call(
            self.deployment.position_manager,
            &INonfungiblePositionManager::positionsCall {
                tokenId: AlloyU256::from(id.0),
            },
            None,
        )
        .await
    }

    async fn deposit_logs(&self, owner: Address, from: u64, to: u64) -> Result<Vec<PositionId>> {
        let filter = Filter::new()
            .address(self.deployment.masterchef)
            .event_signature(IMasterChefV3::Deposit::SIGNATURE_HASH)
            .topic1(owner.into_word())
            .from_block(from)
            .to_block(to);
        let logs = self.logs(&filter).await?;
        Ok(logs
            .iter()
            .filter_map(|log| log.inner.data.topics().get(2).and_then(topic_to_id))
            .collect())
    }

    fn decode_manager_log(log: &Log) -> Option<LogKind> {
        let data = &log.inner.data;
        match data.topics().first()? {
            sig if *sig == INonfungiblePositionManager::IncreaseLiquidity::SIGNATURE_HASH => {
                let e = INonfungiblePositionManager::IncreaseLiquidity::decode_log_data(data).ok()?;
                Some(LogKind::IncreaseLiquidity {
                    liquidity: e.liquidity,
                    amount0: to_u256(e.amount0),
                    amount1: to_u256(e.amount1),
                })
            }
            sig if *sig == INonfungiblePositionManager::DecreaseLiquidity::SIGNATURE_HASH => {
                let e = INonfungiblePositionManager::DecreaseLiquidity::decode_log_data(data).ok()?;
                Some(LogKind::DecreaseLiquidity {
                    liquidity: e.liquidity,
                    amount0: to_u256(e.amount0),
                    amount1: to_u256(e.amount1),
                })
            }
            sig if *sig == INonfungiblePositionManager::Collect::SIGNATURE_HASH => {
                let e = INonfungiblePositionManager::Collect::decode_log_data(data).ok()?;
                Some(LogKind::Collect {
                    amount0: to_u256(e.amount0),
                    amount1: to_u256(e.amount1),
                })
            }
            _ => None,
        }
    }

    fn decode_farm_log(log: &Log) -> Option<LogKind> {
        let data = &log.inner.data;
        match data.topics().first()? {
            sig if *sig == IMasterChefV3::Deposit::SIGNATURE_HASH => {
                let e = IMasterChefV3::Deposit::decode_log_data(data).ok()?;
                Some(LogKind::FarmDeposit {
                    liquidity: e.liquidity,
                })
            }
            sig if *sig == IMasterChefV3::Withdraw::SIGNATURE_HASH => {
                let e = IMasterChefV3::Withdraw::decode_log_data(data).ok()?;
                Some(LogKind::FarmWithdraw {
                    liquidity: e.liquidity,
                })
            }
            _ => None,
        }
    }

    fn decoded(logs: &[Log], decode: fn(&Log) -> Option<LogKind>) -> Vec<DecodedLog> {
        logs.iter()
            .filter_map(|log| {
                Some(DecodedLog {
                    block_number: log.block_number?,
                    log_index: log.log_index?,
                    kind: decode(log)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ChainReader for AlloyChainReader {
    async fn head_block(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .context("Failed to read head block")
    }

    async fn owned_position_ids(&self, owner: &str) -> Result<Vec<PositionId>> {
        let owner_address = parse_address(owner)?;
        let pm = self.deployment.position_manager;
        let count = self
            .call(
                pm,
                &INonfungiblePositionManager::balanceOfCall {
                    owner: owner_address,
                },
                None,
            )
            .await?;
        let count = u64::try_from(count).map_err(|_| anyhow!("Position count out of range"))?;

        let mut ids = Vec::new();
        for index in 0..count {
            let raw_id = self
                .call(
                    pm,
                    &INonfungiblePositionManager::tokenOfOwnerByIndexCall {
                        owner: owner_address,
                        index: AlloyU256::from(index),
                    },
                    None,
                )
                .await?;
            let id = PositionId(
                u64::try_from(raw_id).map_err(|_| anyhow!("Token id {raw_id} out of range"))?,
            );
            if self.raw_position(id).await?.liquidity > 0 {
                ids.push(id);
            }
        }
        debug!(owner, total = count, active = ids.len(), "Enumerated owned positions");
        Ok(ids)
    }

    async fn farmed_position_ids(&self, owner: &str) -> Result<Vec<PositionId>> {
        let owner_address = parse_address(owner)?;
        let head = ChainReader::head_block(self).await?;
        let start = head
            .saturating_sub(self.farm_lookback)
            .max(self.deployment.masterchef_deploy_block);
        let ranges = chunk_ranges(start, head, self.discovery.chunk_size);

        let results = run_batched(&ranges, &self.discovery, |from, to| async move {
            (from, to, self.deposit_logs(owner_address, from, to).await)
        })
        .await;

        let mut candidates = BTreeSet::new();
        for (from, to, result) in results {
            match result {
                Ok(ids) => candidates.extend(ids),
                Err(e) => error!(from, to, error = %e, "Failed to fetch farm deposit logs"),
            }
        }

        let mut ids = Vec::new();
        for id in candidates {
            let info = self
                .call(
                    self.deployment.masterchef,
                    &IMasterChefV3::userPositionInfosCall {
                        tokenId: AlloyU256::from(id.0),
                    },
                    None,
                )
                .await;
            match info {
                Ok(info) if info.liquidity > 0 && info.user == owner_address => ids.push(id),
                Ok(_) => debug!(token_id = %id, "Farm position no longer active"),
                Err(e) => error!(token_id = %id, error = %e, "Failed to validate farm position"),
            }
        }
        info!(owner, found = ids.len(), "Recovered farmed positions from logs");
        Ok(ids)
    }

    async fn position(&self, id: PositionId, owner: &str) -> Result<Position> {
        let raw = self
            .raw_position(id)
            .await
            .with_context(|| format!("Failed to read position {id}"))?;
        let holder = self.owner_of(id).await?;
        let staked = holder == self.deployment.masterchef;
        let pending = if staked {
            let call = IMasterChefV3::pendingCakeCall {
                tokenId: AlloyU256::from(id.0),
            };
            match self.call(self.deployment.masterchef, &call, None).await {
                Ok(pending) => Some(to_u256(pending)),
                Err(e) => {
                    warn!(token_id = %id, error = %e, "Pending reward unavailable");
                    None
                }
            }
        } else {
            Some(U256::zero())
        };

        let position = Position::new(
            id,
            owner,
            raw.token0.to_string(),
            raw.token1.to_string(),
            raw.fee.to::<u32>(),
            raw.tickLower.as_i32(),
            raw.tickUpper.as_i32(),
            raw.liquidity,
        )?
        .with_fee_checkpoints(
            to_u256(raw.feeGrowthInside0LastX128),
            to_u256(raw.feeGrowthInside1LastX128),
            raw.tokensOwed0,
            raw.tokensOwed1,
        )
        .with_staking(staked, pending);
        Ok(position)
    }

    async fn pool_address(&self, token0: &str, token1: &str, fee_tier: u32) -> Result<String> {
        let pool = self
            .call(
                self.deployment.factory,
                &IPancakeV3Factory::getPoolCall {
                    tokenA: parse_address(token0)?,
                    tokenB: parse_address(token1)?,
                    fee: U24::from(fee_tier),
                },
                None,
            )
            .await?;
        if pool == Address::ZERO {
            bail!("No pool for {token0}/{token1} at fee {fee_tier}");
        }
        Ok(pool.to_string())
    }

    async fn pool_state(
        &self,
        pool: &str,
        tick_lower: i32,
        tick_upper: i32,
        block: Option<u64>,
    ) -> Result<PoolState> {
        let address = parse_address(pool)?;
        let lower_call = IPancakeV3Pool::ticksCall {
            tick: I24::unchecked_from(tick_lower),
        };
        let upper_call = IPancakeV3Pool::ticksCall {
            tick: I24::unchecked_from(tick_upper),
        };
        let (slot0, liquidity, global0, global1, lower, upper) = tokio::try_join!(
            self.call(address, &IPancakeV3Pool::slot0Call {}, block),
            self.call(address, &IPancakeV3Pool::liquidityCall {}, block),
            self.call(address, &IPancakeV3Pool::feeGrowthGlobal0X128Call {}, block),
            self.call(address, &IPancakeV3Pool::feeGrowthGlobal1X128Call {}, block),
            self.call(address, &lower_call, block),
            self.call(address, &upper_call, block),
        )
        .with_context(|| format!("Failed to read pool {pool}"))?;

        Ok(PoolState {
            address: pool.to_string(),
            tick: slot0.tick.as_i32(),
            sqrt_price_x96: to_u256(AlloyU256::from(slot0.sqrtPriceX96)),
            liquidity,
            fee_growth_global0: to_u256(global0),
            fee_growth_global1: to_u256(global1),
            lower: TickFeeGrowth {
                fee_growth_outside0: to_u256(lower.feeGrowthOutside0X128),
                fee_growth_outside1: to_u256(lower.feeGrowthOutside1X128),
            },
            upper: TickFeeGrowth {
                fee_growth_outside0: to_u256(upper.feeGrowthOutside0X128),
                fee_growth_outside1: to_u256(upper.feeGrowthOutside1X128),
            },
            block_number: block,
        })
    }

    async fn token(&self, address: &str) -> Result<Token> {
        let address = parse_address(address)?;
        if let Some(token) = self.tokens.read().await.get(&address) {
            return Ok(token.clone());
        }
        let decimals = self
            .call(address, &IERC20::decimalsCall {}, None)
            .await
            .with_context(|| format!("Failed to read decimals of {address}"))?;
        let symbol = match self.call(address, &IERC20::symbolCall {}, None).await {
            Ok(symbol) => symbol,
            Err(e) => {
                warn!(token = %address, error = %e, "Token symbol unavailable");
                let hex = address.to_string();
                hex.chars().take(8).collect()
            }
        };
        let token = Token::new(address.to_string(), symbol, decimals);
        self.tokens.write().await.insert(address, token.clone());
        Ok(token)
    }

    async fn mint_record(&self, id: PositionId) -> Result<MintRecord> {
        let head = ChainReader::head_block(self).await?;
        let block = first_block_where(head, |b| self.exists_at(id, b))
            .await?
            .ok_or_else(|| anyhow!("Mint block not found for position {id}"))?;
        let timestamp = PositionLogSource::block_timestamp(self, block).await?;

        let filter = Filter::new()
            .address(self.deployment.position_manager)
            .event_signature(INonfungiblePositionManager::Transfer::SIGNATURE_HASH)
            .topic1(B256::ZERO)
            .topic3(token_topic(id))
            .from_block(block)
            .to_block(block);
        let mint_log = self
            .logs(&filter)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No mint transfer in block {block} for position {id}"))?;
        let tx_hash = mint_log
            .transaction_hash
            .ok_or_else(|| anyhow!("Mint transfer of position {id} has no transaction hash"))?;
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .context("Failed to fetch mint receipt")?
            .ok_or_else(|| anyhow!("Mint receipt {tx_hash} not found"))?;

        let target = AlloyU256::from(id.0);
        let deposit = receipt
            .inner
            .logs()
            .iter()
            .filter(|log| log.inner.address == self.deployment.position_manager)
            .filter_map(|log| {
                INonfungiblePositionManager::IncreaseLiquidity::decode_log_data(&log.inner.data)
                    .ok()
            })
            .find(|e| e.tokenId == target)
            .ok_or_else(|| anyhow!("No IncreaseLiquidity in mint transaction of position {id}"))?;

        debug!(token_id = %id, block, timestamp, "Found mint record");
        Ok(MintRecord {
            block,
            timestamp,
            amount0: to_u256(deposit.amount0),
            amount1: to_u256(deposit.amount1),
        })
    }
}

#[async_trait]
impl PositionLogSource for AlloyChainReader {
    async fn head_block(&self) -> Result<u64> {
        ChainReader::head_block(self).await
    }

    async fn block_timestamp(&self, block: u64) -> Result<u64> {
        let found = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(block))
            .await
            .with_context(|| format!("Failed to fetch block {block}"))?
            .ok_or_else(|| anyhow!("Block {block} not found"))?;
        Ok(found.header.timestamp)
    }

    async fn manager_logs(
        &self,
        token_id: PositionId,
        from: u64,
        to: u64,
    ) -> Result<Vec<DecodedLog>> {
        let filter = Filter::new()
            .address(self.deployment.position_manager)
            .event_signature(vec![
                INonfungiblePositionManager::IncreaseLiquidity::SIGNATURE_HASH,
                INonfungiblePositionManager::DecreaseLiquidity::SIGNATURE_HASH,
                INonfungiblePositionManager::Collect::SIGNATURE_HASH,
            ])
            .topic1(token_topic(token_id))
            .from_block(from)
            .to_block(to);
        let logs = self.logs(&filter).await?;
        Ok(Self::decoded(&logs, Self::decode_manager_log))
    }

    async fn farm_logs(
        &self,
        token_id: PositionId,
        owner: &str,
        from: u64,
        to: u64,
    ) -> Result<Vec<DecodedLog>> {
        let filter = Filter::new()
            .address(self.deployment.masterchef)
            .event_signature(vec![
                IMasterChefV3::Deposit::SIGNATURE_HASH,
                IMasterChefV3::Withdraw::SIGNATURE_HASH,
            ])
            .topic1(parse_address(owner)?.into_word())
            .topic2(token_topic(token_id))
            .from_block(from)
            .to_block(to);
        let logs = self.logs(&filter).await?;
        Ok(Self::decoded(&logs, Self::decode_farm_log))
    }

    async fn reward_logs(&self, owner: &str, from: u64, to: u64) -> Result<Vec<DecodedLog>> {
        let filter = Filter::new()
            .address(self.deployment.reward_token)
            .event_signature(IERC20::Transfer::SIGNATURE_HASH)
            .topic1(self.deployment.masterchef.into_word())
            .topic2(parse_address(owner)?.into_word())
            .from_block(from)
            .to_block(to);
        let logs = self.logs(&filter).await?;
        Ok(Self::decoded(&logs, |log| {
            let e = IERC20::Transfer::decode_log_data(&log.inner.data).ok()?;
            Some(LogKind::RewardTransfer {
                amount: to_u256(e.value),
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_block_where_finds_mint() {
        for mint in [1u64, 2, 500, 12_345, 99_999, 100_000] {
            let found = first_block_where(100_000, |b| async move { Ok(b >= mint) })
                .await
                .unwrap();
            assert_eq!(found, Some(mint));
        }
    }

    #[tokio::test]
    async fn test_first_block_where_none_when_missing() {
        let found = first_block_where(1_000, |_| async { Ok(false) }).await.unwrap();
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn test_first_block_where_propagates_errors() {
        let result = first_block_where(1_000, |_| async { Err(anyhow!("node down")) }).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_reverts_mean_missing_token() {
        assert!(is_missing_token(3, "execution reverted"));
        assert!(is_missing_token(
            -32000,
            "execution reverted: ERC721: owner query for nonexistent token"
        ));
        assert!(is_missing_token(-32015, "VM Exception: Invalid token ID"));
    }

    #[test]
    fn test_node_failures_are_not_missing_token() {
        assert!(!is_missing_token(-32000, "missing trie node 0xabc (path )"));
        assert!(!is_missing_token(-32000, "header not found"));
        assert!(!is_missing_token(-32005, "rate limit exceeded"));
    }

    #[test]
    fn test_token_topic_round_trip() {
        let topic = token_topic(PositionId(457_993));
        assert_eq!(topic_to_id(&topic), Some(PositionId(457_993)));
        assert_eq!(topic.0[31], (457_993u64 & 0xff) as u8);
    }

    #[test]
    fn test_to_u256_preserves_value() {
        let value = AlloyU256::from(1u64) << 200;
        assert_eq!(to_u256(value), U256::one() << 200);
    }
}
