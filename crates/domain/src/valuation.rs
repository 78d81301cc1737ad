//! Valuation engine.
//!
//! Combines a position, the live pool state, its mint snapshot and USD prices into
//! balances, uncollected fees, rewards, yield projections and impermanent loss.
//! Sections that need a missing USD price come back as `None`.

use crate::entities::{ClaimedTotals, MintSnapshot, PoolState, Position, PositionId, Token};
use crate::enums::{PositionStatus, QuoteSide};
use crate::error::DomainError;
use crate::math::concentrated_liquidity::position_amounts;
use crate::math::fee_growth::position_uncollected_fees;
use crate::math::fixed_point::raw_to_decimal;
use crate::math::price_tick::{sqrt_price_x96_to_price, tick_to_price};
use crate::metrics::fees::{breakeven, breakeven_progress, project_yield};
use crate::metrics::impermanent_loss::{IlInputs, estimate_liquidity, impermanent_loss_at};
use crate::metrics::{
    BoundAnalysis, ImpermanentLoss, LiquidityEstimate, PnL, RewardBreakdown, YieldProjection,
};
use crate::value_objects::{Percentage, Price, PriceRange};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Decimal places kept in impermanent loss outputs.
pub const OUTPUT_DP: u32 = 8;

/// USD unit prices, any of which may be unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsdPrices {
    pub token0: Option<Decimal>,
    pub token1: Option<Decimal>,
    pub reward: Option<Decimal>,
}

impl UsdPrices {
    /// Derives a missing token price from the other one and the pool price (token1 per token0).
    #[must_use]
    pub fn complete_with_pool_price(mut self, pool_price: Decimal) -> Self {
        match (self.token0, self.token1) {
            (None, Some(p1)) => self.token0 = p1.checked_mul(pool_price),
            (Some(p0), None) if !pool_price.is_zero() => self.token1 = p0.checked_div(pool_price),
            _ => {}
        }
        self
    }

    fn quote(&self, quote: QuoteSide) -> Option<Decimal> {
        match quote {
            QuoteSide::Token0 => self.token0,
            QuoteSide::Token1 => self.token1,
        }
    }
}

/// Everything the engine needs to value one position.
#[derive(Debug, Clone)]
pub struct ValuationInput<'a> {
    pub position: &'a Position,
    pub pool: &'a PoolState,
    /// Mint snapshot, `None` when the mint could not be recovered.
    pub snapshot: Option<&'a MintSnapshot>,
    pub token0: &'a Token,
    pub token1: &'a Token,
    pub reward_decimals: u8,
    pub quote: QuoteSide,
    pub prices: UsdPrices,
    pub claimed: ClaimedTotals,
    /// Current unix time in seconds.
    pub now: u64,
}

/// A pair of token amounts in token units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenBalances {
    pub amount0: Decimal,
    pub amount1: Decimal,
}

/// Range and current price in display orientation (quote per base).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeView {
    pub lower: Decimal,
    pub upper: Decimal,
    pub current: Decimal,
    /// e.g. "USDC per WETH".
    pub label: String,
    pub percent_to_lower: Option<Decimal>,
    pub percent_to_upper: Option<Decimal>,
    /// 0 at the lower bound, 100 at the upper bound.
    pub position_percent: Decimal,
}

/// Impermanent loss at the current price and at both range bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IlAnalysis {
    pub position_age_secs: u64,
    pub liquidity: LiquidityEstimate,
    pub current: ImpermanentLoss,
    /// Total rewards plus current IL.
    pub net_gain_loss_usd: Decimal,
    pub upper_bound: BoundAnalysis,
    pub lower_bound: BoundAnalysis,
}

/// Output of the valuation engine for one position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionValuation {
    pub token_id: PositionId,
    pub status: PositionStatus,
    /// Token1 per token0.
    pub pool_price: Decimal,
    pub range: Option<RangeView>,
    pub balances: TokenBalances,
    pub uncollected_fees: TokenBalances,
    /// Pending farm reward in reward-token units, when known.
    pub pending_reward: Option<Decimal>,
    pub usd_prices: UsdPrices,
    pub current_value_usd: Option<Decimal>,
    pub opening_value_usd: Option<Decimal>,
    pub pnl: Option<PnL>,
    pub rewards: Option<RewardBreakdown>,
    pub projection: Option<YieldProjection>,
    pub impermanent_loss: Option<IlAnalysis>,
}

/// Orients a token1-per-token0 range and price as quote per base.
fn orient_range(quote: QuoteSide, range: PriceRange, price: Decimal) -> (PriceRange, Decimal) {
    match quote {
        QuoteSide::Token1 => (range, price),
        QuoteSide::Token0 => (range.invert(), Price::new(price).invert().value),
    }
}

/// Splits token0/token1 amounts into (base, quote).
fn orient_amounts(quote: QuoteSide, amount0: Decimal, amount1: Decimal) -> (Decimal, Decimal) {
    match quote {
        QuoteSide::Token1 => (amount0, amount1),
        QuoteSide::Token0 => (amount1, amount0),
    }
}

/// USD value of an amount, `Some(0)` for a zero amount even without a price.
fn usd_value(amount: Decimal, price: Option<Decimal>) -> Option<Decimal> {
    if amount.is_zero() {
        return Some(Decimal::ZERO);
    }
    price.and_then(|p| amount.checked_mul(p))
}

fn pair_value(balances: TokenBalances, prices: &UsdPrices) -> Option<Decimal> {
    Some(usd_value(balances.amount0, prices.token0)? + usd_value(balances.amount1, prices.token1)?)
}

/// USD value of the mint deposit at the opening price.
///
/// The deposit is valued in quote units, `quote + base * P0`, and converted with the
/// quote token's USD price.
#[must_use]
pub fn opening_value_usd(
    snapshot: &MintSnapshot,
    quote: QuoteSide,
    quote_usd: Option<Decimal>,
) -> Option<Decimal> {
    let (base, quote_amount) = orient_amounts(quote, snapshot.amount0, snapshot.amount1);
    let entry = match quote {
        QuoteSide::Token1 => snapshot.opening_price,
        QuoteSide::Token0 => Price::new(snapshot.opening_price).invert().value,
    };
    let value_in_quote = base.checked_mul(entry)?.checked_add(quote_amount)?;
    value_in_quote.checked_mul(quote_usd?)
}

fn range_view(
    input: &ValuationInput<'_>,
    pool_price: Decimal,
) -> Result<(RangeView, PriceRange), DomainError> {
    let lower = tick_to_price(
        input.position.tick_lower,
        input.token0.decimals,
        input.token1.decimals,
    )?;
    let upper = tick_to_price(
        input.position.tick_upper,
        input.token0.decimals,
        input.token1.decimals,
    )?;
    let (range, current) = orient_range(
        input.quote,
        PriceRange::new(Price::new(lower), Price::new(upper))?,
        pool_price,
    );
    let (base, quote) = match input.quote {
        QuoteSide::Token1 => (input.token0, input.token1),
        QuoteSide::Token0 => (input.token1, input.token0),
    };
    let view = RangeView {
        lower: range.lower_price.value,
        upper: range.upper_price.value,
        current,
        label: format!("{} per {}", quote.symbol, base.symbol),
        percent_to_lower: range.percent_to_lower(Price::new(current)),
        percent_to_upper: range.percent_to_upper(Price::new(current)),
        position_percent: range.position_percent(Price::new(current)),
    };
    Ok((view, range))
}

fn rewards(
    input: &ValuationInput<'_>,
    prices: &UsdPrices,
    fees: TokenBalances,
    pending_reward: Option<Decimal>,
) -> Option<RewardBreakdown> {
    let claimed = TokenBalances {
        amount0: input.claimed.fees0,
        amount1: input.claimed.fees1,
    };
    Some(RewardBreakdown {
        claimed_fees_usd: pair_value(claimed, prices)?,
        unclaimed_fees_usd: pair_value(fees, prices)?,
        claimed_reward_usd: usd_value(input.claimed.reward, prices.reward)?,
        pending_reward_usd: usd_value(pending_reward?, prices.reward)?,
    })
}

fn bound_analysis(
    inputs: &IlInputs,
    estimate: &LiquidityEstimate,
    price: Decimal,
    quote_usd: Decimal,
    total_rewards: Decimal,
    age: u64,
) -> Result<BoundAnalysis, DomainError> {
    let loss = usd_loss(inputs, estimate, price, quote_usd)?;
    let breakeven = breakeven(loss.il_usd, total_rewards, age);
    Ok(BoundAnalysis {
        breakeven_progress: breakeven_progress(&breakeven, age),
        fees_vs_il_net: (total_rewards + loss.il_usd).round_dp(OUTPUT_DP),
        breakeven,
        loss,
    })
}

fn usd_loss(
    inputs: &IlInputs,
    estimate: &LiquidityEstimate,
    price: Decimal,
    quote_usd: Decimal,
) -> Result<ImpermanentLoss, DomainError> {
    let point = impermanent_loss_at(inputs, estimate, price)?;
    let il_usd = point
        .il_value
        .checked_mul(quote_usd)
        .ok_or(DomainError::Overflow("usd_loss"))?;
    Ok(ImpermanentLoss {
        price: point.price.round_dp(OUTPUT_DP),
        il_usd: il_usd.round_dp(OUTPUT_DP),
        il_percent: point.il_percent.round_dp(OUTPUT_DP),
    })
}

fn il_analysis(
    input: &ValuationInput<'_>,
    snapshot: &MintSnapshot,
    range: &PriceRange,
    current: Decimal,
    quote_usd: Decimal,
    total_rewards: Decimal,
) -> Result<IlAnalysis, DomainError> {
    let (base_deposit, quote_deposit) =
        orient_amounts(input.quote, snapshot.amount0, snapshot.amount1);
    let entry_price = match input.quote {
        QuoteSide::Token1 => snapshot.opening_price,
        QuoteSide::Token0 => Price::new(snapshot.opening_price).invert().value,
    };
    let inputs = IlInputs {
        base_deposit,
        quote_deposit,
        entry_price,
        price_lower: range.lower_price.value,
        price_upper: range.upper_price.value,
    };
    let estimate = estimate_liquidity(&inputs)?;
    let age = input.now.saturating_sub(snapshot.mint_timestamp);

    let current_loss = usd_loss(&inputs, &estimate, current, quote_usd)?;
    Ok(IlAnalysis {
        position_age_secs: age,
        liquidity: estimate,
        net_gain_loss_usd: (total_rewards + current_loss.il_usd).round_dp(OUTPUT_DP),
        current: current_loss,
        upper_bound: bound_analysis(
            &inputs,
            &estimate,
            inputs.price_upper,
            quote_usd,
            total_rewards,
            age,
        )?,
        lower_bound: bound_analysis(
            &inputs,
            &estimate,
            inputs.price_lower,
            quote_usd,
            total_rewards,
            age,
        )?,
    })
}

/// Values one position.
///
/// # Errors
/// Returns an error when the pool price, balances or fees cannot be computed.
/// Range, USD and impermanent loss sections degrade to `None` instead.
pub fn value_position(input: &ValuationInput<'_>) -> Result<PositionValuation, DomainError> {
    let position = input.position;
    let pool = input.pool;
    let (dec0, dec1) = (input.token0.decimals, input.token1.decimals);

    let pool_price = sqrt_price_x96_to_price(pool.sqrt_price_x96, dec0, dec1)?;

    let (raw0, raw1) = position_amounts(
        pool.tick,
        pool.sqrt_price_x96,
        position.tick_lower,
        position.tick_upper,
        position.liquidity,
    )?;
    let balances = TokenBalances {
        amount0: raw_to_decimal(raw0, dec0)?,
        amount1: raw_to_decimal(raw1, dec1)?,
    };

    let fees = position_uncollected_fees(position, pool)?;
    let uncollected_fees = TokenBalances {
        amount0: raw_to_decimal(fees.amount0, dec0)?,
        amount1: raw_to_decimal(fees.amount1, dec1)?,
    };
    let pending_reward = position
        .pending_reward
        .map(|raw| raw_to_decimal(raw, input.reward_decimals))
        .transpose()?;

    let prices = input.prices.complete_with_pool_price(pool_price);
    let current_value_usd = pair_value(balances, &prices);
    let opening_value_usd = input.snapshot.and_then(|s| s.opening_value_usd);
    let pnl = match (current_value_usd, opening_value_usd) {
        (Some(current), Some(opening)) => Some(PnL {
            gain_loss_usd: current - opening,
            gain_loss_percent: Percentage::of(current - opening, opening).map(|p| p.value()),
        }),
        _ => None,
    };

    let rewards = rewards(input, &prices, uncollected_fees, pending_reward);
    let age = input
        .snapshot
        .map(|s| input.now.saturating_sub(s.mint_timestamp));
    let projection = match (rewards, current_value_usd, age) {
        (Some(r), Some(value), Some(age)) => project_yield(r.total(), age, value),
        _ => None,
    };

    let range = match range_view(input, pool_price) {
        Ok(r) => Some(r),
        Err(e) => {
            debug!(token_id = %position.id, error = %e, "Range prices unavailable");
            None
        }
    };

    // net and breakeven figures need the reward total
    let impermanent_loss = match (&range, prices.quote(input.quote), input.snapshot, rewards) {
        (Some((view, oriented)), Some(quote_usd), Some(snapshot), Some(r)) => {
            match il_analysis(input, snapshot, oriented, view.current, quote_usd, r.total()) {
                Ok(analysis) => Some(analysis),
                Err(e) => {
                    debug!(token_id = %position.id, error = %e, "Impermanent loss unavailable");
                    None
                }
            }
        }
        _ => None,
    };

    Ok(PositionValuation {
        token_id: position.id,
        status: position.status(pool.tick),
        pool_price,
        range: range.map(|(view, _)| view),
        balances,
        uncollected_fees,
        pending_reward,
        usd_prices: prices,
        current_value_usd,
        opening_value_usd,
        pnl,
        rewards,
        projection,
        impermanent_loss,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::TickFeeGrowth;
    use crate::math::tick_math::get_sqrt_ratio_at_tick;
    use crate::metrics::Breakeven;
    use primitive_types::U256;
    use rust_decimal_macros::dec;

    const LIQUIDITY: u128 = 1_000_000_000_000_000_000;
    const MINT_TS: u64 = 1_700_000_000;

    fn tokens() -> (Token, Token) {
        (
            Token::new("0xbase", "WETH", 18),
            Token::new("0xquote", "USDX", 18),
        )
    }

    fn position() -> Position {
        Position::new(
            PositionId(1),
            "0xowner",
            "0xbase",
            "0xquote",
            500,
            -600,
            600,
            LIQUIDITY,
        )
        .unwrap()
    }

    fn pool_at(tick: i32) -> PoolState {
        PoolState {
            address: "0xpool".to_string(),
            tick,
            sqrt_price_x96: get_sqrt_ratio_at_tick(tick).unwrap(),
            liquidity: LIQUIDITY,
            fee_growth_global0: U256::zero(),
            fee_growth_global1: U256::zero(),
            lower: TickFeeGrowth::default(),
            upper: TickFeeGrowth::default(),
            block_number: None,
        }
    }

    fn snapshot() -> MintSnapshot {
        let (a0, a1) = position_amounts(
            0,
            get_sqrt_ratio_at_tick(0).unwrap(),
            -600,
            600,
            LIQUIDITY,
        )
        .unwrap();
        let mut snap = MintSnapshot {
            token_id: PositionId(1),
            mint_block: 100,
            mint_timestamp: MINT_TS,
            amount0: raw_to_decimal(a0, 18).unwrap(),
            amount1: raw_to_decimal(a1, 18).unwrap(),
            tick_lower: -600,
            tick_upper: 600,
            opening_tick: 0,
            opening_price: Decimal::ONE,
            decimals0: 18,
            decimals1: 18,
            opening_value_usd: None,
        };
        snap.opening_value_usd = opening_value_usd(&snap, QuoteSide::Token1, Some(Decimal::ONE));
        snap
    }

    fn value(
        pool: &PoolState,
        prices: UsdPrices,
        quote: QuoteSide,
        now: u64,
    ) -> PositionValuation {
        let (t0, t1) = tokens();
        let position = position();
        let snapshot = snapshot();
        value_position(&ValuationInput {
            position: &position,
            pool,
            snapshot: Some(&snapshot),
            token0: &t0,
            token1: &t1,
            reward_decimals: 18,
            quote,
            prices,
            claimed: ClaimedTotals::default(),
            now,
        })
        .unwrap()
    }

    fn stable_quote() -> UsdPrices {
        UsdPrices {
            token0: None,
            token1: Some(Decimal::ONE),
            reward: Some(dec!(2)),
        }
    }

    #[test]
    fn test_il_zero_when_price_unchanged() {
        let v = value(&pool_at(0), stable_quote(), QuoteSide::Token1, MINT_TS + 3_600);
        assert_eq!(v.status, PositionStatus::InRange);
        // token0 price derived from the pool price
        assert_eq!(v.usd_prices.token0, Some(Decimal::ONE));

        let il = v.impermanent_loss.unwrap();
        assert!(il.current.il_usd.abs() < dec!(0.000001));
        assert!(!il.liquidity.divergence_warning);

        let opening = v.opening_value_usd.unwrap();
        let current = v.current_value_usd.unwrap();
        assert!((opening - current).abs() < dec!(0.000001));
    }

    #[test]
    fn test_breakeven_unavailable_without_rewards() {
        let v = value(&pool_at(300), stable_quote(), QuoteSide::Token1, MINT_TS);
        let il = v.impermanent_loss.unwrap();
        assert!(il.current.il_usd < Decimal::ZERO);
        assert_eq!(il.upper_bound.breakeven, Breakeven::InsufficientData);
        assert_eq!(il.lower_bound.breakeven, Breakeven::InsufficientData);
        assert!(v.projection.is_none());
    }

    #[test]
    fn test_missing_prices_drop_usd_sections() {
        let v = value(&pool_at(0), UsdPrices::default(), QuoteSide::Token1, MINT_TS + 60);
        assert!(v.current_value_usd.is_none());
        assert!(v.impermanent_loss.is_none());
        assert!(v.pnl.is_none());
        // balances do not depend on prices
        assert!(v.balances.amount0 > Decimal::ZERO);
        assert!(v.range.is_some());
    }

    #[test]
    fn test_without_snapshot_only_live_figures_remain() {
        let (t0, t1) = tokens();
        let position = position();
        let pool = pool_at(0);
        let v = value_position(&ValuationInput {
            position: &position,
            pool: &pool,
            snapshot: None,
            token0: &t0,
            token1: &t1,
            reward_decimals: 18,
            quote: QuoteSide::Token1,
            prices: stable_quote(),
            claimed: ClaimedTotals::default(),
            now: MINT_TS,
        })
        .unwrap();
        assert!(v.current_value_usd.is_some());
        assert!(v.rewards.is_some());
        assert!(v.opening_value_usd.is_none());
        assert!(v.pnl.is_none());
        assert!(v.projection.is_none());
        assert!(v.impermanent_loss.is_none());
    }

    #[test]
    fn test_unpriced_pending_reward_drops_il_and_projection() {
        let (t0, t1) = tokens();
        let position = position().with_staking(true, Some(U256::exp10(20)));
        let snapshot = snapshot();
        let pool = pool_at(300);
        let v = value_position(&ValuationInput {
            position: &position,
            pool: &pool,
            snapshot: Some(&snapshot),
            token0: &t0,
            token1: &t1,
            reward_decimals: 18,
            quote: QuoteSide::Token1,
            prices: UsdPrices {
                token0: None,
                token1: Some(Decimal::ONE),
                reward: None,
            },
            claimed: ClaimedTotals::default(),
            now: MINT_TS + 3_600,
        })
        .unwrap();
        assert_eq!(v.pending_reward, Some(dec!(100)));
        assert!(v.rewards.is_none());
        assert!(v.impermanent_loss.is_none());
        assert!(v.projection.is_none());
        // live value does not depend on the reward price
        assert!(v.current_value_usd.is_some());
    }

    #[test]
    fn test_unknown_pending_reward_keeps_position_value() {
        let (t0, t1) = tokens();
        let position = position().with_staking(true, None);
        let snapshot = snapshot();
        let pool = pool_at(300);
        let v = value_position(&ValuationInput {
            position: &position,
            pool: &pool,
            snapshot: Some(&snapshot),
            token0: &t0,
            token1: &t1,
            reward_decimals: 18,
            quote: QuoteSide::Token1,
            prices: stable_quote(),
            claimed: ClaimedTotals::default(),
            now: MINT_TS + 3_600,
        })
        .unwrap();
        assert_eq!(v.pending_reward, None);
        assert!(v.rewards.is_none());
        assert!(v.impermanent_loss.is_none());
        assert!(v.current_value_usd.is_some());
        assert!(v.range.is_some());
    }

    #[test]
    fn test_out_of_range_above_is_all_token1() {
        let v = value(&pool_at(900), stable_quote(), QuoteSide::Token1, MINT_TS + 60);
        assert_eq!(v.status, PositionStatus::OutOfRange);
        assert_eq!(v.balances.amount0, Decimal::ZERO);
        assert!(v.balances.amount1 > Decimal::ZERO);
        assert_eq!(v.range.unwrap().position_percent, dec!(100));
    }

    #[test]
    fn test_token0_quote_inverts_range() {
        let prices = UsdPrices {
            token0: Some(Decimal::ONE),
            token1: None,
            reward: None,
        };
        let v = value(&pool_at(0), prices, QuoteSide::Token0, MINT_TS + 60);
        let range = v.range.unwrap();
        assert_eq!(range.label, "WETH per USDX");
        assert!(range.lower < range.upper);
        // 1 / 1.0001^600 and 1 / 1.0001^-600
        assert!((range.lower - dec!(0.94176)).abs() < dec!(0.0001));
        assert!((range.upper - dec!(1.06184)).abs() < dec!(0.0001));
    }
}
