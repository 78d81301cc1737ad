//! Report models.
//!
//! Field names follow what the web page reads, so several values are preformatted
//! strings. Raw numbers stay available through [`PositionReport::valuation`] and
//! [`PortfolioReport::totals`].

use crate::format::{
    NOT_AVAILABLE, amount, date, grouped, percent, percent_opt, price, usd, usd_opt,
};
use clmm_yield_domain::entities::{MintSnapshot, Position, PositionEvent, Token};
use clmm_yield_domain::enums::{PositionStatus, QuoteSide};
use clmm_yield_domain::metrics::fees::format_duration;
use clmm_yield_domain::metrics::{BoundAnalysis, Breakeven};
use clmm_yield_domain::valuation::{IlAnalysis, PositionValuation};
use clmm_yield_domain::value_objects::Price;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// A token amount with its USD unit price when known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenAmount {
    pub symbol: String,
    pub amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
}

/// State of the position when it was minted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialState {
    pub price: String,
    pub usd_value: String,
    pub balances: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IlCurrent {
    pub il_usd: String,
    pub il_perc: String,
    /// Rewards plus IL, grouped without a currency sign.
    pub net_gain_loss: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundReport {
    pub price: String,
    pub il_usd: String,
    pub il_perc: String,
    /// `Met`, `N/A` or a duration such as `12d 4h`.
    pub breakeven_time: String,
    /// Elapsed share of the breakeven time, -1 when met or unavailable.
    pub breakeven_time_perc: i64,
    pub fees_vs_il: String,
    pub fees_vs_il_net: Decimal,
}

impl BoundReport {
    fn new(bound: &BoundAnalysis) -> Self {
        let breakeven_time = match bound.breakeven {
            Breakeven::Met => "Met".to_string(),
            Breakeven::InsufficientData => NOT_AVAILABLE.to_string(),
            Breakeven::Pending { seconds } => format_duration(seconds.to_u64().unwrap_or(u64::MAX)),
        };
        Self {
            price: price(bound.loss.price),
            il_usd: usd(bound.loss.il_usd),
            il_perc: percent(bound.loss.il_percent),
            breakeven_time,
            breakeven_time_perc: bound
                .breakeven_progress
                .and_then(|p| p.round().to_i64())
                .unwrap_or(-1),
            fees_vs_il: usd(bound.fees_vs_il_net),
            fees_vs_il_net: bound.fees_vs_il_net.round_dp(2),
        }
    }
}

/// Impermanent loss section of a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IlReport {
    pub position_age: String,
    pub current: IlCurrent,
    pub upper_bound: BoundReport,
    pub lower_bound: BoundReport,
    /// The two liquidity estimates disagreed.
    pub liquidity_warning: bool,
}

impl IlReport {
    fn new(il: &IlAnalysis) -> Self {
        Self {
            position_age: format_duration(il.position_age_secs),
            current: IlCurrent {
                il_usd: usd(il.current.il_usd),
                il_perc: percent(il.current.il_percent),
                net_gain_loss: grouped(il.net_gain_loss_usd),
            },
            upper_bound: BoundReport::new(&il.upper_bound),
            lower_bound: BoundReport::new(&il.lower_bound),
            liquidity_warning: il.liquidity.divergence_warning,
        }
    }
}

/// One event of a position's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventReport {
    pub kind: String,
    pub date: String,
    pub timestamp: u64,
    pub block_number: u64,
    pub details: String,
}

impl From<&PositionEvent> for EventReport {
    fn from(event: &PositionEvent) -> Self {
        Self {
            kind: event.kind.label().to_string(),
            date: date(event.timestamp),
            timestamp: event.timestamp,
            block_number: event.block_number,
            details: event.details.clone(),
        }
    }
}

/// Inputs for rendering one position.
#[derive(Debug, Clone, Copy)]
pub struct PositionContext<'a> {
    pub position: &'a Position,
    pub token0: &'a Token,
    pub token1: &'a Token,
    pub reward: &'a Token,
    pub quote: QuoteSide,
    pub snapshot: Option<&'a MintSnapshot>,
    pub valuation: &'a PositionValuation,
    pub events: &'a [PositionEvent],
}

/// Report of one active position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionReport {
    pub token_id: u64,
    pub pair: String,
    pub fee_tier: String,
    pub staked: bool,
    pub status: PositionStatus,
    pub price_label: String,
    pub price_range_lower: String,
    pub price_range_upper: String,
    pub current_price: String,
    pub perc_to_lower: String,
    pub perc_to_upper: String,
    /// Where the current price sits in the range, 0 to 100.
    pub price_range_percentage: Decimal,
    pub estimated_value_usd: String,
    pub current_balances: String,
    pub initial_state: InitialState,
    #[serde(rename = "unclaimedFees")]
    pub unclaimed_fees: Vec<TokenAmount>,
    pub rewards: Vec<TokenAmount>,
    #[serde(rename = "cakePrice")]
    pub reward_price: Option<Decimal>,
    pub total_rewards_usd: String,
    pub annualized_apr: String,
    pub daily_projected_usd_earnings: String,
    pub annual_projected_usd_earnings: String,
    pub position_gain_loss_usd: Option<Decimal>,
    pub position_gain_loss_percent: Option<Decimal>,
    pub impermanent_loss_data: Option<IlReport>,
    pub events: Vec<EventReport>,
    pub valuation: PositionValuation,
}

impl PositionReport {
    #[must_use]
    pub fn new(ctx: &PositionContext<'_>) -> Self {
        let v = ctx.valuation;
        let (t0, t1) = (ctx.token0, ctx.token1);

        let (price_label, lower, upper, current, to_lower, to_upper, in_range_pct) = match &v.range {
            Some(r) => (
                r.label.clone(),
                price(r.lower),
                price(r.upper),
                price(r.current),
                percent_opt(r.percent_to_lower),
                percent_opt(r.percent_to_upper),
                r.position_percent.round_dp(2),
            ),
            None => (
                format!("{} per {}", t1.symbol, t0.symbol),
                NOT_AVAILABLE.to_string(),
                NOT_AVAILABLE.to_string(),
                price(v.pool_price),
                NOT_AVAILABLE.to_string(),
                NOT_AVAILABLE.to_string(),
                Decimal::ZERO,
            ),
        };

        let initial_state = match ctx.snapshot {
            Some(s) => {
                let opening = Price::new(s.opening_price).in_quote(ctx.quote).value;
                InitialState {
                    price: price(opening),
                    usd_value: usd_opt(s.opening_value_usd),
                    balances: balances(s.amount0, t0, s.amount1, t1),
                    date: date(s.mint_timestamp),
                }
            }
            None => InitialState {
                price: NOT_AVAILABLE.to_string(),
                usd_value: NOT_AVAILABLE.to_string(),
                balances: NOT_AVAILABLE.to_string(),
                date: NOT_AVAILABLE.to_string(),
            },
        };

        let unclaimed_fees = vec![
            TokenAmount {
                symbol: t0.symbol.clone(),
                amount: amount(v.uncollected_fees.amount0),
                price: v.usd_prices.token0,
            },
            TokenAmount {
                symbol: t1.symbol.clone(),
                amount: amount(v.uncollected_fees.amount1),
                price: v.usd_prices.token1,
            },
        ];
        let rewards = match v.pending_reward {
            Some(pending) if ctx.position.staked || !pending.is_zero() => vec![TokenAmount {
                symbol: ctx.reward.symbol.clone(),
                amount: amount(pending),
                price: v.usd_prices.reward,
            }],
            _ => Vec::new(),
        };

        let projection = v.projection.as_ref();
        Self {
            token_id: ctx.position.id.0,
            pair: format!("{}/{}", t0.symbol, t1.symbol),
            fee_tier: percent(Decimal::from(ctx.position.fee_tier) / Decimal::from(10_000)),
            staked: ctx.position.staked,
            status: v.status,
            price_label,
            price_range_lower: lower,
            price_range_upper: upper,
            current_price: current,
            perc_to_lower: to_lower,
            perc_to_upper: to_upper,
            price_range_percentage: in_range_pct,
            estimated_value_usd: usd_opt(v.current_value_usd),
            current_balances: balances(v.balances.amount0, t0, v.balances.amount1, t1),
            initial_state,
            unclaimed_fees,
            rewards,
            reward_price: v.usd_prices.reward,
            total_rewards_usd: usd_opt(v.rewards.map(|r| r.total())),
            annualized_apr: percent_opt(projection.and_then(|p| p.apr_percent)),
            daily_projected_usd_earnings: projection
                .map_or_else(|| NOT_AVAILABLE.to_string(), |p| grouped(p.daily_usd)),
            annual_projected_usd_earnings: projection
                .map_or_else(|| NOT_AVAILABLE.to_string(), |p| grouped(p.annual_usd)),
            position_gain_loss_usd: v.pnl.as_ref().map(|p| p.gain_loss_usd.round_dp(2)),
            position_gain_loss_percent: v
                .pnl
                .as_ref()
                .and_then(|p| p.gain_loss_percent)
                .map(|p| p.round_dp(2)),
            impermanent_loss_data: v.impermanent_loss.as_ref().map(IlReport::new),
            events: ctx.events.iter().map(EventReport::from).collect(),
            valuation: v.clone(),
        }
    }
}

fn balances(amount0: Decimal, token0: &Token, amount1: Decimal, token1: &Token) -> String {
    format!(
        "{} {} & {} {}",
        amount(amount0),
        token0.symbol,
        amount(amount1),
        token1.symbol
    )
}

/// Sums over the reported positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioTotals {
    pub value_usd: Decimal,
    pub daily_usd: Decimal,
    pub annual_usd: Decimal,
    /// Annual earnings over total value, in percent.
    pub annual_yield_percent: Option<Decimal>,
}

impl PortfolioTotals {
    #[must_use]
    pub fn from_positions(positions: &[PositionReport]) -> Self {
        let mut totals = Self::default();
        for p in positions {
            totals.value_usd += p.valuation.current_value_usd.unwrap_or_default();
            if let Some(projection) = &p.valuation.projection {
                totals.daily_usd += projection.daily_usd;
                totals.annual_usd += projection.annual_usd;
            }
        }
        if totals.value_usd > Decimal::ZERO {
            totals.annual_yield_percent =
                Some(totals.annual_usd / totals.value_usd * Decimal::ONE_HUNDRED);
        }
        totals
    }
}

/// A position left out of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedPosition {
    pub token_id: u64,
    pub reason: String,
}

/// Report of one wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioReport {
    pub wallet: String,
    pub head_block: u64,
    /// Unix time the report was built.
    pub generated_at: u64,
    pub total_portfolio_value: String,
    pub num_active_positions: usize,
    pub total_daily_projected_usd_earnings: String,
    pub total_annual_projected_usd_earnings: String,
    pub total_annual_yield: String,
    pub totals: PortfolioTotals,
    pub positions: Vec<PositionReport>,
    pub skipped: Vec<SkippedPosition>,
    /// Set instead of positions when the wallet has nothing to report.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PortfolioReport {
    #[must_use]
    pub fn new(
        wallet: impl Into<String>,
        head_block: u64,
        generated_at: u64,
        positions: Vec<PositionReport>,
        skipped: Vec<SkippedPosition>,
    ) -> Self {
        let totals = PortfolioTotals::from_positions(&positions);
        Self {
            wallet: wallet.into(),
            head_block,
            generated_at,
            total_portfolio_value: usd(totals.value_usd),
            num_active_positions: positions.len(),
            total_daily_projected_usd_earnings: grouped(totals.daily_usd),
            total_annual_projected_usd_earnings: grouped(totals.annual_usd),
            total_annual_yield: percent_opt(totals.annual_yield_percent),
            totals,
            positions,
            skipped,
            message: None,
        }
    }

    /// A report with no positions and an explanatory message.
    #[must_use]
    pub fn empty(
        wallet: impl Into<String>,
        head_block: u64,
        generated_at: u64,
        message: impl Into<String>,
    ) -> Self {
        let mut report = Self::new(wallet, head_block, generated_at, Vec::new(), Vec::new());
        report.message = Some(message.into());
        report
    }
}
