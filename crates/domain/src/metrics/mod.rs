use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub mod fees;
pub mod impermanent_loss;

pub use fees::{Breakeven, RewardBreakdown, YieldProjection};
pub use impermanent_loss::{IlInputs, IlPoint, LiquidityEstimate};

/// Impermanent loss at one price, valued in USD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpermanentLoss {
    /// Price in display orientation (quote per base).
    pub price: Decimal,
    pub il_usd: Decimal,
    pub il_percent: Decimal,
}

/// Impermanent loss at a range bound together with its breakeven estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundAnalysis {
    pub loss: ImpermanentLoss,
    pub breakeven: Breakeven,
    /// Share of the breakeven time already elapsed, capped at 100.
    pub breakeven_progress: Option<Decimal>,
    /// Total rewards plus IL at this bound.
    pub fees_vs_il_net: Decimal,
}

/// Gain or loss of the position's current value against its opening value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PnL {
    pub gain_loss_usd: Decimal,
    pub gain_loss_percent: Option<Decimal>,
}
