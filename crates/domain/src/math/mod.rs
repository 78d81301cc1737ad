pub mod concentrated_liquidity;
pub mod fee_growth;
pub mod fixed_point;
pub mod full_math;
pub mod price_tick;
pub mod sqrt_price_math;
pub mod tick_math;
