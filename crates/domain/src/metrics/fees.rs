//! Reward accrual, breakeven and yield projections.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const SECONDS_PER_HOUR: u64 = 3_600;
pub const SECONDS_PER_DAY: u64 = 86_400;
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// USD value of everything the position has earned since mint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardBreakdown {
    /// Swap fees already collected.
    pub claimed_fees_usd: Decimal,
    /// Swap fees accrued but not collected.
    pub unclaimed_fees_usd: Decimal,
    /// Farm rewards already received.
    pub claimed_reward_usd: Decimal,
    /// Farm rewards pending.
    pub pending_reward_usd: Decimal,
}

impl RewardBreakdown {
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.claimed_fees_usd
            + self.unclaimed_fees_usd
            + self.claimed_reward_usd
            + self.pending_reward_usd
    }
}

/// Time needed for accrued rewards to offset impermanent loss.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Breakeven {
    /// Rewards already cover the loss.
    Met,
    /// Total seconds since mint needed to cover the loss at the current reward rate.
    Pending { seconds: Decimal },
    /// No reward rate can be derived.
    InsufficientData,
}

/// Average USD earned per second since mint, `None` when no time has elapsed.
#[must_use]
pub fn reward_rate(total_rewards_usd: Decimal, elapsed_secs: u64) -> Option<Decimal> {
    if elapsed_secs == 0 {
        return None;
    }
    Some(total_rewards_usd / Decimal::from(elapsed_secs))
}

/// Breakeven time for an impermanent loss of `il_usd` (negative for a loss).
///
/// `breakeven = |il_usd| / rate`. Zero rewards or zero elapsed time give
/// [`Breakeven::InsufficientData`] rather than a division error.
#[must_use]
pub fn breakeven(il_usd: Decimal, total_rewards_usd: Decimal, elapsed_secs: u64) -> Breakeven {
    let Some(rate) = reward_rate(total_rewards_usd, elapsed_secs) else {
        return Breakeven::InsufficientData;
    };
    if rate <= Decimal::ZERO {
        return Breakeven::InsufficientData;
    }

    let loss = il_usd.abs();
    if loss <= total_rewards_usd {
        return Breakeven::Met;
    }
    // |il| / (rewards / elapsed), multiplied first to keep precision
    Breakeven::Pending {
        seconds: loss * Decimal::from(elapsed_secs) / total_rewards_usd,
    }
}

/// Share of the breakeven time already elapsed, capped at 100.
#[must_use]
pub fn breakeven_progress(breakeven: &Breakeven, elapsed_secs: u64) -> Option<Decimal> {
    match breakeven {
        Breakeven::Pending { seconds } if !seconds.is_zero() => {
            let progress = Decimal::from(elapsed_secs) / *seconds * Decimal::ONE_HUNDRED;
            Some(progress.min(Decimal::ONE_HUNDRED))
        }
        _ => None,
    }
}

/// Earnings projected from the average reward rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YieldProjection {
    pub rate_per_second: Decimal,
    pub daily_usd: Decimal,
    pub annual_usd: Decimal,
    /// Annual earnings over the current value, in percent.
    pub apr_percent: Option<Decimal>,
}

/// Projects daily and annual earnings and APR.
///
/// # Arguments
///
/// * `total_rewards_usd` - Everything earned since mint
/// * `elapsed_secs` - Seconds since mint
/// * `principal_usd` - Current position value used as the APR base
#[must_use]
pub fn project_yield(
    total_rewards_usd: Decimal,
    elapsed_secs: u64,
    principal_usd: Decimal,
) -> Option<YieldProjection> {
    let rate = reward_rate(total_rewards_usd, elapsed_secs)?;
    let elapsed = Decimal::from(elapsed_secs);
    let daily_usd = total_rewards_usd * Decimal::from(SECONDS_PER_DAY) / elapsed;
    let annual_usd = total_rewards_usd * Decimal::from(SECONDS_PER_YEAR) / elapsed;
    let apr_percent = if principal_usd > Decimal::ZERO {
        Some(annual_usd / principal_usd * Decimal::ONE_HUNDRED)
    } else {
        None
    };
    Some(YieldProjection {
        rate_per_second: rate,
        daily_usd,
        annual_usd,
        apr_percent,
    })
}

/// Formats a duration as days and hours, or hours and minutes below a day.
#[must_use]
pub fn format_duration(secs: u64) -> String {
    let days = secs / SECONDS_PER_DAY;
    let hours = (secs % SECONDS_PER_DAY) / SECONDS_PER_HOUR;
    let minutes = (secs % SECONDS_PER_HOUR) / 60;
    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_breakeven_insufficient_data() {
        assert_eq!(breakeven(dec!(-10), Decimal::ZERO, 1_000), Breakeven::InsufficientData);
        assert_eq!(breakeven(dec!(-10), dec!(5), 0), Breakeven::InsufficientData);
    }

    #[test]
    fn test_breakeven_pending_and_progress() {
        // 50 USD over 1000s -> 0.05/s, 100 USD loss -> 2000s
        let b = breakeven(dec!(-100), dec!(50), 1_000);
        assert_eq!(b, Breakeven::Pending { seconds: dec!(2000) });
        assert_eq!(breakeven_progress(&b, 1_000), Some(dec!(50)));
    }

    #[test]
    fn test_breakeven_met() {
        let b = breakeven(dec!(-40), dec!(50), 1_000);
        assert_eq!(b, Breakeven::Met);
        assert_eq!(breakeven_progress(&b, 1_000), None);
    }

    #[test]
    fn test_project_yield() {
        // 10 USD per day on 1000 USD
        let p = project_yield(dec!(10), SECONDS_PER_DAY, dec!(1000)).unwrap();
        assert_eq!(p.daily_usd, dec!(10));
        assert_eq!(p.annual_usd, dec!(3650));
        assert_eq!(p.apr_percent, Some(dec!(365)));
        assert!(project_yield(dec!(10), 0, dec!(1000)).is_none());
        assert!(project_yield(dec!(10), 10, Decimal::ZERO).unwrap().apr_percent.is_none());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(3 * SECONDS_PER_DAY + 5 * SECONDS_PER_HOUR), "3d 5h");
        assert_eq!(format_duration(2 * SECONDS_PER_HOUR + 120), "2h 2m");
        assert_eq!(format_duration(59), "0m");
    }

    #[test]
    fn test_reward_total() {
        let r = RewardBreakdown {
            claimed_fees_usd: dec!(1),
            unclaimed_fees_usd: dec!(2),
            claimed_reward_usd: dec!(3),
            pending_reward_usd: dec!(4),
        };
        assert_eq!(r.total(), dec!(10));
    }
}
