//! Display formatting for report values.

use chrono::DateTime;
use rust_decimal::{Decimal, RoundingStrategy};

/// Placeholder for values that could not be computed.
pub const NOT_AVAILABLE: &str = "N/A";

fn cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Two decimals with thousands separators, e.g. `-1,234.50`.
#[must_use]
pub fn grouped(value: Decimal) -> String {
    let rounded = cents(value);
    let text = format!("{:.2}", rounded.abs());
    let (int, frac) = text.split_once('.').unwrap_or((text.as_str(), "00"));
    let mut out = String::with_capacity(text.len() + int.len() / 3 + 1);
    if rounded.is_sign_negative() && !rounded.is_zero() {
        out.push('-');
    }
    let len = int.len();
    for (i, c) in int.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out.push('.');
    out.push_str(frac);
    out
}

/// Dollar amount, e.g. `$1,234.50` or `-$3.10`.
#[must_use]
pub fn usd(value: Decimal) -> String {
    let text = grouped(value);
    match text.strip_prefix('-') {
        Some(abs) => format!("-${abs}"),
        None => format!("${text}"),
    }
}

#[must_use]
pub fn usd_opt(value: Option<Decimal>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), usd)
}

/// Percentage with two decimals, e.g. `12.34%`.
#[must_use]
pub fn percent(value: Decimal) -> String {
    format!("{:.2}%", cents(value))
}

#[must_use]
pub fn percent_opt(value: Option<Decimal>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), percent)
}

/// Price with six significant digits.
#[must_use]
pub fn price(value: Decimal) -> String {
    value
        .round_sf(6)
        .unwrap_or(value)
        .normalize()
        .to_string()
}

/// Token amount with at most eight decimals.
#[must_use]
pub fn amount(value: Decimal) -> String {
    value.round_dp(8).normalize().to_string()
}

/// UTC date of a unix timestamp.
#[must_use]
pub fn date(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .map_or_else(
            || NOT_AVAILABLE.to_string(),
            |dt| dt.format("%Y-%m-%d %H:%M UTC").to_string(),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_grouped() {
        assert_eq!(grouped(dec!(1234567.891)), "1,234,567.89");
        assert_eq!(grouped(dec!(999.995)), "1,000.00");
        assert_eq!(grouped(dec!(-1234.5)), "-1,234.50");
        assert_eq!(grouped(dec!(-0.001)), "0.00");
        assert_eq!(grouped(Decimal::ZERO), "0.00");
    }

    #[test]
    fn test_usd() {
        assert_eq!(usd(dec!(1500)), "$1,500.00");
        assert_eq!(usd(dec!(-3.1)), "-$3.10");
        assert_eq!(usd_opt(None), "N/A");
    }

    #[test]
    fn test_percent_and_price() {
        assert_eq!(percent(dec!(12.345)), "12.35%");
        assert_eq!(percent(dec!(-0.5)), "-0.50%");
        assert_eq!(price(dec!(3012.123456)), "3012.12");
        assert_eq!(price(dec!(0.000123456789)), "0.000123457");
        assert_eq!(amount(dec!(1.500000000000)), "1.5");
    }

    #[test]
    fn test_date() {
        assert_eq!(date(1_700_000_000), "2023-11-14 22:13 UTC");
    }
}
