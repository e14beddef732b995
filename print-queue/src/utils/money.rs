//! Money helpers
//!
//! Amounts are stored as `f64` (two decimals) and computed with `Decimal`.

use rust_decimal::prelude::*;

const DECIMAL_PLACES: u32 = 2;

#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// Convert back to `f64` for storage, rounded to 2 decimal places
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    round(value).to_f64().unwrap_or_default()
}

#[inline]
pub fn round(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// `€4.50`
pub fn format_eur(value: f64) -> String {
    format_eur_decimal(to_decimal(value))
}

pub fn format_eur_decimal(value: Decimal) -> String {
    let mut rounded = round(value);
    rounded.rescale(DECIMAL_PLACES);
    format!("€{}", rounded)
}
