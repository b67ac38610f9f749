// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mandi Stress Simulation Suite - Elasticity Pricing

//! The shared price-response law.
//!
//! ```text
//! price_new = price_old * (demand / supply) ^ ELASTICITY
//! ```
//!
//! Both the shock simulation and the live market state price through
//! [`elasticity_price`]; neither carries its own copy of the formula.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

/// Price elasticity exponent.
pub const ELASTICITY: f64 = 0.4;

/// Multiplier applied when supply has collapsed to zero (or below).
pub const ZERO_SUPPLY_MULTIPLIER: f64 = 2.0;

/// New price for an old price under the given supply and demand, rounded to 2dp.
pub fn elasticity_price(old_price: f64, supply: f64, demand: f64) -> f64 {
    if supply <= 0.0 {
        return round2(old_price * ZERO_SUPPLY_MULTIPLIER);
    }
    let ratio = demand / supply;
    round2(old_price * ratio.powf(ELASTICITY))
}

/// Percentage change from `old` to `new`; zero when `old` is not positive.
pub fn pct_change(new: f64, old: f64) -> f64 {
    if old > 0.0 {
        (new - old) / old * 100.0
    } else {
        0.0
    }
}

/// Round to 2 decimal places, half away from zero.
pub fn round2(v: f64) -> f64 {
    round_dp(v, 2)
}

pub fn round_dp(v: f64, dp: u32) -> f64 {
    match Decimal::from_f64(v) {
        Some(d) => d
            .round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
            .to_f64()
            .unwrap_or(v),
        None => v,
    }
}

/// Convert f64 to Decimal (lossy but sufficient for money figures).
pub fn to_decimal(v: f64) -> Decimal {
    Decimal::from_f64(v).unwrap_or(Decimal::ZERO)
}

/// Convert Decimal to f64.
pub fn from_decimal(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}
