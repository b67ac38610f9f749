// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mandi Stress Simulation Suite - Market Stress Index

use serde::{Deserialize, Serialize};

use crate::pricing::{pct_change, round2};
use crate::types::{Commodity, Market, PricePoint};

const PRICE_HIGH_PCT: f64 = 8.0;
const PRICE_WATCH_PCT: f64 = 4.0;
const SUPPLY_HIGH_PCT: f64 = -10.0;
const SUPPLY_WATCH_PCT: f64 = -5.0;
const VOLATILITY_LIMIT: f64 = 10.0;

const PRICE_HIGH_STRESS: u32 = 35;
const PRICE_WATCH_STRESS: u32 = 20;
const SUPPLY_HIGH_STRESS: u32 = 30;
const SUPPLY_WATCH_STRESS: u32 = 15;
const INSTABILITY_STRESS: u32 = 20;
const EXTERNAL_FLAG_STRESS: u32 = 10;

pub const HIGH_RISK_ABOVE: u32 = 65;
pub const WATCH_ABOVE: u32 = 35;

// ─── Stress Status ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressStatus {
    Normal,
    Watch,
    HighRisk,
}

impl StressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Watch => "watch",
            Self::HighRisk => "high_risk",
        }
    }
}

/// Classify a stress score. Boundaries are exclusive: 65 is `Watch`, 35 is `Normal`.
pub fn classify(score: u32) -> StressStatus {
    if score > HIGH_RISK_ABOVE {
        StressStatus::HighRisk
    } else if score > WATCH_ABOVE {
        StressStatus::Watch
    } else {
        StressStatus::Normal
    }
}

// ─── Stress Result ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StressBreakdown {
    pub price_stress: u32,
    pub supply_stress: u32,
    pub instability_stress: u32,
    pub external_stress: u32,
}

impl StressBreakdown {
    pub fn total(&self) -> u32 {
        self.price_stress + self.supply_stress + self.instability_stress + self.external_stress
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StressResult {
    pub stress_score: u32,
    pub status: StressStatus,
    pub volatility: f64,
    pub price_change_pct: f64,
    pub arrival_change_pct: f64,
    pub breakdown: StressBreakdown,
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Everything the stress formula looks at, detached from where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct StressInputs {
    pub current_price: f64,
    pub previous_price: f64,
    pub arrivals: f64,
    pub previous_arrivals: f64,
    pub volatility: f64,
    pub rain_flag: bool,
    pub festival_flag: bool,
}

impl StressInputs {
    pub fn from_market(market: &Market) -> Self {
        Self {
            current_price: market.current_price,
            previous_price: market.previous_price,
            arrivals: market.arrivals as f64,
            previous_arrivals: market.previous_arrivals as f64,
            volatility: price_volatility(&market.price_history),
            rain_flag: market.rain_flag,
            festival_flag: market.festival_flag,
        }
    }

    /// View of one commodity. The primary commodity shares the market price
    /// history; others fall back to their recorded volatility figure.
    pub fn for_commodity(market: &Market, commodity: &Commodity) -> Self {
        let volatility = if commodity.is_primary {
            price_volatility(&market.price_history)
        } else {
            commodity.volatility
        };
        Self {
            current_price: commodity.current_price,
            previous_price: commodity.previous_price,
            arrivals: commodity.arrivals as f64,
            previous_arrivals: commodity.previous_arrivals as f64,
            volatility,
            rain_flag: market.rain_flag,
            festival_flag: market.festival_flag,
        }
    }
}

/// Population standard deviation of the price series; 0 below two points.
pub fn price_volatility(history: &[PricePoint]) -> f64 {
    if history.len() < 2 {
        return 0.0;
    }
    let n = history.len() as f64;
    let mean = history.iter().map(|p| p.price).sum::<f64>() / n;
    let variance = history.iter().map(|p| (p.price - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

// ─── Engine ──────────────────────────────────────────────────────────────────

pub fn compute_stress(inputs: &StressInputs) -> StressResult {
    let price_change_pct = pct_change(inputs.current_price, inputs.previous_price);
    let arrival_change_pct = pct_change(inputs.arrivals, inputs.previous_arrivals);

    let price_stress = if price_change_pct > PRICE_HIGH_PCT {
        PRICE_HIGH_STRESS
    } else if price_change_pct > PRICE_WATCH_PCT {
        PRICE_WATCH_STRESS
    } else {
        0
    };

    let supply_stress = if arrival_change_pct < SUPPLY_HIGH_PCT {
        SUPPLY_HIGH_STRESS
    } else if arrival_change_pct < SUPPLY_WATCH_PCT {
        SUPPLY_WATCH_STRESS
    } else {
        0
    };

    let instability_stress = if inputs.volatility > VOLATILITY_LIMIT {
        INSTABILITY_STRESS
    } else {
        0
    };

    let mut external_stress = 0;
    if inputs.rain_flag {
        external_stress += EXTERNAL_FLAG_STRESS;
    }
    if inputs.festival_flag {
        external_stress += EXTERNAL_FLAG_STRESS;
    }

    let breakdown = StressBreakdown {
        price_stress,
        supply_stress,
        instability_stress,
        external_stress,
    };
    let stress_score = breakdown.total().min(100);

    StressResult {
        stress_score,
        status: classify(stress_score),
        volatility: round2(inputs.volatility),
        price_change_pct: round2(price_change_pct),
        arrival_change_pct: round2(arrival_change_pct),
        breakdown,
    }
}

/// Stress of a market snapshot. Pure; never mutates the market.
pub fn stress(market: &Market) -> StressResult {
    compute_stress(&StressInputs::from_market(market))
}

pub fn commodity_stress(market: &Market, commodity: &Commodity) -> StressResult {
    compute_stress(&StressInputs::for_commodity(market, commodity))
}

// ─── Overview ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketStressSummary {
    pub id: String,
    pub name: String,
    pub location: String,
    pub commodity: String,
    pub current_price: f64,
    pub previous_price: f64,
    pub arrivals: u64,
    pub previous_arrivals: u64,
    pub rain_flag: bool,
    pub festival_flag: bool,
    #[serde(flatten)]
    pub stress: StressResult,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StressOverview {
    pub mandis: Vec<MarketStressSummary>,
    pub total_mandis: usize,
    pub high_risk_count: usize,
    pub watch_count: usize,
    pub normal_count: usize,
}

pub fn stress_overview(markets: &[Market]) -> StressOverview {
    let mandis: Vec<MarketStressSummary> = markets
        .iter()
        .map(|m| MarketStressSummary {
            id: m.id.clone(),
            name: m.name.clone(),
            location: m.location.clone(),
            commodity: m.commodity.clone(),
            current_price: m.current_price,
            previous_price: m.previous_price,
            arrivals: m.arrivals,
            previous_arrivals: m.previous_arrivals,
            rain_flag: m.rain_flag,
            festival_flag: m.festival_flag,
            stress: stress(m),
        })
        .collect();

    let count = |s: StressStatus| mandis.iter().filter(|m| m.stress.status == s).count();
    StressOverview {
        total_mandis: mandis.len(),
        high_risk_count: count(StressStatus::HighRisk),
        watch_count: count(StressStatus::Watch),
        normal_count: count(StressStatus::Normal),
        mandis,
    }
}
