// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mandi Stress Simulation Suite - Type Definitions

use serde::{Deserialize, Serialize};

// ─── History Points ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrivalsPoint {
    pub date: String,
    pub arrivals: u64,
}

// ─── Commodity ───────────────────────────────────────────────────────────────

/// Raw commodity record as it appears in market data files.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommodityRecord {
    pub name: String,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub current_price: f64,
    pub previous_price: Option<f64>,
    #[serde(default)]
    pub arrivals: u64,
    pub previous_arrivals: Option<u64>,
    pub base_demand: Option<u64>,
    pub base_supply: Option<u64>,
    #[serde(default)]
    pub volatility: f64,
}

/// One commodity traded at a market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "CommodityRecord")]
pub struct Commodity {
    pub name: String,
    pub is_primary: bool,
    pub current_price: f64,
    pub previous_price: f64,
    pub arrivals: u64,
    pub previous_arrivals: u64,
    pub base_demand: u64,
    pub base_supply: u64,
    pub volatility: f64,
}

impl From<CommodityRecord> for Commodity {
    fn from(r: CommodityRecord) -> Self {
        Self {
            previous_price: r.previous_price.unwrap_or(r.current_price),
            previous_arrivals: r.previous_arrivals.unwrap_or(r.arrivals),
            base_demand: r.base_demand.unwrap_or(r.arrivals),
            base_supply: r.base_supply.unwrap_or(r.arrivals),
            name: r.name,
            is_primary: r.is_primary,
            current_price: r.current_price,
            arrivals: r.arrivals,
            volatility: r.volatility,
        }
    }
}

impl Commodity {
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

// ─── Market ──────────────────────────────────────────────────────────────────

/// Raw market record. Every optional field is resolved exactly once, in
/// `From<MarketRecord> for Market`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: String,
    pub commodity: Option<String>,
    pub current_price: Option<f64>,
    pub previous_price: Option<f64>,
    pub arrivals: Option<u64>,
    pub previous_arrivals: Option<u64>,
    pub base_demand: Option<u64>,
    pub base_supply: Option<u64>,
    pub volatility: Option<f64>,
    #[serde(default)]
    pub rain_flag: bool,
    #[serde(default)]
    pub festival_flag: bool,
    #[serde(default)]
    pub price_history: Vec<PricePoint>,
    #[serde(default)]
    pub arrivals_history: Vec<ArrivalsPoint>,
    #[serde(default)]
    pub connected_mandis: Vec<String>,
    #[serde(default)]
    pub commodities: Vec<Commodity>,
}

/// A wholesale market (mandi): one node of the market graph.
///
/// The market-level price/arrivals fields mirror the primary commodity and
/// are only ever changed together with it (see [`Market::record_commodity_update`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "MarketRecord")]
pub struct Market {
    pub id: String,
    pub name: String,
    pub location: String,
    pub commodity: String,
    pub current_price: f64,
    pub previous_price: f64,
    pub arrivals: u64,
    pub previous_arrivals: u64,
    pub base_demand: u64,
    pub base_supply: u64,
    pub volatility: f64,
    pub rain_flag: bool,
    pub festival_flag: bool,
    pub price_history: Vec<PricePoint>,
    pub arrivals_history: Vec<ArrivalsPoint>,
    pub connected_mandis: Vec<String>,
    pub commodities: Vec<Commodity>,
}

impl From<MarketRecord> for Market {
    fn from(r: MarketRecord) -> Self {
        let listed_primary = r.commodities.iter().find(|c| c.is_primary).cloned();

        let arrivals = r
            .arrivals
            .or(listed_primary.as_ref().map(|c| c.arrivals))
            .unwrap_or(0);
        let current_price = r
            .current_price
            .or(listed_primary.as_ref().map(|c| c.current_price))
            .unwrap_or(0.0);
        let previous_price = r
            .previous_price
            .or(listed_primary.as_ref().map(|c| c.previous_price))
            .unwrap_or(current_price);
        let previous_arrivals = r.previous_arrivals.unwrap_or(arrivals);
        let base_demand = r.base_demand.unwrap_or(arrivals);
        let base_supply = r.base_supply.unwrap_or(arrivals);
        let volatility = r.volatility.unwrap_or(0.0);
        let commodity = r
            .commodity
            .or(listed_primary.as_ref().map(|c| c.name.clone()))
            .unwrap_or_else(|| "Unknown".to_string());

        let synthesized = Commodity {
            name: commodity.clone(),
            is_primary: true,
            current_price,
            previous_price,
            arrivals,
            previous_arrivals,
            base_demand,
            base_supply,
            volatility,
        };

        let mut commodities = r.commodities;
        if commodities.is_empty() {
            commodities.push(synthesized);
        } else if listed_primary.is_some() {
            // Only the first flagged entry stays primary.
            let mut seen = false;
            for c in &mut commodities {
                if c.is_primary {
                    c.is_primary = !seen;
                    seen = true;
                }
            }
        } else if let Some(c) = commodities.iter_mut().find(|c| c.matches(&commodity)) {
            c.is_primary = true;
        } else {
            commodities.push(synthesized);
        }

        Self {
            id: r.id,
            name: r.name,
            location: r.location,
            commodity,
            current_price,
            previous_price,
            arrivals,
            previous_arrivals,
            base_demand,
            base_supply,
            volatility,
            rain_flag: r.rain_flag,
            festival_flag: r.festival_flag,
            price_history: r.price_history,
            arrivals_history: r.arrivals_history,
            connected_mandis: r.connected_mandis,
            commodities,
        }
    }
}

/// Before/after values for one commodity mutation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommodityUpdate {
    pub previous_price: f64,
    pub new_price: f64,
    pub previous_arrivals: u64,
    pub new_arrivals: u64,
}

impl Market {
    pub fn primary_commodity(&self) -> Option<&Commodity> {
        self.commodities.iter().find(|c| c.is_primary)
    }

    pub fn commodity(&self, name: &str) -> Option<&Commodity> {
        self.commodities.iter().find(|c| c.matches(name))
    }

    pub fn commodity_index(&self, name: &str) -> Option<usize> {
        self.commodities.iter().position(|c| c.matches(name))
    }

    /// Apply an update to the commodity at `idx`, mirroring it onto the
    /// market-level fields when that commodity is the primary one.
    ///
    /// Supply is tracked as arrivals, so `base_supply` follows `new_arrivals`.
    pub fn record_commodity_update(&mut self, idx: usize, update: CommodityUpdate) {
        let Some(c) = self.commodities.get_mut(idx) else {
            return;
        };
        c.previous_price = update.previous_price;
        c.current_price = update.new_price;
        c.previous_arrivals = update.previous_arrivals;
        c.arrivals = update.new_arrivals;
        c.base_supply = update.new_arrivals;

        if c.is_primary {
            self.previous_price = update.previous_price;
            self.current_price = update.new_price;
            self.previous_arrivals = update.previous_arrivals;
            self.arrivals = update.new_arrivals;
            self.base_supply = update.new_arrivals;
        }
    }

    /// Append one point to each history sequence. Existing points are never touched.
    pub fn append_history(&mut self, date: &str, price: f64, arrivals: u64) {
        self.price_history.push(PricePoint { date: date.to_string(), price });
        self.arrivals_history.push(ArrivalsPoint { date: date.to_string(), arrivals });
    }
}

// ─── Connection ──────────────────────────────────────────────────────────────

pub fn default_edge_strength() -> f64 {
    0.5
}

pub fn default_cost_per_qt() -> f64 {
    50.0
}

pub fn default_travel_time() -> f64 {
    4.0
}

/// Weighted, undirected edge between two markets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub from: String,
    pub to: String,
    #[serde(default = "default_edge_strength")]
    pub edge_strength: f64,
    #[serde(default = "default_cost_per_qt")]
    pub cost_per_qt: f64,
    #[serde(default = "default_travel_time")]
    pub travel_time: f64,
}

impl Connection {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            edge_strength: default_edge_strength(),
            cost_per_qt: default_cost_per_qt(),
            travel_time: default_travel_time(),
        }
    }

    pub fn joins(&self, a: &str, b: &str) -> bool {
        (self.from == a && self.to == b) || (self.from == b && self.to == a)
    }

    /// The other endpoint, if `id` is one of the endpoints.
    pub fn other_end(&self, id: &str) -> Option<&str> {
        if self.from == id {
            Some(&self.to)
        } else if self.to == id {
            Some(&self.from)
        } else {
            None
        }
    }
}
