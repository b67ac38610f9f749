// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mandi Stress Simulation Suite - Surplus/Deficit Balance & Transfer Matching

use serde::{Deserialize, Serialize};

use crate::graph::MarketGraph;
use crate::pricing::round2;
use crate::recommend::{transfer_cost, Priority};
use crate::types::{Commodity, Market};

const BALANCED_BAND_PCT: f64 = 10.0;
const URGENT_PCT: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceStatus {
    Surplus,
    Deficit,
    Balanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StabilizationSignal {
    PullStockUrgent,
    PushStockRecommended,
    MonitorStability,
    StandardOperations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    NetSurplus,
    NetDeficit,
    Balanced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommodityBalance {
    pub commodity: String,
    pub supply: u64,
    pub demand: u64,
    pub balance: i64,
    pub balance_pct: f64,
    pub status: BalanceStatus,
    pub signal: StabilizationSignal,
    pub current_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketBalance {
    pub mandi_id: String,
    pub mandi_name: String,
    pub commodities: Vec<CommodityBalance>,
    pub total_supply: u64,
    pub total_demand: u64,
    pub total_balance: i64,
    pub overall_status: OverallStatus,
}

/// Supply minus demand, clamped to the `i64` range the payload carries.
fn net_balance(supply: u64, demand: u64) -> i64 {
    let net = i128::from(supply) - i128::from(demand);
    i64::try_from(net).unwrap_or(if net < 0 { i64::MIN } else { i64::MAX })
}

fn balance_pct(balance: i64, demand: u64) -> f64 {
    if demand == 0 {
        0.0
    } else {
        balance as f64 / demand as f64 * 100.0
    }
}

fn classify(pct: f64) -> BalanceStatus {
    if pct > BALANCED_BAND_PCT {
        BalanceStatus::Surplus
    } else if pct < -BALANCED_BAND_PCT {
        BalanceStatus::Deficit
    } else {
        BalanceStatus::Balanced
    }
}

fn signal(status: BalanceStatus, pct: f64) -> StabilizationSignal {
    match status {
        BalanceStatus::Deficit if pct < -URGENT_PCT => StabilizationSignal::PullStockUrgent,
        BalanceStatus::Surplus if pct > URGENT_PCT => StabilizationSignal::PushStockRecommended,
        BalanceStatus::Balanced => StabilizationSignal::StandardOperations,
        _ => StabilizationSignal::MonitorStability,
    }
}

/// Supply is the commodity's current arrivals.
pub fn commodity_balance(c: &Commodity) -> CommodityBalance {
    let balance = net_balance(c.arrivals, c.base_demand);
    let pct = balance_pct(balance, c.base_demand);
    let status = classify(pct);
    CommodityBalance {
        commodity: c.name.clone(),
        supply: c.arrivals,
        demand: c.base_demand,
        balance,
        balance_pct: round2(pct),
        status,
        signal: signal(status, pct),
        current_price: c.current_price,
    }
}

pub fn market_balance(market: &Market) -> MarketBalance {
    let commodities: Vec<CommodityBalance> =
        market.commodities.iter().map(commodity_balance).collect();
    let total_supply = commodities.iter().fold(0u64, |acc, c| acc.saturating_add(c.supply));
    let total_demand = commodities.iter().fold(0u64, |acc, c| acc.saturating_add(c.demand));
    let total_balance = net_balance(total_supply, total_demand);
    let overall_status = match classify(balance_pct(total_balance, total_demand)) {
        BalanceStatus::Surplus => OverallStatus::NetSurplus,
        BalanceStatus::Deficit => OverallStatus::NetDeficit,
        BalanceStatus::Balanced => OverallStatus::Balanced,
    };
    MarketBalance {
        mandi_id: market.id.clone(),
        mandi_name: market.name.clone(),
        commodities,
        total_supply,
        total_demand,
        total_balance,
        overall_status,
    }
}

// ─── Matching ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSuggestion {
    pub commodity: String,
    pub source_mandi: String,
    pub source_name: String,
    pub destination_mandi: String,
    pub destination_name: String,
    pub quantity: u64,
    pub cost_per_qt: f64,
    pub transport_cost: f64,
    /// Destination price minus source price.
    pub arbitrage: f64,
    pub priority: Priority,
}

struct Side<'a> {
    market: &'a Market,
    balance: CommodityBalance,
    remaining: u64,
}

/// Greedy surplus-to-deficit pairing, one commodity at a time.
///
/// Deficits are served most severe first, each drawing from whichever surplus
/// has the most stock left. Commodities are visited in first-seen order.
pub fn match_transfers(graph: &MarketGraph, default_cost_per_qt: f64) -> Vec<TransferSuggestion> {
    let mut names: Vec<String> = Vec::new();
    for m in graph.markets() {
        for c in &m.commodities {
            if !names.iter().any(|n| c.matches(n)) {
                names.push(c.name.clone());
            }
        }
    }

    let mut out = Vec::new();
    for name in &names {
        let mut surpluses: Vec<Side> = Vec::new();
        let mut deficits: Vec<Side> = Vec::new();
        for m in graph.markets() {
            let Some(c) = m.commodity(name) else { continue };
            let balance = commodity_balance(c);
            match balance.status {
                BalanceStatus::Surplus => surpluses.push(Side {
                    market: m,
                    remaining: balance.balance.unsigned_abs(),
                    balance,
                }),
                BalanceStatus::Deficit => deficits.push(Side {
                    market: m,
                    remaining: balance.balance.unsigned_abs(),
                    balance,
                }),
                BalanceStatus::Balanced => {}
            }
        }
        deficits.sort_by(|a, b| a.balance.balance_pct.total_cmp(&b.balance.balance_pct));

        for d in &mut deficits {
            while d.remaining > 0 {
                let mut best: Option<usize> = None;
                for (i, s) in surpluses.iter().enumerate() {
                    if s.remaining > 0 && best.map_or(true, |b| s.remaining > surpluses[b].remaining) {
                        best = Some(i);
                    }
                }
                let Some(si) = best else { break };
                let s = &mut surpluses[si];
                let quantity = s.remaining.min(d.remaining);
                s.remaining -= quantity;
                d.remaining -= quantity;

                let cost_per_qt = graph
                    .edge(&s.market.id, &d.market.id)
                    .map(|c| c.cost_per_qt)
                    .unwrap_or(default_cost_per_qt);
                out.push(TransferSuggestion {
                    commodity: name.clone(),
                    source_mandi: s.market.id.clone(),
                    source_name: s.market.name.clone(),
                    destination_mandi: d.market.id.clone(),
                    destination_name: d.market.name.clone(),
                    quantity,
                    cost_per_qt,
                    transport_cost: transfer_cost(cost_per_qt, quantity),
                    arbitrage: round2(d.balance.current_price - s.balance.current_price),
                    priority: if d.balance.signal == StabilizationSignal::PullStockUrgent {
                        Priority::High
                    } else {
                        Priority::Medium
                    },
                });
            }
        }
    }
    out
}
