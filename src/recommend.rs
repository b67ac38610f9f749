// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mandi Stress Simulation Suite - Intervention Recommendations

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::MandiResult;
use crate::explain::{explain_with_timeout, ExplainRequest, Explainer};
use crate::graph::MarketGraph;
use crate::pricing::{pct_change, round2, to_decimal};
use crate::stress::{stress, StressResult, StressStatus};
use crate::types::Market;

const CRITICAL_ABOVE: u32 = 65;
const CALM_BELOW: u32 = 35;
const SURPLUS_NEIGHBOR_BELOW: u32 = 35;
const STRESSED_NEIGHBOR_ABOVE: u32 = 50;
const PRICE_SLUMP_PCT: f64 = -4.0;
const SPECULATION_PCT: f64 = 6.0;

/// Share of a neighbour's arrivals it can spare for a pull transfer.
const NEIGHBOR_SPARE_DIVISOR: u64 = 5;
const PUSH_SHARE: Decimal = dec!(0.10);
const COLD_STORAGE_SHARE: Decimal = dec!(0.20);
const FESTIVAL_BUFFER_SHARE: Decimal = dec!(0.15);
/// Monthly cold-storage rent per quintal.
const COLD_STORAGE_COST_PER_QT: Decimal = dec!(25);

pub const NO_INSIGHT: &str = "No insight available";

// ─── Types ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn wants_explanation(&self) -> bool {
        matches!(self, Self::High | Self::Medium)
    }
}

/// Figures a recommendation was derived from; handed to the explainer as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationMetrics {
    pub stress_score: u32,
    pub status: StressStatus,
    pub price_change_pct: f64,
    pub arrival_change_pct: f64,
    pub volatility: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterpart_stress: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_per_qt: Option<f64>,
}

impl RecommendationMetrics {
    fn from_stress(s: &StressResult) -> Self {
        Self {
            stress_score: s.stress_score,
            status: s.status,
            price_change_pct: s.price_change_pct,
            arrival_change_pct: s.arrival_change_pct,
            volatility: s.volatility,
            quantity: None,
            counterpart_stress: None,
            cost_per_qt: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: String,
    pub action: String,
    pub priority: Priority,
    pub source_mandi: Option<String>,
    pub destination_mandi: Option<String>,
    pub reasoning: String,
    pub estimated_cost: String,
    pub stability_gain: String,
    pub metrics: RecommendationMetrics,
    pub ai_insight: Option<String>,
}

impl Recommendation {
    pub fn insight_text(&self) -> &str {
        self.ai_insight.as_deref().unwrap_or(NO_INSIGHT)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationSet {
    pub mandi_id: String,
    pub mandi_name: String,
    pub commodity: String,
    pub current_stress_score: u32,
    pub status: StressStatus,
    pub recommendations: Vec<Recommendation>,
}

// ─── Rules ───────────────────────────────────────────────────────────────────

struct Builder<'a> {
    target: &'a Market,
    metrics: RecommendationMetrics,
    out: Vec<Recommendation>,
}

struct Draft {
    action: &'static str,
    priority: Priority,
    source: Option<String>,
    destination: Option<String>,
    reasoning: String,
    estimated_cost: String,
    stability_gain: &'static str,
    quantity: Option<u64>,
    counterpart_stress: Option<u32>,
    cost_per_qt: Option<f64>,
}

impl Draft {
    fn new(action: &'static str, priority: Priority, reasoning: String) -> Self {
        Self {
            action,
            priority,
            source: None,
            destination: None,
            reasoning,
            estimated_cost: "₹0".to_string(),
            stability_gain: "",
            quantity: None,
            counterpart_stress: None,
            cost_per_qt: None,
        }
    }
}

impl<'a> Builder<'a> {
    fn push(&mut self, d: Draft) {
        let id = format!("{}-rec-{}", self.target.id, self.out.len() + 1);
        let metrics = RecommendationMetrics {
            quantity: d.quantity,
            counterpart_stress: d.counterpart_stress,
            cost_per_qt: d.cost_per_qt,
            ..self.metrics.clone()
        };
        self.out.push(Recommendation {
            id,
            action: d.action.to_string(),
            priority: d.priority,
            source_mandi: d.source,
            destination_mandi: d.destination,
            reasoning: d.reasoning,
            estimated_cost: d.estimated_cost,
            stability_gain: d.stability_gain.to_string(),
            metrics,
            ai_insight: None,
        });
    }
}

/// Rule-based interventions for one market, in rule order.
///
/// The final entry is always the low-priority monitoring recommendation.
pub fn recommend(
    graph: &MarketGraph,
    market_id: &str,
    default_cost_per_qt: f64,
) -> MandiResult<RecommendationSet> {
    let target = graph.require(market_id)?;
    let s = stress(target);
    let neighbors: Vec<(&Market, StressResult)> =
        graph.neighbors(market_id).into_iter().map(|m| (m, stress(m))).collect();
    let cost_per_qt = |other: &Market| {
        graph
            .edge(&target.id, &other.id)
            .map(|c| c.cost_per_qt)
            .unwrap_or(default_cost_per_qt)
    };

    let mut b = Builder { target, metrics: RecommendationMetrics::from_stress(&s), out: Vec::new() };
    let breakdown = s.breakdown;
    // Thresholds compare unrounded changes; `s` carries the 2dp display values.
    let price_change = pct_change(target.current_price, target.previous_price);

    // 1. Critical stress with a supply component.
    if s.stress_score > CRITICAL_ABOVE && breakdown.supply_stress > 0 {
        let surplus = first_max_by(
            neighbors.iter().filter(|(m, ns)| {
                ns.stress_score < SURPLUS_NEIGHBOR_BELOW && arrival_change(m) >= 0.0
            }),
            |(m, _)| m.arrivals,
        );
        match surplus {
            Some(&(n, ref ns)) => {
                let shortfall = target.previous_arrivals.max(target.base_demand).saturating_sub(target.arrivals);
                let quantity = shortfall.min(n.arrivals / NEIGHBOR_SPARE_DIVISOR);
                let per_qt = cost_per_qt(n);
                let cost = to_decimal(per_qt) * Decimal::from(quantity);
                b.push(Draft {
                    source: Some(n.id.clone()),
                    destination: Some(target.id.clone()),
                    estimated_cost: format_inr(cost),
                    stability_gain: "+20% stability",
                    quantity: Some(quantity),
                    counterpart_stress: Some(ns.stress_score),
                    cost_per_qt: Some(per_qt),
                    ..Draft::new(
                        "Pull Stock from Surplus Mandi",
                        Priority::High,
                        format!(
                            "{} is at stress {} with arrivals down {:.1}%. {} is calm (stress {}) \
                             with {} qtl on hand; moving {} qtl covers the shortfall.",
                            target.name,
                            s.stress_score,
                            s.arrival_change_pct.abs(),
                            n.name,
                            ns.stress_score,
                            n.arrivals,
                            quantity
                        ),
                    )
                });
            }
            None => b.push(Draft {
                source: Some("Central Buffer Stock".to_string()),
                destination: Some(target.id.clone()),
                estimated_cost: "₹2.5 Cr".to_string(),
                stability_gain: "+25% stability",
                ..Draft::new(
                    "Emergency Buffer Release",
                    Priority::High,
                    format!(
                        "{} is at stress {} with arrivals down {:.1}% and no calm neighbour \
                         has spare stock. Release central buffer to stabilise prices within 3-5 days.",
                        target.name,
                        s.stress_score,
                        s.arrival_change_pct.abs()
                    ),
                )
            }),
        }
    }

    // 2. Calm market with slumping prices.
    if s.stress_score < CALM_BELOW && price_change < PRICE_SLUMP_PCT {
        let stressed = first_max_by(
            neighbors.iter().filter(|(_, ns)| ns.stress_score > STRESSED_NEIGHBOR_ABOVE),
            |(_, ns)| ns.stress_score,
        );
        if let Some(&(n, ref ns)) = stressed {
            let quantity = share_of(target.arrivals, PUSH_SHARE);
            let per_qt = cost_per_qt(n);
            b.push(Draft {
                source: Some(target.id.clone()),
                destination: Some(n.id.clone()),
                estimated_cost: format_inr(to_decimal(per_qt) * Decimal::from(quantity)),
                stability_gain: "+12% stability",
                quantity: Some(quantity),
                counterpart_stress: Some(ns.stress_score),
                cost_per_qt: Some(per_qt),
                ..Draft::new(
                    "Push Stock to Stressed Mandi",
                    Priority::Medium,
                    format!(
                        "Prices at {} fell {:.1}% while {} is under stress {}. \
                         Sending {} qtl relieves both markets.",
                        target.name,
                        s.price_change_pct.abs(),
                        n.name,
                        ns.stress_score,
                        quantity
                    ),
                )
            });
        }

        let quantity = share_of(target.arrivals, COLD_STORAGE_SHARE);
        b.push(Draft {
            estimated_cost: format_inr(COLD_STORAGE_COST_PER_QT * Decimal::from(quantity)),
            stability_gain: "+8% price floor",
            quantity: Some(quantity),
            ..Draft::new(
                "Cold Storage Allocation",
                Priority::Medium,
                format!(
                    "Prices at {} fell {:.1}%. Holding {} qtl (20% of arrivals) in cold storage \
                     supports the price floor.",
                    target.name,
                    s.price_change_pct.abs(),
                    quantity
                ),
            )
        });
    }

    // 3. Festival ahead and supply still healthy.
    if target.festival_flag && breakdown.supply_stress == 0 {
        let quantity = share_of(target.arrivals, FESTIVAL_BUFFER_SHARE);
        b.push(Draft {
            estimated_cost: format_inr(to_decimal(target.current_price) * Decimal::from(quantity)),
            stability_gain: "+15% festival resilience",
            quantity: Some(quantity),
            ..Draft::new(
                "Pre-Festival Buffer Creation",
                Priority::Medium,
                format!(
                    "Festival demand is expected at {}. Building a buffer of {} qtl \
                     (15% of arrivals) while supply is steady.",
                    target.name, quantity
                ),
            )
        });
    }

    // 4. Prices climbing without a supply cause.
    if price_change > SPECULATION_PCT && breakdown.supply_stress == 0 {
        b.push(Draft {
            stability_gain: "+10% early detection",
            ..Draft::new(
                "Speculation Monitoring Alert",
                Priority::High,
                format!(
                    "Price at {} rose {:.1}% although arrivals did not fall. \
                     Check for hoarding or speculative buying.",
                    target.name, s.price_change_pct
                ),
            )
        });
    }

    // 5. Always.
    b.push(Draft {
        stability_gain: "Baseline",
        ..Draft::new(
            "Continue Standard Monitoring",
            Priority::Low,
            format!(
                "{} is {} at stress {} with volatility {:.2}. Keep routine price and arrival tracking.",
                target.name,
                s.status.as_str(),
                s.stress_score,
                s.volatility
            ),
        )
    });

    debug!(mandi = %target.id, count = b.out.len(), score = s.stress_score, "recommendations built");

    Ok(RecommendationSet {
        mandi_id: target.id.clone(),
        mandi_name: target.name.clone(),
        commodity: target.commodity.clone(),
        current_stress_score: s.stress_score,
        status: s.status,
        recommendations: b.out,
    })
}

fn arrival_change(m: &Market) -> f64 {
    pct_change(m.arrivals as f64, m.previous_arrivals as f64)
}

/// Maximum by key; ties go to the earliest element.
fn first_max_by<'b, T, K: Ord>(
    items: impl Iterator<Item = &'b T>,
    key: impl Fn(&T) -> K,
) -> Option<&'b T>
where
    T: 'b,
{
    let mut best: Option<(&T, K)> = None;
    for item in items {
        let k = key(item);
        if best.as_ref().map_or(true, |(_, bk)| k > *bk) {
            best = Some((item, k));
        }
    }
    best.map(|(item, _)| item)
}

fn share_of(arrivals: u64, share: Decimal) -> u64 {
    (Decimal::from(arrivals) * share).floor().to_u64().unwrap_or(0)
}

/// Rupee amount in the customary crore/lakh units.
pub fn format_inr(amount: Decimal) -> String {
    let crore = dec!(10000000);
    let lakh = dec!(100000);
    if amount >= crore {
        format!("₹{} Cr", (amount / crore).round_dp(2).normalize())
    } else if amount >= lakh {
        format!("₹{} Lakh", (amount / lakh).round_dp(2).normalize())
    } else {
        format!("₹{}", amount.round_dp(0).normalize())
    }
}

// ─── Explanations ────────────────────────────────────────────────────────────

/// Ask `explainer` about every high/medium recommendation.
///
/// Only `ai_insight` is ever written. A failed or timed-out call leaves it at
/// `None` and is logged; the error does not escape.
pub fn attach_explanations(
    set: &mut RecommendationSet,
    explainer: Arc<dyn Explainer>,
    timeout: Duration,
) {
    let context = format!(
        "{} ({}), {}: stress {} ({})",
        set.mandi_name,
        set.mandi_id,
        set.commodity,
        set.current_stress_score,
        set.status.as_str()
    );

    for rec in set.recommendations.iter_mut().filter(|r| r.priority.wants_explanation()) {
        let request = ExplainRequest {
            decision_label: rec.action.clone(),
            metrics: serde_json::to_value(&rec.metrics).unwrap_or(serde_json::Value::Null),
            market_context: context.clone(),
        };
        rec.ai_insight = match explain_with_timeout(Arc::clone(&explainer), request, timeout) {
            Ok(text) => text,
            Err(e) => {
                warn!(mandi = %set.mandi_id, recommendation = %rec.id, error = %e, "explanation unavailable");
                None
            }
        };
    }
}

/// Transport cost of `quantity` quintals in rupees, rounded to 2dp.
pub fn transfer_cost(cost_per_qt: f64, quantity: u64) -> f64 {
    round2(crate::pricing::from_decimal(to_decimal(cost_per_qt) * Decimal::from(quantity)))
}
