// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mandi Stress Simulation Suite - Shock Propagation Engine

use serde::{Deserialize, Serialize};

use crate::error::{MandiError, MandiResult};
use crate::graph::MarketGraph;
use crate::pricing::{elasticity_price, pct_change, round2, ELASTICITY};
use crate::stress::{stress, StressStatus};
use crate::types::{Market, PricePoint};

/// Supply shocks remove up to this fraction of supply per (intensity, week).
const SUPPLY_SHOCK_FACTOR: f64 = 0.4;
const DEMAND_SHOCK_FACTOR: f64 = 0.35;

const LEVEL1_DECAY: f64 = 0.6;
const LEVEL2_DECAY: f64 = 0.3;
/// Arrivals lost by a level-1 neighbour per unit of intensity, before decay.
const NEIGHBOR_SUPPLY_FACTOR: f64 = 0.3;

const PROJECTION_POINTS: usize = 3;

pub const INTENSITY_RANGE: (u32, u32) = (1, 100);
pub const DURATION_RANGE: (u32, u32) = (1, 30);

// ─── Shock Type ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ShockType {
    Rain,
    SupplyDrop,
    Transport,
    DemandSpike,
    /// Unrecognised shocks pass through without changing supply or demand.
    Other(String),
}

impl ShockType {
    pub fn parse(s: &str) -> Self {
        match s {
            "rain" => Self::Rain,
            "supply_drop" => Self::SupplyDrop,
            "transport" => Self::Transport,
            "demand_spike" => Self::DemandSpike,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Rain => "rain",
            Self::SupplyDrop => "supply_drop",
            Self::Transport => "transport",
            Self::DemandSpike => "demand_spike",
            Self::Other(s) => s,
        }
    }

    pub fn is_supply_shock(&self) -> bool {
        matches!(self, Self::Rain | Self::SupplyDrop | Self::Transport)
    }

    /// The known shock types with display labels.
    pub fn catalog() -> Vec<ShockTypeInfo> {
        vec![
            ShockTypeInfo {
                id: Self::Rain,
                name: "Heavy Rainfall",
                description: "Rain disrupts harvesting and road access, cutting arrivals",
            },
            ShockTypeInfo {
                id: Self::SupplyDrop,
                name: "Supply Drop",
                description: "Crop failure or pest damage reduces supply reaching the mandi",
            },
            ShockTypeInfo {
                id: Self::Transport,
                name: "Transport Disruption",
                description: "Strikes or blocked highways delay inbound trucks",
            },
            ShockTypeInfo {
                id: Self::DemandSpike,
                name: "Demand Spike",
                description: "Festival or bulk buying pushes demand above its base level",
            },
        ]
    }
}

impl From<String> for ShockType {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<ShockType> for String {
    fn from(s: ShockType) -> Self {
        s.as_str().to_string()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ShockTypeInfo {
    pub id: ShockType,
    pub name: &'static str,
    pub description: &'static str,
}

// ─── Request / Result ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShockRequest {
    pub mandi_id: String,
    pub shock_type: ShockType,
    pub intensity: u32,
    pub duration: u32,
}

impl ShockRequest {
    pub fn new(mandi_id: &str, shock_type: ShockType, intensity: u32, duration: u32) -> Self {
        Self { mandi_id: mandi_id.to_string(), shock_type, intensity, duration }
    }

    pub fn validate(&self) -> MandiResult<()> {
        check_range("intensity", self.intensity, INTENSITY_RANGE)?;
        check_range("duration", self.duration, DURATION_RANGE)
    }
}

fn check_range(field: &'static str, value: u32, (min, max): (u32, u32)) -> MandiResult<()> {
    if value < min || value > max {
        return Err(MandiError::OutOfRange {
            field,
            min: min as i64,
            max: max as i64,
            value: value as i64,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationParameters {
    pub elasticity: f64,
    pub supply_before: f64,
    pub supply_after: f64,
    pub demand_before: f64,
    pub demand_after: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedMarket {
    pub mandi_id: String,
    pub mandi_name: String,
    pub price_change: f64,
    pub new_price: f64,
    pub original_price: f64,
    pub new_stress_score: u32,
    pub previous_stress_score: u32,
    pub ripple_level: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub original_mandi: String,
    pub original_mandi_id: String,
    pub shock_type: ShockType,
    pub intensity: u32,
    pub duration: u32,
    pub price_impact: f64,
    pub original_price: f64,
    pub predicted_price: f64,
    pub original_arrivals: u64,
    pub predicted_arrivals: u64,
    pub previous_stress_score: u32,
    pub new_stress_score: u32,
    pub previous_status: StressStatus,
    pub new_status: StressStatus,
    pub affected_mandis: Vec<AffectedMarket>,
    pub simulated_price_history: Vec<PricePoint>,
    pub simulation_parameters: SimulationParameters,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Run one shock against `request.mandi_id`. Reads the graph, never mutates it.
pub fn simulate(graph: &MarketGraph, request: &ShockRequest) -> MandiResult<SimulationResult> {
    request.validate()?;
    let target = graph.require(&request.mandi_id)?;

    let intensity_factor = request.intensity as f64 / 100.0;
    let duration_factor = request.duration as f64 / 7.0;

    let current_price = target.current_price;
    let supply_before = target.base_supply as f64;
    let demand_before = target.base_demand as f64;

    let mut supply_after = supply_before;
    let mut demand_after = demand_before;
    let mut predicted_arrivals = target.arrivals;

    if request.shock_type.is_supply_shock() {
        let reduction = intensity_factor * duration_factor * SUPPLY_SHOCK_FACTOR;
        supply_after = supply_before * (1.0 - reduction);
        predicted_arrivals = scale_arrivals(target.arrivals, 1.0 - reduction);
    } else if request.shock_type == ShockType::DemandSpike {
        let increase = intensity_factor * duration_factor * DEMAND_SHOCK_FACTOR;
        demand_after = demand_before * (1.0 + increase);
    }

    let predicted_price = elasticity_price(current_price, supply_after, demand_after);
    let impact_pct = pct_change(predicted_price, current_price);

    let simulated_price_history =
        project_history(&target.price_history, predicted_price - current_price);

    let previous = stress(target);
    let mut hypothetical = target.clone();
    hypothetical.current_price = predicted_price;
    hypothetical.arrivals = predicted_arrivals;
    match request.shock_type {
        ShockType::Rain => hypothetical.rain_flag = true,
        ShockType::DemandSpike => hypothetical.festival_flag = true,
        _ => {}
    }
    let projected = stress(&hypothetical);

    let affected_mandis = propagate(graph, target, &request.shock_type, intensity_factor, impact_pct);

    Ok(SimulationResult {
        original_mandi: target.name.clone(),
        original_mandi_id: target.id.clone(),
        shock_type: request.shock_type.clone(),
        intensity: request.intensity,
        duration: request.duration,
        price_impact: round2(impact_pct),
        original_price: current_price,
        predicted_price,
        original_arrivals: target.arrivals,
        predicted_arrivals,
        previous_stress_score: previous.stress_score,
        new_stress_score: projected.stress_score,
        previous_status: previous.status,
        new_status: projected.status,
        affected_mandis,
        simulated_price_history,
        simulation_parameters: SimulationParameters {
            elasticity: ELASTICITY,
            supply_before,
            supply_after,
            demand_before,
            demand_after,
        },
    })
}

/// `floor(arrivals * factor)`, saturating at zero.
fn scale_arrivals(arrivals: u64, factor: f64) -> u64 {
    (arrivals as f64 * factor).floor().max(0.0) as u64
}

/// Ramp the last points of the history towards the shocked price.
///
/// Points before the last three are copied; point `i` of the tail moves by
/// `delta * (i - (len - 3)) / 3`.
fn project_history(history: &[PricePoint], delta: f64) -> Vec<PricePoint> {
    let start = history.len() as i64 - PROJECTION_POINTS as i64;
    history
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let i = i as i64;
            if i < start {
                p.clone()
            } else {
                let progress = (i - start) as f64 / PROJECTION_POINTS as f64;
                PricePoint { date: p.date.clone(), price: round2(p.price + delta * progress) }
            }
        })
        .collect()
}

fn propagate(
    graph: &MarketGraph,
    target: &Market,
    shock: &ShockType,
    intensity_factor: f64,
    impact_pct: f64,
) -> Vec<AffectedMarket> {
    let (level1, level2) = graph.ripple_levels(&target.id);
    let neighbor_supply_cut = if shock.is_supply_shock() {
        Some(intensity_factor * NEIGHBOR_SUPPLY_FACTOR * LEVEL1_DECAY)
    } else {
        None
    };

    let mut affected = Vec::with_capacity(level1.len() + level2.len());
    for m in level1 {
        affected.push(ripple(m, impact_pct * LEVEL1_DECAY, neighbor_supply_cut, 1));
    }
    for m in level2 {
        affected.push(ripple(m, impact_pct * LEVEL2_DECAY, None, 2));
    }
    affected
}

fn ripple(market: &Market, ripple_pct: f64, supply_cut: Option<f64>, level: u8) -> AffectedMarket {
    let new_price = round2(market.current_price * (1.0 + ripple_pct / 100.0));

    let mut hypothetical = market.clone();
    hypothetical.current_price = new_price;
    if let Some(cut) = supply_cut {
        hypothetical.arrivals = scale_arrivals(market.arrivals, 1.0 - cut);
    }

    AffectedMarket {
        mandi_id: market.id.clone(),
        mandi_name: market.name.clone(),
        price_change: round2(ripple_pct),
        new_price,
        original_price: market.current_price,
        new_stress_score: stress(&hypothetical).stress_score,
        previous_stress_score: stress(market).stress_score,
        ripple_level: level,
    }
}
