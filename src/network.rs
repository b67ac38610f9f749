// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mandi Stress Simulation Suite - Network View Payload

use std::collections::HashMap;
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::config::{EngineConfig, LayoutConfig};
use crate::graph::MarketGraph;
use crate::pricing::round2;
use crate::simulation::SimulationResult;
use crate::stress::{stress, HIGH_RISK_ABOVE, WATCH_ABOVE};
use crate::types::default_edge_strength;

const ORIGIN_IMPACT: f64 = 1.0;
const SIM_ORIGIN_OFFSET: f64 = 0.4;
const SIM_ORIGIN_FLOOR: f64 = 0.1;
const SIM_AFFECTED_OFFSET: f64 = 0.2;
const SIM_AFFECTED_FLOOR: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Evenly spaced points on a circle, first at the top, going clockwise in
/// screen coordinates. Coordinates are rounded to 2dp.
pub fn circular_layout(ids: &[&str], layout: &LayoutConfig) -> Vec<(String, Point)> {
    let n = ids.len() as f64;
    ids.iter()
        .enumerate()
        .map(|(i, id)| {
            let angle = 2.0 * PI * i as f64 / n - PI / 2.0;
            let p = Point {
                x: round2(layout.cx + layout.radius * angle.cos()),
                y: round2(layout.cy + layout.radius * angle.sin()),
            };
            (id.to_string(), p)
        })
        .collect()
}

/// Spread an origin's impact to its one- and two-hop neighbours.
///
/// Each neighbour's impact is replaced by `origin * decay * edge_strength`,
/// clamped to `[0, 1]`. A level-2 market uses the strength of the first
/// level-1 edge that reaches it. Markets further out keep their base value.
pub fn propagate_impact(
    graph: &MarketGraph,
    origin: &str,
    base: &HashMap<String, f64>,
    decay_level1: f64,
    decay_level2: f64,
) -> HashMap<String, f64> {
    let mut impacts = base.clone();
    let origin_impact = base.get(origin).copied().unwrap_or(ORIGIN_IMPACT).clamp(0.0, 1.0);
    impacts.insert(origin.to_string(), origin_impact);

    let strength = |a: &str, b: &str| {
        graph.edge(a, b).map(|c| c.edge_strength).unwrap_or_else(default_edge_strength)
    };

    let (level1, level2) = graph.ripple_levels(origin);
    for m in &level1 {
        let v = origin_impact * decay_level1 * strength(origin, &m.id);
        impacts.insert(m.id.clone(), v.clamp(0.0, 1.0));
    }
    for m in &level2 {
        let via = level1
            .iter()
            .find_map(|l1| graph.edge(&l1.id, &m.id))
            .map(|c| c.edge_strength)
            .unwrap_or_else(default_edge_strength);
        let v = origin_impact * decay_level2 * via;
        impacts.insert(m.id.clone(), v.clamp(0.0, 1.0));
    }
    impacts
}

// ─── Payload ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Normal,
    Watch,
    High,
}

impl NodeStatus {
    fn from_score(score: u32) -> Self {
        if score > HIGH_RISK_ABOVE {
            Self::High
        } else if score > WATCH_ABOVE {
            Self::Watch
        } else {
            Self::Normal
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkNode {
    pub id: String,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub impact: f64,
    pub msi: u32,
    pub status: NodeStatus,
    pub primary: String,
    pub price: f64,
}

/// Edge fields keep the snake_case names of the connectivity file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkEdge {
    pub from: String,
    pub to: String,
    pub strength: f64,
    pub cost_per_qt: f64,
    pub travel_time: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkPayload {
    pub nodes: Vec<NetworkNode>,
    pub edges: Vec<NetworkEdge>,
}

/// Nodes and edges for drawing the market network.
///
/// Base impact is each market's stress over 100. With an `origin`, that
/// market is pinned to full impact and spread outwards. A simulation result
/// overrides the figures for its own origin and affected markets.
pub fn graph_payload(
    graph: &MarketGraph,
    origin: Option<&str>,
    simulation: Option<&SimulationResult>,
    config: &EngineConfig,
) -> NetworkPayload {
    if graph.is_empty() {
        return NetworkPayload::default();
    }

    let scores: Vec<u32> = graph.markets().iter().map(|m| stress(m).stress_score).collect();
    let mut impacts: HashMap<String, f64> = graph
        .markets()
        .iter()
        .zip(&scores)
        .map(|(m, &s)| (m.id.clone(), s as f64 / 100.0))
        .collect();

    if let Some(o) = origin.filter(|o| graph.market(o).is_some()) {
        impacts.insert(o.to_string(), ORIGIN_IMPACT);
        impacts = propagate_impact(
            graph,
            o,
            &impacts,
            config.impact_decay_level1,
            config.impact_decay_level2,
        );
    }

    if let Some(sim) = simulation {
        let origin_impact = (sim.price_impact.abs() / 100.0 + SIM_ORIGIN_OFFSET).clamp(SIM_ORIGIN_FLOOR, 1.0);
        impacts.insert(sim.original_mandi_id.clone(), origin_impact);
        for a in &sim.affected_mandis {
            let v = (a.price_change.abs() / 100.0 + SIM_AFFECTED_OFFSET).clamp(SIM_AFFECTED_FLOOR, 1.0);
            impacts.insert(a.mandi_id.clone(), v);
        }
    }

    let ids: Vec<&str> = graph.markets().iter().map(|m| m.id.as_str()).collect();
    let coords = circular_layout(&ids, &config.layout);

    let nodes = graph
        .markets()
        .iter()
        .zip(&scores)
        .zip(coords)
        .map(|((m, &msi), (_, p))| {
            let (primary, price) = match m.primary_commodity() {
                Some(c) => (c.name.clone(), c.current_price),
                None => (m.commodity.clone(), m.current_price),
            };
            NetworkNode {
                id: m.id.clone(),
                name: m.name.clone(),
                x: p.x,
                y: p.y,
                impact: round2(impacts.get(&m.id).copied().unwrap_or(0.0).clamp(0.0, 1.0)),
                msi,
                status: NodeStatus::from_score(msi),
                primary,
                price,
            }
        })
        .collect();

    let edges = graph
        .connections()
        .iter()
        .map(|c| NetworkEdge {
            from: c.from.clone(),
            to: c.to.clone(),
            strength: c.edge_strength,
            cost_per_qt: c.cost_per_qt,
            travel_time: c.travel_time,
        })
        .collect();

    NetworkPayload { nodes, edges }
}
