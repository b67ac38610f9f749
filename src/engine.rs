// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mandi Stress Simulation Suite - Engine Facade

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;
use wasm_bindgen::prelude::*;

use crate::balance::{market_balance, match_transfers, MarketBalance, TransferSuggestion};
use crate::config::EngineConfig;
use crate::conservation::{audit_state, AuditReport};
use crate::error::{MandiError, MandiResult};
use crate::explain::{interpret, ContextInterpretation, Explainer, NoExplainer};
use crate::forecast::{forecast, Forecast};
use crate::graph::MarketGraph;
use crate::market_state::{
    parse_arrivals, ArrivalsUpdateOutcome, MarketState, StateHistoryEntry, TransferOutcome,
};
use crate::network::{graph_payload, NetworkPayload};
use crate::recommend::{attach_explanations, recommend, RecommendationSet};
use crate::simulation::{simulate, ShockRequest, ShockType, ShockTypeInfo, SimulationResult};
use crate::source::{load_graph_or_empty, JsonGraphSource, MarketGraphSource};
use crate::stress::{stress, stress_overview, StressOverview, StressResult};
use crate::types::Market;

/// One market with its live stress and balance.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketDetail {
    #[serde(flatten)]
    pub market: Market,
    pub stress: StressResult,
    pub balance: MarketBalance,
}

/// Request-handler facade over the engines.
///
/// Holds the immutable baseline graph, the live [`MarketState`] built on it,
/// and the explanation collaborator. Every read engine runs on the live state,
/// so an overview, a detail and a simulation taken together agree. The `*_core` methods are plain Rust; the
/// wasm bindings in `lib.rs` wrap them and serialize the results.
#[wasm_bindgen]
pub struct MandiEngine {
    graph: Arc<MarketGraph>,
    state: MarketState,
    config: EngineConfig,
    explainer: Arc<dyn Explainer>,
}

impl MandiEngine {
    pub fn with_graph(graph: MarketGraph, config: EngineConfig) -> Self {
        let graph = Arc::new(graph);
        Self {
            state: MarketState::new(Arc::clone(&graph)),
            graph,
            config,
            explainer: Arc::new(NoExplainer),
        }
    }

    /// Engine over the files named by `config`. Unreadable data yields an
    /// engine with no markets rather than an error.
    pub fn from_config(config: EngineConfig) -> Self {
        let graph = match JsonGraphSource::from_files(config.market_path(), config.connectivity_path()) {
            Ok(source) => load_graph_or_empty(&source),
            Err(e) => {
                tracing::error!(error = %e, "market data unavailable; continuing with no mandis");
                MarketGraph::empty()
            }
        };
        Self::with_graph(graph, config)
    }

    pub fn from_json(markets_json: &str, connections_json: &str, config: EngineConfig) -> MandiResult<Self> {
        let graph = JsonGraphSource::from_strings(markets_json, connections_json).load_graph()?;
        Ok(Self::with_graph(graph, config))
    }

    pub fn with_explainer(mut self, explainer: Arc<dyn Explainer>) -> Self {
        self.explainer = explainer;
        self
    }

    /// Replace the live state, e.g. with one on a fixed clock.
    pub fn with_state(mut self, state: MarketState) -> Self {
        self.state = state;
        self
    }

    pub fn graph(&self) -> &MarketGraph {
        &self.graph
    }

    pub fn graph_handle(&self) -> Arc<MarketGraph> {
        Arc::clone(&self.graph)
    }

    pub fn state(&self) -> &MarketState {
        &self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ─── Read side ───────────────────────────────────────────────────────────

    pub fn stress_overview_core(&self) -> MandiResult<StressOverview> {
        Ok(stress_overview(&self.state.live_markets()?))
    }

    pub fn market_detail_core(&self, market_id: &str) -> MandiResult<MarketDetail> {
        let market = self.state.snapshot(market_id)?;
        Ok(MarketDetail { stress: stress(&market), balance: market_balance(&market), market })
    }

    pub fn shock_types_core(&self) -> Vec<ShockTypeInfo> {
        ShockType::catalog()
    }

    pub fn simulate_core(&self, request: &ShockRequest) -> MandiResult<SimulationResult> {
        debug!(mandi = %request.mandi_id, shock = request.shock_type.as_str(), "simulating shock");
        simulate(&self.state.live_graph()?, request)
    }

    /// Recommendations for one market; with `insights`, high and medium
    /// entries are offered to the explainer afterwards.
    pub fn recommend_core(&self, market_id: &str, insights: bool) -> MandiResult<RecommendationSet> {
        let mut set = recommend(&self.state.live_graph()?, market_id, self.config.default_cost_per_qt)?;
        if insights {
            attach_explanations(
                &mut set,
                Arc::clone(&self.explainer),
                Duration::from_millis(self.config.explain_timeout_ms),
            );
        }
        Ok(set)
    }

    pub fn network_core(
        &self,
        origin: Option<&str>,
        simulation: Option<&SimulationResult>,
    ) -> MandiResult<NetworkPayload> {
        Ok(graph_payload(&self.state.live_graph()?, origin, simulation, &self.config))
    }

    pub fn forecast_core(&self, market_id: &str, commodity: &str, horizon: u32) -> MandiResult<Forecast> {
        let market = self.state.snapshot(market_id)?;
        forecast(
            &market,
            commodity,
            horizon,
            self.config.forecast_alpha,
            self.config.max_forecast_horizon,
            self.state.today(),
        )
    }

    pub fn interpret_core(&self, text: &str) -> ContextInterpretation {
        interpret(text)
    }

    // ─── Live state ──────────────────────────────────────────────────────────

    pub fn update_arrivals_core(
        &self,
        market_id: &str,
        commodity: &str,
        raw_arrivals: &serde_json::Value,
        context: Option<&str>,
    ) -> MandiResult<ArrivalsUpdateOutcome> {
        let arrivals = parse_arrivals(raw_arrivals)?;
        self.state.apply_arrivals_update(market_id, commodity, arrivals, context)
    }

    pub fn transfer_core(
        &self,
        source_id: &str,
        dest_id: &str,
        commodity: &str,
        quantity: i64,
    ) -> MandiResult<TransferOutcome> {
        let quantity = u64::try_from(quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or(MandiError::InvalidQuantity(quantity))?;
        self.state.execute_transfer(source_id, dest_id, commodity, quantity)
    }

    pub fn live_stress_core(&self, market_id: &str) -> MandiResult<StressResult> {
        Ok(stress(&self.state.snapshot(market_id)?))
    }

    pub fn balance_core(&self, market_id: &str) -> MandiResult<MarketBalance> {
        Ok(market_balance(&self.state.snapshot(market_id)?))
    }

    pub fn transfer_plan_core(&self) -> MandiResult<Vec<TransferSuggestion>> {
        Ok(match_transfers(&self.state.live_graph()?, self.config.default_cost_per_qt))
    }

    pub fn history_core(&self) -> MandiResult<Vec<StateHistoryEntry>> {
        self.state.full_history()
    }

    /// Ledger entries touching one market; errors if the market is unknown.
    pub fn market_history_core(&self, market_id: &str) -> MandiResult<Vec<StateHistoryEntry>> {
        self.graph.require(market_id)?;
        self.state.history_for(market_id)
    }

    pub fn audit_core(&self) -> MandiResult<AuditReport> {
        let (live, history) = self.state.live_with_history()?;
        audit_state(self.graph.markets(), &live, &history)
            .map_err(|e| MandiError::StateUnavailable(e.to_string()))
    }

    pub fn reset_core(&self) -> MandiResult<()> {
        self.state.reset()
    }
}
