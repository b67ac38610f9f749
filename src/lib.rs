// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mandi Stress Simulation Suite

pub mod error;
pub mod types;
pub mod config;
pub mod pricing;
pub mod stress;
pub mod graph;
pub mod source;
pub mod simulation;
pub mod explain;
pub mod recommend;
pub mod market_state;
pub mod balance;
pub mod network;
pub mod forecast;
pub mod conservation;
pub mod engine;

pub use config::EngineConfig;
pub use engine::MandiEngine;
pub use error::{ErrorKind, MandiError, MandiResult};
pub use graph::MarketGraph;
pub use market_state::MarketState;
pub use types::*;

use wasm_bindgen::prelude::*;

use crate::simulation::{ShockRequest, ShockType, SimulationResult};

fn to_js<T: serde::Serialize>(value: &T) -> JsValue {
    serde_wasm_bindgen::to_value(value).unwrap_or(JsValue::NULL)
}

fn js_result<T: serde::Serialize>(result: MandiResult<T>) -> Result<JsValue, JsValue> {
    result.map(|v| to_js(&v)).map_err(|e| JsValue::from_str(&e.to_string()))
}

// ─── WASM Interface ──────────────────────────────────────────────────────────

#[wasm_bindgen]
impl MandiEngine {
    /// Build an engine from the two JSON documents. `config_json` may be empty.
    #[wasm_bindgen(constructor)]
    pub fn new(markets_json: &str, connections_json: &str, config_json: &str) -> Result<MandiEngine, JsValue> {
        #[cfg(target_arch = "wasm32")]
        std::panic::set_hook(Box::new(console_error_panic_hook::hook));

        let config = if config_json.trim().is_empty() {
            EngineConfig::default()
        } else {
            EngineConfig::from_json_str(config_json).map_err(|e| JsValue::from_str(&e.to_string()))?
        };
        Self::from_json(markets_json, connections_json, config).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    pub fn stress_overview(&self) -> Result<JsValue, JsValue> {
        js_result(self.stress_overview_core())
    }

    pub fn market_detail(&self, market_id: &str) -> Result<JsValue, JsValue> {
        js_result(self.market_detail_core(market_id))
    }

    pub fn shock_types(&self) -> JsValue {
        to_js(&self.shock_types_core())
    }

    pub fn simulate(&self, market_id: &str, shock_type: &str, intensity: u32, duration: u32) -> Result<JsValue, JsValue> {
        let request = ShockRequest::new(market_id, ShockType::parse(shock_type), intensity, duration);
        js_result(self.simulate_core(&request))
    }

    pub fn recommendations(&self, market_id: &str, insights: bool) -> Result<JsValue, JsValue> {
        js_result(self.recommend_core(market_id, insights))
    }

    /// Network view. `simulation` is a value previously returned by `simulate`, or null.
    pub fn network(&self, origin: Option<String>, simulation: JsValue) -> Result<JsValue, JsValue> {
        let sim: Option<SimulationResult> = if simulation.is_null() || simulation.is_undefined() {
            None
        } else {
            Some(serde_wasm_bindgen::from_value(simulation)?)
        };
        js_result(self.network_core(origin.as_deref(), sim.as_ref()))
    }

    pub fn forecast(&self, market_id: &str, commodity: &str, horizon: u32) -> Result<JsValue, JsValue> {
        js_result(self.forecast_core(market_id, commodity, horizon))
    }

    pub fn interpret(&self, text: &str) -> JsValue {
        to_js(&self.interpret_core(text))
    }

    /// `arrivals` may be a number or a numeric string.
    pub fn update_arrivals(
        &self,
        market_id: &str,
        commodity: &str,
        arrivals: JsValue,
        context: Option<String>,
    ) -> Result<JsValue, JsValue> {
        let raw: serde_json::Value = serde_wasm_bindgen::from_value(arrivals)?;
        js_result(self.update_arrivals_core(market_id, commodity, &raw, context.as_deref()))
    }

    pub fn transfer(&self, source_id: &str, dest_id: &str, commodity: &str, quantity: i64) -> Result<JsValue, JsValue> {
        js_result(self.transfer_core(source_id, dest_id, commodity, quantity))
    }

    pub fn balance(&self, market_id: &str) -> Result<JsValue, JsValue> {
        js_result(self.balance_core(market_id))
    }

    pub fn transfer_plan(&self) -> Result<JsValue, JsValue> {
        js_result(self.transfer_plan_core())
    }

    pub fn history(&self) -> Result<JsValue, JsValue> {
        js_result(self.history_core())
    }

    pub fn market_history(&self, market_id: &str) -> Result<JsValue, JsValue> {
        js_result(self.market_history_core(market_id))
    }

    pub fn audit(&self) -> Result<JsValue, JsValue> {
        js_result(self.audit_core())
    }

    pub fn reset(&self) -> Result<(), JsValue> {
        self.reset_core().map_err(|e| JsValue::from_str(&e.to_string()))
    }
}
