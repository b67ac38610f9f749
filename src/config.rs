// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mandi Stress Simulation Suite - Engine Configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MandiError, MandiResult};

/// Circle the network view is laid out on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    pub cx: f64,
    pub cy: f64,
    pub radius: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self { cx: 500.0, cy: 320.0, radius: 240.0 }
    }
}

/// Engine settings. Every field has a default, so `{}` is a valid config.
///
/// The elasticity exponent and the simulation ripple decays are fixed
/// constants of the model and are not configurable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Directory holding the market and connectivity files.
    pub data_dir: PathBuf,
    pub market_file: String,
    pub connectivity_file: String,
    /// Upper bound on one explanation call, in milliseconds.
    pub explain_timeout_ms: u64,
    /// Transport cost per quintal when no connection supplies one.
    pub default_cost_per_qt: f64,
    pub forecast_alpha: f64,
    pub max_forecast_horizon: u32,
    pub layout: LayoutConfig,
    /// Decays used by the network view's impact propagation.
    pub impact_decay_level1: f64,
    pub impact_decay_level2: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            market_file: "mandiData.json".to_string(),
            connectivity_file: "connectivity.json".to_string(),
            explain_timeout_ms: 8_000,
            default_cost_per_qt: 50.0,
            forecast_alpha: 0.25,
            max_forecast_horizon: 30,
            layout: LayoutConfig::default(),
            impact_decay_level1: 0.6,
            impact_decay_level2: 0.3,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> MandiResult<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> MandiResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    pub fn market_path(&self) -> PathBuf {
        self.data_dir.join(&self.market_file)
    }

    pub fn connectivity_path(&self) -> PathBuf {
        self.data_dir.join(&self.connectivity_file)
    }

    pub fn validate(&self) -> MandiResult<()> {
        let unit = |v: f64| v.is_finite() && v > 0.0 && v <= 1.0;
        if !unit(self.forecast_alpha) {
            return Err(invalid("forecastAlpha must be in (0, 1]"));
        }
        if !unit(self.impact_decay_level1) || !unit(self.impact_decay_level2) {
            return Err(invalid("impact decays must be in (0, 1]"));
        }
        if self.impact_decay_level2 > self.impact_decay_level1 {
            return Err(invalid("level-2 impact decay exceeds level-1"));
        }
        if self.max_forecast_horizon == 0 {
            return Err(invalid("maxForecastHorizon must be at least 1"));
        }
        if !(self.default_cost_per_qt.is_finite() && self.default_cost_per_qt >= 0.0) {
            return Err(invalid("defaultCostPerQt must be non-negative"));
        }
        if !(self.layout.radius.is_finite() && self.layout.radius > 0.0) {
            return Err(invalid("layout radius must be positive"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> MandiError {
    MandiError::DataLoad(format!("invalid config: {msg}"))
}
