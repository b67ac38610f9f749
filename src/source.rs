// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mandi Stress Simulation Suite - Market Graph Source

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use crate::error::{MandiError, MandiResult};
use crate::graph::MarketGraph;
use crate::types::{Connection, Market};

/// Where markets and connections come from. Read once, at startup.
pub trait MarketGraphSource {
    fn list_markets(&self) -> MandiResult<Vec<Market>>;
    fn list_connections(&self) -> MandiResult<Vec<Connection>>;

    fn load_graph(&self) -> MandiResult<MarketGraph> {
        let markets = self.list_markets()?;
        let connections = self.list_connections()?;
        info!(markets = markets.len(), connections = connections.len(), "market graph loaded");
        Ok(MarketGraph::new(markets, connections))
    }
}

#[derive(Deserialize)]
struct MarketFile {
    mandis: Vec<Market>,
}

#[derive(Deserialize)]
struct ConnectivityFile {
    connections: Vec<Connection>,
}

/// JSON documents shaped `{"mandis": [...]}` and `{"connections": [...]}`.
#[derive(Debug, Clone)]
pub struct JsonGraphSource {
    markets_json: String,
    connections_json: String,
}

impl JsonGraphSource {
    pub fn from_strings(markets_json: impl Into<String>, connections_json: impl Into<String>) -> Self {
        Self { markets_json: markets_json.into(), connections_json: connections_json.into() }
    }

    pub fn from_files(market_path: impl AsRef<Path>, connectivity_path: impl AsRef<Path>) -> MandiResult<Self> {
        let read = |p: &Path| {
            std::fs::read_to_string(p)
                .map_err(|e| MandiError::DataLoad(format!("{}: {e}", p.display())))
        };
        Ok(Self::from_strings(read(market_path.as_ref())?, read(connectivity_path.as_ref())?))
    }
}

impl MarketGraphSource for JsonGraphSource {
    fn list_markets(&self) -> MandiResult<Vec<Market>> {
        let file: MarketFile = serde_json::from_str(&self.markets_json)?;
        Ok(file.mandis)
    }

    fn list_connections(&self) -> MandiResult<Vec<Connection>> {
        let file: ConnectivityFile = serde_json::from_str(&self.connections_json)?;
        Ok(file.connections)
    }
}

/// Load the graph, degrading to an empty one on any failure.
pub fn load_graph_or_empty(source: &dyn MarketGraphSource) -> MarketGraph {
    match source.load_graph() {
        Ok(graph) => graph,
        Err(e) => {
            error!(error = %e, "failed to load market graph; continuing with no mandis");
            MarketGraph::empty()
        }
    }
}
