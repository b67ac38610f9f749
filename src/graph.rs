// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mandi Stress Simulation Suite - Market Graph

use std::collections::{HashMap, HashSet};

use crate::error::{MandiError, MandiResult};
use crate::types::{Connection, Market};

/// Markets plus the connections between them.
///
/// Adjacency is computed once at construction and is symmetric: an edge is
/// taken from every [`Connection`] (either direction) and from every market's
/// `connected_mandis` list. Unknown ids and self loops are dropped; neighbour
/// order is first-seen order, so traversal is deterministic.
#[derive(Debug, Clone, Default)]
pub struct MarketGraph {
    markets: Vec<Market>,
    connections: Vec<Connection>,
    index: HashMap<String, usize>,
    adjacency: Vec<Vec<usize>>,
}

impl MarketGraph {
    pub fn new(markets: Vec<Market>, connections: Vec<Connection>) -> Self {
        let index: HashMap<String, usize> = markets
            .iter()
            .enumerate()
            .map(|(i, m)| (m.id.clone(), i))
            .collect();

        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); markets.len()];
        let mut link = |a: usize, b: usize| {
            if a == b {
                return;
            }
            if !adjacency[a].contains(&b) {
                adjacency[a].push(b);
            }
            if !adjacency[b].contains(&a) {
                adjacency[b].push(a);
            }
        };

        for c in &connections {
            if let (Some(&a), Some(&b)) = (index.get(&c.from), index.get(&c.to)) {
                link(a, b);
            }
        }
        for (a, m) in markets.iter().enumerate() {
            for other in &m.connected_mandis {
                if let Some(&b) = index.get(other) {
                    link(a, b);
                }
            }
        }

        Self { markets, connections, index, adjacency }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }

    pub fn markets(&self) -> &[Market] {
        &self.markets
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn market(&self, id: &str) -> Option<&Market> {
        self.index.get(id).map(|&i| &self.markets[i])
    }

    /// Like [`market`](Self::market) but a missing id is a `NotFound` error.
    pub fn require(&self, id: &str) -> MandiResult<&Market> {
        self.market(id)
            .ok_or_else(|| MandiError::MarketNotFound(id.to_string()))
    }

    /// Directly connected markets, in adjacency order.
    pub fn neighbors(&self, id: &str) -> Vec<&Market> {
        match self.index.get(id) {
            Some(&i) => self.adjacency[i].iter().map(|&j| &self.markets[j]).collect(),
            None => Vec::new(),
        }
    }

    /// First connection joining `a` and `b`, in either direction.
    pub fn edge(&self, a: &str, b: &str) -> Option<&Connection> {
        self.connections.iter().find(|c| c.joins(a, b))
    }

    /// Markets one and two hops away from `origin`.
    ///
    /// Level 2 excludes the origin and every level-1 market; a market reached
    /// through several level-1 markets appears once.
    pub fn ripple_levels(&self, origin: &str) -> (Vec<&Market>, Vec<&Market>) {
        let Some(&o) = self.index.get(origin) else {
            return (Vec::new(), Vec::new());
        };

        let level1: Vec<usize> = self.adjacency[o].clone();
        let mut seen: HashSet<usize> = level1.iter().copied().collect();
        seen.insert(o);

        let mut level2 = Vec::new();
        for &l1 in &level1 {
            for &candidate in &self.adjacency[l1] {
                if seen.insert(candidate) {
                    level2.push(candidate);
                }
            }
        }

        (
            level1.iter().map(|&i| &self.markets[i]).collect(),
            level2.iter().map(|&i| &self.markets[i]).collect(),
        )
    }
}
