// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mandi Stress Simulation Suite - Error Taxonomy

use serde::Serialize;

/// Broad classification of a [`MandiError`].
///
/// Callers use this to tell a caller mistake (`NotFound`, `Validation`) from a
/// system fault (`DataLoad`, `Internal`) without matching on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Validation,
    DataLoad,
    Internal,
}

/// Errors raised by the engines and the live market state.
#[derive(Debug, thiserror::Error)]
pub enum MandiError {
    #[error("mandi '{0}' not found")]
    MarketNotFound(String),

    #[error("commodity '{commodity}' not found in mandi '{market_id}'")]
    CommodityNotFound { market_id: String, commodity: String },

    #[error("invalid arrivals: {0}")]
    InvalidArrivals(String),

    #[error("transfer quantity must be greater than 0, got {0}")]
    InvalidQuantity(i64),

    #[error("insufficient supply: requested {requested}, available {available}")]
    InsufficientSupply { requested: u64, available: u64 },

    #[error("arrivals at mandi '{market_id}' would exceed {max} ({current} + {added})")]
    ArrivalsOverflow {
        market_id: String,
        current: u64,
        added: u64,
        max: u64,
    },

    #[error("source and destination mandi are the same ('{0}')")]
    SameMarket(String),

    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
        value: i64,
    },

    #[error("failed to load market data: {0}")]
    DataLoad(String),

    #[error("market state unavailable: {0}")]
    StateUnavailable(String),
}

impl MandiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MarketNotFound(_) | Self::CommodityNotFound { .. } => ErrorKind::NotFound,
            Self::InvalidArrivals(_)
            | Self::InvalidQuantity(_)
            | Self::InsufficientSupply { .. }
            | Self::ArrivalsOverflow { .. }
            | Self::SameMarket(_)
            | Self::OutOfRange { .. } => ErrorKind::Validation,
            Self::DataLoad(_) => ErrorKind::DataLoad,
            Self::StateUnavailable(_) => ErrorKind::Internal,
        }
    }

    /// Whether the error was caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound | ErrorKind::Validation)
    }
}

impl From<serde_json::Error> for MandiError {
    fn from(e: serde_json::Error) -> Self {
        Self::DataLoad(e.to_string())
    }
}

impl From<std::io::Error> for MandiError {
    fn from(e: std::io::Error) -> Self {
        Self::DataLoad(e.to_string())
    }
}

pub type MandiResult<T> = Result<T, MandiError>;
