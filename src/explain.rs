// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mandi Stress Simulation Suite - Explanation Collaborator & Context Interpreter

//! Free-text side channels.
//!
//! Nothing in this module feeds back into price or stress figures. The
//! [`Explainer`] adds optional prose to recommendations; [`interpret`] turns an
//! operator's note into coarse signals for a chat front end.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ─── Explainer ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainRequest {
    pub decision_label: String,
    pub metrics: serde_json::Value,
    pub market_context: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExplainError {
    #[error("explainer unavailable: {0}")]
    Unavailable(String),

    #[error("explainer timed out after {0:?}")]
    Timeout(Duration),

    #[error("explainer failed: {0}")]
    Failed(String),
}

/// Source of optional explanatory text. `Ok(None)` is a legal answer.
pub trait Explainer: Send + Sync {
    fn explain(&self, request: &ExplainRequest) -> Result<Option<String>, ExplainError>;
}

/// Explainer that never has anything to say.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExplainer;

impl Explainer for NoExplainer {
    fn explain(&self, _request: &ExplainRequest) -> Result<Option<String>, ExplainError> {
        Ok(None)
    }
}

/// Call `explainer`, giving up after `timeout`.
///
/// On native targets the call runs on a fresh helper thread. A call that
/// outlives the timeout is abandoned: the thread is detached, not joined or
/// cancelled, and keeps running until `explainer.explain` returns; its answer
/// is then dropped. Each timed-out call therefore leaves one thread behind for
/// as long as the explainer blocks, so implementations should bound their own
/// I/O. wasm32 has no threads, so there the call is made inline.
#[cfg(not(target_arch = "wasm32"))]
pub fn explain_with_timeout(
    explainer: Arc<dyn Explainer>,
    request: ExplainRequest,
    timeout: Duration,
) -> Result<Option<String>, ExplainError> {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::Builder::new()
        .name("mandi-explain".into())
        .spawn(move || {
            let _ = tx.send(explainer.explain(&request));
        })
        .map_err(|e| ExplainError::Unavailable(e.to_string()))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(std::sync::mpsc::RecvTimeoutError::Timeout) => Err(ExplainError::Timeout(timeout)),
        Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
            Err(ExplainError::Failed("explainer thread exited without an answer".into()))
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub fn explain_with_timeout(
    explainer: Arc<dyn Explainer>,
    request: ExplainRequest,
    _timeout: Duration,
) -> Result<Option<String>, ExplainError> {
    explainer.explain(&request)
}

// ─── Context Interpreter ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    SupplyStress,
    LogisticsStress,
    DemandPressure,
    MarketDisruption,
}

impl SignalType {
    fn headline(&self) -> &'static str {
        match self {
            Self::SupplyStress => "supply stress",
            Self::LogisticsStress => "logistics stress",
            Self::DemandPressure => "demand pressure",
            Self::MarketDisruption => "market disruption",
        }
    }
}

struct KeywordRule {
    signal: SignalType,
    keywords: &'static [&'static str],
    impact: &'static str,
}

const KEYWORD_TABLE: &[KeywordRule] = &[
    KeywordRule {
        signal: SignalType::SupplyStress,
        keywords: &["rain", "flood", "drought", "crop failure", "pest", "hailstorm", "shortage"],
        impact: "Lower arrivals expected; prices likely to rise",
    },
    KeywordRule {
        signal: SignalType::LogisticsStress,
        keywords: &["strike", "transport", "truck", "highway", "road", "fuel", "blockade"],
        impact: "Delayed deliveries; short-term arrival dip",
    },
    KeywordRule {
        signal: SignalType::DemandPressure,
        keywords: &["festival", "wedding", "diwali", "holi", "eid", "bulk order", "export"],
        impact: "Demand above base level; upward price pressure",
    },
    KeywordRule {
        signal: SignalType::MarketDisruption,
        keywords: &["hoarding", "speculation", "closure", "closed", "curfew", "protest"],
        impact: "Abnormal trading; watch for price manipulation",
    },
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSignal {
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    pub keyword: String,
    pub impact_description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextInterpretation {
    pub signals: Vec<ContextSignal>,
    pub interpretation: Option<String>,
}

/// Whether `word` is `keyword` or its plain plural.
fn word_matches(word: &str, keyword: &str) -> bool {
    word == keyword || word.strip_suffix('s') == Some(keyword)
}

/// Whether the keyword's words appear consecutively among `words`.
fn has_phrase(words: &[&str], keyword: &str) -> bool {
    let parts: Vec<&str> = keyword.split_whitespace().collect();
    if parts.is_empty() || parts.len() > words.len() {
        return false;
    }
    words
        .windows(parts.len())
        .any(|w| w.iter().zip(&parts).all(|(word, part)| word_matches(word, part)))
}

/// Match free text against the keyword table.
///
/// At most one signal per type, carrying the first keyword of that type found
/// in the text. Case-insensitive, on whole words: "train" is not "rain".
pub fn interpret(text: &str) -> ContextInterpretation {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let signals: Vec<ContextSignal> = KEYWORD_TABLE
        .iter()
        .filter_map(|rule| {
            rule.keywords
                .iter()
                .find(|k| has_phrase(&words, k))
                .map(|k| ContextSignal {
                    signal_type: rule.signal,
                    keyword: (*k).to_string(),
                    impact_description: rule.impact.to_string(),
                })
        })
        .collect();

    let interpretation = if signals.is_empty() {
        None
    } else {
        let heads: Vec<&str> = signals.iter().map(|s| s.signal_type.headline()).collect();
        Some(format!("Context indicates {}", heads.join(", ")))
    };

    ContextInterpretation { signals, interpretation }
}
