//! Ticker priority tiers and the memoized classifier.

use crate::config::PriorityConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::trace;

/// Scan priority of a symbol. P1 is scanned first and most often.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TickerPriority {
    P1,
    P2,
    P3,
}

impl TickerPriority {
    pub const ALL: [TickerPriority; 3] =
        [TickerPriority::P1, TickerPriority::P2, TickerPriority::P3];

    pub fn as_str(&self) -> &'static str {
        match self {
            TickerPriority::P1 => "P1",
            TickerPriority::P2 => "P2",
            TickerPriority::P3 => "P3",
        }
    }
}

impl fmt::Display for TickerPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps `(symbol, score, promoted)` to a tier and caches the answer.
///
/// Cached tiers are returned until [`PriorityClassifier::invalidate`] is called
/// for the symbol, even if a later call passes a different score.
pub struct PriorityClassifier {
    index_symbols: HashSet<String>,
    p1_threshold: Decimal,
    p2_threshold: Decimal,
    cache: HashMap<String, TickerPriority>,
}

impl PriorityClassifier {
    pub fn new(config: &PriorityConfig) -> Self {
        Self {
            index_symbols: config
                .index_symbols
                .iter()
                .map(|s| s.to_uppercase())
                .collect(),
            p1_threshold: config.p1_score_threshold,
            p2_threshold: config.p2_score_threshold,
            cache: HashMap::new(),
        }
    }

    pub fn is_index(&self, symbol: &str) -> bool {
        self.index_symbols.contains(symbol)
    }

    /// Tier for a symbol, computed once and then served from cache.
    pub fn classify(
        &mut self,
        symbol: &str,
        score: Option<Decimal>,
        promoted: bool,
    ) -> TickerPriority {
        if let Some(cached) = self.cache.get(symbol) {
            return *cached;
        }

        let priority = self.compute(symbol, score, promoted);
        trace!(symbol = %symbol, ?score, promoted, %priority, "Classified ticker");
        self.cache.insert(symbol.to_string(), priority);
        priority
    }

    /// Precedence: index member, strong score, promoted, watching score, rest.
    fn compute(&self, symbol: &str, score: Option<Decimal>, promoted: bool) -> TickerPriority {
        let score = score.unwrap_or(Decimal::ZERO);
        if self.is_index(symbol) || score >= self.p1_threshold || promoted {
            TickerPriority::P1
        } else if score >= self.p2_threshold {
            TickerPriority::P2
        } else {
            TickerPriority::P3
        }
    }

    /// Drop the cached tier so the next `classify` recomputes it.
    pub fn invalidate(&mut self, symbol: &str) {
        self.cache.remove(symbol);
    }

    /// Whether a score change is large enough to require re-classification.
    pub fn is_material_change(&self, old: Decimal, new: Decimal, materiality: Decimal) -> bool {
        let crossed = |threshold: Decimal| (old >= threshold) != (new >= threshold);
        (new - old).abs() >= materiality || crossed(self.p1_threshold) || crossed(self.p2_threshold)
    }

    pub fn cached(&self, symbol: &str) -> Option<TickerPriority> {
        self.cache.get(symbol).copied()
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}
