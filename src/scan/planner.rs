//! Ordered, budget-feasible scan plans.

use crate::budget::{PriorityClassifier, ScanBudget, TickerPriority};
use crate::config::PriorityConfig;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// Latest known score per symbol.
#[derive(Debug, Default)]
pub struct ScoreBook {
    scores: HashMap<String, Decimal>,
}

impl ScoreBook {
    pub fn get(&self, symbol: &str) -> Option<Decimal> {
        self.scores.get(symbol).copied()
    }

    /// Store a score, returning the previous one.
    pub fn set(&mut self, symbol: &str, score: Decimal) -> Option<Decimal> {
        self.scores.insert(symbol.to_string(), score)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// One symbol admitted into the current pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedScan {
    pub symbol: String,
    pub priority: TickerPriority,
    pub score: Decimal,
}

/// Turns a candidate list into an ordered plan.
pub struct ScanPlanner {
    classifier: PriorityClassifier,
    scores: ScoreBook,
    materiality: Decimal,
    max_symbols_per_pass: usize,
}

impl ScanPlanner {
    pub fn new(config: &PriorityConfig, max_symbols_per_pass: usize) -> Self {
        Self {
            classifier: PriorityClassifier::new(config),
            scores: ScoreBook::default(),
            materiality: config.score_change_materiality,
            max_symbols_per_pass,
        }
    }

    /// Record a new score. The cached tier is dropped only when the change is
    /// material. Returns whether it was dropped.
    pub fn update_score(&mut self, symbol: &str, score: Decimal) -> bool {
        let material = match self.scores.set(symbol, score) {
            Some(old) => self.classifier.is_material_change(old, score, self.materiality),
            None => true,
        };
        if material {
            trace!(symbol = %symbol, score = %score, "Material score change");
            self.classifier.invalidate(symbol);
        }
        material
    }

    /// Force re-classification, e.g. after a promotion or expiry.
    pub fn invalidate(&mut self, symbol: &str) {
        self.classifier.invalidate(symbol);
    }

    pub fn score(&self, symbol: &str) -> Option<Decimal> {
        self.scores.get(symbol)
    }

    pub fn priority(&mut self, symbol: &str, promoted: bool) -> TickerPriority {
        let score = self.scores.get(symbol);
        self.classifier.classify(symbol, score, promoted)
    }

    /// May `symbol` be scanned now? A fresh `score` is recorded first; a
    /// missing `priority` is resolved through the memoized classifier.
    pub async fn can_scan(
        &mut self,
        budget: &ScanBudget,
        symbol: &str,
        priority: Option<TickerPriority>,
        score: Option<Decimal>,
        promoted: bool,
        force_scan: bool,
    ) -> bool {
        if let Some(score) = score {
            self.update_score(symbol, score);
        }
        let priority = match priority {
            Some(priority) => priority,
            None => self.priority(symbol, promoted),
        };
        budget.can_scan(symbol, priority, force_scan).await
    }

    /// Classify, filter by admissibility and sort: tier, then score
    /// descending, then symbol. Duplicate candidates are planned once.
    pub async fn plan(
        &mut self,
        candidates: &[String],
        promoted: &HashSet<String>,
        budget: &ScanBudget,
        force_scan: bool,
    ) -> Vec<PlannedScan> {
        let mut seen = HashSet::new();
        let mut planned = Vec::new();
        let mut skipped = 0usize;

        for symbol in candidates {
            if !seen.insert(symbol.as_str()) {
                continue;
            }
            let priority = self.priority(symbol, promoted.contains(symbol));
            if !budget.can_scan(symbol, priority, force_scan).await {
                skipped += 1;
                continue;
            }
            planned.push(PlannedScan {
                symbol: symbol.clone(),
                priority,
                score: self.scores.get(symbol).unwrap_or(Decimal::ZERO),
            });
        }

        planned.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| b.score.cmp(&a.score))
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        if self.max_symbols_per_pass > 0 {
            planned.truncate(self.max_symbols_per_pass);
        }

        debug!(
            candidates = seen.len(),
            planned = planned.len(),
            skipped,
            force_scan,
            "Scan plan built"
        );
        planned
    }
}
