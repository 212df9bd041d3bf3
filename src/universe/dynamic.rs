//! Dynamic universe promotion state machine.
//!
//! Per symbol: `Absent -> ActiveUnconfirmed -> ActiveConfirmed`.
//! Unconfirmed entries expire after `ttl_trading_days` trading days;
//! confirmed entries stay until removed explicitly.

use crate::config::DuiConfig;
use crate::schedule::TradingCalendar;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

/// A promoted symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuiEntry {
    pub symbol: String,
    pub source_engine: String,
    pub score: Decimal,
    pub inserted_at: DateTime<Utc>,
    pub ttl_trading_days: u32,
    pub confirmed: bool,
}

/// Lifecycle state of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PromotionState {
    Absent,
    ActiveUnconfirmed,
    ActiveConfirmed,
}

/// Why a proposal was turned down. Expected, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "reason")]
pub enum PromotionRejection {
    #[error("engine {engine} is momentum-only and may not promote")]
    MomentumEngine { engine: String },
    #[error("engine {engine} is not on the promotion allow-list")]
    DisallowedEngine { engine: String },
    #[error("score {score} is below the promotion threshold {threshold}")]
    ScoreBelowThreshold { score: Decimal, threshold: Decimal },
    #[error("active set is full of confirmed promotions")]
    ActiveSetFull,
}

/// Result of an accepted proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromotionOutcome {
    /// New entry; `evicted` names the unconfirmed entry that made room
    Inserted { evicted: Option<String> },
    /// Already active; insertion time refreshed, higher score kept
    Refreshed,
}

/// The active promotion set and its rules.
pub struct DynamicUniverse {
    config: DuiConfig,
    calendar: TradingCalendar,
    entries: HashMap<String, DuiEntry>,
    /// Expired symbols not yet handed out by `expire`
    unreported: Vec<String>,
}

impl DynamicUniverse {
    pub fn new(config: DuiConfig, calendar: TradingCalendar) -> Self {
        Self {
            config,
            calendar,
            entries: HashMap::new(),
            unreported: Vec::new(),
        }
    }

    /// Rebuild from persisted entries, evicting those already past TTL.
    ///
    /// Returns the universe and the evicted symbols.
    pub fn from_entries(
        config: DuiConfig,
        calendar: TradingCalendar,
        entries: Vec<DuiEntry>,
        now: DateTime<Utc>,
    ) -> (Self, Vec<String>) {
        let mut universe = Self::new(config, calendar);
        for entry in entries {
            universe.entries.insert(entry.symbol.clone(), entry);
        }
        let expired = universe.expire(now);
        if !expired.is_empty() {
            info!(count = expired.len(), symbols = ?expired, "Evicted stale promotions on load");
        }
        (universe, expired)
    }

    pub fn state(&self, symbol: &str) -> PromotionState {
        match self.entries.get(symbol) {
            None => PromotionState::Absent,
            Some(e) if e.confirmed => PromotionState::ActiveConfirmed,
            Some(_) => PromotionState::ActiveUnconfirmed,
        }
    }

    pub fn is_promoted(&self, symbol: &str) -> bool {
        self.entries.contains_key(symbol)
    }

    /// Check the source-engine and score policy without touching state.
    pub fn vet(&self, engine: &str, score: Decimal) -> Result<(), PromotionRejection> {
        if self.config.momentum_engines.iter().any(|e| e == engine) {
            return Err(PromotionRejection::MomentumEngine {
                engine: engine.to_string(),
            });
        }
        if !self.config.allowed_engines.iter().any(|e| e == engine) {
            return Err(PromotionRejection::DisallowedEngine {
                engine: engine.to_string(),
            });
        }
        if score < self.config.min_score_for_promotion {
            return Err(PromotionRejection::ScoreBelowThreshold {
                score,
                threshold: self.config.min_score_for_promotion,
            });
        }
        Ok(())
    }

    /// Propose `symbol` for elevated scanning.
    pub fn propose(
        &mut self,
        symbol: &str,
        engine: &str,
        score: Decimal,
        now: DateTime<Utc>,
    ) -> Result<PromotionOutcome, PromotionRejection> {
        self.vet(engine, score)?;
        // An expired entry must not be resurrected by a refresh
        self.evict_expired(now);

        if let Some(entry) = self.entries.get_mut(symbol) {
            entry.inserted_at = now;
            entry.score = entry.score.max(score);
            debug!(
                symbol = %symbol,
                engine = %engine,
                score = %entry.score,
                confirmed = entry.confirmed,
                "Refreshed promotion"
            );
            return Ok(PromotionOutcome::Refreshed);
        }

        let evicted = if self.entries.len() >= self.config.max_set_size {
            let victim = self
                .oldest_unconfirmed()
                .ok_or(PromotionRejection::ActiveSetFull)?;
            self.entries.remove(&victim);
            info!(
                evicted = %victim,
                incoming = %symbol,
                "Active set full, evicted oldest unconfirmed promotion"
            );
            Some(victim)
        } else {
            None
        };

        self.entries.insert(
            symbol.to_string(),
            DuiEntry {
                symbol: symbol.to_string(),
                source_engine: engine.to_string(),
                score,
                inserted_at: now,
                ttl_trading_days: self.config.ttl_trading_days,
                confirmed: false,
            },
        );
        info!(
            symbol = %symbol,
            engine = %engine,
            score = %score,
            "Promoted symbol into dynamic universe"
        );
        Ok(PromotionOutcome::Inserted { evicted })
    }

    fn oldest_unconfirmed(&self) -> Option<String> {
        self.entries
            .values()
            .filter(|e| !e.confirmed)
            .min_by(|a, b| {
                a.inserted_at
                    .cmp(&b.inserted_at)
                    .then_with(|| a.symbol.cmp(&b.symbol))
            })
            .map(|e| e.symbol.clone())
    }

    /// Mark an active promotion as confirmed. False if the symbol is not active.
    pub fn confirm(&mut self, symbol: &str, now: DateTime<Utc>) -> bool {
        self.evict_expired(now);
        match self.entries.get_mut(symbol) {
            Some(entry) => {
                if !entry.confirmed {
                    entry.confirmed = true;
                    info!(symbol = %symbol, "Promotion confirmed");
                }
                true
            }
            None => false,
        }
    }

    /// Explicit removal, the only way a confirmed entry leaves the set.
    pub fn remove(&mut self, symbol: &str) -> Option<DuiEntry> {
        let removed = self.entries.remove(symbol);
        if removed.is_some() {
            info!(symbol = %symbol, "Removed promotion");
        }
        removed
    }

    fn is_expired(&self, entry: &DuiEntry, now: DateTime<Utc>) -> bool {
        if entry.confirmed {
            return false;
        }
        let inserted = self.calendar.local_date(entry.inserted_at);
        let today = self.calendar.local_date(now);
        self.calendar.trading_days_between(inserted, today) >= entry.ttl_trading_days
    }

    /// Evict unconfirmed entries past their TTL and hold them for the next
    /// [`expire`](Self::expire). Returns how many were evicted now.
    pub fn evict_expired(&mut self, now: DateTime<Utc>) -> usize {
        let expired: Vec<String> = self
            .entries
            .values()
            .filter(|e| self.is_expired(e, now))
            .map(|e| e.symbol.clone())
            .collect();

        for symbol in &expired {
            self.entries.remove(symbol);
            info!(symbol = %symbol, "Promotion expired unconfirmed");
        }
        let count = expired.len();
        self.unreported.extend(expired);
        count
    }

    /// Evict entries past their TTL. Returns every symbol expired since the
    /// previous call, including evictions made by `propose` and `confirm`.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Vec<String> {
        self.evict_expired(now);
        let mut expired = std::mem::take(&mut self.unreported);
        expired.sort();
        expired.dedup();
        expired
    }

    /// Active entries, oldest first.
    pub fn active(&self) -> Vec<DuiEntry> {
        let mut entries: Vec<DuiEntry> = self.entries.values().cloned().collect();
        entries.sort_by(|a, b| {
            a.inserted_at
                .cmp(&b.inserted_at)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
