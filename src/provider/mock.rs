//! Offline provider and signal engine for paper runs and tests.

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::traits::{MarketDataProvider, SignalEngine};
use super::types::{DataKind, EngineSignal, Payload};
use crate::schedule::{Clock, SystemClock};

/// Deterministic synthetic market data.
///
/// Every symbol gets a stable pseudo-random score per data kind; symbols can
/// be made to fail to exercise error paths.
pub struct MockProvider {
    calls: AtomicU64,
    failing: Mutex<HashSet<String>>,
    overrides: Mutex<HashMap<(String, DataKind), f64>>,
    clock: Arc<dyn Clock>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Stamp payloads with `clock` instead of the wall clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            calls: AtomicU64::new(0),
            failing: Mutex::new(HashSet::new()),
            overrides: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Make every fetch for `symbol` fail.
    pub fn fail_symbol(&self, symbol: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(symbol.to_string());
        }
    }

    /// Pin the synthetic score of one symbol/kind.
    pub fn set_score(&self, symbol: &str, kind: DataKind, score: f64) {
        if let Ok(mut overrides) = self.overrides.lock() {
            overrides.insert((symbol.to_string(), kind), score);
        }
    }

    /// Number of fetches issued so far, failures included.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn synthetic_score(symbol: &str, kind: DataKind) -> f64 {
        // FNV-1a over symbol and kind, folded into [0, 1)
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in symbol.bytes().chain(kind.path().bytes()) {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        (hash % 1000) as f64 / 1000.0
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    async fn fetch(&self, symbol: &str, kind: DataKind) -> Result<Payload> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failing
            .lock()
            .map(|f| f.contains(symbol))
            .unwrap_or(false);
        if failing {
            anyhow::bail!("simulated outage for {}", symbol);
        }

        let score = self
            .overrides
            .lock()
            .ok()
            .and_then(|o| o.get(&(symbol.to_string(), kind)).copied())
            .unwrap_or_else(|| Self::synthetic_score(symbol, kind));

        Ok(Payload::new(vec![json!({
            "ticker": symbol,
            "kind": kind.path(),
            "score": score,
            "timestamp": self.clock.now().to_rfc3339(),
        })]))
    }
}

/// Reads the `score` field of mock payloads and attributes it to the engine
/// that normally consumes that data kind.
pub struct MockSignalEngine {
    clock: Arc<dyn Clock>,
}

impl MockSignalEngine {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    fn engine_for(kind: DataKind) -> &'static str {
        match kind {
            DataKind::Quote => "momentum_engine",
            DataKind::OptionsFlow => "options_flow_engine",
            DataKind::DarkPool => "dark_pool_engine",
            DataKind::GreekExposure => "gamma_engine",
            DataKind::NetPremium => "acceleration_engine",
            DataKind::Fundamentals => "distribution_engine",
        }
    }
}

impl SignalEngine for MockSignalEngine {
    fn evaluate(&self, symbol: &str, kind: DataKind, payload: &Payload) -> Vec<EngineSignal> {
        payload
            .first_number("score")
            .and_then(Decimal::from_f64)
            .map(|score| {
                vec![EngineSignal {
                    engine: Self::engine_for(kind).to_string(),
                    symbol: symbol.to_string(),
                    score: score.round_dp(3),
                    observed_at: self.clock.now(),
                }]
            })
            .unwrap_or_default()
    }
}
