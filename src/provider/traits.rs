//! Collaborator traits: data fetching and signal detection.
//!
//! Both sit outside the admission-control core. The scan runner asks the
//! budget before calling a [`MarketDataProvider`] and hands fetched payloads
//! to a [`SignalEngine`] for scoring.

use async_trait::async_trait;

use super::types::{DataKind, EngineSignal, Payload};

/// Fetches one kind of data for one symbol. Each call costs one API call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn fetch(&self, symbol: &str, kind: DataKind) -> anyhow::Result<Payload>;
}

/// Turns fetched data into engine scores.
pub trait SignalEngine: Send + Sync {
    fn evaluate(&self, symbol: &str, kind: DataKind, payload: &Payload) -> Vec<EngineSignal>;
}
