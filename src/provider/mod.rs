//! Market-data provider boundary.
//!
//! Everything vendor-specific (HTTP, response shapes) is resolved here so the
//! rest of the crate only handles typed [`Payload`]s and [`EngineSignal`]s.

mod http;
mod mock;
mod scoring;
mod traits;
mod types;

pub use http::HttpProvider;
pub use mock::{MockProvider, MockSignalEngine};
pub use scoring::FieldSignalEngine;
pub use traits::{MarketDataProvider, SignalEngine};
#[cfg(test)]
pub use traits::MockMarketDataProvider;
pub use types::{ApiResponse, DataKind, EngineSignal, Payload, WrappedData};
