//! # Adaptive Scanner
//!
//! Budgeted market scanning against a rate-limited market-data API, with a
//! self-expiring dynamic universe of promoted symbols.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `schedule`: Clock, trading calendar and the trading-day window table
//! - `budget`: Priority tiers, the call ledger and the shared scan budget
//! - `cache`: TTL response cache keyed by symbol and data kind
//! - `universe`: Dynamic universe promotion state machine and its actor
//! - `provider`: Market-data and signal-engine boundary (HTTP and mock)
//! - `scan`: Scan planning and bounded-concurrency pass execution
//! - `persistence`: SQLite-based state persistence

pub mod budget;
pub mod cache;
pub mod config;
pub mod persistence;
pub mod provider;
pub mod scan;
pub mod schedule;
pub mod universe;

pub use config::Config;
