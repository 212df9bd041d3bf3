//! Actor owning the dynamic universe.
//!
//! One task owns the [`DynamicUniverse`] and its SQLite store; every caller
//! goes through a cloneable [`DuiHandle`], so transitions are applied one at
//! a time in arrival order.

use super::dynamic::{DuiEntry, DynamicUniverse, PromotionOutcome, PromotionRejection};
use crate::config::DuiConfig;
use crate::persistence::PersistenceManager;
use crate::schedule::{Clock, TradingCalendar};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

const COMMAND_BUFFER: usize = 256;

/// Outcome of a proposal as seen by the caller.
pub type ProposalResult = std::result::Result<PromotionOutcome, PromotionRejection>;

#[derive(Debug, Error, PartialEq)]
pub enum UniverseError {
    #[error("symbol {0} is not in the active set")]
    UnknownSymbol(String),
    #[error("dynamic universe actor has shut down")]
    Closed,
}

enum Command {
    Propose {
        symbol: String,
        engine: String,
        score: Decimal,
        reply: oneshot::Sender<ProposalResult>,
    },
    Confirm {
        symbol: String,
        reply: oneshot::Sender<bool>,
    },
    Remove {
        symbol: String,
        reply: oneshot::Sender<Option<DuiEntry>>,
    },
    Active {
        reply: oneshot::Sender<Vec<DuiEntry>>,
    },
    IsPromoted {
        symbol: String,
        reply: oneshot::Sender<bool>,
    },
    SweepExpired {
        reply: oneshot::Sender<Vec<String>>,
    },
    Shutdown,
}

/// Cloneable handle to the universe actor.
#[derive(Clone)]
pub struct DuiHandle {
    tx: mpsc::Sender<Command>,
}

impl DuiHandle {
    /// Load persisted promotions, evict stale ones, and start the actor.
    ///
    /// A malformed store is an error; the actor is not started.
    pub fn spawn(
        config: DuiConfig,
        calendar: TradingCalendar,
        store: Option<PersistenceManager>,
        clock: Arc<dyn Clock>,
    ) -> Result<(Self, JoinHandle<()>)> {
        let (universe, expired) = load_universe(config, calendar, store.as_ref(), clock.now())?;

        let actor = DuiActor {
            universe,
            store,
            clock,
        };
        if !expired.is_empty() {
            actor
                .persist()
                .context("Failed to persist evictions on load")?;
        }

        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let task = tokio::spawn(actor.run(rx));
        info!("Dynamic universe actor started");

        Ok((Self { tx }, task))
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> std::result::Result<T, UniverseError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| UniverseError::Closed)?;
        rx.await.map_err(|_| UniverseError::Closed)
    }

    /// Propose `symbol` on behalf of `engine`.
    pub async fn propose_promotion(
        &self,
        symbol: &str,
        engine: &str,
        score: Decimal,
    ) -> std::result::Result<ProposalResult, UniverseError> {
        let symbol = symbol.to_string();
        let engine = engine.to_string();
        self.request(|reply| Command::Propose {
            symbol,
            engine,
            score,
            reply,
        })
        .await
    }

    /// Confirm an active promotion. False if the symbol is not active.
    pub async fn confirm_promotion(
        &self,
        symbol: &str,
    ) -> std::result::Result<bool, UniverseError> {
        let symbol = symbol.to_string();
        self.request(|reply| Command::Confirm { symbol, reply }).await
    }

    /// Remove a promotion regardless of its confirmation state.
    pub async fn remove(&self, symbol: &str) -> std::result::Result<DuiEntry, UniverseError> {
        let owned = symbol.to_string();
        self.request(|reply| Command::Remove {
            symbol: owned,
            reply,
        })
        .await?
        .ok_or_else(|| UniverseError::UnknownSymbol(symbol.to_string()))
    }

    pub async fn active_promotions(&self) -> std::result::Result<Vec<DuiEntry>, UniverseError> {
        self.request(|reply| Command::Active { reply }).await
    }

    pub async fn is_promoted(&self, symbol: &str) -> std::result::Result<bool, UniverseError> {
        let symbol = symbol.to_string();
        self.request(|reply| Command::IsPromoted { symbol, reply }).await
    }

    /// Evict expired unconfirmed promotions now. Returns every symbol expired
    /// since the previous sweep, including those evicted by other commands.
    pub async fn sweep_expired(&self) -> std::result::Result<Vec<String>, UniverseError> {
        self.request(|reply| Command::SweepExpired { reply }).await
    }

    /// Stop the actor after the commands already queued.
    pub async fn shutdown(&self) -> std::result::Result<(), UniverseError> {
        self.tx
            .send(Command::Shutdown)
            .await
            .map_err(|_| UniverseError::Closed)
    }
}

/// Rebuild the universe from `store` as of `now`, evicting entries already
/// past TTL. The store itself is left untouched.
pub fn load_universe(
    config: DuiConfig,
    calendar: TradingCalendar,
    store: Option<&PersistenceManager>,
    now: DateTime<Utc>,
) -> Result<(DynamicUniverse, Vec<String>)> {
    let persisted = match store {
        Some(store) => store
            .load_promotions()
            .context("Failed to load dynamic universe")?,
        None => Vec::new(),
    };
    Ok(DynamicUniverse::from_entries(config, calendar, persisted, now))
}

struct DuiActor {
    universe: DynamicUniverse,
    store: Option<PersistenceManager>,
    clock: Arc<dyn Clock>,
}

impl DuiActor {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Propose {
                    symbol,
                    engine,
                    score,
                    reply,
                } => {
                    let before = self.universe.len();
                    let result = self.universe.propose(&symbol, &engine, score, self.clock.now());
                    if result.is_ok() || self.universe.len() != before {
                        self.persist_or_log();
                    }
                    let _ = reply.send(result);
                }
                Command::Confirm { symbol, reply } => {
                    let confirmed = self.universe.confirm(&symbol, self.clock.now());
                    self.persist_or_log();
                    let _ = reply.send(confirmed);
                }
                Command::Remove { symbol, reply } => {
                    let removed = self.universe.remove(&symbol);
                    if removed.is_some() {
                        self.persist_or_log();
                    }
                    let _ = reply.send(removed);
                }
                Command::Active { reply } => {
                    self.evict_and_persist();
                    let _ = reply.send(self.universe.active());
                }
                Command::IsPromoted { symbol, reply } => {
                    self.evict_and_persist();
                    let _ = reply.send(self.universe.is_promoted(&symbol));
                }
                Command::SweepExpired { reply } => {
                    self.evict_and_persist();
                    let _ = reply.send(self.universe.expire(self.clock.now()));
                }
                Command::Shutdown => {
                    debug!("Dynamic universe actor received shutdown");
                    break;
                }
            }
        }
        info!(active = self.universe.len(), "Dynamic universe actor stopped");
    }

    /// Reads never observe an entry past its TTL. Evicted symbols stay
    /// queued for the next sweep.
    fn evict_and_persist(&mut self) {
        if self.universe.evict_expired(self.clock.now()) > 0 {
            self.persist_or_log();
        }
    }

    fn persist(&self) -> Result<()> {
        match &self.store {
            Some(store) => store.save_promotions(&self.universe.active()),
            None => Ok(()),
        }
    }

    fn persist_or_log(&self) {
        if let Err(e) = self.persist() {
            error!(error = %e, "Failed to persist dynamic universe");
        }
    }
}
