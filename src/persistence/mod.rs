//! SQLite persistence for scanner state.
//!
//! Persists state that must survive restarts:
//! - The dynamic universe active set (flat list of promotion records)
//! - The intraday budget ledger snapshot, so a restart within the same
//!   trading day does not hand out the daily quota twice
//!
//! Unlike business data, malformed rows here are fatal: loading fails fast
//! instead of silently substituting defaults.

use crate::budget::LedgerSnapshot;
use crate::universe::DuiEntry;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// SQLite-based persistence manager.
pub struct PersistenceManager {
    conn: Connection,
}

impl PersistenceManager {
    /// Create a new persistence manager, initializing the database if needed.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory {:?}", parent))?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {:?}", path))?;

        let manager = Self { conn };
        manager.init_schema()?;

        info!("Persistence manager initialized at {:?}", path);
        Ok(manager)
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            -- Dynamic universe active set
            CREATE TABLE IF NOT EXISTS dui_entries (
                symbol TEXT PRIMARY KEY,
                source_engine TEXT NOT NULL,
                score TEXT NOT NULL,
                inserted_at TEXT NOT NULL,
                ttl_trading_days INTEGER NOT NULL,
                confirmed INTEGER NOT NULL
            );

            -- Budget ledger snapshot (singleton row)
            CREATE TABLE IF NOT EXISTS ledger_snapshot (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                ledger_date TEXT NOT NULL,
                calls_today INTEGER NOT NULL,
                snapshot_json TEXT NOT NULL,
                saved_at TEXT NOT NULL
            );
            "#,
        )?;

        debug!("Database schema initialized");
        Ok(())
    }

    /// Replace the persisted active set.
    pub fn save_promotions(&self, entries: &[DuiEntry]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute("DELETE FROM dui_entries", [])?;

        for entry in entries {
            tx.execute(
                r#"
                INSERT INTO dui_entries (symbol, source_engine, score, inserted_at,
                                         ttl_trading_days, confirmed)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    entry.symbol,
                    entry.source_engine,
                    entry.score.to_string(),
                    entry.inserted_at.to_rfc3339(),
                    entry.ttl_trading_days,
                    entry.confirmed as i32,
                ],
            )?;
        }

        tx.commit()?;

        debug!(entries = entries.len(), "Promotions saved to database");
        Ok(())
    }

    /// Load the persisted active set.
    pub fn load_promotions(&self) -> Result<Vec<DuiEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT symbol, source_engine, score, inserted_at, ttl_trading_days, confirmed
            FROM dui_entries
            ORDER BY inserted_at
            "#,
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, u32>(4)?,
                    row.get::<_, i32>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut entries = Vec::with_capacity(rows.len());
        for (symbol, source_engine, score, inserted_at, ttl_trading_days, confirmed) in rows {
            let score = Decimal::from_str(&score)
                .with_context(|| format!("Malformed score {:?} for promotion {}", score, symbol))?;
            let inserted_at = DateTime::parse_from_rfc3339(&inserted_at)
                .map(|dt| dt.with_timezone(&Utc))
                .with_context(|| {
                    format!("Malformed inserted_at {:?} for promotion {}", inserted_at, symbol)
                })?;
            anyhow::ensure!(
                confirmed == 0 || confirmed == 1,
                "Malformed confirmed flag {} for promotion {}",
                confirmed,
                symbol
            );

            entries.push(DuiEntry {
                symbol,
                source_engine,
                score,
                inserted_at,
                ttl_trading_days,
                confirmed: confirmed == 1,
            });
        }

        info!(entries = entries.len(), "Loaded promotions from database");
        Ok(entries)
    }

    /// Save the budget ledger counters.
    pub fn save_ledger_snapshot(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot).context("Failed to encode ledger snapshot")?;

        self.conn.execute(
            r#"
            INSERT INTO ledger_snapshot (id, ledger_date, calls_today, snapshot_json, saved_at)
            VALUES (1, ?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                ledger_date = ?1,
                calls_today = ?2,
                snapshot_json = ?3,
                saved_at = ?4
            "#,
            params![
                snapshot.date.to_string(),
                snapshot.calls_today,
                json,
                Utc::now().to_rfc3339(),
            ],
        )?;

        debug!(date = %snapshot.date, calls_today = snapshot.calls_today, "Ledger snapshot saved");
        Ok(())
    }

    /// Load the budget ledger counters, if any were saved.
    pub fn load_ledger_snapshot(&self) -> Result<Option<LedgerSnapshot>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT snapshot_json FROM ledger_snapshot WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        let Some(json) = json else {
            return Ok(None);
        };

        let snapshot: LedgerSnapshot =
            serde_json::from_str(&json).context("Malformed ledger snapshot")?;
        Ok(Some(snapshot))
    }

    /// Clear all data (for testing or reset).
    pub fn clear_all(&self) -> Result<()> {
        warn!("Clearing all persistence data");
        self.conn.execute_batch(
            r#"
            DELETE FROM dui_entries;
            DELETE FROM ledger_snapshot;
            "#,
        )?;
        Ok(())
    }
}
