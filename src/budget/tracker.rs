//! Shared, synchronized access to the budget ledger.
//!
//! Scan tasks run concurrently, so the ledger lives behind one mutex. Use
//! [`ScanBudget::try_acquire`] when a call is about to be issued: it checks and
//! records under the same lock, so two tasks cannot both slip past a
//! per-ticker cap.

use chrono::NaiveDate;
use tokio::sync::Mutex;
use tracing::debug;

use super::alerts::UsageMonitor;
use super::ledger::{BudgetError, BudgetLedger, BudgetStatus, Denial, LedgerSnapshot};
use super::TickerPriority;
use crate::schedule::Clock;
use std::sync::Arc;

/// Outcome of an atomic check-and-record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Granted,
    Denied(Denial),
}

impl Admission {
    pub fn is_granted(&self) -> bool {
        matches!(self, Admission::Granted)
    }
}

struct Inner {
    ledger: BudgetLedger,
    monitor: UsageMonitor,
}

/// Process-wide scan budget.
pub struct ScanBudget {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
}

impl ScanBudget {
    pub fn new(ledger: BudgetLedger, monitor: UsageMonitor, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner { ledger, monitor }),
            clock,
        }
    }

    /// May `symbol` be scanned right now?
    pub async fn can_scan(&self, symbol: &str, priority: TickerPriority, force_scan: bool) -> bool {
        self.inner
            .lock()
            .await
            .ledger
            .can_call(symbol, priority, force_scan)
    }

    /// Admission check with the rejection reason.
    pub async fn check(
        &self,
        symbol: &str,
        priority: TickerPriority,
        force_scan: bool,
    ) -> Result<(), Denial> {
        self.inner.lock().await.ledger.check(symbol, priority, force_scan)
    }

    /// Record calls that were issued.
    pub async fn record_scan(&self, symbol: &str, calls: u32) -> Result<(), BudgetError> {
        let mut inner = self.inner.lock().await;
        inner.ledger.record(symbol, calls)?;
        Self::evaluate_usage(&mut inner, self.clock.as_ref());
        Ok(())
    }

    /// Check and record one call as a single critical section.
    ///
    /// A granted call is spent even if the fetch that follows fails.
    pub async fn try_acquire(
        &self,
        symbol: &str,
        priority: TickerPriority,
        force_scan: bool,
    ) -> Result<Admission, BudgetError> {
        let mut inner = self.inner.lock().await;
        if let Err(denial) = inner.ledger.check(symbol, priority, force_scan) {
            debug!(symbol = %symbol, %priority, force_scan, %denial, "Call not admitted");
            return Ok(Admission::Denied(denial));
        }
        inner.ledger.record(symbol, 1)?;
        Self::evaluate_usage(&mut inner, self.clock.as_ref());
        Ok(Admission::Granted)
    }

    fn evaluate_usage(inner: &mut Inner, clock: &dyn Clock) {
        let status = inner.ledger.status();
        if let Some(alert) = inner.monitor.evaluate(&status, clock.now()) {
            alert.emit();
        }
    }

    pub async fn status(&self) -> BudgetStatus {
        self.inner.lock().await.ledger.status()
    }

    pub async fn remaining_daily(&self) -> u32 {
        self.inner.lock().await.ledger.remaining_daily()
    }

    /// Explicit rollover, e.g. from a scheduler at local midnight.
    pub async fn reset(&self, date: NaiveDate) {
        self.inner.lock().await.ledger.reset(date);
    }

    pub async fn snapshot(&self) -> LedgerSnapshot {
        self.inner.lock().await.ledger.snapshot()
    }

    pub async fn restore(&self, snapshot: LedgerSnapshot) -> Result<bool, BudgetError> {
        self.inner.lock().await.ledger.restore(snapshot)
    }
}
