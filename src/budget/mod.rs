//! Scan budget allocation.
//!
//! Turns a fixed external rate limit into prioritized admission control:
//! - Priority tiers derived from score and set membership
//! - Daily, per-window, per-tier and per-ticker accounting
//! - Quota usage alerts

mod alerts;
mod ledger;
mod priority;
mod tracker;

pub use alerts::{AlertSeverity, UsageAlert, UsageMonitor};
pub use ledger::{BudgetError, BudgetLedger, BudgetScope, BudgetStatus, Denial, LedgerSnapshot};
pub use priority::{PriorityClassifier, TickerPriority};
pub use tracker::{Admission, ScanBudget};
