//! Operational alerts for sustained quota consumption.
//!
//! Normal rejections are never alerted on; only the daily quota approaching
//! exhaustion is worth a human's attention.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{error, warn};

use super::BudgetStatus;

/// Severity of a usage alert.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AlertSeverity {
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Warning => "WARNING",
            AlertSeverity::Critical => "CRITICAL",
        }
    }
}

/// A structured quota alert.
#[derive(Debug, Clone, Serialize)]
pub struct UsageAlert {
    pub alert_id: String,
    pub timestamp: DateTime<Utc>,
    pub severity: AlertSeverity,
    pub daily_used: u32,
    pub daily_limit: u32,
    pub message: String,
}

impl UsageAlert {
    fn new(severity: AlertSeverity, status: &BudgetStatus, timestamp: DateTime<Utc>) -> Self {
        let pct = status.usage_ratio() * 100.0;
        Self {
            alert_id: format!("budget-{}-{}", status.date, severity.as_str().to_lowercase()),
            timestamp,
            severity,
            daily_used: status.daily_used,
            daily_limit: status.daily_limit,
            message: format!(
                "{:.1}% of the daily API quota used ({}/{}) during {}",
                pct, status.daily_used, status.daily_limit, status.current_window
            ),
        }
    }

    /// Emit as a structured log line.
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();

        match self.severity {
            AlertSeverity::Warning => warn!(target: "budget_alert", "BUDGET_ALERT: {}", json),
            AlertSeverity::Critical => error!(target: "budget_alert", "BUDGET_ALERT: {}", json),
        }
    }
}

/// Raises each severity at most once per trading day.
#[derive(Debug)]
pub struct UsageMonitor {
    warn_ratio: f64,
    critical_ratio: f64,
    date: Option<NaiveDate>,
    raised: HashSet<AlertSeverity>,
}

impl UsageMonitor {
    pub fn new(warn_ratio: f64, critical_ratio: f64) -> Self {
        Self {
            warn_ratio,
            critical_ratio,
            date: None,
            raised: HashSet::new(),
        }
    }

    /// Inspect a status snapshot and return a new alert if a threshold was crossed.
    pub fn evaluate(&mut self, status: &BudgetStatus, now: DateTime<Utc>) -> Option<UsageAlert> {
        if self.date != Some(status.date) {
            self.date = Some(status.date);
            self.raised.clear();
        }

        let ratio = status.usage_ratio();
        let severity = if ratio >= self.critical_ratio {
            AlertSeverity::Critical
        } else if ratio >= self.warn_ratio {
            AlertSeverity::Warning
        } else {
            return None;
        };

        if !self.raised.insert(severity) {
            return None;
        }
        Some(UsageAlert::new(severity, status, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{TimeWindow, WindowBudget};
    use rust_decimal_macros::dec;

    fn status(date: NaiveDate, used: u32) -> BudgetStatus {
        BudgetStatus {
            date,
            daily_used: used,
            daily_limit: 100,
            current_window: TimeWindow::Midday,
            window_used: used,
            window_budget: WindowBudget::new(100, dec!(0.6), dec!(0.3), dec!(0.1)),
            unique_tickers_today: 1,
        }
    }

    #[test]
    fn test_alerts_raised_once_per_severity_per_day() {
        let mut monitor = UsageMonitor::new(0.8, 0.95);
        let day = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let now = Utc::now();

        assert!(monitor.evaluate(&status(day, 50), now).is_none());

        let alert = monitor.evaluate(&status(day, 80), now).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Warning);
        assert!(monitor.evaluate(&status(day, 85), now).is_none());

        let alert = monitor.evaluate(&status(day, 96), now).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Critical);
        assert!(monitor.evaluate(&status(day, 100), now).is_none());

        let next_day = day.succ_opt().unwrap();
        let alert = monitor.evaluate(&status(next_day, 81), now).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Warning);
    }

    #[test]
    fn test_alert_message_mentions_usage() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let alert = UsageAlert::new(AlertSeverity::Warning, &status(day, 90), Utc::now());
        assert!(alert.message.contains("90.0%"));
        assert_eq!(alert.alert_id, "budget-2025-03-10-warning");
    }
}
