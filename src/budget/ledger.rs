//! Admission-control ledger for the daily API quota.
//!
//! Answers "may symbol `s` at tier `p` be queried now?" and records calls once
//! they are issued. Rejections are values ([`Denial`]), never errors: a denied
//! scan is skipped and retried on a later pass.

use crate::config::BudgetConfig;
use crate::schedule::{Clock, TimeWindow, TradingCalendar, WindowBudget, WindowSchedule};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::TickerPriority;

/// Which budget ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BudgetScope {
    Daily,
    Window(TimeWindow),
    Tier(TimeWindow, TickerPriority),
}

impl fmt::Display for BudgetScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetScope::Daily => write!(f, "daily"),
            BudgetScope::Window(w) => write!(f, "window {}", w),
            BudgetScope::Tier(w, p) => write!(f, "{} bucket of window {}", p, w),
        }
    }
}

/// Why a call was not admitted. All variants mean "retry later".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "type")]
pub enum Denial {
    #[error("{scope} budget exhausted")]
    BudgetExhausted { scope: BudgetScope },
    #[error("cooldown active, {remaining_secs}s remaining")]
    CooldownActive { remaining_secs: i64 },
    #[error("ticker cap reached ({calls}/{cap})")]
    TickerCapReached { calls: u32, cap: u32 },
}

/// Caller contract violations.
#[derive(Debug, Error, PartialEq)]
pub enum BudgetError {
    #[error("cannot record a call for an empty symbol")]
    EmptySymbol,
    #[error("call count must be at least 1")]
    ZeroCalls,
    #[error("recording {calls} calls for {symbol} would overflow a counter")]
    CountOverflow { symbol: String, calls: u32 },
    #[error("snapshot is inconsistent: {calls_today} calls today but windows sum to {window_sum}")]
    InconsistentSnapshot { calls_today: u32, window_sum: u32 },
}

/// Read-only observability view of the ledger.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetStatus {
    pub date: NaiveDate,
    pub daily_used: u32,
    pub daily_limit: u32,
    pub current_window: TimeWindow,
    pub window_used: u32,
    pub window_budget: WindowBudget,
    pub unique_tickers_today: usize,
}

impl BudgetStatus {
    /// Fraction of the daily quota already spent.
    pub fn usage_ratio(&self) -> f64 {
        if self.daily_limit == 0 {
            return 1.0;
        }
        f64::from(self.daily_used) / f64::from(self.daily_limit)
    }
}

/// Intraday counters, persisted so a restart does not reset the quota.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub date: NaiveDate,
    pub calls_today: u32,
    pub calls_by_window: BTreeMap<TimeWindow, u32>,
    pub call_count_today: BTreeMap<String, u32>,
    pub last_call_at: BTreeMap<String, DateTime<Utc>>,
}

/// Daily, per-window and per-ticker call accounting.
///
/// Not synchronized; share it through [`super::ScanBudget`].
pub struct BudgetLedger {
    config: BudgetConfig,
    schedule: WindowSchedule,
    calendar: TradingCalendar,
    clock: Arc<dyn Clock>,
    ledger_date: NaiveDate,
    calls_today: u32,
    calls_by_window: HashMap<TimeWindow, u32>,
    last_call_at: HashMap<String, DateTime<Utc>>,
    call_count_today: HashMap<String, u32>,
}

impl BudgetLedger {
    pub fn new(
        config: BudgetConfig,
        schedule: WindowSchedule,
        calendar: TradingCalendar,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ledger_date = calendar.local_date(clock.now());
        Self {
            config,
            schedule,
            calendar,
            clock,
            ledger_date,
            calls_today: 0,
            calls_by_window: HashMap::new(),
            last_call_at: HashMap::new(),
            call_count_today: HashMap::new(),
        }
    }

    /// Clear all counters and start accounting for `date`.
    pub fn reset(&mut self, date: NaiveDate) {
        info!(
            previous_date = %self.ledger_date,
            new_date = %date,
            calls = self.calls_today,
            tickers = self.call_count_today.len(),
            "Resetting scan budget ledger"
        );
        self.ledger_date = date;
        self.calls_today = 0;
        self.calls_by_window.clear();
        self.last_call_at.clear();
        self.call_count_today.clear();
    }

    /// Reset if the exchange-local date moved on. Idempotent and cheap.
    pub fn roll_over(&mut self, now: DateTime<Utc>) -> bool {
        let today = self.calendar.local_date(now);
        if today != self.ledger_date {
            self.reset(today);
            return true;
        }
        false
    }

    /// Full admission check with the reason for any rejection.
    pub fn check(
        &mut self,
        symbol: &str,
        priority: TickerPriority,
        force_scan: bool,
    ) -> Result<(), Denial> {
        let now = self.clock.now();
        self.roll_over(now);

        // Never bypassed, not even by discovery scans
        if self.calls_today >= self.config.daily_limit {
            return Err(Denial::BudgetExhausted {
                scope: BudgetScope::Daily,
            });
        }

        let window = self.schedule.window_at(self.calendar.local_time(now));
        let budget = self.schedule.budget(window);
        let window_used = self.window_used(window);

        if force_scan {
            if window_used >= budget.total {
                return Err(Denial::BudgetExhausted {
                    scope: BudgetScope::Window(window),
                });
            }
            return self.check_ticker_cap(symbol, self.config.force_scan_max_calls_per_ticker);
        }

        if !budget.tier_has_room(priority, window_used) {
            return Err(Denial::BudgetExhausted {
                scope: BudgetScope::Tier(window, priority),
            });
        }

        if let Some(last) = self.last_call_at.get(symbol) {
            let elapsed = now - *last;
            let in_scan_window =
                elapsed < Duration::seconds(self.config.scan_window_seconds as i64);
            let cooldown = Duration::seconds(self.config.cooldown_secs.get(priority) as i64);
            if !in_scan_window && elapsed < cooldown {
                return Err(Denial::CooldownActive {
                    remaining_secs: (cooldown - elapsed).num_seconds().max(1),
                });
            }
        }

        self.check_ticker_cap(symbol, self.config.max_calls_per_ticker.get(priority))
    }

    fn check_ticker_cap(&self, symbol: &str, cap: u32) -> Result<(), Denial> {
        let calls = self.ticker_calls(symbol);
        if calls >= cap {
            return Err(Denial::TickerCapReached { calls, cap });
        }
        Ok(())
    }

    /// Boolean form of [`BudgetLedger::check`].
    pub fn can_call(&mut self, symbol: &str, priority: TickerPriority, force_scan: bool) -> bool {
        match self.check(symbol, priority, force_scan) {
            Ok(()) => true,
            Err(denial) => {
                debug!(symbol = %symbol, %priority, force_scan, %denial, "Scan denied");
                false
            }
        }
    }

    /// Account for `calls` issued calls. Trusts the caller: no admission check.
    pub fn record(&mut self, symbol: &str, calls: u32) -> Result<(), BudgetError> {
        if symbol.is_empty() {
            return Err(BudgetError::EmptySymbol);
        }
        if calls == 0 {
            return Err(BudgetError::ZeroCalls);
        }

        let now = self.clock.now();
        self.roll_over(now);
        let window = self.schedule.window_at(self.calendar.local_time(now));

        let overflow = || BudgetError::CountOverflow {
            symbol: symbol.to_string(),
            calls,
        };
        let calls_today = self.calls_today.checked_add(calls).ok_or_else(overflow)?;
        let window_calls = self
            .window_used(window)
            .checked_add(calls)
            .ok_or_else(overflow)?;
        let ticker_calls = self
            .ticker_calls(symbol)
            .checked_add(calls)
            .ok_or_else(overflow)?;

        self.calls_today = calls_today;
        self.calls_by_window.insert(window, window_calls);
        self.call_count_today.insert(symbol.to_string(), ticker_calls);
        self.last_call_at.insert(symbol.to_string(), now);

        if self.calls_today > self.config.daily_limit {
            warn!(
                symbol = %symbol,
                calls_today = self.calls_today,
                daily_limit = self.config.daily_limit,
                "Recorded calls beyond the daily limit"
            );
        }

        Ok(())
    }

    /// True when the ledger still describes a previous local date.
    fn is_stale(&self) -> bool {
        self.calendar.local_date(self.clock.now()) != self.ledger_date
    }

    pub fn remaining_daily(&self) -> u32 {
        if self.is_stale() {
            return self.config.daily_limit;
        }
        self.config.daily_limit.saturating_sub(self.calls_today)
    }

    /// Snapshot for observability. Does not roll the ledger over.
    pub fn status(&self) -> BudgetStatus {
        let now = self.clock.now();
        let current_window = self.schedule.window_at(self.calendar.local_time(now));
        let stale = self.is_stale();
        BudgetStatus {
            date: self.calendar.local_date(now),
            daily_used: if stale { 0 } else { self.calls_today },
            daily_limit: self.config.daily_limit,
            current_window,
            window_used: if stale { 0 } else { self.window_used(current_window) },
            window_budget: self.schedule.budget(current_window),
            unique_tickers_today: if stale { 0 } else { self.call_count_today.len() },
        }
    }

    pub fn calls_today(&self) -> u32 {
        self.calls_today
    }

    pub fn window_used(&self, window: TimeWindow) -> u32 {
        self.calls_by_window.get(&window).copied().unwrap_or(0)
    }

    pub fn ticker_calls(&self, symbol: &str) -> u32 {
        self.call_count_today.get(symbol).copied().unwrap_or(0)
    }

    pub fn daily_limit(&self) -> u32 {
        self.config.daily_limit
    }

    pub fn ledger_date(&self) -> NaiveDate {
        self.ledger_date
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            date: self.ledger_date,
            calls_today: self.calls_today,
            calls_by_window: self.calls_by_window.iter().map(|(w, c)| (*w, *c)).collect(),
            call_count_today: self
                .call_count_today
                .iter()
                .map(|(s, c)| (s.clone(), *c))
                .collect(),
            last_call_at: self
                .last_call_at
                .iter()
                .map(|(s, t)| (s.clone(), *t))
                .collect(),
        }
    }

    /// Adopt a persisted snapshot if it belongs to today.
    ///
    /// Returns `Ok(false)` for snapshots of another date.
    pub fn restore(&mut self, snapshot: LedgerSnapshot) -> Result<bool, BudgetError> {
        let window_sum = snapshot
            .calls_by_window
            .values()
            .try_fold(0u32, |acc, c| acc.checked_add(*c));
        if window_sum != Some(snapshot.calls_today) {
            let window_sum = window_sum.unwrap_or(u32::MAX);
            return Err(BudgetError::InconsistentSnapshot {
                calls_today: snapshot.calls_today,
                window_sum,
            });
        }

        let today = self.calendar.local_date(self.clock.now());
        if snapshot.date != today {
            debug!(
                snapshot_date = %snapshot.date,
                %today,
                "Ignoring ledger snapshot from another day"
            );
            return Ok(false);
        }

        self.ledger_date = snapshot.date;
        self.calls_today = snapshot.calls_today;
        self.calls_by_window = snapshot.calls_by_window.into_iter().collect();
        self.call_count_today = snapshot.call_count_today.into_iter().collect();
        self.last_call_at = snapshot.last_call_at.into_iter().collect();

        info!(calls_today = self.calls_today, "Restored scan budget ledger");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TierSettings;
    use crate::schedule::{ManualClock, WindowSlot};
    use chrono::{NaiveTime, TimeZone};
    use rust_decimal_macros::dec;

    /// Monday 2025-03-10, 10:30 in New York.
    fn monday_morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 14, 30, 0).unwrap()
    }

    fn single_window(budget: WindowBudget) -> WindowSchedule {
        WindowSchedule::new(vec![WindowSlot::new(
            TimeWindow::Midday,
            NaiveTime::default(),
            budget,
        )])
        .unwrap()
    }

    fn test_config(daily_limit: u32) -> BudgetConfig {
        BudgetConfig {
            daily_limit,
            scan_window_seconds: 60,
            cooldown_secs: TierSettings { p1: 300, p2: 900, p3: 1800 },
            max_calls_per_ticker: TierSettings { p1: 40, p2: 15, p3: 6 },
            force_scan_max_calls_per_ticker: 60,
            ..BudgetConfig::default()
        }
    }

    fn ledger_with(daily_limit: u32, budget: WindowBudget) -> (BudgetLedger, ManualClock) {
        let clock = ManualClock::new(monday_morning());
        let ledger = BudgetLedger::new(
            test_config(daily_limit),
            single_window(budget),
            TradingCalendar::new_york(),
            Arc::new(clock.clone()),
        );
        (ledger, clock)
    }

    fn admit(ledger: &mut BudgetLedger, symbol: &str, priority: TickerPriority) -> bool {
        if ledger.can_call(symbol, priority, false) {
            ledger.record(symbol, 1).unwrap();
            true
        } else {
            false
        }
    }

    #[test]
    fn test_window_tier_scenario() {
        let (mut ledger, _clock) =
            ledger_with(100, WindowBudget::new(20, dec!(0.6), dec!(0.3), dec!(0.1)));

        for i in 0..12 {
            assert!(admit(&mut ledger, &format!("P1_{i}"), TickerPriority::P1));
        }
        assert_eq!(
            ledger.check("P1_X", TickerPriority::P1, false),
            Err(Denial::BudgetExhausted {
                scope: BudgetScope::Tier(TimeWindow::Midday, TickerPriority::P1),
            })
        );

        for i in 0..6 {
            assert!(admit(&mut ledger, &format!("P2_{i}"), TickerPriority::P2));
        }

        assert!(admit(&mut ledger, "P3_0", TickerPriority::P3));
        assert!(admit(&mut ledger, "P3_1", TickerPriority::P3));
        assert!(!admit(&mut ledger, "P3_2", TickerPriority::P3));
        assert_eq!(ledger.calls_today(), 20);
    }

    #[test]
    fn test_tier_fairness_after_p1_saturates() {
        let (mut ledger, _clock) =
            ledger_with(1000, WindowBudget::new(100, dec!(0.6), dec!(0.3), dec!(0.1)));

        for i in 0..60 {
            assert!(admit(&mut ledger, &format!("A{i}"), TickerPriority::P1));
        }
        assert!(!ledger.can_call("A_NEXT", TickerPriority::P1, false));

        // P2 still gets its 30 even though usage already exceeds 60%
        for i in 0..30 {
            assert!(admit(&mut ledger, &format!("B{i}"), TickerPriority::P2));
        }
        assert!(!ledger.can_call("B_NEXT", TickerPriority::P2, false));

        for i in 0..10 {
            assert!(admit(&mut ledger, &format!("C{i}"), TickerPriority::P3));
        }
        assert!(!ledger.can_call("C_NEXT", TickerPriority::P3, false));
    }

    #[test]
    fn test_daily_cap_is_never_exceeded() {
        let (mut ledger, clock) =
            ledger_with(25, WindowBudget::new(1000, dec!(1), dec!(1), dec!(1)));

        for i in 0..200 {
            let symbol = format!("S{}", i % 50);
            let priority = TickerPriority::ALL[i % 3];
            let force = i % 7 == 0;
            if ledger.can_call(&symbol, priority, force) {
                ledger.record(&symbol, 1).unwrap();
            }
            clock.advance(Duration::seconds(20));
            assert!(ledger.calls_today() <= 25);
        }

        assert_eq!(ledger.calls_today(), 25);
        for priority in TickerPriority::ALL {
            assert!(!ledger.can_call("FRESH", priority, false));
            assert!(!ledger.can_call("FRESH", priority, true));
        }
    }

    #[test]
    fn test_window_accounting_matches_daily_total() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap());
        let mut ledger = BudgetLedger::new(
            test_config(10_000),
            WindowSchedule::default(),
            TradingCalendar::new_york(),
            Arc::new(clock.clone()),
        );

        // 08:00 local through 17:20 local, crossing several windows
        for i in 0..40 {
            ledger.record(&format!("T{}", i % 9), 1 + (i % 3)).unwrap();
            clock.advance(Duration::minutes(14));
        }

        let snapshot = ledger.snapshot();
        let window_sum: u32 = snapshot.calls_by_window.values().sum();
        assert_eq!(window_sum, ledger.calls_today());
        assert!(snapshot.calls_by_window.len() > 3);
    }

    #[test]
    fn test_cooldown_outside_scan_window() {
        let (mut ledger, clock) =
            ledger_with(100, WindowBudget::new(100, dec!(1), dec!(1), dec!(1)));

        assert!(admit(&mut ledger, "AAPL", TickerPriority::P1));

        // Inside the scan-window grace period a second call is fine
        clock.advance(Duration::seconds(30));
        assert!(ledger.can_call("AAPL", TickerPriority::P1, false));

        // Past the grace period but within the 5 minute P1 cooldown
        clock.advance(Duration::seconds(90));
        assert!(matches!(
            ledger.check("AAPL", TickerPriority::P1, false),
            Err(Denial::CooldownActive { .. })
        ));

        clock.advance(Duration::minutes(4));
        assert!(ledger.can_call("AAPL", TickerPriority::P1, false));
    }

    #[test]
    fn test_cooldown_depends_on_priority() {
        let (mut ledger, clock) =
            ledger_with(100, WindowBudget::new(100, dec!(1), dec!(1), dec!(1)));

        ledger.record("MSFT", 1).unwrap();
        clock.advance(Duration::minutes(10));

        assert!(ledger.can_call("MSFT", TickerPriority::P1, false));
        assert!(!ledger.can_call("MSFT", TickerPriority::P2, false));
        assert!(!ledger.can_call("MSFT", TickerPriority::P3, false));
    }

    #[test]
    fn test_force_scan_bypasses_tier_buckets_and_cooldown() {
        let (mut ledger, clock) =
            ledger_with(100, WindowBudget::new(20, dec!(0.25), dec!(0.25), dec!(0.25)));

        for i in 0..15 {
            ledger.record(&format!("X{i}"), 1).unwrap();
        }
        for priority in TickerPriority::ALL {
            assert!(!ledger.can_call("NEW", priority, false));
        }
        assert!(ledger.can_call("NEW", TickerPriority::P3, true));

        // Cooldown is ignored too
        clock.advance(Duration::minutes(2));
        assert!(ledger.can_call("X0", TickerPriority::P3, true));

        // Window total still applies
        ledger.record("X0", 5).unwrap();
        assert_eq!(
            ledger.check("NEW", TickerPriority::P1, true),
            Err(Denial::BudgetExhausted {
                scope: BudgetScope::Window(TimeWindow::Midday),
            })
        );
    }

    #[test]
    fn test_force_scan_respects_daily_cap() {
        let (mut ledger, _clock) =
            ledger_with(10, WindowBudget::new(100, dec!(0.5), dec!(0.5), dec!(0.5)));
        ledger.record("SPY", 10).unwrap();
        assert_eq!(
            ledger.check("QQQ", TickerPriority::P1, true),
            Err(Denial::BudgetExhausted {
                scope: BudgetScope::Daily,
            })
        );
    }

    #[test]
    fn test_ticker_cap_normal_and_relaxed() {
        let (mut ledger, _clock) =
            ledger_with(1000, WindowBudget::new(1000, dec!(1), dec!(1), dec!(1)));

        ledger.record("TSLA", 6).unwrap();
        assert_eq!(
            ledger.check("TSLA", TickerPriority::P3, false),
            Err(Denial::TickerCapReached { calls: 6, cap: 6 })
        );
        assert!(ledger.can_call("TSLA", TickerPriority::P2, false));
        assert!(ledger.can_call("TSLA", TickerPriority::P3, true));

        ledger.record("TSLA", 54).unwrap();
        assert!(!ledger.can_call("TSLA", TickerPriority::P3, true));
    }

    #[test]
    fn test_rollover_at_local_midnight() {
        let (mut ledger, clock) =
            ledger_with(5, WindowBudget::new(100, dec!(1), dec!(1), dec!(1)));
        ledger.record("SPY", 5).unwrap();
        assert!(!ledger.can_call("SPY", TickerPriority::P1, false));
        assert_eq!(ledger.remaining_daily(), 0);

        // 23:59 New York, still the same day
        clock.set(Utc.with_ymd_and_hms(2025, 3, 11, 3, 59, 0).unwrap());
        assert!(!ledger.can_call("SPY", TickerPriority::P1, false));

        clock.advance(Duration::minutes(2));
        assert_eq!(ledger.remaining_daily(), 5);
        assert_eq!(ledger.status().daily_used, 0);
        assert!(ledger.can_call("SPY", TickerPriority::P1, false));
        assert_eq!(ledger.calls_today(), 0);
        assert!(!ledger.roll_over(clock.now()));
    }

    #[test]
    fn test_record_rejects_contract_violations() {
        let (mut ledger, _clock) =
            ledger_with(5, WindowBudget::new(100, dec!(1), dec!(1), dec!(1)));
        assert_eq!(ledger.record("", 1), Err(BudgetError::EmptySymbol));
        assert_eq!(ledger.record("SPY", 0), Err(BudgetError::ZeroCalls));
        assert_eq!(ledger.calls_today(), 0);
    }

    #[test]
    fn test_record_overflow_leaves_counters_untouched() {
        let (mut ledger, _clock) =
            ledger_with(5, WindowBudget::new(100, dec!(1), dec!(1), dec!(1)));
        ledger.record("A", 1).unwrap();

        assert_eq!(
            ledger.record("B", u32::MAX),
            Err(BudgetError::CountOverflow {
                symbol: "B".to_string(),
                calls: u32::MAX,
            })
        );
        assert_eq!(ledger.calls_today(), 1);
        assert_eq!(ledger.window_used(TimeWindow::Midday), 1);
        assert_eq!(ledger.ticker_calls("B"), 0);
        assert_eq!(ledger.snapshot().last_call_at.len(), 1);
    }

    #[test]
    fn test_status_snapshot() {
        let (mut ledger, _clock) =
            ledger_with(100, WindowBudget::new(20, dec!(0.6), dec!(0.3), dec!(0.1)));
        ledger.record("SPY", 2).unwrap();
        ledger.record("QQQ", 1).unwrap();

        let status = ledger.status();
        assert_eq!(status.daily_used, 3);
        assert_eq!(status.daily_limit, 100);
        assert_eq!(status.current_window, TimeWindow::Midday);
        assert_eq!(status.window_used, 3);
        assert_eq!(status.window_budget.total, 20);
        assert_eq!(status.unique_tickers_today, 2);
        assert!((status.usage_ratio() - 0.03).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_restore_same_day_only() {
        let (mut ledger, clock) =
            ledger_with(100, WindowBudget::new(100, dec!(1), dec!(1), dec!(1)));
        ledger.record("SPY", 4).unwrap();
        let snapshot = ledger.snapshot();

        let (mut fresh, fresh_clock) =
            ledger_with(100, WindowBudget::new(100, dec!(1), dec!(1), dec!(1)));
        fresh_clock.set(clock.now());
        assert!(fresh.restore(snapshot.clone()).unwrap());
        assert_eq!(fresh.calls_today(), 4);
        assert_eq!(fresh.ticker_calls("SPY"), 4);

        let (mut tomorrow, tomorrow_clock) =
            ledger_with(100, WindowBudget::new(100, dec!(1), dec!(1), dec!(1)));
        tomorrow_clock.advance(Duration::days(1));
        assert!(!tomorrow.restore(snapshot).unwrap());
        assert_eq!(tomorrow.calls_today(), 0);
    }

    #[test]
    fn test_restore_rejects_inconsistent_snapshot() {
        let (mut ledger, _clock) =
            ledger_with(100, WindowBudget::new(100, dec!(1), dec!(1), dec!(1)));
        let mut snapshot = ledger.snapshot();
        snapshot.calls_today = 7;
        assert_eq!(
            ledger.restore(snapshot),
            Err(BudgetError::InconsistentSnapshot {
                calls_today: 7,
                window_sum: 0,
            })
        );
    }
}
