//! Trading-day windows and their call budgets.
//!
//! The day is described by a sorted table of `(start, window, budget)` slots.
//! A slot covers `[start, next.start)`; the first slot must start at midnight
//! so every local time resolves to exactly one window.

use crate::budget::TickerPriority;
use chrono::NaiveTime;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Named segment of the trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    Overnight,
    PreMarket,
    OpeningRange,
    Morning,
    Midday,
    Afternoon,
    PowerHour,
    AfterHours,
}

impl TimeWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::Overnight => "overnight",
            TimeWindow::PreMarket => "pre_market",
            TimeWindow::OpeningRange => "opening_range",
            TimeWindow::Morning => "morning",
            TimeWindow::Midday => "midday",
            TimeWindow::Afternoon => "afternoon",
            TimeWindow::PowerHour => "power_hour",
            TimeWindow::AfterHours => "after_hours",
        }
    }

    /// Parse the persisted / configured name.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "overnight" => TimeWindow::Overnight,
            "pre_market" => TimeWindow::PreMarket,
            "opening_range" => TimeWindow::OpeningRange,
            "morning" => TimeWindow::Morning,
            "midday" => TimeWindow::Midday,
            "afternoon" => TimeWindow::Afternoon,
            "power_hour" => TimeWindow::PowerHour,
            "after_hours" => TimeWindow::AfterHours,
            _ => return None,
        })
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Call allowance of one window.
///
/// Tier fractions may sum to more than 1.0; the daily cap is the hard stop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowBudget {
    pub total: u32,
    pub p1: Decimal,
    pub p2: Decimal,
    pub p3: Decimal,
}

impl WindowBudget {
    pub fn new(total: u32, p1: Decimal, p2: Decimal, p3: Decimal) -> Self {
        Self { total, p1, p2, p3 }
    }

    /// Tier sub-allowance in calls, rounded down.
    pub fn tier_limit(&self, priority: TickerPriority) -> u32 {
        let fraction = match priority {
            TickerPriority::P1 => self.p1,
            TickerPriority::P2 => self.p2,
            TickerPriority::P3 => self.p3,
        };
        (Decimal::from(self.total) * fraction)
            .floor()
            .to_u32()
            .unwrap_or(0)
    }

    /// Calls a tier has already consumed out of `window_used`.
    ///
    /// Only the window total is tracked, so tiers are attributed in order:
    /// P1 owns the first `p1` calls, P2 the next `p2`, P3 whatever remains.
    pub fn tier_used(&self, priority: TickerPriority, window_used: u32) -> u32 {
        let p1 = self.tier_limit(TickerPriority::P1);
        let p2 = self.tier_limit(TickerPriority::P2);
        match priority {
            TickerPriority::P1 => window_used.min(p1),
            TickerPriority::P2 => window_used.saturating_sub(p1).min(p2),
            TickerPriority::P3 => window_used.saturating_sub(p1).saturating_sub(p2),
        }
    }

    /// Whether the tier still has room in this window.
    pub fn tier_has_room(&self, priority: TickerPriority, window_used: u32) -> bool {
        self.tier_used(priority, window_used) < self.tier_limit(priority)
    }
}

/// One row of the window table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSlot {
    pub window: TimeWindow,
    /// Exchange-local start time, inclusive
    pub start: NaiveTime,
    pub total: u32,
    pub p1: Decimal,
    pub p2: Decimal,
    pub p3: Decimal,
}

impl WindowSlot {
    pub fn new(window: TimeWindow, start: NaiveTime, budget: WindowBudget) -> Self {
        Self {
            window,
            start,
            total: budget.total,
            p1: budget.p1,
            p2: budget.p2,
            p3: budget.p3,
        }
    }

    pub fn budget(&self) -> WindowBudget {
        WindowBudget::new(self.total, self.p1, self.p2, self.p3)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ScheduleError {
    #[error("window table is empty")]
    Empty,
    #[error("first window must start at 00:00:00, found {0}")]
    MissingMidnight(NaiveTime),
    #[error("window {window} starts at {start}, not after the previous window")]
    OutOfOrder { window: TimeWindow, start: NaiveTime },
    #[error("window {0} appears more than once")]
    Duplicate(TimeWindow),
    #[error("window {window} has a tier fraction outside [0, 1]")]
    BadFraction { window: TimeWindow },
}

/// Sorted window table resolved by binary search.
#[derive(Debug, Clone)]
pub struct WindowSchedule {
    slots: Vec<WindowSlot>,
}

impl WindowSchedule {
    pub fn new(slots: Vec<WindowSlot>) -> Result<Self, ScheduleError> {
        let first = slots.first().ok_or(ScheduleError::Empty)?;
        if first.start != NaiveTime::default() {
            return Err(ScheduleError::MissingMidnight(first.start));
        }

        for pair in slots.windows(2) {
            if pair[1].start <= pair[0].start {
                return Err(ScheduleError::OutOfOrder {
                    window: pair[1].window,
                    start: pair[1].start,
                });
            }
        }

        for (i, slot) in slots.iter().enumerate() {
            if slots[..i].iter().any(|s| s.window == slot.window) {
                return Err(ScheduleError::Duplicate(slot.window));
            }
            let in_range = |f: Decimal| f >= Decimal::ZERO && f <= Decimal::ONE;
            if !(in_range(slot.p1) && in_range(slot.p2) && in_range(slot.p3)) {
                return Err(ScheduleError::BadFraction { window: slot.window });
            }
        }

        Ok(Self { slots })
    }

    /// Row covering a local time.
    pub fn slot_at(&self, time: NaiveTime) -> &WindowSlot {
        // slots[0] starts at midnight, so the partition point is never zero
        let idx = self.slots.partition_point(|s| s.start <= time);
        &self.slots[idx.saturating_sub(1)]
    }

    pub fn window_at(&self, time: NaiveTime) -> TimeWindow {
        self.slot_at(time).window
    }

    /// Budget of a window, or an empty budget for windows absent from the table.
    pub fn budget(&self, window: TimeWindow) -> WindowBudget {
        self.slots
            .iter()
            .find(|s| s.window == window)
            .map(WindowSlot::budget)
            .unwrap_or(WindowBudget::new(0, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO))
    }

    pub fn slots(&self) -> &[WindowSlot] {
        &self.slots
    }

    /// Default US-equity table (America/New_York local times).
    pub fn default_slots() -> Vec<WindowSlot> {
        let at = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap_or_default();
        let slot = |window, h, m, total, p1, p2, p3| {
            WindowSlot::new(window, at(h, m), WindowBudget::new(total, p1, p2, p3))
        };
        vec![
            slot(TimeWindow::Overnight, 0, 0, 200, dec!(0.80), dec!(0.20), dec!(0)),
            slot(TimeWindow::PreMarket, 4, 0, 1500, dec!(0.60), dec!(0.30), dec!(0.10)),
            slot(TimeWindow::OpeningRange, 9, 30, 2500, dec!(0.60), dec!(0.30), dec!(0.10)),
            slot(TimeWindow::Morning, 10, 30, 2000, dec!(0.50), dec!(0.35), dec!(0.15)),
            slot(TimeWindow::Midday, 12, 0, 2000, dec!(0.50), dec!(0.30), dec!(0.20)),
            slot(TimeWindow::Afternoon, 14, 0, 2000, dec!(0.55), dec!(0.30), dec!(0.15)),
            slot(TimeWindow::PowerHour, 15, 0, 2500, dec!(0.70), dec!(0.30), dec!(0.10)),
            slot(TimeWindow::AfterHours, 16, 0, 1300, dec!(0.70), dec!(0.30), dec!(0)),
        ]
    }
}

impl Default for WindowSchedule {
    fn default() -> Self {
        Self {
            slots: Self::default_slots(),
        }
    }
}
