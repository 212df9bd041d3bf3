//! Time handling for the scan budget.
//!
//! - `clock`: injectable wall clock
//! - `calendar`: exchange-local dates and trading-day arithmetic
//! - `windows`: the trading-day window table and per-window budgets

mod calendar;
mod clock;
mod windows;

pub use calendar::{nyse_holidays, TradingCalendar};
pub use clock::{Clock, ManualClock, SystemClock};
pub use windows::{ScheduleError, TimeWindow, WindowBudget, WindowSchedule, WindowSlot};
