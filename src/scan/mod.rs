//! Scan planning and execution.
//!
//! - `planner`: classify candidates, filter by budget, order by tier and score
//! - `runner`: execute a plan with bounded concurrency and apply the signals

mod planner;
mod runner;

pub use planner::{PlannedScan, ScanPlanner, ScoreBook};
pub use runner::{PassReport, ScanRunner};
