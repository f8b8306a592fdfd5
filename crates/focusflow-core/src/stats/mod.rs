//! Statistics module for FocusFlow
//!
//! Daily completion counts, all-time totals and the consecutive-day streak,
//! all derived from the session log.

mod engine;
mod streak;

pub use engine::{Stats, StatsEngine, DEFAULT_DAILY_GOAL};
pub use streak::{active_days, current_streak};
