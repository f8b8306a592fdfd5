//! Pomodoro timer: the pure state machine, its phases and the async driver.

mod controller;
mod engine;
mod phase;
mod ticker;

pub use controller::{ControllerOptions, TimerController};
pub use engine::{format_clock, ActiveSession, TimerEngine, TimerStatus, DEFAULT_LONG_BREAK_INTERVAL};
pub use phase::Phase;
pub use ticker::Ticker;
