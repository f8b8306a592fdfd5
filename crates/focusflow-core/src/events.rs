use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stats::Stats;
use crate::storage::{SessionDraft, Settings};
use crate::timer::{Phase, TimerStatus};

/// Every state change in the system produces an Event.
/// Front ends subscribe to them through the timer controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        phase: Phase,
        duration_secs: u64,
        task_label: Option<String>,
        at: DateTime<Utc>,
    },
    TimerPaused {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// Timer went back to idle. An in-flight session, if any, was dropped.
    TimerReset {
        phase: Phase,
        remaining_secs: u64,
        discarded_session: bool,
        at: DateTime<Utc>,
    },
    Tick {
        remaining_secs: u64,
        progress_pct: f64,
    },
    /// Countdown reached zero. `session` is the finalized record handed to
    /// the session store.
    PhaseCompleted {
        phase: Phase,
        message: String,
        session: SessionDraft,
        next_phase: Phase,
        auto_start: bool,
        at: DateTime<Utc>,
    },
    PhaseAdvanced {
        from: Phase,
        to: Phase,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    StatsChanged {
        stats: Stats,
    },
    SettingsChanged {
        settings: Settings,
    },
    /// A store write failed after a completion. The timer state is kept.
    PersistenceFailed {
        operation: String,
        message: String,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        status: TimerStatus,
        phase: Phase,
        remaining_secs: u64,
        total_secs: u64,
        progress_pct: f64,
        completed_work: u32,
        task_label: Option<String>,
        at: DateTime<Utc>,
    },
}
