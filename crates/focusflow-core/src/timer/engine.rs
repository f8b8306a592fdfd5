//! Timer engine implementation.
//!
//! The timer engine is a countdown state machine. It does not use internal
//! threads - the caller is responsible for calling `tick()` once per second
//! while the timer runs (see [`TimerController`](super::TimerController)).
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//! Running -> Completed -> (advance_phase) -> Idle
//! any -> (reset) -> Idle
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(settings);
//! engine.start();
//! // Once per second:
//! for event in engine.tick() { /* PhaseCompleted when the countdown ends */ }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::phase::Phase;
use crate::error::ValidationError;
use crate::events::Event;
use crate::storage::sessions::validate_task_label;
use crate::storage::{SessionDraft, Settings};

/// Work phases between long breaks unless configured otherwise.
pub const DEFAULT_LONG_BREAK_INTERVAL: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
    /// Countdown reached zero; waiting for `advance_phase`.
    Completed,
}

/// In-flight session. Lives only in memory until the countdown ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSession {
    pub started_at: DateTime<Utc>,
    pub phase: Phase,
    /// Planned minutes, snapshot of the settings at start.
    pub duration_min: u32,
    pub task_label: Option<String>,
}

/// Core timer engine.
#[derive(Debug, Clone)]
pub struct TimerEngine {
    settings: Settings,
    long_break_interval: u32,
    phase: Phase,
    status: TimerStatus,
    remaining_secs: u64,
    /// Fixed when the phase is armed; later settings changes leave it alone.
    planned_secs: u64,
    active: Option<ActiveSession>,
    /// Session finalized by the last completion, cleared on advance.
    finished: Option<SessionDraft>,
    completed_work: u32,
    task_label: Option<String>,
}

impl TimerEngine {
    /// Create an idle engine at the start of a work phase.
    pub fn new(settings: Settings) -> Self {
        let planned_secs = settings.duration_secs(Phase::Work);
        Self {
            settings,
            long_break_interval: DEFAULT_LONG_BREAK_INTERVAL,
            phase: Phase::Work,
            status: TimerStatus::Idle,
            remaining_secs: planned_secs,
            planned_secs,
            active: None,
            finished: None,
            completed_work: 0,
            task_label: None,
        }
    }

    pub fn with_long_break_interval(mut self, interval: u32) -> Self {
        self.long_break_interval = interval.max(1);
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn status(&self) -> TimerStatus {
        self.status
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn planned_secs(&self) -> u64 {
        self.planned_secs
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Work phases completed by this engine.
    pub fn completed_work(&self) -> u32 {
        self.completed_work
    }

    pub fn active_session(&self) -> Option<&ActiveSession> {
        self.active.as_ref()
    }

    pub fn finished_session(&self) -> Option<&SessionDraft> {
        self.finished.as_ref()
    }

    pub fn task_label(&self) -> Option<&str> {
        self.task_label.as_deref()
    }

    /// 0.0 ..= 100.0 progress within the current phase.
    pub fn progress_pct(&self) -> f64 {
        if self.planned_secs == 0 {
            return 0.0;
        }
        let elapsed = self.planned_secs.saturating_sub(self.remaining_secs);
        elapsed as f64 / self.planned_secs as f64 * 100.0
    }

    /// Remaining time as `MM:SS`.
    pub fn clock(&self) -> String {
        format_clock(self.remaining_secs)
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            status: self.status,
            phase: self.phase,
            remaining_secs: self.remaining_secs,
            total_secs: self.planned_secs,
            progress_pct: self.progress_pct(),
            completed_work: self.completed_work,
            task_label: self.task_label.clone(),
            at: Utc::now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin the armed phase, or continue a paused one.
    pub fn start(&mut self) -> Option<Event> {
        match self.status {
            TimerStatus::Idle => {
                self.arm(self.phase);
                let task_label = if self.phase.is_work() {
                    self.task_label.clone()
                } else {
                    None
                };
                self.active = Some(ActiveSession {
                    started_at: Utc::now(),
                    phase: self.phase,
                    duration_min: self.settings.duration_min(self.phase),
                    task_label: task_label.clone(),
                });
                self.status = TimerStatus::Running;
                tracing::debug!(phase = %self.phase, secs = self.planned_secs, "timer started");
                Some(Event::TimerStarted {
                    phase: self.phase,
                    duration_secs: self.planned_secs,
                    task_label,
                    at: Utc::now(),
                })
            }
            TimerStatus::Paused => self.resume(),
            TimerStatus::Running | TimerStatus::Completed => None,
        }
    }

    pub fn pause(&mut self) -> Option<Event> {
        match self.status {
            TimerStatus::Running => {
                self.status = TimerStatus::Paused;
                Some(Event::TimerPaused {
                    remaining_secs: self.remaining_secs,
                    at: Utc::now(),
                })
            }
            _ => None,
        }
    }

    pub fn resume(&mut self) -> Option<Event> {
        match self.status {
            TimerStatus::Paused => {
                self.status = TimerStatus::Running;
                Some(Event::TimerResumed {
                    remaining_secs: self.remaining_secs,
                    at: Utc::now(),
                })
            }
            _ => None,
        }
    }

    /// Play/pause command.
    pub fn toggle(&mut self) -> Option<Event> {
        match self.status {
            TimerStatus::Running => self.pause(),
            TimerStatus::Idle | TimerStatus::Paused => self.start(),
            TimerStatus::Completed => None,
        }
    }

    /// Back to idle on the current phase, dropping any in-flight session.
    pub fn reset(&mut self) -> Event {
        let discarded = self.active.take();
        self.finished = None;
        self.status = TimerStatus::Idle;
        self.arm(self.phase);
        if discarded.is_some() {
            tracing::debug!(phase = %self.phase, "in-flight session discarded");
        }
        Event::TimerReset {
            phase: self.phase,
            remaining_secs: self.remaining_secs,
            discarded_session: discarded.is_some(),
            at: Utc::now(),
        }
    }

    /// Advance the countdown by one second.
    ///
    /// Returns nothing unless running. When the countdown hits zero the
    /// completion transition happens within this call and a
    /// `PhaseCompleted` event follows the final `Tick`.
    pub fn tick(&mut self) -> Vec<Event> {
        if self.status != TimerStatus::Running {
            return Vec::new();
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        let mut events = vec![Event::Tick {
            remaining_secs: self.remaining_secs,
            progress_pct: self.progress_pct(),
        }];
        if self.remaining_secs == 0 {
            events.push(self.complete());
        }
        events
    }

    /// Move from a completed phase to the next one, left idle.
    pub fn advance_phase(&mut self) -> Option<Event> {
        if self.status != TimerStatus::Completed {
            return None;
        }
        let from = self.phase;
        let to = from.next(self.completed_work, self.long_break_interval);
        self.phase = to;
        self.status = TimerStatus::Idle;
        self.finished = None;
        self.arm(to);
        Some(Event::PhaseAdvanced {
            from,
            to,
            duration_secs: self.planned_secs,
            at: Utc::now(),
        })
    }

    /// Adopt new settings.
    ///
    /// Durations apply to phases armed from now on. An idle timer is
    /// re-armed immediately; a running or paused one keeps its planned total.
    pub fn apply_settings(&mut self, settings: Settings) {
        self.settings = settings;
        if self.status == TimerStatus::Idle {
            self.arm(self.phase);
        }
    }

    /// Name the task for the current or next work session.
    pub fn label_task(&mut self, raw: &str) -> Result<String, ValidationError> {
        let label = validate_task_label(raw)?;
        if let Some(active) = self.active.as_mut().filter(|a| a.phase.is_work()) {
            active.task_label = Some(label.clone());
        }
        self.task_label = Some(label.clone());
        Ok(label)
    }

    pub fn clear_task_label(&mut self) {
        self.task_label = None;
        if let Some(active) = self.active.as_mut() {
            active.task_label = None;
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn arm(&mut self, phase: Phase) {
        self.planned_secs = self.settings.duration_secs(phase);
        self.remaining_secs = self.planned_secs;
    }

    fn complete(&mut self) -> Event {
        let now = Utc::now();
        let phase = self.phase;
        self.status = TimerStatus::Completed;

        let active = self.active.take().unwrap_or_else(|| ActiveSession {
            started_at: now - chrono::Duration::seconds(self.planned_secs as i64),
            phase,
            duration_min: (self.planned_secs / 60) as u32,
            task_label: None,
        });
        let session = SessionDraft::finished(
            phase,
            active.duration_min,
            active.started_at,
            now,
            active.task_label,
        );
        self.finished = Some(session.clone());

        if phase.is_work() {
            self.completed_work += 1;
        }
        let next_phase = phase.next(self.completed_work, self.long_break_interval);
        tracing::info!(phase = %phase, next = %next_phase, "phase completed");

        Event::PhaseCompleted {
            phase,
            message: phase.completion_message().to_string(),
            session,
            next_phase,
            auto_start: self.settings.auto_start_after(phase),
            at: now,
        }
    }
}

/// Format seconds as zero-padded `MM:SS`. Minutes are not capped at 59.
pub fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn quick_settings() -> Settings {
        Settings {
            work_duration: 1,
            short_break_duration: 1,
            long_break_duration: 2,
            ..Settings::default()
        }
    }

    fn run_out(engine: &mut TimerEngine) -> Vec<Event> {
        let mut all = Vec::new();
        while engine.status() == TimerStatus::Running {
            all.extend(engine.tick());
        }
        all
    }

    #[test]
    fn start_pause_resume() {
        let mut engine = TimerEngine::new(Settings::default());
        assert_eq!(engine.status(), TimerStatus::Idle);

        assert!(engine.start().is_some());
        assert_eq!(engine.status(), TimerStatus::Running);

        assert!(engine.pause().is_some());
        assert_eq!(engine.status(), TimerStatus::Paused);

        assert!(engine.resume().is_some());
        assert_eq!(engine.status(), TimerStatus::Running);
    }

    #[test]
    fn invalid_transitions_are_ignored() {
        let mut engine = TimerEngine::new(Settings::default());
        assert!(engine.pause().is_none());
        assert!(engine.resume().is_none());
        assert!(engine.advance_phase().is_none());

        engine.start();
        assert!(engine.start().is_none());
        assert!(engine.resume().is_none());
    }

    #[test]
    fn start_from_paused_keeps_session_and_time() {
        let mut engine = TimerEngine::new(Settings::default());
        engine.start();
        engine.tick();
        engine.tick();
        let started = engine.active_session().cloned();
        engine.pause();

        assert!(matches!(engine.start(), Some(Event::TimerResumed { .. })));
        assert_eq!(engine.remaining_secs(), 25 * 60 - 2);
        assert_eq!(engine.active_session().cloned(), started);
    }

    #[test]
    fn toggle_maps_to_play_pause() {
        let mut engine = TimerEngine::new(Settings::default());
        assert!(matches!(engine.toggle(), Some(Event::TimerStarted { .. })));
        assert!(matches!(engine.toggle(), Some(Event::TimerPaused { .. })));
        assert!(matches!(engine.toggle(), Some(Event::TimerResumed { .. })));
    }

    #[test]
    fn start_captures_session_draft() {
        let mut engine = TimerEngine::new(Settings::default());
        let before = Utc::now();
        engine.start();

        let active = engine.active_session().unwrap();
        assert_eq!(active.phase, Phase::Work);
        assert_eq!(active.duration_min, 25);
        assert!(active.started_at >= before);
        assert!(active.task_label.is_none());
    }

    #[test]
    fn tick_only_counts_while_running() {
        let mut engine = TimerEngine::new(Settings::default());
        assert!(engine.tick().is_empty());
        assert_eq!(engine.remaining_secs(), 1500);

        engine.start();
        engine.tick();
        assert_eq!(engine.remaining_secs(), 1499);

        engine.pause();
        assert!(engine.tick().is_empty());
        assert_eq!(engine.remaining_secs(), 1499);
    }

    #[test]
    fn full_work_phase_completes_with_finished_session() {
        let mut engine = TimerEngine::new(Settings::default());
        engine.start();
        for _ in 0..1499 {
            engine.tick();
        }
        assert_eq!(engine.status(), TimerStatus::Running);

        let events = engine.tick();
        assert_eq!(engine.status(), TimerStatus::Completed);
        assert_eq!(engine.remaining_secs(), 0);
        assert_eq!(engine.completed_work(), 1);
        assert!(engine.active_session().is_none());

        match &events[..] {
            [Event::Tick {
                remaining_secs: 0,
                progress_pct,
            }, Event::PhaseCompleted {
                phase,
                message,
                session,
                next_phase,
                auto_start,
                ..
            }] => {
                assert_eq!(*progress_pct, 100.0);
                assert_eq!(*phase, Phase::Work);
                assert_eq!(message, "Work session complete! Time for a break.");
                assert_eq!(session.duration, Some(25));
                assert_eq!(session.completed, Some(true));
                assert!(session.end_time >= session.start_time);
                assert_eq!(*next_phase, Phase::Break);
                assert!(!auto_start);
            }
            other => panic!("unexpected events: {other:?}"),
        }
        assert!(engine.finished_session().is_some());
        assert!(engine.tick().is_empty());
    }

    #[test]
    fn break_completion_message() {
        let mut engine = TimerEngine::new(quick_settings());
        engine.start();
        run_out(&mut engine);
        engine.advance_phase();
        engine.start();
        let events = run_out(&mut engine);
        let message = events.iter().find_map(|e| match e {
            Event::PhaseCompleted { message, .. } => Some(message.clone()),
            _ => None,
        });
        assert_eq!(
            message.as_deref(),
            Some("Break complete! Ready for another work session?")
        );
        assert_eq!(engine.completed_work(), 1);
    }

    #[test]
    fn reset_discards_in_flight_session() {
        let mut engine = TimerEngine::new(Settings::default());
        engine.start();
        engine.tick();

        match engine.reset() {
            Event::TimerReset {
                phase,
                remaining_secs,
                discarded_session,
                ..
            } => {
                assert_eq!(phase, Phase::Work);
                assert_eq!(remaining_secs, 1500);
                assert!(discarded_session);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(engine.status(), TimerStatus::Idle);
        assert!(engine.active_session().is_none());
        assert!(engine.finished_session().is_none());
    }

    #[test]
    fn phases_cycle_with_long_break_every_fourth_work() {
        let mut engine = TimerEngine::new(quick_settings());
        let mut visited = Vec::new();
        for _ in 0..8 {
            visited.push(engine.phase());
            engine.start();
            run_out(&mut engine);
            assert_eq!(engine.status(), TimerStatus::Completed);
            engine.advance_phase();
        }
        assert_eq!(
            visited,
            vec![
                Phase::Work,
                Phase::Break,
                Phase::Work,
                Phase::Break,
                Phase::Work,
                Phase::Break,
                Phase::Work,
                Phase::LongBreak,
            ]
        );
        assert_eq!(engine.phase(), Phase::Work);
    }

    #[test]
    fn advance_arms_next_phase_duration() {
        let mut engine = TimerEngine::new(Settings::default());
        engine.start();
        run_out(&mut engine);

        let event = engine.advance_phase().unwrap();
        assert!(matches!(
            event,
            Event::PhaseAdvanced {
                from: Phase::Work,
                to: Phase::Break,
                duration_secs: 300,
                ..
            }
        ));
        assert_eq!(engine.status(), TimerStatus::Idle);
        assert_eq!(engine.remaining_secs(), 300);
        assert!(engine.finished_session().is_none());
    }

    #[test]
    fn settings_change_rearms_idle_timer_only() {
        let mut engine = TimerEngine::new(Settings::default());
        engine.apply_settings(Settings {
            work_duration: 50,
            ..Settings::default()
        });
        assert_eq!(engine.remaining_secs(), 3000);

        engine.start();
        engine.tick();
        engine.apply_settings(Settings {
            work_duration: 10,
            ..Settings::default()
        });
        assert_eq!(engine.planned_secs(), 3000);
        assert_eq!(engine.remaining_secs(), 2999);
        assert_eq!(engine.active_session().unwrap().duration_min, 50);

        engine.reset();
        assert_eq!(engine.remaining_secs(), 600);
    }

    #[test]
    fn task_label_applies_to_work_sessions_only() {
        let mut engine = TimerEngine::new(quick_settings());
        assert!(engine.label_task("   ").is_err());
        assert_eq!(engine.label_task("  Draft chapter 3 ").unwrap(), "Draft chapter 3");

        engine.start();
        assert_eq!(
            engine.active_session().unwrap().task_label.as_deref(),
            Some("Draft chapter 3")
        );
        run_out(&mut engine);
        assert_eq!(
            engine.finished_session().unwrap().task_label.as_deref(),
            Some("Draft chapter 3")
        );

        engine.advance_phase();
        engine.start();
        assert!(engine.active_session().unwrap().task_label.is_none());
    }

    #[test]
    fn label_during_work_updates_active_session() {
        let mut engine = TimerEngine::new(Settings::default());
        engine.start();
        engine.label_task("Review PR").unwrap();
        assert_eq!(
            engine.active_session().unwrap().task_label.as_deref(),
            Some("Review PR")
        );
        engine.clear_task_label();
        assert!(engine.active_session().unwrap().task_label.is_none());
    }

    #[test]
    fn snapshot_returns_valid_event() {
        let engine = TimerEngine::new(Settings::default());
        match engine.snapshot() {
            Event::StateSnapshot {
                status,
                phase,
                remaining_secs,
                total_secs,
                progress_pct,
                ..
            } => {
                assert_eq!(status, TimerStatus::Idle);
                assert_eq!(phase, Phase::Work);
                assert_eq!(remaining_secs, 25 * 60);
                assert_eq!(total_secs, 25 * 60);
                assert_eq!(progress_pct, 0.0);
            }
            other => panic!("Expected StateSnapshot, got {other:?}"),
        }
    }

    #[test]
    fn clock_is_zero_padded_and_uncapped() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(65), "01:05");
        assert_eq!(format_clock(25 * 60), "25:00");
        assert_eq!(format_clock(120 * 60), "120:00");
    }

    proptest! {
        #[test]
        fn progress_is_monotonic_and_ends_at_100(minutes in 1u32..=120) {
            let mut engine = TimerEngine::new(Settings {
                work_duration: minutes,
                ..Settings::default()
            });
            engine.start();
            let mut last = engine.progress_pct();
            prop_assert_eq!(last, 0.0);
            while engine.status() == TimerStatus::Running {
                engine.tick();
                let now = engine.progress_pct();
                prop_assert!(now >= last);
                last = now;
            }
            prop_assert_eq!(engine.remaining_secs(), 0);
            prop_assert_eq!(last, 100.0);
        }
    }
}
