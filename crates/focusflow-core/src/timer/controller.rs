//! Drives a [`TimerEngine`] from a 1-second ticker and wires completions to
//! the session and stats stores.
//!
//! All state lives behind one mutex. Commands and tick callbacks lock it,
//! apply a transition and broadcast the resulting events before unlocking,
//! so a pause or reset can never race a tick that was already scheduled:
//! every ticker carries the epoch it was spawned in and gives up once the
//! epoch has moved on.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;

use super::engine::{TimerEngine, TimerStatus};
use super::phase::Phase;
use super::ticker::Ticker;
use crate::error::Result;
use crate::events::Event;
use crate::stats::{Stats, StatsEngine};
use crate::storage::{
    RecordStore, SessionDraft, SessionStore, Settings, SettingsPatch, SettingsStore, TimerConfig,
};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerOptions {
    pub tick_interval: Duration,
    /// Pause between a completion and the automatic start of the next phase.
    pub auto_advance_delay: Duration,
    pub long_break_interval: u32,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self::from(&TimerConfig::default())
    }
}

impl From<&TimerConfig> for ControllerOptions {
    fn from(config: &TimerConfig) -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            auto_advance_delay: config.auto_advance_delay(),
            long_break_interval: config.long_break_interval,
        }
    }
}

struct Shared {
    engine: TimerEngine,
    sessions: SessionStore,
    stats: StatsEngine,
    settings: SettingsStore,
    ticker: Option<Ticker>,
    auto_advance: Option<Ticker>,
    tick_epoch: u64,
    advance_epoch: u64,
}

impl Shared {
    fn stop_ticker(&mut self) {
        self.tick_epoch += 1;
        self.ticker = None;
    }

    fn cancel_auto_advance(&mut self) {
        self.advance_epoch += 1;
        if self.auto_advance.take().is_some() {
            tracing::debug!("pending auto-advance cancelled");
        }
    }
}

/// What ticker callbacks need to reach back into the controller without
/// keeping it alive.
#[derive(Clone)]
struct Link {
    shared: Weak<Mutex<Shared>>,
    events: broadcast::Sender<Event>,
    options: ControllerOptions,
}

impl Link {
    fn emit(&self, event: Event) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Async front of the timer.
///
/// Cheap to clone; clones share the same timer. Commands that start the
/// countdown spawn onto the current Tokio runtime and must be called from
/// within one. Dropping the last clone stops all scheduled work.
#[derive(Clone)]
pub struct TimerController {
    shared: Arc<Mutex<Shared>>,
    link: Link,
}

impl TimerController {
    /// Build a controller over `store`, loading the current settings.
    pub fn new(store: Arc<dyn RecordStore>, options: ControllerOptions) -> Self {
        let sessions = SessionStore::new(store.clone());
        let stats = StatsEngine::new(store.clone(), sessions.clone());
        let settings = SettingsStore::new(store);
        let engine =
            TimerEngine::new(settings.get()).with_long_break_interval(options.long_break_interval);

        let shared = Arc::new(Mutex::new(Shared {
            engine,
            sessions,
            stats,
            settings,
            ticker: None,
            auto_advance: None,
            tick_epoch: 0,
            advance_epoch: 0,
        }));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let link = Link {
            shared: Arc::downgrade(&shared),
            events,
            options,
        };
        Self { shared, link }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.link.events.subscribe()
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Event {
        lock(&self.shared).engine.snapshot()
    }

    pub fn status(&self) -> TimerStatus {
        lock(&self.shared).engine.status()
    }

    pub fn phase(&self) -> Phase {
        lock(&self.shared).engine.phase()
    }

    pub fn remaining_secs(&self) -> u64 {
        lock(&self.shared).engine.remaining_secs()
    }

    pub fn settings(&self) -> Settings {
        lock(&self.shared).engine.settings().clone()
    }

    pub fn sessions(&self) -> SessionStore {
        lock(&self.shared).sessions.clone()
    }

    pub fn stats(&self) -> Result<Stats> {
        lock(&self.shared).stats.get()
    }

    /// Whether an automatic next-phase start is scheduled.
    pub fn auto_advance_pending(&self) -> bool {
        lock(&self.shared)
            .auto_advance
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    // ── Timer commands ───────────────────────────────────────────────

    pub fn start(&self) -> Option<Event> {
        start_locked(&mut lock(&self.shared), &self.link)
    }

    pub fn pause(&self) -> Option<Event> {
        let mut shared = lock(&self.shared);
        let event = shared.engine.pause()?;
        shared.stop_ticker();
        self.link.emit(event.clone());
        Some(event)
    }

    pub fn resume(&self) -> Option<Event> {
        let mut shared = lock(&self.shared);
        let event = shared.engine.resume()?;
        spawn_ticker(&mut shared, &self.link);
        self.link.emit(event.clone());
        Some(event)
    }

    /// Play/pause. On a completed phase this moves on and starts the next one.
    pub fn toggle(&self) -> Option<Event> {
        let mut shared = lock(&self.shared);
        match shared.engine.status() {
            TimerStatus::Running => {
                let event = shared.engine.pause()?;
                shared.stop_ticker();
                self.link.emit(event.clone());
                Some(event)
            }
            TimerStatus::Idle | TimerStatus::Paused => start_locked(&mut shared, &self.link),
            TimerStatus::Completed => {
                advance_locked(&mut shared, &self.link)?;
                start_locked(&mut shared, &self.link)
            }
        }
    }

    pub fn reset(&self) -> Event {
        let mut shared = lock(&self.shared);
        shared.cancel_auto_advance();
        shared.stop_ticker();
        let event = shared.engine.reset();
        self.link.emit(event.clone());
        event
    }

    pub fn advance_phase(&self) -> Option<Event> {
        advance_locked(&mut lock(&self.shared), &self.link)
    }

    /// Name the task for the current or next work session.
    pub fn label_task(&self, label: &str) -> Result<String> {
        Ok(lock(&self.shared).engine.label_task(label)?)
    }

    pub fn clear_task_label(&self) {
        lock(&self.shared).engine.clear_task_label();
    }

    // ── Settings and stats ───────────────────────────────────────────

    /// Validate, persist and apply a settings change.
    ///
    /// New durations take effect immediately when idle, otherwise from the
    /// next phase on.
    pub fn update_settings(&self, patch: &SettingsPatch) -> Result<Settings> {
        patch.validate()?;
        let mut shared = lock(&self.shared);
        let settings = shared.settings.update(patch)?;
        apply_settings(&mut shared, &self.link, settings.clone());
        Ok(settings)
    }

    pub fn reset_settings(&self) -> Result<Settings> {
        let mut shared = lock(&self.shared);
        let settings = shared.settings.reset()?;
        apply_settings(&mut shared, &self.link, settings.clone());
        Ok(settings)
    }

    pub fn update_daily_goal(&self, goal: u32) -> Result<Stats> {
        let shared = lock(&self.shared);
        let stats = shared.stats.update_daily_goal(goal)?;
        self.link.emit(Event::StatsChanged {
            stats: stats.clone(),
        });
        Ok(stats)
    }
}

fn apply_settings(shared: &mut Shared, link: &Link, settings: Settings) {
    shared.engine.apply_settings(settings.clone());
    link.emit(Event::SettingsChanged { settings });
}

fn start_locked(shared: &mut Shared, link: &Link) -> Option<Event> {
    let event = shared.engine.start()?;
    shared.cancel_auto_advance();
    spawn_ticker(shared, link);
    link.emit(event.clone());
    Some(event)
}

fn advance_locked(shared: &mut Shared, link: &Link) -> Option<Event> {
    let event = shared.engine.advance_phase()?;
    shared.cancel_auto_advance();
    link.emit(event.clone());
    Some(event)
}

fn spawn_ticker(shared: &mut Shared, link: &Link) {
    shared.tick_epoch += 1;
    let epoch = shared.tick_epoch;
    let tick_link = link.clone();

    shared.ticker = Some(Ticker::repeat(link.options.tick_interval, move || {
        let Some(strong) = tick_link.shared.upgrade() else {
            return ControlFlow::Break(());
        };
        let mut shared = lock(&strong);
        if shared.tick_epoch != epoch {
            return ControlFlow::Break(());
        }
        on_tick(&mut shared, &tick_link)
    }));
}

fn on_tick(shared: &mut Shared, link: &Link) -> ControlFlow<()> {
    let mut flow = ControlFlow::Continue(());
    for event in shared.engine.tick() {
        let completion = match &event {
            Event::PhaseCompleted {
                phase,
                session,
                auto_start,
                ..
            } => Some((*phase, session.clone(), *auto_start)),
            _ => None,
        };
        let Some((phase, session, auto_start)) = completion else {
            link.emit(event);
            continue;
        };

        shared.stop_ticker();
        record_completion(shared, link, phase, session);
        link.emit(event);
        if auto_start {
            schedule_auto_advance(shared, link);
        }
        flow = ControlFlow::Break(());
    }
    flow
}

/// Persist a finished session and refresh stats. Failures are reported but
/// never undo the completion.
fn record_completion(shared: &Shared, link: &Link, phase: Phase, session: SessionDraft) {
    match shared.sessions.create(session) {
        Ok(saved) => tracing::info!(id = %saved.id, phase = %phase, "session recorded"),
        Err(e) => {
            tracing::warn!(error = %e, phase = %phase, "failed to record session");
            link.emit(Event::PersistenceFailed {
                operation: "sessions.create".into(),
                message: e.to_string(),
                at: Utc::now(),
            });
        }
    }

    if !phase.is_work() {
        return;
    }
    match shared.stats.increment_completed() {
        Ok(stats) => link.emit(Event::StatsChanged { stats }),
        Err(e) => {
            tracing::warn!(error = %e, "failed to update stats");
            link.emit(Event::PersistenceFailed {
                operation: "stats.increment_completed".into(),
                message: e.to_string(),
                at: Utc::now(),
            });
        }
    }
}

fn schedule_auto_advance(shared: &mut Shared, link: &Link) {
    shared.advance_epoch += 1;
    let epoch = shared.advance_epoch;
    let advance_link = link.clone();
    tracing::debug!(delay = ?link.options.auto_advance_delay, "auto-advance scheduled");

    shared.auto_advance = Some(Ticker::once(link.options.auto_advance_delay, move || {
        let Some(strong) = advance_link.shared.upgrade() else {
            return;
        };
        let mut shared = lock(&strong);
        if shared.advance_epoch != epoch {
            return;
        }
        if advance_locked(&mut shared, &advance_link).is_some() {
            start_locked(&mut shared, &advance_link);
        }
    }));
}
