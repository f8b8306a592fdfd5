//! Daily goal, completion counts and streak.
//!
//! `completed_today`, `total_sessions` and `current_streak` are derived from
//! the session log every time they are computed; the stored stats record
//! is a cache. Only `daily_goal` and `last_completed_date` are trusted from
//! storage, so any drift between the log and the cache heals on the next
//! recompute.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::streak::{active_days, current_streak};
use crate::error::{Result, ValidationError};
use crate::storage::{Collection, RecordStore, SessionStore, ID_FIELD};

const STATS_ID: &str = "current";

pub const DEFAULT_DAILY_GOAL: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Target number of work sessions per day.
    pub daily_goal: u32,
    /// Completed work sessions started today.
    pub completed_today: u32,
    /// Completed work sessions ever.
    pub total_sessions: u32,
    /// Consecutive days with at least one completed work session.
    pub current_streak: u32,
    pub last_completed_date: Option<NaiveDate>,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            daily_goal: DEFAULT_DAILY_GOAL,
            completed_today: 0,
            total_sessions: 0,
            current_streak: 0,
            last_completed_date: None,
        }
    }
}

impl Stats {
    /// Share of the daily goal reached, 0.0 ..= 100.0.
    pub fn goal_progress_pct(&self) -> f64 {
        if self.daily_goal == 0 {
            return 100.0;
        }
        (f64::from(self.completed_today) / f64::from(self.daily_goal) * 100.0).min(100.0)
    }

    pub fn goal_reached(&self) -> bool {
        self.completed_today >= self.daily_goal
    }
}

/// The independently persisted part of the stats record.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedStats {
    #[serde(default = "default_daily_goal")]
    daily_goal: u32,
    #[serde(default)]
    last_completed_date: Option<NaiveDate>,
}

fn default_daily_goal() -> u32 {
    DEFAULT_DAILY_GOAL
}

impl Default for PersistedStats {
    fn default() -> Self {
        Self {
            daily_goal: DEFAULT_DAILY_GOAL,
            last_completed_date: None,
        }
    }
}

/// Derives statistics from the session log.
#[derive(Clone)]
pub struct StatsEngine {
    store: Arc<dyn RecordStore>,
    sessions: SessionStore,
}

impl StatsEngine {
    pub fn new(store: Arc<dyn RecordStore>, sessions: SessionStore) -> Self {
        Self { store, sessions }
    }

    /// Recompute from the session log, persist the snapshot and return it.
    pub fn get(&self) -> Result<Stats> {
        let persisted = self.load_persisted()?;
        let stats = self.compute(persisted, Local::now().date_naive())?;
        self.save(&stats)?;
        Ok(stats)
    }

    /// Record that a work session just completed.
    ///
    /// The session must already be in the log: counts are derived from it
    /// rather than incremented here.
    pub fn increment_completed(&self) -> Result<Stats> {
        let today = Local::now().date_naive();
        let mut persisted = self.load_persisted()?;
        persisted.last_completed_date = Some(today);

        let stats = self.compute(persisted, today)?;
        self.save(&stats)?;
        tracing::info!(
            completed_today = stats.completed_today,
            total = stats.total_sessions,
            streak = stats.current_streak,
            "work session counted"
        );
        Ok(stats)
    }

    /// Set the daily target. Zero is rejected.
    pub fn update_daily_goal(&self, goal: u32) -> Result<Stats> {
        if goal == 0 {
            return Err(ValidationError::OutOfRange {
                field: "dailyGoal",
                min: 1,
                max: u32::MAX,
                value: goal,
            }
            .into());
        }
        let mut persisted = self.load_persisted()?;
        persisted.daily_goal = goal;

        let stats = self.compute(persisted, Local::now().date_naive())?;
        self.save(&stats)?;
        Ok(stats)
    }

    /// Forget the persisted goal and last completion date.
    pub fn reset(&self) -> Result<Stats> {
        self.store.delete_record(Collection::Stats, STATS_ID)?;
        self.get()
    }

    /// Derived stats as of `today`, without touching storage.
    #[cfg(test)]
    fn compute_as_of(&self, today: NaiveDate) -> Result<Stats> {
        let persisted = self.load_persisted()?;
        self.compute(persisted, today)
    }

    fn compute(&self, persisted: PersistedStats, today: NaiveDate) -> Result<Stats> {
        let sessions = self.sessions.list()?;
        let work: Vec<_> = sessions.iter().filter(|s| s.is_completed_work()).collect();

        let completed_today = work.iter().filter(|s| s.local_date() == today).count();
        let streak = current_streak(&active_days(work.iter().copied()), today);

        Ok(Stats {
            daily_goal: persisted.daily_goal,
            completed_today: completed_today as u32,
            total_sessions: work.len() as u32,
            current_streak: streak,
            last_completed_date: persisted.last_completed_date,
        })
    }

    fn load_persisted(&self) -> Result<PersistedStats> {
        let Some(record) = self.store.read_record(Collection::Stats, STATS_ID)? else {
            return Ok(PersistedStats::default());
        };
        Ok(serde_json::from_value(record).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "stored stats unreadable, using defaults");
            PersistedStats::default()
        }))
    }

    fn save(&self, stats: &Stats) -> Result<()> {
        let mut record = serde_json::to_value(stats)?;
        if let Value::Object(obj) = &mut record {
            obj.insert(ID_FIELD.to_string(), Value::String(STATS_ID.into()));
        }
        self.store.write_record(Collection::Stats, record)?;
        Ok(())
    }
}
