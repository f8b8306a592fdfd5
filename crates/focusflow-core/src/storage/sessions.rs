//! Session log.
//!
//! Only sessions that ran to natural completion are written here; an
//! attempt abandoned with reset never reaches the store.

use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Collection, RecordStore, ID_FIELD};
use crate::error::{CoreError, Result, StorageError, ValidationError};
use crate::timer::Phase;

/// Maximum task label length, in characters.
pub const TASK_LABEL_MAX: usize = 100;

/// Planned length used when a draft does not say otherwise.
pub const DEFAULT_SESSION_MINUTES: u32 = 25;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Planned length in minutes, captured when the session started.
    pub duration: u32,
    #[serde(rename = "type")]
    pub phase: Phase,
    pub completed: bool,
    #[serde(default)]
    pub task_label: Option<String>,
}

impl Session {
    /// Calendar day the session started on, in local time.
    pub fn local_date(&self) -> NaiveDate {
        self.start_time.with_timezone(&Local).date_naive()
    }

    pub fn is_completed_work(&self) -> bool {
        self.completed && self.phase.is_work()
    }

    /// A completed session must carry an end time no earlier than its start.
    pub fn check_completion(&self) -> Result<(), ValidationError> {
        if !self.completed {
            return Ok(());
        }
        match self.end_time {
            None => Err(ValidationError::InvalidValue {
                field: "endTime".into(),
                message: "completed session has no end time".into(),
            }),
            Some(end) if end < self.start_time => Err(ValidationError::InvalidValue {
                field: "endTime".into(),
                message: format!("end {end} precedes start {}", self.start_time),
            }),
            Some(_) => Ok(()),
        }
    }
}

/// Fields supplied when creating a session; anything left `None` takes the
/// store default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDraft {
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default, rename = "type")]
    pub phase: Option<Phase>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub task_label: Option<String>,
}

impl SessionDraft {
    /// Draft for a session that ran out naturally.
    pub fn finished(
        phase: Phase,
        duration: u32,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        task_label: Option<String>,
    ) -> Self {
        Self {
            start_time: Some(start_time),
            end_time: Some(end_time.max(start_time)),
            duration: Some(duration),
            phase: Some(phase),
            completed: Some(true),
            task_label,
        }
    }
}

/// Partial update for an existing session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPatch {
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub task_label: Option<String>,
}

/// Trim and bound a user-supplied task label.
pub fn validate_task_label(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty("taskLabel"));
    }
    if trimmed.chars().count() > TASK_LABEL_MAX {
        return Err(ValidationError::TooLong {
            field: "taskLabel",
            max: TASK_LABEL_MAX,
        });
    }
    Ok(trimmed.to_string())
}

/// Store for session records.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn RecordStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// All sessions in insertion order. Records that no longer decode are
    /// skipped with a warning.
    pub fn list(&self) -> Result<Vec<Session>> {
        let records = self.store.read_records(Collection::Sessions)?;
        Ok(records
            .into_iter()
            .filter_map(|record| match decode(record) {
                Ok(session) => Some(session),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable session record");
                    None
                }
            })
            .collect())
    }

    pub fn get(&self, id: &str) -> Result<Option<Session>> {
        let record = self.store.read_record(Collection::Sessions, id)?;
        Ok(record.map(decode).transpose()?)
    }

    /// Persist a new session. The backend assigns the id.
    pub fn create(&self, draft: SessionDraft) -> Result<Session> {
        let session = Session {
            id: String::new(),
            start_time: draft.start_time.unwrap_or_else(Utc::now),
            end_time: draft.end_time,
            duration: draft.duration.unwrap_or(DEFAULT_SESSION_MINUTES),
            phase: draft.phase.unwrap_or_default(),
            completed: draft.completed.unwrap_or(false),
            task_label: draft.task_label,
        };
        session.check_completion()?;

        let mut record = serde_json::to_value(&session)?;
        if let Value::Object(obj) = &mut record {
            obj.remove(ID_FIELD);
        }
        let stored = decode(self.store.write_record(Collection::Sessions, record)?)?;
        tracing::debug!(id = %stored.id, phase = %stored.phase, "session stored");
        Ok(stored)
    }

    /// Merge `patch` into an existing session.
    ///
    /// # Errors
    /// [`CoreError::NotFound`] when no session has this id.
    pub fn update(&self, id: &str, patch: SessionPatch) -> Result<Session> {
        let mut session = self.get(id)?.ok_or_else(|| CoreError::NotFound {
            collection: Collection::Sessions,
            id: id.to_string(),
        })?;

        if let Some(end_time) = patch.end_time {
            session.end_time = Some(end_time);
        }
        if let Some(completed) = patch.completed {
            session.completed = completed;
        }
        if let Some(label) = patch.task_label {
            session.task_label = Some(label);
        }
        session.check_completion()?;

        let stored = self
            .store
            .write_record(Collection::Sessions, serde_json::to_value(&session)?)?;
        Ok(decode(stored)?)
    }

    /// Remove a session. Returns whether anything was removed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.store.delete_record(Collection::Sessions, id)?)
    }

    /// Completed sessions that started on `date` (local calendar).
    pub fn completed_on(&self, date: NaiveDate) -> Result<Vec<Session>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|s| s.completed && s.local_date() == date)
            .collect())
    }

    /// Completed sessions that started today, evaluated at call time.
    pub fn todays_completed(&self) -> Result<Vec<Session>> {
        self.completed_on(Local::now().date_naive())
    }
}

fn decode(record: Value) -> Result<Session, StorageError> {
    serde_json::from_value(record).map_err(|e| StorageError::Malformed {
        collection: Collection::Sessions,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use chrono::{Duration, TimeZone};

    fn store() -> SessionStore {
        SessionStore::new(Arc::new(Database::open_memory().unwrap()))
    }

    fn local_noon(date: NaiveDate) -> DateTime<Utc> {
        Local
            .from_local_datetime(&date.and_hms_opt(12, 0, 0).unwrap())
            .earliest()
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn create_applies_defaults() {
        let sessions = store();
        let before = Utc::now();
        let s = sessions.create(SessionDraft::default()).unwrap();

        assert!(!s.id.is_empty());
        assert!(s.start_time >= before);
        assert_eq!(s.duration, 25);
        assert_eq!(s.phase, Phase::Work);
        assert!(!s.completed);
        assert!(s.end_time.is_none());
        assert!(s.task_label.is_none());
    }

    #[test]
    fn create_keeps_supplied_fields() {
        let sessions = store();
        let start = Utc::now() - Duration::minutes(5);
        let end = Utc::now();
        let s = sessions
            .create(SessionDraft::finished(
                Phase::Break,
                5,
                start,
                end,
                None,
            ))
            .unwrap();

        assert_eq!(s.phase, Phase::Break);
        assert_eq!(s.duration, 5);
        assert!(s.completed);
        assert_eq!(s.start_time, start);
        assert_eq!(s.end_time, Some(end));
        assert_eq!(sessions.get(&s.id).unwrap(), Some(s));
    }

    #[test]
    fn finished_draft_never_ends_before_it_starts() {
        let start = Utc::now();
        let draft = SessionDraft::finished(Phase::Work, 25, start, start - Duration::seconds(3), None);
        assert_eq!(draft.end_time, Some(start));
    }

    #[test]
    fn completed_without_end_time_is_rejected() {
        let sessions = store();
        let err = sessions
            .create(SessionDraft {
                completed: Some(true),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(sessions.list().unwrap().is_empty());
    }

    #[test]
    fn list_preserves_creation_order() {
        let sessions = store();
        let a = sessions.create(SessionDraft::default()).unwrap();
        let b = sessions.create(SessionDraft::default()).unwrap();
        let c = sessions.create(SessionDraft::default()).unwrap();

        let listed: Vec<String> = sessions.list().unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(listed, vec![a.id.clone(), b.id.clone(), c.id.clone()]);
    }

    #[test]
    fn update_merges_fields() {
        let sessions = store();
        let s = sessions.create(SessionDraft::default()).unwrap();
        let end = s.start_time + Duration::minutes(25);

        let updated = sessions
            .update(
                &s.id,
                SessionPatch {
                    end_time: Some(end),
                    completed: Some(true),
                    task_label: Some("Write report".into()),
                },
            )
            .unwrap();

        assert!(updated.completed);
        assert_eq!(updated.end_time, Some(end));
        assert_eq!(updated.task_label.as_deref(), Some("Write report"));
        assert_eq!(updated.duration, 25);
        assert_eq!(sessions.list().unwrap().len(), 1);
    }

    #[test]
    fn update_unknown_id_is_not_found() {
        let sessions = store();
        let err = sessions.update("missing", SessionPatch::default()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::NotFound {
                collection: Collection::Sessions,
                ..
            }
        ));
    }

    #[test]
    fn delete_reports_whether_removed() {
        let sessions = store();
        let s = sessions.create(SessionDraft::default()).unwrap();
        assert!(sessions.delete(&s.id).unwrap());
        assert!(!sessions.delete(&s.id).unwrap());
        assert!(sessions.get(&s.id).unwrap().is_none());
    }

    #[test]
    fn completed_on_filters_by_local_day_and_completion() {
        let sessions = store();
        let today = Local::now().date_naive();
        let yesterday = today.pred_opt().unwrap();

        let start = local_noon(today);
        sessions
            .create(SessionDraft::finished(Phase::Work, 25, start, start, None))
            .unwrap();
        sessions
            .create(SessionDraft::finished(Phase::Break, 5, start, start, None))
            .unwrap();
        sessions
            .create(SessionDraft {
                start_time: Some(start),
                ..Default::default()
            })
            .unwrap();
        let old = local_noon(yesterday);
        sessions
            .create(SessionDraft::finished(Phase::Work, 25, old, old, None))
            .unwrap();

        assert_eq!(sessions.completed_on(today).unwrap().len(), 2);
        assert_eq!(sessions.completed_on(yesterday).unwrap().len(), 1);
    }

    #[test]
    fn task_labels_are_trimmed_and_bounded() {
        assert_eq!(validate_task_label("  Deep work  ").unwrap(), "Deep work");
        assert_eq!(
            validate_task_label("   "),
            Err(ValidationError::Empty("taskLabel"))
        );
        assert!(validate_task_label(&"x".repeat(100)).is_ok());
        assert_eq!(
            validate_task_label(&"x".repeat(101)),
            Err(ValidationError::TooLong {
                field: "taskLabel",
                max: 100
            })
        );
    }
}
