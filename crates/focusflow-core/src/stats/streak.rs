//! Consecutive-day streak calculation.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::storage::Session;

/// Distinct local days holding at least one completed work session.
pub fn active_days<'a>(sessions: impl IntoIterator<Item = &'a Session>) -> BTreeSet<NaiveDate> {
    sessions
        .into_iter()
        .filter(|s| s.is_completed_work())
        .map(Session::local_date)
        .collect()
}

/// Number of consecutive active days ending today, or ending yesterday when
/// today has no activity yet.
///
/// A day that is still in progress does not break a streak; a fully
/// skipped day does.
pub fn current_streak(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    if days.is_empty() {
        return 0;
    }

    let mut cursor = if days.contains(&today) {
        Some(today)
    } else {
        today.pred_opt()
    };

    let mut streak = 0;
    while let Some(day) = cursor.filter(|d| days.contains(d)) {
        streak += 1;
        cursor = day.pred_opt();
    }
    streak
}
