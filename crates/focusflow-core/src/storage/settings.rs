//! User settings: phase durations, auto-start flags and sound preference.
//!
//! Stored as a singleton record in the `settings` collection. The record
//! may be partial; reads always merge it over [`Settings::default`].

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Collection, RecordStore, ID_FIELD};
use crate::error::{Result, ValidationError};
use crate::timer::Phase;

const SETTINGS_ID: &str = "current";

pub const WORK_DURATION_RANGE: RangeInclusive<u32> = 1..=120;
pub const SHORT_BREAK_RANGE: RangeInclusive<u32> = 1..=30;
pub const LONG_BREAK_RANGE: RangeInclusive<u32> = 1..=60;
pub const VOLUME_RANGE: RangeInclusive<u32> = 0..=100;

/// Ambient sound played during a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SoundType {
    #[default]
    None,
    Rain,
    Cafe,
    WhiteNoise,
    Forest,
    Ocean,
}

impl SoundType {
    pub const ALL: [SoundType; 6] = [
        SoundType::None,
        SoundType::Rain,
        SoundType::Cafe,
        SoundType::WhiteNoise,
        SoundType::Forest,
        SoundType::Ocean,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SoundType::None => "none",
            SoundType::Rain => "rain",
            SoundType::Cafe => "cafe",
            SoundType::WhiteNoise => "white-noise",
            SoundType::Forest => "forest",
            SoundType::Ocean => "ocean",
        }
    }
}

impl fmt::Display for SoundType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SoundType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SoundType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "soundType".into(),
                message: format!("unknown sound '{s}'"),
            })
    }
}

/// Full settings record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Minutes.
    pub work_duration: u32,
    pub short_break_duration: u32,
    pub long_break_duration: u32,
    pub auto_start_breaks: bool,
    pub auto_start_pomodoros: bool,
    pub sound_enabled: bool,
    pub sound_type: SoundType,
    pub sound_volume: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            work_duration: 25,
            short_break_duration: 5,
            long_break_duration: 15,
            auto_start_breaks: false,
            auto_start_pomodoros: false,
            sound_enabled: true,
            sound_type: SoundType::None,
            sound_volume: 50,
        }
    }
}

impl Settings {
    /// Configured length of `phase` in minutes.
    pub fn duration_min(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Work => self.work_duration,
            Phase::Break => self.short_break_duration,
            Phase::LongBreak => self.long_break_duration,
        }
    }

    pub fn duration_secs(&self, phase: Phase) -> u64 {
        u64::from(self.duration_min(phase)).saturating_mul(60)
    }

    /// Whether the phase after `completed` should begin on its own.
    pub fn auto_start_after(&self, completed: Phase) -> bool {
        match completed {
            Phase::Work => self.auto_start_breaks,
            Phase::Break | Phase::LongBreak => self.auto_start_pomodoros,
        }
    }

    /// Copy of these settings with every field present in `patch` replaced.
    pub fn merged(&self, patch: &SettingsPatch) -> Settings {
        Settings {
            work_duration: patch.work_duration.unwrap_or(self.work_duration),
            short_break_duration: patch
                .short_break_duration
                .unwrap_or(self.short_break_duration),
            long_break_duration: patch.long_break_duration.unwrap_or(self.long_break_duration),
            auto_start_breaks: patch.auto_start_breaks.unwrap_or(self.auto_start_breaks),
            auto_start_pomodoros: patch
                .auto_start_pomodoros
                .unwrap_or(self.auto_start_pomodoros),
            sound_enabled: patch.sound_enabled.unwrap_or(self.sound_enabled),
            sound_type: patch.sound_type.unwrap_or(self.sound_type),
            sound_volume: patch.sound_volume.unwrap_or(self.sound_volume),
        }
    }
}

/// Partial settings update. Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_break_duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_break_duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_start_breaks: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_start_pomodoros: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound_type: Option<SoundType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound_volume: Option<u32>,
}

impl SettingsPatch {
    /// Select an ambient sound; picking `none` also mutes.
    pub fn sound(kind: SoundType) -> Self {
        Self {
            sound_type: Some(kind),
            sound_enabled: Some(kind != SoundType::None),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Range checks applied at the boundary, before the store sees the patch.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range("workDuration", self.work_duration, &WORK_DURATION_RANGE)?;
        check_range("shortBreakDuration", self.short_break_duration, &SHORT_BREAK_RANGE)?;
        check_range("longBreakDuration", self.long_break_duration, &LONG_BREAK_RANGE)?;
        check_range("soundVolume", self.sound_volume, &VOLUME_RANGE)?;
        Ok(())
    }
}

fn check_range(
    field: &'static str,
    value: Option<u32>,
    range: &RangeInclusive<u32>,
) -> Result<(), ValidationError> {
    match value {
        Some(v) if !range.contains(&v) => Err(ValidationError::OutOfRange {
            field,
            min: *range.start(),
            max: *range.end(),
            value: v,
        }),
        _ => Ok(()),
    }
}

/// Read a stored record one field at a time.
fn decode_stored(record: &Value) -> SettingsPatch {
    if !record.is_object() {
        tracing::warn!(%record, "stored settings unreadable, using defaults");
        return SettingsPatch::default();
    }
    SettingsPatch {
        work_duration: stored_field(record, "workDuration"),
        short_break_duration: stored_field(record, "shortBreakDuration"),
        long_break_duration: stored_field(record, "longBreakDuration"),
        auto_start_breaks: stored_field(record, "autoStartBreaks"),
        auto_start_pomodoros: stored_field(record, "autoStartPomodoros"),
        sound_enabled: stored_field(record, "soundEnabled"),
        sound_type: stored_field(record, "soundType"),
        sound_volume: stored_field(record, "soundVolume"),
    }
}

fn stored_field<T: DeserializeOwned>(record: &Value, key: &'static str) -> Option<T> {
    let value = record.get(key).filter(|v| !v.is_null())?;
    serde_json::from_value(value.clone())
        .map_err(|e| tracing::warn!(field = key, error = %e, "ignoring unreadable stored setting"))
        .ok()
}

/// Store for the singleton settings record.
#[derive(Clone)]
pub struct SettingsStore {
    store: Arc<dyn RecordStore>,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Current settings merged over defaults.
    ///
    /// Creates the default record on first access. Never fails: backend
    /// problems are logged and the defaults are returned. A stored field that
    /// does not decode falls back on its own default.
    pub fn get(&self) -> Settings {
        match self.store.read_record(Collection::Settings, SETTINGS_ID) {
            Ok(Some(record)) => Settings::default().merged(&decode_stored(&record)),
            Ok(None) => {
                let defaults = Settings::default();
                if let Err(e) = self.write(&defaults) {
                    tracing::warn!(error = %e, "failed to create default settings record");
                }
                defaults
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to read settings, using defaults");
                Settings::default()
            }
        }
    }

    /// Merge `patch` over the current settings and persist the result.
    ///
    /// Ranges are not checked here; callers run [`SettingsPatch::validate`]
    /// first.
    pub fn update(&self, patch: &SettingsPatch) -> Result<Settings> {
        let updated = self.get().merged(patch);
        self.write(&updated)?;
        tracing::debug!(?updated, "settings updated");
        Ok(updated)
    }

    /// Restore and persist the defaults.
    pub fn reset(&self) -> Result<Settings> {
        let defaults = Settings::default();
        self.write(&defaults)?;
        Ok(defaults)
    }

    fn write(&self, settings: &Settings) -> Result<()> {
        let mut record = serde_json::to_value(settings)?;
        if let Value::Object(obj) = &mut record {
            obj.insert(ID_FIELD.to_string(), Value::String(SETTINGS_ID.into()));
        }
        self.store.write_record(Collection::Settings, record)?;
        Ok(())
    }
}
