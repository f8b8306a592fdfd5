//! # FocusFlow Core Library
//!
//! Business logic for the FocusFlow Pomodoro timer. Front ends (the
//! `focusflow` CLI among them) are thin layers over this crate.
//!
//! ## Architecture
//!
//! - **Timer Engine**: a synchronous countdown state machine advanced by
//!   `tick()` once per second
//! - **Timer Controller**: drives the engine from a Tokio ticker, persists
//!   completed sessions and broadcasts [`Event`]s
//! - **Storage**: a [`RecordStore`] abstraction with a SQLite implementation,
//!   plus TOML-based configuration
//! - **Stats**: daily counts and streaks derived from the session log
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`TimerController`]: Async driver and completion pipeline
//! - [`Database`]: SQLite record store
//! - [`SettingsStore`], [`SessionStore`], [`StatsEngine`]: Domain stores
//! - [`Config`]: Application configuration management

pub mod error;
pub mod events;
pub mod stats;
pub mod storage;
pub mod timer;

pub use error::{ConfigError, CoreError, StorageError, ValidationError};
pub use events::Event;
pub use stats::{Stats, StatsEngine};
pub use storage::{
    Collection, Config, Database, RecordStore, Session, SessionDraft, SessionPatch, SessionStore,
    Settings, SettingsPatch, SettingsStore, SoundType,
};
pub use timer::{ControllerOptions, Phase, TimerController, TimerEngine, TimerStatus};
