pub mod config;
pub mod sessions;
pub mod settings;
pub mod stats;
pub mod timer;
