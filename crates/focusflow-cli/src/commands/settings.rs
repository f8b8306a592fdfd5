use clap::Subcommand;
use focusflow_core::{SettingsPatch, SoundType};

use crate::context::AppContext;

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print current settings as JSON
    Show,
    /// Change one or more settings
    Set {
        /// Work duration in minutes (1-120)
        #[arg(long)]
        work: Option<u32>,
        /// Short break in minutes (1-30)
        #[arg(long)]
        short_break: Option<u32>,
        /// Long break in minutes (1-60)
        #[arg(long)]
        long_break: Option<u32>,
        /// Start breaks automatically after work
        #[arg(long)]
        auto_start_breaks: Option<bool>,
        /// Start work automatically after breaks
        #[arg(long)]
        auto_start_pomodoros: Option<bool>,
        #[arg(long)]
        sound_enabled: Option<bool>,
        /// Sound volume (0-100)
        #[arg(long)]
        volume: Option<u32>,
    },
    /// Pick the ambient sound; "none" turns sound off
    Sound {
        /// One of: none, rain, cafe, white-noise, forest, ocean
        kind: String,
    },
    /// Restore defaults
    Reset,
}

pub fn run(action: SettingsAction, ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
    let store = ctx.settings();

    let settings = match action {
        SettingsAction::Show => store.get(),
        SettingsAction::Set {
            work,
            short_break,
            long_break,
            auto_start_breaks,
            auto_start_pomodoros,
            sound_enabled,
            volume,
        } => {
            let patch = SettingsPatch {
                work_duration: work,
                short_break_duration: short_break,
                long_break_duration: long_break,
                auto_start_breaks,
                auto_start_pomodoros,
                sound_enabled,
                sound_type: None,
                sound_volume: volume,
            };
            if patch.is_empty() {
                return Err("nothing to change; see `focusflow settings set --help`".into());
            }
            patch.validate()?;
            store.update(&patch)?
        }
        SettingsAction::Sound { kind } => {
            let kind: SoundType = kind.parse()?;
            store.update(&SettingsPatch::sound(kind))?
        }
        SettingsAction::Reset => store.reset()?,
    };

    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}
