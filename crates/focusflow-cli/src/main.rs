use clap::{Parser, Subcommand};
use focusflow_core::Config;
use tracing_subscriber::EnvFilter;

mod commands;
mod context;

use context::AppContext;

#[derive(Parser)]
#[command(name = "focusflow", version, about = "FocusFlow Pomodoro timer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive timer
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Durations, auto-start and sound preferences
    Settings {
        #[command(subcommand)]
        action: commands::settings::SettingsAction,
    },
    /// Daily goal, completion counts and streak
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// Recorded sessions
    Sessions {
        #[command(subcommand)]
        action: commands::sessions::SessionsAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

/// Log to stderr. `FOCUSFLOW_LOG` wins over the configured filter.
fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_env("FOCUSFLOW_LOG")
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn with_context<F>(config: Config, f: F) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce(&AppContext) -> Result<(), Box<dyn std::error::Error>>,
{
    let ctx = AppContext::open(config)?;
    f(&ctx)
}

fn main() {
    let cli = Cli::parse();
    let config = Config::load_or_default();
    init_tracing(&config);

    let result = match cli.command {
        Commands::Timer { action } => with_context(config, |ctx| commands::timer::run(action, ctx)),
        Commands::Settings { action } => {
            with_context(config, |ctx| commands::settings::run(action, ctx))
        }
        Commands::Stats { action } => with_context(config, |ctx| commands::stats::run(action, ctx)),
        Commands::Sessions { action } => {
            with_context(config, |ctx| commands::sessions::run(action, ctx))
        }
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
