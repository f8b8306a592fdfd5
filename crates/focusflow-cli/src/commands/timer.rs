use std::io::Write;

use clap::Subcommand;
use focusflow_core::timer::format_clock;
use focusflow_core::{ControllerOptions, Event, TimerController, TimerStatus};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::context::AppContext;

#[derive(Subcommand)]
pub enum TimerAction {
    /// Run the timer in the foreground, reading commands from stdin
    Run {
        /// Label for the work sessions of this run
        #[arg(long)]
        task: Option<String>,
    },
}

const HELP: &str = "\
commands:
  p, <enter>   start / pause / resume
  r            reset the current phase
  n            move on to the next phase
  t <label>    name the task (t alone clears it)
  s            show status
  h            this help
  q            quit";

enum Flow {
    Continue,
    Quit,
}

pub fn run(action: TimerAction, ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        TimerAction::Run { task } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(run_interactive(ctx, task))
        }
    }
}

async fn run_interactive(
    ctx: &AppContext,
    task: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let timer = TimerController::new(
        ctx.store.clone(),
        ControllerOptions::from(&ctx.config.timer),
    );
    if let Some(task) = task {
        timer.label_task(&task)?;
    }

    let mut events = timer.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut confirm_reset = false;

    println!("{HELP}");
    print_status(&timer);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if let Flow::Quit = handle_line(&timer, line.trim(), &mut confirm_reset) {
                    break;
                }
            }
            event = events.recv() => match event {
                Ok(event) => render(&event, ctx.config.timer.auto_advance_delay_secs),
                Err(RecvError::Lagged(skipped)) => tracing::debug!(skipped, "display fell behind"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    while let Ok(event) = events.try_recv() {
        render(&event, ctx.config.timer.auto_advance_delay_secs);
    }
    if matches!(timer.status(), TimerStatus::Running | TimerStatus::Paused) {
        timer.reset();
        println!("\nunfinished session discarded");
    }
    Ok(())
}

fn handle_line(timer: &TimerController, line: &str, confirm_reset: &mut bool) -> Flow {
    if std::mem::take(confirm_reset) {
        if line.eq_ignore_ascii_case("y") {
            timer.reset();
        } else {
            println!("reset cancelled");
        }
        return Flow::Continue;
    }

    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    match command {
        "" | "p" => {
            if timer.toggle().is_none() {
                println!("nothing to start");
            }
        }
        "r" => {
            if timer.status() == TimerStatus::Running {
                print!("discard the current session? [y/N] ");
                flush();
                *confirm_reset = true;
            } else {
                timer.reset();
            }
        }
        "n" => {
            if timer.advance_phase().is_none() {
                println!("the current phase has not finished yet");
            }
        }
        "t" if rest.trim().is_empty() => {
            timer.clear_task_label();
            println!("task cleared");
        }
        "t" => match timer.label_task(rest) {
            Ok(label) => println!("task: {label}"),
            Err(e) => println!("{e}"),
        },
        "s" => print_status(timer),
        "h" | "?" => println!("{HELP}"),
        "q" => return Flow::Quit,
        other => println!("unknown command '{other}', h for help"),
    }
    Flow::Continue
}

fn print_status(timer: &TimerController) {
    if let Event::StateSnapshot {
        status,
        phase,
        remaining_secs,
        completed_work,
        task_label,
        ..
    } = timer.snapshot()
    {
        println!(
            "{} {} ({:?}), {} work sessions this run{}",
            phase.label(),
            format_clock(remaining_secs),
            status,
            completed_work,
            task_label.map(|t| format!(", task: {t}")).unwrap_or_default(),
        );
    }
}

fn render(event: &Event, auto_advance_delay_secs: u64) {
    match event {
        Event::Tick {
            remaining_secs,
            progress_pct,
        } => {
            print!("\r{}  {:>3.0}%  ", format_clock(*remaining_secs), progress_pct);
            flush();
        }
        Event::TimerStarted {
            phase,
            duration_secs,
            task_label,
            ..
        } => {
            let task = task_label
                .as_deref()
                .map(|t| format!(" on \"{t}\""))
                .unwrap_or_default();
            println!("\n{} started{task} ({})", phase.label(), format_clock(*duration_secs));
        }
        Event::TimerPaused { remaining_secs, .. } => {
            println!("\npaused at {}", format_clock(*remaining_secs));
        }
        Event::TimerResumed { .. } => println!("resumed"),
        Event::TimerReset {
            phase,
            remaining_secs,
            ..
        } => println!("\n{} reset to {}", phase.label(), format_clock(*remaining_secs)),
        Event::PhaseCompleted {
            message,
            next_phase,
            auto_start,
            ..
        } => {
            println!("\n{message}");
            if *auto_start {
                println!(
                    "{} starts in {}s (r to cancel)",
                    next_phase.label(),
                    auto_advance_delay_secs
                );
            } else {
                println!("p starts {}, n moves on without starting", next_phase.label());
            }
        }
        Event::PhaseAdvanced {
            to, duration_secs, ..
        } => println!("up next: {} ({})", to.label(), format_clock(*duration_secs)),
        Event::StatsChanged { stats } => println!(
            "today {}/{}, streak {}",
            stats.completed_today, stats.daily_goal, stats.current_streak
        ),
        Event::PersistenceFailed {
            operation, message, ..
        } => eprintln!("\nwarning: {operation} failed: {message}"),
        Event::SettingsChanged { .. } | Event::StateSnapshot { .. } => {}
    }
}

fn flush() {
    let _ = std::io::stdout().flush();
}
