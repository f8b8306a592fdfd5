use chrono::Local;
use clap::Subcommand;
use focusflow_core::Session;

use crate::context::AppContext;

#[derive(Subcommand)]
pub enum SessionsAction {
    /// List recorded sessions, oldest first
    List {
        /// Only completed work sessions started today
        #[arg(long)]
        today: bool,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print one session as JSON
    Show { id: String },
    /// Delete a session
    Delete { id: String },
}

fn print_row(session: &Session) {
    let started = session.start_time.with_timezone(&Local);
    println!(
        "{}  {}  {:<10}  {:>3} min  {}  {}",
        session.id,
        started.format("%Y-%m-%d %H:%M"),
        session.phase.as_str(),
        session.duration,
        if session.completed { "done" } else { "open" },
        session.task_label.as_deref().unwrap_or("-"),
    );
}

pub fn run(action: SessionsAction, ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
    let store = ctx.sessions();

    match action {
        SessionsAction::List { today, json } => {
            let sessions = if today {
                store.todays_completed()?
            } else {
                store.list()?
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&sessions)?);
            } else if sessions.is_empty() {
                println!("no sessions recorded");
            } else {
                sessions.iter().for_each(print_row);
            }
        }
        SessionsAction::Show { id } => {
            let session = store.get(&id)?.ok_or_else(|| format!("no session with id {id}"))?;
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        SessionsAction::Delete { id } => {
            if !store.delete(&id)? {
                return Err(format!("no session with id {id}").into());
            }
            println!("deleted {id}");
        }
    }
    Ok(())
}
