use clap::Subcommand;
use focusflow_core::Stats;

use crate::context::AppContext;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's progress, totals and streak
    Show {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the daily goal (work sessions per day)
    Goal { goal: u32 },
    /// Reset the daily goal; session history is kept
    Reset,
}

fn print_stats(stats: &Stats) {
    println!(
        "Today:   {}/{} ({:.0}%){}",
        stats.completed_today,
        stats.daily_goal,
        stats.goal_progress_pct(),
        if stats.goal_reached() { "  goal reached" } else { "" }
    );
    println!("Total:   {}", stats.total_sessions);
    let unit = if stats.current_streak == 1 { "day" } else { "days" };
    println!("Streak:  {} {unit}", stats.current_streak);
    if let Some(date) = stats.last_completed_date {
        println!("Last:    {date}");
    }
}

pub fn run(action: StatsAction, ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
    let engine = ctx.stats();

    match action {
        StatsAction::Show { json } => {
            let stats = engine.get()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_stats(&stats);
            }
        }
        StatsAction::Goal { goal } => {
            let stats = engine.update_daily_goal(goal)?;
            println!("daily goal set to {}", stats.daily_goal);
        }
        StatsAction::Reset => {
            let stats = engine.reset()?;
            print_stats(&stats);
        }
    }
    Ok(())
}
