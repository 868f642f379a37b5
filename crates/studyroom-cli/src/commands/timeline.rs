use chrono::NaiveDate;
use clap::Subcommand;
use std::path::{Path, PathBuf};
use studyroom_core::timeline::{
    can_shift, distribute, fallback_roadmap, redistribute, shift, timeline_progress, Milestone,
};
use studyroom_core::{Clock, Config, SystemClock, TimelineError};

#[derive(Subcommand)]
pub enum TimelineAction {
    /// Assign end dates proportional to milestone weights
    Distribute {
        /// JSON file holding an array of milestones
        file: PathBuf,
        /// Roadmap length in days (default: timeline.default_total_days)
        #[arg(long)]
        days: Option<i64>,
        /// First day of the roadmap, YYYY-MM-DD (default: today)
        #[arg(long)]
        anchor: Option<NaiveDate>,
        /// Use a single-milestone roadmap for this goal if the file is unusable
        #[arg(long)]
        goal: Option<String>,
        /// Write the dated milestones back to the file
        #[arg(long)]
        write: bool,
    },
    /// Regenerate end dates, keeping pinned ones where they still fit
    Redistribute {
        file: PathBuf,
        #[arg(long)]
        days: Option<i64>,
        #[arg(long)]
        anchor: Option<NaiveDate>,
        #[arg(long)]
        write: bool,
    },
    /// Move one milestone's end date by a number of days
    Shift {
        file: PathBuf,
        /// Zero-based milestone index
        #[arg(long)]
        index: usize,
        /// Days to move, e.g. 1 or -1
        #[arg(long, allow_hyphen_values = true)]
        delta: i64,
        /// Override today's date, YYYY-MM-DD
        #[arg(long)]
        today: Option<NaiveDate>,
        #[arg(long)]
        write: bool,
    },
    /// Show where today falls on the roadmap
    Progress {
        file: PathBuf,
        /// First day of the roadmap, YYYY-MM-DD
        #[arg(long)]
        anchor: NaiveDate,
        #[arg(long)]
        today: Option<NaiveDate>,
    },
}

fn read_milestones(path: &Path) -> Result<Vec<Milestone>, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    Ok(serde_json::from_str(&content)?)
}

fn write_milestones(path: &Path, milestones: &[Milestone]) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string_pretty(milestones)?;
    std::fs::write(path, json)?;
    Ok(())
}

fn default_days(days: Option<i64>) -> i64 {
    days.unwrap_or_else(|| Config::load_or_default().timeline.default_total_days)
}

pub fn run(action: TimelineAction) -> Result<(), Box<dyn std::error::Error>> {
    let today = SystemClock.today();

    match action {
        TimelineAction::Distribute {
            file,
            days,
            anchor,
            goal,
            write,
        } => {
            let days = default_days(days);
            let anchor = anchor.unwrap_or(today);
            let milestones = match read_milestones(&file) {
                Ok(milestones) => milestones,
                Err(e) if goal.is_some() => {
                    tracing::warn!(error = %e, "milestone file unusable");
                    Vec::new()
                }
                Err(e) => return Err(e),
            };

            let result = match (distribute(&milestones, days, anchor), goal) {
                (Ok(result), _) => result,
                (Err(TimelineError::InvalidInput(reason)), Some(goal)) => {
                    tracing::warn!(%reason, "falling back to single-milestone roadmap");
                    distribute(&fallback_roadmap(&goal), days, anchor)?
                }
                (Err(e), None) => return Err(e.into()),
            };
            if write {
                write_milestones(&file, &result.milestones)?;
            }
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        TimelineAction::Redistribute {
            file,
            days,
            anchor,
            write,
        } => {
            let milestones = read_milestones(&file)?;
            let result = redistribute(&milestones, default_days(days), anchor.unwrap_or(today))?;
            if write {
                write_milestones(&file, &result.milestones)?;
            }
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        TimelineAction::Shift {
            file,
            index,
            delta,
            today: today_override,
            write,
        } => {
            let today = today_override.unwrap_or(today);
            let mut milestones = read_milestones(&file)?;
            let moved = shift(&mut milestones, index, delta, today);
            if moved && write {
                write_milestones(&file, &milestones)?;
            }

            // Tell the caller which buttons to offer next.
            let can_move = |d: i64| {
                milestones
                    .get(index)
                    .and_then(|m| m.end_date)
                    .and_then(|date| date.checked_add_signed(chrono::Duration::try_days(d)?))
                    .is_some_and(|proposed| can_shift(&milestones, index, proposed, today))
            };
            let out = serde_json::json!({
                "shifted": moved,
                "canMoveEarlier": can_move(-1),
                "canMoveLater": can_move(1),
                "milestones": milestones,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        TimelineAction::Progress {
            file,
            anchor,
            today: today_override,
        } => {
            let milestones = read_milestones(&file)?;
            let progress = timeline_progress(&milestones, anchor, today_override.unwrap_or(today));
            println!("{}", serde_json::to_string_pretty(&progress)?);
        }
    }
    Ok(())
}
