use clap::Subcommand;
use std::sync::Arc;
use studyroom_core::remote::{HttpSessionStore, SessionStore};
use studyroom_core::storage::SqliteStore;
use studyroom_core::timer::{FocusController, FocusDriver, FocusSettings, FocusTask};
use studyroom_core::{Config, Event, SystemClock};
use tokio::sync::mpsc;

#[derive(Subcommand)]
pub enum FocusAction {
    /// Start a focus session on a topic
    Start {
        /// Topic ID
        task_id: String,
        /// Topic title
        #[arg(long, default_value = "")]
        title: String,
        /// Milestone the topic belongs to
        #[arg(long)]
        milestone: Option<String>,
        /// Planned minutes (default: focus.default_target_minutes)
        #[arg(long)]
        target: Option<u32>,
        /// Room ID (default: user.room_id)
        #[arg(long)]
        room: Option<String>,
    },
    /// Pause the active session
    Pause {
        #[arg(long)]
        room: Option<String>,
    },
    /// Resume a paused session
    Resume {
        #[arg(long)]
        room: Option<String>,
    },
    /// Stop the active session
    Stop {
        #[arg(long)]
        room: Option<String>,
    },
    /// Stop the active session and mark its topic done
    Complete {
        #[arg(long)]
        room: Option<String>,
    },
    /// Print the current session as JSON
    Status {
        #[arg(long)]
        room: Option<String>,
    },
    /// Keep the session ticking in the foreground, printing events
    Run {
        #[arg(long)]
        room: Option<String>,
        /// Exit after this many seconds instead of waiting for Ctrl-C
        #[arg(long)]
        seconds: Option<u64>,
    },
}

impl FocusAction {
    fn room(&self) -> Option<&str> {
        match self {
            FocusAction::Start { room, .. }
            | FocusAction::Pause { room }
            | FocusAction::Resume { room }
            | FocusAction::Stop { room }
            | FocusAction::Complete { room }
            | FocusAction::Status { room }
            | FocusAction::Run { room, .. } => room.as_deref(),
        }
    }
}

fn build_controller(config: &Config, room: Option<&str>) -> Result<FocusController, Box<dyn std::error::Error>> {
    let room_id = room
        .map(str::to_string)
        .or_else(|| config.user.room_id.clone())
        .ok_or("no room given; pass --room or run `config set user.room_id <id>`")?;

    let remote: Arc<dyn SessionStore> =
        Arc::new(HttpSessionStore::from_config(&config.api, config.user.user_id.clone())?);
    let local = Arc::new(SqliteStore::open()?);

    let mut controller = FocusController::new(
        room_id,
        remote,
        local,
        Arc::new(SystemClock),
        FocusSettings::try_from(&config.focus)?,
    );
    if let Some(user_id) = &config.user.user_id {
        controller = controller.with_user(user_id.clone());
    }
    Ok(controller)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_event_or_snapshot(
    controller: &FocusController,
    event: Option<Event>,
) -> Result<(), Box<dyn std::error::Error>> {
    match event {
        Some(event) => print_json(&event),
        None => print_json(&controller.snapshot()),
    }
}

pub fn run(action: FocusAction) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_async(action))
}

async fn run_async(action: FocusAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let controller = build_controller(&config, action.room())?;

    // Each invocation is a fresh process: pick up whatever is active first.
    if let Some(event) = controller.restore().await {
        tracing::debug!(?event, "recovered focus session");
    }

    match action {
        FocusAction::Start {
            task_id,
            title,
            milestone,
            target,
            ..
        } => {
            let mut task = FocusTask::new(task_id, title);
            if let Some(milestone) = milestone {
                task = task.with_milestone(milestone);
            }
            if let Some(minutes) = target {
                task = task.with_target_minutes(minutes);
            }
            let snapshot = controller.start_session(task).await?;
            print_json(&snapshot)?;
        }
        FocusAction::Pause { .. } => {
            let event = controller.pause_session();
            print_event_or_snapshot(&controller, event)?;
        }
        FocusAction::Resume { .. } => {
            let event = controller.resume_session();
            print_event_or_snapshot(&controller, event)?;
        }
        FocusAction::Stop { .. } => {
            let event = controller.stop_session().await;
            print_event_or_snapshot(&controller, event)?;
        }
        FocusAction::Complete { .. } => {
            let event = controller.complete_session().await;
            print_event_or_snapshot(&controller, event)?;
        }
        FocusAction::Status { .. } => {
            print_json(&controller.snapshot())?;
        }
        FocusAction::Run { seconds, .. } => {
            run_foreground(&controller, seconds).await?;
        }
    }
    Ok(())
}

async fn run_foreground(controller: &FocusController, seconds: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    if !controller.snapshot().is_active() {
        return Err("no active focus session; start one with `focus start`".into());
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = FocusDriver::new(controller.clone()).with_events(tx).spawn();

    let deadline = async {
        match seconds {
            Some(secs) => tokio::time::sleep(std::time::Duration::from_secs(secs)).await,
            None => {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!(error = %e, "cannot listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
            }
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            Some(event) = rx.recv() => print_json(&event)?,
        }
    }

    handle.shutdown().await;
    // Nothing ticks between invocations, so park the session.
    controller.pause_session();
    print_json(&controller.snapshot())
}
