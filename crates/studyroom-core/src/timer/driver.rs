//! Background tick loop for a [`FocusController`].
//!
//! Ticks once per second and fires a pulse whenever the window allows.
//! Missed ticks are skipped rather than replayed, so a suspended process
//! does not credit time it never observed. Pulses run on their own tasks and
//! never delay the next tick.

use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::controller::FocusController;
use crate::events::Event;

pub struct FocusDriver {
    controller: FocusController,
    events: Option<mpsc::UnboundedSender<Event>>,
    tick_every: Duration,
}

/// Handle to a spawned driver.
pub struct DriverHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DriverHandle {
    /// Stop ticking and wait for the loop to exit. In-flight pulses finish on
    /// their own.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "focus driver task failed");
        }
    }
}

impl FocusDriver {
    pub fn new(controller: FocusController) -> Self {
        Self {
            controller,
            events: None,
            tick_every: Duration::from_secs(1),
        }
    }

    /// Forward timer events (target reached, pulses) to `tx`.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<Event>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn spawn(self) -> DriverHandle {
        let (shutdown, rx) = watch::channel(false);
        let task = tokio::spawn(self.run(rx));
        DriverHandle { shutdown, task }
    }

    /// Run until `shutdown` becomes `true` or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.tick_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        ticker.tick().await;

        tracing::debug!(room = %self.controller.room_id(), "focus driver started");
        loop {
            tokio::select! {
                _ = ticker.tick() => self.on_tick(),
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::debug!(room = %self.controller.room_id(), "focus driver stopped");
    }

    fn on_tick(&self) {
        if let Some(event) = self.controller.tick() {
            emit(self.events.as_ref(), event);
        }
        if self.controller.pulse_due() {
            let controller = self.controller.clone();
            let events = self.events.clone();
            tokio::spawn(async move {
                if let Some(event) = controller.pulse().await {
                    emit(events.as_ref(), event);
                }
            });
        }
    }
}

fn emit(events: Option<&mpsc::UnboundedSender<Event>>, event: Event) {
    if let Some(tx) = events {
        // Receiver gone means nobody is listening any more.
        let _ = tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MonotonicClock;
    use crate::remote::InMemorySessionStore;
    use crate::storage::MemoryStore;
    use crate::timer::{FocusSettings, FocusState, FocusTask};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn ticks_and_pulses_on_schedule() {
        let clock = Arc::new(MonotonicClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
        ));
        let remote = Arc::new(InMemorySessionStore::new(clock.clone()));
        let controller = FocusController::new(
            "room-1",
            remote.clone(),
            Arc::new(MemoryStore::new()),
            clock,
            FocusSettings::default(),
        );
        controller
            .start_session(FocusTask::new("t1", "Closures"))
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = FocusDriver::new(controller.clone()).with_events(tx).spawn();

        tokio::time::sleep(Duration::from_millis(12_500)).await;
        handle.shutdown().await;

        let snap = controller.snapshot();
        assert_eq!(snap.state, FocusState::Running);
        assert_eq!(snap.elapsed_seconds, 12);
        // windows close at 5s and 10s
        assert_eq!(remote.pulse_count(), 2);

        let mut pulsed = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, Event::Pulsed { synced: true, .. }) {
                pulsed += 1;
            }
        }
        assert_eq!(pulsed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn paused_session_does_not_advance() {
        let clock = Arc::new(MonotonicClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
        ));
        let remote = Arc::new(InMemorySessionStore::new(clock.clone()));
        let controller = FocusController::new(
            "room-1",
            remote.clone(),
            Arc::new(MemoryStore::new()),
            clock,
            FocusSettings::default(),
        );
        controller
            .start_session(FocusTask::new("t1", "Closures"))
            .await
            .unwrap();
        controller.pause_session();

        let handle = FocusDriver::new(controller.clone()).spawn();
        tokio::time::sleep(Duration::from_secs(30)).await;
        handle.shutdown().await;

        assert_eq!(controller.snapshot().elapsed_seconds, 0);
        assert_eq!(remote.pulse_count(), 0);
    }
}
