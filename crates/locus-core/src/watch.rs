//! Supplementary foreground position watch.
//!
//! While the app is in the foreground and tracking is permitted,
//! [`ForegroundWatchManager`] keeps one high-frequency, non-persisted watch
//! running alongside the engine's primary session. Fixes it receives go
//! straight into history; the provider echoes them on its primary stream
//! flagged as watch samples, which the coordinator skips.
//!
//! The manager owns a single watch slot. Every start retires whatever the
//! slot holds before acquiring, and every acquisition is stamped with a
//! generation number: if a stop or another start happened while the
//! acquisition was in flight, the fresh handle is retired on arrival
//! instead of becoming active. Acquisitions are serialized, so at no point
//! do two un-retired watches exist.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ForegroundWatchConfig;
use crate::coordinator::TrackingStatus;
use crate::events::{EventReceiver, ProviderEvent};
use crate::history::HistoryStore;
use crate::traits::{SharedProvider, WatchHandle, WatchOptions, WatchUpdate};

/// Application lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppState {
    /// In the foreground and receiving input.
    #[default]
    Active,
    Background,
    /// Transitioning, or foreground without input.
    Inactive,
}

impl AppState {
    pub fn is_foreground(self) -> bool {
        self == AppState::Active
    }
}

/// Foreground watch state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchState {
    #[default]
    Stopped,
    Starting,
    Active,
}

#[derive(Debug, Default)]
struct WatchSlot {
    state: WatchState,
    handle: Option<WatchHandle>,
    generation: u64,
    enabled: bool,
    foreground: bool,
}

impl WatchSlot {
    fn should_run(&self) -> bool {
        self.enabled && self.foreground
    }

    fn retire(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!(watch_id = %handle.id(), "Retiring foreground watch");
            handle.remove();
        }
    }
}

/// Ticket for one acquisition, issued when a start begins.
#[derive(Debug)]
struct StartTicket {
    generation: u64,
}

struct ManagerInner {
    provider: SharedProvider,
    history: HistoryStore,
    options: WatchOptions,
    buffer_size: usize,
    slot: Mutex<WatchSlot>,
    acquisition: tokio::sync::Mutex<()>,
}

/// Manages the foreground watch. Cheap to clone.
#[derive(Clone)]
pub struct ForegroundWatchManager {
    inner: Arc<ManagerInner>,
}

impl std::fmt::Debug for ForegroundWatchManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForegroundWatchManager")
            .field("state", &self.state())
            .finish()
    }
}

impl ForegroundWatchManager {
    /// Create a stopped manager.
    pub fn new(
        provider: SharedProvider,
        history: HistoryStore,
        config: &ForegroundWatchConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                provider,
                history,
                options: WatchOptions::from(config),
                buffer_size: config.buffer_size,
                slot: Mutex::new(WatchSlot::default()),
                acquisition: tokio::sync::Mutex::new(()),
            }),
        }
    }

    fn slot(&self) -> MutexGuard<'_, WatchSlot> {
        self.inner.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current watch state.
    pub fn state(&self) -> WatchState {
        self.slot().state
    }

    /// Identifier of the active watch, if any.
    pub fn active_watch_id(&self) -> Option<uuid::Uuid> {
        self.slot().handle.as_ref().map(WatchHandle::id)
    }

    // --- Inputs ---

    /// Record whether tracking permits the watch. Returns the start ticket
    /// if the watch should now be started.
    fn set_enabled(&self, enabled: bool) -> Option<StartTicket> {
        let mut slot = self.slot();
        slot.enabled = enabled;
        self.reconcile_locked(&mut slot)
    }

    /// Record a lifecycle notification. Every foreground notification
    /// restarts an active watch so a fresh fix follows each resume.
    fn set_foreground(&self, foreground: bool) -> Option<StartTicket> {
        let mut slot = self.slot();
        slot.foreground = foreground;
        if foreground && slot.state == WatchState::Active && slot.should_run() {
            info!("App foregrounded, restarting foreground watch");
            return Some(Self::begin_locked(&mut slot));
        }
        self.reconcile_locked(&mut slot)
    }

    fn reconcile_locked(&self, slot: &mut WatchSlot) -> Option<StartTicket> {
        match (slot.should_run(), slot.state) {
            (true, WatchState::Stopped) => Some(Self::begin_locked(slot)),
            (false, WatchState::Starting | WatchState::Active) => {
                Self::stop_locked(slot);
                None
            }
            _ => None,
        }
    }

    /// Apply a lifecycle transition, awaiting any resulting acquisition.
    pub async fn on_app_state(&self, state: AppState) -> WatchState {
        if let Some(ticket) = self.set_foreground(state.is_foreground()) {
            self.acquire(ticket).await;
        }
        self.state()
    }

    /// Apply a coordinator status change, awaiting any resulting acquisition.
    pub async fn on_status(&self, status: &TrackingStatus) -> WatchState {
        if let Some(ticket) = self.set_enabled(status.foreground_watch_enabled()) {
            self.acquire(ticket).await;
        }
        self.state()
    }

    /// Restart the watch after a provider change, if it should be running.
    pub async fn on_provider_change(&self) -> WatchState {
        let ticket = {
            let mut slot = self.slot();
            if !slot.should_run() {
                return slot.state;
            }
            info!("Provider changed, restarting foreground watch");
            Self::begin_locked(&mut slot)
        };
        self.acquire(ticket).await;
        self.state()
    }

    // --- Start / stop ---

    /// Retire any current watch and acquire a new one.
    pub async fn start(&self) -> WatchState {
        let ticket = Self::begin_locked(&mut self.slot());
        self.acquire(ticket).await;
        self.state()
    }

    /// Retire the watch and cancel any in-flight start.
    pub fn stop(&self) {
        Self::stop_locked(&mut self.slot());
    }

    fn begin_locked(slot: &mut WatchSlot) -> StartTicket {
        slot.retire();
        slot.generation += 1;
        slot.state = WatchState::Starting;
        StartTicket {
            generation: slot.generation,
        }
    }

    fn stop_locked(slot: &mut WatchSlot) {
        let was_running = slot.state != WatchState::Stopped;
        slot.retire();
        slot.generation += 1;
        slot.state = WatchState::Stopped;
        if was_running {
            info!("Foreground watch stopped");
        }
    }

    async fn acquire(&self, ticket: StartTicket) {
        let _acquisition = self.inner.acquisition.lock().await;

        if self.slot().generation != ticket.generation {
            debug!(generation = ticket.generation, "Superseded before acquisition");
            return;
        }

        let (tx, rx) = mpsc::channel(self.inner.buffer_size);
        let result = self.inner.provider.watch_position(&self.inner.options, tx).await;

        let mut slot = self.slot();
        let current = slot.generation == ticket.generation && slot.state == WatchState::Starting;

        match result {
            Ok(handle) if current => {
                info!(watch_id = %handle.id(), "Foreground watch started");
                spawn_forwarder(rx, handle.retired_token(), self.inner.history.clone());
                slot.handle = Some(handle);
                slot.state = WatchState::Active;
            }
            Ok(handle) => {
                debug!(watch_id = %handle.id(), "Watch acquired after cancellation, retiring");
                handle.remove();
            }
            Err(e) => {
                error!("Failed to start foreground watch: {}", e);
                if current {
                    slot.state = WatchState::Stopped;
                }
            }
        }
    }

    // --- Event loop ---

    /// Drive the manager from the app lifecycle, coordinator status and
    /// provider events until `shutdown` fires. Acquisitions run on their
    /// own tasks so a stop is never queued behind one.
    pub async fn run(
        self,
        mut lifecycle: watch::Receiver<AppState>,
        mut status: watch::Receiver<TrackingStatus>,
        mut events: EventReceiver,
        shutdown: CancellationToken,
    ) {
        let initial_foreground = lifecycle.borrow_and_update().is_foreground();
        let initial_enabled = status.borrow_and_update().foreground_watch_enabled();
        {
            let mut slot = self.slot();
            slot.foreground = initial_foreground;
        }
        self.spawn_acquire(self.set_enabled(initial_enabled));

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                changed = lifecycle.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = *lifecycle.borrow_and_update();
                    debug!(?state, "App state changed");
                    self.spawn_acquire(self.set_foreground(state.is_foreground()));
                }
                changed = status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let enabled = status.borrow_and_update().foreground_watch_enabled();
                    self.spawn_acquire(self.set_enabled(enabled));
                }
                event = events.recv() => match event {
                    Ok(ProviderEvent::ProviderChange(_)) => {
                        let ticket = {
                            let mut slot = self.slot();
                            slot.should_run().then(|| {
                                info!("Provider changed, restarting foreground watch");
                                Self::begin_locked(&mut slot)
                            })
                        };
                        self.spawn_acquire(ticket);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Foreground watch missed provider events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }

        self.stop();
        debug!("Foreground watch loop exited");
    }

    fn spawn_acquire(&self, ticket: Option<StartTicket>) {
        if let Some(ticket) = ticket {
            let manager = self.clone();
            tokio::spawn(async move { manager.acquire(ticket).await });
        }
    }
}

fn spawn_forwarder(
    mut rx: mpsc::Receiver<WatchUpdate>,
    retired: CancellationToken,
    history: HistoryStore,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = retired.cancelled() => break,
                update = rx.recv() => match update {
                    Some(Ok(location)) => {
                        info!(
                            lat = location.coords.latitude,
                            lng = location.coords.longitude,
                            accuracy = ?location.coords.accuracy,
                            timestamp = %location.timestamp,
                            "Foreground location"
                        );
                        history.append(&location);
                    }
                    Some(Err(e)) => error!("Foreground watch error: {}", e),
                    None => break,
                }
            }
        }
    });
}
