//! Process-level wiring of the tracking components.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::TrackingConfig;
use crate::coordinator::{SetupOutcome, TrackingCoordinator, TrackingStatus};
use crate::headless::{PositionProcessor, headless_task};
use crate::history::HistoryStore;
use crate::permissions::PermissionGateway;
use crate::traits::SharedProvider;
use crate::watch::{AppState, ForegroundWatchManager, WatchState};

/// A running tracking session: coordinator, foreground watch and history
/// for one provider.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use locus_core::{AppState, MockPermissions, MockProvider, PermissionGateway, Platform,
///     TrackingConfig, TrackingSession};
///
/// #[tokio::main]
/// async fn main() {
///     let provider = Arc::new(MockProvider::new());
///     let permissions = PermissionGateway::new(Arc::new(MockPermissions::new(Platform::Ios)));
///     let session =
///         TrackingSession::start(provider, permissions, TrackingConfig::default(), AppState::Active)
///             .await;
///     assert!(session.status().is_ready());
///     session.shutdown().await;
/// }
/// ```
pub struct TrackingSession {
    coordinator: Arc<TrackingCoordinator>,
    watch: ForegroundWatchManager,
    history: HistoryStore,
    lifecycle: watch::Sender<AppState>,
    shutdown: CancellationToken,
    watch_task: JoinHandle<()>,
    setup: SetupOutcome,
}

impl std::fmt::Debug for TrackingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingSession")
            .field("status", &self.status())
            .field("watch", &self.watch.state())
            .field("samples", &self.history.len())
            .finish()
    }
}

impl TrackingSession {
    /// Wire up and initialize a session.
    ///
    /// Registers the headless task when `app.enable_headless` is set, starts
    /// the foreground watch loop and initializes the coordinator.
    pub async fn start(
        provider: SharedProvider,
        permissions: PermissionGateway,
        config: TrackingConfig,
        app_state: AppState,
    ) -> Self {
        let history = HistoryStore::from_config(&config.history);
        let processor: Arc<dyn PositionProcessor> = Arc::new(history.clone());
        Self::start_with_processor(provider, permissions, config, app_state, history, processor)
            .await
    }

    /// Like [`start`](Self::start), with a custom headless processor and
    /// history.
    pub async fn start_with_processor(
        provider: SharedProvider,
        permissions: PermissionGateway,
        config: TrackingConfig,
        app_state: AppState,
        history: HistoryStore,
        headless_processor: Arc<dyn PositionProcessor>,
    ) -> Self {
        if config.app.enable_headless {
            provider.register_headless_task(headless_task(headless_processor));
            debug!("Headless task registered");
        }

        let watch = ForegroundWatchManager::new(
            Arc::clone(&provider),
            history.clone(),
            &config.foreground_watch,
        );
        let coordinator = TrackingCoordinator::new(
            Arc::clone(&provider),
            permissions,
            history.clone(),
            config,
        );

        let (lifecycle, lifecycle_rx) = watch::channel(app_state);
        let shutdown = CancellationToken::new();
        let watch_task = tokio::spawn(watch.clone().run(
            lifecycle_rx,
            coordinator.subscribe_status(),
            provider.subscribe(),
            shutdown.child_token(),
        ));

        let setup = coordinator.initialize().await;
        info!(?setup, "Tracking session started");

        Self {
            coordinator,
            watch,
            history,
            lifecycle,
            shutdown,
            watch_task,
            setup,
        }
    }

    pub fn coordinator(&self) -> &Arc<TrackingCoordinator> {
        &self.coordinator
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn status(&self) -> TrackingStatus {
        self.coordinator.status()
    }

    pub fn watch_state(&self) -> WatchState {
        self.watch.state()
    }

    /// Outcome of the initial setup.
    pub fn setup_outcome(&self) -> &SetupOutcome {
        &self.setup
    }

    /// Report an app lifecycle transition.
    pub fn set_app_state(&self, state: AppState) {
        self.lifecycle.send_replace(state);
    }

    /// Stop routing events and retire the foreground watch.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        self.coordinator.shutdown();
        let _ = self.watch_task.await;
        info!(samples = self.history.len(), "Tracking session stopped");
    }
}
