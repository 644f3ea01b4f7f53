//! Tracking coordinator.
//!
//! The [`TrackingCoordinator`] brings a [`LocationProvider`] to a ready,
//! permission-correct state and routes the provider's location-bearing
//! events into a [`HistoryStore`].
//!
//! # Lifecycle
//!
//! [`initialize`](TrackingCoordinator::initialize) runs unconditionally at
//! process start. It subscribes to the provider's event stream first, then
//! configures the engine, so every event the engine delivers during
//! configuration is already buffered for the coordinator. Setup moves
//! `Idle -> Ready` on success and stays `Idle` on failure; a later call
//! retries. Calling it again while `Ready` only reconciles the
//! motion-dependent part of the configuration.
//!
//! Activation is gated on `Ready` plus a location permission of `always`
//! or `foreground`. It re-runs whenever either input changes.
//!
//! No method returns an error: failures are logged and reflected in
//! [`TrackingStatus`] or in the returned outcome.

use std::sync::{Arc, OnceLock, Weak};

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use locus_types::{
    AuthorizationStatus, Location, LocationPermission, LocationSample, PermissionSnapshot,
    ProviderChangeEvent, ProviderState,
};

use crate::config::{ConfigPatch, ProviderConfig, TrackingConfig};
use crate::error::Error;
use crate::events::{EventReceiver, ProviderEvent};
use crate::history::HistoryStore;
use crate::permissions::PermissionGateway;
use crate::traits::{CurrentPositionOptions, SharedProvider};

/// Engine setup state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SetupState {
    #[default]
    Idle,
    Ready,
}

/// Readiness and permission state, as exposed for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TrackingStatus {
    pub setup: SetupState,
    pub permissions: PermissionSnapshot,
}

impl TrackingStatus {
    /// Whether the engine has acknowledged its configuration.
    pub fn is_ready(&self) -> bool {
        self.setup == SetupState::Ready
    }

    /// Whether the supplementary foreground watch may run.
    pub fn foreground_watch_enabled(&self) -> bool {
        self.is_ready() && self.permissions.location.allows_tracking()
    }
}

/// Result of [`TrackingCoordinator::initialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    /// The engine was configured and is now ready.
    Configured,
    /// The engine was already ready and its motion configuration matched.
    AlreadyReady,
    /// The engine was already ready; a narrow motion update was applied.
    Reconciled,
    /// The engine was already ready but rejected the narrow motion update.
    /// Setup stays ready and the next initialize retries the update.
    ReconcileFailed(String),
    /// Configuration failed; setup stays idle.
    Failed(String),
}

/// Why activation did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationSkip {
    NotReady,
    Permission(LocationPermission),
}

/// Result of [`TrackingCoordinator::activate_if_permitted`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// The start command was issued.
    Started,
    /// The engine was already enabled; nothing was issued.
    AlreadyEnabled,
    Skipped(ActivationSkip),
    Failed(String),
}

#[derive(Debug, Default)]
struct SetupSlot {
    /// Motion flag the engine was last configured with.
    applied_disable_motion: Option<bool>,
}

/// Live subscription to the provider's event stream.
///
/// Holding one is proof that events are being buffered for the
/// coordinator.
#[derive(Debug)]
struct EventSubscription {
    token: CancellationToken,
}

impl EventSubscription {
    fn spawn(coordinator: &Arc<TrackingCoordinator>) -> Self {
        let rx = coordinator.provider.subscribe();
        let token = CancellationToken::new();
        tokio::spawn(pump_events(Arc::downgrade(coordinator), rx, token.clone()));
        debug!("Subscribed to provider events");
        Self { token }
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn pump_events(
    coordinator: Weak<TrackingCoordinator>,
    mut rx: EventReceiver,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Event subscription cancelled");
                break;
            }
            event = rx.recv() => match event {
                Ok(event) => {
                    let Some(coordinator) = coordinator.upgrade() else {
                        break;
                    };
                    coordinator.handle_event(event).await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Provider event stream lagged");
                }
                Err(RecvError::Closed) => {
                    debug!("Provider event stream closed");
                    break;
                }
            }
        }
    }
}

/// Coordinates setup, activation and event routing for one provider.
pub struct TrackingCoordinator {
    provider: SharedProvider,
    permissions: PermissionGateway,
    history: HistoryStore,
    config: TrackingConfig,
    status: watch::Sender<TrackingStatus>,
    setup: Mutex<SetupSlot>,
    activation: Mutex<()>,
    subscription: OnceLock<EventSubscription>,
}

impl std::fmt::Debug for TrackingCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingCoordinator")
            .field("status", &self.status())
            .field("subscribed", &self.subscription.get().is_some())
            .finish()
    }
}

impl TrackingCoordinator {
    /// Create a coordinator. Nothing happens until
    /// [`initialize`](Self::initialize).
    pub fn new(
        provider: SharedProvider,
        permissions: PermissionGateway,
        history: HistoryStore,
        config: TrackingConfig,
    ) -> Arc<Self> {
        let (status, _) = watch::channel(TrackingStatus::default());
        Arc::new(Self {
            provider,
            permissions,
            history,
            config,
            status,
            setup: Mutex::new(SetupSlot::default()),
            activation: Mutex::new(()),
            subscription: OnceLock::new(),
        })
    }

    /// Current status.
    pub fn status(&self) -> TrackingStatus {
        *self.status.borrow()
    }

    /// Subscribe to status changes.
    pub fn subscribe_status(&self) -> watch::Receiver<TrackingStatus> {
        self.status.subscribe()
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn provider(&self) -> &SharedProvider {
        &self.provider
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    // --- Setup ---

    /// Subscribe to provider events and configure the engine.
    ///
    /// Never waits for a permission prompt. On first success, refreshes the
    /// motion permission and runs activation.
    pub async fn initialize(self: &Arc<Self>) -> SetupOutcome {
        let subscription = self
            .subscription
            .get_or_init(|| EventSubscription::spawn(self));

        let outcome = self.configure_engine(subscription).await;
        if outcome == SetupOutcome::Configured {
            self.refresh_motion_permission().await;
            self.activate_if_permitted().await;
        }
        outcome
    }

    async fn configure_engine(&self, _subscription: &EventSubscription) -> SetupOutcome {
        let mut setup = self.setup.lock().await;

        let motion = self.permissions.check_motion_permission().await;
        self.update_permissions(|p| p.motion = Some(motion));
        let disable = !motion;

        if self.status().is_ready() {
            info!("Tracking engine already ready");
            return match self.reconcile_motion(&mut setup, disable).await {
                Ok(true) => SetupOutcome::Reconciled,
                Ok(false) => SetupOutcome::AlreadyReady,
                Err(e) => SetupOutcome::ReconcileFailed(e.to_string()),
            };
        }

        info!(
            disable_motion_activity_updates = disable,
            "Setting up tracking engine"
        );
        let provider_config = ProviderConfig::derive(&self.config, disable);
        match self.provider.ready(&provider_config).await {
            Ok(state) => {
                setup.applied_disable_motion = Some(disable);
                self.set_setup(SetupState::Ready);
                info!(enabled = state.enabled, "Tracking engine ready");
                SetupOutcome::Configured
            }
            Err(e) => {
                setup.applied_disable_motion = None;
                self.set_setup(SetupState::Idle);
                error!("Tracking engine setup failed: {}", e);
                SetupOutcome::Failed(e.to_string())
            }
        }
    }

    /// Apply the narrow motion update if `disable` differs from what the
    /// engine was last given. Returns whether an update was applied.
    async fn reconcile_motion(
        &self,
        setup: &mut SetupSlot,
        disable: bool,
    ) -> crate::error::Result<bool> {
        if setup.applied_disable_motion == Some(disable) {
            return Ok(false);
        }

        let patch = ConfigPatch::motion(disable, self.config.geolocation.stationary_radius);
        match self.provider.set_config(&patch).await {
            Ok(()) => {
                setup.applied_disable_motion = Some(disable);
                info!(
                    disable_motion_activity_updates = disable,
                    "Updated motion config"
                );
                Ok(true)
            }
            Err(e) => {
                error!("Motion config update failed: {}", e);
                Err(e)
            }
        }
    }

    /// Re-query the motion permission and, when ready, reconcile the
    /// engine's motion configuration. Returns whether it is granted.
    pub async fn refresh_motion_permission(&self) -> bool {
        let mut setup = self.setup.lock().await;

        let granted = self.permissions.check_motion_permission().await;
        self.update_permissions(|p| p.motion = Some(granted));
        debug!(granted, "Motion permission refreshed");

        if self.status().is_ready() {
            // Failures are logged; the next refresh or initialize retries.
            let _ = self.reconcile_motion(&mut setup, !granted).await;
        }
        granted
    }

    // --- Activation ---

    /// Start the engine if setup is ready and location permission allows it.
    pub async fn activate_if_permitted(&self) -> ActivationOutcome {
        let _activation = self.activation.lock().await;

        let status = self.status();
        if !status.is_ready() {
            debug!("Start skipped: tracking engine not ready");
            return ActivationOutcome::Skipped(ActivationSkip::NotReady);
        }

        let permission = status.permissions.location;
        if !permission.allows_tracking() {
            error!(%permission, "Start skipped: location permission is {}", permission);
            return ActivationOutcome::Skipped(ActivationSkip::Permission(permission));
        }

        let state = match self.provider.get_state().await {
            Ok(state) => state,
            Err(e) => {
                error!("Failed to query tracking engine state: {}", e);
                return ActivationOutcome::Failed(e.to_string());
            }
        };

        if state.enabled {
            info!("Tracking engine already enabled");
            return ActivationOutcome::AlreadyEnabled;
        }

        match self.provider.start().await {
            Ok(_) => {
                info!("Tracking engine started");
                ActivationOutcome::Started
            }
            Err(e) => {
                error!("Failed to start tracking engine: {}", e);
                ActivationOutcome::Failed(e.to_string())
            }
        }
    }

    // --- Event routing ---

    /// Route one provider event. Returns the sample recorded, if any.
    pub async fn handle_event(&self, event: ProviderEvent) -> Option<LocationSample> {
        match event {
            ProviderEvent::Location(location) => self.on_location(&location),
            ProviderEvent::MotionChange(event) => {
                info!(
                    is_moving = event.is_moving,
                    lat = event.location.coords.latitude,
                    lng = event.location.coords.longitude,
                    "Motion change"
                );
                Some(self.history.append(&event.location))
            }
            ProviderEvent::Geofence(event) => {
                info!(
                    action = %event.action,
                    identifier = %event.identifier,
                    lat = event.location.coords.latitude,
                    lng = event.location.coords.longitude,
                    "Geofence event"
                );
                Some(self.history.append(&event.location))
            }
            ProviderEvent::ProviderChange(event) => {
                self.on_provider_change(event).await;
                None
            }
            ProviderEvent::ActivityChange(event) => {
                info!(
                    activity = ?event.activity,
                    confidence = event.confidence,
                    "Activity change"
                );
                None
            }
            ProviderEvent::LocationError { code } => {
                error!(code, "Location stream error");
                None
            }
        }
    }

    fn on_location(&self, location: &Location) -> Option<LocationSample> {
        if location.watch_sample {
            return None;
        }

        info!(
            lat = location.coords.latitude,
            lng = location.coords.longitude,
            accuracy = ?location.coords.accuracy,
            timestamp = %location.timestamp,
            "New location"
        );
        Some(self.history.append(location))
    }

    async fn on_provider_change(&self, event: ProviderChangeEvent) {
        info!(
            status = %event.status,
            gps = event.gps,
            network = event.network,
            "Provider change"
        );

        self.apply_authorization(event.status);

        if !event.gps {
            error!("GPS provider disabled");
        }
        if !event.network {
            error!("Network provider disabled");
        }

        self.activate_if_permitted().await;
    }

    fn apply_authorization(&self, status: AuthorizationStatus) {
        match LocationPermission::from_authorization(status) {
            Some(permission) => self.update_permissions(|p| p.location = permission),
            None => info!(%status, "Unhandled authorization status"),
        }
    }

    // --- Other operations ---

    /// Request a single fix and record it.
    pub async fn record_current_position(&self) -> Option<LocationSample> {
        let options = CurrentPositionOptions::from(&self.config.current_position);
        let request = self.provider.get_current_position(&options);
        let result = match tokio::time::timeout(options.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout("get_current_position", options.timeout)),
        };
        match result {
            Ok(location) => {
                info!(
                    lat = location.coords.latitude,
                    lng = location.coords.longitude,
                    accuracy = ?location.coords.accuracy,
                    "Current position"
                );
                Some(self.history.append(&location))
            }
            Err(e) => {
                error!("Failed to get current position: {}", e);
                None
            }
        }
    }

    /// Query and log live engine state.
    pub async fn engine_state(&self) -> Option<ProviderState> {
        match self.provider.get_state().await {
            Ok(state) => {
                info!(
                    enabled = state.enabled,
                    is_moving = state.is_moving,
                    tracking_mode = %state.tracking_mode,
                    "Tracking engine state"
                );
                Some(state)
            }
            Err(e) => {
                error!("Failed to get tracking engine state: {}", e);
                None
            }
        }
    }

    /// Prompt for location permission, apply the result and re-run
    /// activation. A failed request leaves the snapshot unchanged.
    pub async fn request_location_permission(&self) -> Option<AuthorizationStatus> {
        let status = match self.provider.request_permission().await {
            Ok(status) => status,
            Err(e) => {
                error!("Location permission request failed: {}", e);
                return None;
            }
        };

        info!(%status, "Location permission status");
        self.apply_authorization(status);
        self.activate_if_permitted().await;
        Some(status)
    }

    /// Prompt for motion permission, then refresh. Returns whether it is
    /// granted afterwards; a platform without the permission returns
    /// `false` without prompting.
    pub async fn request_motion_permission(&self) -> bool {
        let Some(result) = self.permissions.request_motion_permission().await else {
            debug!("Motion permission not applicable on this platform");
            return false;
        };
        info!(%result, "Motion permission result");
        self.refresh_motion_permission().await
    }

    /// Remove every recorded sample.
    pub fn clear_history(&self) {
        self.history.clear();
        info!("History cleared");
    }

    /// Stop routing provider events.
    pub fn shutdown(&self) {
        if let Some(subscription) = self.subscription.get() {
            subscription.token.cancel();
        }
    }

    // --- Status helpers ---

    fn set_setup(&self, setup: SetupState) {
        self.status.send_if_modified(|status| {
            let changed = status.setup != setup;
            status.setup = setup;
            changed
        });
    }

    fn update_permissions(&self, update: impl FnOnce(&mut PermissionSnapshot)) {
        self.status.send_if_modified(|status| {
            let before = status.permissions;
            update(&mut status.permissions);
            status.permissions != before
        });
    }
}
