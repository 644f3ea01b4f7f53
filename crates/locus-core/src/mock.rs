//! Mock provider and permission backend for testing.
//!
//! This module provides a [`MockProvider`] that implements
//! [`LocationProvider`] without any platform engine behind it, and a
//! [`MockPermissions`] backend for the [`PermissionGateway`](crate::PermissionGateway).
//!
//! # Features
//!
//! - **Failure injection**: make `ready`, `set_config`, `start`, watch
//!   acquisition or one-shot positions fail
//! - **Latency simulation**: delay `ready` to widen race windows, stall
//!   one-shot positions past their timeout
//! - **Acquisition gating**: hold watch acquisitions in flight until released
//! - **Accounting**: call counters, recorded configuration, live and peak
//!   watch counts
//! - **Event injection**: emit any [`ProviderEvent`], including events
//!   delivered while `ready` is running

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{RwLock, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use locus_types::{
    AuthorizationStatus, Coords, GeofenceAction, GeofenceEvent, Location, MotionChangeEvent,
    ProviderChangeEvent, ProviderState,
};

use crate::config::{ConfigPatch, ProviderConfig};
use crate::error::{Error, Result};
use crate::events::{EventDispatcher, EventReceiver, ProviderEvent};
use crate::headless::{HeadlessOutcome, HeadlessTask, HeadlessTaskEvent};
use crate::permissions::{PermissionBackend, PermissionStatus, Platform};
use crate::traits::{CurrentPositionOptions, LocationProvider, WatchHandle, WatchOptions, WatchSender};

/// Capacity of the mock engine's event channel.
const EVENT_CAPACITY: usize = 256;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct LiveWatch {
    id: Uuid,
    token: CancellationToken,
    sink: WatchSender,
}

/// A mock location provider for testing.
///
/// # Example
///
/// ```
/// use locus_core::{LocationProvider, MockProvider, ProviderConfig, TrackingConfig};
///
/// #[tokio::main]
/// async fn main() {
///     let provider = MockProvider::new();
///     let config = ProviderConfig::derive(&TrackingConfig::default(), true);
///     provider.ready(&config).await.unwrap();
///     let state = provider.start().await.unwrap();
///     assert!(state.enabled);
/// }
/// ```
pub struct MockProvider {
    events: EventDispatcher,
    state: RwLock<ProviderState>,
    authorization: RwLock<AuthorizationStatus>,
    current_position: RwLock<Location>,
    last_config: RwLock<Option<ProviderConfig>>,
    patches: RwLock<Vec<ConfigPatch>>,
    ready_events: Mutex<Vec<ProviderEvent>>,
    watches: Mutex<Vec<LiveWatch>>,
    headless_task: Mutex<Option<HeadlessTask>>,
    watch_gate: watch::Sender<bool>,
    pending_watches: AtomicUsize,
    peak_live_watches: AtomicUsize,
    subscribe_count: AtomicU32,
    ready_count: AtomicU32,
    set_config_count: AtomicU32,
    start_count: AtomicU32,
    get_state_count: AtomicU32,
    current_position_count: AtomicU32,
    watch_count: AtomicU32,
    permission_request_count: AtomicU32,
    fail_ready: AtomicBool,
    fail_set_config: AtomicBool,
    fail_start: AtomicBool,
    fail_watch: AtomicBool,
    fail_current_position: AtomicBool,
    ready_latency: Duration,
    /// Simulated `get_current_position` latency in milliseconds (0 = no delay).
    current_position_latency_ms: AtomicU64,
}

impl std::fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProvider")
            .field("ready_count", &self.ready_count())
            .field("start_count", &self.start_count())
            .field("live_watches", &self.live_watch_count())
            .finish()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Create a mock provider with an always-authorized engine.
    pub fn new() -> Self {
        MockProviderBuilder::new().build()
    }

    /// Start building a mock provider.
    pub fn builder() -> MockProviderBuilder {
        MockProviderBuilder::new()
    }

    fn default_position() -> Location {
        Location::new(
            Coords::new(37.3318, -122.0312, Some(12.0)),
            OffsetDateTime::UNIX_EPOCH,
        )
    }

    // --- Event injection ---

    /// Broadcast an event to every subscriber.
    pub fn emit(&self, event: ProviderEvent) {
        self.events.send(event);
    }

    /// Broadcast a primary-stream location.
    pub fn emit_location(&self, location: Location) {
        self.emit(ProviderEvent::Location(location));
    }

    /// Broadcast a motion change carrying `location`.
    pub fn emit_motion_change(&self, is_moving: bool, location: Location) {
        self.emit(ProviderEvent::MotionChange(MotionChangeEvent {
            is_moving,
            location,
        }));
    }

    /// Broadcast a geofence crossing.
    pub fn emit_geofence(&self, identifier: &str, action: GeofenceAction, location: Location) {
        self.emit(ProviderEvent::Geofence(GeofenceEvent {
            identifier: identifier.to_string(),
            action,
            location,
        }));
    }

    /// Broadcast a provider change.
    pub fn emit_provider_change(&self, status: AuthorizationStatus, gps: bool, network: bool) {
        self.emit(ProviderEvent::ProviderChange(ProviderChangeEvent {
            status,
            enabled: true,
            gps,
            network,
        }));
    }

    /// Deliver a fix to every live watch and echo it on the primary stream
    /// flagged as a watch sample. Returns the number of watches reached.
    pub fn emit_watch_fix(&self, location: Location) -> usize {
        let sample = location.as_watch_sample();
        let delivered = {
            let watches = lock(&self.watches);
            watches
                .iter()
                .filter(|w| !w.token.is_cancelled())
                .filter(|w| w.sink.try_send(Ok(sample.clone())).is_ok())
                .count()
        };
        self.emit_location(sample);
        delivered
    }

    /// Deliver an acquisition error to every live watch.
    pub fn emit_watch_error(&self, code: i32) {
        let watches = lock(&self.watches);
        for watch in watches.iter().filter(|w| !w.token.is_cancelled()) {
            let _ = watch
                .sink
                .try_send(Err(Error::acquisition_code("watch_position", code)));
        }
    }

    /// Queue an event to be broadcast while the next `ready` call runs.
    pub fn emit_during_ready(&self, event: ProviderEvent) {
        lock(&self.ready_events).push(event);
    }

    // --- Behavior control ---

    /// Set the status returned by `request_permission`.
    pub async fn set_authorization(&self, status: AuthorizationStatus) {
        *self.authorization.write().await = status;
    }

    /// Set the fix returned by `get_current_position`.
    pub async fn set_current_position(&self, location: Location) {
        *self.current_position.write().await = location;
    }

    /// Set the engine's enabled flag directly.
    pub async fn set_enabled(&self, enabled: bool) {
        self.state.write().await.enabled = enabled;
    }

    pub fn set_fail_ready(&self, fail: bool) {
        self.fail_ready.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_set_config(&self, fail: bool) {
        self.fail_set_config.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_watch(&self, fail: bool) {
        self.fail_watch.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_current_position(&self, fail: bool) {
        self.fail_current_position.store(fail, Ordering::Relaxed);
    }

    /// Set simulated `get_current_position` latency.
    pub fn set_current_position_latency(&self, latency: Duration) {
        self.current_position_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Hold watch acquisitions in flight until [`release_watches`](Self::release_watches).
    pub fn hold_watches(&self) {
        self.watch_gate.send_replace(false);
    }

    /// Let held and future watch acquisitions complete.
    pub fn release_watches(&self) {
        self.watch_gate.send_replace(true);
    }

    /// Number of watch acquisitions currently waiting on the gate.
    pub fn pending_watch_count(&self) -> usize {
        self.pending_watches.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` acquisitions are held on the gate.
    pub async fn wait_for_pending_watches(&self, count: usize) {
        while self.pending_watch_count() < count {
            tokio::task::yield_now().await;
        }
    }

    // --- Accounting ---

    /// Number of watches acquired and not yet retired.
    pub fn live_watch_count(&self) -> usize {
        lock(&self.watches)
            .iter()
            .filter(|w| !w.token.is_cancelled())
            .count()
    }

    /// Identifiers of live watches.
    pub fn live_watch_ids(&self) -> Vec<Uuid> {
        lock(&self.watches)
            .iter()
            .filter(|w| !w.token.is_cancelled())
            .map(|w| w.id)
            .collect()
    }

    /// Highest number of simultaneously live watches ever observed.
    pub fn peak_live_watches(&self) -> usize {
        self.peak_live_watches.load(Ordering::SeqCst)
    }

    /// Number of watches acquired and since retired.
    pub fn retired_watch_count(&self) -> usize {
        lock(&self.watches)
            .iter()
            .filter(|w| w.token.is_cancelled())
            .count()
    }

    pub fn subscribe_count(&self) -> u32 {
        self.subscribe_count.load(Ordering::Relaxed)
    }

    pub fn ready_count(&self) -> u32 {
        self.ready_count.load(Ordering::Relaxed)
    }

    pub fn set_config_count(&self) -> u32 {
        self.set_config_count.load(Ordering::Relaxed)
    }

    pub fn start_count(&self) -> u32 {
        self.start_count.load(Ordering::Relaxed)
    }

    pub fn get_state_count(&self) -> u32 {
        self.get_state_count.load(Ordering::Relaxed)
    }

    pub fn current_position_count(&self) -> u32 {
        self.current_position_count.load(Ordering::Relaxed)
    }

    /// Number of `watch_position` calls, successful or not.
    pub fn watch_count(&self) -> u32 {
        self.watch_count.load(Ordering::Relaxed)
    }

    pub fn permission_request_count(&self) -> u32 {
        self.permission_request_count.load(Ordering::Relaxed)
    }

    /// Configuration passed to the last successful `ready`.
    pub async fn last_config(&self) -> Option<ProviderConfig> {
        self.last_config.read().await.clone()
    }

    /// Every patch applied with `set_config`, oldest first.
    pub async fn patches(&self) -> Vec<ConfigPatch> {
        self.patches.read().await.clone()
    }

    // --- Headless delivery ---

    /// Whether a headless task has been registered.
    pub fn has_headless_task(&self) -> bool {
        lock(&self.headless_task).is_some()
    }

    /// Invoke the registered headless task, as the OS would after reviving
    /// the process.
    pub async fn deliver_headless(&self, event: HeadlessTaskEvent) -> Option<HeadlessOutcome> {
        let task = lock(&self.headless_task).clone()?;
        Some(task(event).await)
    }
}

#[async_trait]
impl LocationProvider for MockProvider {
    fn subscribe(&self) -> EventReceiver {
        self.subscribe_count.fetch_add(1, Ordering::Relaxed);
        self.events.subscribe()
    }

    async fn ready(&self, config: &ProviderConfig) -> Result<ProviderState> {
        self.ready_count.fetch_add(1, Ordering::Relaxed);

        if !self.ready_latency.is_zero() {
            tokio::time::sleep(self.ready_latency).await;
        }

        let queued: Vec<ProviderEvent> = lock(&self.ready_events).drain(..).collect();
        for event in queued {
            self.events.send(event);
        }

        if self.fail_ready.load(Ordering::Relaxed) {
            return Err(Error::configuration("mock engine rejected configuration"));
        }

        *self.last_config.write().await = Some(config.clone());
        Ok(*self.state.read().await)
    }

    async fn set_config(&self, patch: &ConfigPatch) -> Result<()> {
        self.set_config_count.fetch_add(1, Ordering::Relaxed);
        if self.fail_set_config.load(Ordering::Relaxed) {
            return Err(Error::configuration("mock engine rejected config update"));
        }
        self.patches.write().await.push(*patch);
        Ok(())
    }

    async fn start(&self) -> Result<ProviderState> {
        self.start_count.fetch_add(1, Ordering::Relaxed);
        if self.fail_start.load(Ordering::Relaxed) {
            return Err(Error::provider("mock engine failed to start"));
        }
        let mut state = self.state.write().await;
        state.enabled = true;
        Ok(*state)
    }

    async fn get_state(&self) -> Result<ProviderState> {
        self.get_state_count.fetch_add(1, Ordering::Relaxed);
        Ok(*self.state.read().await)
    }

    async fn get_current_position(&self, _options: &CurrentPositionOptions) -> Result<Location> {
        self.current_position_count.fetch_add(1, Ordering::Relaxed);
        let latency = self.current_position_latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.fail_current_position.load(Ordering::Relaxed) {
            return Err(Error::acquisition_code("get_current_position", 408));
        }
        Ok(self.current_position.read().await.clone())
    }

    async fn watch_position(
        &self,
        _options: &WatchOptions,
        sink: WatchSender,
    ) -> Result<WatchHandle> {
        self.watch_count.fetch_add(1, Ordering::Relaxed);

        self.pending_watches.fetch_add(1, Ordering::SeqCst);
        let mut gate = self.watch_gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;
        self.pending_watches.fetch_sub(1, Ordering::SeqCst);

        if self.fail_watch.load(Ordering::Relaxed) {
            return Err(Error::acquisition("watch_position", "mock watch unavailable"));
        }

        let handle = WatchHandle::new();
        let mut watches = lock(&self.watches);
        watches.push(LiveWatch {
            id: handle.id(),
            token: handle.retired_token(),
            sink,
        });
        let live = watches.iter().filter(|w| !w.token.is_cancelled()).count();
        self.peak_live_watches.fetch_max(live, Ordering::SeqCst);
        Ok(handle)
    }

    async fn request_permission(&self) -> Result<AuthorizationStatus> {
        self.permission_request_count.fetch_add(1, Ordering::Relaxed);
        Ok(*self.authorization.read().await)
    }

    fn register_headless_task(&self, task: HeadlessTask) {
        *lock(&self.headless_task) = Some(task);
    }
}

/// Builder for mock providers with custom initial behavior.
#[derive(Debug)]
pub struct MockProviderBuilder {
    authorization: AuthorizationStatus,
    current_position: Location,
    enabled: bool,
    fail_ready: bool,
    fail_watch: bool,
    ready_latency: Duration,
}

impl Default for MockProviderBuilder {
    fn default() -> Self {
        Self {
            authorization: AuthorizationStatus::Always,
            current_position: MockProvider::default_position(),
            enabled: false,
            fail_ready: false,
            fail_watch: false,
            ready_latency: Duration::ZERO,
        }
    }
}

impl MockProviderBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Status returned by `request_permission`.
    #[must_use]
    pub fn authorization(mut self, status: AuthorizationStatus) -> Self {
        self.authorization = status;
        self
    }

    /// Fix returned by `get_current_position`.
    #[must_use]
    pub fn current_position(mut self, location: Location) -> Self {
        self.current_position = location;
        self
    }

    /// Start with the engine already enabled, as after an OS relaunch.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn fail_ready(mut self, fail: bool) -> Self {
        self.fail_ready = fail;
        self
    }

    #[must_use]
    pub fn fail_watch(mut self, fail: bool) -> Self {
        self.fail_watch = fail;
        self
    }

    #[must_use]
    pub fn ready_latency(mut self, latency: Duration) -> Self {
        self.ready_latency = latency;
        self
    }

    /// Build the mock provider.
    #[must_use]
    pub fn build(self) -> MockProvider {
        let (watch_gate, _) = watch::channel(true);
        MockProvider {
            events: EventDispatcher::new(EVENT_CAPACITY),
            state: RwLock::new(ProviderState {
                enabled: self.enabled,
                ..Default::default()
            }),
            authorization: RwLock::new(self.authorization),
            current_position: RwLock::new(self.current_position),
            last_config: RwLock::new(None),
            patches: RwLock::new(Vec::new()),
            ready_events: Mutex::new(Vec::new()),
            watches: Mutex::new(Vec::new()),
            headless_task: Mutex::new(None),
            watch_gate,
            pending_watches: AtomicUsize::new(0),
            peak_live_watches: AtomicUsize::new(0),
            subscribe_count: AtomicU32::new(0),
            ready_count: AtomicU32::new(0),
            set_config_count: AtomicU32::new(0),
            start_count: AtomicU32::new(0),
            get_state_count: AtomicU32::new(0),
            current_position_count: AtomicU32::new(0),
            watch_count: AtomicU32::new(0),
            permission_request_count: AtomicU32::new(0),
            fail_ready: AtomicBool::new(self.fail_ready),
            fail_set_config: AtomicBool::new(false),
            fail_start: AtomicBool::new(false),
            fail_watch: AtomicBool::new(self.fail_watch),
            fail_current_position: AtomicBool::new(false),
            ready_latency: self.ready_latency,
            current_position_latency_ms: AtomicU64::new(0),
        }
    }
}

/// Generate a fix within roughly `radius_m` meters of a point.
pub fn jittered_location(latitude: f64, longitude: f64, radius_m: f64) -> Location {
    // One degree of latitude is about 111 km.
    let scale = radius_m / 111_000.0;
    let dlat = (rand::random::<f64>() * 2.0 - 1.0) * scale;
    let dlng = (rand::random::<f64>() * 2.0 - 1.0) * scale;
    let accuracy = 3.0 + rand::random::<f64>() * 20.0;
    Location::new(
        Coords::new(latitude + dlat, longitude + dlng, Some(accuracy)),
        OffsetDateTime::now_utc(),
    )
}

/// A scripted permission backend.
pub struct MockPermissions {
    platform: Platform,
    motion_status: Mutex<PermissionStatus>,
    grant_on_request: AtomicBool,
    should_fail: AtomicBool,
    check_count: AtomicU32,
    request_count: AtomicU32,
}

impl std::fmt::Debug for MockPermissions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockPermissions")
            .field("platform", &self.platform)
            .field("motion_status", &*lock(&self.motion_status))
            .finish()
    }
}

impl MockPermissions {
    /// Create a backend for `platform` with motion permission denied.
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            motion_status: Mutex::new(PermissionStatus::Denied),
            grant_on_request: AtomicBool::new(false),
            should_fail: AtomicBool::new(false),
            check_count: AtomicU32::new(0),
            request_count: AtomicU32::new(0),
        }
    }

    /// Set the motion permission status.
    pub fn set_motion_status(&self, status: PermissionStatus) {
        *lock(&self.motion_status) = status;
    }

    /// Make every check and request fail.
    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::Relaxed);
    }

    /// When set, a request flips the motion permission to granted.
    pub fn grant_motion_on_request(&self, grant: bool) {
        self.grant_on_request.store(grant, Ordering::Relaxed);
    }

    pub fn check_count(&self) -> u32 {
        self.check_count.load(Ordering::Relaxed)
    }

    pub fn request_count(&self) -> u32 {
        self.request_count.load(Ordering::Relaxed)
    }

    fn check_should_fail(&self, operation: &str) -> Result<()> {
        if self.should_fail.load(Ordering::Relaxed) {
            Err(Error::provider(format!("mock permission {} failed", operation)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PermissionBackend for MockPermissions {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn check(&self, _permission: &str) -> Result<PermissionStatus> {
        self.check_count.fetch_add(1, Ordering::Relaxed);
        self.check_should_fail("check")?;
        Ok(*lock(&self.motion_status))
    }

    async fn request(&self, _permission: &str) -> Result<PermissionStatus> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.check_should_fail("request")?;
        let mut status = lock(&self.motion_status);
        if self.grant_on_request.load(Ordering::Relaxed) {
            *status = PermissionStatus::Granted;
        }
        Ok(*status)
    }
}
