//! Scenario tests for locus-core.
//!
//! These drive full sessions against `MockProvider` and `MockPermissions`:
//! setup, permission gating, motion reconciliation, foreground watch
//! deduplication and headless delivery.

use std::sync::Arc;
use std::time::Duration;

use locus_core::{
    ActivationOutcome, ActivationSkip, AppState, ConfigPatch, HeadlessEventKind, HeadlessOutcome,
    HeadlessTaskEvent, HistoryStore, MockPermissions, MockProvider, PermissionGateway,
    PermissionStatus, Platform, ProviderEvent, SetupOutcome, TrackingConfig, TrackingSession,
    WatchState, handle_headless_event,
};
use locus_types::{
    AuthorizationStatus, Coords, GeofenceAction, Location, LocationPermission,
    ProviderChangeEvent,
};
use serde_json::json;
use time::macros::datetime;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

/// Route library logs to the test harness; set `RUST_LOG` to see them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let waited = timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

fn fix(lat: f64, lng: f64) -> Location {
    Location::new(
        Coords::new(lat, lng, Some(6.0)),
        datetime!(2026-07-14 16:20:00 UTC),
    )
}

fn provider_change(status: AuthorizationStatus) -> ProviderEvent {
    ProviderEvent::ProviderChange(ProviderChangeEvent {
        status,
        enabled: true,
        gps: true,
        network: true,
    })
}

struct Harness {
    provider: Arc<MockProvider>,
    permissions: Arc<MockPermissions>,
    session: TrackingSession,
}

async fn start_session(provider: MockProvider, app_state: AppState) -> Harness {
    init_tracing();
    let provider = Arc::new(provider);
    let permissions = Arc::new(MockPermissions::new(Platform::Ios));
    let session = TrackingSession::start(
        provider.clone(),
        PermissionGateway::new(permissions.clone()),
        TrackingConfig::default(),
        app_state,
    )
    .await;
    Harness {
        provider,
        permissions,
        session,
    }
}

// =============================================================================
// Setup and activation
// =============================================================================

#[tokio::test]
async fn test_always_permission_starts_once() {
    let provider = MockProvider::new();
    provider.emit_during_ready(provider_change(AuthorizationStatus::Always));

    let h = start_session(provider, AppState::Background).await;
    assert_eq!(h.session.setup_outcome(), &SetupOutcome::Configured);

    let coordinator = h.session.coordinator().clone();
    eventually("permission always", || {
        coordinator.status().permissions.location == LocationPermission::Always
    })
    .await;
    eventually("start issued", || h.provider.start_count() == 1).await;

    assert!(h.session.status().is_ready());
    assert_eq!(
        coordinator.activate_if_permitted().await,
        ActivationOutcome::AlreadyEnabled
    );
    assert_eq!(h.provider.start_count(), 1);

    h.session.shutdown().await;
}

#[tokio::test]
async fn test_blocked_permission_never_starts() {
    let provider = MockProvider::new();
    provider.emit_during_ready(provider_change(AuthorizationStatus::Denied));

    let h = start_session(provider, AppState::Active).await;
    let coordinator = h.session.coordinator().clone();
    eventually("permission blocked", || {
        coordinator.status().permissions.location == LocationPermission::Blocked
    })
    .await;

    assert_eq!(
        coordinator.activate_if_permitted().await,
        ActivationOutcome::Skipped(ActivationSkip::Permission(LocationPermission::Blocked))
    );
    assert_eq!(h.provider.start_count(), 0);
    assert_eq!(h.session.watch_state(), WatchState::Stopped);
    assert_eq!(h.provider.watch_count(), 0);

    h.session.shutdown().await;
}

#[tokio::test]
async fn test_failed_setup_blocks_start_until_retry() {
    let provider = MockProvider::builder().fail_ready(true).build();
    provider.emit_during_ready(provider_change(AuthorizationStatus::Always));

    let h = start_session(provider, AppState::Background).await;
    assert!(matches!(h.session.setup_outcome(), SetupOutcome::Failed(_)));

    let coordinator = h.session.coordinator().clone();
    eventually("permission always", || {
        coordinator.status().permissions.location == LocationPermission::Always
    })
    .await;
    assert_eq!(h.provider.start_count(), 0);

    h.provider.set_fail_ready(false);
    assert_eq!(coordinator.initialize().await, SetupOutcome::Configured);
    assert_eq!(h.provider.start_count(), 1);

    h.session.shutdown().await;
}

#[tokio::test]
async fn test_repeated_initialize_is_idempotent() {
    let h = start_session(MockProvider::new(), AppState::Active).await;
    let coordinator = h.session.coordinator().clone();
    coordinator.request_location_permission().await;
    eventually("watch active", || h.session.watch_state() == WatchState::Active).await;

    let subscriptions = h.provider.subscribe_count();
    for _ in 0..3 {
        assert_eq!(coordinator.initialize().await, SetupOutcome::AlreadyReady);
    }

    assert_eq!(h.provider.ready_count(), 1);
    assert_eq!(h.provider.subscribe_count(), subscriptions);
    assert_eq!(h.provider.live_watch_count(), 1);
    assert_eq!(h.provider.peak_live_watches(), 1);

    h.session.shutdown().await;
}

// =============================================================================
// Motion reconciliation
// =============================================================================

#[tokio::test]
async fn test_motion_grant_applies_narrow_update_once() {
    let h = start_session(MockProvider::new(), AppState::Background).await;
    let initial = h.provider.last_config().await.unwrap();
    assert!(initial.disable_motion_activity_updates);

    h.permissions.set_motion_status(PermissionStatus::Granted);
    let coordinator = h.session.coordinator();
    assert!(coordinator.refresh_motion_permission().await);
    assert_eq!(coordinator.initialize().await, SetupOutcome::AlreadyReady);

    assert_eq!(h.provider.patches().await, vec![ConfigPatch::motion(false, 25.0)]);
    assert_eq!(h.provider.ready_count(), 1);
    assert_eq!(coordinator.status().permissions.motion, Some(true));

    h.session.shutdown().await;
}

// =============================================================================
// Foreground watch
// =============================================================================

#[tokio::test]
async fn test_watch_fix_recorded_exactly_once() {
    let h = start_session(MockProvider::new(), AppState::Active).await;
    h.session.coordinator().request_location_permission().await;
    eventually("watch active", || h.session.watch_state() == WatchState::Active).await;

    assert_eq!(h.provider.emit_watch_fix(fix(48.85, 2.35)), 1);
    h.provider.emit_location(fix(48.86, 2.36));

    let history = h.session.history().clone();
    eventually("two samples", || history.len() == 2).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mut lats: Vec<f64> = history.entries().iter().map(|s| s.latitude).collect();
    lats.sort_by(f64::total_cmp);
    assert_eq!(lats, vec![48.85, 48.86]);

    h.session.shutdown().await;
}

#[tokio::test]
async fn test_motion_and_geofence_recorded_by_coordinator() {
    let h = start_session(MockProvider::new(), AppState::Background).await;

    h.provider.emit_motion_change(true, fix(1.0, 1.0));
    h.provider
        .emit_geofence("home", GeofenceAction::Exit, fix(2.0, 2.0));

    let history = h.session.history().clone();
    eventually("two samples", || history.len() == 2).await;
    let lats: Vec<f64> = history.entries().iter().map(|s| s.latitude).collect();
    assert_eq!(lats, vec![2.0, 1.0]);

    h.session.shutdown().await;
}

#[tokio::test]
async fn test_background_during_acquisition_retires_watch() {
    let provider = MockProvider::new();
    provider.hold_watches();
    let h = start_session(provider, AppState::Active).await;

    h.session.coordinator().request_location_permission().await;
    h.provider.wait_for_pending_watches(1).await;
    assert_eq!(h.session.watch_state(), WatchState::Starting);

    h.session.set_app_state(AppState::Background);
    eventually("watch stopped", || h.session.watch_state() == WatchState::Stopped).await;

    h.provider.release_watches();
    eventually("stale watch retired", || h.provider.retired_watch_count() == 1).await;

    assert_eq!(h.provider.live_watch_count(), 0);
    assert_eq!(h.session.watch_state(), WatchState::Stopped);

    h.session.shutdown().await;
}

#[tokio::test]
async fn test_foreground_cycle_and_provider_change() {
    let h = start_session(MockProvider::new(), AppState::Active).await;
    h.session.coordinator().request_location_permission().await;
    eventually("watch active", || h.session.watch_state() == WatchState::Active).await;

    h.session.set_app_state(AppState::Background);
    eventually("watch stopped", || h.provider.live_watch_count() == 0).await;

    h.session.set_app_state(AppState::Active);
    eventually("watch restarted", || h.provider.live_watch_count() == 1).await;

    let before = h.provider.watch_count();
    h.provider
        .emit_provider_change(AuthorizationStatus::Always, true, false);
    eventually("watch re-acquired", || h.provider.watch_count() == before + 1).await;
    eventually("single live watch", || {
        h.provider.live_watch_count() == 1 && h.session.watch_state() == WatchState::Active
    })
    .await;

    assert_eq!(h.provider.peak_live_watches(), 1);

    h.session.shutdown().await;
    assert_eq!(h.provider.live_watch_count(), 0);
}

#[tokio::test]
async fn test_foreground_notification_refreshes_active_watch() {
    let h = start_session(MockProvider::new(), AppState::Active).await;
    h.session.coordinator().request_location_permission().await;
    eventually("watch active", || h.session.watch_state() == WatchState::Active).await;

    let before = h.provider.watch_count();
    h.session.set_app_state(AppState::Active);
    eventually("watch refreshed", || h.provider.retired_watch_count() == 1).await;
    eventually("single live watch", || {
        h.provider.live_watch_count() == 1 && h.session.watch_state() == WatchState::Active
    })
    .await;

    assert_eq!(h.provider.watch_count(), before + 1);
    assert_eq!(h.provider.peak_live_watches(), 1);

    h.session.shutdown().await;
}

// =============================================================================
// Headless delivery
// =============================================================================

#[tokio::test]
async fn test_headless_location_without_live_coordinator() {
    let history = HistoryStore::new();
    let event = HeadlessTaskEvent::new(
        "location",
        json!({
            "coords": {"latitude": 37.0, "longitude": -122.0, "accuracy": 15.0},
            "timestamp": "2026-07-14T02:00:00Z",
            "isMoving": true
        }),
    );

    let outcome = handle_headless_event(&event, &history).await;

    assert!(matches!(
        outcome,
        HeadlessOutcome::Processed {
            kind: HeadlessEventKind::Location,
            ..
        }
    ));
    let sample = history.latest().unwrap();
    assert_eq!((sample.latitude, sample.longitude), (37.0, -122.0));
    assert_eq!(sample.accuracy, Some(15.0));
}

#[tokio::test]
async fn test_session_registers_headless_task() {
    let h = start_session(MockProvider::new(), AppState::Background).await;
    assert!(h.provider.has_headless_task());

    let outcome = h
        .provider
        .deliver_headless(HeadlessTaskEvent::location(&fix(37.0, -122.0)).unwrap())
        .await
        .unwrap();
    assert!(matches!(outcome, HeadlessOutcome::Processed { .. }));
    assert_eq!(h.session.history().len(), 1);

    let ignored = h
        .provider
        .deliver_headless(HeadlessTaskEvent::new("heartbeat", json!({})))
        .await
        .unwrap();
    assert!(matches!(ignored, HeadlessOutcome::Ignored { .. }));

    h.session.shutdown().await;
}

#[tokio::test]
async fn test_headless_disabled_by_config() {
    let provider = Arc::new(MockProvider::new());
    let mut config = TrackingConfig::default();
    config.app.enable_headless = false;

    let session = TrackingSession::start(
        provider.clone(),
        PermissionGateway::new(Arc::new(MockPermissions::new(Platform::Other))),
        config,
        AppState::Background,
    )
    .await;

    assert!(!provider.has_headless_task());
    session.shutdown().await;
}

// =============================================================================
// Configuration
// =============================================================================

#[tokio::test]
async fn test_session_honors_loaded_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tracking.toml");
    std::fs::write(
        &path,
        r#"
[geolocation]
stationary_radius = 15.0

[history]
max_entries = 2
"#,
    )
    .unwrap();

    let config = TrackingConfig::load_validated(&path).unwrap();
    let provider = Arc::new(MockProvider::new());
    let session = TrackingSession::start(
        provider.clone(),
        PermissionGateway::new(Arc::new(MockPermissions::new(Platform::Ios))),
        config,
        AppState::Background,
    )
    .await;

    let sent = provider.last_config().await.unwrap();
    assert_eq!(sent.geolocation.stationary_radius, 15.0);
    assert_eq!(sent.geolocation.distance_filter, 50.0);

    for lat in [1.0, 2.0, 3.0] {
        provider.emit_location(fix(lat, 0.0));
    }
    let history = session.history().clone();
    eventually("capped history", || {
        history.latest().map(|s| s.latitude) == Some(3.0)
    })
    .await;
    assert_eq!(history.len(), 2);

    session.shutdown().await;
}
