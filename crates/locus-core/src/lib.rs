//! Lifecycle-aware coordinator for background location tracking engines.
//!
//! This crate drives an opaque, background-capable location engine (the
//! [`LocationProvider`]) through process start, foreground and background
//! transitions, OS relaunches and headless delivery, and routes every
//! location-bearing event into one in-memory [`HistoryStore`].
//!
//! # Features
//!
//! - **Crash-safe setup**: the engine is configured unconditionally at
//!   process start, with event subscription established first
//! - **Permission gating**: tracking starts only once the engine is ready
//!   and location permission is `always` or `foreground`
//! - **Motion reconciliation**: motion-permission changes are applied as a
//!   narrow config update, never a full re-configure
//! - **Foreground watch**: a supplementary high-frequency watch bound to the
//!   app lifecycle, with at most one live watch at a time
//! - **Headless routing**: a stateless router for events delivered to a
//!   revived process
//! - **Mocks**: [`MockProvider`] and [`MockPermissions`] for tests and
//!   simulation
//!
//! # Components
//!
//! | Component | Role |
//! |-----------|------|
//! | [`TrackingCoordinator`] | setup, activation and event routing |
//! | [`ForegroundWatchManager`] | foreground watch state machine |
//! | [`handle_headless_event`] | headless event router |
//! | [`PermissionGateway`] | normalized motion permission queries |
//! | [`HistoryStore`] | most-recent-first sample log |
//! | [`TrackingSession`] | wires the above together |
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use locus_core::{
//!     AppState, MockPermissions, MockProvider, PermissionGateway, Platform, TrackingConfig,
//!     TrackingSession,
//! };
//! use locus_types::AuthorizationStatus;
//!
//! #[tokio::main]
//! async fn main() {
//!     let provider = Arc::new(MockProvider::new());
//!     let permissions = PermissionGateway::new(Arc::new(MockPermissions::new(Platform::Android)));
//!
//!     let session = TrackingSession::start(
//!         provider.clone(),
//!         permissions,
//!         TrackingConfig::default(),
//!         AppState::Active,
//!     )
//!     .await;
//!
//!     session.coordinator().request_location_permission().await;
//!     assert_eq!(provider.start_count(), 1);
//!
//!     session.shutdown().await;
//! }
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod headless;
pub mod history;
pub mod mock;
pub mod permissions;
pub mod session;
pub mod traits;
pub mod watch;

pub use locus_types::types;

pub use config::{ConfigError, ConfigPatch, ProviderConfig, TrackingConfig, ValidationError};
pub use coordinator::{
    ActivationOutcome, ActivationSkip, SetupOutcome, SetupState, TrackingCoordinator,
    TrackingStatus,
};
pub use error::{Error, Result};
pub use events::{EventDispatcher, EventReceiver, EventSender, ProviderEvent};
pub use headless::{
    HeadlessEventKind, HeadlessOutcome, HeadlessTask, HeadlessTaskEvent, PositionProcessor,
    handle_headless_event, headless_task,
};
pub use history::HistoryStore;
pub use mock::{MockPermissions, MockProvider, MockProviderBuilder};
pub use permissions::{PermissionBackend, PermissionGateway, PermissionStatus, Platform};
pub use session::TrackingSession;
pub use traits::{
    CurrentPositionOptions, LocationProvider, SharedProvider, WatchHandle, WatchOptions,
    WatchSender, WatchUpdate,
};
pub use watch::{AppState, ForegroundWatchManager, WatchState};
