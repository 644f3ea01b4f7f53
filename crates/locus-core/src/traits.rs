//! Trait abstractions for the location engine.
//!
//! This module provides the [`LocationProvider`] trait that abstracts over
//! a platform background-location engine, and the option and handle types
//! that cross that seam. The coordinator only configures, starts and
//! subscribes to a provider; acquiring fixes is entirely the provider's job.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use locus_types::{AuthorizationStatus, DesiredAccuracy, Location, ProviderState};

use crate::config::{ConfigPatch, CurrentPositionConfig, ForegroundWatchConfig, ProviderConfig};
use crate::error::Result;
use crate::events::EventReceiver;
use crate::headless::HeadlessTask;

/// Options for a continuous position watch.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchOptions {
    /// Interval between fixes.
    pub interval: Duration,
    /// Whether the engine should persist watch fixes.
    pub persist: bool,
    pub desired_accuracy: DesiredAccuracy,
    /// Per-fix timeout.
    pub timeout: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self::from(&ForegroundWatchConfig::default())
    }
}

impl From<&ForegroundWatchConfig> for WatchOptions {
    fn from(config: &ForegroundWatchConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.interval_ms),
            persist: config.persist,
            desired_accuracy: config.desired_accuracy,
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

/// Options for a one-shot position request.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentPositionOptions {
    /// Desired accuracy in meters.
    pub desired_accuracy_meters: u32,
    /// Maximum age of a cached fix that may be returned.
    pub maximum_age: Duration,
    pub timeout: Duration,
}

impl Default for CurrentPositionOptions {
    fn default() -> Self {
        Self::from(&CurrentPositionConfig::default())
    }
}

impl From<&CurrentPositionConfig> for CurrentPositionOptions {
    fn from(config: &CurrentPositionConfig) -> Self {
        Self {
            desired_accuracy_meters: config.desired_accuracy_meters,
            maximum_age: Duration::from_millis(config.maximum_age_ms),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// Item delivered on a watch channel.
pub type WatchUpdate = Result<Location>;

/// Sender half handed to the provider when a watch is acquired.
pub type WatchSender = mpsc::Sender<WatchUpdate>;

/// Handle to a live position watch.
///
/// The watch stays live until the handle is retired with
/// [`remove`](Self::remove) or dropped. Providers hold a clone of the
/// handle's [`CancellationToken`] and stop delivering once it fires.
#[derive(Debug)]
pub struct WatchHandle {
    id: Uuid,
    token: CancellationToken,
}

impl WatchHandle {
    /// Create a new handle with a fresh identifier.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            token: CancellationToken::new(),
        }
    }

    /// Identifier of this watch.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Token that fires when the watch is retired.
    pub fn retired_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Whether the watch has been retired.
    pub fn is_retired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Retire the watch.
    pub fn remove(self) {
        self.token.cancel();
    }
}

impl Default for WatchHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Trait abstracting a background-capable location engine.
///
/// Implementations are expected to serialize their own event delivery.
///
/// # Example
///
/// ```ignore
/// use locus_core::{LocationProvider, Result};
///
/// async fn print_state<P: LocationProvider + ?Sized>(provider: &P) -> Result<()> {
///     let state = provider.get_state().await?;
///     println!("enabled: {}", state.enabled);
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait LocationProvider: Send + Sync {
    // --- Events ---

    /// Subscribe to every event class the provider emits.
    fn subscribe(&self) -> EventReceiver;

    // --- Lifecycle ---

    /// Configure the engine and acknowledge it as ready.
    ///
    /// Must be called as early as possible after process start, whatever the
    /// permission state, so that an OS relaunch keeps tracking alive.
    async fn ready(&self, config: &ProviderConfig) -> Result<ProviderState>;

    /// Apply a narrow update to an already-ready engine.
    async fn set_config(&self, patch: &ConfigPatch) -> Result<()>;

    /// Start tracking.
    async fn start(&self) -> Result<ProviderState>;

    /// Query live engine state.
    async fn get_state(&self) -> Result<ProviderState>;

    // --- Positions ---

    /// Request a single fix.
    async fn get_current_position(&self, options: &CurrentPositionOptions) -> Result<Location>;

    /// Start a continuous watch delivering fixes to `sink`.
    ///
    /// Fixes are also echoed on the primary event stream with
    /// [`Location::watch_sample`] set.
    async fn watch_position(&self, options: &WatchOptions, sink: WatchSender)
    -> Result<WatchHandle>;

    // --- Permissions ---

    /// Prompt for location permission and return the resulting status.
    async fn request_permission(&self) -> Result<AuthorizationStatus>;

    // --- Headless delivery ---

    /// Register the task invoked when the OS revives the process only to
    /// deliver an event.
    fn register_headless_task(&self, task: HeadlessTask);
}

/// Type alias for a shared provider reference.
pub type SharedProvider = Arc<dyn LocationProvider>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_options_defaults() {
        let options = WatchOptions::default();
        assert_eq!(options.interval, Duration::from_secs(10));
        assert_eq!(options.timeout, Duration::from_secs(30));
        assert!(!options.persist);
        assert_eq!(options.desired_accuracy, DesiredAccuracy::High);
    }

    #[test]
    fn test_current_position_defaults() {
        let options = CurrentPositionOptions::default();
        assert_eq!(options.desired_accuracy_meters, 100);
        assert_eq!(options.maximum_age, Duration::from_secs(10));
        assert_eq!(options.timeout, Duration::from_secs(25));
    }

    #[test]
    fn test_watch_handle_retire() {
        let handle = WatchHandle::new();
        let token = handle.retired_token();
        assert!(!handle.is_retired());
        handle.remove();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_dropping_handle_retires() {
        let token = {
            let handle = WatchHandle::new();
            handle.retired_token()
        };
        assert!(token.is_cancelled());
    }
}
