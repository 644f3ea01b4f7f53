//! Tracking configuration.
//!
//! [`TrackingConfig`] holds the recognized engine options with their fixed
//! defaults and can be loaded from TOML. It is never sent to the provider as
//! is: each setup or reconciliation derives a [`ProviderConfig`] from it and
//! from the current permission snapshot.
//!
//! ```toml
//! [geolocation]
//! distance_filter = 50.0
//! stationary_radius = 25.0
//!
//! [foreground_watch]
//! interval_ms = 10000
//!
//! [history]
//! max_entries = 500
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use locus_types::DesiredAccuracy;

/// Complete tracking configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Geolocation sampling settings.
    pub geolocation: GeolocationConfig,
    /// Application lifecycle settings.
    pub app: AppConfig,
    /// Engine logger settings.
    pub logger: LoggerConfig,
    /// Engine-side persistence settings.
    pub persistence: PersistenceConfig,
    /// Supplementary foreground watch settings.
    pub foreground_watch: ForegroundWatchConfig,
    /// One-shot position request settings.
    pub current_position: CurrentPositionConfig,
    /// In-memory history settings.
    pub history: HistoryConfig,
}

impl TrackingConfig {
    /// Load configuration from the default path.
    ///
    /// Falls back to defaults when no file exists.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration, collecting every problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.geolocation.validate());
        errors.extend(self.app.validate());
        errors.extend(self.foreground_watch.validate());
        errors.extend(self.current_position.validate());
        errors.extend(self.history.validate());

        if self.persistence.max_days_to_persist == 0 {
            errors.push(ValidationError::new(
                "persistence.max_days_to_persist",
                "must be at least 1 day",
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Geolocation sampling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeolocationConfig {
    pub desired_accuracy: DesiredAccuracy,
    /// Minimum distance in meters between recorded fixes.
    pub distance_filter: f64,
    /// Radius in meters of the stationary geofence.
    ///
    /// Kept small: without motion-activity updates the stationary geofence
    /// exit is the only signal that the device started moving again.
    pub stationary_radius: f64,
    /// Minutes without movement before the engine goes stationary.
    pub stop_timeout_minutes: u32,
    pub disable_elasticity: bool,
    pub allow_identical_locations: bool,
    pub location_authorization_request: AuthorizationRequest,
    pub disable_location_authorization_alert: bool,
    pub shows_background_location_indicator: bool,
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            desired_accuracy: DesiredAccuracy::High,
            distance_filter: 50.0,
            stationary_radius: 25.0,
            stop_timeout_minutes: 5,
            disable_elasticity: false,
            allow_identical_locations: false,
            location_authorization_request: AuthorizationRequest::Any,
            disable_location_authorization_alert: true,
            shows_background_location_indicator: false,
        }
    }
}

impl GeolocationConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.distance_filter.is_nan() || self.distance_filter < 0.0 {
            errors.push(ValidationError::new(
                "geolocation.distance_filter",
                "must be a non-negative number of meters",
            ));
        }
        if self.stationary_radius.is_nan() || self.stationary_radius <= 0.0 {
            errors.push(ValidationError::new(
                "geolocation.stationary_radius",
                "must be greater than 0 meters",
            ));
        }
        if self.stop_timeout_minutes == 0 {
            errors.push(ValidationError::new(
                "geolocation.stop_timeout_minutes",
                "must be at least 1 minute",
            ));
        }
        errors
    }
}

/// Which authorization level the engine asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationRequest {
    /// Accept whatever the user grants.
    #[default]
    Any,
    Always,
    WhenInUse,
}

/// Application lifecycle settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Stop tracking when the app is terminated.
    pub stop_on_terminate: bool,
    /// Resume tracking after device reboot.
    pub start_on_boot: bool,
    /// Deliver events to the headless task when no UI is running.
    pub enable_headless: bool,
    /// Foreground service notification (Android).
    pub notification: NotificationConfig,
    /// Rationale shown before asking for background permission.
    pub background_permission_rationale: PermissionRationale,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            stop_on_terminate: false,
            start_on_boot: true,
            enable_headless: true,
            notification: NotificationConfig::default(),
            background_permission_rationale: PermissionRationale::default(),
        }
    }
}

impl AppConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.notification.channel_id.trim().is_empty() {
            errors.push(ValidationError::new(
                "app.notification.channel_id",
                "channel id cannot be empty",
            ));
        }
        errors
    }
}

/// Foreground service notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub title: String,
    pub text: String,
    pub channel_name: String,
    pub channel_id: String,
    pub small_icon: String,
    pub priority: NotificationPriority,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            title: "Location Tracking Active".to_string(),
            text: "Your location is being tracked".to_string(),
            channel_name: "Location Updates".to_string(),
            channel_id: "location-tracking-channel".to_string(),
            small_icon: "mipmap/ic_launcher".to_string(),
            priority: NotificationPriority::Default,
        }
    }
}

/// Notification priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    Min,
    Low,
    #[default]
    Default,
    High,
    Max,
}

/// Background permission rationale dialog text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionRationale {
    pub title: String,
    pub message: String,
    pub positive_action: String,
    pub negative_action: String,
}

impl Default for PermissionRationale {
    fn default() -> Self {
        Self {
            title: "Allow background location access?".to_string(),
            message: "This app needs background location access to function properly."
                .to_string(),
            positive_action: "Go to Settings".to_string(),
            negative_action: "Cancel".to_string(),
        }
    }
}

/// Engine logger settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub debug: bool,
    pub log_level: EngineLogLevel,
}

/// Engine log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineLogLevel {
    Off,
    Error,
    Warning,
    #[default]
    Info,
    Debug,
    Verbose,
}

/// Engine-side persistence settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Days of records the engine keeps in its own database.
    pub max_days_to_persist: u32,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            max_days_to_persist: 1,
        }
    }
}

/// Supplementary foreground watch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForegroundWatchConfig {
    /// Polling interval in milliseconds.
    pub interval_ms: u64,
    /// Per-fix timeout in milliseconds.
    pub timeout_ms: u64,
    pub desired_accuracy: DesiredAccuracy,
    /// Whether watch fixes are persisted by the engine.
    pub persist: bool,
    /// Capacity of the channel carrying watch fixes.
    pub buffer_size: usize,
}

impl Default for ForegroundWatchConfig {
    fn default() -> Self {
        Self {
            interval_ms: 10_000,
            timeout_ms: 30_000,
            desired_accuracy: DesiredAccuracy::High,
            persist: false,
            buffer_size: 32,
        }
    }
}

impl ForegroundWatchConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.interval_ms == 0 {
            errors.push(ValidationError::new(
                "foreground_watch.interval_ms",
                "must be greater than 0",
            ));
        }
        if self.timeout_ms == 0 {
            errors.push(ValidationError::new(
                "foreground_watch.timeout_ms",
                "must be greater than 0",
            ));
        }
        if self.buffer_size == 0 {
            errors.push(ValidationError::new(
                "foreground_watch.buffer_size",
                "must be greater than 0",
            ));
        }
        errors
    }
}

/// One-shot position request settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrentPositionConfig {
    /// Desired accuracy in meters.
    pub desired_accuracy_meters: u32,
    /// Maximum age in milliseconds of a cached fix that may be returned.
    pub maximum_age_ms: u64,
    /// Timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for CurrentPositionConfig {
    fn default() -> Self {
        Self {
            desired_accuracy_meters: 100,
            maximum_age_ms: 10_000,
            timeout_secs: 25,
        }
    }
}

impl CurrentPositionConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "current_position.timeout_secs",
                "must be greater than 0",
            ));
        }
        errors
    }
}

/// In-memory history settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of retained samples; oldest are dropped first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<usize>,
}

impl HistoryConfig {
    fn validate(&self) -> Vec<ValidationError> {
        if self.max_entries == Some(0) {
            vec![ValidationError::new(
                "history.max_entries",
                "must be greater than 0 when set",
            )]
        } else {
            Vec::new()
        }
    }
}

/// Configuration handed to the provider's `ready` call.
///
/// Derived, never persisted: recomputed from [`TrackingConfig`] and the
/// permission snapshot every time setup runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderConfig {
    pub geolocation: GeolocationConfig,
    pub disable_motion_activity_updates: bool,
    pub app: AppConfig,
    pub logger: LoggerConfig,
    pub persistence: PersistenceConfig,
}

impl ProviderConfig {
    /// Derive the provider configuration.
    pub fn derive(config: &TrackingConfig, disable_motion_activity_updates: bool) -> Self {
        Self {
            geolocation: config.geolocation.clone(),
            disable_motion_activity_updates,
            app: config.app.clone(),
            logger: config.logger.clone(),
            persistence: config.persistence.clone(),
        }
    }
}

/// Narrow configuration update applied to an already-ready provider.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ConfigPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_motion_activity_updates: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stationary_radius: Option<f64>,
}

impl ConfigPatch {
    /// Patch toggling motion-activity updates.
    ///
    /// Re-sends the stationary radius alongside the flag: with motion updates
    /// off, the stationary geofence is the only movement detector left.
    pub fn motion(disable_motion_activity_updates: bool, stationary_radius: f64) -> Self {
        Self {
            disable_motion_activity_updates: Some(disable_motion_activity_updates),
            stationary_radius: Some(stationary_radius),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `geolocation.distance_filter`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
///
/// - Linux: `~/.config/locus/tracking.toml`
/// - macOS: `~/Library/Application Support/locus/tracking.toml`
/// - Windows: `C:\Users\<user>\AppData\Roaming\locus\tracking.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("locus")
        .join("tracking.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = TrackingConfig::default();
        assert_eq!(config.geolocation.desired_accuracy, DesiredAccuracy::High);
        assert_eq!(config.geolocation.distance_filter, 50.0);
        assert_eq!(config.geolocation.stationary_radius, 25.0);
        assert_eq!(config.geolocation.stop_timeout_minutes, 5);
        assert!(!config.app.stop_on_terminate);
        assert!(config.app.start_on_boot);
        assert!(config.app.enable_headless);
        assert_eq!(config.persistence.max_days_to_persist, 1);
        assert_eq!(config.foreground_watch.interval_ms, 10_000);
        assert_eq!(config.foreground_watch.timeout_ms, 30_000);
        assert!(!config.foreground_watch.persist);
        assert!(config.history.max_entries.is_none());
        config.validate().expect("default config should be valid");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml = r#"
            [geolocation]
            distance_filter = 10.0

            [history]
            max_entries = 200
        "#;
        let config: TrackingConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.geolocation.distance_filter, 10.0);
        assert_eq!(config.geolocation.stationary_radius, 25.0);
        assert_eq!(config.history.max_entries, Some(200));
        assert_eq!(config.app.notification.channel_id, "location-tracking-channel");
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut config = TrackingConfig::default();
        config.geolocation.stationary_radius = 0.0;
        config.foreground_watch.interval_ms = 0;
        config.history.max_entries = Some(0);

        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(
                    fields,
                    vec![
                        "geolocation.stationary_radius",
                        "foreground_watch.interval_ms",
                        "history.max_entries",
                    ]
                );
            }
            other => panic!("expected validation errors, got {other:?}"),
        }
    }

    #[test]
    fn test_nan_distance_filter_rejected() {
        let mut config = TrackingConfig::default();
        config.geolocation.distance_filter = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tracking.toml");

        let mut config = TrackingConfig::default();
        config.foreground_watch.interval_ms = 5_000;
        config.save(&path).unwrap();

        let loaded = TrackingConfig::load_validated(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let err = TrackingConfig::load("/nonexistent/locus.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_provider_config_derivation() {
        let config = TrackingConfig::default();
        let derived = ProviderConfig::derive(&config, true);
        assert!(derived.disable_motion_activity_updates);
        assert_eq!(derived.geolocation.stationary_radius, 25.0);
        assert!(derived.app.enable_headless);
    }

    #[test]
    fn test_motion_patch() {
        let patch = ConfigPatch::motion(false, 25.0);
        assert_eq!(patch.disable_motion_activity_updates, Some(false));
        assert_eq!(patch.stationary_radius, Some(25.0));
    }
}
