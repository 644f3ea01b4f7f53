//! Core types for location tracking.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::ParseError;

/// Coordinates of a single position fix as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Coords {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Horizontal accuracy in meters, absent when the provider cannot estimate it.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub accuracy: Option<f64>,
    /// Altitude in meters.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub altitude: Option<f64>,
    /// Speed in meters per second.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub speed: Option<f64>,
    /// Heading in degrees from true north.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub heading: Option<f64>,
}

impl Coords {
    /// Create coordinates with an optional accuracy and no motion data.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, accuracy: Option<f64>) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
            ..Default::default()
        }
    }
}

/// A location delivered by the provider.
///
/// This is the provider's view of a fix. Once accepted into history it
/// becomes a [`LocationSample`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Location {
    /// Provider-assigned identifier, if any.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub uuid: Option<String>,
    /// Position of the fix.
    pub coords: Coords,
    /// When the fix was taken.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub timestamp: OffsetDateTime,
    /// Whether the engine considered the device moving.
    #[cfg_attr(feature = "serde", serde(default))]
    pub is_moving: bool,
    /// Set on fixes produced by a supplementary foreground watch.
    ///
    /// The provider echoes these onto its primary location stream; consumers
    /// of that stream use this flag to avoid recording the same fix twice.
    #[cfg_attr(feature = "serde", serde(default, rename = "sample"))]
    pub watch_sample: bool,
}

impl Location {
    /// Create a location from coordinates and a timestamp.
    #[must_use]
    pub fn new(coords: Coords, timestamp: OffsetDateTime) -> Self {
        Self {
            uuid: None,
            coords,
            timestamp,
            is_moving: false,
            watch_sample: false,
        }
    }

    /// Mark this location as produced by a foreground watch.
    #[must_use]
    pub fn as_watch_sample(mut self) -> Self {
        self.watch_sample = true;
        self
    }
}

/// Identifier of a sample in history.
///
/// Identifiers are handed out in generation order and never reused for the
/// lifetime of a history store, so they sort the same way the samples were
/// recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SampleId(pub u64);

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An observed position recorded in history.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocationSample {
    /// Unique, generation-ordered identifier.
    pub id: SampleId,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Accuracy in meters, if known.
    pub accuracy: Option<f64>,
    /// When the fix was taken.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub timestamp: OffsetDateTime,
}

impl LocationSample {
    /// Build a sample from a provider location.
    #[must_use]
    pub fn from_location(id: SampleId, location: &Location) -> Self {
        Self {
            id,
            latitude: location.coords.latitude,
            longitude: location.coords.longitude,
            accuracy: location.coords.accuracy,
            timestamp: location.timestamp,
        }
    }

    /// The timestamp formatted as RFC 3339.
    pub fn timestamp_rfc3339(&self) -> String {
        self.timestamp
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.timestamp.to_string())
    }
}

impl fmt::Display for LocationSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6} ", self.latitude, self.longitude)?;
        match self.accuracy {
            Some(accuracy) => write!(f, "±{} m", accuracy.round())?,
            None => write!(f, "—")?,
        }
        write!(f, " · {}", self.timestamp_rfc3339())
    }
}

/// The engine reported the device starting or stopping movement.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct MotionChangeEvent {
    /// True when the device started moving.
    pub is_moving: bool,
    /// Location at which the transition was detected.
    pub location: Location,
}

/// Geofence transition type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum GeofenceAction {
    /// Entered the region.
    Enter,
    /// Left the region.
    Exit,
    /// Stayed inside the region past the loitering delay.
    Dwell,
}

impl fmt::Display for GeofenceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeofenceAction::Enter => write!(f, "ENTER"),
            GeofenceAction::Exit => write!(f, "EXIT"),
            GeofenceAction::Dwell => write!(f, "DWELL"),
        }
    }
}

impl FromStr for GeofenceAction {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ENTER" => Ok(GeofenceAction::Enter),
            "EXIT" => Ok(GeofenceAction::Exit),
            "DWELL" => Ok(GeofenceAction::Dwell),
            _ => Err(ParseError::unknown("geofence action", s)),
        }
    }
}

/// A geofence crossing.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeofenceEvent {
    /// Identifier of the geofence that fired.
    pub identifier: String,
    /// Transition type.
    pub action: GeofenceAction,
    /// Location that triggered the transition.
    pub location: Location,
}

/// Motion activity classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ActivityType {
    Still,
    OnFoot,
    Walking,
    Running,
    InVehicle,
    OnBicycle,
    Unknown,
}

/// The motion classifier changed its activity estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ActivityChangeEvent {
    /// Detected activity.
    pub activity: ActivityType,
    /// Confidence percentage (0-100).
    pub confidence: u8,
}

/// Authorization status as reported by the location engine.
///
/// Known codes follow the engine's numbering; anything else is preserved in
/// [`AuthorizationStatus::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "i32", into = "i32"))]
pub enum AuthorizationStatus {
    /// The user has not been asked yet.
    NotDetermined,
    /// Access is restricted by policy (parental controls, MDM).
    Restricted,
    /// The user denied access.
    Denied,
    /// Access granted at all times, including background.
    Always,
    /// Access granted only while the app is in use.
    WhenInUse,
    /// A status code this library does not know about.
    Other(i32),
}

impl AuthorizationStatus {
    /// Numeric engine code for this status.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            AuthorizationStatus::NotDetermined => 0,
            AuthorizationStatus::Restricted => 1,
            AuthorizationStatus::Denied => 2,
            AuthorizationStatus::Always => 3,
            AuthorizationStatus::WhenInUse => 4,
            AuthorizationStatus::Other(code) => code,
        }
    }
}

impl From<i32> for AuthorizationStatus {
    fn from(code: i32) -> Self {
        match code {
            0 => AuthorizationStatus::NotDetermined,
            1 => AuthorizationStatus::Restricted,
            2 => AuthorizationStatus::Denied,
            3 => AuthorizationStatus::Always,
            4 => AuthorizationStatus::WhenInUse,
            other => AuthorizationStatus::Other(other),
        }
    }
}

impl From<AuthorizationStatus> for i32 {
    fn from(status: AuthorizationStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorizationStatus::NotDetermined => write!(f, "not-determined"),
            AuthorizationStatus::Restricted => write!(f, "restricted"),
            AuthorizationStatus::Denied => write!(f, "denied"),
            AuthorizationStatus::Always => write!(f, "always"),
            AuthorizationStatus::WhenInUse => write!(f, "when-in-use"),
            AuthorizationStatus::Other(code) => write!(f, "unknown({code})"),
        }
    }
}

/// The provider's authorization or sub-provider availability changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProviderChangeEvent {
    /// Current authorization status.
    pub status: AuthorizationStatus,
    /// Whether location services are enabled at all.
    #[cfg_attr(feature = "serde", serde(default = "default_true"))]
    pub enabled: bool,
    /// Whether satellite positioning is available.
    pub gps: bool,
    /// Whether network positioning is available.
    pub network: bool,
}

#[cfg(feature = "serde")]
fn default_true() -> bool {
    true
}

/// Normalized location permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum LocationPermission {
    /// Not yet known.
    #[default]
    Unknown,
    /// Granted at all times.
    Always,
    /// Granted while the app is in the foreground.
    Foreground,
    /// Denied or otherwise unavailable.
    Blocked,
}

impl LocationPermission {
    /// Map an engine authorization status.
    ///
    /// Returns `None` for statuses with no counterpart, in which case the
    /// caller keeps its current value.
    ///
    /// | status | permission |
    /// |---|---|
    /// | always | `Always` |
    /// | when-in-use | `Foreground` |
    /// | denied | `Blocked` |
    /// | not-determined | `Unknown` |
    #[must_use]
    pub fn from_authorization(status: AuthorizationStatus) -> Option<Self> {
        match status {
            AuthorizationStatus::Always => Some(LocationPermission::Always),
            AuthorizationStatus::WhenInUse => Some(LocationPermission::Foreground),
            AuthorizationStatus::Denied => Some(LocationPermission::Blocked),
            AuthorizationStatus::NotDetermined => Some(LocationPermission::Unknown),
            AuthorizationStatus::Restricted | AuthorizationStatus::Other(_) => None,
        }
    }

    /// Whether this permission allows the tracking engine to start.
    #[must_use]
    pub fn allows_tracking(self) -> bool {
        matches!(self, LocationPermission::Always | LocationPermission::Foreground)
    }

    /// Lowercase name, as used in configuration and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LocationPermission::Unknown => "unknown",
            LocationPermission::Always => "always",
            LocationPermission::Foreground => "foreground",
            LocationPermission::Blocked => "blocked",
        }
    }
}

impl fmt::Display for LocationPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocationPermission {
    type Err = ParseError;

    /// Parse a permission name. `denied` is accepted as `blocked`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unknown" => Ok(LocationPermission::Unknown),
            "always" => Ok(LocationPermission::Always),
            "foreground" | "when-in-use" | "wheninuse" => Ok(LocationPermission::Foreground),
            "blocked" | "denied" => Ok(LocationPermission::Blocked),
            _ => Err(ParseError::unknown("location permission", s)),
        }
    }
}

/// Current permission knowledge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PermissionSnapshot {
    /// Normalized location permission.
    pub location: LocationPermission,
    /// Motion permission; `None` until first queried.
    pub motion: Option<bool>,
}

impl PermissionSnapshot {
    /// Whether the engine should run without motion-activity updates.
    ///
    /// An unqueried motion permission counts as not granted.
    #[must_use]
    pub fn disable_motion_updates(&self) -> bool {
        !self.motion.unwrap_or(false)
    }
}

/// Engine tracking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TrackingMode {
    /// Full location tracking.
    #[default]
    Location,
    /// Geofence-only monitoring.
    Geofences,
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingMode::Location => write!(f, "location"),
            TrackingMode::Geofences => write!(f, "geofences"),
        }
    }
}

/// Live engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ProviderState {
    /// Whether tracking has been started.
    pub enabled: bool,
    /// Whether the engine is in its moving state.
    pub is_moving: bool,
    /// Current tracking mode.
    pub tracking_mode: TrackingMode,
}

/// Desired accuracy presets understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DesiredAccuracy {
    /// Highest power, navigation grade.
    Navigation,
    /// GPS grade.
    #[default]
    High,
    /// Roughly 10 meters.
    Medium,
    /// Roughly 100 meters.
    Low,
    /// Roughly 1 kilometer.
    VeryLow,
    /// Roughly 3 kilometers.
    Lowest,
}

impl DesiredAccuracy {
    /// The engine's numeric code for this preset.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            DesiredAccuracy::Navigation => -2,
            DesiredAccuracy::High => -1,
            DesiredAccuracy::Medium => 10,
            DesiredAccuracy::Low => 100,
            DesiredAccuracy::VeryLow => 1000,
            DesiredAccuracy::Lowest => 3000,
        }
    }
}

impl FromStr for DesiredAccuracy {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "navigation" => Ok(DesiredAccuracy::Navigation),
            "high" => Ok(DesiredAccuracy::High),
            "medium" => Ok(DesiredAccuracy::Medium),
            "low" => Ok(DesiredAccuracy::Low),
            "verylow" | "very-low" | "very_low" => Ok(DesiredAccuracy::VeryLow),
            "lowest" => Ok(DesiredAccuracy::Lowest),
            _ => Err(ParseError::unknown("desired accuracy", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_authorization_mapping_table() {
        assert_eq!(
            LocationPermission::from_authorization(AuthorizationStatus::Always),
            Some(LocationPermission::Always)
        );
        assert_eq!(
            LocationPermission::from_authorization(AuthorizationStatus::WhenInUse),
            Some(LocationPermission::Foreground)
        );
        assert_eq!(
            LocationPermission::from_authorization(AuthorizationStatus::Denied),
            Some(LocationPermission::Blocked)
        );
        assert_eq!(
            LocationPermission::from_authorization(AuthorizationStatus::NotDetermined),
            Some(LocationPermission::Unknown)
        );
        assert_eq!(
            LocationPermission::from_authorization(AuthorizationStatus::Restricted),
            None
        );
        assert_eq!(
            LocationPermission::from_authorization(AuthorizationStatus::Other(42)),
            None
        );
    }

    #[test]
    fn test_authorization_codes() {
        for code in 0..=4 {
            assert_eq!(AuthorizationStatus::from(code).code(), code);
        }
        assert_eq!(AuthorizationStatus::from(99), AuthorizationStatus::Other(99));
    }

    #[test]
    fn test_permission_gate() {
        assert!(LocationPermission::Always.allows_tracking());
        assert!(LocationPermission::Foreground.allows_tracking());
        assert!(!LocationPermission::Blocked.allows_tracking());
        assert!(!LocationPermission::Unknown.allows_tracking());
    }

    #[test]
    fn test_denied_parses_as_blocked() {
        assert_eq!(
            "denied".parse::<LocationPermission>().unwrap(),
            LocationPermission::Blocked
        );
        assert_eq!(
            "Blocked".parse::<LocationPermission>().unwrap(),
            LocationPermission::Blocked
        );
        assert!("maybe".parse::<LocationPermission>().is_err());
    }

    #[test]
    fn test_disable_motion_updates() {
        let mut snapshot = PermissionSnapshot::default();
        assert!(snapshot.disable_motion_updates());
        snapshot.motion = Some(false);
        assert!(snapshot.disable_motion_updates());
        snapshot.motion = Some(true);
        assert!(!snapshot.disable_motion_updates());
    }

    #[test]
    fn test_sample_from_location() {
        let location = Location::new(
            Coords::new(37.0, -122.0, Some(5.0)),
            datetime!(2026-01-02 03:04:05 UTC),
        );
        let sample = LocationSample::from_location(SampleId(7), &location);
        assert_eq!(sample.id, SampleId(7));
        assert_eq!(sample.accuracy, Some(5.0));
        assert_eq!(sample.timestamp_rfc3339(), "2026-01-02T03:04:05Z");
    }

    #[test]
    fn test_sample_display_without_accuracy() {
        let location = Location::new(
            Coords::new(1.5, 2.25, None),
            datetime!(2026-01-02 03:04:05 UTC),
        );
        let sample = LocationSample::from_location(SampleId(1), &location);
        let text = sample.to_string();
        assert!(text.starts_with("1.500000, 2.250000"));
        assert!(text.contains('—'));
    }

    #[test]
    fn test_geofence_action_parse() {
        assert_eq!("enter".parse::<GeofenceAction>().unwrap(), GeofenceAction::Enter);
        assert_eq!("DWELL".parse::<GeofenceAction>().unwrap(), GeofenceAction::Dwell);
        assert!("leave".parse::<GeofenceAction>().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_location_json_shape() {
        let json = r#"{
            "coords": {"latitude": 37.0, "longitude": -122.0, "accuracy": 12.5},
            "timestamp": "2026-01-02T03:04:05Z",
            "isMoving": true,
            "sample": true
        }"#;
        let location: Location = serde_json::from_str(json).unwrap();
        assert!(location.is_moving);
        assert!(location.watch_sample);
        assert_eq!(location.coords.accuracy, Some(12.5));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_provider_change_status_from_code() {
        let json = r#"{"status": 4, "gps": true, "network": false}"#;
        let event: ProviderChangeEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.status, AuthorizationStatus::WhenInUse);
        assert!(event.enabled);
        assert!(!event.network);
    }
}
