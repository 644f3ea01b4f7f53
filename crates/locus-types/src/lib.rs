//! Platform-agnostic types for background location tracking.
//!
//! This crate provides the shared data model used by the tracking
//! coordinator in `locus-core` and by anything that consumes its history:
//! provider locations and events, normalized permissions, engine state and
//! recorded samples.
//!
//! # Example
//!
//! ```
//! use locus_types::{AuthorizationStatus, LocationPermission};
//!
//! let permission = LocationPermission::from_authorization(AuthorizationStatus::WhenInUse);
//! assert_eq!(permission, Some(LocationPermission::Foreground));
//! ```

pub mod error;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use types::{
    ActivityChangeEvent, ActivityType, AuthorizationStatus, Coords, DesiredAccuracy,
    GeofenceAction, GeofenceEvent, Location, LocationPermission, LocationSample,
    MotionChangeEvent, PermissionSnapshot, ProviderChangeEvent, ProviderState, SampleId,
    TrackingMode,
};
