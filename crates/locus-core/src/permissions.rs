//! Permission gateway.
//!
//! [`PermissionGateway`] wraps a platform [`PermissionBackend`] and turns its
//! raw statuses into the plain values the coordinator consumes. It never
//! fails: a backend error, or a platform without the permission, resolves
//! to the conservative answer.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::Result;

/// Host platform, used to resolve permission identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    /// Any platform without mobile permission identifiers.
    Other,
}

impl Platform {
    /// Platform identifier of the motion-activity permission, if the platform has one.
    pub fn motion_permission(self) -> Option<&'static str> {
        match self {
            Platform::Ios => Some("ios.permission.MOTION"),
            Platform::Android => Some("android.permission.ACTIVITY_RECOGNITION"),
            Platform::Other => None,
        }
    }
}

/// Raw permission status reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    /// The feature is not available on this device.
    Unavailable,
    /// Not granted, but may be requested.
    Denied,
    /// Not granted and cannot be requested anymore.
    Blocked,
    Granted,
    /// Granted with restrictions.
    Limited,
}

impl fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PermissionStatus::Unavailable => "unavailable",
            PermissionStatus::Denied => "denied",
            PermissionStatus::Blocked => "blocked",
            PermissionStatus::Granted => "granted",
            PermissionStatus::Limited => "limited",
        };
        f.write_str(name)
    }
}

/// Platform permission primitives.
#[async_trait]
pub trait PermissionBackend: Send + Sync {
    /// The platform this backend runs on.
    fn platform(&self) -> Platform;

    /// Check a permission without prompting.
    async fn check(&self, permission: &str) -> Result<PermissionStatus>;

    /// Prompt for a permission.
    async fn request(&self, permission: &str) -> Result<PermissionStatus>;
}

/// Normalizing front for a [`PermissionBackend`].
#[derive(Clone)]
pub struct PermissionGateway {
    backend: Arc<dyn PermissionBackend>,
}

impl fmt::Debug for PermissionGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionGateway")
            .field("platform", &self.backend.platform())
            .finish()
    }
}

impl PermissionGateway {
    /// Create a gateway over a backend.
    pub fn new(backend: Arc<dyn PermissionBackend>) -> Self {
        Self { backend }
    }

    /// The backend's platform.
    pub fn platform(&self) -> Platform {
        self.backend.platform()
    }

    /// Whether motion-activity permission is currently granted.
    ///
    /// Platforms without the permission report `false`.
    pub async fn check_motion_permission(&self) -> bool {
        let Some(permission) = self.platform().motion_permission() else {
            return false;
        };

        match self.backend.check(permission).await {
            Ok(status) => {
                debug!(permission, %status, "Motion permission checked");
                status == PermissionStatus::Granted
            }
            Err(e) => {
                error!("Motion permission check failed: {}", e);
                false
            }
        }
    }

    /// Prompt for motion-activity permission.
    ///
    /// Returns the raw status; callers re-query with
    /// [`check_motion_permission`](Self::check_motion_permission). Returns
    /// `None` when the platform has no such permission, and
    /// [`PermissionStatus::Denied`] when the request itself fails.
    pub async fn request_motion_permission(&self) -> Option<PermissionStatus> {
        let permission = self.platform().motion_permission()?;

        match self.backend.request(permission).await {
            Ok(status) => {
                debug!(permission, %status, "Motion permission requested");
                Some(status)
            }
            Err(e) => {
                error!("Motion permission request failed: {}", e);
                Some(PermissionStatus::Denied)
            }
        }
    }
}
