//! Error types for locus-core.
//!
//! The coordinator's public operations never return these errors: every
//! failure is absorbed at the operation boundary, logged, and reflected in
//! state or in an outcome value. They travel between the coordinator and its
//! collaborators (the location provider, permission backends, headless
//! position processors).
//!
//! # Failure Classes
//!
//! | Error Type | Raised by | Coordinator reaction |
//! |------------|-----------|----------------------|
//! | [`Error::Configuration`] | provider `ready` | setup reverts to `Idle`, no retry |
//! | [`Error::Configuration`] | provider `set_config` | setup stays `Ready`, retried on the next reconcile |
//! | [`Error::Acquisition`] | one-shot position, watch start | logged, history untouched, no retry |
//! | [`Error::Timeout`] | one-shot position past its timeout | same as acquisition |
//! | [`Error::EventProcessing`] | event handlers | logged with the event name, delivery continues |
//! | [`Error::Provider`] | any other provider call | logged |
//!
//! A denied location permission is not an error: activation reports it as
//! a skipped outcome and the start command is simply never issued.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while driving a location provider.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The provider rejected its configuration.
    #[error("Configuration failed: {0}")]
    Configuration(String),

    /// A position or watch could not be acquired.
    #[error("Acquisition failed during {operation}: {message}")]
    Acquisition {
        /// The operation that failed.
        operation: String,
        /// Provider error code, if one was reported.
        code: Option<i32>,
        /// Description of the failure.
        message: String,
    },

    /// Processing a delivered event failed.
    #[error("Failed to process '{event}' event: {message}")]
    EventProcessing {
        /// Name of the event being processed.
        event: String,
        /// Description of the failure.
        message: String,
    },

    /// Generic provider failure.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// JSON payload could not be decoded.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration failure.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create an acquisition failure without a provider code.
    pub fn acquisition(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Acquisition {
            operation: operation.into(),
            code: None,
            message: message.into(),
        }
    }

    /// Create an acquisition failure carrying the provider's error code.
    pub fn acquisition_code(operation: impl Into<String>, code: i32) -> Self {
        Self::Acquisition {
            operation: operation.into(),
            code: Some(code),
            message: format!("provider error code {}", code),
        }
    }

    /// Create an event processing failure.
    pub fn event_processing(event: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EventProcessing {
            event: event.into(),
            message: message.into(),
        }
    }

    /// Create a generic provider failure.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider(message.into())
    }

    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }
}

/// Result type alias using locus-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
