//! Headless event routing.
//!
//! When the OS revives a terminated process purely to deliver a tracking
//! event there is no coordinator, no history and no UI. The router here is a
//! stateless function from one [`HeadlessTaskEvent`] to its effects: it logs
//! the event's discriminating fields and hands any embedded location to a
//! [`PositionProcessor`]. Nothing it does can fail outward; decode errors,
//! processor errors and processor panics all end as
//! [`HeadlessOutcome::Failed`], so the OS always sees the task complete.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use locus_types::{GeofenceEvent, Location, MotionChangeEvent};

use crate::error::{Error, Result};

/// Downstream business action for a delivered position.
#[async_trait]
pub trait PositionProcessor: Send + Sync {
    /// Persist or forward a position.
    async fn process_position(&self, location: &Location) -> Result<()>;
}

/// Event envelope delivered to the headless task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadlessTaskEvent {
    /// Event name, e.g. `location` or `boot`.
    pub name: String,
    /// Event payload; shape depends on `name`.
    #[serde(default)]
    pub params: serde_json::Value,
}

impl HeadlessTaskEvent {
    /// Create an event from a name and JSON params.
    pub fn new(name: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// Create a `location` event.
    pub fn location(location: &Location) -> Result<Self> {
        Ok(Self::new("location", serde_json::to_value(location)?))
    }
}

/// Headless event kinds the router understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadlessEventKind {
    Location,
    MotionChange,
    Geofence,
    Terminate,
    Boot,
}

impl HeadlessEventKind {
    /// Resolve an event name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "location" => Some(HeadlessEventKind::Location),
            "motionchange" => Some(HeadlessEventKind::MotionChange),
            "geofence" => Some(HeadlessEventKind::Geofence),
            "terminate" => Some(HeadlessEventKind::Terminate),
            "boot" => Some(HeadlessEventKind::Boot),
            _ => None,
        }
    }
}

/// Result of routing one headless event.
#[derive(Debug, Clone, PartialEq)]
pub enum HeadlessOutcome {
    /// A location-bearing event was handed to the processor.
    Processed {
        kind: HeadlessEventKind,
        location: Location,
    },
    /// A lifecycle marker (`terminate`, `boot`) was logged.
    Lifecycle(HeadlessEventKind),
    /// The event name is not handled.
    Ignored { name: String },
    /// Processing failed; the failure was logged.
    Failed { name: String, error: String },
}

/// Task registered with the provider for headless delivery.
pub type HeadlessTask = Arc<dyn Fn(HeadlessTaskEvent) -> BoxFuture<'static, HeadlessOutcome> + Send + Sync>;

/// Build a headless task that routes every event to `processor`.
pub fn headless_task(processor: Arc<dyn PositionProcessor>) -> HeadlessTask {
    Arc::new(move |event: HeadlessTaskEvent| {
        let processor = Arc::clone(&processor);
        async move { handle_headless_event(&event, processor.as_ref()).await }.boxed()
    })
}

/// Route one headless event.
pub async fn handle_headless_event(
    event: &HeadlessTaskEvent,
    processor: &dyn PositionProcessor,
) -> HeadlessOutcome {
    info!(event = %event.name, "Headless event received");

    let routed = AssertUnwindSafe(route(event, processor)).catch_unwind().await;
    match routed {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            error!(event = %event.name, "Headless event failed: {}", e);
            HeadlessOutcome::Failed {
                name: event.name.clone(),
                error: e.to_string(),
            }
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(event = %event.name, "Headless event panicked: {}", message);
            HeadlessOutcome::Failed {
                name: event.name.clone(),
                error: message,
            }
        }
    }
}

async fn route(
    event: &HeadlessTaskEvent,
    processor: &dyn PositionProcessor,
) -> Result<HeadlessOutcome> {
    let Some(kind) = HeadlessEventKind::from_name(&event.name) else {
        info!(event = %event.name, "Unhandled headless event");
        return Ok(HeadlessOutcome::Ignored {
            name: event.name.clone(),
        });
    };

    let location = match kind {
        HeadlessEventKind::Location => {
            let location: Location = decode(event)?;
            info!(
                lat = location.coords.latitude,
                lng = location.coords.longitude,
                accuracy = ?location.coords.accuracy,
                "Headless location"
            );
            location
        }
        HeadlessEventKind::MotionChange => {
            let motion: MotionChangeEvent = decode(event)?;
            info!(
                is_moving = motion.is_moving,
                lat = motion.location.coords.latitude,
                lng = motion.location.coords.longitude,
                "Headless motion change"
            );
            motion.location
        }
        HeadlessEventKind::Geofence => {
            let geofence: GeofenceEvent = decode(event)?;
            info!(
                action = %geofence.action,
                identifier = %geofence.identifier,
                lat = geofence.location.coords.latitude,
                lng = geofence.location.coords.longitude,
                "Headless geofence"
            );
            geofence.location
        }
        HeadlessEventKind::Terminate => {
            info!("App terminated, background service continuing");
            return Ok(HeadlessOutcome::Lifecycle(kind));
        }
        HeadlessEventKind::Boot => {
            info!("Device booted, background service started");
            return Ok(HeadlessOutcome::Lifecycle(kind));
        }
    };

    processor.process_position(&location).await?;
    Ok(HeadlessOutcome::Processed { kind, location })
}

fn decode<T: serde::de::DeserializeOwned>(event: &HeadlessTaskEvent) -> Result<T> {
    serde_json::from_value(event.params.clone())
        .map_err(|e| Error::event_processing(event.name.clone(), e.to_string()))
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic during headless processing".to_string()
    }
}
