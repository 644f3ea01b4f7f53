//! Provider event stream.
//!
//! Every event class the location provider emits (locations, motion
//! changes, geofence crossings, provider changes, activity changes and
//! location errors) travels over a single broadcast channel. Subscribing
//! yields an [`EventReceiver`] that buffers events from the moment it is
//! created, so a consumer that subscribes before configuring the provider
//! observes everything delivered during configuration.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use locus_types::{
    ActivityChangeEvent, GeofenceEvent, Location, MotionChangeEvent, ProviderChangeEvent,
};

/// Events that can be emitted by a location provider.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum ProviderEvent {
    /// A location fix on the primary stream.
    Location(Location),
    /// The engine switched between moving and stationary.
    MotionChange(MotionChangeEvent),
    /// A geofence was crossed.
    Geofence(GeofenceEvent),
    /// Authorization or sub-provider availability changed.
    ProviderChange(ProviderChangeEvent),
    /// The motion classifier changed its activity estimate.
    ActivityChange(ActivityChangeEvent),
    /// The primary location stream reported an error code.
    LocationError {
        /// Provider error code.
        code: i32,
    },
}

impl ProviderEvent {
    /// Short event name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            ProviderEvent::Location(_) => "location",
            ProviderEvent::MotionChange(_) => "motionchange",
            ProviderEvent::Geofence(_) => "geofence",
            ProviderEvent::ProviderChange(_) => "providerchange",
            ProviderEvent::ActivityChange(_) => "activitychange",
            ProviderEvent::LocationError { .. } => "locationerror",
        }
    }
}

/// Sender for provider events.
pub type EventSender = broadcast::Sender<ProviderEvent>;

/// Receiver for provider events.
pub type EventReceiver = broadcast::Receiver<ProviderEvent>;

/// Event dispatcher for providers fanning events out to several consumers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: ProviderEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locus_types::{AuthorizationStatus, Coords};
    use time::macros::datetime;

    #[tokio::test]
    async fn test_receiver_buffers_events_sent_after_subscribe() {
        let dispatcher = EventDispatcher::new(8);
        let mut rx = dispatcher.subscribe();

        dispatcher.send(ProviderEvent::LocationError { code: 1 });
        dispatcher.send(ProviderEvent::ProviderChange(ProviderChangeEvent {
            status: AuthorizationStatus::Always,
            enabled: true,
            gps: true,
            network: true,
        }));

        assert_eq!(rx.recv().await.unwrap().name(), "locationerror");
        assert_eq!(rx.recv().await.unwrap().name(), "providerchange");
    }

    #[test]
    fn test_send_without_receivers_is_silent() {
        let dispatcher = EventDispatcher::default();
        assert_eq!(dispatcher.receiver_count(), 0);
        dispatcher.send(ProviderEvent::LocationError { code: 0 });
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = ProviderEvent::Location(Location::new(
            Coords::new(37.0, -122.0, None),
            datetime!(2026-01-02 03:04:05 UTC),
        ));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "location");
    }
}
