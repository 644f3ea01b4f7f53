//! Headless command: route events as a revived process would.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use locus_core::{HeadlessTaskEvent, HistoryStore, handle_headless_event};
use locus_types::LocationSample;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::format::{FormatOptions, HeadlessReport, format_headless_text, format_history_text};
use crate::util::write_output;

/// An event file holds a single event or a list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EventFile {
    One(HeadlessTaskEvent),
    Many(Vec<HeadlessTaskEvent>),
}

impl EventFile {
    fn into_events(self) -> Vec<HeadlessTaskEvent> {
        match self {
            EventFile::One(event) => vec![event],
            EventFile::Many(events) => events,
        }
    }
}

#[derive(Debug, Serialize)]
struct HeadlessSummary {
    events: Vec<HeadlessReport>,
    history: Vec<LocationSample>,
}

fn parse_events(content: &str, path: &Path) -> Result<Vec<HeadlessTaskEvent>> {
    let file: EventFile = serde_json::from_str(content)
        .with_context(|| format!("Failed to parse headless events from {}", path.display()))?;
    Ok(file.into_events())
}

/// Route each event through a fresh history, without any coordinator.
async fn route_events(events: &[HeadlessTaskEvent]) -> HeadlessSummary {
    let history = HistoryStore::new();
    let mut reports = Vec::with_capacity(events.len());
    for event in events {
        let outcome = handle_headless_event(event, &history).await;
        reports.push(HeadlessReport::new(&event.name, &outcome));
    }
    HeadlessSummary {
        events: reports,
        history: history.entries(),
    }
}

pub async fn cmd_headless(file: &Path, output: Option<&PathBuf>, opts: &FormatOptions) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let events = parse_events(&content, file)?;
    debug!(count = events.len(), "Routing headless events");

    let summary = route_events(&events).await;

    let rendered = if opts.is_json() {
        opts.as_json(&summary)?
    } else {
        let mut out = format_headless_text(&summary.events, opts);
        out.push('\n');
        out.push_str(&format_history_text(&summary.history, opts));
        out
    };
    write_output(output, &rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCATION: &str = r#"{
        "name": "location",
        "params": {
            "coords": {"latitude": 51.5007, "longitude": -0.1246, "accuracy": 5.0},
            "timestamp": "2026-03-01T08:30:00Z"
        }
    }"#;

    #[test]
    fn test_parse_single_event() {
        let events = parse_events(LOCATION, Path::new("event.json")).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "location");
    }

    #[test]
    fn test_parse_event_list_without_params() {
        let events =
            parse_events(r#"[{"name": "boot"}, {"name": "terminate"}]"#, Path::new("e.json"))
                .unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].params.is_null());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_events("{not json", Path::new("bad.json")).unwrap_err();
        assert!(err.to_string().contains("bad.json"));
    }

    #[tokio::test]
    async fn test_route_events_records_only_locations() {
        let content = format!(r#"[{}, {{"name": "boot"}}, {{"name": "heartbeat"}}]"#, LOCATION);
        let events = parse_events(&content, Path::new("e.json")).unwrap();

        let summary = route_events(&events).await;

        let outcomes: Vec<&str> = summary.events.iter().map(|r| r.outcome).collect();
        assert_eq!(outcomes, ["processed", "lifecycle", "ignored"]);
        assert_eq!(summary.history.len(), 1);
        assert_eq!(summary.history[0].latitude, 51.5007);
    }

    #[tokio::test]
    async fn test_route_events_reports_malformed_params() {
        let events = vec![HeadlessTaskEvent::new(
            "location",
            serde_json::json!({"coords": "nowhere"}),
        )];

        let summary = route_events(&events).await;

        assert_eq!(summary.events[0].outcome, "failed");
        assert!(summary.history.is_empty());
    }
}
