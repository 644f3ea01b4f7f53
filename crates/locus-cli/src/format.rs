//! Output formatting utilities for text and JSON output.

use anyhow::Result;
use locus_core::{HeadlessOutcome, SetupState, TrackingStatus, WatchState};
use locus_types::{LocationPermission, LocationSample};
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::cli::OutputFormat;

/// Formatting options for output.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    /// Disable colored output.
    pub no_color: bool,
    pub format: OutputFormat,
}

impl FormatOptions {
    pub fn new(no_color: bool, format: OutputFormat) -> Self {
        Self { no_color, format }
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Serialize to pretty JSON with a trailing newline.
    pub fn as_json<T: Serialize>(&self, value: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(value)? + "\n")
    }
}

/// Format the location permission with a color hint.
pub fn format_permission(permission: LocationPermission, no_color: bool) -> String {
    let label = permission.as_str().to_uppercase();
    if no_color {
        return format!("[{}]", label);
    }
    match permission {
        LocationPermission::Always => format!("[{}]", label.green()),
        LocationPermission::Foreground => format!("[{}]", label.yellow()),
        LocationPermission::Blocked => format!("[{}]", label.red()),
        LocationPermission::Unknown => format!("[{}]", label.dimmed()),
    }
}

fn format_setup(setup: SetupState, no_color: bool) -> String {
    let label = match setup {
        SetupState::Idle => "idle",
        SetupState::Ready => "ready",
    };
    match (setup, no_color) {
        (_, true) => label.to_string(),
        (SetupState::Ready, false) => label.green().to_string(),
        (SetupState::Idle, false) => label.yellow().to_string(),
    }
}

fn format_watch(state: WatchState) -> &'static str {
    match state {
        WatchState::Stopped => "stopped",
        WatchState::Starting => "starting",
        WatchState::Active => "active",
    }
}

fn format_motion(motion: Option<bool>) -> &'static str {
    match motion {
        Some(true) => "granted",
        Some(false) => "not granted",
        None => "unknown",
    }
}

/// Format a status block.
pub fn format_status_text(status: &TrackingStatus, watch: WatchState, opts: &FormatOptions) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Setup:       {}\n",
        format_setup(status.setup, opts.no_color)
    ));
    out.push_str(&format!(
        "Location:    {}\n",
        format_permission(status.permissions.location, opts.no_color)
    ));
    out.push_str(&format!(
        "Motion:      {}\n",
        format_motion(status.permissions.motion)
    ));
    out.push_str(&format!("Watch:       {}\n", format_watch(watch)));
    out
}

/// Format history most recent first, one sample per line.
pub fn format_history_text(samples: &[LocationSample], opts: &FormatOptions) -> String {
    if samples.is_empty() {
        return "No locations recorded\n".to_string();
    }

    let mut out = format!("{} location(s), most recent first\n", samples.len());
    for sample in samples {
        let id = format!("#{:<4}", sample.id);
        if opts.no_color {
            out.push_str(&format!("  {} {}\n", id, sample));
        } else {
            out.push_str(&format!("  {} {}\n", id.dimmed(), sample));
        }
    }
    out
}

/// Serializable view of a headless outcome.
#[derive(Debug, Serialize)]
pub struct HeadlessReport {
    pub event: String,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl HeadlessReport {
    pub fn new(event: &str, outcome: &HeadlessOutcome) -> Self {
        let (label, detail) = match outcome {
            HeadlessOutcome::Processed { location, .. } => (
                "processed",
                Some(format!(
                    "{:.6}, {:.6}",
                    location.coords.latitude, location.coords.longitude
                )),
            ),
            HeadlessOutcome::Lifecycle(_) => ("lifecycle", None),
            HeadlessOutcome::Ignored { .. } => ("ignored", None),
            HeadlessOutcome::Failed { error, .. } => ("failed", Some(error.clone())),
        };
        Self {
            event: event.to_string(),
            outcome: label,
            detail,
        }
    }
}

/// Format headless routing results.
pub fn format_headless_text(reports: &[HeadlessReport], opts: &FormatOptions) -> String {
    let mut out = String::new();
    for report in reports {
        let outcome = if opts.no_color {
            report.outcome.to_string()
        } else {
            match report.outcome {
                "processed" => report.outcome.green().to_string(),
                "failed" => report.outcome.red().to_string(),
                _ => report.outcome.dimmed().to_string(),
            }
        };
        match &report.detail {
            Some(detail) => out.push_str(&format!("{:<14} {} ({})\n", report.event, outcome, detail)),
            None => out.push_str(&format!("{:<14} {}\n", report.event, outcome)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use locus_core::types::{Coords, Location, PermissionSnapshot, SampleId};
    use time::macros::datetime;

    fn plain() -> FormatOptions {
        FormatOptions::new(true, OutputFormat::Text)
    }

    fn sample(id: u64) -> LocationSample {
        let location = Location::new(
            Coords::new(48.8584, 2.2945, Some(8.0)),
            datetime!(2024-05-01 12:00 UTC),
        );
        LocationSample::from_location(SampleId(id), &location)
    }

    #[test]
    fn test_permission_plain() {
        assert_eq!(
            format_permission(LocationPermission::Always, true),
            "[ALWAYS]"
        );
        assert_eq!(
            format_permission(LocationPermission::Blocked, true),
            "[BLOCKED]"
        );
    }

    #[test]
    fn test_permission_colored_keeps_label() {
        let out = format_permission(LocationPermission::Foreground, false);
        assert!(out.contains("FOREGROUND"));
        assert!(out.contains('\u{1b}'));
    }

    #[test]
    fn test_status_text() {
        let status = TrackingStatus {
            setup: SetupState::Ready,
            permissions: PermissionSnapshot {
                location: LocationPermission::Always,
                motion: None,
            },
        };
        let out = format_status_text(&status, WatchState::Active, &plain());
        assert!(out.contains("Setup:       ready"));
        assert!(out.contains("[ALWAYS]"));
        assert!(out.contains("Motion:      unknown"));
        assert!(out.contains("Watch:       active"));
    }

    #[test]
    fn test_history_text_empty() {
        assert_eq!(format_history_text(&[], &plain()), "No locations recorded\n");
    }

    #[test]
    fn test_history_text_lists_samples_in_order() {
        let out = format_history_text(&[sample(2), sample(1)], &plain());
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "2 location(s), most recent first");
        assert!(lines[1].contains("#2"));
        assert!(lines[2].contains("#1"));
        assert!(lines[1].contains("48.858400, 2.294500"));
    }

    #[test]
    fn test_headless_report_failed_has_detail() {
        let outcome = HeadlessOutcome::Failed {
            name: "location".to_string(),
            error: "bad params".to_string(),
        };
        let report = HeadlessReport::new("location", &outcome);
        assert_eq!(report.outcome, "failed");
        let out = format_headless_text(&[report], &plain());
        assert!(out.contains("failed (bad params)"));
    }

    #[test]
    fn test_headless_report_json_skips_empty_detail() {
        let report = HeadlessReport::new("heartbeat", &HeadlessOutcome::Ignored {
            name: "heartbeat".to_string(),
        });
        let json = plain().as_json(&report).unwrap();
        assert!(json.contains("\"outcome\": \"ignored\""));
        assert!(!json.contains("detail"));
    }
}
