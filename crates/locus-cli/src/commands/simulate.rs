//! Simulate command: drive a scripted session against the mock engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use locus_core::mock::jittered_location;
use locus_core::{
    AppState, MockPermissions, MockProvider, PermissionGateway, PermissionStatus, ProviderEvent,
    SetupOutcome, TrackingConfig, TrackingSession, TrackingStatus, WatchState,
};
use locus_types::{AuthorizationStatus, GeofenceAction, LocationSample, ProviderChangeEvent};
use serde::Serialize;
use tracing::info;

use crate::cli::SimulateArgs;
use crate::format::{FormatOptions, format_history_text, format_status_text};
use crate::util::{load_config, write_output};

/// Scatter radius of scripted fixes in meters.
const JITTER_RADIUS_M: f64 = 150.0;

/// What the scripted session observed.
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub setup: String,
    pub status: TrackingStatus,
    pub watch: WatchState,
    /// Start commands issued to the engine.
    pub start_commands: u32,
    /// Narrow motion updates applied.
    pub motion_patches: usize,
    /// Most foreground watches ever live at once.
    pub peak_live_watches: usize,
    pub history: Vec<LocationSample>,
}

fn setup_label(outcome: &SetupOutcome) -> String {
    match outcome {
        SetupOutcome::Configured => "configured".to_string(),
        SetupOutcome::AlreadyReady => "already-ready".to_string(),
        SetupOutcome::Reconciled => "reconciled".to_string(),
        SetupOutcome::ReconcileFailed(reason) => format!("reconcile-failed: {}", reason),
        SetupOutcome::Failed(reason) => format!("failed: {}", reason),
    }
}

/// Run the script and collect a report.
pub async fn run_simulation(args: &SimulateArgs, config: TrackingConfig) -> Result<SimulationReport> {
    let authorization = AuthorizationStatus::from(args.permission);
    let provider = Arc::new(MockProvider::builder().authorization(authorization).build());

    let backend = Arc::new(MockPermissions::new(args.platform.into()));
    if args.motion_granted {
        backend.set_motion_status(PermissionStatus::Granted);
    }
    backend.grant_motion_on_request(args.grant_motion_later);
    let permissions = PermissionGateway::new(backend);

    // Events that land while the engine is still acknowledging its config.
    provider.emit_during_ready(ProviderEvent::ProviderChange(ProviderChangeEvent {
        status: authorization,
        enabled: true,
        gps: true,
        network: true,
    }));
    provider.emit_during_ready(ProviderEvent::Location(jittered_location(
        args.lat,
        args.lng,
        JITTER_RADIUS_M,
    )));

    let app_state = if args.background {
        AppState::Background
    } else {
        AppState::Active
    };
    let session = TrackingSession::start(provider.clone(), permissions, config, app_state).await;
    let coordinator = session.coordinator();

    if authorization == AuthorizationStatus::NotDetermined {
        coordinator.request_location_permission().await;
    }

    let step = Duration::from_millis(args.step_ms);
    let midpoint = args.fixes / 2;
    for i in 0..args.fixes {
        if i == midpoint {
            if args.grant_motion_later {
                coordinator.request_motion_permission().await;
            }
            if args.background {
                session.set_app_state(AppState::Active);
            }
        }

        let fix = jittered_location(args.lat, args.lng, JITTER_RADIUS_M);
        if i == 0 {
            provider.emit_motion_change(true, fix);
        } else if i + 1 == args.fixes {
            provider.emit_geofence("home", GeofenceAction::Exit, fix);
        } else if session.watch_state() == WatchState::Active {
            provider.emit_watch_fix(fix);
        } else {
            provider.emit_location(fix);
        }
        tokio::time::sleep(step).await;
    }
    // Let the last events drain.
    tokio::time::sleep(step).await;

    let report = SimulationReport {
        setup: setup_label(session.setup_outcome()),
        status: session.status(),
        watch: session.watch_state(),
        start_commands: provider.start_count(),
        motion_patches: provider.patches().await.len(),
        peak_live_watches: provider.peak_live_watches(),
        history: session.history().entries(),
    };
    session.shutdown().await;

    info!(
        samples = report.history.len(),
        starts = report.start_commands,
        "Simulation finished"
    );
    Ok(report)
}

fn format_report_text(report: &SimulationReport, opts: &FormatOptions) -> String {
    let mut out = format!("Outcome:     {}\n", report.setup);
    out.push_str(&format_status_text(&report.status, report.watch, opts));
    out.push_str(&format!("Starts:      {}\n", report.start_commands));
    out.push_str(&format!("Motion sync: {}\n", report.motion_patches));
    out.push_str(&format!("Peak watches: {}\n", report.peak_live_watches));
    out.push('\n');
    out.push_str(&format_history_text(&report.history, opts));
    out
}

pub async fn cmd_simulate(
    args: &SimulateArgs,
    config_path: Option<&Path>,
    output: Option<&PathBuf>,
    opts: &FormatOptions,
) -> Result<()> {
    let config = load_config(config_path)?;
    let report = run_simulation(args, config).await?;

    let rendered = if opts.is_json() {
        opts.as_json(&report)?
    } else {
        format_report_text(&report, opts)
    };
    write_output(output, &rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands, OutputFormat};
    use clap::Parser;
    use locus_types::LocationPermission;

    fn args(extra: &[&str]) -> SimulateArgs {
        let mut argv = vec!["locus", "simulate", "--step-ms", "5"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Simulate(args) => args,
            _ => panic!("expected simulate"),
        }
    }

    #[tokio::test]
    async fn test_always_permission_starts_once_and_records() {
        let report = run_simulation(&args(&["--fixes", "4"]), TrackingConfig::default())
            .await
            .unwrap();

        assert_eq!(report.setup, "configured");
        assert_eq!(report.status.permissions.location, LocationPermission::Always);
        assert_eq!(report.start_commands, 1);
        assert!(report.peak_live_watches <= 1);
        // The fix emitted during setup plus one per scripted step.
        assert_eq!(report.history.len(), 5);
    }

    #[tokio::test]
    async fn test_denied_permission_never_starts() {
        let report = run_simulation(
            &args(&["--permission", "denied", "--fixes", "2"]),
            TrackingConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(report.start_commands, 0);
        assert_eq!(report.status.permissions.location, LocationPermission::Blocked);
        assert_eq!(report.watch, WatchState::Stopped);
    }

    #[tokio::test]
    async fn test_late_motion_grant_applies_patch() {
        let report = run_simulation(
            &args(&["--grant-motion-later", "--fixes", "4"]),
            TrackingConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(report.status.permissions.motion, Some(true));
        assert_eq!(report.motion_patches, 1);
    }

    #[test]
    fn test_setup_labels() {
        assert_eq!(setup_label(&SetupOutcome::Reconciled), "reconciled");
        assert_eq!(
            setup_label(&SetupOutcome::ReconcileFailed("rejected".to_string())),
            "reconcile-failed: rejected"
        );
    }

    #[test]
    fn test_report_text_lists_counts() {
        let report = SimulationReport {
            setup: "configured".to_string(),
            status: TrackingStatus::default(),
            watch: WatchState::Stopped,
            start_commands: 0,
            motion_patches: 0,
            peak_live_watches: 0,
            history: Vec::new(),
        };
        let opts = FormatOptions::new(true, OutputFormat::Text);
        let out = format_report_text(&report, &opts);
        assert!(out.starts_with("Outcome:     configured\n"));
        assert!(out.contains("Setup:       idle"));
        assert!(out.contains("Starts:      0"));
        assert!(out.contains("No locations recorded"));
    }
}
