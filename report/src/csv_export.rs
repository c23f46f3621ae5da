//! CSV export functionality

use anyhow::{Context, Result};
use csv::Writer;
use phaseload_core::FinalReport;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const SESSION_HEADERS: [&str; 14] = [
    "session_id",
    "phase",
    "profile",
    "target",
    "planned_rate_rpm",
    "planned_actions",
    "plan_source",
    "interactions",
    "successful",
    "failed",
    "duration_ms",
    "outcome",
    "succeeded",
    "setup_error",
];

const INTERACTION_HEADERS: [&str; 11] = [
    "session_id",
    "phase",
    "index",
    "url",
    "kind",
    "action",
    "status_code",
    "error",
    "content_length",
    "delay_before_ms",
    "latency_ms",
];

/// Writes reports as CSV tables
pub struct CsvExporter;

impl CsvExporter {
    /// Export one row per session
    pub fn export_sessions(report: &FinalReport, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        Self::write_sessions(report, file)
    }

    /// Write one row per session to any writer
    pub fn write_sessions<W: Write>(report: &FinalReport, writer: W) -> Result<()> {
        let mut wtr = Writer::from_writer(writer);
        wtr.write_record(SESSION_HEADERS)?;

        for session in report.sessions() {
            let setup_error = match &session.outcome {
                phaseload_core::SessionOutcome::SetupFailed { reason } => reason.as_str(),
                _ => "",
            };
            wtr.write_record([
                session.session_id.0.to_string(),
                session.phase.to_string(),
                session.profile_name.clone(),
                session.target.clone(),
                format!("{:.2}", session.planned_rate),
                session.planned_actions.to_string(),
                session
                    .plan_source
                    .map(|s| s.label())
                    .unwrap_or_default()
                    .to_string(),
                session.interactions.len().to_string(),
                session.successful_interactions().to_string(),
                session.failed_interactions().to_string(),
                format!("{:.1}", session.duration_ms),
                session.outcome.label().to_string(),
                session.succeeded.to_string(),
                setup_error.to_string(),
            ])?;
        }

        wtr.flush()?;
        Ok(())
    }

    /// Export one row per attempted interaction
    pub fn export_interactions(report: &FinalReport, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let mut wtr = Writer::from_writer(file);
        wtr.write_record(INTERACTION_HEADERS)?;

        for session in report.sessions() {
            for i in &session.interactions {
                wtr.write_record([
                    session.session_id.0.to_string(),
                    session.phase.to_string(),
                    i.index.to_string(),
                    i.target.clone(),
                    i.kind.id().to_string(),
                    i.action.clone(),
                    i.status_code.map(|s| s.to_string()).unwrap_or_default(),
                    i.error.clone().unwrap_or_default(),
                    i.content_length.to_string(),
                    i.delay_before_ms.to_string(),
                    format!("{:.3}", i.latency_ms),
                ])?;
            }
        }

        wtr.flush()?;
        Ok(())
    }
}
