//! JSON export functionality

use anyhow::{Context, Result};
use phaseload_core::FinalReport;
use serde_json::json;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes reports as pretty-printed JSON
pub struct JsonExporter;

impl JsonExporter {
    /// Export the whole report, every session and interaction included
    pub fn export(report: &FinalReport, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        Self::write(report, BufWriter::new(file))
    }

    /// Write the whole report to any writer
    pub fn write<W: Write>(report: &FinalReport, mut writer: W) -> Result<()> {
        serde_json::to_writer_pretty(&mut writer, report)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Export summary only (smaller file)
    pub fn export_summary(report: &FinalReport, path: impl AsRef<Path>) -> Result<()> {
        let phases: Vec<_> = report.phases.iter().map(|p| &p.summary).collect();
        let output = json!({
            "outcome": report.outcome,
            "phases_planned": report.phases_planned,
            "sessions_per_phase": report.sessions_per_phase,
            "started_at": report.started_at,
            "finished_at": report.finished_at,
            "duration_secs": report.duration().as_secs_f64(),
            "success_rate_percent": report.totals.success_rate() * 100.0,
            "totals": report.totals,
            "phases": phases,
            "synthesis": report.synthesis,
        });

        let path = path.as_ref();
        let mut file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        file.write_all(serde_json::to_string_pretty(&output)?.as_bytes())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_export_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = fixtures::report();

        JsonExporter::export(&report, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let back: FinalReport = serde_json::from_str(&text).unwrap();
        assert_eq!(back.session_count(), 3);
        assert_eq!(back.phases[1].sessions[1].outcome, report.phases[1].sessions[1].outcome);
        assert!(!text.contains("\"synthesis\""));
    }

    #[test]
    fn test_export_summary_has_no_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");

        JsonExporter::export_summary(&fixtures::report(), &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["outcome"], "completed");
        assert_eq!(value["phases"].as_array().unwrap().len(), 2);
        assert_eq!(value["phases"][1]["timed_out_sessions"], 1);
        assert_eq!(value["totals"]["total_requests"], 3);
        assert!(value.get("sessions").is_none());
        assert!(value["phases"][0].get("sessions").unwrap().is_number());
    }

    #[test]
    fn test_export_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("report.json");
        let err = JsonExporter::export(&fixtures::report(), &path).unwrap_err();
        assert!(err.to_string().contains("Failed to create"));
    }
}
