//! Report sinks for phaseload runs
//!
//! This crate turns a [`FinalReport`](phaseload_core::FinalReport) into:
//!
//! - JSON (the full report, or phase summaries only)
//! - CSV (one row per session, or one row per interaction)
//! - A plain-text summary for the terminal

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod csv_export;
pub mod json_export;
pub mod summary;

pub use csv_export::CsvExporter;
pub use json_export::JsonExporter;
pub use summary::render_summary;
