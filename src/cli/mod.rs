//! CLI argument parsing and command dispatch

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use phaseload_core::{
    default_profiles, BehaviorSynthesisClient, FinalReport, PhaseSchedulerBuilder, RateLimiter,
    RunConfig,
};
use phaseload_report::{render_summary, CsvExporter, JsonExporter};
use phaseload_vendors::{HttpClientPool, HttpConfig, HttpProviderClient, HttpTransport};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "phaseload")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run phases of synthetic sessions against the configured targets
    Run {
        /// Path to the JSON run configuration
        #[arg(short, long)]
        config: PathBuf,

        /// Number of phases (overrides the configuration)
        #[arg(long)]
        phases: Option<u32>,

        /// Sessions launched per phase (overrides the configuration)
        #[arg(long)]
        sessions_per_phase: Option<usize>,

        /// Pause between phases in seconds (overrides the configuration)
        #[arg(long)]
        inter_phase_delay_secs: Option<f64>,

        /// Write the report to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Report format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Use static profile plans only, even when providers are configured
        #[arg(long)]
        no_synthesis: bool,
    },
    /// Validate a configuration file
    Validate {
        /// Path to the JSON run configuration
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the built-in behavior profile table as JSON
    Profiles,
}

/// Report formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Full report as JSON
    Json,
    /// One row per session
    Csv,
    /// Human-readable summary
    Text,
}

impl Cli {
    /// Dispatch the selected command
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Run {
                config,
                phases,
                sessions_per_phase,
                inter_phase_delay_secs,
                output,
                format,
                no_synthesis,
            } => {
                let mut run_config = load_config(config)?;
                if let Some(phases) = phases {
                    run_config.scheduler.max_phases = *phases;
                }
                if let Some(sessions) = sessions_per_phase {
                    run_config.scheduler.sessions_per_phase = *sessions;
                }
                if let Some(delay) = inter_phase_delay_secs {
                    run_config.scheduler.inter_phase_delay_secs = *delay;
                }
                if *no_synthesis {
                    run_config.synthesis = None;
                }
                run_config
                    .validate()
                    .context("Invalid run configuration")?;

                let report = execute(&run_config).await?;
                write_report(&report, *format, output.as_deref())
            }
            Commands::Validate { config } => {
                let run_config = load_config(config)?;
                run_config
                    .validate()
                    .context("Invalid run configuration")?;
                println!(
                    "{}: ok ({} phases x {} sessions, {} targets, {} profiles, synthesis {})",
                    config.display(),
                    run_config.scheduler.max_phases,
                    run_config.scheduler.sessions_per_phase,
                    run_config.targets.len(),
                    run_config.profiles.len(),
                    if run_config.synthesis.is_some() {
                        "on"
                    } else {
                        "off"
                    }
                );
                Ok(())
            }
            Commands::Profiles => {
                println!("{}", serde_json::to_string_pretty(&default_profiles())?);
                Ok(())
            }
        }
    }
}

fn load_config(path: &Path) -> Result<RunConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration: {}", path.display()))?;
    RunConfig::from_json_str(&text)
        .with_context(|| format!("Failed to parse configuration: {}", path.display()))
}

/// Wire the collaborators and run the scheduler to completion or Ctrl+C
async fn execute(config: &RunConfig) -> Result<FinalReport> {
    let http_config = HttpConfig::default()
        .with_request_timeout(config.scheduler.action_timeout())
        .with_max_idle_per_host(config.scheduler.max_concurrent_sessions);
    let pool = HttpClientPool::new(&http_config).context("Failed to build HTTP client")?;
    let transport = Arc::new(HttpTransport::with_pool(pool.clone()));

    let synthesis = match &config.synthesis {
        Some(synthesis_config) => {
            let client = BehaviorSynthesisClient::new(
                config.providers.clone(),
                Arc::new(HttpProviderClient::with_pool(pool)),
                Arc::new(RateLimiter::per_minute(60)),
                synthesis_config.clone(),
            )
            .context("Invalid synthesis configuration")?;
            Some(Arc::new(client))
        }
        None => None,
    };

    let scheduler = PhaseSchedulerBuilder::from_run_config(config)
        .transport(transport)
        .synthesis(synthesis)
        .build()
        .context("Failed to build scheduler")?;

    tracing::info!(
        phases = config.scheduler.max_phases,
        sessions_per_phase = config.scheduler.sessions_per_phase,
        targets = config.targets.len(),
        synthesis = config.synthesis.is_some(),
        "Starting run"
    );

    let report = scheduler
        .run_with_signal_handling(
            config.scheduler.max_phases,
            config.scheduler.sessions_per_phase,
            config.scheduler.inter_phase_delay(),
        )
        .await;

    if report.is_interrupted() {
        tracing::warn!(
            phases_completed = report.phases_completed(),
            sessions = report.session_count(),
            "Run interrupted, report is partial"
        );
    }
    Ok(report)
}

fn write_report(report: &FinalReport, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    match (format, output) {
        (OutputFormat::Json, Some(path)) => JsonExporter::export(report, path)?,
        (OutputFormat::Json, None) => JsonExporter::write(report, std::io::stdout().lock())?,
        (OutputFormat::Csv, Some(path)) => CsvExporter::export_sessions(report, path)?,
        (OutputFormat::Csv, None) => CsvExporter::write_sessions(report, std::io::stdout().lock())?,
        (OutputFormat::Text, Some(path)) => std::fs::write(path, render_summary(report))
            .with_context(|| format!("Failed to write {}", path.display()))?,
        (OutputFormat::Text, None) => print!("{}", render_summary(report)),
    }

    if let Some(path) = output {
        tracing::info!(path = %path.display(), "Report written");
    }
    if report.totals.session_count > 0 && report.totals.successful_sessions == 0 {
        tracing::warn!(sessions = report.totals.session_count, "No session succeeded");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_overrides_parse() {
        let cli = Cli::parse_from([
            "phaseload",
            "-v",
            "run",
            "--config",
            "run.json",
            "--phases",
            "2",
            "--sessions-per-phase",
            "8",
            "--format",
            "json",
            "--no-synthesis",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Run {
                phases,
                sessions_per_phase,
                format,
                no_synthesis,
                ..
            } => {
                assert_eq!(phases, Some(2));
                assert_eq!(sessions_per_phase, Some(8));
                assert_eq!(format, OutputFormat::Json);
                assert!(no_synthesis);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_load_config_reports_path() {
        let err = load_config(Path::new("/nonexistent/run.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/run.json"));
    }
}
