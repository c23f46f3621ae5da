//! Plain-text run summary

use phaseload_core::{FinalReport, RunOutcome};
use std::fmt::Write;

/// Render a terminal summary of a run
pub fn render_summary(report: &FinalReport) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = write_summary(&mut out, report);
    out
}

fn write_summary(out: &mut String, report: &FinalReport) -> std::fmt::Result {
    let rule = "=".repeat(70);
    let totals = &report.totals;

    writeln!(out, "{}", rule)?;
    writeln!(out, "   Run Results")?;
    writeln!(out, "{}", rule)?;
    writeln!(out)?;

    let outcome = match report.outcome {
        RunOutcome::Completed => "completed",
        RunOutcome::Interrupted => "interrupted",
    };
    writeln!(out, "Run:")?;
    writeln!(out, "  Outcome:              {}", outcome)?;
    writeln!(
        out,
        "  Phases:               {} of {} planned",
        report.phases.len(),
        report.phases_planned
    )?;
    writeln!(out, "  Duration:             {:.1} s", report.duration().as_secs_f64())?;
    writeln!(out)?;

    writeln!(out, "Sessions:")?;
    writeln!(out, "  Total:                {}", totals.session_count)?;
    writeln!(out, "  Successful:           {}", totals.successful_sessions)?;
    writeln!(out, "  Synthesized plans:    {}", totals.synthesized_plans)?;
    writeln!(out, "  Static plans:         {}", totals.static_plans)?;
    writeln!(out)?;

    writeln!(out, "Interactions:")?;
    writeln!(out, "  Total:                {}", totals.total_requests)?;
    writeln!(
        out,
        "  Successful:           {} ({:.1}%)",
        totals.successful_requests,
        totals.success_rate() * 100.0
    )?;
    writeln!(out, "  Failed:               {}", totals.failed_requests)?;
    writeln!(out, "  Peak rate:            {:.1} rpm", totals.peak_rate_observed)?;
    writeln!(out)?;

    writeln!(out, "Latency:")?;
    writeln!(out, "  Average:              {:.2} ms", totals.average_latency_ms)?;
    writeln!(out, "  Median (P50):         {:.2} ms", totals.latency.p50)?;
    writeln!(out, "  95th Percentile:      {:.2} ms", totals.latency.p95)?;
    writeln!(out, "  99th Percentile:      {:.2} ms", totals.latency.p99)?;
    writeln!(out)?;

    if !report.phases.is_empty() {
        writeln!(
            out,
            "{:>5}  {:>8}  {:>6}  {:>8}  {:>8}  {:>9}  {:>9}",
            "phase", "sessions", "ok", "actions", "failed", "peak rpm", "p95 ms"
        )?;
        for phase in &report.phases {
            let s = &phase.summary;
            writeln!(
                out,
                "{:>5}  {:>8}  {:>6}  {:>8}  {:>8}  {:>9.1}  {:>9.2}{}",
                s.phase,
                s.sessions,
                s.successful_sessions,
                s.interactions,
                s.failed_interactions,
                s.peak_rate,
                s.latency.p95,
                if s.interrupted { "  (interrupted)" } else { "" }
            )?;
        }
        writeln!(out)?;
    }

    if let Some(synthesis) = &report.synthesis {
        writeln!(out, "Behavior synthesis:")?;
        writeln!(out, "  Requests:             {}", synthesis.requests)?;
        writeln!(out, "  Provider attempts:    {}", synthesis.attempts)?;
        writeln!(out, "  Provider failures:    {}", synthesis.provider_failures)?;
        writeln!(out, "  Fallbacks:            {}", synthesis.fallbacks)?;
        writeln!(out)?;
    }

    writeln!(out, "{}", rule)?;
    Ok(())
}
