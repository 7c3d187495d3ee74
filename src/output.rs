//! Report rendering
//!
//! JSON for machines, a colored terminal summary for people. Color is
//! controlled globally through `colored::control`; callers turn it off for
//! `--no-color`, `NO_COLOR`, and file output.

use colored::*;
use std::fmt::Write;

use crate::model::{Mitigation, Severity, ThreatModelReport, ThreatRecord};

/// Report serialization format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary (default)
    #[default]
    Text,
    /// Full report as JSON
    Json,
}

pub fn render(report: &ThreatModelReport, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Text => Ok(render_text(report)),
    }
}

fn severity_label(severity: Severity) -> ColoredString {
    let label = format!("[{}]", severity);
    match severity {
        Severity::Critical => label.bright_red().bold(),
        Severity::High => label.red(),
        Severity::Medium => label.yellow(),
        Severity::Low => label.green(),
    }
}

fn short_mitigation(m: &Mitigation) -> String {
    match m {
        Mitigation::Prose { text } => text.clone(),
        Mitigation::Code { file, fixed, .. } => format!("{}: {}", file, fixed),
    }
}

fn render_threat(out: &mut String, threat: &ThreatRecord) {
    let _ = writeln!(
        out,
        "{} {} {} {}",
        severity_label(threat.severity),
        threat.id.dimmed(),
        threat.title.bold(),
        format!("({})", threat.stride_category).cyan()
    );
    let _ = writeln!(out, "    {}", threat.statement);
    let _ = writeln!(
        out,
        "    {} likelihood {:.2} ({}) x impact {:.2} ({}) = {:.2}",
        "risk:".dimmed(),
        threat.risk.likelihood_score,
        threat.risk.likelihood_level,
        threat.risk.impact_score,
        threat.risk.impact_level,
        threat.risk.overall_risk_score
    );
    if let Some(first) = threat.mitigations.first() {
        let _ = writeln!(out, "    {} {}", "mitigate:".dimmed(), short_mitigation(first));
    }
    if let Some(cve) = &threat.cve {
        let _ = writeln!(out, "    {} {}", "cve:".dimmed(), cve);
    }
}

/// Terminal summary: header, counts, then one block per threat.
pub fn render_text(report: &ThreatModelReport) -> String {
    let mut out = String::new();
    let analysis = &report.analysis;

    let _ = writeln!(out, "{} {}", "Threat model for".bright_blue(), report.source.bold());
    let _ = writeln!(
        out,
        "{}",
        format!(
            "session {} | synthesis: {:?} | framework: {}",
            report.session_id, report.synthesis, report.framework
        )
        .to_lowercase()
        .dimmed()
    );
    if !analysis.languages.is_empty() {
        let _ = writeln!(out, "Languages:  {}", analysis.languages.join(", "));
    }
    if !analysis.frameworks.is_empty() {
        let _ = writeln!(out, "Frameworks: {}", analysis.frameworks.join(", "));
    }
    let _ = writeln!(
        out,
        "Components: {}  Flows: {}  Findings: {}{}",
        analysis.components.len().to_string().cyan(),
        analysis.valid_flows().count().to_string().cyan(),
        analysis.security_findings.len().to_string().cyan(),
        if analysis.truncated {
            " (file budget reached)".yellow().to_string()
        } else {
            String::new()
        }
    );

    let mut counts = Vec::new();
    for severity in Severity::all() {
        let n = report
            .summary
            .by_severity
            .get(&severity.to_string())
            .copied()
            .unwrap_or(0);
        counts.push(format!("{} {}", severity_label(severity), n));
    }
    let _ = writeln!(out, "Threats: {}  {}", report.summary.total, counts.join("  "));
    out.push('\n');

    if report.threats.is_empty() {
        let _ = writeln!(out, "{}", "No threats identified.".green());
    }
    for threat in &report.threats {
        render_threat(&mut out, threat);
        out.push('\n');
    }
    out
}
