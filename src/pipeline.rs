//! Synthesis Orchestrator
//!
//! Runs collect, scan, extract, render and synthesize in order. Each stage
//! executes inside a tracing span tagged with the run's session id. The
//! collected [`SourceSet`] (and the temporary clone it may own) is dropped as
//! soon as extraction is done, and on every early return.

use anyhow::{Context, Result};
use tracing::info;
use uuid::Uuid;

use crate::collector::{Collector, SourceLocator, SourceSet};
use crate::config::Config;
use crate::diagram;
use crate::extractor;
use crate::model::{AnalysisResult, Framework, ReportSummary, ThreatModelReport};
use crate::observability::telemetry::track_stage;
use crate::scanner::{ScanReport, Scanner};
use crate::synthesis::{finalize, SynthesisInput, Synthesizer};

pub struct Pipeline {
    config: Config,
    session: String,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            session: Uuid::new_v4().to_string(),
        }
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn collect(&self, locator: &SourceLocator) -> Result<SourceSet> {
        let collector = Collector::new(self.config.limits.clone(), self.session.clone());
        let sources = track_stage("collect", &self.session, || collector.collect(locator)).await?;
        info!(
            files = sources.len(),
            truncated = sources.truncated,
            skipped_oversize = sources.skipped_oversize,
            "Collected {}",
            locator.display_name()
        );
        Ok(sources)
    }

    pub async fn scan(&self, sources: &SourceSet) -> Result<ScanReport> {
        let scanner = Scanner::new(&self.config.limits);
        let report = track_stage("scan", &self.session, || async {
            Ok::<_, anyhow::Error>(scanner.scan(sources))
        })
        .await?;
        info!(
            findings = report.findings.len(),
            files_scanned = report.files_scanned,
            files_skipped = report.files_skipped,
            "Scan finished"
        );
        Ok(report)
    }

    /// Collect, scan and extract. The source set is released on return.
    pub async fn analyze_source(&self, locator: &SourceLocator) -> Result<AnalysisResult> {
        let sources = self.collect(locator).await?;
        let report = self.scan(&sources).await?;
        let limits = &self.config.limits;
        let findings = report.findings;
        // The source set moves into the stage and drops with it.
        let analysis = track_stage("extract", &self.session, || async move {
            Ok::<_, anyhow::Error>(extractor::extract(&sources, findings, limits))
        })
        .await?;
        info!(
            components = analysis.components.len(),
            flows = analysis.data_flows.len(),
            "Extraction finished"
        );
        Ok(analysis)
    }

    /// Collect, extract and render only.
    pub async fn diagram(&self, source: &str) -> Result<String> {
        let locator = SourceLocator::parse(source)?;
        let analysis = self.analyze_source(&locator).await?;
        self.render(&analysis).await
    }

    async fn render(&self, analysis: &AnalysisResult) -> Result<String> {
        track_stage("render", &self.session, || async {
            Ok::<_, anyhow::Error>(diagram::render(analysis))
        })
        .await
    }

    /// Full threat model for a repository URL or local directory.
    pub async fn analyze(
        &self,
        source: &str,
        framework: Framework,
        synthesizer: &dyn Synthesizer,
    ) -> Result<ThreatModelReport> {
        let locator = SourceLocator::parse(source)?;
        info!(session = %self.session, "Analyzing {}", locator.display_name());
        let analysis = self.analyze_source(&locator).await?;
        self.synthesize(locator.display_name(), analysis, framework, None, synthesizer)
            .await
    }

    /// Threat model for a design document.
    pub async fn analyze_document(
        &self,
        name: &str,
        text: &str,
        framework: Framework,
        synthesizer: &dyn Synthesizer,
    ) -> Result<ThreatModelReport> {
        info!(session = %self.session, "Analyzing document {}", name);
        let scanner = Scanner::new(&self.config.limits);
        let findings = scanner.scan_text(name, text);
        let analysis = extractor::extract_document(name, text, findings);
        self.synthesize(name.to_string(), analysis, framework, Some(text), synthesizer)
            .await
    }

    async fn synthesize(
        &self,
        source: String,
        analysis: AnalysisResult,
        framework: Framework,
        document: Option<&str>,
        synthesizer: &dyn Synthesizer,
    ) -> Result<ThreatModelReport> {
        let diagram = self.render(&analysis).await?;

        let input = SynthesisInput {
            analysis: &analysis,
            framework,
            document,
        };
        let drafts = track_stage("synthesize", &self.session, || synthesizer.synthesize(input))
            .await
            .context("Threat synthesis failed")?;

        let threats = finalize(drafts);
        let summary = ReportSummary::from_threats(&threats);
        info!(
            threats = threats.len(),
            path = ?synthesizer.path(),
            "Synthesis finished"
        );

        Ok(ThreatModelReport {
            session_id: self.session.clone(),
            generated_at: chrono::Utc::now(),
            source,
            framework,
            synthesis: synthesizer.path(),
            analysis,
            diagram,
            threats,
            summary,
        })
    }
}
