//! Pattern Scanner
//!
//! Runs the detector registry over every retained file. Findings come out in
//! file order, then detector-registration order, then match order; callers
//! that need ranking sort explicitly.

use tracing::{debug, warn};

use crate::collector::SourceSet;
use crate::config::Limits;
use crate::model::Finding;
use crate::observability::telemetry::safe_log_text;

pub mod detectors;

pub use detectors::{registry, Detector, DetectorRow, DETECTOR_ROWS, HARDCODED_SECRET};

#[derive(Debug, Default)]
pub struct ScanReport {
    pub findings: Vec<Finding>,
    pub files_scanned: usize,
    pub files_skipped: usize,
    /// Files whose findings hit the per-file cap
    pub capped_files: Vec<String>,
}

pub struct Scanner<'a> {
    detectors: &'a [Detector],
    max_findings_per_file: usize,
    snippet_chars: usize,
}

impl Scanner<'static> {
    /// Scanner over the built-in registry.
    pub fn new(limits: &Limits) -> Self {
        Self::with_detectors(registry(), limits)
    }
}

impl<'a> Scanner<'a> {
    pub fn with_detectors(detectors: &'a [Detector], limits: &Limits) -> Self {
        Self {
            detectors,
            max_findings_per_file: limits.max_findings_per_file,
            snippet_chars: limits.snippet_chars,
        }
    }

    /// Scan every file of the set. Unreadable files are skipped.
    pub fn scan(&self, sources: &SourceSet) -> ScanReport {
        let mut report = ScanReport::default();
        for file in &sources.files {
            let text = match file.read() {
                Ok(t) => t,
                Err(e) => {
                    debug!("{}", safe_log_text(&e.to_string()));
                    report.files_skipped += 1;
                    continue;
                }
            };
            report.files_scanned += 1;

            let findings = self.scan_text(&file.relative, &text);
            if findings.len() >= self.max_findings_per_file && self.max_findings_per_file > 0 {
                warn!(
                    "Finding cap of {} reached for {}",
                    self.max_findings_per_file,
                    safe_log_text(&file.relative)
                );
                report.capped_files.push(file.relative.clone());
            }
            report.findings.extend(findings);
        }
        report
    }

    /// Scan one file's text. Stops as soon as the per-file cap is reached.
    pub fn scan_text(&self, relative: &str, text: &str) -> Vec<Finding> {
        let mut findings = Vec::new();
        if self.max_findings_per_file == 0 {
            return findings;
        }
        let lines = LineIndex::new(text);

        'detectors: for detector in self.detectors {
            for m in detector.regex.find_iter(text) {
                findings.push(Finding {
                    file: relative.to_string(),
                    line: lines.line_of(m.start()),
                    detector: detector.name.to_string(),
                    snippet: snippet_at(text, m.start(), self.snippet_chars),
                    severity: detector.severity,
                    description: format!("{} ({})", detector.description, detector.cwe),
                });
                if findings.len() >= self.max_findings_per_file {
                    break 'detectors;
                }
            }
        }
        findings
    }
}

/// Newline offsets for one text, so each match's line is a binary search.
struct LineIndex {
    newlines: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        Self {
            newlines: text
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i)
                .collect(),
        }
    }

    /// 1-based line of a byte offset: newlines before it, plus one.
    fn line_of(&self, offset: usize) -> usize {
        self.newlines.partition_point(|&nl| nl < offset) + 1
    }
}

/// The trimmed line containing `offset`, cut to `max_chars` characters.
pub fn snippet_at(text: &str, offset: usize, max_chars: usize) -> String {
    let start = text[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let end = text[offset..]
        .find('\n')
        .map(|i| offset + i)
        .unwrap_or(text.len());
    let line = text[start..end].trim();
    match line.char_indices().nth(max_chars) {
        Some((idx, _)) => line[..idx].to_string(),
        None => line.to_string(),
    }
}
