//! Artifact records passed between pipeline stages.
//!
//! Each stage produces one of these tagged records and validates it once at
//! its boundary; consumers trust the shape they receive.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::response_parser::DEFAULT_TEXT;
use crate::risk::{ImpactFactors, LikelihoodFactors, RiskRating};

/// Name of the synthetic external entity present in every analysis.
pub const END_USER: &str = "End User";

/// Discrete severity. Ordered so that `Critical` sorts highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "Low"),
            Severity::Medium => write!(f, "Medium"),
            Severity::High => write!(f, "High"),
            Severity::Critical => write!(f, "Critical"),
        }
    }
}

impl Severity {
    pub fn all() -> [Severity; 4] {
        [
            Severity::Critical,
            Severity::High,
            Severity::Medium,
            Severity::Low,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    Api,
    Service,
    Database,
    Queue,
    Gateway,
    External,
    Frontend,
    Config,
}

impl ComponentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentType::Api => "api",
            ComponentType::Service => "service",
            ComponentType::Database => "database",
            ComponentType::Queue => "queue",
            ComponentType::Gateway => "gateway",
            ComponentType::External => "external",
            ComponentType::Frontend => "frontend",
            ComponentType::Config => "config",
        }
    }
}

impl std::fmt::Display for ComponentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    pub files: Vec<String>,
    pub description: String,
}

impl Component {
    pub fn new(name: impl Into<String>, component_type: ComponentType) -> Self {
        Self {
            name: name.into(),
            component_type,
            files: Vec::new(),
            description: String::new(),
        }
    }

    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files = files;
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFlow {
    pub from: String,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    pub data_type: String,
}

impl DataFlow {
    pub fn new(from: &str, to: &str, protocol: Option<&str>, data_type: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            protocol: protocol.map(str::to_string),
            data_type: data_type.to_string(),
        }
    }

    /// Edge label: protocol, or the data type when no protocol is known.
    pub fn label(&self) -> &str {
        match self.protocol.as_deref() {
            Some(p) if !p.trim().is_empty() => p,
            _ => &self.data_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustBoundary {
    pub name: String,
    pub components: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub file: String,
    /// 1-based
    pub line: usize,
    pub detector: String,
    pub snippet: String,
    pub severity: Severity,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub languages: Vec<String>,
    pub frameworks: Vec<String>,
    pub components: Vec<Component>,
    pub data_flows: Vec<DataFlow>,
    pub trust_boundaries: Vec<TrustBoundary>,
    pub security_findings: Vec<Finding>,
    pub file_tree: Vec<String>,
    pub entry_points: Vec<String>,
    /// Set when a collection budget cut the file set short
    #[serde(default)]
    pub truncated: bool,
}

impl AnalysisResult {
    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn first_of_type(&self, component_type: ComponentType) -> Option<&Component> {
        self.components
            .iter()
            .find(|c| c.component_type == component_type)
    }

    pub fn has_type(&self, component_type: ComponentType) -> bool {
        self.first_of_type(component_type).is_some()
    }

    /// Flows whose endpoints both resolve to known components.
    pub fn valid_flows(&self) -> impl Iterator<Item = &DataFlow> {
        self.data_flows
            .iter()
            .filter(move |f| self.component(&f.from).is_some() && self.component(&f.to).is_some())
    }

    /// Findings ranked by severity (highest first), then file and line.
    pub fn ranked_findings(&self) -> Vec<&Finding> {
        let mut ranked: Vec<&Finding> = self.security_findings.iter().collect();
        ranked.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.file.cmp(&b.file))
                .then_with(|| a.line.cmp(&b.line))
        });
        ranked
    }
}

/// STRIDE threat categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StrideCategory {
    /// Pretending to be something or someone else
    Spoofing,
    /// Modifying data or code
    Tampering,
    /// Denying having performed an action
    Repudiation,
    /// Exposing information to unauthorized parties
    #[serde(rename = "Information Disclosure")]
    InformationDisclosure,
    /// Making a system unavailable
    #[serde(rename = "Denial of Service")]
    DenialOfService,
    /// Gaining unauthorized capabilities
    #[serde(rename = "Elevation of Privilege")]
    ElevationOfPrivilege,
}

impl std::fmt::Display for StrideCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrideCategory::Spoofing => write!(f, "Spoofing"),
            StrideCategory::Tampering => write!(f, "Tampering"),
            StrideCategory::Repudiation => write!(f, "Repudiation"),
            StrideCategory::InformationDisclosure => write!(f, "Information Disclosure"),
            StrideCategory::DenialOfService => write!(f, "Denial of Service"),
            StrideCategory::ElevationOfPrivilege => write!(f, "Elevation of Privilege"),
        }
    }
}

impl StrideCategory {
    /// All STRIDE categories
    pub fn all() -> [Self; 6] {
        [
            StrideCategory::Spoofing,
            StrideCategory::Tampering,
            StrideCategory::Repudiation,
            StrideCategory::InformationDisclosure,
            StrideCategory::DenialOfService,
            StrideCategory::ElevationOfPrivilege,
        ]
    }

    /// Lenient lookup against the allow-list: case, spacing, underscores and
    /// hyphens are ignored; single-letter STRIDE codes are accepted.
    pub fn parse(raw: &str) -> Option<Self> {
        let key: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "spoofing" | "s" => Some(StrideCategory::Spoofing),
            "tampering" | "t" => Some(StrideCategory::Tampering),
            "repudiation" | "r" => Some(StrideCategory::Repudiation),
            "informationdisclosure" | "i" => Some(StrideCategory::InformationDisclosure),
            "denialofservice" | "dos" | "d" => Some(StrideCategory::DenialOfService),
            "elevationofprivilege" | "e" => Some(StrideCategory::ElevationOfPrivilege),
            _ => None,
        }
    }

    /// Get typical mitigations for this category
    pub fn typical_mitigations(&self) -> &'static [&'static str] {
        match self {
            StrideCategory::Spoofing => &[
                "Require strong authentication (MFA) on every externally reachable entry point",
                "Issue short-lived session tokens and validate them server-side",
            ],
            StrideCategory::Tampering => &[
                "Validate and canonicalize all input at the trust boundary",
                "Protect message integrity with signatures or MACs",
            ],
            StrideCategory::Repudiation => &[
                "Write tamper-evident audit logs for security-relevant actions",
                "Record actor identity and timestamps with every state change",
            ],
            StrideCategory::InformationDisclosure => &[
                "Encrypt sensitive data at rest and in transit (TLS)",
                "Apply least-privilege access control lists to data stores",
            ],
            StrideCategory::DenialOfService => &[
                "Apply rate limiting and request size limits at the edge",
                "Set resource quotas and timeouts on expensive operations",
            ],
            StrideCategory::ElevationOfPrivilege => &[
                "Enforce role-based access control on every privileged operation",
                "Run components with least privilege and sandbox untrusted execution",
            ],
        }
    }
}

/// Threat modeling methodology the prompt is framed around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    #[default]
    Stride,
    Pasta,
    Owasp,
}

impl std::fmt::Display for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Framework::Stride => write!(f, "stride"),
            Framework::Pasta => write!(f, "pasta"),
            Framework::Owasp => write!(f, "owasp"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Mitigation {
    Prose {
        text: String,
    },
    Code {
        file: String,
        original: String,
        fixed: String,
    },
}

impl Mitigation {
    pub fn prose(text: impl Into<String>) -> Self {
        Mitigation::Prose { text: text.into() }
    }
}

/// A normalized threat before the risk engine has rated it.
///
/// Both synthesizers produce drafts; severity only exists after
/// [`ThreatRecord::from_draft`].
#[derive(Debug, Clone, PartialEq)]
pub struct ThreatDraft {
    pub title: String,
    pub stride_category: StrideCategory,
    pub threat_source: String,
    pub prerequisites: String,
    pub threat_action: String,
    pub threat_impact: String,
    pub impacted_assets: Vec<String>,
    pub trust_boundary: String,
    pub assumptions: Vec<String>,
    pub mitigations: Vec<Mitigation>,
    pub cve: Option<String>,
    pub likelihood: LikelihoodFactors,
    pub impact: ImpactFactors,
    /// Upstream severity suggestion; never copied to the record
    pub suggested_severity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatRecord {
    pub id: String,
    pub title: String,
    pub stride_category: StrideCategory,
    pub severity: Severity,
    pub threat_source: String,
    pub prerequisites: String,
    pub threat_action: String,
    pub threat_impact: String,
    pub impacted_assets: Vec<String>,
    pub trust_boundary: String,
    pub assumptions: Vec<String>,
    pub mitigations: Vec<Mitigation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cve: Option<String>,
    pub statement: String,
    pub risk: RiskRating,
}

impl ThreatRecord {
    /// Rate a draft. Severity comes from the risk engine only.
    pub fn from_draft(id: impl Into<String>, draft: ThreatDraft) -> Self {
        let risk = RiskRating::compute(draft.likelihood, draft.impact);
        let mut record = Self {
            id: id.into(),
            title: draft.title,
            stride_category: draft.stride_category,
            severity: risk.severity,
            threat_source: draft.threat_source,
            prerequisites: draft.prerequisites,
            threat_action: draft.threat_action,
            threat_impact: draft.threat_impact,
            impacted_assets: draft.impacted_assets,
            trust_boundary: draft.trust_boundary,
            assumptions: draft.assumptions,
            mitigations: draft.mitigations,
            cve: draft.cve,
            statement: String::new(),
            risk,
        };
        record.statement = record.render_statement();
        record
    }

    /// Grammar-structured threat statement.
    pub fn render_statement(&self) -> String {
        let assets = if self.impacted_assets.is_empty() {
            "the system".to_string()
        } else {
            self.impacted_assets.join(", ")
        };
        let mut statement = format!(
            "A {}",
            statement_part(&self.threat_source).unwrap_or("threat actor")
        );
        if let Some(prerequisites) = statement_part(&self.prerequisites) {
            statement.push(' ');
            statement.push_str(prerequisites);
        }
        statement.push_str(" can ");
        statement.push_str(statement_part(&self.threat_action).unwrap_or("exploit this weakness"));
        if let Some(impact) = statement_part(&self.threat_impact) {
            statement.push_str(", which leads to ");
            statement.push_str(impact);
        }
        statement.push_str(", negatively impacting ");
        statement.push_str(&assets);
        statement.push('.');
        statement
    }

    /// Severity recomputed from the stored factors.
    pub fn derived_severity(&self) -> Severity {
        RiskRating::compute(self.risk.likelihood, self.risk.impact).severity
    }
}

/// Clause text, or `None` for blanks and the normalization placeholder.
fn statement_part(s: &str) -> Option<&str> {
    let part = s.trim().trim_end_matches('.');
    (!part.is_empty() && part != DEFAULT_TEXT).then_some(part)
}

/// Which synthesizer produced the threats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisPath {
    Model,
    Rules,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total: usize,
    pub by_severity: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
}

impl ReportSummary {
    pub fn from_threats(threats: &[ThreatRecord]) -> Self {
        let mut summary = Self {
            total: threats.len(),
            ..Self::default()
        };
        for sev in Severity::all() {
            summary.by_severity.insert(sev.to_string(), 0);
        }
        for t in threats {
            *summary.by_severity.entry(t.severity.to_string()).or_default() += 1;
            *summary
                .by_category
                .entry(t.stride_category.to_string())
                .or_default() += 1;
        }
        summary
    }
}

/// Final output of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatModelReport {
    pub session_id: String,
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub source: String,
    pub framework: Framework,
    pub synthesis: SynthesisPath,
    pub analysis: AnalysisResult,
    pub diagram: String,
    pub threats: Vec<ThreatRecord>,
    pub summary: ReportSummary,
}
