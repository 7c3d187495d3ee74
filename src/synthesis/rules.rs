//! Rule-backed synthesizer
//!
//! Deterministic fallback used when no model credentials are configured.
//! Every finding becomes one threat through a detector-keyed profile table,
//! and a handful of architecture rules add threats the scanner cannot see.

use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

use super::{SynthesisInput, Synthesizer};
use crate::extractor::{Category, EXTERNAL_BOUNDARY, INFRA_BOUNDARY, INTERNAL_BOUNDARY};
use crate::model::{
    AnalysisResult, ComponentType, Finding, Mitigation, StrideCategory, SynthesisPath,
    ThreatDraft, END_USER,
};
use crate::risk::{ImpactFactors, LikelihoodFactors};
use crate::scanner::HARDCODED_SECRET;

/// How one detector's findings are turned into a threat.
pub struct RuleProfile {
    pub detector: &'static str,
    pub title: &'static str,
    pub category: StrideCategory,
    pub threat_source: &'static str,
    pub prerequisites: &'static str,
    pub threat_action: &'static str,
    pub threat_impact: &'static str,
    pub asset: &'static str,
    pub boundary: &'static str,
    pub likelihood: [u8; 8],
    pub impact: [u8; 4],
    pub mitigation: &'static str,
}

// Factor profiles, ordered by how directly the weakness is exploitable.
const L_DIRECT: [u8; 8] = [6, 9, 7, 9, 7, 7, 6, 8];
const L_REMOTE: [u8; 8] = [5, 8, 7, 9, 6, 6, 5, 7];
const L_MODERATE: [u8; 8] = [4, 6, 5, 6, 5, 4, 4, 6];
const L_LOW: [u8; 8] = [3, 4, 4, 6, 4, 3, 3, 5];

const I_SEVERE: [u8; 4] = [9, 7, 5, 7];
const I_SIGNIFICANT: [u8; 4] = [6, 6, 4, 5];
const I_MODERATE: [u8; 4] = [5, 5, 4, 4];
const I_MINOR: [u8; 4] = [3, 2, 2, 3];

pub const FINDING_RULES: &[RuleProfile] = &[
    RuleProfile {
        detector: HARDCODED_SECRET,
        title: "Hardcoded credential",
        category: StrideCategory::InformationDisclosure,
        threat_source: "malicious actor",
        prerequisites: "with read access to the source repository or a built artifact",
        threat_action: "extract the embedded secret and reuse it against the backing service",
        threat_impact: "unauthorized access under the application's identity",
        asset: "Credentials",
        boundary: INFRA_BOUNDARY,
        likelihood: L_DIRECT,
        impact: I_SEVERE,
        mitigation: "Move the secret to a secrets manager or environment variable and rotate the exposed value",
    },
    RuleProfile {
        detector: "private_key",
        title: "Committed private key",
        category: StrideCategory::InformationDisclosure,
        threat_source: "malicious actor",
        prerequisites: "with read access to the source repository",
        threat_action: "use the committed private key to decrypt traffic or sign as the service",
        threat_impact: "loss of confidentiality and impersonation of the service",
        asset: "Key material",
        boundary: INFRA_BOUNDARY,
        likelihood: L_DIRECT,
        impact: I_SEVERE,
        mitigation: "Remove the key from version control history, revoke it, and load keys from a secure store",
    },
    RuleProfile {
        detector: "aws_access_key",
        title: "Exposed cloud access key",
        category: StrideCategory::ElevationOfPrivilege,
        threat_source: "malicious actor",
        prerequisites: "with read access to the source repository",
        threat_action: "call cloud provider APIs with the leaked access key",
        threat_impact: "control over cloud resources granted to the key",
        asset: "Cloud account",
        boundary: INFRA_BOUNDARY,
        likelihood: L_DIRECT,
        impact: I_SEVERE,
        mitigation: "Deactivate the key, audit its recent usage, and switch to short-lived role credentials",
    },
    RuleProfile {
        detector: "sql_injection",
        title: "SQL injection",
        category: StrideCategory::Tampering,
        threat_source: "remote attacker",
        prerequisites: "who can reach the affected endpoint",
        threat_action: "inject SQL through input concatenated into a query",
        threat_impact: "reading or modifying arbitrary database records",
        asset: "Database records",
        boundary: EXTERNAL_BOUNDARY,
        likelihood: L_REMOTE,
        impact: I_SIGNIFICANT,
        mitigation: "Use parameterized queries or a query builder for every statement that includes user input",
    },
    RuleProfile {
        detector: "command_injection",
        title: "OS command injection",
        category: StrideCategory::ElevationOfPrivilege,
        threat_source: "remote attacker",
        prerequisites: "who controls input passed to a shell command",
        threat_action: "execute arbitrary operating system commands",
        threat_impact: "full compromise of the host running the service",
        asset: "Application host",
        boundary: EXTERNAL_BOUNDARY,
        likelihood: L_DIRECT,
        impact: I_SEVERE,
        mitigation: "Avoid shell invocation; pass arguments as an array to a fixed executable and validate them against an allow-list",
    },
    RuleProfile {
        detector: "code_eval",
        title: "Dynamic code evaluation",
        category: StrideCategory::ElevationOfPrivilege,
        threat_source: "remote attacker",
        prerequisites: "who influences the evaluated expression",
        threat_action: "run injected code inside the application runtime",
        threat_impact: "arbitrary code execution with the service's privileges",
        asset: "Application runtime",
        boundary: EXTERNAL_BOUNDARY,
        likelihood: L_REMOTE,
        impact: I_SIGNIFICANT,
        mitigation: "Replace dynamic evaluation with explicit parsing or a dispatch table",
    },
    RuleProfile {
        detector: "xss",
        title: "Cross-site scripting",
        category: StrideCategory::Tampering,
        threat_source: "remote attacker",
        prerequisites: "who can store or reflect content rendered to other users",
        threat_action: "inject script into pages viewed by other users",
        threat_impact: "session theft and actions performed as the victim",
        asset: "User sessions",
        boundary: EXTERNAL_BOUNDARY,
        likelihood: L_REMOTE,
        impact: I_SIGNIFICANT,
        mitigation: "Render untrusted content through context-aware escaping and set a restrictive Content-Security-Policy",
    },
    RuleProfile {
        detector: "weak_crypto",
        title: "Weak cryptographic primitive",
        category: StrideCategory::InformationDisclosure,
        threat_source: "attacker",
        prerequisites: "with access to hashed or encrypted data",
        threat_action: "break the weak algorithm offline",
        threat_impact: "recovery of protected values such as passwords",
        asset: "Protected data",
        boundary: INTERNAL_BOUNDARY,
        likelihood: L_MODERATE,
        impact: I_MODERATE,
        mitigation: "Use a modern algorithm (SHA-256 or better for integrity, Argon2 or bcrypt for passwords, AES-GCM for encryption)",
    },
    RuleProfile {
        detector: "insecure_deserialization",
        title: "Insecure deserialization",
        category: StrideCategory::ElevationOfPrivilege,
        threat_source: "remote attacker",
        prerequisites: "who can supply serialized data",
        threat_action: "craft a payload that executes code during deserialization",
        threat_impact: "arbitrary code execution in the service",
        asset: "Application runtime",
        boundary: EXTERNAL_BOUNDARY,
        likelihood: L_REMOTE,
        impact: I_SIGNIFICANT,
        mitigation: "Deserialize untrusted input only with data-only formats such as JSON and a safe loader",
    },
    RuleProfile {
        detector: "tls_verification_disabled",
        title: "Disabled TLS verification",
        category: StrideCategory::Spoofing,
        threat_source: "network attacker",
        prerequisites: "positioned between the service and its upstream",
        threat_action: "impersonate the upstream server with an untrusted certificate",
        threat_impact: "interception and modification of outbound traffic",
        asset: "Outbound connections",
        boundary: EXTERNAL_BOUNDARY,
        likelihood: L_REMOTE,
        impact: I_SIGNIFICANT,
        mitigation: "Keep certificate verification enabled and pin a private CA bundle where one is needed",
    },
    RuleProfile {
        detector: "permissive_cors",
        title: "Permissive CORS policy",
        category: StrideCategory::InformationDisclosure,
        threat_source: "malicious website",
        prerequisites: "visited by an authenticated user",
        threat_action: "issue cross-origin requests and read the responses",
        threat_impact: "disclosure of data the user can access",
        asset: "API responses",
        boundary: EXTERNAL_BOUNDARY,
        likelihood: L_MODERATE,
        impact: I_MODERATE,
        mitigation: "Restrict allowed origins to an explicit list of trusted hosts",
    },
    RuleProfile {
        detector: "path_traversal",
        title: "Path traversal",
        category: StrideCategory::InformationDisclosure,
        threat_source: "remote attacker",
        prerequisites: "who controls part of a file path",
        threat_action: "read files outside the intended directory",
        threat_impact: "disclosure of configuration, source or credentials on disk",
        asset: "Server filesystem",
        boundary: EXTERNAL_BOUNDARY,
        likelihood: L_REMOTE,
        impact: I_SIGNIFICANT,
        mitigation: "Canonicalize requested paths and reject any that resolve outside the allowed root",
    },
    RuleProfile {
        detector: "jwt_none_algorithm",
        title: "Unsigned JWT accepted",
        category: StrideCategory::Spoofing,
        threat_source: "remote attacker",
        prerequisites: "who can present a token",
        threat_action: "forge a token signed with the none algorithm",
        threat_impact: "authentication as any user",
        asset: "User accounts",
        boundary: EXTERNAL_BOUNDARY,
        likelihood: L_REMOTE,
        impact: I_SIGNIFICANT,
        mitigation: "Pin the accepted signing algorithms when verifying tokens",
    },
    RuleProfile {
        detector: "debug_enabled",
        title: "Debug mode enabled",
        category: StrideCategory::InformationDisclosure,
        threat_source: "remote attacker",
        prerequisites: "who can trigger an error",
        threat_action: "read stack traces and internal state from debug output",
        threat_impact: "disclosure of implementation details that aid further attacks",
        asset: "Application internals",
        boundary: EXTERNAL_BOUNDARY,
        likelihood: L_LOW,
        impact: I_MINOR,
        mitigation: "Disable debug mode in production builds and configuration",
    },
];

/// Profile for findings from detectors not in the table.
const GENERIC_RULE: RuleProfile = RuleProfile {
    detector: "",
    title: "Security weakness",
    category: StrideCategory::Tampering,
    threat_source: "attacker",
    prerequisites: "who can reach the affected code path",
    threat_action: "exploit the flagged weakness",
    threat_impact: "compromise of the affected component",
    asset: "Application",
    boundary: INTERNAL_BOUNDARY,
    likelihood: L_MODERATE,
    impact: I_MODERATE,
    mitigation: "Review the flagged code and apply the appropriate secure coding fix",
};

pub fn rule_for(detector: &str) -> &'static RuleProfile {
    FINDING_RULES
        .iter()
        .find(|r| r.detector == detector)
        .unwrap_or(&GENERIC_RULE)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RuleSynthesizer;

impl RuleSynthesizer {
    pub fn new() -> Self {
        Self
    }

    /// All drafts for an analysis; synchronous and deterministic.
    pub fn drafts(&self, analysis: &AnalysisResult) -> Vec<ThreatDraft> {
        let mut drafts: Vec<ThreatDraft> = analysis
            .security_findings
            .iter()
            .map(|f| finding_threat(analysis, f))
            .collect();
        drafts.extend(architecture_threats(analysis));
        drafts
    }
}

#[async_trait]
impl Synthesizer for RuleSynthesizer {
    fn path(&self) -> SynthesisPath {
        SynthesisPath::Rules
    }

    async fn synthesize(&self, input: SynthesisInput<'_>) -> anyhow::Result<Vec<ThreatDraft>> {
        Ok(self.drafts(input.analysis))
    }
}

/// Name of the component that owns a file, if any.
fn owning_component<'a>(analysis: &'a AnalysisResult, file: &str) -> Option<&'a str> {
    analysis
        .components
        .iter()
        .find(|c| c.files.iter().any(|f| f == file))
        .map(|c| c.name.as_str())
}

fn finding_threat(analysis: &AnalysisResult, finding: &Finding) -> ThreatDraft {
    let rule = rule_for(&finding.detector);

    let mut impacted_assets = Vec::new();
    if let Some(component) = owning_component(analysis, &finding.file) {
        impacted_assets.push(component.to_string());
    }
    impacted_assets.push(rule.asset.to_string());

    let boundary = if rule.boundary == INFRA_BOUNDARY
        && !analysis.trust_boundaries.iter().any(|b| b.name == INFRA_BOUNDARY)
    {
        INTERNAL_BOUNDARY
    } else {
        rule.boundary
    };

    let mut mitigations = Vec::new();
    if finding.detector == HARDCODED_SECRET {
        if let Some(fixed) = env_lookup_fix(&finding.snippet, &finding.file) {
            mitigations.push(Mitigation::Code {
                file: finding.file.clone(),
                original: finding.snippet.clone(),
                fixed,
            });
        }
    }
    mitigations.push(Mitigation::prose(rule.mitigation));

    ThreatDraft {
        title: format!("{} in {}", rule.title, finding.file),
        stride_category: rule.category,
        threat_source: rule.threat_source.to_string(),
        prerequisites: rule.prerequisites.to_string(),
        threat_action: rule.threat_action.to_string(),
        threat_impact: rule.threat_impact.to_string(),
        impacted_assets,
        trust_boundary: boundary.to_string(),
        assumptions: vec![format!(
            "Flagged by the {} detector at {}:{}; not confirmed by manual review",
            finding.detector, finding.file, finding.line
        )],
        mitigations,
        cve: None,
        likelihood: LikelihoodFactors::new(rule.likelihood),
        impact: ImpactFactors::new(rule.impact),
        suggested_severity: Some(finding.severity.to_string()),
    }
}

/// Component reached first by end users.
fn entry_component(analysis: &AnalysisResult) -> Option<&str> {
    analysis
        .valid_flows()
        .find(|f| f.from == END_USER)
        .map(|f| f.to.as_str())
        .or_else(|| {
            analysis
                .first_of_type(ComponentType::Frontend)
                .map(|c| c.name.as_str())
        })
        .or_else(|| {
            analysis
                .components
                .iter()
                .find(|c| c.component_type != ComponentType::External)
                .map(|c| c.name.as_str())
        })
}

#[allow(clippy::too_many_arguments)]
fn architecture_draft(
    title: String,
    category: StrideCategory,
    threat_source: &str,
    prerequisites: &str,
    threat_action: &str,
    threat_impact: &str,
    impacted_assets: Vec<String>,
    trust_boundary: &str,
    likelihood: [u8; 8],
    impact: [u8; 4],
) -> ThreatDraft {
    ThreatDraft {
        title,
        stride_category: category,
        threat_source: threat_source.to_string(),
        prerequisites: prerequisites.to_string(),
        threat_action: threat_action.to_string(),
        threat_impact: threat_impact.to_string(),
        impacted_assets,
        trust_boundary: trust_boundary.to_string(),
        assumptions: vec!["Inferred from repository structure heuristics".to_string()],
        mitigations: category
            .typical_mitigations()
            .iter()
            .map(|m| Mitigation::prose(*m))
            .collect(),
        cve: None,
        likelihood: LikelihoodFactors::new(likelihood),
        impact: ImpactFactors::new(impact),
        suggested_severity: None,
    }
}

/// Threats implied by the component graph itself.
pub fn architecture_threats(analysis: &AnalysisResult) -> Vec<ThreatDraft> {
    let mut drafts = Vec::new();
    let entry = entry_component(analysis);
    let has_auth = analysis.component(Category::Auth.component_name()).is_some();

    if let Some(entry) = entry {
        if !has_auth {
            drafts.push(architecture_draft(
                format!("Unauthenticated access to {}", entry),
                StrideCategory::Spoofing,
                "remote attacker",
                "with network access to the public entry point",
                "call the application without presenting verified credentials",
                "actions performed under a forged or missing identity",
                vec![entry.to_string()],
                EXTERNAL_BOUNDARY,
                L_REMOTE,
                I_SIGNIFICANT,
            ));
        }
        if !analysis.has_type(ComponentType::Gateway) {
            drafts.push(architecture_draft(
                format!("Request flooding of {}", entry),
                StrideCategory::DenialOfService,
                "remote attacker",
                "with network access and no upstream rate limiting",
                "flood the public entry point with requests",
                "degraded or unavailable service for legitimate users",
                vec![entry.to_string()],
                EXTERNAL_BOUNDARY,
                L_MODERATE,
                [2, 3, 8, 3],
            ));
        }
    }

    if let Some(db) = analysis.first_of_type(ComponentType::Database) {
        drafts.push(architecture_draft(
            format!("Sensitive data exposure from {}", db.name),
            StrideCategory::InformationDisclosure,
            "attacker",
            "who obtains database credentials or a foothold in the internal network",
            "read stored records directly from the data store",
            "disclosure of persisted user and business data",
            vec![db.name.clone()],
            INTERNAL_BOUNDARY,
            L_MODERATE,
            [8, 5, 3, 5],
        ));
    }

    if let Some(queue) = analysis.first_of_type(ComponentType::Queue) {
        drafts.push(architecture_draft(
            format!("Message tampering on {}", queue.name),
            StrideCategory::Tampering,
            "internal attacker",
            "with access to the message broker",
            "inject or alter messages consumed by background workers",
            "unauthorized state changes triggered by forged messages",
            vec![queue.name.clone()],
            INTERNAL_BOUNDARY,
            L_MODERATE,
            I_MODERATE,
        ));
    }

    if analysis.security_findings.is_empty() {
        let target = entry.unwrap_or("the application");
        drafts.push(architecture_draft(
            format!("Missing audit trail for {}", target),
            StrideCategory::Repudiation,
            "authenticated user",
            "performing security-relevant actions",
            "deny having performed an action",
            "inability to attribute or investigate incidents",
            vec![target.to_string()],
            INTERNAL_BOUNDARY,
            L_LOW,
            [2, 3, 2, 7],
        ));
    }

    drafts
}

fn secret_assignment() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(["']?)([A-Za-z_][\w-]*)(["']?\s*[:=]\s*)["'][^"'\s]{16,}["']"#).ok()
    })
    .as_ref()
}

/// `apiSecret` / `api-secret` / `API_SECRET` all become `API_SECRET`.
pub fn env_var_name(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower = false;
    for ch in key.chars() {
        if ch == '-' || ch == '_' || ch == '.' {
            out.push('_');
            prev_lower = false;
            continue;
        }
        if ch.is_ascii_uppercase() && prev_lower {
            out.push('_');
        }
        prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        out.push(ch.to_ascii_uppercase());
    }
    out
}

fn env_lookup(file: &str, name: &str) -> String {
    let ext = file.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("js" | "jsx" | "mjs" | "cjs" | "ts" | "tsx") => format!("process.env.{}", name),
        Some("py") => format!("os.environ[\"{}\"]", name),
        Some("rb") => format!("ENV[\"{}\"]", name),
        Some("go") => format!("os.Getenv(\"{}\")", name),
        Some("java" | "kt") => format!("System.getenv(\"{}\")", name),
        Some("php") => format!("getenv('{}')", name),
        Some("rs") => format!("std::env::var(\"{}\")?", name),
        Some("cs") => format!("Environment.GetEnvironmentVariable(\"{}\")", name),
        _ => format!("\"${{{}}}\"", name),
    }
}

/// Rewrite a secret assignment so the literal is read from the environment.
pub fn env_lookup_fix(snippet: &str, file: &str) -> Option<String> {
    let re = secret_assignment()?;
    let caps = re.captures(snippet)?;
    let whole = caps.get(0)?;
    let name = env_var_name(caps.get(2)?.as_str());
    let replacement = format!(
        "{}{}{}{}",
        caps.get(1).map_or("", |m| m.as_str()),
        caps.get(2)?.as_str(),
        caps.get(3)?.as_str(),
        env_lookup(file, &name)
    );
    Some(format!(
        "{}{}{}",
        &snippet[..whole.start()],
        replacement,
        &snippet[whole.end()..]
    ))
}
