//! Prompt construction for the model-backed synthesizer.

use std::fmt::Write;

use crate::api::types::Message;
use crate::config::Limits;
use crate::model::{AnalysisResult, Framework};

pub const SYSTEM_PROMPT: &str = "You are a senior application security engineer preparing a threat model. Use the provided architecture summary and static-analysis findings to enumerate realistic, specific threats. Respond only with a JSON array that follows the requested schema.";

pub const USER_PROMPT_TEMPLATE: &str = r#"# Methodology
{framework_guidance}

# Languages and frameworks
{stack}

# Components
{components}

# Data flows
{flows}

# Trust boundaries
{boundaries}

# Entry points
{entry_points}

# Static-analysis findings
{findings}
{document}
# Output format
Return a JSON array. Each element is an object with these keys:
- "title": short threat name
- "strideCategory": one of "Spoofing", "Tampering", "Repudiation", "Information Disclosure", "Denial of Service", "Elevation of Privilege"
- "threatSource": who carries out the attack, e.g. "unauthenticated remote attacker"
- "prerequisites": conditions the attacker needs, e.g. "with network access to the API"
- "threatAction": what the attacker does
- "threatImpact": the direct consequence
- "impactedAssets": array of component or data names
- "trustBoundary": the boundary crossed
- "assumptions": array of strings
- "mitigations": array; each item is a string, or an object {"file", "original", "fixed"} for a concrete code fix
- "cve": related CVE identifier, or null
- "likelihood": object with integer 0-9 values for skillLevel, motive, opportunity, size, easeOfDiscovery, easeOfExploit, awareness, intrusionDetection
- "impact": object with integer 0-9 values for lossOfConfidentiality, lossOfIntegrity, lossOfAvailability, lossOfAccountability
Do not include markdown fences or commentary outside the array.
"#;

const NONE: &str = "- none detected";

pub fn framework_guidance(framework: Framework) -> &'static str {
    match framework {
        Framework::Stride => "Apply STRIDE: walk every component and data flow, and for each trust boundary crossing consider all six categories.",
        Framework::Pasta => "Apply PASTA: start from business objectives, decompose the application, analyze attack scenarios against each entry point, and express every resulting threat under its closest STRIDE category.",
        Framework::Owasp => "Apply the OWASP Top 10 lens: map findings and architecture to injection, broken authentication, sensitive data exposure, misconfiguration and access-control weaknesses, then classify each threat under its closest STRIDE category.",
    }
}

fn bullet_list<I: IntoIterator<Item = String>>(items: I) -> String {
    let mut out = String::new();
    for item in items {
        let _ = writeln!(out, "- {}", item);
    }
    if out.is_empty() {
        NONE.to_string()
    } else {
        out.trim_end().to_string()
    }
}

/// User prompt built from the extracted architecture.
pub fn build_user_prompt(
    analysis: &AnalysisResult,
    framework: Framework,
    document: Option<&str>,
    limits: &Limits,
) -> String {
    let mut stack: Vec<String> = analysis.languages.clone();
    stack.extend(analysis.frameworks.iter().cloned());

    let components = bullet_list(analysis.components.iter().map(|c| {
        let mut line = format!("{} ({}): {}", c.name, c.component_type, c.description);
        if !c.files.is_empty() {
            let shown: Vec<&str> = c.files.iter().take(5).map(String::as_str).collect();
            line.push_str(&format!(" [files: {}]", shown.join(", ")));
        }
        line
    }));
    let flows = bullet_list(
        analysis
            .valid_flows()
            .map(|f| format!("{} -> {} via {} ({})", f.from, f.to, f.label(), f.data_type)),
    );
    let boundaries = bullet_list(
        analysis
            .trust_boundaries
            .iter()
            .map(|b| format!("{}: {}", b.name, b.components.join(", "))),
    );
    let entry_points = bullet_list(analysis.entry_points.iter().cloned());
    let findings = bullet_list(
        analysis
            .ranked_findings()
            .into_iter()
            .take(limits.prompt_findings_cap)
            .map(|f| {
                format!(
                    "[{}] {} at {}:{}: {} `{}`",
                    f.severity, f.detector, f.file, f.line, f.description, f.snippet
                )
            }),
    );
    let document = match document {
        Some(text) => format!("\n# Design document\n{}\n", text),
        None => String::new(),
    };

    let prompt = USER_PROMPT_TEMPLATE
        .replace("{framework_guidance}", framework_guidance(framework))
        .replace("{stack}", &bullet_list(stack))
        .replace("{components}", &components)
        .replace("{flows}", &flows)
        .replace("{boundaries}", &boundaries)
        .replace("{entry_points}", &entry_points)
        .replace("{findings}", &findings)
        .replace("{document}", &document);

    truncate_prompt(prompt, limits.max_prompt_chars)
}

/// Cut an over-budget prompt on a char boundary, keeping the output-format
/// section at the end intact.
fn truncate_prompt(prompt: String, max_chars: usize) -> String {
    if prompt.chars().count() <= max_chars {
        return prompt;
    }
    let tail_start = prompt.rfind("# Output format").unwrap_or(prompt.len());
    let (head, tail) = prompt.split_at(tail_start);
    let marker = "\n[... truncated ...]\n\n";
    let budget = max_chars
        .saturating_sub(tail.chars().count())
        .saturating_sub(marker.chars().count());
    let cut = head
        .char_indices()
        .nth(budget)
        .map(|(i, _)| i)
        .unwrap_or(head.len());
    format!("{}{}{}", &head[..cut], marker, tail)
}

pub fn build_messages(
    analysis: &AnalysisResult,
    framework: Framework,
    document: Option<&str>,
    limits: &Limits,
) -> Vec<Message> {
    vec![
        Message::system(SYSTEM_PROMPT),
        Message::user(build_user_prompt(analysis, framework, document, limits)),
    ]
}
