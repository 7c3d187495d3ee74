//! Unit tests for threat synthesis
//!
//! Tests cover:
//! - Rule-backed drafts for findings and architecture gaps
//! - Model-backed synthesis through a canned [`ChatClient`]
//! - Finalization: ids, ordering, derived severity

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use threatscope::api::types::{ChatResponse, Choice, Message};
use threatscope::api::ChatClient;
use threatscope::config::Limits;
use threatscope::errors::{get_exit_code, ApiError, EXIT_API_ERROR, EXIT_RECOVERY_ERROR};
use threatscope::extractor::extract_document;
use threatscope::model::{
    AnalysisResult, Finding, Framework, Mitigation, Severity, StrideCategory, SynthesisPath,
};
use threatscope::synthesis::rules::{env_lookup_fix, rule_for};
use threatscope::synthesis::{
    finalize, threat_id, ModelSynthesizer, RuleSynthesizer, SynthesisInput, Synthesizer,
};

fn finding(file: &str, detector: &str, snippet: &str, severity: Severity) -> Finding {
    Finding {
        file: file.to_string(),
        line: 1,
        detector: detector.to_string(),
        snippet: snippet.to_string(),
        severity,
        description: String::new(),
    }
}

fn input(analysis: &AnalysisResult) -> SynthesisInput<'_> {
    SynthesisInput {
        analysis,
        framework: Framework::Stride,
        document: None,
    }
}

/// Replies with one fixed text and records the prompts it was sent.
struct CannedClient {
    text: String,
    finish_reason: Option<String>,
    prompts: Mutex<Vec<Vec<Message>>>,
}

impl CannedClient {
    fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            finish_reason: Some("stop".to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChatClient for CannedClient {
    async fn chat(&self, messages: Vec<Message>) -> Result<ChatResponse, ApiError> {
        self.prompts.lock().unwrap().push(messages);
        Ok(ChatResponse {
            id: "chatcmpl-test".to_string(),
            model: "test".to_string(),
            choices: vec![Choice {
                index: 0,
                message: Message::assistant(self.text.clone()),
                finish_reason: self.finish_reason.clone(),
            }],
            usage: None,
        })
    }
}

struct FailingClient;

#[async_trait]
impl ChatClient for FailingClient {
    async fn chat(&self, _messages: Vec<Message>) -> Result<ChatResponse, ApiError> {
        Err(ApiError::Authentication("invalid api key".to_string()))
    }
}

// ============================================================================
// Rule-backed synthesis
// ============================================================================

mod rules_tests {
    use super::*;

    #[test]
    fn test_one_threat_per_finding_plus_architecture() {
        let mut analysis = extract_document("design.md", "A REST API backed by Postgres.", Vec::new());
        analysis.security_findings = vec![
            finding("design.md", "sql_injection", "query + id", Severity::High),
            finding("design.md", "debug_enabled", "DEBUG = True", Severity::Low),
        ];

        let drafts = RuleSynthesizer::new().drafts(&analysis);
        let titles: Vec<&str> = drafts.iter().map(|d| d.title.as_str()).collect();
        assert!(titles.iter().any(|t| t.ends_with("in design.md") && t.contains("SQL")));
        assert!(titles.contains(&"Unauthenticated access to API Server"));
        assert!(titles.contains(&"Request flooding of API Server"));
        assert!(titles.contains(&"Sensitive data exposure from Database"));
        assert!(
            !titles.iter().any(|t| t.starts_with("Missing audit trail")),
            "repudiation threat only appears without findings"
        );
    }

    #[test]
    fn test_rule_severity_matches_detector() {
        let mut analysis = AnalysisResult::default();
        for (detector, severity) in [
            ("hardcoded_secret", Severity::Critical),
            ("xss", Severity::High),
            ("weak_crypto", Severity::Medium),
            ("debug_enabled", Severity::Low),
        ] {
            analysis
                .security_findings
                .push(finding("app.js", detector, "x", severity));
        }
        let records = finalize(RuleSynthesizer::new().drafts(&analysis));
        for f in &analysis.security_findings {
            let title = format!("{} in app.js", rule_for(&f.detector).title);
            let record = records.iter().find(|r| r.title == title).unwrap();
            assert_eq!(record.severity, f.severity, "{}", title);
        }
    }

    #[test]
    fn test_secret_gets_code_mitigation() {
        let mut analysis = AnalysisResult::default();
        analysis.security_findings.push(finding(
            "config/settings.json",
            "hardcoded_secret",
            "\"apiSecret\": \"abcdefghijklmnopqrstuvwx\",",
            Severity::Critical,
        ));
        let drafts = RuleSynthesizer::new().drafts(&analysis);
        match &drafts[0].mitigations[0] {
            Mitigation::Code { file, fixed, .. } => {
                assert_eq!(file, "config/settings.json");
                assert_eq!(fixed, "\"apiSecret\": \"${API_SECRET}\",");
            }
            other => panic!("expected code mitigation, got {:?}", other),
        }
    }

    #[test]
    fn test_env_lookup_per_language() {
        assert_eq!(
            env_lookup_fix("const apiKey = \"sk_live_0123456789abcdef\";", "src/a.ts").unwrap(),
            "const apiKey = process.env.API_KEY;"
        );
        assert_eq!(
            env_lookup_fix("db_password = 'correct-horse-battery'", "app.py").unwrap(),
            "db_password = os.environ[\"DB_PASSWORD\"]"
        );
        assert!(env_lookup_fix("nothing secret here", "a.js").is_none());
    }

    #[tokio::test]
    async fn test_trait_object_reports_rules_path() {
        let synth: Box<dyn Synthesizer> = Box::new(RuleSynthesizer::new());
        let analysis = AnalysisResult::default();
        let drafts = synth.synthesize(input(&analysis)).await.unwrap();
        assert_eq!(synth.path(), SynthesisPath::Rules);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].title, "Missing audit trail for the application");
    }
}

// ============================================================================
// Model-backed synthesis
// ============================================================================

mod model_tests {
    use super::*;

    const TWO_THREATS: &str = r#"```json
[
  {"title": "Token replay", "strideCategory": "Spoofing", "trustBoundary": "External / Internet",
   "likelihood": {"skillLevel": 9, "motive": 9, "opportunity": 9, "size": 9,
                  "easeOfDiscovery": 9, "easeOfExploit": 9, "awareness": 9, "intrusionDetection": 9},
   "impact": {"lossOfConfidentiality": 9, "lossOfIntegrity": 9, "lossOfAvailability": 9, "lossOfAccountability": 9},
   "severity": "Low"},
  {"title": "Log gaps", "stride_category": "repudiation"}
]
```"#;

    #[tokio::test]
    async fn test_parses_and_sends_prompt() {
        let client = Arc::new(CannedClient::new(TWO_THREATS));
        let synth = ModelSynthesizer::new(client.clone(), Limits::default());
        let analysis = extract_document("design.md", "REST API with Postgres", Vec::new());

        let drafts = synth.synthesize(input(&analysis)).await.unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[1].stride_category, StrideCategory::Repudiation);

        let prompts = client.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0][0].role, "system");
        assert!(prompts[0][1].content.contains("API Server"));
    }

    #[tokio::test]
    async fn test_model_severity_hint_is_ignored() {
        let synth = ModelSynthesizer::new(Arc::new(CannedClient::new(TWO_THREATS)), Limits::default());
        let analysis = AnalysisResult::default();
        let records = finalize(synth.synthesize(input(&analysis)).await.unwrap());
        assert_eq!(records[0].title, "Token replay");
        assert_eq!(records[0].severity, Severity::Critical);
        assert_eq!(records[1].severity, Severity::Medium);
    }

    #[tokio::test]
    async fn test_truncated_output_is_recovered() {
        let complete = r#"{"title": "A", "strideCategory": "Tampering"}"#;
        let text = format!("[{}, {}, {{\"title\": \"cut", complete, complete);
        let mut client = CannedClient::new(&text);
        client.finish_reason = Some("length".to_string());
        let synth = ModelSynthesizer::new(Arc::new(client), Limits::default());
        let analysis = AnalysisResult::default();
        let drafts = synth.synthesize(input(&analysis)).await.unwrap();
        assert_eq!(drafts.len(), 2);
    }

    #[tokio::test]
    async fn test_unrecoverable_output_maps_to_recovery_exit() {
        let synth = ModelSynthesizer::new(
            Arc::new(CannedClient::new("I cannot help with that.")),
            Limits::default(),
        );
        let analysis = AnalysisResult::default();
        let err = synth.synthesize(input(&analysis)).await.unwrap_err();
        assert_eq!(get_exit_code(&err), EXIT_RECOVERY_ERROR);
    }

    #[tokio::test]
    async fn test_api_failure_maps_to_api_exit() {
        let synth = ModelSynthesizer::new(Arc::new(FailingClient), Limits::default());
        let analysis = AnalysisResult::default();
        let err = synth.synthesize(input(&analysis)).await.unwrap_err();
        assert_eq!(get_exit_code(&err), EXIT_API_ERROR);
    }
}

// ============================================================================
// Finalization
// ============================================================================

mod finalize_tests {
    use super::*;
    use threatscope::response_parser::normalize_element;

    #[test]
    fn test_ids_are_stable_and_deduplicated() {
        let draft = normalize_element(0, &serde_json::json!({"title": "Same"})).unwrap();
        let records = finalize(vec![draft.clone(), draft.clone(), draft.clone()]);
        let base = threat_id(&draft);
        let mut ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        ids.sort();
        assert_eq!(
            ids,
            vec![base.clone(), format!("{}-2", base), format!("{}-3", base)]
        );
        assert!(base.starts_with("TM-"));
        assert_eq!(base.len(), 13);
    }

    #[test]
    fn test_sorted_by_severity_then_score() {
        let low = normalize_element(
            0,
            &serde_json::json!({"title": "low", "likelihood": {"skillLevel": 0, "motive": 0, "opportunity": 0, "size": 0,
                "easeOfDiscovery": 0, "easeOfExploit": 0, "awareness": 0, "intrusionDetection": 0}}),
        )
        .unwrap();
        let medium = normalize_element(1, &serde_json::json!({"title": "medium"})).unwrap();
        let records = finalize(vec![low, medium]);
        assert_eq!(records[0].title, "medium");
        assert_eq!(records[1].title, "low");
        assert!(records
            .iter()
            .all(|r| r.severity == r.derived_severity()));
    }
}
