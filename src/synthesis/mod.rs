//! Threat synthesis
//!
//! One capability, two implementations: [`ModelSynthesizer`] asks a
//! chat-completions model for threats, [`RuleSynthesizer`] derives them
//! deterministically from findings and the component graph. Both emit
//! [`ThreatDraft`]s; [`finalize`] rates, identifies and orders them the same
//! way whichever path ran.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::config::{Config, SynthesisMode};
use crate::model::{AnalysisResult, Framework, SynthesisPath, ThreatDraft, ThreatRecord};

pub mod model_backed;
pub mod prompt;
pub mod rules;

pub use model_backed::ModelSynthesizer;
pub use rules::RuleSynthesizer;

/// Everything a synthesizer reads.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    pub analysis: &'a AnalysisResult,
    pub framework: Framework,
    /// Design document text, for document runs
    pub document: Option<&'a str>,
}

#[async_trait]
pub trait Synthesizer: Send + Sync {
    fn path(&self) -> SynthesisPath;

    async fn synthesize(&self, input: SynthesisInput<'_>) -> anyhow::Result<Vec<ThreatDraft>>;
}

/// Pick the synthesizer for this configuration.
pub fn select(config: &Config) -> anyhow::Result<Box<dyn Synthesizer>> {
    if config.use_model() {
        if !config.has_credentials() && config.synthesis.mode == SynthesisMode::Model {
            warn!("Model synthesis forced without an API key; the endpoint must accept anonymous requests");
        }
        let client = ApiClient::new(config)?;
        info!("Using model-backed synthesis ({})", config.model);
        Ok(Box::new(ModelSynthesizer::new(
            Arc::new(client),
            config.limits.clone(),
        )))
    } else {
        info!("No model credentials configured; using rule-backed synthesis");
        Ok(Box::new(RuleSynthesizer::new()))
    }
}

/// `TM-` plus the first 10 hex digits of sha256(title | category | boundary).
pub fn threat_id(draft: &ThreatDraft) -> String {
    let mut hasher = Sha256::new();
    hasher.update(draft.title.as_bytes());
    hasher.update(b"|");
    hasher.update(draft.stride_category.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(draft.trust_boundary.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("TM-{}", &digest[..10])
}

/// Rate every draft, assign stable ids, and order by severity.
///
/// Ids are assigned in emission order, so a colliding draft gets `-2`, `-3`
/// suffixes before sorting.
pub fn finalize(drafts: Vec<ThreatDraft>) -> Vec<ThreatRecord> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut records: Vec<ThreatRecord> = drafts
        .into_iter()
        .map(|draft| {
            let base = threat_id(&draft);
            let count = seen.entry(base.clone()).or_insert(0);
            *count += 1;
            let id = if *count == 1 {
                base
            } else {
                format!("{}-{}", base, count)
            };
            ThreatRecord::from_draft(id, draft)
        })
        .collect();

    records.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| {
                b.risk
                    .overall_risk_score
                    .total_cmp(&a.risk.overall_risk_score)
            })
            .then_with(|| a.title.cmp(&b.title))
    });
    records
}
