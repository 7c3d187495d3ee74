//! Model-backed synthesizer.

use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::{prompt, SynthesisInput, Synthesizer};
use crate::api::ChatClient;
use crate::config::Limits;
use crate::errors::ApiError;
use crate::model::{SynthesisPath, ThreatDraft};
use crate::response_parser::parse_threats;

pub struct ModelSynthesizer {
    client: Arc<dyn ChatClient>,
    limits: Limits,
}

impl ModelSynthesizer {
    pub fn new(client: Arc<dyn ChatClient>, limits: Limits) -> Self {
        Self { client, limits }
    }
}

#[async_trait]
impl Synthesizer for ModelSynthesizer {
    fn path(&self) -> SynthesisPath {
        SynthesisPath::Model
    }

    async fn synthesize(&self, input: SynthesisInput<'_>) -> anyhow::Result<Vec<ThreatDraft>> {
        let messages =
            prompt::build_messages(input.analysis, input.framework, input.document, &self.limits);

        let response = self.client.chat(messages).await?;
        if let Some(usage) = &response.usage {
            info!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Model call finished"
            );
        }
        if response.was_truncated() {
            warn!("Model output hit the token limit; recovering complete threats only");
        }

        let text = response.content().ok_or(ApiError::EmptyResponse)?;
        let outcome = parse_threats(text).context("Model response could not be parsed")?;

        if outcome.recovered {
            warn!(
                "Recovered {} threats from a truncated response",
                outcome.drafts.len()
            );
        }
        if outcome.dropped > 0 {
            warn!("Dropped {} malformed threat elements", outcome.dropped);
        }
        Ok(outcome.drafts)
    }
}
