// Conversation analyzer: runs extraction, synthesis, invocation and parsing
// for one conversation and turns any fault into the fallback suggestion.
//
// Stage flow:
//   Idle -> Extracting -> Synthesizing -> Invoking -> Parsing -> Succeeded
// with a direct edge from every stage to FallenBack.

use std::sync::Arc;

use parley_core::config::EngineSettings;
use parley_core::model::{
    ActionType, Conversation, ConversationId, SuggestionResult, SuggestionSource,
};
use parley_core::store::ConversationStore;
use parley_llm::provider::ReasoningProvider;
use tracing::{debug, info, warn};

use crate::cases::CaseExtractor;
use crate::error::{EngineFault, Stage};
use crate::parser;
use crate::prompt;

pub const FALLBACK_ANALYSIS: &str = "Conversation en cours";
pub const FALLBACK_SUGGESTION: &str =
    "Merci pour votre message ! Je reviens vers vous très rapidement avec une réponse détaillée.";
pub const FALLBACK_CONFIDENCE: u8 = 50;

/// The suggestion returned whenever the pipeline cannot finish.
pub fn fallback_result() -> SuggestionResult {
    SuggestionResult {
        analysis: FALLBACK_ANALYSIS.to_string(),
        suggestion: FALLBACK_SUGGESTION.to_string(),
        action_type: ActionType::Respond,
        confidence: FALLBACK_CONFIDENCE,
        source: SuggestionSource::Fallback,
    }
}

/// Collapse a pipeline outcome into a result; every fault yields
/// [`fallback_result`].
pub fn resolve(
    conversation_id: ConversationId,
    outcome: Result<SuggestionResult, EngineFault>,
) -> SuggestionResult {
    match outcome {
        Ok(result) => {
            info!(
                conversation_id,
                stage = ?Stage::Succeeded,
                source = ?result.source,
                confidence = result.confidence,
                action = result.action_type.as_str(),
                "suggestion ready"
            );
            result
        }
        Err(fault) => {
            warn!(
                conversation_id,
                stage = ?Stage::FallenBack,
                failed_at = ?fault.stage(),
                error = %fault,
                "analysis failed; using fallback suggestion"
            );
            fallback_result()
        }
    }
}

/// Produces reply suggestions for conversations.
///
/// Holds no per-call state: concurrent or repeated calls are independent.
pub struct ConversationAnalyzer {
    store: Arc<dyn ConversationStore>,
    provider: Arc<dyn ReasoningProvider>,
    extractor: CaseExtractor,
}

impl ConversationAnalyzer {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        provider: Arc<dyn ReasoningProvider>,
        settings: &EngineSettings,
    ) -> Self {
        Self {
            store,
            provider,
            extractor: CaseExtractor::new(settings),
        }
    }

    /// Suggest a reply for `conversation_id`. Never fails: faults produce the
    /// fallback suggestion.
    pub async fn analyze_conversation(&self, conversation_id: ConversationId) -> SuggestionResult {
        debug!(conversation_id, stage = ?Stage::Idle, "analysis requested");
        resolve(conversation_id, self.try_analyze(conversation_id).await)
    }

    /// Like [`Self::analyze_conversation`] for a conversation the caller has
    /// already loaded.
    pub async fn analyze_snapshot(&self, conversation: &Conversation) -> SuggestionResult {
        resolve(conversation.id, self.try_analyze_snapshot(conversation).await)
    }

    /// Run the pipeline, reporting the fault instead of falling back.
    pub async fn try_analyze(
        &self,
        conversation_id: ConversationId,
    ) -> Result<SuggestionResult, EngineFault> {
        debug!(conversation_id, stage = ?Stage::Extracting, "loading conversation");
        let conversation = self
            .store
            .fetch_conversation(conversation_id)
            .await
            .map_err(|e| EngineFault::ConversationLookup {
                conversation_id,
                message: format!("{e:#}"),
            })?
            .ok_or(EngineFault::ConversationNotFound(conversation_id))?;

        self.try_analyze_snapshot(&conversation).await
    }

    pub async fn try_analyze_snapshot(
        &self,
        conversation: &Conversation,
    ) -> Result<SuggestionResult, EngineFault> {
        let conversation_id = conversation.id;

        debug!(conversation_id, stage = ?Stage::Extracting, "extracting similar cases");
        let cases = self
            .extractor
            .extract(self.store.as_ref(), conversation.category_id(), conversation_id)
            .await;
        let source = if cases.is_empty() {
            SuggestionSource::DirectAnalysis
        } else {
            SuggestionSource::SimilarCases
        };

        debug!(conversation_id, stage = ?Stage::Synthesizing, cases = cases.len(), "building prompt");
        let request = prompt::build_request(conversation, cases);
        let prompt = prompt::render_prompt(&request);

        debug!(conversation_id, stage = ?Stage::Invoking, prompt_chars = prompt.len(), "calling reasoning provider");
        let raw = self.provider.complete(&prompt).await?;

        debug!(conversation_id, stage = ?Stage::Parsing, response_chars = raw.len(), "parsing provider output");
        let parsed = parser::parse_suggestion(&raw)?;

        Ok(parsed.into_result(source))
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
