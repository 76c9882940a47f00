// Pipeline stages and the faults that end a pipeline run early.

use parley_core::model::ConversationId;
use parley_llm::provider::InvocationError;
use thiserror::Error;

use crate::parser::MalformedResponse;

/// Where an analysis is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Extracting,
    Synthesizing,
    Invoking,
    Parsing,
    Succeeded,
    FallenBack,
}

/// A fault that sends the analyzer to `Stage::FallenBack`.
///
/// Historical-case retrieval failures are not listed: the case extractor
/// absorbs them and continues with no cases.
#[derive(Debug, Error)]
pub enum EngineFault {
    #[error("failed to load conversation {conversation_id}: {message}")]
    ConversationLookup {
        conversation_id: ConversationId,
        message: String,
    },

    #[error("conversation {0} not found")]
    ConversationNotFound(ConversationId),

    #[error("reasoning provider call failed: {0}")]
    Invocation(#[from] InvocationError),

    #[error("malformed provider response: {0}")]
    Malformed(#[from] MalformedResponse),
}

impl EngineFault {
    /// The stage that was running when the fault occurred.
    pub fn stage(&self) -> Stage {
        match self {
            EngineFault::ConversationLookup { .. } | EngineFault::ConversationNotFound(_) => {
                Stage::Extracting
            }
            EngineFault::Invocation(_) => Stage::Invoking,
            EngineFault::Malformed(_) => Stage::Parsing,
        }
    }
}
