// Conversation data model and the suggestion result types exchanged between
// the engine and its presenting surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ConversationId = i64;

// ---------------------------------------------------------------------------
// Conversations
// ---------------------------------------------------------------------------

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SenderRole {
    Client,
    Provider,
}

impl SenderRole {
    /// Uppercase label used both in storage and in rendered transcripts.
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderRole::Client => "CLIENT",
            SenderRole::Provider => "PROVIDER",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "CLIENT" => Some(SenderRole::Client),
            "PROVIDER" => Some(SenderRole::Provider),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender: SenderRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of the service request behind a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandStatus {
    Open,
    InProgress,
    Completed,
    Cancelled,
}

impl DemandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DemandStatus::Open => "open",
            DemandStatus::InProgress => "in_progress",
            DemandStatus::Completed => "completed",
            DemandStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "open" => Some(DemandStatus::Open),
            "in_progress" => Some(DemandStatus::InProgress),
            "completed" => Some(DemandStatus::Completed),
            "cancelled" => Some(DemandStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCategory {
    pub id: i64,
    pub label: String,
}

/// The service request a conversation is about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demand {
    pub id: i64,
    /// `None` for demands created before a category was picked.
    pub category: Option<ServiceCategory>,
    pub description: String,
    pub status: DemandStatus,
}

/// A buyer-seller conversation with its messages in creation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub demand: Demand,
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn category_id(&self) -> Option<i64> {
        self.demand.category.as_ref().map(|c| c.id)
    }
}

/// Identifies one state of a conversation. A new suggestion is due whenever
/// the key changes; results computed for an older key are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotKey {
    pub conversation_id: ConversationId,
    pub message_count: usize,
}

impl SnapshotKey {
    pub fn of(conversation: &Conversation) -> Self {
        Self {
            conversation_id: conversation.id,
            message_count: conversation.message_count(),
        }
    }
}

// ---------------------------------------------------------------------------
// Suggestion pipeline types
// ---------------------------------------------------------------------------

/// A question and the provider reply that answered it, taken from one
/// concluded historical conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseExample {
    pub transcript_excerpt: String,
    pub effective_reply: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceContext {
    pub label: String,
    pub description: String,
    pub status: String,
}

impl ServiceContext {
    const UNCATEGORIZED: &'static str = "Non précisé";

    pub fn from_demand(demand: &Demand) -> Self {
        Self {
            label: demand
                .category
                .as_ref()
                .map(|c| c.label.clone())
                .unwrap_or_else(|| Self::UNCATEGORIZED.to_string()),
            description: demand.description.clone(),
            status: demand.status.as_str().to_string(),
        }
    }
}

/// Everything the reasoning provider is shown for one analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRequest {
    pub transcript: String,
    pub service_context: ServiceContext,
    pub cases: Vec<CaseExample>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionType {
    Respond,
    FollowUp,
    ProposeMeeting,
    SendQuote,
    Other,
}

impl ActionType {
    pub const ALL: [ActionType; 5] = [
        ActionType::Respond,
        ActionType::FollowUp,
        ActionType::ProposeMeeting,
        ActionType::SendQuote,
        ActionType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Respond => "respond",
            ActionType::FollowUp => "followUp",
            ActionType::ProposeMeeting => "proposeMeeting",
            ActionType::SendQuote => "sendQuote",
            ActionType::Other => "other",
        }
    }

    /// Map a provider-supplied label onto the enumeration. Anything not
    /// recognised becomes `Other`.
    pub fn from_label(raw: &str) -> Self {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(raw))
            .unwrap_or(ActionType::Other)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SuggestionSource {
    SimilarCases,
    DirectAnalysis,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionResult {
    pub analysis: String,
    pub suggestion: String,
    pub action_type: ActionType,
    /// Always within 0..=100.
    pub confidence: u8,
    pub source: SuggestionSource,
}
