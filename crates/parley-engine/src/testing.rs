// In-memory fakes for the store and reasoning provider.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use parley_core::model::{
    Conversation, ConversationId, Demand, DemandStatus, Message, SenderRole, ServiceCategory,
};
use parley_core::store::ConversationStore;
use parley_llm::provider::{InvocationError, ReasoningProvider};

/// Build a completed conversation in `category` whose messages are one
/// minute apart, in the order given.
pub fn conversation(
    id: ConversationId,
    category: Option<i64>,
    messages: &[(SenderRole, &str)],
) -> Conversation {
    let start = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    Conversation {
        id,
        demand: Demand {
            id: id * 10,
            category: category.map(|category_id| ServiceCategory {
                id: category_id,
                label: "plomberie".into(),
            }),
            description: "Remplacement d'un chauffe-eau".into(),
            status: DemandStatus::Completed,
        },
        messages: messages
            .iter()
            .enumerate()
            .map(|(i, (sender, text))| Message {
                id: id * 1000 + i as i64,
                sender: *sender,
                content: text.to_string(),
                created_at: start + Duration::minutes(i as i64),
            })
            .collect(),
    }
}

#[derive(Default)]
pub struct FakeStore {
    conversations: Mutex<Vec<Conversation>>,
    history_fails: bool,
    last_history_limit: Mutex<Option<usize>>,
}

impl FakeStore {
    /// A store whose conversation lookups work but whose history query fails.
    pub fn with_failing_history() -> Self {
        Self {
            history_fails: true,
            ..Self::default()
        }
    }

    pub fn add(&self, conversation: Conversation) {
        self.conversations.lock().unwrap().push(conversation);
    }

    /// Add a conversation to history; earlier additions count as more recent.
    pub fn add_completed(&self, mut conversation: Conversation) {
        conversation.demand.status = DemandStatus::Completed;
        self.add(conversation);
    }

    pub fn last_history_limit(&self) -> Option<usize> {
        *self.last_history_limit.lock().unwrap()
    }
}

#[async_trait]
impl ConversationStore for FakeStore {
    async fn fetch_conversation(&self, id: ConversationId) -> anyhow::Result<Option<Conversation>> {
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn fetch_completed_in_category(
        &self,
        category_id: i64,
        limit: usize,
    ) -> anyhow::Result<Vec<Conversation>> {
        *self.last_history_limit.lock().unwrap() = Some(limit);
        if self.history_fails {
            anyhow::bail!("history index unavailable");
        }
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .iter()
            .filter(|c| {
                c.demand.status == DemandStatus::Completed && c.category_id() == Some(category_id)
            })
            .take(limit)
            .cloned()
            .collect())
    }
}

/// A store that is entirely unreachable.
pub struct FailingStore;

#[async_trait]
impl ConversationStore for FailingStore {
    async fn fetch_conversation(&self, _id: ConversationId) -> anyhow::Result<Option<Conversation>> {
        anyhow::bail!("connection refused")
    }

    async fn fetch_completed_in_category(
        &self,
        _category_id: i64,
        _limit: usize,
    ) -> anyhow::Result<Vec<Conversation>> {
        anyhow::bail!("connection refused")
    }
}

/// Replies with a fixed outcome and records every prompt it receives.
pub struct FakeProvider {
    reply: Result<String, InvocationError>,
    prompts: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: InvocationError) -> Self {
        Self {
            reply: Err(err),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReasoningProvider for FakeProvider {
    async fn complete(&self, prompt: &str) -> Result<String, InvocationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone()
    }
}
