// Read-only contract of the external persistence layer that owns
// conversations, messages and demands.

use async_trait::async_trait;

use crate::model::{Conversation, ConversationId};

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Fetch a conversation with its messages in ascending creation order
    /// and its linked demand. `Ok(None)` when no such conversation exists.
    async fn fetch_conversation(&self, id: ConversationId) -> anyhow::Result<Option<Conversation>>;

    /// Fetch up to `limit` conversations whose demand belongs to
    /// `category_id` and is completed, most recently active first.
    async fn fetch_completed_in_category(
        &self,
        category_id: i64,
        limit: usize,
    ) -> anyhow::Result<Vec<Conversation>>;
}
