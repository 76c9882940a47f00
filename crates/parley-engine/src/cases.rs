// Case extraction: representative question/answer exchanges mined from
// concluded conversations in the same service category.

use parley_core::config::EngineSettings;
use parley_core::model::{CaseExample, Conversation, ConversationId, Message, SenderRole};
use parley_core::store::ConversationStore;
use tracing::{debug, warn};

/// A client message and the first provider message that followed it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exchange<'a> {
    pub question: &'a Message,
    pub reply: &'a Message,
}

/// Pair every client message with the nearest provider message after it.
///
/// Two passes: collect the positions of client messages, then walk the
/// conversation once, answering every pending client position with the
/// first provider message past it. Exchanges come out in question order.
/// `messages` must already be in creation order.
pub fn exchanges(messages: &[Message]) -> Vec<Exchange<'_>> {
    let client_positions: Vec<usize> = messages
        .iter()
        .enumerate()
        .filter(|(_, m)| m.sender == SenderRole::Client)
        .map(|(i, _)| i)
        .collect();

    let mut found = Vec::with_capacity(client_positions.len());
    let mut pending = 0;
    for (pos, message) in messages.iter().enumerate() {
        if message.sender != SenderRole::Provider {
            continue;
        }
        while pending < client_positions.len() && client_positions[pending] < pos {
            found.push(Exchange {
                question: &messages[client_positions[pending]],
                reply: message,
            });
            pending += 1;
        }
        if pending == client_positions.len() {
            break;
        }
    }
    found
}

/// Scans completed conversations for case examples.
#[derive(Debug, Clone)]
pub struct CaseExtractor {
    case_limit: usize,
    scan_limit: usize,
    substantive_reply_chars: usize,
}

impl CaseExtractor {
    pub fn new(settings: &EngineSettings) -> Self {
        Self {
            case_limit: settings.case_limit,
            scan_limit: settings.candidate_scan_limit,
            substantive_reply_chars: settings.substantive_reply_chars,
        }
    }

    /// Up to `case_limit` cases from completed conversations in `category_id`,
    /// skipping the conversation under analysis.
    ///
    /// No category means no cases. Store failures are logged and also yield
    /// no cases; they never reach the caller.
    pub async fn extract(
        &self,
        store: &dyn ConversationStore,
        category_id: Option<i64>,
        current: ConversationId,
    ) -> Vec<CaseExample> {
        let Some(category_id) = category_id else {
            debug!(conversation_id = current, "no service category; skipping case extraction");
            return Vec::new();
        };

        let candidates = match store
            .fetch_completed_in_category(category_id, self.scan_limit + 1)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(category_id, error = %format!("{e:#}"), "historical case lookup failed; continuing without cases");
                return Vec::new();
            }
        };

        let cases = self.cases_from(&candidates, current);
        debug!(
            category_id,
            scanned = candidates.len(),
            extracted = cases.len(),
            "case extraction complete"
        );
        cases
    }

    /// One case per conversation that has at least one exchange, in the
    /// order given, capped at `case_limit`. The excluded conversation does
    /// not count toward `scan_limit`.
    pub fn cases_from(&self, candidates: &[Conversation], exclude: ConversationId) -> Vec<CaseExample> {
        candidates
            .iter()
            .filter(|c| c.id != exclude)
            .take(self.scan_limit)
            .filter_map(|c| self.case_for(c))
            .take(self.case_limit)
            .collect()
    }

    fn case_for(&self, conversation: &Conversation) -> Option<CaseExample> {
        let found = exchanges(&conversation.messages);
        let chosen = found
            .iter()
            .find(|e| self.is_substantive(e.reply))
            .or_else(|| found.first())?;
        Some(CaseExample {
            transcript_excerpt: chosen.question.content.clone(),
            effective_reply: chosen.reply.content.clone(),
        })
    }

    fn is_substantive(&self, reply: &Message) -> bool {
        reply.content.trim().chars().count() > self.substantive_reply_chars
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
