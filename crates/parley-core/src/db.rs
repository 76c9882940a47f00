// SQLite persistence for categories, demands, conversations and messages.

use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::model::{
    Conversation, ConversationId, Demand, DemandStatus, Message, SenderRole, ServiceCategory,
};
use crate::store::ConversationStore;

/// SQLite-backed conversation store.
///
/// The suggestion engine only reads through [`ConversationStore`]; the
/// insert helpers exist for seeding and tests.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS service_categories (
                id    INTEGER PRIMARY KEY AUTOINCREMENT,
                label TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS demands (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                category_id INTEGER REFERENCES service_categories(id),
                description TEXT NOT NULL,
                status      TEXT NOT NULL DEFAULT 'open'
            );

            CREATE TABLE IF NOT EXISTS conversations (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                demand_id  INTEGER NOT NULL REFERENCES demands(id),
                updated_at TEXT
            );

            CREATE TABLE IF NOT EXISTS messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id INTEGER NOT NULL REFERENCES conversations(id),
                sender_role     TEXT NOT NULL,
                content         TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_messages_conversation
                ON messages(conversation_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_demands_category_status
                ON demands(category_id, status);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Insert a category or return the id of the existing one with the same label.
    pub fn insert_category(&self, label: &str) -> Result<i64> {
        let conn = self.conn();
        let id: i64 = conn
            .query_row(
                "INSERT INTO service_categories (label) VALUES (?1)
                 ON CONFLICT(label) DO UPDATE SET label = excluded.label
                 RETURNING id",
                params![label],
                |row| row.get(0),
            )
            .context("failed to upsert service category")?;
        Ok(id)
    }

    pub fn insert_demand(
        &self,
        category_id: Option<i64>,
        description: &str,
        status: DemandStatus,
    ) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO demands (category_id, description, status) VALUES (?1, ?2, ?3)",
            params![category_id, description, status.as_str()],
        )
        .context("failed to insert demand")?;
        Ok(conn.last_insert_rowid())
    }

    pub fn set_demand_status(&self, demand_id: i64, status: DemandStatus) -> Result<()> {
        let conn = self.conn();
        let updated = conn
            .execute(
                "UPDATE demands SET status = ?1 WHERE id = ?2",
                params![status.as_str(), demand_id],
            )
            .context("failed to update demand status")?;
        if updated == 0 {
            return Err(anyhow!("demand {demand_id} does not exist"));
        }
        Ok(())
    }

    pub fn insert_conversation(&self, demand_id: i64) -> Result<ConversationId> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO conversations (demand_id) VALUES (?1)",
            params![demand_id],
        )
        .context("failed to insert conversation")?;
        Ok(conn.last_insert_rowid())
    }

    /// Append a message and bump the conversation's activity timestamp in
    /// one transaction. Conversations without messages sort last.
    pub fn insert_message(
        &self,
        conversation_id: ConversationId,
        sender: SenderRole,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<i64> {
        let mut conn = self.conn();
        let created = format_timestamp(created_at);
        let tx = conn.transaction().context("failed to begin transaction")?;
        tx.execute(
            "INSERT INTO messages (conversation_id, sender_role, content, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![conversation_id, sender.as_str(), content, created],
        )
        .context("failed to insert message")?;
        let id = tx.last_insert_rowid();
        tx.execute(
            "UPDATE conversations
             SET updated_at = CASE
                 WHEN updated_at IS NULL OR updated_at < ?1 THEN ?1
                 ELSE updated_at
             END
             WHERE id = ?2",
            params![created, conversation_id],
        )
        .context("failed to touch conversation")?;
        tx.commit().context("failed to commit insert_message")?;
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn load_conversation(&self, id: ConversationId) -> Result<Option<Conversation>> {
        let conn = self.conn();
        load_conversation(&conn, id)
    }

    pub fn load_completed_in_category(
        &self,
        category_id: i64,
        limit: usize,
    ) -> Result<Vec<Conversation>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT c.id FROM conversations c
                 JOIN demands d ON d.id = c.demand_id
                 WHERE d.category_id = ?1 AND d.status = ?2
                 ORDER BY c.updated_at DESC, c.id DESC
                 LIMIT ?3",
            )
            .context("failed to prepare completed conversations query")?;

        let ids = stmt
            .query_map(
                params![category_id, DemandStatus::Completed.as_str(), limit as i64],
                |row| row.get::<_, i64>(0),
            )
            .context("failed to query completed conversations")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map conversation id rows")?;

        let mut conversations = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(conversation) = load_conversation(&conn, id)? {
                conversations.push(conversation);
            }
        }
        Ok(conversations)
    }
}

#[async_trait]
impl ConversationStore for Database {
    async fn fetch_conversation(&self, id: ConversationId) -> Result<Option<Conversation>> {
        self.load_conversation(id)
    }

    async fn fetch_completed_in_category(
        &self,
        category_id: i64,
        limit: usize,
    ) -> Result<Vec<Conversation>> {
        self.load_completed_in_category(category_id, limit)
    }
}

// ---------------------------------------------------------------------------
// Row decoding
// ---------------------------------------------------------------------------

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .with_context(|| format!("invalid message timestamp {raw:?}"))
}

fn load_conversation(conn: &Connection, id: ConversationId) -> Result<Option<Conversation>> {
    let header = conn
        .query_row(
            "SELECT d.id, d.description, d.status, sc.id, sc.label
             FROM conversations c
             JOIN demands d ON d.id = c.demand_id
             LEFT JOIN service_categories sc ON sc.id = d.category_id
             WHERE c.id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            },
        )
        .optional()
        .with_context(|| format!("failed to load conversation {id}"))?;

    let Some((demand_id, description, raw_status, category_id, category_label)) = header else {
        return Ok(None);
    };

    let status = DemandStatus::parse(&raw_status)
        .ok_or_else(|| anyhow!("demand {demand_id} has unknown status {raw_status:?}"))?;
    let category = match (category_id, category_label) {
        (Some(id), Some(label)) => Some(ServiceCategory { id, label }),
        _ => None,
    };

    Ok(Some(Conversation {
        id,
        demand: Demand {
            id: demand_id,
            category,
            description,
            status,
        },
        messages: load_messages(conn, id)?,
    }))
}

fn load_messages(conn: &Connection, conversation_id: ConversationId) -> Result<Vec<Message>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, sender_role, content, created_at FROM messages
             WHERE conversation_id = ?1
             ORDER BY created_at, id",
        )
        .context("failed to prepare load_messages query")?;

    let rows = stmt
        .query_map(params![conversation_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })
        .context("failed to query messages")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to map message rows")?;

    rows.into_iter()
        .map(|(id, raw_role, content, raw_created)| -> Result<Message> {
            let sender = SenderRole::parse(&raw_role)
                .ok_or_else(|| anyhow!("message {id} has unknown sender role {raw_role:?}"))?;
            Ok(Message {
                id,
                sender,
                content,
                created_at: parse_timestamp(&raw_created)?,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    /// Helper: create a fresh in-memory database for each test.
    fn test_db() -> Database {
        Database::open(":memory:").expect("in-memory database should open")
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    /// Helper: a conversation in `category` with the given demand status and
    /// messages one minute apart starting at `start`.
    fn seed_conversation(
        db: &Database,
        category: Option<i64>,
        status: DemandStatus,
        texts: &[(SenderRole, &str)],
        start: DateTime<Utc>,
    ) -> ConversationId {
        let demand = db.insert_demand(category, "Réparation", status).unwrap();
        let conv = db.insert_conversation(demand).unwrap();
        for (i, (role, text)) in texts.iter().enumerate() {
            db.insert_message(conv, *role, text, start + Duration::minutes(i as i64))
                .unwrap();
        }
        conv
    }

    #[test]
    fn open_creates_tables() {
        let db = test_db();
        let conn = db.conn();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        for expected in ["conversations", "demands", "messages", "service_categories"] {
            assert!(tables.contains(&expected.to_string()), "missing {expected}: {tables:?}");
        }
    }

    #[test]
    fn insert_category_is_idempotent_by_label() {
        let db = test_db();
        let a = db.insert_category("plomberie").unwrap();
        let b = db.insert_category("plomberie").unwrap();
        let c = db.insert_category("jardinage").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn load_conversation_returns_messages_in_creation_order() {
        let db = test_db();
        let cat = db.insert_category("plomberie").unwrap();
        let demand = db.insert_demand(Some(cat), "Fuite", DemandStatus::Open).unwrap();
        let conv = db.insert_conversation(demand).unwrap();

        // Inserted out of order on purpose.
        db.insert_message(conv, SenderRole::Provider, "second", t0() + Duration::minutes(5))
            .unwrap();
        db.insert_message(conv, SenderRole::Client, "first", t0()).unwrap();

        let loaded = db.load_conversation(conv).unwrap().expect("conversation exists");
        let texts: Vec<&str> = loaded.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert_eq!(loaded.messages[0].sender, SenderRole::Client);
        assert_eq!(loaded.messages[0].created_at, t0());
        assert_eq!(loaded.demand.category.as_ref().map(|c| c.label.as_str()), Some("plomberie"));
        assert_eq!(loaded.demand.status, DemandStatus::Open);
    }

    #[test]
    fn load_conversation_unknown_id_is_none() {
        let db = test_db();
        assert!(db.load_conversation(42).unwrap().is_none());
    }

    #[test]
    fn load_conversation_without_category() {
        let db = test_db();
        let conv = seed_conversation(
            &db,
            None,
            DemandStatus::Open,
            &[(SenderRole::Client, "Bonjour")],
            t0(),
        );
        let loaded = db.load_conversation(conv).unwrap().unwrap();
        assert!(loaded.demand.category.is_none());
    }

    #[test]
    fn completed_in_category_filters_status_and_category() {
        let db = test_db();
        let plumbing = db.insert_category("plomberie").unwrap();
        let garden = db.insert_category("jardinage").unwrap();
        let msgs = [(SenderRole::Client, "Q"), (SenderRole::Provider, "A")];

        let done = seed_conversation(&db, Some(plumbing), DemandStatus::Completed, &msgs, t0());
        seed_conversation(&db, Some(plumbing), DemandStatus::Open, &msgs, t0());
        seed_conversation(&db, Some(garden), DemandStatus::Completed, &msgs, t0());

        let found = db.load_completed_in_category(plumbing, 10).unwrap();
        let ids: Vec<_> = found.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![done]);
        assert_eq!(found[0].messages.len(), 2);
    }

    #[test]
    fn completed_in_category_is_most_recent_first_and_limited() {
        let db = test_db();
        let cat = db.insert_category("plomberie").unwrap();
        let msgs = [(SenderRole::Client, "Q")];

        let old = seed_conversation(&db, Some(cat), DemandStatus::Completed, &msgs, t0());
        let newest = seed_conversation(
            &db,
            Some(cat),
            DemandStatus::Completed,
            &msgs,
            t0() + Duration::days(2),
        );
        let middle = seed_conversation(
            &db,
            Some(cat),
            DemandStatus::Completed,
            &msgs,
            t0() + Duration::days(1),
        );

        let all: Vec<_> = db
            .load_completed_in_category(cat, 10)
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(all, vec![newest, middle, old]);

        let capped = db.load_completed_in_category(cat, 2).unwrap();
        assert_eq!(capped.len(), 2);
    }

    #[test]
    fn set_demand_status_moves_conversation_into_history() {
        let db = test_db();
        let cat = db.insert_category("plomberie").unwrap();
        let demand = db.insert_demand(Some(cat), "Fuite", DemandStatus::InProgress).unwrap();
        db.insert_conversation(demand).unwrap();
        assert!(db.load_completed_in_category(cat, 10).unwrap().is_empty());

        db.set_demand_status(demand, DemandStatus::Completed).unwrap();
        assert_eq!(db.load_completed_in_category(cat, 10).unwrap().len(), 1);
    }

    #[test]
    fn set_demand_status_unknown_demand_errors() {
        let db = test_db();
        assert!(db.set_demand_status(999, DemandStatus::Completed).is_err());
    }

    #[test]
    fn corrupt_sender_role_surfaces_as_error() {
        let db = test_db();
        let conv = seed_conversation(&db, None, DemandStatus::Open, &[], t0());
        db.conn()
            .execute(
                "INSERT INTO messages (conversation_id, sender_role, content, created_at)
                 VALUES (?1, 'ROBOT', 'x', '2026-03-01T09:00:00.000Z')",
                params![conv],
            )
            .unwrap();
        let err = db.load_conversation(conv).unwrap_err();
        assert!(format!("{err:#}").contains("unknown sender role"));
    }

    #[tokio::test]
    async fn store_trait_delegates_to_sqlite() {
        let db = test_db();
        let cat = db.insert_category("plomberie").unwrap();
        let conv = seed_conversation(
            &db,
            Some(cat),
            DemandStatus::Completed,
            &[(SenderRole::Client, "Q")],
            t0(),
        );

        let store: &dyn ConversationStore = &db;
        assert_eq!(store.fetch_conversation(conv).await.unwrap().unwrap().id, conv);
        assert_eq!(store.fetch_completed_in_category(cat, 3).await.unwrap().len(), 1);
    }
}
