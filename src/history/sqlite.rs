//! SQLite-backed chat history.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use tracing::info;

use super::schema::{apply_schema, read_schema_version};
use super::store::HistoryStore;
use super::{Message, NewMessage, Role};
use crate::error::{AttuneError, Result};
use crate::session::SessionId;

/// History stored in a single SQLite file.
///
/// All access is serialized through one `Mutex<Connection>` and runs on the
/// blocking pool, never on a runtime worker.
#[derive(Clone)]
pub struct SqliteHistoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteHistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteHistoryStore").finish_non_exhaustive()
    }
}

fn sql_err(e: rusqlite::Error) -> AttuneError {
    AttuneError::Persistence(e.to_string())
}

impl SqliteHistoryStore {
    /// Open (or create) the database at `path`, applying the schema.
    ///
    /// # Errors
    ///
    /// Returns [`AttuneError::Persistence`] if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(sql_err)?;
        apply_schema(&conn).map_err(sql_err)?;
        info!("history database: {}", path.display());
        Ok(Self::from_connection(conn))
    }

    /// An in-memory database, mostly for tests.
    ///
    /// # Errors
    ///
    /// Returns [`AttuneError::Persistence`] if SQLite cannot initialise.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(sql_err)?;
        apply_schema(&conn).map_err(sql_err)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn schema_version(&self) -> Result<Option<u32>> {
        let conn = lock(&self.conn)?;
        read_schema_version(&conn).map_err(sql_err)
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = lock(&conn)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| AttuneError::Persistence(format!("history task failed: {e}")))?
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<std::sync::MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| AttuneError::Persistence(format!("history lock poisoned: {e}")))
}

/// Insert one row and return it as stored.
fn insert(conn: &Connection, message: NewMessage) -> Result<Message> {
    let created_at = Utc::now();
    conn.execute(
        "INSERT INTO messages (session_id, role, content, emotion, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            message.session_id.as_str(),
            message.role.as_str(),
            message.content,
            message.emotion,
            created_at.to_rfc3339(),
        ],
    )
    .map_err(sql_err)?;
    let seq = u64::try_from(conn.last_insert_rowid())
        .map_err(|e| AttuneError::Persistence(format!("invalid seq: {e}")))?;
    Ok(Message {
        seq,
        session_id: message.session_id,
        role: message.role,
        content: message.content,
        emotion: message.emotion,
        created_at,
    })
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn append(&self, message: NewMessage) -> Result<Message> {
        self.with_conn(move |conn| insert(conn, message)).await
    }

    async fn append_turn(
        &self,
        user: NewMessage,
        assistant: NewMessage,
    ) -> Result<(Message, Message)> {
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(sql_err)?;
            let user = insert(&tx, user)?;
            let assistant = insert(&tx, assistant)?;
            tx.commit().map_err(sql_err)?;
            Ok((user, assistant))
        })
        .await
    }

    async fn read(&self, session_id: &SessionId) -> Result<Vec<Message>> {
        let session_id = session_id.clone();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT seq, role, content, emotion, created_at
                     FROM messages WHERE session_id = ?1",
                )
                .map_err(sql_err)?;
            let rows = stmt
                .query_map(params![session_id.as_str()], |row| {
                    Ok(RawRow {
                        seq: row.get(0)?,
                        role: row.get(1)?,
                        content: row.get(2)?,
                        emotion: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })
                .map_err(sql_err)?;

            let mut messages = Vec::new();
            for row in rows {
                messages.push(row.map_err(sql_err)?.into_message(&session_id)?);
            }
            Ok(messages)
        })
        .await
    }

    async fn list_sessions(&self) -> Result<Vec<SessionId>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT session_id FROM messages
                     GROUP BY session_id ORDER BY MIN(seq)",
                )
                .map_err(sql_err)?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(sql_err)?;
            let mut sessions = Vec::new();
            for id in ids {
                sessions.push(SessionId::parse(&id.map_err(sql_err)?)?);
            }
            Ok(sessions)
        })
        .await
    }
}

struct RawRow {
    seq: i64,
    role: String,
    content: String,
    emotion: Option<String>,
    created_at: String,
}

impl RawRow {
    fn into_message(self, session_id: &SessionId) -> Result<Message> {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| AttuneError::Persistence(format!("bad created_at: {e}")))?;
        Ok(Message {
            seq: u64::try_from(self.seq)
                .map_err(|e| AttuneError::Persistence(format!("invalid seq: {e}")))?,
            session_id: session_id.clone(),
            role: self.role.parse::<Role>()?,
            content: self.content,
            emotion: self.emotion,
            created_at,
        })
    }
}
