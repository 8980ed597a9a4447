//! SQLite record store.
//!
//! One database file with a table per record kind:
//! - `users`: profile, settings, and message counters
//! - `notes`, `tasks`, `reminders`, `facts`: per-user records
//!
//! Every record table carries an integer `iid` so "newest first" ordering
//! is stable even when two records share a timestamp.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mercy_core::error::StoreError;
use mercy_core::memory::*;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// A SQLite-backed [`MemoryStore`].
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`, creating parent
    /// directories as needed.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Storage(format!("Cannot create {}: {e}", parent.display())))?;
        }

        let options = SqliteConnectOptions::new().filename(path);
        let store = Self::connect(options, 4).await?;
        info!(path = %path.display(), "SQLite record store initialized");
        Ok(store)
    }

    /// Open a store from a connection string such as `sqlite::memory:`.
    ///
    /// In-memory databases are limited to a single connection, since each
    /// connection would otherwise see its own empty database.
    pub async fn new(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?;
        let max_connections = if url.contains(":memory:") { 1 } else { 4 };
        Self::connect(options, max_connections).await
    }

    async fn connect(options: SqliteConnectOptions, max_connections: u32) -> Result<Self, StoreError> {
        let options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        let statements: [(&str, &str); 9] = [
            (
                "users table",
                r#"
                CREATE TABLE IF NOT EXISTS users (
                    user_id          TEXT PRIMARY KEY,
                    username         TEXT NOT NULL DEFAULT '',
                    name             TEXT NOT NULL,
                    gender           TEXT NOT NULL DEFAULT 'unknown',
                    interests        TEXT NOT NULL DEFAULT '[]',
                    language         TEXT NOT NULL DEFAULT 'mixed',
                    mood             TEXT NOT NULL DEFAULT 'adaptive',
                    notifications    INTEGER NOT NULL DEFAULT 1,
                    total_messages   INTEGER NOT NULL DEFAULT 0,
                    last_interaction TEXT,
                    created_at       TEXT NOT NULL
                )
                "#,
            ),
            (
                "notes table",
                r#"
                CREATE TABLE IF NOT EXISTS notes (
                    iid        INTEGER PRIMARY KEY AUTOINCREMENT,
                    note_id    TEXT UNIQUE NOT NULL,
                    user_id    TEXT NOT NULL,
                    content    TEXT NOT NULL,
                    tags       TEXT NOT NULL DEFAULT '[]',
                    created_at TEXT NOT NULL
                )
                "#,
            ),
            (
                "tasks table",
                r#"
                CREATE TABLE IF NOT EXISTS tasks (
                    iid         INTEGER PRIMARY KEY AUTOINCREMENT,
                    task_id     TEXT UNIQUE NOT NULL,
                    user_id     TEXT NOT NULL,
                    description TEXT NOT NULL,
                    due_date    TEXT NOT NULL DEFAULT '',
                    completed   INTEGER NOT NULL DEFAULT 0,
                    priority    INTEGER NOT NULL DEFAULT 1,
                    created_at  TEXT NOT NULL
                )
                "#,
            ),
            (
                "reminders table",
                r#"
                CREATE TABLE IF NOT EXISTS reminders (
                    iid         INTEGER PRIMARY KEY AUTOINCREMENT,
                    reminder_id TEXT UNIQUE NOT NULL,
                    user_id     TEXT NOT NULL,
                    message     TEXT NOT NULL,
                    remind_at   TEXT NOT NULL,
                    completed   INTEGER NOT NULL DEFAULT 0,
                    created_at  TEXT NOT NULL
                )
                "#,
            ),
            (
                "facts table",
                r#"
                CREATE TABLE IF NOT EXISTS facts (
                    iid        INTEGER PRIMARY KEY AUTOINCREMENT,
                    fact_id    TEXT UNIQUE NOT NULL,
                    user_id    TEXT NOT NULL,
                    content    TEXT NOT NULL,
                    created_at TEXT NOT NULL
                )
                "#,
            ),
            ("notes index", "CREATE INDEX IF NOT EXISTS idx_notes_user ON notes(user_id)"),
            ("tasks index", "CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks(user_id, completed)"),
            ("reminders index", "CREATE INDEX IF NOT EXISTS idx_reminders_user ON reminders(user_id, completed)"),
            ("facts index", "CREATE INDEX IF NOT EXISTS idx_facts_user ON facts(user_id)"),
        ];

        for (what, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::MigrationFailed(format!("{what}: {e}")))?;
        }

        debug!("SQLite migrations complete");
        Ok(())
    }

    async fn count(&self, sql: &str, user_id: &str) -> Result<usize, StoreError> {
        let n: i64 = sqlx::query_scalar(sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("count: {e}")))?;
        Ok(n.max(0) as usize)
    }

    async fn delete_scoped(&self, sql: &str, user_id: &str, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(sql)
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE failed: {e}")))?;
        Ok(result.rows_affected() > 0)
    }
}

fn col<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StoreError::QueryFailed(format!("{name} column: {e}")))
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_note(row: &SqliteRow) -> Result<Note, StoreError> {
    let tags_json: String = col(row, "tags")?;
    Ok(Note {
        note_id: col(row, "note_id")?,
        content: col(row, "content")?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        created_at: parse_time(&col::<String>(row, "created_at")?),
    })
}

fn row_to_task(row: &SqliteRow) -> Result<Task, StoreError> {
    Ok(Task {
        task_id: col(row, "task_id")?,
        description: col(row, "description")?,
        due_date: col(row, "due_date")?,
        completed: col::<i64>(row, "completed")? != 0,
        priority: TaskPriority::from_rank(col(row, "priority")?),
        created_at: parse_time(&col::<String>(row, "created_at")?),
    })
}

fn row_to_reminder(row: &SqliteRow) -> Result<Reminder, StoreError> {
    Ok(Reminder {
        reminder_id: col(row, "reminder_id")?,
        message: col(row, "message")?,
        remind_at: col(row, "remind_at")?,
        completed: col::<i64>(row, "completed")? != 0,
        created_at: parse_time(&col::<String>(row, "created_at")?),
    })
}

fn row_to_fact(row: &SqliteRow) -> Result<Fact, StoreError> {
    Ok(Fact {
        fact_id: col(row, "fact_id")?,
        content: col(row, "content")?,
        created_at: parse_time(&col::<String>(row, "created_at")?),
    })
}

#[async_trait]
impl MemoryStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn ensure_user(&self, user_id: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT OR IGNORE INTO users (user_id, name, created_at) VALUES (?1, ?2, ?3)")
            .bind(user_id)
            .bind(DEFAULT_DISPLAY_NAME)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("INSERT user failed: {e}")))?;
        Ok(())
    }

    async fn get_profile(&self, user_id: &str) -> Result<UserProfile, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("get_profile: {e}")))?;

        let Some(row) = row else {
            return Ok(UserProfile::new(user_id));
        };

        let interests: String = col(&row, "interests")?;
        Ok(UserProfile {
            user_id: col(&row, "user_id")?,
            username: col(&row, "username")?,
            name: col(&row, "name")?,
            gender: col(&row, "gender")?,
            interests: serde_json::from_str(&interests).unwrap_or_default(),
            created_at: parse_time(&col::<String>(&row, "created_at")?),
        })
    }

    async fn set_name(&self, user_id: &str, name: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, name, created_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id) DO UPDATE SET name = excluded.name
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("set_name failed: {e}")))?;
        Ok(())
    }

    async fn get_display_name(&self, user_id: &str) -> Result<String, StoreError> {
        let name: Option<String> = sqlx::query_scalar("SELECT name FROM users WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("get_display_name: {e}")))?;

        Ok(name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.into()))
    }

    async fn get_settings(&self, user_id: &str) -> Result<UserSettings, StoreError> {
        let row = sqlx::query("SELECT language, mood, notifications FROM users WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("get_settings: {e}")))?;

        match row {
            Some(row) => Ok(UserSettings {
                language: col(&row, "language")?,
                mood: col(&row, "mood")?,
                notifications: col::<i64>(&row, "notifications")? != 0,
            }),
            None => Ok(UserSettings::default()),
        }
    }

    async fn add_note(&self, user_id: &str, content: &str, tags: &[String]) -> Result<String, StoreError> {
        let id = new_record_id();
        let tags_json = serde_json::to_string(tags)
            .map_err(|e| StoreError::Storage(format!("Tags serialization: {e}")))?;

        sqlx::query("INSERT INTO notes (note_id, user_id, content, tags, created_at) VALUES (?1, ?2, ?3, ?4, ?5)")
            .bind(&id)
            .bind(user_id)
            .bind(content)
            .bind(&tags_json)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("INSERT note failed: {e}")))?;

        debug!(user_id, note_id = %id, "Stored note");
        Ok(id)
    }

    async fn get_notes(&self, user_id: &str, tag: Option<&str>) -> Result<Vec<Note>, StoreError> {
        let rows = sqlx::query("SELECT * FROM notes WHERE user_id = ?1 ORDER BY iid DESC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("get_notes: {e}")))?;

        let notes = rows.iter().map(row_to_note).collect::<Result<Vec<_>, _>>()?;
        Ok(match tag {
            Some(tag) => notes.into_iter().filter(|n| n.tags.iter().any(|t| t == tag)).collect(),
            None => notes,
        })
    }

    async fn delete_note(&self, user_id: &str, note_id: &str) -> Result<bool, StoreError> {
        self.delete_scoped("DELETE FROM notes WHERE note_id = ?1 AND user_id = ?2", user_id, note_id)
            .await
    }

    async fn add_task(&self, user_id: &str, description: &str, due_date: &str) -> Result<String, StoreError> {
        let id = new_record_id();
        sqlx::query(
            "INSERT INTO tasks (task_id, user_id, description, due_date, priority, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(description)
        .bind(due_date)
        .bind(TaskPriority::default().rank())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT task failed: {e}")))?;

        debug!(user_id, task_id = %id, "Stored task");
        Ok(id)
    }

    async fn get_tasks(&self, user_id: &str, completed: bool) -> Result<Vec<Task>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM tasks WHERE user_id = ?1 AND completed = ?2 ORDER BY priority DESC, iid DESC",
        )
        .bind(user_id)
        .bind(completed as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("get_tasks: {e}")))?;

        rows.iter().map(row_to_task).collect()
    }

    async fn complete_task(&self, user_id: &str, task_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE tasks SET completed = 1 WHERE task_id = ?1 AND user_id = ?2")
            .bind(task_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("complete_task failed: {e}")))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_task(&self, user_id: &str, task_id: &str) -> Result<bool, StoreError> {
        self.delete_scoped("DELETE FROM tasks WHERE task_id = ?1 AND user_id = ?2", user_id, task_id)
            .await
    }

    async fn get_pending_tasks(&self, user_id: &str, limit: usize) -> Result<Vec<Task>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM tasks WHERE user_id = ?1 AND completed = 0 ORDER BY priority DESC, iid DESC LIMIT ?2",
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("get_pending_tasks: {e}")))?;

        rows.iter().map(row_to_task).collect()
    }

    async fn add_reminder(&self, user_id: &str, message: &str, remind_at: &str) -> Result<String, StoreError> {
        let id = new_record_id();
        sqlx::query(
            "INSERT INTO reminders (reminder_id, user_id, message, remind_at, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(message)
        .bind(remind_at)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT reminder failed: {e}")))?;
        Ok(id)
    }

    async fn get_reminders(&self, user_id: &str) -> Result<Vec<Reminder>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM reminders WHERE user_id = ?1 AND completed = 0 ORDER BY remind_at ASC, iid ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("get_reminders: {e}")))?;

        rows.iter().map(row_to_reminder).collect()
    }

    async fn complete_reminder(&self, user_id: &str, reminder_id: &str) -> Result<bool, StoreError> {
        let result =
            sqlx::query("UPDATE reminders SET completed = 1 WHERE reminder_id = ?1 AND user_id = ?2")
                .bind(reminder_id)
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Storage(format!("complete_reminder failed: {e}")))?;
        Ok(result.rows_affected() > 0)
    }

    async fn save_fact(&self, user_id: &str, content: &str) -> Result<String, StoreError> {
        let id = new_record_id();
        sqlx::query("INSERT INTO facts (fact_id, user_id, content, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&id)
            .bind(user_id)
            .bind(content)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("INSERT fact failed: {e}")))?;

        debug!(user_id, fact_id = %id, "Stored fact");
        Ok(id)
    }

    async fn get_recent_facts(&self, user_id: &str, limit: usize) -> Result<Vec<Fact>, StoreError> {
        let rows = sqlx::query("SELECT * FROM facts WHERE user_id = ?1 ORDER BY iid DESC LIMIT ?2")
            .bind(user_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("get_recent_facts: {e}")))?;

        rows.iter().map(row_to_fact).collect()
    }

    async fn record_message(&self, user_id: &str) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO users (user_id, name, created_at, total_messages, last_interaction)
            VALUES (?1, ?2, ?3, 1, ?3)
            ON CONFLICT(user_id) DO UPDATE SET
                total_messages = total_messages + 1,
                last_interaction = excluded.last_interaction
            "#,
        )
        .bind(user_id)
        .bind(DEFAULT_DISPLAY_NAME)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("record_message failed: {e}")))?;
        Ok(())
    }

    async fn get_stats(&self, user_id: &str) -> Result<UserStats, StoreError> {
        let row = sqlx::query("SELECT total_messages, last_interaction FROM users WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("get_stats: {e}")))?;

        let (total_messages, last_interaction) = match row {
            Some(row) => {
                let total: i64 = col(&row, "total_messages")?;
                let last: Option<String> = col(&row, "last_interaction")?;
                (total.max(0) as u64, last.as_deref().map(parse_time))
            }
            None => (0, None),
        };

        Ok(UserStats {
            total_messages,
            notes_count: self.count("SELECT COUNT(*) FROM notes WHERE user_id = ?1", user_id).await?,
            tasks_count: self
                .count("SELECT COUNT(*) FROM tasks WHERE user_id = ?1 AND completed = 0", user_id)
                .await?,
            reminders_count: self
                .count("SELECT COUNT(*) FROM reminders WHERE user_id = ?1 AND completed = 0", user_id)
                .await?,
            last_interaction,
        })
    }

    async fn reset_user(&self, user_id: &str) -> Result<bool, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("BEGIN failed: {e}")))?;

        for table in ["notes", "tasks", "reminders", "facts"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE user_id = ?1"))
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Storage(format!("DELETE {table} failed: {e}")))?;
        }

        let existed = sqlx::query("DELETE FROM users WHERE user_id = ?1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE user failed: {e}")))?
            .rows_affected()
            > 0;

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("COMMIT failed: {e}")))?;

        info!(user_id, existed, "User records reset");
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("data").join("mercy.db"))
            .await
            .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn backend_name() {
        let (db, _dir) = test_store().await;
        assert_eq!(db.name(), "sqlite");
    }

    #[tokio::test]
    async fn unknown_user_gets_defaults() {
        let (db, _dir) = test_store().await;
        assert_eq!(db.get_display_name("nobody").await.unwrap(), "friend");
        assert_eq!(db.get_profile("nobody").await.unwrap().name, "friend");
        assert_eq!(db.get_settings("nobody").await.unwrap(), UserSettings::default());
        let stats = db.get_stats("nobody").await.unwrap();
        assert_eq!(stats.total_messages, 0);
        assert!(stats.last_interaction.is_none());
    }

    #[tokio::test]
    async fn set_name_creates_and_updates() {
        let (db, _dir) = test_store().await;
        db.set_name("u1", "Alex").await.unwrap();
        assert_eq!(db.get_display_name("u1").await.unwrap(), "Alex");

        db.ensure_user("u1").await.unwrap();
        assert_eq!(db.get_display_name("u1").await.unwrap(), "Alex");

        db.set_name("u1", "Sam").await.unwrap();
        assert_eq!(db.get_profile("u1").await.unwrap().name, "Sam");
    }

    #[tokio::test]
    async fn facts_are_newest_first_and_limited() {
        let (db, _dir) = test_store().await;
        for i in 1..=5 {
            db.save_fact("u1", &format!("fact {i}")).await.unwrap();
        }
        db.save_fact("u2", "someone else's fact").await.unwrap();

        let facts = db.get_recent_facts("u1", 3).await.unwrap();
        let contents: Vec<_> = facts.iter().map(|f| f.content.as_str()).collect();
        assert_eq!(contents, ["fact 5", "fact 4", "fact 3"]);
    }

    #[tokio::test]
    async fn tasks_pending_and_completed() {
        let (db, _dir) = test_store().await;
        let first = db.add_task("u1", "buy milk", "").await.unwrap();
        db.add_task("u1", "call mom", "friday").await.unwrap();

        let pending = db.get_pending_tasks("u1", 3).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].description, "call mom");
        assert_eq!(pending[0].due_date, "friday");

        assert!(db.complete_task("u1", &first).await.unwrap());
        assert_eq!(db.get_tasks("u1", false).await.unwrap().len(), 1);
        let done = db.get_tasks("u1", true).await.unwrap();
        assert_eq!(done.len(), 1);
        assert!(done[0].completed);
    }

    #[tokio::test]
    async fn mutations_are_scoped_to_owner() {
        let (db, _dir) = test_store().await;
        let task = db.add_task("u1", "secret", "").await.unwrap();
        let note = db.add_note("u1", "private", &[]).await.unwrap();

        assert!(!db.complete_task("u2", &task).await.unwrap());
        assert!(!db.delete_task("u2", &task).await.unwrap());
        assert!(!db.delete_note("u2", &note).await.unwrap());
        assert!(!db.complete_task("u1", "nonexistent").await.unwrap());

        assert!(db.delete_note("u1", &note).await.unwrap());
        assert!(db.delete_task("u1", &task).await.unwrap());
    }

    #[tokio::test]
    async fn notes_filter_by_tag() {
        let (db, _dir) = test_store().await;
        db.add_note("u1", "birthday is march 3", &["personal".into()]).await.unwrap();
        db.add_note("u1", "likes jazz", &[]).await.unwrap();

        let all = db.get_notes("u1", None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].content, "likes jazz");

        let personal = db.get_notes("u1", Some("personal")).await.unwrap();
        assert_eq!(personal.len(), 1);
        assert_eq!(personal[0].tags, vec!["personal".to_string()]);
    }

    #[tokio::test]
    async fn reminders_order_and_complete() {
        let (db, _dir) = test_store().await;
        db.add_reminder("u1", "dentist", "2026-10-20T09:00").await.unwrap();
        let early = db.add_reminder("u1", "gym", "2026-10-19T07:00").await.unwrap();

        let reminders = db.get_reminders("u1").await.unwrap();
        assert_eq!(reminders[0].message, "gym");

        assert!(db.complete_reminder("u1", &early).await.unwrap());
        assert_eq!(db.get_reminders("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stats_count_messages_and_records() {
        let (db, _dir) = test_store().await;
        db.record_message("u1").await.unwrap();
        db.record_message("u1").await.unwrap();
        db.add_note("u1", "n", &[]).await.unwrap();
        let t = db.add_task("u1", "t", "").await.unwrap();
        db.add_task("u1", "t2", "").await.unwrap();
        db.complete_task("u1", &t).await.unwrap();

        let stats = db.get_stats("u1").await.unwrap();
        assert_eq!(stats.total_messages, 2);
        assert_eq!(stats.notes_count, 1);
        assert_eq!(stats.tasks_count, 1);
        assert!(stats.last_interaction.is_some());
    }

    #[tokio::test]
    async fn reset_user_removes_everything() {
        let (db, _dir) = test_store().await;
        db.set_name("u1", "Alex").await.unwrap();
        db.save_fact("u1", "likes tea").await.unwrap();
        db.add_task("u1", "task", "").await.unwrap();
        db.save_fact("u2", "untouched").await.unwrap();

        assert!(db.reset_user("u1").await.unwrap());
        assert!(db.get_recent_facts("u1", 10).await.unwrap().is_empty());
        assert!(db.get_tasks("u1", false).await.unwrap().is_empty());
        assert_eq!(db.get_display_name("u1").await.unwrap(), "friend");
        assert_eq!(db.get_recent_facts("u2", 10).await.unwrap().len(), 1);

        assert!(!db.reset_user("u1").await.unwrap());
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mercy.db");
        {
            let db = SqliteStore::open(&path).await.unwrap();
            db.save_fact("u1", "persisted").await.unwrap();
        }
        let db = SqliteStore::open(&path).await.unwrap();
        let facts = db.get_recent_facts("u1", 3).await.unwrap();
        assert_eq!(facts[0].content, "persisted");
    }

    #[tokio::test]
    async fn in_process_database() {
        let db = SqliteStore::new("sqlite::memory:").await.unwrap();
        db.save_fact("u1", "ephemeral").await.unwrap();
        assert_eq!(db.get_recent_facts("u1", 1).await.unwrap().len(), 1);
    }
}
