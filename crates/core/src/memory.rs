//! Memory trait: persistent per-user records.
//!
//! The record store keeps everything the companion knows about a user
//! between restarts: profile, settings, notes, tasks, reminders, free-text
//! facts, and message counters. It is plain keyed CRUD; the only invariant
//! is uniqueness of the generated record identifiers.
//!
//! Conversation turns are *not* stored here. They live in process memory
//! only (see `mercy_agent::ConversationStore`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::StoreError;

/// Display name used when a user never set one.
pub const DEFAULT_DISPLAY_NAME: &str = "friend";

/// Generate a short record identifier (first 8 hex chars of a v4 UUID).
pub fn new_record_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// What the companion knows about a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,

    /// Platform username (may be empty)
    #[serde(default)]
    pub username: String,

    /// How the companion addresses the user
    pub name: String,

    #[serde(default = "default_gender")]
    pub gender: String,

    #[serde(default)]
    pub interests: Vec<String>,

    pub created_at: DateTime<Utc>,
}

fn default_gender() -> String {
    "unknown".into()
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: String::new(),
            name: DEFAULT_DISPLAY_NAME.into(),
            gender: default_gender(),
            interests: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// Per-user preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    pub language: String,
    pub mood: String,
    pub notifications: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            language: "mixed".into(),
            mood: "adaptive".into(),
            notifications: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub note_id: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Task priority. Higher priorities are listed first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Normal,
    High,
}

impl TaskPriority {
    /// Numeric rank used for storage and ordering.
    pub fn rank(&self) -> i64 {
        match self {
            TaskPriority::Low => 0,
            TaskPriority::Normal => 1,
            TaskPriority::High => 2,
        }
    }

    pub fn from_rank(rank: i64) -> Self {
        match rank {
            i64::MIN..=0 => TaskPriority::Low,
            1 => TaskPriority::Normal,
            _ => TaskPriority::High,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub description: String,
    /// Free-form due date as the user typed it (may be empty)
    #[serde(default)]
    pub due_date: String,
    pub completed: bool,
    #[serde(default)]
    pub priority: TaskPriority,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub reminder_id: String,
    pub message: String,
    /// When to remind, as the user typed it
    pub remind_at: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

/// A free-text fact the user asked the companion to remember.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub fact_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Simple per-user counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_messages: u64,
    pub notes_count: usize,
    /// Pending tasks only
    pub tasks_count: usize,
    /// Pending reminders only
    pub reminders_count: usize,
    pub last_interaction: Option<DateTime<Utc>>,
}

/// The core MemoryStore trait.
///
/// Every mutation is scoped by `user_id`: completing or deleting a record
/// that belongs to another user is a no-op returning `false`.
///
/// Implementations: SQLite, in-memory (for testing).
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    // --- Profile ---

    /// Create the user's profile if it does not exist yet.
    async fn ensure_user(&self, user_id: &str) -> Result<(), StoreError>;

    /// The stored profile, or a default profile if the user is unknown.
    async fn get_profile(&self, user_id: &str) -> Result<UserProfile, StoreError>;

    async fn set_name(&self, user_id: &str, name: &str) -> Result<(), StoreError>;

    /// The name to address the user by; [`DEFAULT_DISPLAY_NAME`] if unset.
    async fn get_display_name(&self, user_id: &str) -> Result<String, StoreError>;

    async fn get_settings(&self, user_id: &str) -> Result<UserSettings, StoreError>;

    // --- Notes ---

    async fn add_note(&self, user_id: &str, content: &str, tags: &[String]) -> Result<String, StoreError>;

    /// Notes newest first, optionally only those carrying `tag`.
    async fn get_notes(&self, user_id: &str, tag: Option<&str>) -> Result<Vec<Note>, StoreError>;

    async fn delete_note(&self, user_id: &str, note_id: &str) -> Result<bool, StoreError>;

    // --- Tasks ---

    async fn add_task(&self, user_id: &str, description: &str, due_date: &str) -> Result<String, StoreError>;

    /// Tasks with the given completion state, highest priority then newest first.
    async fn get_tasks(&self, user_id: &str, completed: bool) -> Result<Vec<Task>, StoreError>;

    async fn complete_task(&self, user_id: &str, task_id: &str) -> Result<bool, StoreError>;

    async fn delete_task(&self, user_id: &str, task_id: &str) -> Result<bool, StoreError>;

    /// Up to `limit` pending tasks in [`get_tasks`](Self::get_tasks) order.
    async fn get_pending_tasks(&self, user_id: &str, limit: usize) -> Result<Vec<Task>, StoreError> {
        let mut tasks = self.get_tasks(user_id, false).await?;
        tasks.truncate(limit);
        Ok(tasks)
    }

    // --- Reminders ---

    async fn add_reminder(&self, user_id: &str, message: &str, remind_at: &str) -> Result<String, StoreError>;

    /// Pending reminders ordered by `remind_at`.
    async fn get_reminders(&self, user_id: &str) -> Result<Vec<Reminder>, StoreError>;

    async fn complete_reminder(&self, user_id: &str, reminder_id: &str) -> Result<bool, StoreError>;

    // --- Facts ---

    async fn save_fact(&self, user_id: &str, content: &str) -> Result<String, StoreError>;

    /// Up to `limit` facts, most recently created first.
    async fn get_recent_facts(&self, user_id: &str, limit: usize) -> Result<Vec<Fact>, StoreError>;

    // --- Counters ---

    /// Bump the message counter and stamp the last interaction time.
    async fn record_message(&self, user_id: &str) -> Result<(), StoreError>;

    async fn get_stats(&self, user_id: &str) -> Result<UserStats, StoreError>;

    /// Delete every record of the user. Returns whether a profile existed.
    async fn reset_user(&self, user_id: &str) -> Result<bool, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_ids_are_short_and_unique() {
        let a = new_record_id();
        let b = new_record_id();
        assert_eq!(a.len(), 8);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn new_profile_uses_placeholder_name() {
        let profile = UserProfile::new("42");
        assert_eq!(profile.name, DEFAULT_DISPLAY_NAME);
        assert_eq!(profile.gender, "unknown");
    }

    #[test]
    fn priority_rank_roundtrip_and_order() {
        for p in [TaskPriority::Low, TaskPriority::Normal, TaskPriority::High] {
            assert_eq!(TaskPriority::from_rank(p.rank()), p);
        }
        assert!(TaskPriority::High > TaskPriority::Normal);
    }

    #[test]
    fn settings_defaults() {
        let s = UserSettings::default();
        assert_eq!(s.language, "mixed");
        assert_eq!(s.mood, "adaptive");
        assert!(s.notifications);
    }
}
