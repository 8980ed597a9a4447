//! In-memory record store: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::Utc;
use mercy_core::error::StoreError;
use mercy_core::memory::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct UserRecords {
    profile: Option<UserProfile>,
    settings: UserSettings,
    notes: Vec<Note>,
    tasks: Vec<Task>,
    reminders: Vec<Reminder>,
    facts: Vec<Fact>,
    total_messages: u64,
    last_interaction: Option<chrono::DateTime<Utc>>,
}

impl UserRecords {
    fn profile_mut(&mut self, user_id: &str) -> &mut UserProfile {
        self.profile.get_or_insert_with(|| UserProfile::new(user_id))
    }
}

/// A [`MemoryStore`] that keeps everything in a map keyed by user ID.
/// Records are appended in creation order; listings reverse that.
pub struct InMemoryStore {
    users: Arc<RwLock<HashMap<String, UserRecords>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn ensure_user(&self, user_id: &str) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        users.entry(user_id.to_string()).or_default().profile_mut(user_id);
        Ok(())
    }

    async fn get_profile(&self, user_id: &str) -> Result<UserProfile, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .get(user_id)
            .and_then(|u| u.profile.clone())
            .unwrap_or_else(|| UserProfile::new(user_id)))
    }

    async fn set_name(&self, user_id: &str, name: &str) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        users.entry(user_id.to_string()).or_default().profile_mut(user_id).name = name.to_string();
        Ok(())
    }

    async fn get_display_name(&self, user_id: &str) -> Result<String, StoreError> {
        let name = self.get_profile(user_id).await?.name;
        if name.trim().is_empty() {
            Ok(DEFAULT_DISPLAY_NAME.into())
        } else {
            Ok(name)
        }
    }

    async fn get_settings(&self, user_id: &str) -> Result<UserSettings, StoreError> {
        let users = self.users.read().await;
        Ok(users.get(user_id).map(|u| u.settings.clone()).unwrap_or_default())
    }

    async fn add_note(&self, user_id: &str, content: &str, tags: &[String]) -> Result<String, StoreError> {
        let id = new_record_id();
        let mut users = self.users.write().await;
        users.entry(user_id.to_string()).or_default().notes.push(Note {
            note_id: id.clone(),
            content: content.to_string(),
            tags: tags.to_vec(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn get_notes(&self, user_id: &str, tag: Option<&str>) -> Result<Vec<Note>, StoreError> {
        let users = self.users.read().await;
        let Some(records) = users.get(user_id) else {
            return Ok(vec![]);
        };
        Ok(records
            .notes
            .iter()
            .rev()
            .filter(|n| tag.is_none_or(|t| n.tags.iter().any(|nt| nt == t)))
            .cloned()
            .collect())
    }

    async fn delete_note(&self, user_id: &str, note_id: &str) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        let Some(records) = users.get_mut(user_id) else {
            return Ok(false);
        };
        let before = records.notes.len();
        records.notes.retain(|n| n.note_id != note_id);
        Ok(records.notes.len() < before)
    }

    async fn add_task(&self, user_id: &str, description: &str, due_date: &str) -> Result<String, StoreError> {
        let id = new_record_id();
        let mut users = self.users.write().await;
        users.entry(user_id.to_string()).or_default().tasks.push(Task {
            task_id: id.clone(),
            description: description.to_string(),
            due_date: due_date.to_string(),
            completed: false,
            priority: TaskPriority::default(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn get_tasks(&self, user_id: &str, completed: bool) -> Result<Vec<Task>, StoreError> {
        let users = self.users.read().await;
        let Some(records) = users.get(user_id) else {
            return Ok(vec![]);
        };
        let mut tasks: Vec<Task> = records
            .tasks
            .iter()
            .rev()
            .filter(|t| t.completed == completed)
            .cloned()
            .collect();
        // stable sort keeps newest-first within a priority
        tasks.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(tasks)
    }

    async fn complete_task(&self, user_id: &str, task_id: &str) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        let task = users
            .get_mut(user_id)
            .and_then(|r| r.tasks.iter_mut().find(|t| t.task_id == task_id));
        match task {
            Some(task) => {
                task.completed = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_task(&self, user_id: &str, task_id: &str) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        let Some(records) = users.get_mut(user_id) else {
            return Ok(false);
        };
        let before = records.tasks.len();
        records.tasks.retain(|t| t.task_id != task_id);
        Ok(records.tasks.len() < before)
    }

    async fn add_reminder(&self, user_id: &str, message: &str, remind_at: &str) -> Result<String, StoreError> {
        let id = new_record_id();
        let mut users = self.users.write().await;
        users.entry(user_id.to_string()).or_default().reminders.push(Reminder {
            reminder_id: id.clone(),
            message: message.to_string(),
            remind_at: remind_at.to_string(),
            completed: false,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn get_reminders(&self, user_id: &str) -> Result<Vec<Reminder>, StoreError> {
        let users = self.users.read().await;
        let Some(records) = users.get(user_id) else {
            return Ok(vec![]);
        };
        let mut reminders: Vec<Reminder> =
            records.reminders.iter().filter(|r| !r.completed).cloned().collect();
        reminders.sort_by(|a, b| a.remind_at.cmp(&b.remind_at));
        Ok(reminders)
    }

    async fn complete_reminder(&self, user_id: &str, reminder_id: &str) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        let reminder = users
            .get_mut(user_id)
            .and_then(|r| r.reminders.iter_mut().find(|r| r.reminder_id == reminder_id));
        match reminder {
            Some(reminder) => {
                reminder.completed = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn save_fact(&self, user_id: &str, content: &str) -> Result<String, StoreError> {
        let id = new_record_id();
        let mut users = self.users.write().await;
        users.entry(user_id.to_string()).or_default().facts.push(Fact {
            fact_id: id.clone(),
            content: content.to_string(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn get_recent_facts(&self, user_id: &str, limit: usize) -> Result<Vec<Fact>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .get(user_id)
            .map(|r| r.facts.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn record_message(&self, user_id: &str) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let records = users.entry(user_id.to_string()).or_default();
        records.profile_mut(user_id);
        records.total_messages += 1;
        records.last_interaction = Some(Utc::now());
        Ok(())
    }

    async fn get_stats(&self, user_id: &str) -> Result<UserStats, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .get(user_id)
            .map(|r| UserStats {
                total_messages: r.total_messages,
                notes_count: r.notes.len(),
                tasks_count: r.tasks.iter().filter(|t| !t.completed).count(),
                reminders_count: r.reminders.iter().filter(|r| !r.completed).count(),
                last_interaction: r.last_interaction,
            })
            .unwrap_or_default())
    }

    async fn reset_user(&self, user_id: &str) -> Result<bool, StoreError> {
        let removed = self.users.write().await.remove(user_id);
        Ok(removed.is_some_and(|r| r.profile.is_some()))
    }
}
