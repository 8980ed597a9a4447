//! Bot command dispatch.
//!
//! Slash commands (`/save`, `/tasks`, ...) operate on the record store
//! directly; everything else is a chat message handed to the [`Companion`].

use crate::companion::Companion;
use mercy_core::error::StoreError;
use mercy_core::memory::MemoryStore;
use std::sync::Arc;
use tracing::{debug, warn};

const FACT_KEYWORDS: &[&str] = &["birthday", "born", "date"];
const TASK_KEYWORDS: &[&str] = &["task", "todo", "need to", "should"];

const STORE_FAILURE_REPLY: &str =
    "Sorry, I couldn't reach my memory just now. Can you try that again in a moment?";

/// Routes incoming text to command handlers or the companion.
pub struct CommandRouter {
    store: Arc<dyn MemoryStore>,
    companion: Arc<Companion>,
}

/// Truncate to `max` characters, adding "..." when anything was cut.
fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

impl CommandRouter {
    pub fn new(store: Arc<dyn MemoryStore>, companion: Arc<Companion>) -> Self {
        Self { store, companion }
    }

    /// Handle one inbound message and produce the reply text.
    pub async fn handle(&self, user_id: &str, text: &str) -> String {
        let text = text.trim();

        let Some(command_line) = text.strip_prefix('/') else {
            if let Err(e) = self.store.record_message(user_id).await {
                warn!(user_id, error = %e, "Failed to record message");
            }
            return self.companion.respond(user_id, text).await;
        };

        let mut parts = command_line.split_whitespace();
        let command = parts
            .next()
            .unwrap_or_default()
            .split('@')
            .next()
            .unwrap_or_default()
            .to_lowercase();
        let args: Vec<&str> = parts.collect();

        debug!(user_id, command = %command, args = args.len(), "Handling command");

        match self.dispatch(user_id, &command, &args).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(user_id, command = %command, error = %e, "Command failed");
                STORE_FAILURE_REPLY.into()
            }
        }
    }

    async fn dispatch(&self, user_id: &str, command: &str, args: &[&str]) -> Result<String, StoreError> {
        match command {
            "start" => self.start(user_id).await,
            "help" => Ok(self.help()),
            "save" => self.save(user_id, args).await,
            "memory" => self.memory(user_id).await,
            "notes" => self.notes(user_id).await,
            "tasks" => self.tasks(user_id).await,
            "complete" => self.complete(user_id, args).await,
            "remind" => self.remind(user_id, args).await,
            "myname" => self.myname(user_id, args).await,
            "settings" => self.settings(user_id).await,
            "stats" => self.stats(user_id).await,
            "reset" => Ok(Self::reset_warning()),
            "confirm_reset" => self.confirm_reset(user_id).await,
            other => Ok(format!(
                "I don't know the command /{other} yet. Try /help to see what I can do!"
            )),
        }
    }

    async fn start(&self, user_id: &str) -> Result<String, StoreError> {
        self.store.ensure_user(user_id).await?;
        self.store.record_message(user_id).await?;

        let bot = self.companion.identity();
        Ok(format!(
            "Hey there! I'm {name} 💕\n\n\
             I'm your {age}-year-old AI best friend, here to chat, support you, and help with whatever you need!\n\n\
             I can:\n\
             📝 Save your notes and ideas\n\
             ✅ Keep track of your tasks\n\
             ⏰ Set reminders for you\n\
             🧠 Remember things about you\n\
             💬 Have real, meaningful conversations\n\n\
             Just talk to me naturally, like you would with a friend!\n\n\
             Use /help to see all commands, or just say hi! 👋",
            name = bot.name,
            age = bot.age,
        ))
    }

    fn help(&self) -> String {
        "Here are all the things I can do for you:\n\n\
         📋 Basic Commands:\n\
         /start - Start our friendship\n\
         /help - Show this help message\n\n\
         💾 Memory Commands:\n\
         /save <something> - Save something I should remember\n\
         /memory - Show everything I know about you\n\
         /notes - View your saved notes\n\
         /tasks - See your task list\n\
         /complete <task_id> - Mark a task as done\n\
         /remind <message> <time> - Set a reminder\n\n\
         ⚙️ Settings:\n\
         /myname <name> - Tell me what to call you\n\
         /settings - View your settings\n\
         /stats - See our conversation stats\n\
         /reset - Clear all your data (careful!)\n\n\
         Just message me naturally and I'll be here for you! 💕"
            .into()
    }

    async fn save(&self, user_id: &str, args: &[&str]) -> Result<String, StoreError> {
        if args.is_empty() {
            return Ok("What would you like me to save? 💭\n\n\
                       Example: /save My birthday is on March 15th\n\
                       Or: /save I love chocolate cake!"
                .into());
        }

        let content = args.join(" ");
        let lower = content.to_lowercase();

        if FACT_KEYWORDS.iter().any(|k| lower.contains(k)) {
            self.store.save_fact(user_id, &content).await?;
            let note_id = self.store.add_note(user_id, &content, &["personal".to_string()]).await?;
            Ok(format!("Got it! I'll remember that. 📝✨\n(Saved as note #{note_id})"))
        } else if TASK_KEYWORDS.iter().any(|k| lower.contains(k)) {
            let task_id = self.store.add_task(user_id, &content, "").await?;
            Ok(format!("Added to your tasks! ✅\nTask #{task_id}: {content}"))
        } else {
            let note_id = self.store.add_note(user_id, &content, &[]).await?;
            Ok(format!("Saved! I'll remember that. 📝\nNote #{note_id}: {content}"))
        }
    }

    async fn memory(&self, user_id: &str) -> Result<String, StoreError> {
        let profile = self.store.get_profile(user_id).await?;
        let facts = self.store.get_recent_facts(user_id, 5).await?;
        let notes = self.store.get_notes(user_id, None).await?;

        let mut text = format!("What I know about you, {}: 💕\n\n📝 Saved Facts:\n", profile.name);
        if facts.is_empty() {
            text.push_str("No saved facts yet\n");
        }
        for fact in &facts {
            text.push_str(&format!("• {}\n", fact.content));
        }

        text.push_str("\n📋 Recent Notes:\n");
        if notes.is_empty() {
            text.push_str("No notes yet\n");
        }
        for note in notes.iter().take(3) {
            text.push_str(&format!("• {}\n", preview(&note.content, 50)));
        }

        text.push_str(&format!("\n📊 Profile:\nName: {}\n", profile.name));
        if !profile.interests.is_empty() {
            text.push_str(&format!("Interests: {}\n", profile.interests.join(", ")));
        }
        Ok(text)
    }

    async fn notes(&self, user_id: &str) -> Result<String, StoreError> {
        let notes = self.store.get_notes(user_id, None).await?;
        if notes.is_empty() {
            return Ok("You don't have any notes yet! 📝\n\nSave one with: /save <your note>".into());
        }

        let mut text = String::from("Your Notes: 📝\n\n");
        for (i, note) in notes.iter().enumerate() {
            text.push_str(&format!(
                "{}. {}\n   ID: {}\n\n",
                i + 1,
                preview(&note.content, 100),
                note.note_id
            ));
        }
        Ok(text)
    }

    async fn tasks(&self, user_id: &str) -> Result<String, StoreError> {
        let pending = self.store.get_tasks(user_id, false).await?;
        let completed = self.store.get_tasks(user_id, true).await?;

        if pending.is_empty() && completed.is_empty() {
            return Ok("You have no tasks! ✅\n\nAdd one with: /save I need to finish my homework".into());
        }

        let mut text = String::from("Your Tasks: ✅\n\n");
        if !pending.is_empty() {
            text.push_str("Pending:\n");
            for (i, task) in pending.iter().enumerate() {
                text.push_str(&format!("{}. {}", i + 1, preview(&task.description, 80)));
                if !task.due_date.is_empty() {
                    text.push_str(&format!(" (Due: {})", task.due_date));
                }
                text.push_str(&format!("\n   ID: {}\n", task.task_id));
            }
            text.push('\n');
        }
        if !completed.is_empty() {
            text.push_str(&format!("Completed: {} tasks 🎉\n", completed.len()));
        }
        text.push_str("\nMark complete: /complete <task_id>");
        Ok(text)
    }

    async fn complete(&self, user_id: &str, args: &[&str]) -> Result<String, StoreError> {
        let Some(task_id) = args.first() else {
            return Ok("Usage: /complete <task_id>\nFind task IDs with /tasks".into());
        };

        if self.store.complete_task(user_id, task_id).await? {
            Ok("Great job! Task completed! 🎉✨\nI'm proud of you!".into())
        } else {
            Ok("Couldn't find that task ID. Check with /tasks".into())
        }
    }

    async fn remind(&self, user_id: &str, args: &[&str]) -> Result<String, StoreError> {
        let [message @ .., when] = args else {
            return Ok(Self::remind_usage());
        };
        if message.is_empty() {
            return Ok(Self::remind_usage());
        }

        let message = message.join(" ");
        let reminder_id = self.store.add_reminder(user_id, &message, when).await?;
        Ok(format!(
            "Reminder set! ⏰\nI'll remind you: '{message}'\nWhen: {when}\n\nReminder ID: {reminder_id}"
        ))
    }

    fn remind_usage() -> String {
        "Usage: /remind <message> <time>\n\n\
         Examples:\n\
         /remind Call mom tomorrow\n\
         /remind Take medicine 18:00\n\
         /remind Meeting 2026-02-25T10:00"
            .into()
    }

    async fn myname(&self, user_id: &str, args: &[&str]) -> Result<String, StoreError> {
        if args.is_empty() {
            let current = self.store.get_display_name(user_id).await?;
            return Ok(format!(
                "I currently call you: {current}\n\nTo change it: /myname <your name>\nExample: /myname Alex"
            ));
        }

        let name = args.join(" ");
        self.store.set_name(user_id, &name).await?;
        Ok(format!("Nice to meet you, {name}! 💕\nI'll remember that from now on."))
    }

    async fn settings(&self, user_id: &str) -> Result<String, StoreError> {
        let settings = self.store.get_settings(user_id).await?;
        let name = self.store.get_display_name(user_id).await?;
        Ok(format!(
            "Your Settings: ⚙️\n\n\
             📝 Name: {name}\n\
             🌐 Language: {}\n\
             😊 Mood: {}\n\
             🔔 Notifications: {}\n\n\
             To change your name: /myname <name>",
            settings.language,
            settings.mood,
            if settings.notifications { "On" } else { "Off" },
        ))
    }

    async fn stats(&self, user_id: &str) -> Result<String, StoreError> {
        let stats = self.store.get_stats(user_id).await?;
        let last_chat = stats
            .last_interaction
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "Never".into());

        Ok(format!(
            "Our Friendship Stats: 📊\n\n\
             💬 Total Messages: {}\n\
             📝 Notes Saved: {}\n\
             ✅ Pending Tasks: {}\n\
             ⏰ Active Reminders: {}\n\
             🕐 Last Chat: {last_chat}\n\n\
             Thanks for being my friend! 💕",
            stats.total_messages, stats.notes_count, stats.tasks_count, stats.reminders_count,
        ))
    }

    fn reset_warning() -> String {
        "⚠️ WARNING ⚠️\n\n\
         This will delete ALL your data:\n\
         - Notes\n\
         - Tasks\n\
         - Reminders\n\
         - Profile\n\n\
         This cannot be undone!\n\n\
         Type /confirm_reset to confirm, or ignore to cancel."
            .into()
    }

    async fn confirm_reset(&self, user_id: &str) -> Result<String, StoreError> {
        let existed = self.store.reset_user(user_id).await?;
        self.companion.conversations().clear(user_id).await;

        if existed {
            Ok("All your data has been cleared. 🧹\n\n\
                It's like we're meeting for the first time!\n\
                Say /start to begin again."
                .into())
        } else {
            Ok("Nothing to reset - we just met!".into())
        }
    }
}
