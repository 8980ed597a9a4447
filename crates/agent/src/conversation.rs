//! Per-user conversation windows.
//!
//! Each user owns a bounded, ordered window of recent turns. The map of
//! users sits behind an `RwLock` that is only write-locked to insert a new
//! user; every user's window has its own `Mutex`, so a slow request for one
//! user never contends with another user's appends.
//!
//! The window lives in process memory only and is lost on restart.

use mercy_core::message::{Message, Role};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Default number of turns kept per user.
pub const DEFAULT_MAX_TURNS: usize = 10;

type Window = Arc<Mutex<VecDeque<Message>>>;

/// Shared store of recent turns, keyed by user ID.
pub struct ConversationStore {
    max_turns: usize,
    windows: RwLock<HashMap<String, Window>>,
}

impl ConversationStore {
    /// Create a store that keeps at most `max_turns` turns per user.
    pub fn new(max_turns: usize) -> Self {
        Self {
            max_turns: max_turns.max(1),
            windows: RwLock::new(HashMap::new()),
        }
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    async fn existing(&self, user_id: &str) -> Option<Window> {
        self.windows.read().await.get(user_id).cloned()
    }

    async fn window(&self, user_id: &str) -> Window {
        if let Some(window) = self.existing(user_id).await {
            return window;
        }
        self.windows
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .clone()
    }

    fn push_capped(turns: &mut VecDeque<Message>, message: Message, max_turns: usize) {
        turns.push_back(message);
        while turns.len() > max_turns {
            turns.pop_front();
        }
    }

    /// Snapshot of the user's turns, oldest first. Empty for unknown users.
    pub async fn get(&self, user_id: &str) -> Vec<Message> {
        match self.existing(user_id).await {
            Some(window) => window.lock().await.iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Append one turn, dropping the oldest turns beyond the cap.
    pub async fn append(&self, user_id: &str, role: Role, content: impl Into<String>) {
        let window = self.window(user_id).await;
        let mut turns = window.lock().await;
        Self::push_capped(&mut turns, Message::new(role, content), self.max_turns);
    }

    /// Append a user turn and its reply as one unit.
    ///
    /// Both turns are pushed under a single lock acquisition, so no other
    /// append for the same user can land between them.
    pub async fn append_exchange(
        &self,
        user_id: &str,
        user_content: impl Into<String>,
        assistant_content: impl Into<String>,
    ) {
        let window = self.window(user_id).await;
        let mut turns = window.lock().await;
        Self::push_capped(&mut turns, Message::user(user_content), self.max_turns);
        Self::push_capped(&mut turns, Message::assistant(assistant_content), self.max_turns);
        debug!(user_id, turns = turns.len(), "Conversation exchange committed");
    }

    /// Empty the user's window. Unknown users are left untouched.
    pub async fn clear(&self, user_id: &str) {
        if let Some(window) = self.existing(user_id).await {
            window.lock().await.clear();
        }
    }

    /// Number of turns currently held for the user.
    pub async fn len(&self, user_id: &str) -> usize {
        match self.existing(user_id).await {
            Some(window) => window.lock().await.len(),
            None => 0,
        }
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_user_is_empty() {
        let store = ConversationStore::default();
        assert!(store.get("ghost").await.is_empty());
        assert_eq!(store.len("ghost").await, 0);
        store.clear("ghost").await;
        assert!(store.get("ghost").await.is_empty());
    }

    #[tokio::test]
    async fn window_keeps_last_n_in_order() {
        let store = ConversationStore::default();
        for i in 0..13 {
            store.append("u1", Role::User, format!("turn {i}")).await;
        }
        let turns = store.get("u1").await;
        assert_eq!(turns.len(), DEFAULT_MAX_TURNS);
        let contents: Vec<_> = turns.iter().map(|t| t.content.clone()).collect();
        let expected: Vec<_> = (3..13).map(|i| format!("turn {i}")).collect();
        assert_eq!(contents, expected);
    }

    #[tokio::test]
    async fn clear_then_append_starts_fresh() {
        let store = ConversationStore::default();
        store.append_exchange("u1", "hi", "hello!").await;
        store.clear("u1").await;
        assert!(store.get("u1").await.is_empty());

        store.append("u1", Role::User, "again").await;
        let turns = store.get("u1").await;
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].content, "again");
    }

    #[tokio::test]
    async fn exchange_appends_user_then_assistant() {
        let store = ConversationStore::new(4);
        store.append_exchange("u1", "q1", "a1").await;
        store.append_exchange("u1", "q2", "a2").await;
        store.append_exchange("u1", "q3", "a3").await;

        let turns = store.get("u1").await;
        let roles: Vec<_> = turns.iter().map(|t| t.role).collect();
        assert_eq!(roles, [Role::User, Role::Assistant, Role::User, Role::Assistant]);
        assert_eq!(turns[0].content, "q2");
        assert_eq!(turns[3].content, "a3");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_exchanges_never_interleave() {
        let store = Arc::new(ConversationStore::default());
        let mut handles = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .append_exchange("u1", format!("q{i}"), format!("a{i}"))
                    .await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let turns = store.get("u1").await;
        assert_eq!(turns.len(), DEFAULT_MAX_TURNS);
        for pair in turns.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
            assert_eq!(pair[0].content[1..], pair[1].content[1..]);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn users_are_independent() {
        let store = Arc::new(ConversationStore::default());
        let a = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..20 {
                    store.append("alice", Role::User, format!("a{i}")).await;
                }
            })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move {
                store.append_exchange("bob", "hey", "hey bob").await;
            })
        };
        a.await.unwrap();
        b.await.unwrap();

        assert_eq!(store.len("alice").await, 10);
        assert!(store.get("alice").await.iter().all(|t| t.content.starts_with('a')));
        assert_eq!(store.len("bob").await, 2);

        store.clear("alice").await;
        assert_eq!(store.len("bob").await, 2);
    }
}
