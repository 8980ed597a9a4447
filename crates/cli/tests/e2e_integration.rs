//! End-to-end tests for the Mercy pipeline.
//!
//! Each test wires the real Ollama client, the SQLite record store, the
//! companion, and the command router together, with a fake Ollama server
//! standing in for the model backend.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};

use mercy_agent::{CommandRouter, Companion, ConversationStore};
use mercy_core::identity::Identity;
use mercy_core::memory::MemoryStore;
use mercy_memory::SqliteStore;
use mercy_providers::OllamaProvider;

// ── Fake Ollama ──────────────────────────────────────────────────────────

/// How the fake backend answers one `/api/chat` call.
#[derive(Clone)]
enum Step {
    Reply(&'static str),
    Status(StatusCode),
    Stall(Duration),
}

#[derive(Clone, Default)]
struct Backend {
    script: Arc<Mutex<Vec<Step>>>,
    bodies: Arc<Mutex<Vec<Value>>>,
}

impl Backend {
    fn new(script: Vec<Step>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script)),
            bodies: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn bodies(&self) -> Vec<Value> {
        self.bodies.lock().unwrap().clone()
    }
}

async fn chat(State(backend): State<Backend>, Json(body): Json<Value>) -> Response {
    backend.bodies.lock().unwrap().push(body);
    let step = backend.script.lock().unwrap().remove(0);

    match step {
        Step::Reply(text) => Json(json!({
            "model": "qwen2.5",
            "message": { "role": "assistant", "content": text },
            "done": true,
            "prompt_eval_count": 120,
            "eval_count": 12
        }))
        .into_response(),
        Step::Status(status) => (status, "backend exploded").into_response(),
        Step::Stall(delay) => {
            tokio::time::sleep(delay).await;
            Json(json!({ "message": { "role": "assistant", "content": "too late" } })).into_response()
        }
    }
}

async fn spawn_ollama(backend: Backend) -> String {
    let app = Router::new().route("/api/chat", post(chat)).with_state(backend);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api/chat")
}

// ── Harness ──────────────────────────────────────────────────────────────

struct Harness {
    router: CommandRouter,
    store: Arc<SqliteStore>,
    conversations: Arc<ConversationStore>,
    _dir: tempfile::TempDir,
}

async fn harness(chat_url: &str, max_turns: usize, timeout: Duration) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::open(&dir.path().join("mercy.db")).await.unwrap());
    let provider = Arc::new(OllamaProvider::new(chat_url, Duration::from_secs(10)).unwrap());
    let conversations = Arc::new(ConversationStore::new(max_turns));
    let companion = Arc::new(
        Companion::new(
            provider,
            store.clone(),
            conversations.clone(),
            Identity::default(),
            "qwen2.5",
        )
        .with_timeout(timeout),
    );

    Harness {
        router: CommandRouter::new(store.clone(), companion),
        store,
        conversations,
        _dir: dir,
    }
}

fn system_prompt(body: &Value) -> String {
    body["messages"][0]["content"].as_str().unwrap().to_string()
}

fn roles(body: &Value) -> Vec<String> {
    body["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["role"].as_str().unwrap().to_string())
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn saved_records_reach_the_prompt_and_history_builds_up() {
    let backend = Backend::new(vec![Step::Reply("Hi Alex!"), Step::Reply("Good luck with the essay!")]);
    let url = spawn_ollama(backend.clone()).await;
    let h = harness(&url, 10, Duration::from_secs(5)).await;

    assert!(h.router.handle("u1", "/myname Alex").await.contains("Alex"));
    h.router.handle("u1", "/save My birthday is March 15").await;
    h.router.handle("u1", "/save I need to finish my essay").await;

    assert_eq!(h.router.handle("u1", "hey there").await, "Hi Alex!");
    assert_eq!(
        h.router.handle("u1", "can you help me study for my goal").await,
        "Good luck with the essay!"
    );

    let bodies = backend.bodies();
    assert_eq!(bodies.len(), 2);

    let first = &bodies[0];
    assert_eq!(first["model"], "qwen2.5");
    assert_eq!(first["stream"], false);
    assert_eq!(roles(first), ["system", "user"]);
    let prompt = system_prompt(first);
    assert!(prompt.contains("Remember: you are talking to Alex"));
    assert!(prompt.contains(
        "\n\nCONTEXT ABOUT YOUR FRIEND:\nI remember:\n- My birthday is March 15\n\nCurrent tasks:\n- I need to finish my essay\n"
    ));

    // The first exchange is replayed ahead of the new message.
    let second = &bodies[1];
    assert_eq!(roles(second), ["system", "user", "assistant", "user"]);
    assert_eq!(second["messages"][1]["content"], "hey there");
    assert_eq!(second["messages"][2]["content"], "Hi Alex!");
    assert!(system_prompt(second).contains("CURRENT MOOD: supportive"));

    assert_eq!(h.conversations.len("u1").await, 4);
    assert_eq!(h.store.get_stats("u1").await.unwrap().total_messages, 2);
}

#[tokio::test]
async fn backend_error_gets_fallback_and_leaves_history_alone() {
    let backend = Backend::new(vec![
        Step::Reply("Hello!"),
        Step::Status(StatusCode::INTERNAL_SERVER_ERROR),
        Step::Reply("Back again"),
    ]);
    let url = spawn_ollama(backend.clone()).await;
    let h = harness(&url, 10, Duration::from_secs(5)).await;

    assert_eq!(h.router.handle("u1", "hi").await, "Hello!");
    assert_eq!(
        h.router.handle("u1", "this one breaks").await,
        "Sorry, I got a 500 error. Let me try again?"
    );
    assert_eq!(h.conversations.len("u1").await, 2);

    assert_eq!(h.router.handle("u1", "still there?").await, "Back again");
    let third = &backend.bodies()[2];
    assert_eq!(roles(third), ["system", "user", "assistant", "user"]);
    let contents: Vec<&str> = third["messages"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|m| m["content"].as_str())
        .collect();
    assert!(!contents.contains(&"this one breaks"));
}

#[tokio::test]
async fn unreachable_backend_suggests_starting_ollama() {
    // Bind then drop to get a port nobody is listening on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let h = harness(&format!("http://{addr}/api/chat"), 10, Duration::from_secs(5)).await;
    let reply = h.router.handle("u1", "hello?").await;
    assert_eq!(
        reply,
        "I can't reach my brain right now! Is Ollama running? Try: ollama serve"
    );
    assert_eq!(h.conversations.len("u1").await, 0);
}

#[tokio::test]
async fn slow_backend_times_out() {
    let backend = Backend::new(vec![Step::Stall(Duration::from_secs(3))]);
    let url = spawn_ollama(backend).await;
    let h = harness(&url, 10, Duration::from_millis(200)).await;

    let reply = h.router.handle("u1", "tell me everything").await;
    assert_eq!(
        reply,
        "I'm taking too long to think... maybe we should talk about something simpler?"
    );
    assert_eq!(h.conversations.len("u1").await, 0);
}

#[tokio::test]
async fn window_keeps_only_the_latest_turns() {
    let backend = Backend::new(vec![
        Step::Reply("one"),
        Step::Reply("two"),
        Step::Reply("three"),
        Step::Reply("four"),
    ]);
    let url = spawn_ollama(backend.clone()).await;
    let h = harness(&url, 4, Duration::from_secs(5)).await;

    for text in ["a", "b", "c", "d"] {
        h.router.handle("u1", text).await;
    }

    let last = &backend.bodies()[3];
    assert_eq!(roles(last), ["system", "user", "assistant", "user", "assistant", "user"]);
    assert_eq!(last["messages"][1]["content"], "b");
    assert_eq!(last["messages"][4]["content"], "three");
    assert_eq!(h.conversations.len("u1").await, 4);
}

#[tokio::test]
async fn users_do_not_share_context() {
    let backend = Backend::new(vec![Step::Reply("for u1"), Step::Reply("for u2")]);
    let url = spawn_ollama(backend.clone()).await;
    let h = harness(&url, 10, Duration::from_secs(5)).await;

    h.router.handle("u1", "/save My birthday is in June").await;
    h.router.handle("u1", "hi").await;
    h.router.handle("u2", "hi").await;

    let u2_body = &backend.bodies()[1];
    assert_eq!(roles(u2_body), ["system", "user"]);
    assert!(!system_prompt(u2_body).contains("CONTEXT ABOUT YOUR FRIEND"));
    assert!(system_prompt(u2_body).contains("Remember: you are talking to friend"));
}

#[tokio::test]
async fn reset_clears_records_and_conversation() {
    let backend = Backend::new(vec![Step::Reply("noted"), Step::Reply("fresh start")]);
    let url = spawn_ollama(backend.clone()).await;
    let h = harness(&url, 10, Duration::from_secs(5)).await;

    h.router.handle("u1", "/save My birthday is May 2").await;
    h.router.handle("u1", "hi").await;
    assert_eq!(h.conversations.len("u1").await, 2);

    assert!(h.router.handle("u1", "/reset").await.contains("/confirm_reset"));
    assert_eq!(h.store.get_recent_facts("u1", 5).await.unwrap().len(), 1);

    h.router.handle("u1", "/confirm_reset").await;
    assert_eq!(h.conversations.len("u1").await, 0);
    assert!(h.store.get_recent_facts("u1", 5).await.unwrap().is_empty());

    h.router.handle("u1", "hello again").await;
    let after = &backend.bodies()[1];
    assert_eq!(roles(after), ["system", "user"]);
    assert!(!system_prompt(after).contains("CONTEXT ABOUT YOUR FRIEND"));
}

#[tokio::test]
async fn records_survive_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("mercy.db");

    {
        let store = SqliteStore::open(&path).await.unwrap();
        store.set_name("u1", "Robin").await.unwrap();
        store.add_task("u1", "water the plants", "").await.unwrap();
    }

    let store = SqliteStore::open(&path).await.unwrap();
    assert_eq!(store.get_display_name("u1").await.unwrap(), "Robin");
    let tasks = store.get_tasks("u1", false).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].description, "water the plants");
}
