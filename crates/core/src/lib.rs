//! # Mercy Core
//!
//! Domain types, traits, and error definitions for the Mercy companion bot.
//! This crate has **no framework dependencies**: it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (model backend, chat platform, record storage)
//! is defined as a trait here. Implementations live in their respective
//! crates. This enables:
//! - Swapping the model backend or storage via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod mood;
pub mod identity;
pub mod provider;
pub mod channel;
pub mod memory;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{Message, Role};
pub use mood::{Mood, MoodProfile, detect_mood};
pub use identity::Identity;
pub use provider::{GenerationOptions, Provider, ProviderRequest, ProviderResponse};
pub use channel::{Channel, ChannelId, ChannelMessage};
pub use memory::{Fact, MemoryStore, Note, Reminder, Task, TaskPriority, UserProfile, UserSettings, UserStats};
