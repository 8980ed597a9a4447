//! The companion core for Mercy.
//!
//! A reply is produced in one pass, with no tool loop:
//!
//! 1. **Route** the inbound text ([`CommandRouter`]): slash commands work on
//!    the record store, anything else is chat
//! 2. **Assemble** the mood-aware system prompt and memory digest ([`ContextAssembler`])
//! 3. **Generate** one reply through the configured provider ([`Companion`])
//! 4. **Commit** the exchange to the user's conversation window ([`ConversationStore`])
//!
//! [`serve`] drives this pipeline for every message arriving on a channel.
//! Failures at step 3 never reach the transport: they are turned into a
//! fixed fallback reply ([`GenerationError::fallback_message`]).

pub mod commands;
pub mod companion;
pub mod context;
pub mod conversation;
pub mod dispatcher;
pub mod error;

#[cfg(test)]
mod test_helpers;

pub use commands::CommandRouter;
pub use companion::Companion;
pub use context::{AssembledContext, ContextAssembler};
pub use conversation::ConversationStore;
pub use dispatcher::serve;
pub use error::GenerationError;
