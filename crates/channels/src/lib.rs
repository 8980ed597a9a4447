//! Chat channel implementations for Mercy.
//!
//! Each channel connects to a chat platform and relays messages to/from
//! the companion. Channels are trait-based and platform-agnostic.
//!
//! Available channels:
//! - **CLI**: Interactive terminal chat (stdin/stdout)
//! - **Telegram**: Telegram Bot API via long polling

pub mod cli;
pub mod telegram;

pub use cli::CliChannel;
pub use telegram::{TelegramChannel, TelegramConfig};
