//! Model backend clients for Mercy.
//!
//! All providers implement the `mercy_core::Provider` trait. The companion
//! talks to a locally hosted Ollama server over its native chat API.

pub mod ollama;

pub use ollama::OllamaProvider;
