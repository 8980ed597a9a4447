//! CLI channel: interactive terminal-based chat.
//!
//! Reads lines from stdin and prints replies to stdout. Every line is
//! attributed to the single user `local_user`, so the terminal session
//! shares one conversation and one set of records.
//! Used for `mercy chat` interactive mode.

use async_trait::async_trait;
use mercy_core::channel::{Channel, ChannelId, ChannelMessage};
use mercy_core::error::ChannelError;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// The user ID every terminal message is attributed to.
pub const LOCAL_USER_ID: &str = "local_user";

const CLI_CHAT_ID: &str = "cli_session";

/// Interactive CLI channel for terminal-based chat.
pub struct CliChannel {
    id: ChannelId,
}

impl CliChannel {
    pub fn new() -> Self {
        Self {
            id: ChannelId("cli".into()),
        }
    }

    fn is_exit(line: &str) -> bool {
        matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q")
    }

    /// Forward lines from `reader` into `tx` until EOF or an exit command.
    async fn pump<R>(
        reader: R,
        channel_id: ChannelId,
        tx: mpsc::Sender<Result<ChannelMessage, ChannelError>>,
    ) where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    if Self::is_exit(&line) {
                        break;
                    }

                    let msg = ChannelMessage {
                        channel_id: channel_id.clone(),
                        sender_id: LOCAL_USER_ID.into(),
                        sender_name: None,
                        content: line,
                        chat_id: CLI_CHAT_ID.into(),
                        message_id: None,
                    };

                    if tx.send(Ok(msg)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break, // EOF (Ctrl+D)
                Err(e) => {
                    let _ = tx.send(Err(ChannelError::ConnectionLost(e.to_string()))).await;
                    break;
                }
            }
        }
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    fn id(&self) -> &ChannelId {
        &self.id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let (tx, rx) = mpsc::channel(32);
        let channel_id = self.id.clone();

        tokio::spawn(Self::pump(BufReader::new(io::stdin()), channel_id, tx));

        Ok(rx)
    }

    async fn send(
        &self,
        _chat_id: &str,
        content: &str,
        _reply_to: Option<&str>,
    ) -> Result<(), ChannelError> {
        println!("{content}");
        Ok(())
    }

    fn is_allowed(&self, _sender_id: &str) -> bool {
        true // local terminal user
    }
}
