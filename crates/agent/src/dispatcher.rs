//! Channel dispatch loop.
//!
//! Pulls messages off a [`Channel`] and answers each one on its own task,
//! so a slow generation for one user never holds up anyone else.

use crate::commands::CommandRouter;
use crate::error::GenerationError;
use mercy_core::channel::{Channel, ChannelMessage};
use mercy_core::error::ChannelError;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Start `channel` and answer every inbound message until the channel
/// closes. Returns an error only when the channel reports that our
/// credentials were rejected.
pub async fn serve(channel: Arc<dyn Channel>, router: Arc<CommandRouter>) -> Result<(), ChannelError> {
    let mut rx = channel.start().await?;
    info!(channel = channel.name(), "Listening for messages");

    while let Some(incoming) = rx.recv().await {
        match incoming {
            Ok(msg) => {
                tokio::spawn(handle_message(channel.clone(), router.clone(), msg));
            }
            Err(e @ ChannelError::Unauthorized { .. }) => return Err(e),
            Err(e) => warn!(channel = channel.name(), error = %e, "Channel error"),
        }
    }

    info!(channel = channel.name(), "Channel closed");
    Ok(())
}

/// Answer one message: typing indicator first, then the routed reply.
///
/// The reply is computed on a separate task; if that task panics the user
/// still gets the generic fallback.
pub async fn handle_message(channel: Arc<dyn Channel>, router: Arc<CommandRouter>, msg: ChannelMessage) {
    if let Err(e) = channel.send_typing(&msg.chat_id).await {
        warn!(chat_id = %msg.chat_id, error = %e, "Typing indicator failed");
    }

    let user_id = msg.sender_id.clone();
    let text = msg.content.clone();
    let reply = match tokio::spawn(async move { router.handle(&user_id, &text).await }).await {
        Ok(reply) => reply,
        Err(e) => {
            error!(user_id = %msg.sender_id, error = %e, "Reply task failed");
            GenerationError::Unknown(e.to_string()).fallback_message()
        }
    };

    if let Err(e) = channel
        .send(&msg.chat_id, &reply, msg.message_id.as_deref())
        .await
    {
        warn!(chat_id = %msg.chat_id, error = %e, "Failed to deliver reply");
    }
}
