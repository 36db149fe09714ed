//! Message abstractions consumed by the dispatcher.
//!
//! The core never looks inside a message beyond its text. Everything else
//! (author, embeds, guild) belongs to the domain model of whichever client
//! produced it, reachable by downcasting through [`ChatMessage::as_any`].
//!
//! Handlers talk back through an [`Outbound`] collaborator injected into the
//! [`MessageContext`] they receive.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{BoxError, OutboundError};
use crate::registry::CommandRegistry;

/// An incoming chat message.
pub trait ChatMessage: Any + Send + Sync {
    /// The raw textual content.
    fn content(&self) -> &str;

    /// Platform identifier of this message.
    fn id(&self) -> &str;

    /// Identifier of the channel the message was posted in.
    fn channel_id(&self) -> &str;

    /// Returns `self` as `&dyn Any` for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;
}

/// Shared, type-erased message.
pub type BoxedMessage = Arc<dyn ChatMessage>;

/// A plain text message, enough for tests and console front-ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMessage {
    /// Message identifier.
    pub id: String,
    /// Channel identifier.
    pub channel_id: String,
    /// Text content.
    pub content: String,
}

impl TextMessage {
    /// Creates a message in the given channel.
    pub fn new(
        id: impl Into<String>,
        channel_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            channel_id: channel_id.into(),
            content: content.into(),
        }
    }

    /// Wraps the message into a [`BoxedMessage`].
    pub fn boxed(self) -> BoxedMessage {
        Arc::new(self)
    }
}

impl ChatMessage for TextMessage {
    fn content(&self) -> &str {
        &self.content
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn channel_id(&self) -> &str {
        &self.channel_id
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Outbound operations available to handlers.
///
/// Implemented by the platform client (REST requester, console printer...).
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Replies to `message`.
    async fn reply(&self, message: &dyn ChatMessage, content: &str) -> Result<(), BoxError>;

    /// Sends `content` to a channel.
    async fn send(&self, channel_id: &str, content: &str) -> Result<(), BoxError>;
}

// =============================================================================
// MessageContext
// =============================================================================

/// Everything a command handler gets besides its argument tokens.
#[derive(Clone)]
pub struct MessageContext {
    message: BoxedMessage,
    prefix: String,
    command: String,
    registry: Arc<CommandRegistry>,
    outbound: Option<Arc<dyn Outbound>>,
}

impl MessageContext {
    /// Creates a context for one invocation.
    pub fn new(
        message: BoxedMessage,
        prefix: impl Into<String>,
        command: impl Into<String>,
        registry: Arc<CommandRegistry>,
        outbound: Option<Arc<dyn Outbound>>,
    ) -> Self {
        Self {
            message,
            prefix: prefix.into(),
            command: command.into(),
            registry,
            outbound,
        }
    }

    /// The message that triggered the command.
    pub fn message(&self) -> &BoxedMessage {
        &self.message
    }

    /// Shortcut for `message().content()`.
    pub fn content(&self) -> &str {
        self.message.content()
    }

    /// Downcasts the message to its concrete type.
    pub fn message_as<M: ChatMessage>(&self) -> Option<&M> {
        self.message.as_any().downcast_ref::<M>()
    }

    /// The prefix the message was matched with.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Canonical name of the resolved command, even when invoked by alias.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The registry the command was resolved from.
    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    /// Replies to the triggering message.
    pub async fn reply(&self, content: &str) -> Result<(), OutboundError> {
        let outbound = self.outbound.as_ref().ok_or(OutboundError::Unavailable)?;
        outbound
            .reply(self.message.as_ref(), content)
            .await
            .map_err(OutboundError::Failed)
    }

    /// Sends to the triggering message's channel.
    pub async fn send(&self, content: &str) -> Result<(), OutboundError> {
        self.send_to(self.message.channel_id(), content).await
    }

    /// Sends to an arbitrary channel.
    pub async fn send_to(&self, channel_id: &str, content: &str) -> Result<(), OutboundError> {
        let outbound = self.outbound.as_ref().ok_or(OutboundError::Unavailable)?;
        outbound
            .send(channel_id, content)
            .await
            .map_err(OutboundError::Failed)
    }
}

impl fmt::Debug for MessageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageContext")
            .field("message_id", &self.message.id())
            .field("prefix", &self.prefix)
            .field("command", &self.command)
            .field("has_outbound", &self.outbound.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingOutbound {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Outbound for RecordingOutbound {
        async fn reply(&self, message: &dyn ChatMessage, content: &str) -> Result<(), BoxError> {
            self.sent
                .lock()
                .push((format!("reply:{}", message.id()), content.to_string()));
            Ok(())
        }

        async fn send(&self, channel_id: &str, content: &str) -> Result<(), BoxError> {
            self.sent
                .lock()
                .push((format!("send:{channel_id}"), content.to_string()));
            Ok(())
        }
    }

    fn context(outbound: Option<Arc<dyn Outbound>>) -> MessageContext {
        MessageContext::new(
            TextMessage::new("m1", "c1", "!ping").boxed(),
            "!",
            "ping",
            Arc::new(CommandRegistry::new()),
            outbound,
        )
    }

    #[tokio::test]
    async fn test_reply_and_send_use_outbound() {
        let outbound = Arc::new(RecordingOutbound::default());
        let ctx = context(Some(outbound.clone()));

        ctx.reply("pong").await.unwrap();
        ctx.send("hello").await.unwrap();

        let sent = outbound.sent.lock();
        assert_eq!(sent[0], ("reply:m1".to_string(), "pong".to_string()));
        assert_eq!(sent[1], ("send:c1".to_string(), "hello".to_string()));
    }

    #[test]
    fn test_reply_without_outbound_fails() {
        let ctx = context(None);
        let err = tokio_test::block_on(ctx.reply("pong")).unwrap_err();
        assert!(matches!(err, OutboundError::Unavailable));
    }

    #[test]
    fn test_downcast_message() {
        let ctx = context(None);
        let msg = ctx.message_as::<TextMessage>().unwrap();
        assert_eq!(msg.channel_id, "c1");
        assert_eq!(ctx.content(), "!ping");
    }
}
