//! Prefix-command dispatch.
//!
//! The dispatcher sits between the message source and the registry:
//!
//! ```text
//! message ──► prefix match ──► name + args ──► registry.resolve ──► tokio::spawn(handler)
//!                 │                                   │
//!                 └─ no prefix: Ignored               └─ unknown: NotFound (silent)
//! ```
//!
//! Handlers run detached. Their failures go to the [`ErrorSink`], never back
//! to the caller.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{Instrument, debug, debug_span, trace};

use crate::message::{BoxedMessage, MessageContext, Outbound};
use crate::registry::CommandRegistry;
use crate::sink::{ErrorSink, FailureOrigin, TracingErrorSink, guarded};

/// A parsed command invocation, borrowed from the message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation<'a> {
    /// The prefix that matched.
    pub prefix: &'a str,
    /// Text between the prefix and the first whitespace. May be empty.
    pub name: &'a str,
    /// Whitespace-separated tokens after the name.
    pub args: Vec<String>,
}

/// Splits `content` into prefix, command name and arguments.
///
/// Returns `None` when no prefix matches. When several prefixes match the
/// longest one is used.
pub fn parse_invocation<'a>(content: &'a str, prefixes: &'a [String]) -> Option<Invocation<'a>> {
    let prefix = prefixes
        .iter()
        .filter(|prefix| !prefix.is_empty() && content.starts_with(prefix.as_str()))
        .max_by_key(|prefix| prefix.len())?;

    let rest = &content[prefix.len()..];
    let name_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let (name, tail) = rest.split_at(name_end);

    Some(Invocation {
        prefix,
        name,
        args: tail.split_whitespace().map(str::to_string).collect(),
    })
}

/// Result of dispatching one message.
#[derive(Debug)]
pub enum Dispatch {
    /// The message does not start with a prefix.
    Ignored,
    /// Prefixed, but no command or alias has this name.
    NotFound(String),
    /// A handler was started.
    Invoked {
        /// Canonical name of the command.
        command: String,
        /// The detached handler task. Failures were already reported to the
        /// error sink, so the task itself always completes with `()`.
        task: JoinHandle<()>,
    },
}

impl Dispatch {
    /// Returns `true` for [`Dispatch::Invoked`].
    pub fn is_invoked(&self) -> bool {
        matches!(self, Self::Invoked { .. })
    }
}

/// Routes prefixed messages to registered commands.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    prefixes: Vec<String>,
    outbound: Option<Arc<dyn Outbound>>,
    sink: Arc<dyn ErrorSink>,
}

impl Dispatcher {
    /// Creates a dispatcher with no outbound client, logging failures.
    pub fn new(registry: Arc<CommandRegistry>, prefixes: Vec<String>) -> Self {
        Self {
            registry,
            prefixes,
            outbound: None,
            sink: Arc::new(TracingErrorSink),
        }
    }

    /// Sets the outbound client handed to every [`MessageContext`].
    pub fn with_outbound(mut self, outbound: Arc<dyn Outbound>) -> Self {
        self.outbound = Some(outbound);
        self
    }

    /// Sets where handler failures are reported.
    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Active prefixes.
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// The registry commands are resolved from.
    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    /// Dispatches one message.
    ///
    /// Must be called inside a tokio runtime. Does not wait for the handler.
    pub fn dispatch(&self, message: BoxedMessage) -> Dispatch {
        let Some(invocation) = parse_invocation(message.content(), &self.prefixes) else {
            return Dispatch::Ignored;
        };

        let Some(descriptor) = self.registry.resolve(invocation.name) else {
            trace!(name = invocation.name, "No such command");
            return Dispatch::NotFound(invocation.name.to_string());
        };

        let command = descriptor.name().to_string();
        let span = debug_span!("dispatch", command = %command, message = %message.id());
        debug!(
            parent: &span,
            invoked_as = invocation.name,
            args = invocation.args.len(),
            "Invoking command"
        );

        let ctx = Arc::new(MessageContext::new(
            Arc::clone(&message),
            invocation.prefix,
            command.clone(),
            Arc::clone(&self.registry),
            self.outbound.clone(),
        ));
        let future = guarded(
            FailureOrigin::Command(command.clone()),
            descriptor.invoke(ctx, invocation.args),
            Arc::clone(&self.sink),
        );
        let task = tokio::spawn(future.instrument(span));

        Dispatch::Invoked { command, task }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("prefixes", &self.prefixes)
            .field("commands", &self.registry.len())
            .field("has_outbound", &self.outbound.is_some())
            .finish()
    }
}
