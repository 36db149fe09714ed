//! Failure reporting for fire-and-forget handlers.
//!
//! Command and event handlers run detached from the code that triggered them,
//! so nobody is waiting to receive their errors. [`guarded`] wraps a handler
//! future and routes any error or panic it produces to an [`ErrorSink`].
//! Failures therefore never take down the dispatch loop, and they still reach
//! an observer.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::error;

use crate::error::{BoxError, HandlerResult};

/// Which handler failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureOrigin {
    /// A command handler, by canonical name.
    Command(String),
    /// An event handler, by event name.
    Event(String),
}

impl fmt::Display for FailureOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(name) => write!(f, "command '{name}'"),
            Self::Event(name) => write!(f, "event '{name}'"),
        }
    }
}

/// How the handler failed.
#[derive(Debug)]
pub enum FailureKind {
    /// The handler returned `Err`.
    Error(BoxError),
    /// The handler panicked; the payload message if it was a string.
    Panic(String),
}

/// A failed handler run.
#[derive(Debug)]
pub struct HandlerFailure {
    /// The failing handler.
    pub origin: FailureOrigin,
    /// The failure itself.
    pub kind: FailureKind,
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FailureKind::Error(e) => write!(f, "{} failed: {e}", self.origin),
            FailureKind::Panic(msg) => write!(f, "{} panicked: {msg}", self.origin),
        }
    }
}

/// Receives handler failures.
pub trait ErrorSink: Send + Sync {
    /// Called once per failed handler run.
    fn report(&self, failure: HandlerFailure);
}

impl<F> ErrorSink for F
where
    F: Fn(HandlerFailure) + Send + Sync,
{
    fn report(&self, failure: HandlerFailure) {
        self(failure)
    }
}

/// Default sink: logs every failure at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, failure: HandlerFailure) {
        match &failure.kind {
            FailureKind::Error(e) => {
                error!(origin = %failure.origin, error = %e, "Handler returned an error")
            }
            FailureKind::Panic(msg) => {
                error!(origin = %failure.origin, panic = %msg, "Handler panicked")
            }
        }
    }
}

/// Wraps a handler future so its failure goes to `sink`.
pub fn guarded<F>(
    origin: FailureOrigin,
    future: F,
    sink: Arc<dyn ErrorSink>,
) -> impl Future<Output = ()> + Send + 'static
where
    F: Future<Output = HandlerResult> + Send + 'static,
{
    async move {
        let kind = match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(())) => return,
            Ok(Err(e)) => FailureKind::Error(e),
            Err(payload) => FailureKind::Panic(panic_message(payload.as_ref())),
        };
        sink.report(HandlerFailure { origin, kind });
    }
}

/// Text of a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
