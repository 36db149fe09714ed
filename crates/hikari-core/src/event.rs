//! Named-event subscription.
//!
//! - [`EventSource`] is the contract this crate needs from whatever produces
//!   gateway events: subscribe, subscribe-once, unsubscribe.
//! - [`EventBus`] is an in-process implementation of that contract.
//! - [`EventBinder`] attaches [`EventRegistration`]s to a source on behalf of
//!   a module, and remembers what it attached so that binding the same module
//!   again replaces its subscriptions instead of doubling them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace};

use crate::metadata::{EventArgs, EventMode, EventRegistration};
use crate::sink::{ErrorSink, FailureOrigin, TracingErrorSink, guarded};

/// Handle of one subscription, used to detach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Callback attached to an event source. Failures are the listener's concern.
pub type EventListener = Arc<dyn Fn(EventArgs) -> BoxFuture<'static, ()> + Send + Sync>;

/// The subscription surface of an external event source.
pub trait EventSource: Send + Sync {
    /// Attaches `listener` to every future occurrence of `event`.
    fn subscribe(&self, event: &str, listener: EventListener) -> SubscriptionId;

    /// Attaches `listener` to the next occurrence of `event` only.
    fn subscribe_once(&self, event: &str, listener: EventListener) -> SubscriptionId;

    /// Detaches a subscription. Returns `false` if it was already gone.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

// =============================================================================
// EventBus
// =============================================================================

struct Listener {
    id: SubscriptionId,
    once: bool,
    callback: EventListener,
}

/// In-process event source.
///
/// [`emit`](Self::emit) spawns every listener on the current tokio runtime and
/// returns without waiting for them. One-shot listeners are taken out under
/// the same lock that selects them, so concurrent emits cannot fire them twice.
#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<HashMap<String, Vec<Listener>>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Creates a bus with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&self, event: &str, listener: EventListener, once: bool) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .entry(event.to_string())
            .or_default()
            .push(Listener {
                id,
                once,
                callback: listener,
            });
        trace!(event, %id, once, "Listener attached");
        id
    }

    /// Fires `event` with positional `args`.
    ///
    /// Must be called inside a tokio runtime. Returns the number of listeners
    /// started.
    pub fn emit(&self, event: &str, args: Vec<Value>) -> usize {
        let args: EventArgs = args.into();
        let callbacks: Vec<EventListener> = {
            let mut listeners = self.listeners.lock();
            let Some(entries) = listeners.get_mut(event) else {
                return 0;
            };
            let callbacks = entries.iter().map(|l| Arc::clone(&l.callback)).collect();
            entries.retain(|l| !l.once);
            if entries.is_empty() {
                listeners.remove(event);
            }
            callbacks
        };

        debug!(event, listeners = callbacks.len(), "Emitting event");
        for callback in &callbacks {
            tokio::spawn(callback(Arc::clone(&args)));
        }
        callbacks.len()
    }

    /// Number of listeners currently attached to `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.lock().get(event).map_or(0, Vec::len)
    }
}

impl EventSource for EventBus {
    fn subscribe(&self, event: &str, listener: EventListener) -> SubscriptionId {
        self.add(event, listener, false)
    }

    fn subscribe_once(&self, event: &str, listener: EventListener) -> SubscriptionId {
        self.add(event, listener, true)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock();
        let mut removed = false;
        listeners.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|l| l.id != id);
            removed |= entries.len() != before;
            !entries.is_empty()
        });
        removed
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("events", &self.listeners.lock().len())
            .finish()
    }
}

// =============================================================================
// EventBinder
// =============================================================================

/// Binds event registrations to an [`EventSource`], per owning module.
///
/// Binding is idempotent per owner: [`bind`](Self::bind) first detaches
/// everything previously bound for that owner.
pub struct EventBinder {
    source: Arc<dyn EventSource>,
    sink: Arc<dyn ErrorSink>,
    bound: HashMap<String, Vec<SubscriptionId>>,
}

impl EventBinder {
    /// Creates a binder over `source` that logs handler failures.
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        Self::with_sink(source, Arc::new(TracingErrorSink))
    }

    /// Creates a binder reporting handler failures to `sink`.
    pub fn with_sink(source: Arc<dyn EventSource>, sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            source,
            sink,
            bound: HashMap::new(),
        }
    }

    /// The event source subscriptions go to.
    pub fn source(&self) -> &Arc<dyn EventSource> {
        &self.source
    }

    /// Subscribes `registrations` on behalf of `owner`, replacing the
    /// owner's previous subscriptions. Returns the number bound.
    pub fn bind(&mut self, owner: &str, registrations: Vec<EventRegistration>) -> usize {
        self.unbind(owner);

        let mut ids = Vec::with_capacity(registrations.len());
        for registration in registrations {
            let event = registration.event().to_string();
            let mode = registration.mode();
            let listener = self.listener_for(registration);
            let id = match mode {
                EventMode::On => self.source.subscribe(&event, listener),
                EventMode::Once => self.source.subscribe_once(&event, listener),
            };
            debug!(module = %owner, event = %event, %mode, "Event bound");
            ids.push(id);
        }

        let count = ids.len();
        if count > 0 {
            self.bound.insert(owner.to_string(), ids);
        }
        count
    }

    /// Detaches everything bound for `owner`. Returns the number detached.
    pub fn unbind(&mut self, owner: &str) -> usize {
        let Some(ids) = self.bound.remove(owner) else {
            return 0;
        };
        ids.into_iter()
            .filter(|id| self.source.unsubscribe(*id))
            .count()
    }

    /// Detaches everything this binder attached.
    pub fn unbind_all(&mut self) -> usize {
        let owners: Vec<String> = self.bound.keys().cloned().collect();
        owners.iter().map(|owner| self.unbind(owner)).sum()
    }

    /// Number of subscriptions currently held for `owner`.
    pub fn bound_count(&self, owner: &str) -> usize {
        self.bound.get(owner).map_or(0, Vec::len)
    }

    fn listener_for(&self, registration: EventRegistration) -> EventListener {
        let sink = Arc::clone(&self.sink);
        let registration = Arc::new(registration);
        Arc::new(move |args: EventArgs| {
            let origin = FailureOrigin::Event(registration.event().to_string());
            Box::pin(guarded(origin, registration.invoke(args), Arc::clone(&sink)))
        })
    }
}

impl fmt::Debug for EventBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBinder")
            .field("owners", &self.bound.len())
            .finish_non_exhaustive()
    }
}
