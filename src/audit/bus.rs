//! In-process event bus for change events
//!
//! A direct synchronous observer list, not messaging infrastructure: there
//! is no queue, no buffering, and no cross-thread handoff. `publish` invokes
//! every subscribed handler on the calling thread, in subscription order,
//! before returning.

use tracing::warn;

use crate::error::TrailResult;
use crate::store::txn::TxnContext;

use super::event::ChangeEvent;

/// A subscribed change event handler
///
/// Handlers receive the event and the publisher's transaction context so
/// they can open transactions isolated from the caller's.
pub type ChangeHandler = Box<dyn Fn(&ChangeEvent, &mut TxnContext) -> TrailResult<()> + Send + Sync>;

/// Synchronous publish/subscribe bus for change events
///
/// Subscription is static: handlers are registered once at wiring time and
/// there is no unsubscribe path.
#[derive(Default)]
pub struct EventBus {
    handlers: Vec<ChangeHandler>,
}

impl EventBus {
    /// Create a bus with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; it will run after all previously registered
    /// handlers on each publish
    pub fn subscribe(&mut self, handler: ChangeHandler) {
        self.handlers.push(handler);
    }

    /// Number of registered handlers
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Deliver an event to every handler, in subscription order
    ///
    /// A handler error is logged with enough context to identify the
    /// affected record and action, then swallowed: it reaches neither the
    /// publisher nor the handlers that follow it in the fanout order.
    pub fn publish(&self, event: &ChangeEvent, ctx: &mut TxnContext) {
        for handler in &self.handlers {
            if let Err(err) = handler(event, ctx) {
                warn!(
                    record = %event.record_name,
                    record_id = %event.record_id,
                    action = %event.action,
                    error = %err,
                    "change event handler failed; event dropped for this handler"
                );
            }
        }
    }
}
