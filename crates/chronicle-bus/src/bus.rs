//! The publish/subscribe bus.
//!
//! Handlers are registered per topic and invoked in registration order.
//! Dispatch is synchronous within the publishing call: `publish` awaits each
//! handler's future before moving to the next, so the publisher knows all
//! reactions (including their async I/O) have run by the time it returns.
//! A handler returning an error is logged and does not block delivery to
//! sibling handlers on the same topic.
//!
//! One bus instance is created at process start and passed by reference to
//! every component that needs it; tests construct an isolated bus per case.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::future::BoxFuture;
use tracing::{debug, error, warn};

use chronicle_types::{Topic, TopicPayload};

use crate::envelope::{BusLimits, Envelope};
use crate::error::BusError;

/// A registered handler. Errors are opaque to the bus: it logs them and
/// moves on, because one handler's failure must not prevent delivery to
/// the others.
type Handler = Arc<dyn Fn(Envelope) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Token returned by [`EventBus::subscribe`], used to unsubscribe.
///
/// Closures are not comparable, so removal goes through this token rather
/// than through handler identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Handler registry guarded by one mutex. The lock is held only while
/// registering or while cloning the handler list out for a dispatch, never
/// across a handler invocation -- handlers may themselves publish.
struct Registry {
    next_id: u64,
    handlers: BTreeMap<Topic, Vec<(SubscriptionId, Handler)>>,
}

/// The in-process publish/subscribe bus.
pub struct EventBus {
    limits: BusLimits,
    registry: Mutex<Registry>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(BusLimits::default())
    }
}

impl EventBus {
    /// Create a bus with the given guard ceilings.
    pub const fn new(limits: BusLimits) -> Self {
        Self {
            limits,
            registry: Mutex::new(Registry {
                next_id: 0,
                handlers: BTreeMap::new(),
            }),
        }
    }

    /// The configured guard ceilings.
    pub const fn limits(&self) -> BusLimits {
        self.limits
    }

    /// Register a handler for a topic. Multiple handlers per topic are
    /// allowed and independent; they are invoked in registration order.
    pub fn subscribe<F, Fut>(&self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: Fn(Envelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let boxed: Handler = Arc::new(move |envelope| Box::pin(handler(envelope)));
        let Ok(mut registry) = self.registry.lock() else {
            // A poisoned registry means a subscriber panicked while holding
            // the lock; with panics denied workspace-wide this is unreachable
            // in practice, but the API stays total.
            error!(topic = %topic, "bus registry poisoned, subscription dropped");
            return SubscriptionId(u64::MAX);
        };
        registry.next_id = registry.next_id.saturating_add(1);
        let id = SubscriptionId(registry.next_id);
        registry.handlers.entry(topic).or_default().push((id, boxed));
        debug!(topic = %topic, subscription = id.0, "handler subscribed");
        id
    }

    /// Remove a handler by its subscription token. Returns whether a
    /// handler was actually removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let Ok(mut registry) = self.registry.lock() else {
            return false;
        };
        for handlers in registry.handlers.values_mut() {
            let before = handlers.len();
            handlers.retain(|(sub_id, _)| *sub_id != id);
            if handlers.len() < before {
                return true;
            }
        }
        false
    }

    /// Publish a payload, dispatching synchronously to every handler
    /// registered for the payload's topic.
    ///
    /// Guards run before any handler: a hop count at or above the ceiling,
    /// or a serialized payload above the size ceiling, rejects the publish
    /// outright. Root events publish with `hop_count = 0`; handlers that
    /// republish in direct reaction to an incoming envelope must pass
    /// [`Envelope::next_hop`].
    ///
    /// Returns whether any handler existed for the topic.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::HopLimitExceeded`] or [`BusError::PayloadTooLarge`]
    /// when a guard fires; both are fatal programming errors, never retried.
    pub async fn publish(
        &self,
        payload: TopicPayload,
        hop_count: u8,
    ) -> Result<bool, BusError> {
        let topic = payload.topic();

        if hop_count >= self.limits.max_hops {
            return Err(BusError::HopLimitExceeded {
                hop_count,
                max_hops: self.limits.max_hops,
                topic: topic.as_str(),
            });
        }

        let bytes = serde_json::to_vec(&payload)?.len();
        if bytes > self.limits.max_payload_bytes {
            return Err(BusError::PayloadTooLarge {
                bytes,
                max_bytes: self.limits.max_payload_bytes,
                topic: topic.as_str(),
            });
        }

        // Clone the handler list out of the lock so handlers are free to
        // subscribe or publish while dispatch is in progress.
        let handlers: Vec<(SubscriptionId, Handler)> = {
            let Ok(registry) = self.registry.lock() else {
                error!(topic = %topic, "bus registry poisoned, publish dropped");
                return Ok(false);
            };
            registry.handlers.get(&topic).cloned().unwrap_or_default()
        };

        let envelope = Envelope {
            topic,
            payload,
            timestamp: Utc::now(),
            hop_count,
        };

        debug!(
            topic = %topic,
            hop_count,
            payload_bytes = bytes,
            handlers = handlers.len(),
            "dispatching"
        );

        let delivered = !handlers.is_empty();
        for (id, handler) in handlers {
            if let Err(e) = handler(envelope.clone()).await {
                // Handler failures are contained: log and keep delivering.
                warn!(
                    topic = %topic,
                    subscription = id.0,
                    hop_count,
                    error = %e,
                    "handler failed, continuing dispatch"
                );
            }
        }

        Ok(delivered)
    }
}
