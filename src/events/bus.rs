//! In-process publish/subscribe mediator.
//!
//! Handlers run synchronously on the publisher's thread, in subscription
//! order. A subscription lives exactly as long as its [`Subscription`] handle.

use std::sync::{Arc, RwLock, Weak};

use anyhow::Result;

use super::Event;

/// Receives events published on an [`EventBus`].
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &Event) -> Result<()>;
}

impl<F> EventHandler for F
where
    F: Fn(&Event) -> Result<()> + Send + Sync,
{
    fn handle(&self, event: &Event) -> Result<()> {
        self(event)
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: Vec<(u64, Arc<dyn EventHandler>)>,
}

/// Cloneable handle to a shared bus.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<RwLock<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler`. It stays registered until the returned handle is
    /// dropped or [`Subscription::unsubscribe`] is called.
    pub fn subscribe(&self, handler: Arc<dyn EventHandler>) -> Subscription {
        let mut registry = self.registry.write().unwrap_or_else(|e| e.into_inner());
        registry.next_id += 1;
        let id = registry.next_id;
        registry.handlers.push((id, handler));
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver `event` to every current subscriber.
    ///
    /// A failing handler is logged and does not stop delivery to the rest.
    pub fn publish(&self, event: &Event) {
        let handlers: Vec<Arc<dyn EventHandler>> = {
            let registry = self.registry.read().unwrap_or_else(|e| e.into_inner());
            registry
                .handlers
                .iter()
                .map(|(_, handler)| Arc::clone(handler))
                .collect()
        };
        for handler in handlers {
            if let Err(e) = handler.handle(event) {
                tracing::warn!(event = event.kind(), error = %e, "Event handler failed");
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .handlers
            .len()
    }
}

/// Registration handle returned by [`EventBus::subscribe`].
#[must_use = "dropping a Subscription unsubscribes the handler"]
pub struct Subscription {
    id: u64,
    registry: Weak<RwLock<Registry>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the handler now.
    pub fn unsubscribe(self) {}

    fn remove(&self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = registry.write().unwrap_or_else(|e| e.into_inner());
            registry.handlers.retain(|(id, _)| *id != self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
