//! Handler registration system.
//!
//! The registry maps every [`EventKind`] to the single handler that applies it.

use std::collections::HashMap;
use std::sync::Arc;

use super::traits::EventHandler;
use crate::decoding::events::EventKind;

/// Registry of all transformation handlers, built at startup.
pub struct TransformationRegistry {
    event_handlers: HashMap<EventKind, Arc<dyn EventHandler>>,
    handler_count: usize,
}

impl TransformationRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            event_handlers: HashMap::new(),
            handler_count: 0,
        }
    }

    /// Register an event handler for all of its triggers.
    ///
    /// A later registration for the same kind replaces the earlier one.
    pub fn register_event_handler<H: EventHandler + 'static>(&mut self, handler: H) {
        let handler: Arc<dyn EventHandler> = Arc::new(handler);

        for kind in handler.triggers() {
            if let Some(previous) = self.event_handlers.insert(kind, handler.clone()) {
                tracing::warn!(
                    "Handler {} replaces {} for {:?}",
                    handler.name(),
                    previous.name(),
                    kind
                );
            }
        }

        self.handler_count += 1;
    }

    pub fn handler_for(&self, kind: EventKind) -> Option<&Arc<dyn EventHandler>> {
        self.event_handlers.get(&kind)
    }

    /// Event kinds without a registered handler.
    pub fn unhandled_kinds(&self) -> Vec<EventKind> {
        EventKind::ALL
            .into_iter()
            .filter(|kind| !self.event_handlers.contains_key(kind))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.event_handlers.is_empty()
    }

    /// Get count of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handler_count
    }
}

impl Default for TransformationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the transformation registry with all handlers.
pub fn build_registry() -> TransformationRegistry {
    let mut registry = TransformationRegistry::new();

    super::event::register_handlers(&mut registry);

    let unhandled = registry.unhandled_kinds();
    if !unhandled.is_empty() {
        tracing::warn!("No handler registered for {:?}", unhandled);
    }

    tracing::info!(
        "Built transformation registry with {} handlers covering {} event kinds",
        registry.handler_count(),
        EventKind::ALL.len() - unhandled.len()
    );

    registry
}
