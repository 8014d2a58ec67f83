// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Topology change listeners
//!
//! Listeners are called synchronously, in registration order, for every
//! committed structural change. A failing listener does not undo the change;
//! failures are collected and handed back to the committing caller.

use super::edge_label::EdgeLabel;
use super::edge_role::EdgeRole;
use super::label::{Index, LabelId, Partition};
use super::property::PropertyColumn;
use super::vertex_label::VertexLabel;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopologyChangeAction {
    Create,
    Update,
    Delete,
}

impl fmt::Display for TopologyChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopologyChangeAction::Create => write!(f, "CREATE"),
            TopologyChangeAction::Update => write!(f, "UPDATE"),
            TopologyChangeAction::Delete => write!(f, "DELETE"),
        }
    }
}

/// The structural entity an event is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyElement {
    Schema(String),
    VertexLabel(Arc<VertexLabel>),
    EdgeLabel(Arc<EdgeLabel>),
    Property { label: LabelId, column: PropertyColumn },
    Index { label: LabelId, index: Index },
    Partition { label: LabelId, partition: Partition },
    EdgeRole(EdgeRole),
}

impl TopologyElement {
    /// Short name of the element for logs
    pub fn describe(&self) -> String {
        match self {
            TopologyElement::Schema(name) => format!("schema {}", name),
            TopologyElement::VertexLabel(label) => format!("vertex label {}", label.core.id),
            TopologyElement::EdgeLabel(label) => format!("edge label {}", label.core.id),
            TopologyElement::Property { label, column } => {
                format!("property {}.{}", label, column.name())
            }
            TopologyElement::Index { label, index } => format!("index {} on {}", index.name, label),
            TopologyElement::Partition { label, partition } => {
                format!("partition {} of {}", partition.name, label)
            }
            TopologyElement::EdgeRole(role) => format!("edge role {}", role.name()),
        }
    }
}

/// One committed change. For updates `old` holds the previous snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyEvent {
    pub action: TopologyChangeAction,
    pub element: TopologyElement,
    pub old: Option<TopologyElement>,
}

impl TopologyEvent {
    pub fn create(element: TopologyElement) -> Self {
        Self {
            action: TopologyChangeAction::Create,
            element,
            old: None,
        }
    }

    pub fn update(element: TopologyElement, old: TopologyElement) -> Self {
        Self {
            action: TopologyChangeAction::Update,
            element,
            old: Some(old),
        }
    }

    pub fn delete(element: TopologyElement) -> Self {
        Self {
            action: TopologyChangeAction::Delete,
            element,
            old: None,
        }
    }
}

impl fmt::Display for TopologyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.element.describe())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Listener {listener} failed on {event}: {message}")]
pub struct ListenerError {
    pub listener: String,
    pub event: String,
    pub message: String,
}

/// Callback for committed topology changes
pub trait TopologyListener: Send + Sync {
    fn on_change(&self, event: &TopologyEvent) -> Result<(), String>;

    fn name(&self) -> &str {
        "anonymous"
    }
}

impl<F> TopologyListener for F
where
    F: Fn(&TopologyEvent) -> Result<(), String> + Send + Sync,
{
    fn on_change(&self, event: &TopologyEvent) -> Result<(), String> {
        self(event)
    }
}

/// Ordered set of listeners owned by one topology
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<Vec<Arc<dyn TopologyListener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: Arc<dyn TopologyListener>) {
        self.listeners.write().push(listener);
    }

    /// Remove a listener by identity
    pub fn unregister(&self, listener: &Arc<dyn TopologyListener>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|registered| !Arc::ptr_eq(registered, listener));
        listeners.len() != before
    }

    pub fn clear(&self) {
        self.listeners.write().clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Deliver every event to every listener, collecting failures
    pub fn fire(&self, events: &[TopologyEvent]) -> Vec<ListenerError> {
        let listeners = self.listeners.read().clone();
        let mut errors = Vec::new();
        for event in events {
            for listener in &listeners {
                if let Err(message) = listener.on_change(event) {
                    log::warn!(
                        "Topology listener {} failed on {}: {}",
                        listener.name(),
                        event,
                        message
                    );
                    errors.push(ListenerError {
                        listener: listener.name().to_string(),
                        event: event.to_string(),
                        message,
                    });
                }
            }
        }
        errors
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_fire_in_registration_order() {
        let registry = ListenerRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let seen = seen.clone();
            registry.register(Arc::new(move |_: &TopologyEvent| -> Result<(), String> {
                seen.lock().push(tag);
                Ok(())
            }));
        }
        let errors = registry.fire(&[TopologyEvent::create(TopologyElement::Schema(
            "s".to_string(),
        ))]);
        assert!(errors.is_empty());
        assert_eq!(*seen.lock(), vec!["first", "second"]);
    }

    #[test]
    fn test_failures_are_collected_and_later_listeners_still_run() {
        let registry = ListenerRegistry::new();
        let calls = Arc::new(Mutex::new(0));
        registry.register(Arc::new(|_: &TopologyEvent| -> Result<(), String> {
            Err("boom".to_string())
        }));
        let counter = calls.clone();
        registry.register(Arc::new(move |_: &TopologyEvent| -> Result<(), String> {
            *counter.lock() += 1;
            Ok(())
        }));
        let errors = registry.fire(&[TopologyEvent::delete(TopologyElement::Schema(
            "s".to_string(),
        ))]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "boom");
        assert_eq!(*calls.lock(), 1);
    }

    #[test]
    fn test_unregister() {
        let registry = ListenerRegistry::new();
        let listener: Arc<dyn TopologyListener> =
            Arc::new(|_: &TopologyEvent| -> Result<(), String> { Ok(()) });
        registry.register(listener.clone());
        assert_eq!(registry.len(), 1);
        assert!(registry.unregister(&listener));
        assert!(registry.is_empty());
    }
}
