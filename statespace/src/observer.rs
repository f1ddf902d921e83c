//! Observer registration and change records
//!
//! Observers are attached to a node's [`Lineage`], the storage shared by
//! every version descended from one node, so a subscription survives the
//! replacement of the snapshot it was registered on.

use crate::space::Space;
use crate::types::SubscriptionId;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Weak};

/// A change delivered to observers
#[derive(Debug, Clone)]
pub struct Change {
    /// The new version (or an earlier observer's replacement)
    pub new: Space,
    /// The version that was current before the change
    pub old: Space,
    /// Causal label, e.g. `todos[abc]#toggle`
    pub cause: String,
}

/// What an observer wants to happen next
#[derive(Debug, Clone)]
pub enum Flow {
    /// Keep notifying
    Continue,
    /// Hand this space to the remaining observers at this level as `new`
    Replace(Space),
    /// Stop: no further observers at this level, no propagation upward
    Stop,
}

/// Trait for receiving changes
///
/// Implementations are called synchronously, in registration order, on the
/// thread that performed the mutation.
pub trait Observer: Send + Sync {
    /// Called once per change that reaches the observed space
    fn on_change(&self, change: &Change) -> Flow;
}

impl<F> Observer for F
where
    F: Fn(&Change) -> Flow + Send + Sync,
{
    fn on_change(&self, change: &Change) -> Flow {
        self(change)
    }
}

/// One change seen by a [`CollectingObserver`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeRecord {
    /// Causal label of the change
    pub cause: String,
    /// Plain value of the new version
    pub value: Value,
}

/// An observer that records every change it sees
///
/// Clones share the same record list, so one clone can be subscribed while
/// another is kept for inspection.
#[derive(Debug, Clone, Default)]
pub struct CollectingObserver {
    records: Arc<Mutex<Vec<ChangeRecord>>>,
}

impl CollectingObserver {
    /// Create a new collecting observer
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the collected records, leaving the observer empty
    pub fn take(&self) -> Vec<ChangeRecord> {
        std::mem::take(&mut *self.records.lock())
    }

    /// Causal labels collected so far
    pub fn causes(&self) -> Vec<String> {
        self.records.lock().iter().map(|r| r.cause.clone()).collect()
    }

    /// Number of collected records
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Check if nothing was collected
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl Observer for CollectingObserver {
    fn on_change(&self, change: &Change) -> Flow {
        self.records.lock().push(ChangeRecord {
            cause: change.cause.clone(),
            value: change.new.to_plain_value(),
        });
        Flow::Continue
    }
}

/// Observer storage shared by all versions of one node
#[derive(Default)]
pub(crate) struct Lineage {
    observers: Mutex<Vec<(SubscriptionId, Arc<dyn Observer>)>>,
}

impl Lineage {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn subscribe(&self, observer: Arc<dyn Observer>) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.observers.lock().push((id, observer));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Registered observers in registration order
    ///
    /// The lock is released before any observer runs, so observers may
    /// subscribe, unsubscribe or mutate re-entrantly.
    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn Observer>> {
        self.observers
            .lock()
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.lock().len()
    }
}

impl fmt::Debug for Lineage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lineage")
            .field("observers", &self.len())
            .finish()
    }
}

/// Handle returned by [`Space::subscribe`]
///
/// Dropping the handle keeps the observer registered; call
/// [`unsubscribe`](Subscription::unsubscribe) to remove it.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: SubscriptionId,
    lineage: Weak<Lineage>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, lineage: &Arc<Lineage>) -> Self {
        Self {
            id,
            lineage: Arc::downgrade(lineage),
        }
    }

    /// Identifier of this registration
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove the observer; returns false if it was already removed
    pub fn unsubscribe(&self) -> bool {
        self.lineage
            .upgrade()
            .map(|lineage| lineage.unsubscribe(self.id))
            .unwrap_or(false)
    }
}
