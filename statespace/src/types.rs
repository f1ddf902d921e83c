//! Core type definitions for statespace
//!
//! These are the identity, position and revision types shared by the
//! node materializer, the mutation engine and the notification router.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shape of a space node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// Keyed entries (a JSON object)
    Object,
    /// Ordered items (a JSON array)
    Array,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Object => write!(f, "object"),
            Kind::Array => write!(f, "array"),
        }
    }
}

/// Where a node is attached within its parent
///
/// The slot is fixed when the node is materialized. List items are
/// re-located by id, never by position, so the slot of an item carries
/// only the id (if the item has one).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Slot {
    /// The top of a tree
    Root,
    /// A keyed entry of an object node
    Field(String),
    /// An item of an array node
    Item {
        /// Value of the item's id field, stringified
        id: Option<String>,
    },
}

impl Slot {
    /// Name of the slot as used in cause labels and error messages
    ///
    /// Items without an id have no stable name and report an empty string.
    pub fn name(&self) -> &str {
        match self {
            Slot::Root => "",
            Slot::Field(key) => key,
            Slot::Item { id } => id.as_deref().unwrap_or(""),
        }
    }

    /// Item id, present only for list items that carry one
    pub fn id(&self) -> Option<&str> {
        match self {
            Slot::Item { id } => id.as_deref(),
            _ => None,
        }
    }

    /// Check if this slot is a list item
    pub fn is_item(&self) -> bool {
        matches!(self, Slot::Item { .. })
    }

    /// Check if this slot is the root of a tree
    pub fn is_root(&self) -> bool {
        matches!(self, Slot::Root)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Root => write!(f, "root"),
            Slot::Field(key) => write!(f, "{}", key),
            Slot::Item { id: Some(id) } => write!(f, "[{}]", id),
            Slot::Item { id: None } => write!(f, "[?]"),
        }
    }
}

/// Revision stamp of a node instance
///
/// Every node produced by the materializer or the mutation engine gets a
/// fresh, monotonically increasing revision. A newer version of a node
/// always has a larger revision than the version it supersedes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Revision(pub u64);

static REVISION_COUNTER: AtomicU64 = AtomicU64::new(1);

impl Revision {
    /// Allocate the next revision
    pub fn next() -> Self {
        Self(REVISION_COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rev:{}", self.0)
    }
}

/// Subscription identifier
///
/// Returned when subscribing an observer to a space, used to later
/// unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

static SUBSCRIPTION_COUNTER: AtomicU64 = AtomicU64::new(1);

impl SubscriptionId {
    /// Create a new unique subscription ID
    pub fn new() -> Self {
        Self(SUBSCRIPTION_COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub:{}", self.0)
    }
}
