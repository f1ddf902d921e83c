//! Immutable space nodes
//!
//! A [`Node`] is one version of an object- or array-shaped piece of state.
//! Nodes are never mutated after construction: a change always produces a
//! brand-new node that shares every untouched child with its predecessor.
//!
//! Two pieces of state outlive a single node instance:
//!
//! - the [`Lineage`], which holds observer registrations and is handed from
//!   each version to the next;
//! - the forward-only `next` pointer, which links a node to the version that
//!   superseded it.
//!
//! Nodes never point upward. The parent relation lives in the [`Space`]
//! handle that reached the node, so the ownership graph stays acyclic.
//!
//! [`Space`]: crate::Space

mod materialize;

pub(crate) use materialize::Materializer;

use crate::observer::Lineage;
use crate::types::{Kind, Revision, Slot};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// One entry of a node: a frozen primitive or a child node
#[derive(Clone)]
pub(crate) enum Entry {
    Leaf(Value),
    Node(Arc<Node>),
}

impl Entry {
    /// Plain value of this entry
    pub(crate) fn to_value(&self) -> Value {
        match self {
            Entry::Leaf(value) => value.clone(),
            Entry::Node(node) => (*node.plain()).clone(),
        }
    }

    pub(crate) fn as_node(&self) -> Option<&Arc<Node>> {
        match self {
            Entry::Node(node) => Some(node),
            Entry::Leaf(_) => None,
        }
    }
}

/// Entries of a node, keyed or ordered
#[derive(Clone)]
pub(crate) enum Entries {
    Object(BTreeMap<String, Entry>),
    Array(Vec<Entry>),
}

impl Entries {
    pub(crate) fn kind(&self) -> Kind {
        match self {
            Entries::Object(_) => Kind::Object,
            Entries::Array(_) => Kind::Array,
        }
    }

    /// Value of the id field among object entries, stringified
    pub(crate) fn own_id(&self, id_field: &str) -> Option<String> {
        match self {
            Entries::Object(fields) => match fields.get(id_field) {
                Some(Entry::Leaf(value)) => id_of(value),
                _ => None,
            },
            Entries::Array(_) => None,
        }
    }

    /// First item id that appears more than once
    pub(crate) fn duplicate_id(&self) -> Option<&str> {
        let Entries::Array(items) = self else {
            return None;
        };
        let mut seen = HashSet::new();
        items
            .iter()
            .filter_map(|entry| entry.as_node()?.slot.id())
            .find(|id| !seen.insert(*id))
    }
}

/// An immutable version of an object or array
pub(crate) struct Node {
    slot: Slot,
    entries: Entries,
    lineage: Arc<Lineage>,
    revision: Revision,
    next: Mutex<Option<Arc<Node>>>,
    plain: OnceCell<Arc<Value>>,
}

impl Node {
    pub(crate) fn new(slot: Slot, entries: Entries, lineage: Arc<Lineage>) -> Arc<Node> {
        Arc::new(Node {
            slot,
            entries,
            lineage,
            revision: Revision::next(),
            next: Mutex::new(None),
            plain: OnceCell::new(),
        })
    }

    /// An empty object node with a fresh lineage
    pub(crate) fn empty(slot: Slot) -> Arc<Node> {
        Node::new(slot, Entries::Object(BTreeMap::new()), Lineage::new())
    }

    pub(crate) fn kind(&self) -> Kind {
        self.entries.kind()
    }

    pub(crate) fn slot(&self) -> &Slot {
        &self.slot
    }

    pub(crate) fn entries(&self) -> &Entries {
        &self.entries
    }

    pub(crate) fn lineage(&self) -> &Arc<Lineage> {
        &self.lineage
    }

    pub(crate) fn revision(&self) -> Revision {
        self.revision
    }

    /// Plain JSON snapshot of this node and its descendants
    ///
    /// Computed once per node instance; repeated calls return the same `Arc`.
    pub(crate) fn plain(&self) -> Arc<Value> {
        self.plain
            .get_or_init(|| {
                let value = match &self.entries {
                    Entries::Object(fields) => Value::Object(
                        fields
                            .iter()
                            .map(|(key, entry)| (key.clone(), entry.to_value()))
                            .collect::<Map<String, Value>>(),
                    ),
                    Entries::Array(items) => {
                        Value::Array(items.iter().map(Entry::to_value).collect())
                    }
                };
                Arc::new(value)
            })
            .clone()
    }

    /// Value of this node's id field, stringified
    pub(crate) fn own_id(&self, id_field: &str) -> Option<String> {
        self.entries.own_id(id_field)
    }

    /// Locate a child item of an array node by id
    pub(crate) fn find_item(&self, id: &str) -> Option<(usize, &Arc<Node>)> {
        let Entries::Array(items) = &self.entries else {
            return None;
        };
        items.iter().enumerate().find_map(|(index, entry)| match entry {
            Entry::Node(node) if node.slot.id() == Some(id) => Some((index, node)),
            _ => None,
        })
    }

    /// Position of `child` among this array node's items
    ///
    /// Matches the exact instance first, then any item with the same id, so
    /// a stale version of an item still finds its current position.
    pub(crate) fn position_of(&self, child: &Arc<Node>) -> Option<usize> {
        let Entries::Array(items) = &self.entries else {
            return None;
        };
        items
            .iter()
            .position(|entry| matches!(entry, Entry::Node(node) if Arc::ptr_eq(node, child)))
            .or_else(|| {
                let id = child.slot.id()?;
                self.find_item(id).map(|(index, _)| index)
            })
    }

    /// Entry that a new list item should be compared against
    ///
    /// Items with an id are matched by id; items without one by position.
    pub(crate) fn previous_item(&self, id: Option<&str>, index: usize) -> Option<&Entry> {
        let Entries::Array(items) = &self.entries else {
            return None;
        };
        match id {
            Some(id) => items
                .iter()
                .find(|entry| matches!(entry, Entry::Node(node) if node.slot.id() == Some(id))),
            None => items
                .get(index)
                .filter(|entry| matches!(entry, Entry::Node(node) if node.slot.id().is_none())),
        }
    }

    /// Check if `candidate` is one of this node's direct children
    pub(crate) fn holds(&self, candidate: &Arc<Node>) -> bool {
        let same = |entry: &Entry| matches!(entry, Entry::Node(node) if Arc::ptr_eq(node, candidate));
        match &self.entries {
            Entries::Object(fields) => fields.values().any(same),
            Entries::Array(items) => items.iter().any(same),
        }
    }

    /// The same node attached at a different slot
    ///
    /// Returns the node itself when the slot already matches, so adopting a
    /// child in place keeps its identity.
    pub(crate) fn reslot(self: &Arc<Self>, slot: Slot) -> Arc<Node> {
        if self.slot == slot {
            return self.clone();
        }
        Node::new(slot, self.entries.clone(), self.lineage.clone())
    }

    /// Follow the version chain to its end
    pub(crate) fn latest(self: &Arc<Self>) -> Arc<Node> {
        let mut current = self.clone();
        loop {
            let next = current.next.lock().clone();
            match next {
                Some(next) => current = next,
                None => return current,
            }
        }
    }

    /// Append `newer` to the end of this node's version chain
    pub(crate) fn link(self: &Arc<Self>, newer: &Arc<Node>) {
        let tail = self.latest();
        if Arc::ptr_eq(&tail, newer) {
            return;
        }
        debug_assert!(newer.revision > tail.revision, "version chain must move forward");
        *tail.next.lock() = Some(newer.clone());
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("slot", &self.slot)
            .field("kind", &self.kind())
            .field("revision", &self.revision)
            .finish()
    }
}

/// Stringified id of a raw value, if it has one
pub(crate) fn id_of(value: &Value) -> Option<String> {
    match value {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Id of a raw list item
pub(crate) fn item_id(raw: &Value, id_field: &str) -> Option<String> {
    raw.as_object()
        .and_then(|fields| fields.get(id_field))
        .and_then(id_of)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf(value: Value) -> Entry {
        Entry::Leaf(value)
    }

    fn item(id: &str) -> Arc<Node> {
        let mut fields = BTreeMap::new();
        fields.insert("id".to_string(), leaf(json!(id)));
        Node::new(
            Slot::Item { id: Some(id.into()) },
            Entries::Object(fields),
            Lineage::new(),
        )
    }

    #[test]
    fn test_plain_is_cached() {
        let mut fields = BTreeMap::new();
        fields.insert("a".to_string(), leaf(json!(1)));
        let node = Node::new(Slot::Root, Entries::Object(fields), Lineage::new());

        let first = node.plain();
        let second = node.plain();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, json!({ "a": 1 }));
    }

    #[test]
    fn test_version_chain() {
        let v1 = Node::empty(Slot::Root);
        let v2 = Node::empty(Slot::Root);
        let v3 = Node::empty(Slot::Root);

        v1.link(&v2);
        // Linking from a stale version appends at the end of the chain
        v1.link(&v3);

        assert!(Arc::ptr_eq(&v1.latest(), &v3));
        assert!(Arc::ptr_eq(&v2.latest(), &v3));
        assert!(Arc::ptr_eq(&v3.latest(), &v3));
    }

    #[test]
    fn test_position_falls_back_to_id() {
        let a = item("a");
        let b = item("b");
        let list = Node::new(
            Slot::Field("list".into()),
            Entries::Array(vec![Entry::Node(a.clone()), Entry::Node(b.clone())]),
            Lineage::new(),
        );

        assert_eq!(list.position_of(&b), Some(1));

        // A different instance with the same id still resolves
        let stale_b = item("b");
        assert_eq!(list.position_of(&stale_b), Some(1));

        let missing = item("zzz");
        assert_eq!(list.position_of(&missing), None);
    }

    #[test]
    fn test_reslot_keeps_identity_when_unchanged() {
        let node = item("a");
        let same = node.reslot(Slot::Item { id: Some("a".into()) });
        assert!(Arc::ptr_eq(&node, &same));

        let moved = node.reslot(Slot::Field("chosen".into()));
        assert!(!Arc::ptr_eq(&node, &moved));
        assert!(Arc::ptr_eq(node.lineage(), moved.lineage()));
    }

    #[test]
    fn test_duplicate_ids_are_found() {
        let unique = Entries::Array(vec![Entry::Node(item("a")), Entry::Node(item("b")), leaf(json!(1))]);
        assert_eq!(unique.duplicate_id(), None);

        let twice = Entries::Array(vec![Entry::Node(item("a")), Entry::Node(item("b")), Entry::Node(item("a"))]);
        assert_eq!(twice.duplicate_id(), Some("a"));
    }

    #[test]
    fn test_item_ids() {
        assert_eq!(item_id(&json!({ "id": "x" }), "id"), Some("x".into()));
        assert_eq!(item_id(&json!({ "id": 7 }), "id"), Some("7".into()));
        assert_eq!(item_id(&json!({ "id": true }), "id"), None);
        assert_eq!(item_id(&json!({ "key": "k" }), "key"), Some("k".into()));
        assert_eq!(item_id(&json!("x"), "id"), None);
    }
}
