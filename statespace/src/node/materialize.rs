//! Node materializer
//!
//! Decomposes raw JSON containers into nodes. Every object or array entry
//! becomes a child node, primitives stay as frozen leaves, and a child of
//! the previous version is reused unchanged when its snapshot equals the
//! incoming raw value at the same key (or, in lists, the same item id).

use super::{item_id, Entries, Entry, Node};
use crate::config::SpaceConfig;
use crate::error::{type_name, Result, SpaceError};
use crate::mutation::Commit;
use crate::observer::Lineage;
use crate::patch::Input;
use crate::types::Slot;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds nodes for one mutation, recording version links in a [`Commit`]
pub(crate) struct Materializer<'a> {
    config: &'a SpaceConfig,
    commit: &'a mut Commit,
}

impl<'a> Materializer<'a> {
    pub(crate) fn new(config: &'a SpaceConfig, commit: &'a mut Commit) -> Self {
        Self { config, commit }
    }

    pub(crate) fn config(&self) -> &SpaceConfig {
        self.config
    }

    /// Build a fresh node from a raw container value
    ///
    /// `null` becomes an empty object. `previous`, when given, hands its
    /// lineage to the new node and offers its children for reuse.
    pub(crate) fn materialize(
        &mut self,
        raw: &Value,
        slot: Slot,
        previous: Option<&Arc<Node>>,
    ) -> Result<Arc<Node>> {
        let entries = match raw {
            Value::Null => Entries::Object(BTreeMap::new()),
            Value::Object(fields) => {
                let mut out = BTreeMap::new();
                for (key, value) in fields {
                    let prior = previous.and_then(|node| match node.entries() {
                        Entries::Object(prior) => prior.get(key),
                        Entries::Array(_) => None,
                    });
                    let entry = self.entry(value, Slot::Field(key.clone()), prior)?;
                    out.insert(key.clone(), entry);
                }
                Entries::Object(out)
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (index, value) in items.iter().enumerate() {
                    let id = item_id(value, &self.config.id_field);
                    let prior = previous.and_then(|node| node.previous_item(id.as_deref(), index));
                    out.push(self.entry(value, Slot::Item { id }, prior)?);
                }
                Entries::Array(out)
            }
            other => {
                return Err(SpaceError::InvalidSubspaceTarget {
                    key: self.name_of(&slot),
                    found: type_name(other),
                });
            }
        };

        self.build(slot, entries, previous)
    }

    /// Construct a node, continuing the lineage of `previous`
    ///
    /// A list item's id is read from its new entries, never carried over
    /// from `previous`. Lists holding the same id twice are rejected.
    pub(crate) fn build(
        &mut self,
        slot: Slot,
        entries: Entries,
        previous: Option<&Arc<Node>>,
    ) -> Result<Arc<Node>> {
        let slot = match slot {
            Slot::Item { .. } => Slot::Item {
                id: entries.own_id(&self.config.id_field),
            },
            other => other,
        };
        if let Some(id) = entries.duplicate_id() {
            return Err(SpaceError::DuplicateListItemId {
                list: self.name_of(&slot),
                id: id.to_string(),
            });
        }

        let lineage = previous
            .map(|node| node.lineage().clone())
            .unwrap_or_else(Lineage::new);
        let node = Node::new(slot, entries, lineage);
        if let Some(previous) = previous {
            self.commit.succeed(previous, &node);
        }
        Ok(node)
    }

    fn name_of(&self, slot: &Slot) -> String {
        match slot {
            Slot::Root => self.config.root_name.clone(),
            slot => slot.name().to_string(),
        }
    }

    /// Turn one raw value into an entry, reusing `prior` when unchanged
    pub(crate) fn entry(&mut self, raw: &Value, slot: Slot, prior: Option<&Entry>) -> Result<Entry> {
        if !matches!(raw, Value::Object(_) | Value::Array(_)) {
            return Ok(Entry::Leaf(raw.clone()));
        }

        let prior = prior.and_then(Entry::as_node);
        if let Some(node) = prior {
            if *node.slot() == slot && *node.plain() == *raw {
                return Ok(Entry::Node(node.clone()));
            }
        }
        Ok(Entry::Node(self.materialize(raw, slot, prior)?))
    }

    /// Turn a patch input into an entry; `None` means the key is removed
    pub(crate) fn input(
        &mut self,
        input: &Input,
        slot: Slot,
        prior: Option<&Entry>,
    ) -> Result<Option<Entry>> {
        match input {
            Input::Remove | Input::Value(Value::Null) => Ok(None),
            Input::Value(raw) => self.entry(raw, slot, prior).map(Some),
            Input::Space(space) => Ok(Some(Entry::Node(space.node().reslot(slot)))),
        }
    }
}
