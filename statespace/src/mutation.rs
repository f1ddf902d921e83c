//! Mutation engine
//!
//! Applying a patch runs in three phases:
//!
//! 1. **Build**: compute the new node for the target and a new version of
//!    every ancestor, splicing each new child into the latest version of its
//!    parent. All validation happens here; nothing outside the new nodes is
//!    touched, so a failed build leaves the tree as it was.
//! 2. **Commit**: link every superseded node to its successor.
//! 3. **Notify**: walk the levels bottom-up (see [`crate::notify`]).

use crate::config::{MergeStrategy, SpaceConfig};
use crate::error::{Result, SpaceError};
use crate::node::{item_id, Entries, Entry, Materializer, Node};
use crate::notify::{self, compose, Level};
use crate::patch::{Input, Patch};
use crate::space::Space;
use crate::types::{Kind, Slot};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Version links produced by one mutation, applied only once it succeeds
#[derive(Debug, Default)]
pub(crate) struct Commit {
    links: Vec<(Arc<Node>, Arc<Node>)>,
}

impl Commit {
    /// Record that `newer` supersedes `older`
    pub(crate) fn succeed(&mut self, older: &Arc<Node>, newer: &Arc<Node>) {
        self.links.push((older.clone(), newer.clone()));
    }

    pub(crate) fn len(&self) -> usize {
        self.links.len()
    }

    pub(crate) fn apply(self) {
        for (older, newer) in self.links {
            older.link(&newer);
        }
    }
}

/// A committed, not yet notified, mutation
#[derive(Debug)]
pub(crate) struct Applied {
    /// Levels to notify, bottom-up
    pub(crate) levels: Vec<Level>,
    /// Label delivered to `levels[0]`
    pub(crate) label: String,
    /// New version of the target, or of its parent when it was removed
    pub(crate) result: Space,
    /// Whether the target was removed from its parent
    pub(crate) removed: bool,
}

impl Applied {
    /// Run the notification pass for this mutation
    pub(crate) fn notify(&self) {
        notify::notify(&self.levels, &self.label);
    }
}

/// Apply and notify; the common path for direct updates
pub(crate) fn update(space: &Space, patch: Patch, label: &str) -> Result<Space> {
    match apply(space, patch, label)? {
        Some(applied) => {
            applied.notify();
            Ok(applied.result)
        }
        None => Ok(space.clone()),
    }
}

/// Build and commit a patch without notifying
///
/// Returns `None` for [`Patch::Keep`]: no node is produced.
pub(crate) fn apply(space: &Space, patch: Patch, label: &str) -> Result<Option<Applied>> {
    let config = space.config();
    let origin = space.node().clone();
    let mut commit = Commit::default();

    let replacement = match patch {
        Patch::Keep => return Ok(None),
        Patch::Remove => {
            check_removable(space)?;
            None
        }
        Patch::Merge(fields) => {
            let mut m = Materializer::new(config, &mut commit);
            Some(merge(&mut m, &origin, &fields)?)
        }
        Patch::List(items) => {
            let mut m = Materializer::new(config, &mut commit);
            Some(list(&mut m, &origin, &items)?)
        }
        Patch::Replace(value) => {
            let mut m = Materializer::new(config, &mut commit);
            Some(m.materialize(&value, origin.slot().clone(), Some(&origin))?)
        }
    };

    // An item that had an id must keep one to stay locatable
    if let Some(new) = &replacement {
        if origin.slot().id().is_some() && new.slot().id().is_none() {
            return Err(SpaceError::MissingListItemId {
                list: space.parent().map(|parent| parent.name()).unwrap_or_default(),
                field: config.id_field.clone(),
            });
        }
    }

    // Push the change into the latest version of every ancestor
    let mut ancestors: Vec<(Arc<Node>, Arc<Node>)> = Vec::new();
    let mut child_old = origin.clone();
    let mut child_new = replacement.clone();
    let mut parent = space.parent();
    while let Some(handle) = parent {
        let parent_old = handle.node().latest();
        let parent_new = splice(config, &parent_old, &child_old, child_new.as_ref())?;
        commit.succeed(&parent_old, &parent_new);
        ancestors.push((parent_old.clone(), parent_new.clone()));
        child_old = parent_old;
        child_new = Some(parent_new);
        parent = handle.parent();
    }

    let links = commit.len();
    commit.apply();

    // Handles are rebuilt top-down so each level's parent is the level above
    let config = space.config_arc();
    let mut old_parent: Option<Arc<Space>> = None;
    let mut new_parent: Option<Arc<Space>> = None;
    let mut levels = Vec::with_capacity(ancestors.len() + 1);
    for (old, new) in ancestors.iter().rev() {
        let old = Space::from_parts(old.clone(), old_parent.take(), config.clone());
        let new = Space::from_parts(new.clone(), new_parent.take(), config.clone());
        old_parent = Some(Arc::new(old.clone()));
        new_parent = Some(Arc::new(new.clone()));
        levels.push(Level { old, new });
    }
    levels.reverse();

    let removed = replacement.is_none();
    let (label, result) = match replacement {
        Some(new) => {
            let old = Space::from_parts(origin, old_parent, config.clone());
            let new = Space::from_parts(new, new_parent, config);
            levels.insert(0, Level { old, new: new.clone() });
            (label.to_string(), new)
        }
        None => {
            // The removed node's own observers are not called; the parent
            // hears about it under the removed node's name.
            let parent = levels
                .first()
                .map(|level| level.new.clone())
                .ok_or_else(|| SpaceError::UnexpectedRemoval {
                    name: space.name(),
                })?;
            (compose(label, origin.slot(), None), parent)
        }
    };

    tracing::debug!(
        cause = %label,
        revision = %result.revision(),
        levels = levels.len(),
        links,
        removed,
        "space updated"
    );

    Ok(Some(Applied {
        levels,
        label,
        result,
        removed,
    }))
}

fn check_removable(space: &Space) -> Result<()> {
    let removable = match space.node().slot() {
        Slot::Root => false,
        Slot::Field(_) => true,
        Slot::Item { id } => id.is_some(),
    };
    if removable && space.parent().is_some() {
        Ok(())
    } else {
        Err(SpaceError::UnexpectedRemoval { name: space.name() })
    }
}

/// Display name of a node for error messages
fn display_name(config: &SpaceConfig, node: &Node) -> String {
    match node.slot() {
        Slot::Root => config.root_name.clone(),
        slot => slot.name().to_string(),
    }
}

/// Merge keys into an object node
fn merge(m: &mut Materializer<'_>, node: &Arc<Node>, fields: &BTreeMap<String, Input>) -> Result<Arc<Node>> {
    let Entries::Object(current) = node.entries() else {
        return Err(SpaceError::InvalidMergeTarget {
            name: display_name(m.config(), node),
        });
    };

    let recursive = m.config().merge == MergeStrategy::Recursive;
    let mut next = current.clone();
    for (key, input) in fields {
        let slot = Slot::Field(key.clone());
        let prior = current.get(key);

        match (input, prior) {
            (Input::Value(Value::Object(nested)), Some(Entry::Node(child)))
                if recursive && child.kind() == Kind::Object =>
            {
                let nested: BTreeMap<String, Input> = nested
                    .iter()
                    .map(|(k, v)| (k.clone(), Input::Value(v.clone())))
                    .collect();
                let merged = merge(m, child, &nested)?;
                next.insert(key.clone(), Entry::Node(merged));
            }
            _ => match m.input(input, slot, prior)? {
                Some(entry) => {
                    next.insert(key.clone(), entry);
                }
                None => {
                    next.remove(key);
                }
            },
        }
    }

    m.build(node.slot().clone(), Entries::Object(next), Some(node))
}

/// Replace every item of a list node
fn list(m: &mut Materializer<'_>, node: &Arc<Node>, items: &[Input]) -> Result<Arc<Node>> {
    let id_field = m.config().id_field.clone();
    let mut out = Vec::with_capacity(items.len());

    for (index, input) in items.iter().enumerate() {
        match input {
            Input::Remove => continue,
            Input::Space(space) => {
                let child = space.node();
                if node.holds(child) {
                    out.push(Entry::Node(child.clone()));
                    continue;
                }
                let id = child
                    .own_id(&id_field)
                    .ok_or_else(|| SpaceError::MissingListItemId {
                        list: display_name(m.config(), node),
                        field: id_field.clone(),
                    })?;
                out.push(Entry::Node(child.reslot(Slot::Item { id: Some(id) })));
            }
            Input::Value(raw) => {
                let id = item_id(raw, &id_field);
                let prior = node.previous_item(id.as_deref(), index);
                out.push(m.entry(raw, Slot::Item { id }, prior)?);
            }
        }
    }

    m.build(node.slot().clone(), Entries::Array(out), Some(node))
}

/// New version of `parent` with `child` replaced (or removed when `new` is None)
fn splice(
    config: &SpaceConfig,
    parent: &Arc<Node>,
    child: &Arc<Node>,
    new: Option<&Arc<Node>>,
) -> Result<Arc<Node>> {
    let missing = || SpaceError::UnknownLookupTarget {
        id: child.slot().to_string(),
        parent: display_name(config, parent),
    };

    let entries = match (parent.entries(), child.slot()) {
        (Entries::Object(fields), Slot::Field(key)) => {
            let mut next = fields.clone();
            match new {
                Some(new) => {
                    next.insert(key.clone(), Entry::Node(new.clone()));
                }
                None => {
                    next.remove(key);
                }
            }
            Entries::Object(next)
        }
        (Entries::Array(items), _) => {
            let index = parent.position_of(child).ok_or_else(missing)?;
            let mut next = items.clone();
            match new {
                Some(new) => next[index] = Entry::Node(new.clone()),
                None => {
                    next.remove(index);
                }
            }
            let next = Entries::Array(next);
            if let Some(id) = next.duplicate_id() {
                return Err(SpaceError::DuplicateListItemId {
                    list: display_name(config, parent),
                    id: id.to_string(),
                });
            }
            next
        }
        (Entries::Object(_), _) => return Err(missing()),
    };

    Ok(Node::new(parent.slot().clone(), entries, parent.lineage().clone()))
}
