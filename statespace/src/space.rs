//! The public space handle
//!
//! A [`Space`] is a node together with the path it was reached through.
//! Handles are cheap to clone and never change: every mutation returns a new
//! handle, and [`Space::latest`] fast-forwards a stale one.

use crate::action::{Action, ActionContext, ActionOutcome, AsyncAction, StepAction};
use crate::config::SpaceConfig;
use crate::error::{type_name, Result, SpaceError};
use crate::field::FieldSetter;
use crate::mutation::{self, Commit};
use crate::node::{Entries, Entry, Materializer, Node};
use crate::notify::action_label;
use crate::observer::{Observer, Subscription};
use crate::patch::{Input, Patch};
use crate::types::{Kind, Revision, Slot, SubscriptionId};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Label used when an update carries no action name
pub const UNKNOWN_ACTION: &str = "unknown";

/// An immutable, observable view of one object or array in a state tree
#[derive(Clone)]
pub struct Space {
    node: Arc<Node>,
    parent: Option<Arc<Space>>,
    config: Arc<SpaceConfig>,
}

impl Space {
    /// Build a root space with the default configuration
    ///
    /// `null` becomes an empty object; primitives are rejected.
    pub fn create(initial: Value) -> Result<Self> {
        Self::with_config(initial, SpaceConfig::default())
    }

    /// Build a root space with an explicit configuration
    pub fn with_config(initial: Value, config: SpaceConfig) -> Result<Self> {
        let mut commit = Commit::default();
        let node = Materializer::new(&config, &mut commit).materialize(&initial, Slot::Root, None)?;
        commit.apply();

        tracing::debug!(revision = %node.revision(), kind = %node.kind(), "space created");
        Ok(Self::from_parts(node, None, Arc::new(config)))
    }

    pub(crate) fn from_parts(
        node: Arc<Node>,
        parent: Option<Arc<Space>>,
        config: Arc<SpaceConfig>,
    ) -> Self {
        Self {
            node,
            parent,
            config,
        }
    }

    pub(crate) fn node(&self) -> &Arc<Node> {
        &self.node
    }

    pub(crate) fn config_arc(&self) -> Arc<SpaceConfig> {
        self.config.clone()
    }

    fn descend(&self, node: Arc<Node>) -> Space {
        Space::from_parts(node, Some(Arc::new(self.clone())), self.config.clone())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Configuration shared by the whole tree
    pub fn config(&self) -> &SpaceConfig {
        &self.config
    }

    /// Object or array
    pub fn kind(&self) -> Kind {
        self.node.kind()
    }

    /// Name of this space within its parent
    ///
    /// The root reports the configured root name; a list item reports its id,
    /// or its current position when it has none.
    pub fn name(&self) -> String {
        match self.node.slot() {
            Slot::Root => self.config.root_name.clone(),
            Slot::Field(key) => key.clone(),
            Slot::Item { id: Some(id) } => id.clone(),
            Slot::Item { id: None } => self
                .parent
                .as_ref()
                .and_then(|parent| parent.node.position_of(&self.node))
                .map(|index| index.to_string())
                .unwrap_or_default(),
        }
    }

    /// Id of a list item, the only way to re-locate it later
    pub fn key(&self) -> Option<&str> {
        self.node.slot().id()
    }

    /// Frozen plain snapshot
    ///
    /// Repeated calls on the same handle return the same `Arc`.
    pub fn value(&self) -> Arc<Value> {
        self.node.plain()
    }

    /// Owned plain copy of the snapshot, with no space references
    pub fn to_plain_value(&self) -> Value {
        (*self.node.plain()).clone()
    }

    /// Revision of the node behind this handle
    pub fn revision(&self) -> Revision {
        self.node.revision()
    }

    /// Check if two handles refer to the same node instance
    pub fn ptr_eq(&self, other: &Space) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    /// Handle of the parent this space was reached through
    pub fn parent(&self) -> Option<Space> {
        self.parent.as_deref().cloned()
    }

    /// Check if this is the top of its tree
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Sub-space under `key`
    ///
    /// A missing or `null` key yields an empty object space that attaches
    /// itself on first update. On a list, `key` is a position.
    pub fn child(&self, key: &str) -> Result<Space> {
        let entry = match self.node.entries() {
            Entries::Object(fields) => fields.get(key),
            Entries::Array(items) => key.parse::<usize>().ok().and_then(|index| items.get(index)),
        };

        match (entry, self.kind()) {
            (Some(Entry::Node(node)), _) => Ok(self.descend(node.clone())),
            (Some(Entry::Leaf(Value::Null)) | None, Kind::Object) => {
                Ok(self.descend(Node::empty(Slot::Field(key.to_string()))))
            }
            (None, Kind::Array) => Err(SpaceError::UnknownLookupTarget {
                id: key.to_string(),
                parent: self.name(),
            }),
            (Some(Entry::Leaf(other)), _) => Err(SpaceError::InvalidSubspaceTarget {
                key: key.to_string(),
                found: type_name(other),
            }),
        }
    }

    /// List item with the given id
    pub fn item(&self, id: &str) -> Result<Space> {
        if self.kind() != Kind::Array {
            return Err(SpaceError::NotAList { name: self.name() });
        }
        let (_, node) = self
            .node
            .find_item(id)
            .ok_or_else(|| SpaceError::UnknownLookupTarget {
                id: id.to_string(),
                parent: self.name(),
            })?;
        Ok(self.descend(node.clone()))
    }

    /// Sub-spaces of every container item of a list, in order
    ///
    /// Primitive items are not spaces and are skipped.
    pub fn items(&self) -> Result<Vec<Space>> {
        let Entries::Array(items) = self.node.entries() else {
            return Err(SpaceError::NotAList { name: self.name() });
        };
        Ok(items
            .iter()
            .filter_map(Entry::as_node)
            .map(|node| self.descend(node.clone()))
            .collect())
    }

    /// Follow a path such as `todos[abc].tags` or `["my key"].x`
    ///
    /// `[n]` selects the item with id `n`, falling back to position `n` when
    /// no item carries that id.
    pub fn at(&self, path: &str) -> Result<Space> {
        let steps = parse_path(path).ok_or_else(|| SpaceError::UnknownLookupTarget {
            id: path.to_string(),
            parent: self.name(),
        })?;

        let mut current = self.clone();
        for step in steps {
            current = match step {
                Step::Field(key) => current.child(&key)?,
                Step::Item(id) => match current.item(&id) {
                    Ok(found) => found,
                    Err(err) if id.parse::<usize>().is_ok() && current.kind() == Kind::Array => {
                        current.child(&id).map_err(|_| err)?
                    }
                    Err(err) => return Err(err),
                },
            };
        }
        Ok(current)
    }

    // ========================================================================
    // Versioning
    // ========================================================================

    /// Current version of this space, with every ancestor also current
    pub fn latest(&self) -> Space {
        Space {
            node: self.node.latest(),
            parent: self.parent.as_ref().map(|parent| Arc::new(parent.latest())),
            config: self.config.clone(),
        }
    }

    /// Current version of the root of this space's tree
    pub fn root(&self) -> Space {
        let mut top = self;
        while let Some(parent) = &top.parent {
            top = &**parent;
        }
        top.latest()
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Apply a patch labelled `#unknown`
    ///
    /// Returns the new version of this space (of its parent after a removal),
    /// or this same handle for [`Patch::Keep`].
    pub fn update(&self, patch: impl Into<Patch>) -> Result<Space> {
        self.update_as(patch, UNKNOWN_ACTION)
    }

    /// Apply a patch labelled `#<action>`
    pub fn update_as(&self, patch: impl Into<Patch>, action: &str) -> Result<Space> {
        mutation::update(self, patch.into(), &action_label(action))
    }

    /// Replace the whole value; the kind follows the new value
    pub fn replace(&self, value: Value) -> Result<Space> {
        self.update_as(Patch::Replace(value), "replace")
    }

    /// Remove this space from its parent, returning the parent's new version
    pub fn remove(&self) -> Result<Space> {
        self.update_as(Patch::Remove, "remove")
    }

    // ========================================================================
    // List operations
    // ========================================================================

    fn item_inputs(&self) -> Result<Vec<Input>> {
        let Entries::Array(items) = self.node.entries() else {
            return Err(SpaceError::NotAList { name: self.name() });
        };
        Ok(items
            .iter()
            .map(|entry| match entry {
                Entry::Node(node) => Input::Space(self.descend(node.clone())),
                Entry::Leaf(value) => Input::Value(value.clone()),
            })
            .collect())
    }

    /// Append an item
    pub fn push(&self, item: impl Into<Input>) -> Result<Space> {
        let mut items = self.item_inputs()?;
        items.push(item.into());
        self.update_as(Patch::List(items), "push")
    }

    /// Prepend an item
    pub fn unshift(&self, item: impl Into<Input>) -> Result<Space> {
        let mut items = self.item_inputs()?;
        items.insert(0, item.into());
        self.update_as(Patch::List(items), "unshift")
    }

    /// Remove the item with the given id, returning the list's new version
    pub fn remove_item(&self, id: &str) -> Result<Space> {
        self.item(id)?.update_as(Patch::Remove, "remove")
    }

    /// Keep only the items whose value matches `keep`
    pub fn retain<P>(&self, keep: P) -> Result<Space>
    where
        P: Fn(&Value) -> bool,
    {
        let Entries::Array(entries) = self.node.entries() else {
            return Err(SpaceError::NotAList { name: self.name() });
        };
        let items = self
            .item_inputs()?
            .into_iter()
            .zip(entries)
            .filter(|(_, entry)| keep(&entry.to_value()))
            .map(|(input, _)| input)
            .collect();
        self.update_as(Patch::List(items), "retain")
    }

    // ========================================================================
    // Setters and actions
    // ========================================================================

    /// Setter for a single field, labelled `#set:<key>`
    pub fn field(&self, key: impl Into<String>) -> FieldSetter {
        FieldSetter::new(self.clone(), key.into())
    }

    /// Wrap a synchronous action
    ///
    /// The action is named after `f` when it is a named `fn`, otherwise
    /// `unknown`; use [`Action::named`] to override.
    pub fn action<F, A>(&self, f: F) -> Action<F>
    where
        F: Fn(&mut ActionContext, A) -> Result<Option<Patch>>,
    {
        Action::new(self.clone(), f)
    }

    /// Wrap an action that awaits before settling
    pub fn action_async<F, A, Fut>(&self, f: F) -> AsyncAction<F>
    where
        F: Fn(ActionContext, A) -> Fut,
        Fut: Future<Output = Result<ActionOutcome>>,
    {
        AsyncAction::new(self.clone(), f)
    }

    /// Wrap an action that yields a sequence of patches
    pub fn action_steps<F, A, I>(&self, f: F) -> StepAction<F>
    where
        F: Fn(Space, A) -> I,
        I: IntoIterator<Item = Patch>,
    {
        StepAction::new(self.clone(), f)
    }

    // ========================================================================
    // Observers
    // ========================================================================

    /// Register an observer on this space's lineage
    ///
    /// The registration follows the space through every later version.
    pub fn subscribe<O>(&self, observer: O) -> Subscription
    where
        O: Observer + 'static,
    {
        let lineage = self.node.lineage();
        let id = lineage.subscribe(Arc::new(observer));
        tracing::trace!(subscription = %id, space = %self.name(), "observer registered");
        Subscription::new(id, lineage)
    }

    /// Remove an observer by id
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.node.lineage().unsubscribe(id)
    }

    /// Number of observers registered on this space's lineage
    pub fn observer_count(&self) -> usize {
        self.node.lineage().len()
    }
}

impl fmt::Debug for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Space")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .field("revision", &self.revision())
            .field("value", &self.value())
            .finish()
    }
}

impl Serialize for Space {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let value = self.node.plain();
        Value::serialize(&value, serializer)
    }
}

/// One step of a navigation path
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Field(String),
    Item(String),
}

fn parse_path(path: &str) -> Option<Vec<Step>> {
    let mut steps = Vec::new();
    let mut rest = path;

    while !rest.is_empty() {
        if let Some(inner) = rest.strip_prefix('[') {
            if inner.starts_with('"') {
                let end = inner.find("\"]")?;
                let key: String = serde_json::from_str(&inner[..=end]).ok()?;
                steps.push(Step::Field(key));
                rest = &inner[end + 2..];
            } else {
                let end = inner.find(']')?;
                if end == 0 {
                    return None;
                }
                steps.push(Step::Item(inner[..end].to_string()));
                rest = &inner[end + 1..];
            }
            continue;
        }

        let field = match rest.strip_prefix('.') {
            Some(after) if !steps.is_empty() => after,
            Some(_) => return None,
            None => rest,
        };
        let end = field.find(['.', '[']).unwrap_or(field.len());
        if end == 0 {
            return None;
        }
        steps.push(Step::Field(field[..end].to_string()));
        rest = &field[end..];
    }

    Some(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_paths() {
        assert_eq!(
            parse_path("todos[abc].tags").unwrap(),
            vec![
                Step::Field("todos".into()),
                Step::Item("abc".into()),
                Step::Field("tags".into())
            ]
        );
        assert_eq!(
            parse_path("[\"my key\"].x").unwrap(),
            vec![Step::Field("my key".into()), Step::Field("x".into())]
        );
        assert_eq!(parse_path("").unwrap(), vec![]);
        assert!(parse_path(".a").is_none());
        assert!(parse_path("a..b").is_none());
        assert!(parse_path("a[").is_none());
        assert!(parse_path("a[]").is_none());
    }

    #[test]
    fn test_names() {
        let root = Space::create(json!({ "list": [{ "id": "x" }, { "v": 1 }], "my key": {} })).unwrap();
        assert_eq!(root.name(), "root");
        assert!(root.is_root());

        let list = root.child("list").unwrap();
        assert_eq!(list.name(), "list");
        assert_eq!(list.item("x").unwrap().name(), "x");
        assert_eq!(list.item("x").unwrap().key(), Some("x"));
        assert_eq!(list.child("1").unwrap().name(), "1");
        assert_eq!(list.child("1").unwrap().key(), None);
    }

    #[test]
    fn test_navigation_errors() {
        let root = Space::create(json!({ "count": 1, "list": [] })).unwrap();

        assert_eq!(
            root.child("count").unwrap_err(),
            SpaceError::InvalidSubspaceTarget {
                key: "count".into(),
                found: "number"
            }
        );
        assert_eq!(
            root.child("list").unwrap().item("nope").unwrap_err(),
            SpaceError::UnknownLookupTarget {
                id: "nope".into(),
                parent: "list".into()
            }
        );
        assert_eq!(
            root.item("x").unwrap_err(),
            SpaceError::NotAList { name: "root".into() }
        );
    }

    #[test]
    fn test_missing_child_attaches_on_update() {
        let root = Space::create(json!({})).unwrap();
        let settings = root.child("settings").unwrap();
        assert_eq!(*settings.value(), json!({}));

        settings.update(json!({ "theme": "dark" })).unwrap();
        assert_eq!(*root.latest().value(), json!({ "settings": { "theme": "dark" } }));
    }

    #[test]
    fn test_at_path() {
        let root = Space::create(json!({
            "todos": [{ "id": "abc", "tags": ["a"] }, { "title": "no id" }],
            "my key": { "x": {} }
        }))
        .unwrap();

        assert_eq!(*root.at("todos[abc].tags").unwrap().value(), json!(["a"]));
        assert_eq!(*root.at("todos[1]").unwrap().value(), json!({ "title": "no id" }));
        assert_eq!(*root.at("[\"my key\"].x").unwrap().value(), json!({}));
        assert!(root.at("").unwrap().ptr_eq(&root));
        assert!(root.at("todos[zzz]").is_err());
    }

    #[test]
    fn test_serialize_as_plain_value() {
        let root = Space::create(json!({ "a": [1, { "b": true }] })).unwrap();
        let encoded = serde_json::to_string(&root).unwrap();
        assert_eq!(encoded, r#"{"a":[1,{"b":true}]}"#);
    }
}
