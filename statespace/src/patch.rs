//! Patch shapes accepted by the mutation engine

use crate::error::{type_name, SpaceError};
use crate::space::Space;
use serde_json::Value;
use std::collections::BTreeMap;

/// A value placed into a patch
#[derive(Debug, Clone)]
pub enum Input {
    /// A raw JSON value; containers are materialized into sub-spaces
    Value(Value),
    /// A pre-built space, adopted as-is
    Space(Space),
    /// Delete the key (or drop the list item)
    Remove,
}

impl Input {
    /// Check if this input carries a pre-built space
    pub fn is_space(&self) -> bool {
        matches!(self, Input::Space(_))
    }
}

impl From<Value> for Input {
    fn from(value: Value) -> Self {
        Input::Value(value)
    }
}

impl From<Space> for Input {
    fn from(space: Space) -> Self {
        Input::Space(space)
    }
}

impl From<&Space> for Input {
    fn from(space: &Space) -> Self {
        Input::Space(space.clone())
    }
}

impl TryFrom<Input> for Space {
    type Error = SpaceError;

    fn try_from(input: Input) -> Result<Self, Self::Error> {
        match input {
            Input::Space(space) => Ok(space),
            Input::Value(value) => Err(SpaceError::NotASpace {
                found: type_name(&value),
            }),
            Input::Remove => Err(SpaceError::NotASpace { found: "removal" }),
        }
    }
}

/// Type predicate for patch inputs
pub fn is_space(input: &Input) -> bool {
    input.is_space()
}

/// A requested change to one space
#[derive(Debug, Clone, Default)]
pub enum Patch {
    /// Merge keys into an object space; `null` or `Remove` deletes a key
    Merge(BTreeMap<String, Input>),
    /// Replace every item of a list space
    List(Vec<Input>),
    /// Replace the whole value; the kind follows the new value
    Replace(Value),
    /// Remove the space from its parent
    Remove,
    /// The absent patch: nothing is produced and nobody is notified
    #[default]
    Keep,
}

impl Patch {
    /// A merge patch setting a single key
    pub fn field(key: impl Into<String>, input: impl Into<Input>) -> Self {
        Patch::Merge(BTreeMap::new()).with(key, input)
    }

    /// Add a key to a merge patch
    ///
    /// Any other patch shape is discarded and replaced by a merge holding
    /// only this key.
    pub fn with(self, key: impl Into<String>, input: impl Into<Input>) -> Self {
        let mut fields = match self {
            Patch::Merge(fields) => fields,
            _ => BTreeMap::new(),
        };
        fields.insert(key.into(), input.into());
        Patch::Merge(fields)
    }

    /// Check if this is the absent patch
    pub fn is_keep(&self) -> bool {
        matches!(self, Patch::Keep)
    }
}

impl From<Value> for Patch {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(fields) => Patch::Merge(
                fields
                    .into_iter()
                    .map(|(key, value)| (key, Input::Value(value)))
                    .collect(),
            ),
            Value::Array(items) => Patch::List(items.into_iter().map(Input::Value).collect()),
            Value::Null => Patch::Remove,
            primitive => Patch::Replace(primitive),
        }
    }
}

impl From<Option<Patch>> for Patch {
    fn from(patch: Option<Patch>) -> Self {
        patch.unwrap_or(Patch::Keep)
    }
}
