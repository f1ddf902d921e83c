//! Error types for statespace
//!
//! Every fault is raised synchronously by the operation that detected it
//! and is never caught internally. Validation runs before any new node is
//! linked into a version chain, so an error leaves the tree untouched.

use thiserror::Error;

/// Faults raised by space operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpaceError {
    /// An object merge was applied to an array-kind node
    #[error("cannot merge onto list `{name}`; use replace")]
    InvalidMergeTarget {
        /// Name of the list node
        name: String,
    },

    /// A list item carries no id where one is required
    ///
    /// Raised for pre-built spaces placed into a list and for updates that
    /// drop the id of an item that had one.
    #[error("item of list `{list}` is missing its `{field}` field")]
    MissingListItemId {
        /// Name of the receiving list
        list: String,
        /// Name of the id field that was expected
        field: String,
    },

    /// Two items of one list carry the same id
    #[error("list `{list}` already holds an item with id `{id}`")]
    DuplicateListItemId {
        /// Name of the list
        list: String,
        /// The repeated id
        id: String,
    },

    /// Removal requested for a node that cannot be removed from its parent
    #[error("unexpected removal of `{name}`: not a list item with an id nor a keyed field")]
    UnexpectedRemoval {
        /// Name of the node (empty for the root or id-less items)
        name: String,
    },

    /// A primitive value was asked to become a sub-space
    #[error("cannot create a sub-space at `{key}` from a value of type {found}")]
    InvalidSubspaceTarget {
        /// Key the value was found under
        key: String,
        /// Runtime type of the offending value
        found: &'static str,
    },

    /// Navigation by id or key found nothing
    #[error("no entry `{id}` in `{parent}`")]
    UnknownLookupTarget {
        /// The id or key that was looked up
        id: String,
        /// Name of the node that was searched
        parent: String,
    },

    /// A list operation was applied to an object-kind node
    #[error("`{name}` is not a list")]
    NotAList {
        /// Name of the object node
        name: String,
    },

    /// A space operation was handed something that is not a space
    #[error("expected a space, found {found}")]
    NotASpace {
        /// What was found instead
        found: &'static str,
    },
}

/// Result type using SpaceError
pub type Result<T> = std::result::Result<T, SpaceError>;

/// Name of the JSON type of a value, for error messages
pub(crate) fn type_name(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_messages_name_the_offender() {
        let err = SpaceError::InvalidSubspaceTarget {
            key: "count".into(),
            found: "number",
        };
        assert_eq!(
            err.to_string(),
            "cannot create a sub-space at `count` from a value of type number"
        );

        let err = SpaceError::UnknownLookupTarget {
            id: "abc".into(),
            parent: "todos".into(),
        };
        assert!(err.to_string().contains("abc"));
        assert!(err.to_string().contains("todos"));
    }

    #[test]
    fn test_type_names() {
        assert_eq!(type_name(&json!(null)), "null");
        assert_eq!(type_name(&json!(true)), "boolean");
        assert_eq!(type_name(&json!(1.5)), "number");
        assert_eq!(type_name(&json!("s")), "string");
        assert_eq!(type_name(&json!([])), "array");
        assert_eq!(type_name(&json!({})), "object");
    }
}
