//! Notification router
//!
//! Walks a committed change from the level where it originated up to the
//! root, invoking each level's observers and composing the causal label as
//! it climbs: a field name is prefixed (`todos` + `[a]#toggle` gives
//! `todos[a]#toggle`), list items and non-identifier keys are bracketed.

use crate::observer::{Change, Flow};
use crate::space::Space;
use crate::types::Slot;
use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("identifier pattern"));

/// Label of an action performed directly on a space
pub(crate) fn action_label(name: &str) -> String {
    format!("#{}", name)
}

/// Check if a key can be written without brackets
pub(crate) fn is_identifier(key: &str) -> bool {
    IDENTIFIER.is_match(key)
}

/// Label as seen one level up from a child at `slot`
///
/// `position` is only consulted for list items without an id.
pub(crate) fn compose(label: &str, slot: &Slot, position: Option<usize>) -> String {
    let prefix = match slot {
        Slot::Root => return label.to_string(),
        Slot::Field(key) if is_identifier(key) => key.clone(),
        Slot::Field(key) => format!("[{}]", serde_json::Value::from(key.as_str())),
        Slot::Item { id: Some(id) } => format!("[{}]", id),
        Slot::Item { id: None } => match position {
            Some(index) => format!("[{}]", index),
            None => "[?]".to_string(),
        },
    };

    if label.starts_with('#') || label.starts_with('[') {
        format!("{}{}", prefix, label)
    } else {
        format!("{}.{}", prefix, label)
    }
}

/// One level of a change: the version before and after
#[derive(Debug, Clone)]
pub(crate) struct Level {
    pub(crate) old: Space,
    pub(crate) new: Space,
}

/// Deliver a change bottom-up
///
/// `levels[0]` receives `label` unchanged; every level above receives the
/// label composed with the slot of the level below it. Returns the number
/// of levels whose observers ran.
pub(crate) fn notify(levels: &[Level], label: &str) -> usize {
    let mut label = label.to_string();

    for (depth, level) in levels.iter().enumerate() {
        if depth > 0 {
            let below = &levels[depth - 1];
            let position = level.new.node().position_of(below.new.node());
            label = compose(&label, below.new.node().slot(), position);
        }

        tracing::trace!(cause = %label, level = depth, "notifying");

        let observers = level.new.node().lineage().snapshot();
        let mut change = Change {
            new: level.new.clone(),
            old: level.old.clone(),
            cause: label.clone(),
        };

        for observer in observers {
            match observer.on_change(&change) {
                Flow::Continue => {}
                Flow::Replace(space) => change.new = space,
                Flow::Stop => {
                    tracing::debug!(cause = %label, level = depth, "propagation stopped by observer");
                    return depth + 1;
                }
            }
        }
    }

    levels.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(key: &str) -> Slot {
        Slot::Field(key.into())
    }

    fn item(id: &str) -> Slot {
        Slot::Item { id: Some(id.into()) }
    }

    #[test]
    fn test_identifier_detection() {
        assert!(is_identifier("count"));
        assert!(is_identifier("_private$1"));
        assert!(!is_identifier("1st"));
        assert!(!is_identifier("my key"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_compose_field_with_action() {
        assert_eq!(compose("#set:count", &field("count"), None), "count#set:count");
    }

    #[test]
    fn test_compose_nested_fields() {
        let inner = compose("#x", &field("b"), None);
        assert_eq!(compose(&inner, &field("a"), None), "a.b#x");
    }

    #[test]
    fn test_compose_list_item() {
        let at_list = compose("#myAction", &item("abc12-3"), None);
        assert_eq!(at_list, "[abc12-3]#myAction");
        assert_eq!(compose(&at_list, &field("list"), None), "list[abc12-3]#myAction");
    }

    #[test]
    fn test_compose_brackets() {
        assert_eq!(compose("#x", &field("my key"), None), "[\"my key\"]#x");
        assert_eq!(compose("b#x", &field("my key"), None), "[\"my key\"].b#x");
        assert_eq!(compose("#x", &Slot::Item { id: None }, Some(2)), "[2]#x");
        assert_eq!(compose("#x", &Slot::Item { id: None }, None), "[?]#x");
        assert_eq!(compose("#x", &Slot::Root, None), "#x");
    }

    #[test]
    fn test_action_label() {
        assert_eq!(action_label("unknown"), "#unknown");
    }
}
