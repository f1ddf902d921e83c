//! Replay a script of mutations against a state file.

use super::load_state;
use crate::output::{envelope, print_json};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use statespace::{ChangeRecord, CollectingObserver, Patch, Space, SpaceConfig};
use std::fs;
use std::path::Path;

/// A mutation script
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    pub steps: Vec<Step>,
}

/// One scripted mutation
///
/// Exactly one of `patch`, `replace`, `remove`, `push`, `unshift` or
/// `remove_item` must be given.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Step {
    /// Path of the target space, empty for the root
    pub at: String,
    /// Action name used in the cause label
    pub action: Option<String>,
    pub patch: Option<Value>,
    pub replace: Option<Value>,
    pub remove: bool,
    pub push: Option<Value>,
    pub unshift: Option<Value>,
    pub remove_item: Option<String>,
}

impl Step {
    fn apply(&self, root: &Space) -> Result<Space> {
        let target = root.latest().at(&self.at)?;
        let action = self.action.as_deref();

        let given = [
            self.patch.is_some(),
            self.replace.is_some(),
            self.remove,
            self.push.is_some(),
            self.unshift.is_some(),
            self.remove_item.is_some(),
        ]
        .iter()
        .filter(|given| **given)
        .count();
        if given != 1 {
            bail!("expected exactly one of patch, replace, remove, push, unshift, remove_item");
        }

        let list_op = self.push.is_some() || self.unshift.is_some() || self.remove_item.is_some();
        if list_op && action.is_some() {
            bail!("action names apply only to patch, replace and remove");
        }

        let next = if let Some(patch) = &self.patch {
            target.update_as(Patch::from(patch.clone()), action.unwrap_or("unknown"))?
        } else if let Some(value) = &self.replace {
            target.update_as(Patch::Replace(value.clone()), action.unwrap_or("replace"))?
        } else if self.remove {
            target.update_as(Patch::Remove, action.unwrap_or("remove"))?
        } else if let Some(item) = &self.push {
            target.push(item.clone())?
        } else if let Some(item) = &self.unshift {
            target.unshift(item.clone())?
        } else if let Some(id) = &self.remove_item {
            target.remove_item(id)?
        } else {
            bail!("no operation given");
        };
        Ok(next)
    }
}

#[derive(Serialize)]
struct ReplayData {
    steps: usize,
    trail: Vec<ChangeRecord>,
    state: Value,
}

/// Apply every step of `script_path` to the state in `state_path`.
pub fn replay(config: SpaceConfig, state_path: &Path, script_path: &Path, json: bool) -> Result<()> {
    let root = load_state(state_path, config)?;
    let contents = fs::read_to_string(script_path)
        .with_context(|| format!("Failed to read script {}", script_path.display()))?;
    let script: Script = serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse script {}", script_path.display()))?;

    let trail = CollectingObserver::new();
    root.subscribe(trail.clone());

    for (index, step) in script.steps.iter().enumerate() {
        step.apply(&root)
            .with_context(|| format!("Step {} (at `{}`) failed", index + 1, step.at))?;
    }

    let state = root.latest().to_plain_value();
    tracing::info!(steps = script.steps.len(), changes = trail.len(), "replay complete");

    if json {
        let data = ReplayData {
            steps: script.steps.len(),
            trail: trail.take(),
            state,
        };
        print_json(&envelope("replay", data))?;
    } else {
        for record in trail.take() {
            println!("{}", record.cause);
        }
        println!("{}", serde_json::to_string_pretty(&state)?);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(yaml: &str) -> Step {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_step_shapes() {
        let root = Space::create(json!({ "todos": [{ "id": "a" }], "name": "Jon" })).unwrap();

        step("patch: { name: Frodo }\naction: rename").apply(&root).unwrap();
        step("at: todos\npush: { id: b }").apply(&root).unwrap();
        step("at: todos[a]\nremove: true").apply(&root).unwrap();

        assert_eq!(
            *root.latest().value(),
            json!({ "todos": [{ "id": "b" }], "name": "Frodo" })
        );
    }

    #[test]
    fn test_step_needs_one_operation() {
        let root = Space::create(json!({})).unwrap();
        assert!(step("at: ''").apply(&root).is_err());
        assert!(step("patch: { a: 1 }\nreplace: { b: 2 }").apply(&root).is_err());
    }

    #[test]
    fn test_list_ops_reject_action_names() {
        let root = Space::create(json!({ "todos": [] })).unwrap();
        let err = step("at: todos\npush: { id: a }\naction: add")
            .apply(&root)
            .unwrap_err();
        assert!(err.to_string().contains("action names"));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        assert!(serde_yaml::from_str::<Step>("pach: {}").is_err());
    }
}
