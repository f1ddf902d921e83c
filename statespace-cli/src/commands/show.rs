//! Print the space at a path.

use super::load_state;
use crate::output::{envelope, print_json};
use anyhow::{Context, Result};
use serde::Serialize;
use statespace::{Kind, Space, SpaceConfig};
use std::path::Path;

#[derive(Serialize)]
struct SpaceData<'a> {
    name: String,
    kind: Kind,
    key: Option<&'a str>,
    value: &'a Space,
}

/// Load `state_path` and print the space found at `path`.
pub fn show(config: SpaceConfig, state_path: &Path, path: &str, json: bool) -> Result<()> {
    let root = load_state(state_path, config)?;
    let space = root
        .at(path)
        .with_context(|| format!("No space at `{}`", path))?;

    if json {
        let data = SpaceData {
            name: space.name(),
            kind: space.kind(),
            key: space.key(),
            value: &space,
        };
        print_json(&envelope("space", data))?;
    } else {
        println!("{} ({})", space.name(), space.kind());
        println!("{}", serde_json::to_string_pretty(&space)?);
    }

    Ok(())
}
