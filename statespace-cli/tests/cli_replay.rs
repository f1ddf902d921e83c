use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::tempdir;

const STATE: &str = r#"{ "name": "Jon", "todos": [{ "id": "a", "done": false }] }"#;

const SCRIPT: &str = r#"
steps:
  - at: todos[a]
    action: toggle
    patch: { done: true }
  - at: todos
    push: { id: b, done: false }
  - patch: { name: Frodo }
    action: rename
  - at: todos
    remove_item: a
"#;

#[test]
fn replay_prints_trail_and_state() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("state.json"), STATE)?;
    fs::write(dir.path().join("script.yml"), SCRIPT)?;

    #[allow(deprecated)]
    Command::cargo_bin("statespace")?
        .current_dir(dir.path())
        .args(["replay", "--state", "state.json", "--script", "script.yml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("todos[a]#toggle"))
        .stdout(predicate::str::contains("todos#push"))
        .stdout(predicate::str::contains("#rename"))
        .stdout(predicate::str::contains("todos[a]#remove"))
        .stdout(predicate::str::contains("\"Frodo\""));

    Ok(())
}

#[test]
fn replay_json_outputs_envelope() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("state.json"), STATE)?;
    fs::write(dir.path().join("script.yml"), SCRIPT)?;

    #[allow(deprecated)]
    let assert = Command::cargo_bin("statespace")?
        .current_dir(dir.path())
        .args(["replay", "--state", "state.json", "--script", "script.yml", "--json"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone())?;
    let value: Value = serde_json::from_str(&stdout)?;
    assert_eq!(value["kind"], "replay");
    assert_eq!(value["data"]["steps"], 4);

    let causes: Vec<&str> = value["data"]["trail"]
        .as_array()
        .expect("trail array")
        .iter()
        .filter_map(|record| record["cause"].as_str())
        .collect();
    assert_eq!(
        causes,
        vec!["todos[a]#toggle", "todos#push", "#rename", "todos[a]#remove"]
    );
    assert_eq!(
        value["data"]["state"],
        serde_json::json!({ "name": "Frodo", "todos": [{ "id": "b", "done": false }] })
    );

    Ok(())
}

#[test]
fn replay_reports_failing_step() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("state.json"), STATE)?;
    fs::write(
        dir.path().join("script.yml"),
        "steps:\n  - at: todos\n    patch: { a: 1 }\n",
    )?;

    #[allow(deprecated)]
    Command::cargo_bin("statespace")?
        .current_dir(dir.path())
        .args(["replay", "--state", "state.json", "--script", "script.yml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Step 1"))
        .stderr(predicate::str::contains("cannot merge onto list"));

    Ok(())
}

#[test]
fn config_file_changes_id_field() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("statespace.yml"), "id_field: key\n")?;
    fs::write(
        dir.path().join("state.json"),
        r#"{ "rows": [{ "key": "r1", "v": 1 }] }"#,
    )?;

    #[allow(deprecated)]
    let assert = Command::cargo_bin("statespace")?
        .current_dir(dir.path())
        .args(["show", "--state", "state.json", "--path", "rows[r1]", "--json"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone())?;
    let value: Value = serde_json::from_str(&stdout)?;
    assert_eq!(value["kind"], "space");
    assert_eq!(value["data"]["key"], "r1");
    assert_eq!(value["data"]["kind"], "object");
    assert_eq!(value["data"]["value"]["v"], 1);

    Ok(())
}

#[test]
fn show_unknown_path_fails() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("state.json"), STATE)?;

    #[allow(deprecated)]
    Command::cargo_bin("statespace")?
        .current_dir(dir.path())
        .args(["show", "--state", "state.json", "--path", "todos[zzz]"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("zzz"));

    Ok(())
}
