//! Integration tests for synchronous, async and stepwise actions

use serde_json::json;
use statespace::{
    ActionContext, ActionOutcome, CollectingObserver, NotifyPolicy, Patch, Result, Space,
    SpaceConfig, SpaceError,
};

async fn load(mut ctx: ActionContext, value: i64) -> Result<ActionOutcome> {
    ctx.merge(json!({ "loading": true }))?;

    // Other code runs while the action is suspended
    tokio::task::yield_now().await;

    let seen = ctx.latest().value()["other"].clone();
    Ok(ctx.finish(json!({ "loading": false, "value": value, "seen": seen })))
}

async fn wait(ctx: ActionContext, _: ()) -> Result<ActionOutcome> {
    tokio::task::yield_now().await;
    Ok(ctx.finish(None::<Patch>))
}

async fn fail_after_merge(mut ctx: ActionContext, _: ()) -> Result<ActionOutcome> {
    ctx.merge(json!({ "started": true }))?;
    tokio::task::yield_now().await;
    Err(SpaceError::NotASpace { found: "string" })
}

#[tokio::test]
async fn test_async_action_sees_intervening_changes() {
    let root = Space::create(json!({ "loading": false, "other": 0 })).unwrap();
    let trail = CollectingObserver::new();
    root.subscribe(trail.clone());

    let action = root.action_async(load);
    assert_eq!(action.name(), "load");

    let (result, _) = tokio::join!(action.call(42), async {
        root.latest().field("other").set(1).unwrap()
    });
    let result = result.unwrap();

    assert_eq!(
        *result.value(),
        json!({ "loading": false, "other": 1, "value": 42, "seen": 1 })
    );
    assert_eq!(trail.causes(), vec!["#load", "#set:other", "#load"]);
    // The captured root still shows the state at construction
    assert_eq!(*root.value(), json!({ "loading": false, "other": 0 }));
}

#[tokio::test]
async fn test_async_action_without_changes_resolves_to_latest() {
    let root = Space::create(json!({ "n": 0 })).unwrap();

    let action = root.action_async(wait);
    let (result, _) = tokio::join!(action.call(()), async {
        root.latest().field("n").set(1).unwrap()
    });
    let result = result.unwrap();

    assert_eq!(*result.value(), json!({ "n": 1 }));
    assert!(result.ptr_eq(&root.latest()));
}

#[tokio::test]
async fn test_async_action_error_keeps_earlier_merges() {
    let root = Space::create(json!({})).unwrap();

    let err = root.action_async(fail_after_merge).call(()).await.unwrap_err();

    assert_eq!(err, SpaceError::NotASpace { found: "string" });
    assert_eq!(*root.latest().value(), json!({ "started": true }));
}

#[tokio::test]
async fn test_async_deferred_notifies_on_settle() {
    let config = SpaceConfig {
        notify: NotifyPolicy::Deferred,
        ..SpaceConfig::default()
    };
    let root = Space::with_config(json!({ "loading": false, "other": 0 }), config).unwrap();
    let trail = CollectingObserver::new();
    root.subscribe(trail.clone());

    let result = root.action_async(load).named("fetch").call(7).await.unwrap();

    let records = trail.take();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].cause, "#fetch");
    assert_eq!(records[0].value, *result.value());
}

#[test]
fn test_context_bundle() {
    let root = Space::create(json!({ "todos": [{ "id": "a", "done": false }] })).unwrap();
    let item = root.at("todos[a]").unwrap();

    let result = item
        .action(|ctx: &mut ActionContext, _: ()| {
            assert_eq!(ctx.label(), "#check");
            assert!(ctx.space().ptr_eq(&ctx.latest()));
            ctx.merge(json!({ "done": true }))?;
            assert_eq!(ctx.root().value()["todos"][0]["done"], json!(true));
            ctx.replace(json!({ "id": "a", "done": true, "note": "replaced" }))?;
            Ok(None)
        })
        .named("check")
        .call(())
        .unwrap();

    assert_eq!(*result.value(), json!({ "id": "a", "done": true, "note": "replaced" }));
    assert_eq!(result.key(), Some("a"));
}

#[test]
fn test_action_removes_its_space() {
    let root = Space::create(json!({ "todos": [{ "id": "a" }, { "id": "b" }] })).unwrap();
    let trail = CollectingObserver::new();
    root.subscribe(trail.clone());

    let list = root
        .at("todos[a]")
        .unwrap()
        .action(|ctx: &mut ActionContext, _: ()| {
            ctx.remove()?;
            Ok(None)
        })
        .named("discard")
        .call(())
        .unwrap();

    assert_eq!(*list.value(), json!([{ "id": "b" }]));
    assert_eq!(trail.causes(), vec!["todos[a]#discard"]);
}

#[test]
fn test_action_error_propagates() {
    let root = Space::create(json!({ "list": [] })).unwrap();
    let list = root.child("list").unwrap();

    let err = list
        .action(|_: &mut ActionContext, _: ()| Ok(Some(Patch::from(json!({ "a": 1 })))))
        .call(())
        .unwrap_err();

    assert_eq!(err, SpaceError::InvalidMergeTarget { name: "list".into() });
    assert!(root.latest().ptr_eq(&root));
}

#[test]
fn test_step_action_notifies_per_patch() {
    let root = Space::create(json!({ "progress": 0 })).unwrap();
    let trail = CollectingObserver::new();
    root.subscribe(trail.clone());

    let result = root
        .action_steps(|_: Space, steps: i64| {
            (1..=steps).map(|n| Patch::from(json!({ "progress": n * 25 })))
        })
        .named("upload")
        .call(4)
        .unwrap();

    assert_eq!(*result.value(), json!({ "progress": 100 }));
    assert_eq!(trail.len(), 4);
    assert!(trail.causes().iter().all(|cause| cause == "#upload"));
}

#[test]
fn test_step_action_deferred_notifies_once() {
    let config = SpaceConfig {
        notify: NotifyPolicy::Deferred,
        ..SpaceConfig::default()
    };
    let root = Space::with_config(json!({ "progress": 0 }), config).unwrap();
    let trail = CollectingObserver::new();
    root.subscribe(trail.clone());

    root.action_steps(|_: Space, _: ()| {
        vec![
            Patch::from(json!({ "progress": 50 })),
            Patch::Keep,
            Patch::from(json!({ "progress": 100 })),
        ]
    })
    .named("upload")
    .call(())
    .unwrap();

    let records = trail.take();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].value, json!({ "progress": 100 }));
}

#[test]
fn test_step_action_stops_at_first_failure() {
    let root = Space::create(json!({ "n": 0 })).unwrap();

    let err = root
        .action_steps(|_: Space, _: ()| {
            vec![
                Patch::from(json!({ "n": 1 })),
                Patch::Replace(json!("not a container")),
                Patch::from(json!({ "n": 3 })),
            ]
        })
        .call(())
        .unwrap_err();

    assert!(matches!(err, SpaceError::InvalidSubspaceTarget { found: "string", .. }));
    assert_eq!(*root.latest().value(), json!({ "n": 1 }));
}
