//! Statespace - immutable, observable state trees
//!
//! This crate wraps an arbitrary nested JSON value in a tree of immutable
//! **spaces**. Components own and mutate a slice of shared state through the
//! space that holds it; every mutation produces a new, structurally shared
//! version of the whole tree, and every ancestor up to the root hears about
//! it together with a label describing what caused it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Space handle                        │
//! │      (node + the parent handle it was reached through)      │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │   update(patch)                                             │
//! │        │                                                    │
//! │        ▼                                                    │
//! │  ┌─────────────────┐   build    ┌─────────────────────┐     │
//! │  │ Mutation Engine │──────────▶ │ Node Materializer   │     │
//! │  │  merge / list / │            │  (structural share) │     │
//! │  │  replace/remove │            └─────────────────────┘     │
//! │  └────────┬────────┘                                        │
//! │           │ commit: link old ──▶ new (version chains)       │
//! │           ▼                                                 │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │ Notification Router                                 │    │
//! │  │  item[abc]#toggle ─▶ list[abc]#toggle ─▶ root       │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Core Concepts
//!
//! ## Spaces and nodes
//!
//! A **node** is one frozen version of an object or array. Object and array
//! entries become child nodes; primitives are stored as leaves. A change
//! never touches an existing node: it builds a new one that shares every
//! untouched child with its predecessor.
//!
//! ## Version chains
//!
//! Each superseded node points forward to its successor. A handle captured
//! before an await point can always be fast-forwarded with
//! [`Space::latest`], and [`Space::root`] returns the current root.
//!
//! ## Observers and cause labels
//!
//! Observers are registered on a node's **lineage**, shared by all of its
//! versions. They are called bottom-up, once per change, with a label such
//! as `todos[abc]#toggle`, and may replace the new version handed to later
//! observers or stop propagation altogether.
//!
//! # Example
//!
//! ```rust
//! use statespace::{CollectingObserver, Space};
//! use serde_json::json;
//!
//! let root = Space::create(json!({ "name": "Jon", "todos": [] })).unwrap();
//! let trail = CollectingObserver::new();
//! root.subscribe(trail.clone());
//!
//! let next = root.field("name").set("Frodo").unwrap();
//! assert_eq!(*next.value(), json!({ "name": "Frodo", "todos": [] }));
//! assert_eq!(*root.value(), json!({ "name": "Jon", "todos": [] }));
//!
//! root.child("todos").unwrap()
//!     .push(json!({ "id": "a", "done": false }))
//!     .unwrap();
//!
//! assert_eq!(trail.causes(), vec!["#set:name", "todos#push"]);
//! ```

// Modules
pub mod action;
pub mod config;
pub mod error;
pub mod field;
mod mutation;
mod node;
mod notify;
pub mod observer;
pub mod patch;
pub mod space;
pub mod types;
pub mod version;

// Re-exports for convenience
pub use action::{Action, ActionContext, ActionOutcome, AsyncAction, StepAction};
pub use config::{ConfigError, MergeStrategy, NotifyPolicy, SpaceConfig};
pub use error::{Result, SpaceError};
pub use field::{coerce, FieldSetter};
pub use observer::{Change, ChangeRecord, CollectingObserver, Flow, Observer, Subscription};
pub use patch::{is_space, Input, Patch};
pub use space::Space;
pub use types::{Kind, Revision, Slot, SubscriptionId};
pub use version::{latest, latest_of, root_of};
