//! Actions: named mutations bound to a space
//!
//! An action wraps a caller-supplied function. When invoked it receives an
//! [`ActionContext`], the accumulator through which it merges, replaces or
//! removes, and which remembers what the action produced. Every change made
//! through the context carries the action's label (`#name`).
//!
//! Three shapes are supported:
//!
//! - [`Action`]: runs to completion and optionally returns a final patch
//! - [`AsyncAction`]: owns its context across await points and hands it back
//!   through [`ActionContext::finish`]
//! - [`StepAction`]: yields a sequence of patches that are applied in order
//!
//! Under [`NotifyPolicy::Deferred`] merges made through the context are
//! committed silently and one notification covering the whole action is
//! delivered when it settles (or when the context is dropped).

use crate::config::NotifyPolicy;
use crate::error::Result;
use crate::mutation::{self, Applied};
use crate::notify::{self, action_label, compose, is_identifier, Level};
use crate::patch::Patch;
use crate::space::{Space, UNKNOWN_ACTION};
use serde_json::Value;
use std::future::Future;

/// Action name derived from the callback's type
///
/// Named `fn` items report their own name; closures and anything else that
/// is not a plain identifier report `unknown`.
pub(crate) fn infer_name<F>() -> String {
    let full = std::any::type_name::<F>();
    if full.contains("{{closure}}") {
        return UNKNOWN_ACTION.to_string();
    }
    let base = full.split('<').next().unwrap_or(full);
    match base.rsplit("::").next() {
        Some(name) if is_identifier(name) => name.to_string(),
        _ => UNKNOWN_ACTION.to_string(),
    }
}

/// Pending notification of a deferred action
#[derive(Debug)]
struct Pending {
    removed: bool,
}

/// The explicit accumulator handed to an action
#[derive(Debug)]
pub struct ActionContext {
    origin: Space,
    label: String,
    produced: Option<Space>,
    deferred: bool,
    pending: Option<Pending>,
}

impl ActionContext {
    pub(crate) fn new(origin: Space, name: &str) -> Self {
        let deferred = origin.config().notify == NotifyPolicy::Deferred;
        Self {
            origin,
            label: action_label(name),
            produced: None,
            deferred,
            pending: None,
        }
    }

    /// The space the action was invoked on, as it was at invocation
    pub fn space(&self) -> &Space {
        &self.origin
    }

    /// Current version of the space the action was invoked on
    pub fn latest(&self) -> Space {
        self.origin.latest()
    }

    /// Current version of the root
    pub fn root(&self) -> Space {
        self.origin.root()
    }

    /// Cause label of every change made through this context
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Last version produced through this context, if any
    pub fn produced(&self) -> Option<&Space> {
        self.produced.as_ref()
    }

    /// Apply a patch to the current version of the action's space
    pub fn merge(&mut self, patch: impl Into<Patch>) -> Result<Space> {
        let target = self.latest();
        let Some(applied) = mutation::apply(&target, patch.into(), &self.label)? else {
            return Ok(target);
        };
        self.record(applied)
    }

    /// Replace the whole value of the action's space
    pub fn replace(&mut self, value: Value) -> Result<Space> {
        self.merge(Patch::Replace(value))
    }

    /// Remove the action's space from its parent
    pub fn remove(&mut self) -> Result<Space> {
        self.merge(Patch::Remove)
    }

    /// Hand the context back from an async action, with a final patch
    pub fn finish(self, patch: impl Into<Patch>) -> ActionOutcome {
        ActionOutcome {
            ctx: self,
            patch: patch.into(),
        }
    }

    fn record(&mut self, applied: Applied) -> Result<Space> {
        if self.deferred {
            let pending = self.pending.get_or_insert(Pending { removed: false });
            pending.removed |= applied.removed;
        } else {
            applied.notify();
        }
        self.produced = Some(applied.result.clone());
        Ok(applied.result)
    }

    /// Apply the final patch, deliver any deferred notification and return
    /// the latest version of what the action produced
    pub(crate) fn settle(&mut self, patch: Patch) -> Result<Space> {
        if !patch.is_keep() {
            self.merge(patch)?;
        }
        self.flush();
        Ok(match &self.produced {
            Some(produced) => produced.latest(),
            None => self.origin.latest(),
        })
    }

    /// Deliver one notification covering every deferred change
    ///
    /// Old versions are the handles captured at invocation; new versions are
    /// whatever is current now.
    fn flush(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        let mut levels = Vec::new();
        if !pending.removed {
            levels.push(Level {
                old: self.origin.clone(),
                new: self.origin.latest(),
            });
        }
        let mut ancestor = self.origin.parent();
        while let Some(old) = ancestor {
            ancestor = old.parent();
            let new = old.latest();
            levels.push(Level { old, new });
        }

        let label = if pending.removed {
            compose(&self.label, self.origin.node().slot(), None)
        } else {
            self.label.clone()
        };

        tracing::debug!(cause = %label, levels = levels.len(), "delivering deferred notification");
        notify::notify(&levels, &label);
    }
}

impl Drop for ActionContext {
    fn drop(&mut self) {
        self.flush();
    }
}

/// What an async action hands back when it completes
#[derive(Debug)]
pub struct ActionOutcome {
    ctx: ActionContext,
    patch: Patch,
}

/// A synchronous action bound to a space
#[derive(Debug, Clone)]
pub struct Action<F> {
    space: Space,
    name: String,
    f: F,
}

impl<F> Action<F> {
    pub(crate) fn new(space: Space, f: F) -> Self {
        Self {
            space,
            name: infer_name::<F>(),
            f,
        }
    }

    /// Set the action name used in cause labels
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Action name used in cause labels
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the action
    ///
    /// The returned patch, if any, is applied to the current version of the
    /// space. Returns the latest version of what the action produced, or of
    /// the space itself when the action changed nothing.
    pub fn call<A>(&self, args: A) -> Result<Space>
    where
        F: Fn(&mut ActionContext, A) -> Result<Option<Patch>>,
    {
        let mut ctx = ActionContext::new(self.space.clone(), &self.name);
        let patch = (self.f)(&mut ctx, args)?;
        ctx.settle(patch.into())
    }
}

/// An action that awaits before settling
#[derive(Debug, Clone)]
pub struct AsyncAction<F> {
    space: Space,
    name: String,
    f: F,
}

impl<F> AsyncAction<F> {
    pub(crate) fn new(space: Space, f: F) -> Self {
        Self {
            space,
            name: infer_name::<F>(),
            f,
        }
    }

    /// Set the action name used in cause labels
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Action name used in cause labels
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the action to completion
    ///
    /// Anything merged through the context before an await point is visible
    /// to other code immediately; after resuming, the action should use
    /// [`ActionContext::latest`] to read current state.
    pub async fn call<A, Fut>(&self, args: A) -> Result<Space>
    where
        F: Fn(ActionContext, A) -> Fut,
        Fut: Future<Output = Result<ActionOutcome>>,
    {
        let ctx = ActionContext::new(self.space.clone(), &self.name);
        let ActionOutcome { mut ctx, patch } = (self.f)(ctx, args).await?;
        ctx.settle(patch)
    }
}

/// An action that yields a sequence of patches
#[derive(Debug, Clone)]
pub struct StepAction<F> {
    space: Space,
    name: String,
    f: F,
}

impl<F> StepAction<F> {
    pub(crate) fn new(space: Space, f: F) -> Self {
        Self {
            space,
            name: infer_name::<F>(),
            f,
        }
    }

    /// Set the action name used in cause labels
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Action name used in cause labels
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pull every patch from the sequence and apply it to the current version
    ///
    /// The sequence is pulled lazily; a failing patch stops it, and patches
    /// already applied stay applied.
    pub fn call<A, I>(&self, args: A) -> Result<Space>
    where
        F: Fn(Space, A) -> I,
        I: IntoIterator<Item = Patch>,
    {
        let mut ctx = ActionContext::new(self.space.clone(), &self.name);
        for patch in (self.f)(self.space.clone(), args) {
            ctx.merge(patch)?;
        }
        ctx.settle(Patch::Keep)
    }
}
