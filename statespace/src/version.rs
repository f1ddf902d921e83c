//! Version resolution
//!
//! Every node keeps a forward-only pointer to the version that superseded
//! it. These helpers resolve the current version of a captured handle and the
//! current root of its tree, and are safe to call at any point after any
//! number of intervening mutations.

use crate::error::{type_name, Result, SpaceError};
use crate::patch::Input;
use crate::space::Space;

/// Current version of `space`
pub fn latest(space: &Space) -> Space {
    space.latest()
}

/// Current version of the root of `space`'s tree
pub fn root_of(space: &Space) -> Space {
    space.root()
}

/// Current version of the space carried by a patch input
///
/// Fails with [`SpaceError::NotASpace`] for raw values and removals.
pub fn latest_of(input: &Input) -> Result<Space> {
    match input {
        Input::Space(space) => Ok(space.latest()),
        Input::Value(value) => Err(SpaceError::NotASpace {
            found: type_name(value),
        }),
        Input::Remove => Err(SpaceError::NotASpace { found: "removal" }),
    }
}
