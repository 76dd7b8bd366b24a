// Add - attach a (possibly new) child entity under an existing parent

use super::{Attach, TransitionContext, TransitionOutcome};
use crate::error::Result;
use crate::events::AddEntity;
use chrono::NaiveDate;

/// Create the child if its name is new, then open `parent -> child`.
/// The child must not already have an open parent of this kind.
pub fn apply(ctx: &mut TransitionContext<'_>, add: &AddEntity, date: NaiveDate) -> Result<TransitionOutcome> {
    let mut outcome = TransitionOutcome::default();

    let parent = ctx.find_parent(add.parent_type, &add.parent)?;
    let child = ctx.find_or_create_with_id(add.child_type, &add.child, &mut outcome)?;
    ctx.attach(&parent, &child, add.relationship, date, Attach::Strict, &mut outcome)?;

    Ok(outcome)
}
