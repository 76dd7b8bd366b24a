// Rename - replace an entity with a newly named successor
//
// The old node stays in the graph as history: its edges are closed and a
// RENAMED_TO marker points at the successor, which inherits its children.

use super::{upstream_kind, Attach, TransitionContext, TransitionOutcome};
use crate::error::Result;
use crate::events::RenameEntity;
use crate::model::RelationshipType;
use chrono::NaiveDate;

pub fn apply(ctx: &mut TransitionContext<'_>, rename: &RenameEntity, date: NaiveDate) -> Result<TransitionOutcome> {
    let mut outcome = TransitionOutcome::default();
    let kind = upstream_kind(rename.entity_type)?;

    let old = ctx.find_entity(rename.entity_type, &rename.old)?;
    let parent = ctx.reporting_parent(rename.entity_type, &old)?;

    let new = ctx.find_or_create_with_id(rename.entity_type, &rename.new, &mut outcome)?;
    ctx.attach(&parent, &new, kind, date, Attach::Strict, &mut outcome)?;

    ctx.hand_over_children(&old, &new, date, &mut outcome)?;
    ctx.close_exactly_one(&parent, &old, kind, date, &mut outcome)?;
    ctx.mark_history(&old, &new, RelationshipType::RenamedTo, date, &mut outcome)?;

    Ok(outcome)
}
