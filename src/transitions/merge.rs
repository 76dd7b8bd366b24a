// Merge - fold several entities into one successor
//
// Ministers merge under the root government; departments merge under the
// current parent of the first listed department. Every merged-away entity
// hands its children to the successor, loses its own edges and gains a
// MERGED_INTO marker.

use super::{upstream_kind, Attach, TransitionContext, TransitionOutcome};
use crate::error::{OrgChartError, Result};
use crate::events::MergeEntities;
use crate::model::{EntityRef, RelationshipType};
use chrono::NaiveDate;

pub fn apply(
    ctx: &mut TransitionContext<'_>,
    merge: &MergeEntities,
    transaction_id: u64,
    date: NaiveDate,
) -> Result<TransitionOutcome> {
    let mut outcome = TransitionOutcome::default();
    let kind = upstream_kind(merge.entity_type)?;

    let olds = merge
        .old
        .iter()
        .map(|name| ctx.find_entity(merge.entity_type, name))
        .collect::<Result<Vec<EntityRef>>>()?;
    let first = olds
        .first()
        .ok_or_else(|| OrgChartError::malformed(transaction_id, "old", "must name at least one entity"))?;

    let parent = ctx.reporting_parent(merge.entity_type, first)?;
    let new = ctx.find_or_create_with_id(merge.entity_type, &merge.new, &mut outcome)?;
    ctx.attach(&parent, &new, kind, date, Attach::Reuse, &mut outcome)?;

    for old in &olds {
        ctx.hand_over_children(old, &new, date, &mut outcome)?;

        let old_parent = ctx.tx.open_parent(old, kind)?.ok_or_else(|| {
            OrgChartError::NoOpenRelationship {
                kind: kind.to_string(),
                from: parent.name.clone(),
                to: old.name.clone(),
            }
        })?;
        ctx.close_exactly_one(&old_parent, old, kind, date, &mut outcome)?;

        ctx.mark_history(old, &new, RelationshipType::MergedInto, date, &mut outcome)?;
    }

    Ok(outcome)
}
