// Terminate - close one open parent -> child edge

use super::{TransitionContext, TransitionOutcome};
use crate::error::Result;
use crate::events::TerminateRelationship;
use chrono::NaiveDate;

pub fn apply(
    ctx: &mut TransitionContext<'_>,
    terminate: &TerminateRelationship,
    date: NaiveDate,
) -> Result<TransitionOutcome> {
    let mut outcome = TransitionOutcome::default();

    let parent = ctx.find_parent(terminate.parent_type, &terminate.parent)?;
    let child = ctx.find_entity(terminate.child_type, &terminate.child)?;
    ctx.close_exactly_one(&parent, &child, terminate.relationship, date, &mut outcome)?;

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use crate::error::OrgChartError;
    use crate::events::{Change, TerminateRelationship};
    use crate::model::{EntityType, RelationshipType};
    use crate::transitions::test_support::*;

    fn terminate_minister(name: &str) -> Change {
        Change::Terminate(TerminateRelationship {
            parent: GOV.to_string(),
            child: name.to_string(),
            parent_type: EntityType::Government,
            child_type: EntityType::Minister,
            relationship: RelationshipType::HasMinister,
        })
    }

    #[test]
    fn test_terminate_closes_edge() {
        let mut graph = seeded_graph("2015-01-01", &[("Ministry A", &["Treasury"])]);
        let mut allocator = allocator_for(&mut graph);

        let outcome = run(
            &mut graph,
            &mut allocator,
            &event(1, "2016-05-01", terminate_minister("Ministry A")),
        )
        .unwrap();

        assert_eq!(outcome.relationships_closed, 1);
        assert_eq!(
            graph.edges(RelationshipType::HasMinister, GOV, "Ministry A"),
            closed("2015-01-01", "2016-05-01")
        );
        // children are left alone
        assert_eq!(
            graph.edges(RelationshipType::HasDepartment, "Ministry A", "Treasury"),
            open("2015-01-01")
        );
    }

    #[test]
    fn test_terminate_twice_fails() {
        let mut graph = seeded_graph("2015-01-01", &[("Ministry A", &[])]);
        let mut allocator = allocator_for(&mut graph);

        run(
            &mut graph,
            &mut allocator,
            &event(1, "2016-05-01", terminate_minister("Ministry A")),
        )
        .unwrap();
        let err = run(
            &mut graph,
            &mut allocator,
            &event(2, "2016-06-01", terminate_minister("Ministry A")),
        )
        .unwrap_err();

        assert!(matches!(err, OrgChartError::NoOpenRelationship { .. }));
    }
}
