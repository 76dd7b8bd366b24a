// Move - re-parent a child: open the new edge, then close the old one

use super::{upstream_kind, TransitionContext, TransitionOutcome};
use crate::error::{OrgChartError, Result};
use crate::events::MoveEntity;
use chrono::NaiveDate;
use tracing::info;

pub fn apply(ctx: &mut TransitionContext<'_>, movement: &MoveEntity, date: NaiveDate) -> Result<TransitionOutcome> {
    let mut outcome = TransitionOutcome::default();
    let kind = upstream_kind(movement.entity_type)?;
    let parent_type = movement
        .entity_type
        .parent()
        .ok_or_else(|| OrgChartError::UnknownEntityType(movement.entity_type.to_string()))?;

    let child = ctx.find_entity(movement.entity_type, &movement.child)?;
    let old_parent = ctx.find_parent(parent_type, &movement.old_parent)?;
    let new_parent = ctx.find_parent(parent_type, &movement.new_parent)?;

    ctx.tx.create_relationship(&new_parent, &child, kind, date)?;
    outcome.relationships_created += 1;
    info!("Created {} {} -> {}: 1 relationship(s) created", kind, new_parent.name, child.name);

    ctx.close_exactly_one(&old_parent, &child, kind, date, &mut outcome)?;

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use crate::error::OrgChartError;
    use crate::events::{Change, MoveEntity};
    use crate::model::{EntityType, RelationshipType};
    use crate::transitions::test_support::*;

    fn move_department(old_parent: &str, new_parent: &str, child: &str) -> Change {
        Change::Move(MoveEntity {
            entity_type: EntityType::Department,
            old_parent: old_parent.to_string(),
            new_parent: new_parent.to_string(),
            child: child.to_string(),
        })
    }

    #[test]
    fn test_move_reparents_department() {
        let mut graph = seeded_graph("2015-01-01", &[("Ministry A", &["Treasury"]), ("Ministry B", &[])]);
        let mut allocator = allocator_for(&mut graph);

        let outcome = run(
            &mut graph,
            &mut allocator,
            &event(1, "2016-03-01", move_department("Ministry A", "Ministry B", "Treasury")),
        )
        .unwrap();

        assert_eq!(outcome.relationships_created, 1);
        assert_eq!(outcome.relationships_closed, 1);
        assert_eq!(
            graph.edges(RelationshipType::HasDepartment, "Ministry B", "Treasury"),
            open("2016-03-01")
        );
        assert_eq!(
            graph.edges(RelationshipType::HasDepartment, "Ministry A", "Treasury"),
            closed("2015-01-01", "2016-03-01")
        );
    }

    #[test]
    fn test_move_from_wrong_parent_is_no_open_relationship() {
        let mut graph = seeded_graph(
            "2015-01-01",
            &[("Ministry A", &["Treasury"]), ("Ministry B", &[]), ("Ministry C", &[])],
        );
        let mut allocator = allocator_for(&mut graph);
        let before = graph.dump();

        let err = run(
            &mut graph,
            &mut allocator,
            &event(1, "2016-03-01", move_department("Ministry B", "Ministry C", "Treasury")),
        )
        .unwrap_err();

        assert!(matches!(err, OrgChartError::NoOpenRelationship { .. }));
        assert_eq!(graph.dump(), before);
    }

    #[test]
    fn test_move_unknown_child_fails() {
        let mut graph = seeded_graph("2015-01-01", &[("Ministry A", &[]), ("Ministry B", &[])]);
        let mut allocator = allocator_for(&mut graph);

        let err = run(
            &mut graph,
            &mut allocator,
            &event(1, "2016-03-01", move_department("Ministry A", "Ministry B", "Ghost Office")),
        )
        .unwrap_err();

        assert!(matches!(err, OrgChartError::EntityNotFound { .. }));
    }

    #[test]
    fn test_move_minister_to_unknown_government_fails() {
        let mut graph = seeded_graph("2015-01-01", &[("Ministry A", &[])]);
        let mut allocator = allocator_for(&mut graph);

        let err = run(
            &mut graph,
            &mut allocator,
            &event(
                1,
                "2016-03-01",
                Change::Move(MoveEntity {
                    entity_type: EntityType::Minister,
                    old_parent: GOV.to_string(),
                    new_parent: "Caretaker Government".to_string(),
                    child: "Ministry A".to_string(),
                }),
            ),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            OrgChartError::ParentNotFound { ref name, .. } if name == "Caretaker Government"
        ));
    }
}
