// 🌱 Snapshot seeding - one-shot import of an initial org chart
//
// Layout of a snapshot directory:
//   government.csv, minister.csv, department.csv   id,name
//   gov-min.csv    gov_id,min_id,start_time,end_time
//   min-dep.csv    min_id,dep_id,start_time,end_time
//
// Everything is imported in one transaction. A blank or `-1` end time
// means the relationship is still open.

use crate::error::{OrgChartError, Result};
use crate::graph::{GraphStore, GraphTx};
use crate::model::{self, EntityRef, EntityType, RelationshipType};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

pub const GOVERNMENT_FILE: &str = "government.csv";
pub const MINISTER_FILE: &str = "minister.csv";
pub const DEPARTMENT_FILE: &str = "department.csv";
pub const GOV_MIN_FILE: &str = "gov-min.csv";
pub const MIN_DEP_FILE: &str = "min-dep.csv";

#[derive(Debug, Deserialize)]
struct EntityRow {
    id: String,
    name: String,
}

/// Columns are positional: parent id, child id, start, end
#[derive(Debug, Deserialize)]
struct LinkRow {
    parent_id: String,
    child_id: String,
    start_time: String,
    end_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedReport {
    pub entities: usize,
    pub relationships_open: usize,
    pub relationships_closed: usize,
}

/// Import the snapshot in `dir`. Missing files contribute nothing.
pub fn seed_from_dir<S: GraphStore>(store: &mut S, dir: &Path) -> Result<SeedReport> {
    if !dir.is_dir() {
        return Err(OrgChartError::Io {
            path: dir.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "snapshot directory not found"),
        });
    }

    let governments = read_rows::<EntityRow>(&dir.join(GOVERNMENT_FILE))?;
    let ministers = read_rows::<EntityRow>(&dir.join(MINISTER_FILE))?;
    let departments = read_rows::<EntityRow>(&dir.join(DEPARTMENT_FILE))?;
    let gov_min = read_rows::<LinkRow>(&dir.join(GOV_MIN_FILE))?;
    let min_dep = read_rows::<LinkRow>(&dir.join(MIN_DEP_FILE))?;

    let entity_files = [
        (EntityType::Government, GOVERNMENT_FILE, &governments),
        (EntityType::Minister, MINISTER_FILE, &ministers),
        (EntityType::Department, DEPARTMENT_FILE, &departments),
    ];
    for (_, file, rows) in entity_files {
        reject_duplicate_names(file, rows)?;
    }

    let report = store.with_transaction(|tx| {
        let mut report = SeedReport::default();

        for (entity_type, _, rows) in entity_files {
            for (_, row) in rows {
                let (entity, _) = tx.find_or_create_entity(entity_type, &row.name)?;
                tx.set_entity_id(&entity, &row.id)?;
                report.entities += 1;
            }
            info!("Imported {} {} node(s)", rows.len(), entity_type);
        }

        for (kind, file, rows) in [
            (RelationshipType::HasMinister, GOV_MIN_FILE, &gov_min),
            (RelationshipType::HasDepartment, MIN_DEP_FILE, &min_dep),
        ] {
            for (line, row) in rows {
                let origin = format!("{}:{}", file, line);
                link(tx, kind, row, &origin, &mut report)?;
            }
            info!("Imported {} {} relationship(s)", rows.len(), kind);
        }

        Ok(report)
    })?;

    info!(
        entities = report.entities,
        open = report.relationships_open,
        closed = report.relationships_closed,
        "snapshot seeded"
    );
    Ok(report)
}

fn link(
    tx: &mut dyn GraphTx,
    kind: RelationshipType,
    row: &LinkRow,
    origin: &str,
    report: &mut SeedReport,
) -> Result<()> {
    let (parent_type, child_type) = kind
        .endpoints()
        .ok_or_else(|| OrgChartError::UnknownRelationshipType(kind.to_string()))?;
    let parent = by_id(tx, parent_type, &row.parent_id)?;
    let child = by_id(tx, child_type, &row.child_id)?;

    let start = model::parse_date(&row.start_time).ok_or_else(|| {
        OrgChartError::malformed(origin, "start_time", format!("`{}` is not a calendar date", row.start_time))
    })?;
    let end = model::parse_end_date(row.end_time.as_deref())
        .map_err(|reason| OrgChartError::malformed(origin, "end_time", reason))?;

    match end {
        Some(end) if end < start => Err(OrgChartError::malformed(
            origin,
            "end_time",
            format!("ends {} before it starts {}", end, start),
        )),
        Some(end) => {
            tx.create_closed_relationship(&parent, &child, kind, start, end)?;
            report.relationships_closed += 1;
            Ok(())
        }
        None => {
            tx.create_relationship(&parent, &child, kind, start)?;
            report.relationships_open += 1;
            Ok(())
        }
    }
}

/// A name may appear once per entity file
fn reject_duplicate_names(file: &str, rows: &[(u64, EntityRow)]) -> Result<()> {
    let mut seen: HashMap<&str, u64> = HashMap::new();
    for (line, row) in rows {
        if let Some(first) = seen.insert(row.name.as_str(), *line) {
            return Err(OrgChartError::malformed(
                format!("{}:{}", file, line),
                "name",
                format!("`{}` is already listed on line {}", row.name, first),
            ));
        }
    }
    Ok(())
}

fn by_id(tx: &mut dyn GraphTx, entity_type: EntityType, id: &str) -> Result<EntityRef> {
    tx.find_entity_by_id(entity_type, id)?
        .ok_or_else(|| OrgChartError::EntityNotFound {
            entity_type: entity_type.to_string(),
            name: format!("id {}", id),
        })
}

/// Rows of one snapshot file with their line numbers, by column position
fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<(u64, T)>> {
    if !path.exists() {
        debug!(file = %path.display(), "snapshot file absent");
        return Ok(Vec::new());
    }

    let csv_error = |source: csv::Error| OrgChartError::Csv {
        path: path.display().to_string(),
        source,
    };
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_error)?;

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(csv_error)?;
        let line = record.position().map_or(0, |p| p.line());
        rows.push((line, record.deserialize(None).map_err(csv_error)?));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteGraph;
    use std::fs;

    fn write_snapshot(dir: &Path, gov_min: &str, min_dep: &str) {
        fs::write(dir.join(GOVERNMENT_FILE), "id,name\ngzt_gov_1,Government of Sri Lanka\n").unwrap();
        fs::write(
            dir.join(MINISTER_FILE),
            "id,name\ngzt_min_1,Ministry of Finance\ngzt_min_7,Ministry of Health\n",
        )
        .unwrap();
        fs::write(dir.join(DEPARTMENT_FILE), "id,name\ngzt_dep_1,Treasury\ngzt_dep_2,Customs\n").unwrap();
        fs::write(dir.join(GOV_MIN_FILE), gov_min).unwrap();
        fs::write(dir.join(MIN_DEP_FILE), min_dep).unwrap();
    }

    #[test]
    fn test_seed_imports_nodes_and_relationships() {
        let dir = tempfile::tempdir().unwrap();
        write_snapshot(
            dir.path(),
            "gov_id,min_id,start_time,end_time\n\
             gzt_gov_1,gzt_min_1,2015-09-21,\n\
             gzt_gov_1,gzt_min_7,2015-09-21,-1\n",
            "min_id,dep_id,start_time,end_time\n\
             gzt_min_1,gzt_dep_1,2015-09-21,\n\
             gzt_min_7,gzt_dep_2,2015-09-21,2016-01-01\n",
        );
        let mut graph = SqliteGraph::open_in_memory().unwrap();

        let report = seed_from_dir(&mut graph, dir.path()).unwrap();

        assert_eq!(
            report,
            SeedReport {
                entities: 5,
                relationships_open: 3,
                relationships_closed: 1,
            }
        );
        assert_eq!(graph.entity_id(EntityType::Minister, "Ministry of Health"), Some("gzt_min_7".to_string()));
        assert_eq!(
            graph.edges(RelationshipType::HasMinister, "Government of Sri Lanka", "Ministry of Health"),
            vec![("2015-09-21".to_string(), None)]
        );
        assert_eq!(
            graph.edges(RelationshipType::HasDepartment, "Ministry of Health", "Customs"),
            vec![("2015-09-21".to_string(), Some("2016-01-01".to_string()))]
        );
    }

    #[test]
    fn test_seeded_ids_drive_the_allocator() {
        let dir = tempfile::tempdir().unwrap();
        write_snapshot(
            dir.path(),
            "gov_id,min_id,start_time,end_time\ngzt_gov_1,gzt_min_1,2015-09-21,\n",
            "min_id,dep_id,start_time,end_time\n",
        );
        let mut graph = SqliteGraph::open_in_memory().unwrap();
        seed_from_dir(&mut graph, dir.path()).unwrap();

        let engine = crate::engine::TransactionEngine::new(Default::default());
        let mut allocator = engine.seed_allocator(&mut graph).unwrap();

        // two ministers, highest suffix 7
        assert_eq!(allocator.allocate(EntityType::Minister).unwrap(), "gzt_min_8");
        assert_eq!(allocator.allocate(EntityType::Department).unwrap(), "gzt_dep_3");
    }

    #[test]
    fn test_unknown_id_in_link_file_aborts_seed() {
        let dir = tempfile::tempdir().unwrap();
        write_snapshot(
            dir.path(),
            "gov_id,min_id,start_time,end_time\ngzt_gov_1,gzt_min_99,2015-09-21,\n",
            "min_id,dep_id,start_time,end_time\n",
        );
        let mut graph = SqliteGraph::open_in_memory().unwrap();

        let err = seed_from_dir(&mut graph, dir.path()).unwrap_err();

        assert!(matches!(err, OrgChartError::EntityNotFound { .. }));
        assert!(graph.dump().nodes.is_empty());
    }

    #[test]
    fn test_bad_start_date_names_the_line() {
        let dir = tempfile::tempdir().unwrap();
        write_snapshot(
            dir.path(),
            "gov_id,min_id,start_time,end_time\ngzt_gov_1,gzt_min_1,someday,\n",
            "min_id,dep_id,start_time,end_time\n",
        );
        let mut graph = SqliteGraph::open_in_memory().unwrap();

        let err = seed_from_dir(&mut graph, dir.path()).unwrap_err();

        match err {
            OrgChartError::MalformedEvent { transaction_id, field, .. } => {
                assert_eq!(transaction_id, "gov-min.csv:2");
                assert_eq!(field, "start_time");
            }
            other => panic!("expected MalformedEvent, got {:?}", other),
        }
    }

    #[test]
    fn test_history_row_after_current_row_for_same_pair() {
        let dir = tempfile::tempdir().unwrap();
        write_snapshot(
            dir.path(),
            "gov_id,min_id,start_time,end_time\n\
             gzt_gov_1,gzt_min_1,2015-09-21,\n\
             gzt_gov_1,gzt_min_1,2010-01-01,2012-01-01\n",
            "min_id,dep_id,start_time,end_time\n",
        );
        let mut graph = SqliteGraph::open_in_memory().unwrap();

        let report = seed_from_dir(&mut graph, dir.path()).unwrap();

        assert_eq!(report.relationships_open, 1);
        assert_eq!(report.relationships_closed, 1);
        assert_eq!(
            graph.edges(RelationshipType::HasMinister, "Government of Sri Lanka", "Ministry of Finance"),
            vec![
                ("2010-01-01".to_string(), Some("2012-01-01".to_string())),
                ("2015-09-21".to_string(), None),
            ]
        );
    }

    #[test]
    fn test_end_before_start_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_snapshot(
            dir.path(),
            "gov_id,min_id,start_time,end_time\ngzt_gov_1,gzt_min_1,2015-09-21,2014-01-01\n",
            "min_id,dep_id,start_time,end_time\n",
        );
        let mut graph = SqliteGraph::open_in_memory().unwrap();

        let err = seed_from_dir(&mut graph, dir.path()).unwrap_err();

        assert!(matches!(err, OrgChartError::MalformedEvent { ref field, .. } if field == "end_time"));
        assert!(graph.dump().nodes.is_empty());
    }

    #[test]
    fn test_duplicate_name_in_entity_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_snapshot(
            dir.path(),
            "gov_id,min_id,start_time,end_time\n",
            "min_id,dep_id,start_time,end_time\n",
        );
        fs::write(
            dir.path().join(MINISTER_FILE),
            "id,name\ngzt_min_1,Ministry of Finance\ngzt_min_2,Ministry of Finance\n",
        )
        .unwrap();
        let mut graph = SqliteGraph::open_in_memory().unwrap();

        let err = seed_from_dir(&mut graph, dir.path()).unwrap_err();

        match err {
            OrgChartError::MalformedEvent { transaction_id, field, reason } => {
                assert_eq!(transaction_id, "minister.csv:3");
                assert_eq!(field, "name");
                assert!(reason.contains("line 2"), "{}", reason);
            }
            other => panic!("expected MalformedEvent, got {:?}", other),
        }
        assert!(graph.dump().nodes.is_empty());
    }

    #[test]
    fn test_missing_directory_is_an_io_error() {
        let mut graph = SqliteGraph::open_in_memory().unwrap();
        let err = seed_from_dir(&mut graph, Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, OrgChartError::Io { .. }));
    }
}
