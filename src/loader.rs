// Event source - one CSV file per event kind, merged into one ordered log

use crate::error::{OrgChartError, Result};
use crate::events::{Event, EventKind, RawEvent};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Read every event file present in `dir` and return the events ordered
/// by transaction id. A missing file contributes no events.
pub fn load_events(dir: &Path) -> Result<Vec<Event>> {
    let mut events = Vec::new();

    for kind in EventKind::ALL {
        let path = dir.join(kind.file_name());
        if !path.exists() {
            debug!(file = %path.display(), "no {} events", kind);
            continue;
        }

        let file = std::fs::File::open(&path).map_err(|source| OrgChartError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let loaded = read_events(kind, file, &path.display().to_string())?;
        info!(file = %path.display(), count = loaded.len(), "loaded {} events", kind);
        events.extend(loaded);
    }

    events.sort_by_key(|e| e.transaction_id);
    Ok(events)
}

/// Parse events of a single kind from CSV text with a header row.
/// `origin` only labels errors.
pub fn read_events<R: Read>(kind: EventKind, reader: R, origin: &str) -> Result<Vec<Event>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut events = Vec::new();
    for result in rdr.deserialize::<RawEvent>() {
        let raw = result.map_err(|source| OrgChartError::Csv {
            path: origin.to_string(),
            source,
        })?;
        events.push(Event::from_raw(kind, &raw)?);
    }

    Ok(events)
}
