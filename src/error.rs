// Error taxonomy for the org-chart engine
// Every failure inside a batch surfaces as one of these and aborts the whole batch.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrgChartError>;

#[derive(Debug, Error)]
pub enum OrgChartError {
    /// Bad or missing input field. Raised before any graph mutation for the event.
    #[error("malformed event {transaction_id}: field `{field}`: {reason}")]
    MalformedEvent {
        transaction_id: String,
        field: String,
        reason: String,
    },

    #[error("unknown entity type `{0}`")]
    UnknownEntityType(String),

    #[error("unknown relationship type `{0}`")]
    UnknownRelationshipType(String),

    #[error("parent {entity_type} `{name}` not found")]
    ParentNotFound { entity_type: String, name: String },

    #[error("{entity_type} `{name}` not found")]
    EntityNotFound { entity_type: String, name: String },

    #[error("no open {kind} relationship {from} -> {to}")]
    NoOpenRelationship {
        kind: String,
        from: String,
        to: String,
    },

    #[error("duplicate open {kind} relationship {from} -> {to}")]
    DuplicateOpenRelationship {
        kind: String,
        from: String,
        to: String,
    },

    #[error("graph store unavailable: {0}")]
    StoreUnavailable(#[from] rusqlite::Error),

    /// Wraps the error of the event that aborted a batch.
    #[error("transaction {transaction_id} failed: {source}")]
    EventFailed {
        transaction_id: u64,
        #[source]
        source: Box<OrgChartError>,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
}

impl OrgChartError {
    pub fn malformed(transaction_id: impl ToString, field: &str, reason: impl Into<String>) -> Self {
        OrgChartError::MalformedEvent {
            transaction_id: transaction_id.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Transaction id of the event that aborted the batch, if any.
    pub fn failed_transaction(&self) -> Option<u64> {
        match self {
            OrgChartError::EventFailed { transaction_id, .. } => Some(*transaction_id),
            _ => None,
        }
    }

    /// Innermost error, unwrapping `EventFailed`.
    pub fn root(&self) -> &OrgChartError {
        match self {
            OrgChartError::EventFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_failed_exposes_transaction_and_root() {
        let inner = OrgChartError::NoOpenRelationship {
            kind: "HAS_DEPARTMENT".to_string(),
            from: "Ministry A".to_string(),
            to: "Treasury".to_string(),
        };
        let err = OrgChartError::EventFailed {
            transaction_id: 7,
            source: Box::new(inner),
        };

        assert_eq!(err.failed_transaction(), Some(7));
        assert!(matches!(err.root(), OrgChartError::NoOpenRelationship { .. }));
        assert!(err.to_string().contains("transaction 7 failed"));
    }

    #[test]
    fn test_malformed_names_field_and_transaction() {
        let err = OrgChartError::malformed(12, "date", "not a calendar date");
        let text = err.to_string();

        assert!(text.contains("12"));
        assert!(text.contains("`date`"));
    }
}
