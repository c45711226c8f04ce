use fiscaldash_core::ValidationPolicy;
use thiserror::Error;

/// Which source export a table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Notes,
    Catalog,
    Divergences,
    Summary,
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableKind::Notes => write!(f, "base notes"),
            TableKind::Catalog => write!(f, "rule catalog"),
            TableKind::Divergences => write!(f, "divergences"),
            TableKind::Summary => write!(f, "summary"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{table} table is missing expected column '{column}'")]
    MissingColumn { table: TableKind, column: String },

    #[error("the {0} policy needs a summary table, but none was loaded")]
    MissingSummary(ValidationPolicy),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}
