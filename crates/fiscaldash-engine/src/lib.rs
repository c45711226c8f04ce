//! Engine layer: table cleaning, normalization of the raw exports, and the
//! pure KPI aggregations behind the dashboard.

mod error;
pub use error::{EngineError, TableKind};

pub mod kpi;
pub mod normalize;
pub mod table;

pub use kpi::{ReportOptions, build_report};
pub use normalize::{NormalizeOptions, NormalizedTables, RawTables, normalize};
