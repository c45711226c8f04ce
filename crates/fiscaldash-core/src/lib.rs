pub mod report;
pub mod rule_id;
pub mod schema;

pub use report::{
    CoverageSummary, DashboardReport, FrequencyEntry, KpiSummary, RuleCoverage, ValidationPolicy,
};
pub use rule_id::derive_rule_id;
pub use schema::{columns, normalized};
