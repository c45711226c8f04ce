//! Serializable dashboard report produced by the KPI engine.

use serde::{Deserialize, Serialize};

/// How the denominator of the success rate is obtained.
///
/// The two published versions of the dashboard disagree here, so callers
/// must pick one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationPolicy {
    /// Every note is checked against every distinct validated field.
    #[default]
    NotesTimesFields,
    /// One validation per row of the summary (resumo) table.
    SummaryRows,
}

impl std::fmt::Display for ValidationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationPolicy::NotesTimesFields => write!(f, "notes-times-fields"),
            ValidationPolicy::SummaryRows => write!(f, "summary-rows"),
        }
    }
}

/// One bucket of a frequency table (value count).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyEntry {
    pub key: String,
    pub count: usize,
}

impl FrequencyEntry {
    pub fn new(key: impl Into<String>, count: usize) -> Self {
        Self {
            key: key.into(),
            count,
        }
    }
}

/// Headline quality KPIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiSummary {
    pub total_notes: usize,
    /// Only set under [`ValidationPolicy::NotesTimesFields`].
    pub distinct_validated_fields: Option<usize>,
    pub total_validations_possible: usize,
    pub total_divergences: usize,
    /// Fraction in `[0, 1]` while divergences do not exceed validations.
    pub success_rate: f64,
    pub divergence_amount_total: f64,
    /// ISO 8601 date (`YYYY-MM-DD`) of the earliest divergent note.
    pub first_note_date: Option<String>,
    /// ISO 8601 date (`YYYY-MM-DD`) of the latest divergent note.
    pub last_note_date: Option<String>,
}

/// Split of the rule catalog by whether divergences were observed.
///
/// `uncovered_rules` only describes the current sample: a rule with no
/// divergences has not been shown correct, it simply did not fire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCoverage {
    pub catalog_rules: usize,
    pub rules_with_divergences: Vec<String>,
    pub uncovered_rules: Vec<String>,
    /// Rule IDs seen in divergences that the catalog does not list.
    pub unknown_divergence_rules: Vec<String>,
}

/// Scenario coverage taken from the summary (resumo) table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub total_rows: usize,
    pub validated_count: usize,
    pub unvalidated_count: usize,
    pub coverage_ratio: f64,
    /// Rows per status label, most frequent first.
    pub status_counts: Vec<FrequencyEntry>,
}

/// Everything the presentation layer needs for one render pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardReport {
    pub policy: ValidationPolicy,
    pub kpis: KpiSummary,
    pub top_failing_rules: Vec<FrequencyEntry>,
    pub divergences_by_state: Vec<FrequencyEntry>,
    pub rule_coverage: RuleCoverage,
    pub coverage: Option<CoverageSummary>,
}

impl DashboardReport {
    /// No divergences were recorded in this sample.
    pub fn is_clean(&self) -> bool {
        self.kpis.total_divergences == 0
    }
}
