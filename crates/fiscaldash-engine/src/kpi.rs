//! KPI aggregations over normalized tables.
//!
//! Everything here is pure and total: empty tables produce zeros and empty
//! lists, and a column that is missing or of the wrong type is read as empty.
//! Schema validation already happened in [`crate::normalize`].

use std::collections::{BTreeSet, HashMap};

use arrow::array::{Array, AsArray};
use arrow::datatypes::{DataType, Date32Type, Float64Type};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use fiscaldash_core::{
    CoverageSummary, DashboardReport, FrequencyEntry, KpiSummary, RuleCoverage, ValidationPolicy,
    columns,
};
use tracing::info;

use crate::EngineError;
use crate::normalize::NormalizedTables;
use crate::table::utf8_values;

/// Number of rules shown in the failing-rules chart.
pub const DEFAULT_TOP_N: usize = 10;

/// Options for [`build_report`].
#[derive(Debug, Clone, Copy)]
pub struct ReportOptions {
    pub policy: ValidationPolicy,
    pub top_n: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            policy: ValidationPolicy::default(),
            top_n: DEFAULT_TOP_N,
        }
    }
}

// ── Counters ──

/// Notes in the (already deduplicated, if configured) base table.
pub fn total_notes(notes: &RecordBatch) -> usize {
    notes.num_rows()
}

pub fn total_divergences(divergences: &RecordBatch) -> usize {
    divergences.num_rows()
}

/// Distinct non-blank values of `Campos Validados` in the catalog.
pub fn distinct_validated_fields(catalog: &RecordBatch) -> usize {
    utf8_values(catalog, columns::CATALOG_VALIDATED_FIELD)
        .into_iter()
        .flatten()
        .filter(|s| !s.trim().is_empty())
        .collect::<BTreeSet<_>>()
        .len()
}

/// Denominator of the success rate under the chosen policy.
///
/// [`ValidationPolicy::SummaryRows`] requires a summary table.
pub fn total_validations_possible(
    policy: ValidationPolicy,
    notes: &RecordBatch,
    catalog: &RecordBatch,
    summary: Option<&RecordBatch>,
) -> Result<usize, EngineError> {
    match policy {
        ValidationPolicy::NotesTimesFields => {
            Ok(total_notes(notes).saturating_mul(distinct_validated_fields(catalog)))
        }
        ValidationPolicy::SummaryRows => summary
            .map(|s| s.num_rows())
            .ok_or(EngineError::MissingSummary(policy)),
    }
}

/// `(possible - divergences) / possible`, or 0 when nothing was possible.
pub fn success_rate(total_validations_possible: usize, total_divergences: usize) -> f64 {
    if total_validations_possible == 0 {
        return 0.0;
    }
    let possible = total_validations_possible as f64;
    (possible - total_divergences as f64) / possible
}

// ── Frequency tables ──

/// Count occurrences, most frequent first. Equal counts keep the order in
/// which the values were first seen.
pub fn value_counts<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<FrequencyEntry> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut entries: Vec<FrequencyEntry> = Vec::new();
    for value in values {
        match index.get(value) {
            Some(&i) => entries[i].count += 1,
            None => {
                index.insert(value, entries.len());
                entries.push(FrequencyEntry::new(value, 1));
            }
        }
    }
    // `sort_by` is stable, which preserves first-seen order among ties.
    entries.sort_by(|a, b| b.count.cmp(&a.count));
    entries
}

/// The `n` rule IDs with the most divergences.
pub fn top_failing_rules(divergences: &RecordBatch, n: usize) -> Vec<FrequencyEntry> {
    let mut counts = value_counts(
        utf8_values(divergences, columns::RULE_ID)
            .into_iter()
            .map(Option::unwrap_or_default),
    );
    counts.truncate(n);
    counts
}

/// Divergences per branch state. Rows without a state are not counted.
pub fn divergence_distribution_by_region(divergences: &RecordBatch) -> Vec<FrequencyEntry> {
    value_counts(
        utf8_values(divergences, columns::DIVERGENCE_STATE)
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty()),
    )
}

// ── Coverage ──

/// Non-blank rule IDs of the catalog.
pub fn catalog_rule_ids(catalog: &RecordBatch) -> BTreeSet<String> {
    utf8_values(catalog, columns::RULE_ID)
        .into_iter()
        .flatten()
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Rule IDs that appear in at least one divergence.
pub fn divergence_rule_ids(divergences: &RecordBatch) -> BTreeSet<String> {
    utf8_values(divergences, columns::RULE_ID)
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect()
}

/// Catalog rules with no divergence in this sample, sorted ascending.
///
/// This is descriptive only: absence of divergences is not evidence that the
/// rule is correct.
pub fn uncovered_rules(catalog: &RecordBatch, divergences: &RecordBatch) -> Vec<String> {
    let failed = divergence_rule_ids(divergences);
    catalog_rule_ids(catalog)
        .into_iter()
        .filter(|id| !failed.contains(id))
        .collect()
}

/// Partition the catalog into rules with and without divergences.
pub fn rule_coverage(catalog: &RecordBatch, divergences: &RecordBatch) -> RuleCoverage {
    let catalog_ids = catalog_rule_ids(catalog);
    let failed = divergence_rule_ids(divergences);

    let (rules_with_divergences, uncovered_rules): (Vec<String>, Vec<String>) = catalog_ids
        .iter()
        .cloned()
        .partition(|id| failed.contains(id));
    let unknown_divergence_rules = failed.difference(&catalog_ids).cloned().collect();

    RuleCoverage {
        catalog_rules: catalog_ids.len(),
        rules_with_divergences,
        uncovered_rules,
        unknown_divergence_rules,
    }
}

/// `validated / total`, or 0 for an empty catalog.
pub fn coverage_ratio(validated_count: usize, total_rows: usize) -> f64 {
    if total_rows == 0 {
        return 0.0;
    }
    validated_count as f64 / total_rows as f64
}

/// Scenario coverage: rows whose quantity cell holds any value count as
/// validated, whatever that value is.
pub fn coverage_from_summary(summary: &RecordBatch) -> CoverageSummary {
    let total_rows = summary.num_rows();
    let validated_count = summary
        .column_by_name(columns::SUMMARY_QUANTITY)
        .filter(|col| *col.data_type() != DataType::Null)
        .map(|col| col.len() - col.null_count())
        .unwrap_or(0);
    let status_counts = value_counts(
        utf8_values(summary, columns::SUMMARY_STATUS)
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty()),
    );
    CoverageSummary {
        total_rows,
        validated_count,
        unvalidated_count: total_rows - validated_count,
        coverage_ratio: coverage_ratio(validated_count, total_rows),
        status_counts,
    }
}

// ── Divergence magnitude and period ──

/// Sum of `Diferença` over all divergences.
pub fn divergence_amount_total(divergences: &RecordBatch) -> f64 {
    divergences
        .column_by_name(columns::DIVERGENCE_AMOUNT)
        .and_then(|col| col.as_primitive_opt::<Float64Type>())
        .map(|arr| arr.iter().flatten().sum::<f64>())
        .unwrap_or(0.0)
}

/// Earliest and latest parseable note date among divergences.
pub fn note_date_range(divergences: &RecordBatch) -> Option<(NaiveDate, NaiveDate)> {
    let dates = divergences
        .column_by_name(columns::DIVERGENCE_NOTE_DATE)?
        .as_primitive_opt::<Date32Type>()?;
    let first = dates.iter().flatten().min()?;
    let last = dates.iter().flatten().max()?;
    Some((
        Date32Type::to_naive_date(first),
        Date32Type::to_naive_date(last),
    ))
}

// ── Report ──

/// Run every aggregation and assemble the dashboard report.
pub fn build_report(
    tables: &NormalizedTables,
    options: &ReportOptions,
) -> Result<DashboardReport, EngineError> {
    let total_notes = total_notes(&tables.notes);
    let possible = total_validations_possible(
        options.policy,
        &tables.notes,
        &tables.catalog,
        tables.summary.as_ref(),
    )?;
    let divergences = total_divergences(&tables.divergences);
    let date_range = note_date_range(&tables.divergences);

    let kpis = KpiSummary {
        total_notes,
        distinct_validated_fields: match options.policy {
            ValidationPolicy::NotesTimesFields => Some(distinct_validated_fields(&tables.catalog)),
            ValidationPolicy::SummaryRows => None,
        },
        total_validations_possible: possible,
        total_divergences: divergences,
        success_rate: success_rate(possible, divergences),
        divergence_amount_total: divergence_amount_total(&tables.divergences),
        first_note_date: date_range.map(|(first, _)| first.to_string()),
        last_note_date: date_range.map(|(_, last)| last.to_string()),
    };

    let report = DashboardReport {
        policy: options.policy,
        kpis,
        top_failing_rules: top_failing_rules(&tables.divergences, options.top_n),
        divergences_by_state: divergence_distribution_by_region(&tables.divergences),
        rule_coverage: rule_coverage(&tables.catalog, &tables.divergences),
        coverage: tables.summary.as_ref().map(coverage_from_summary),
    };

    info!(
        policy = %options.policy,
        notes = report.kpis.total_notes,
        possible = report.kpis.total_validations_possible,
        divergences = report.kpis.total_divergences,
        uncovered = report.rule_coverage.uncovered_rules.len(),
        "built dashboard report"
    );
    Ok(report)
}
