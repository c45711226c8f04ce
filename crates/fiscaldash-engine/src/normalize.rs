//! Normalization of the raw spreadsheet exports into typed tables.
//!
//! Every function here returns fresh batches; the raw tables handed in by the
//! loader (often shared through its cache) are never modified.

use std::sync::Arc;

use arrow::array::{ArrayRef, AsArray, Date32Array, Float64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Date32Type, Field, Float64Type, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use fiscaldash_core::{columns, derive_rule_id, normalized};
use tracing::{debug, info};

use crate::table::{dedup_rows, drop_empty_rows, require_column, text_column};
use crate::{EngineError, TableKind};

const NOTE_DATE_FORMAT: &str = "%d/%m/%Y";

/// Tables as they come out of the loader.
#[derive(Debug, Clone)]
pub struct RawTables {
    pub notes: RecordBatch,
    pub catalog: RecordBatch,
    /// `None` when no divergence source is configured.
    pub divergences: Option<RecordBatch>,
    pub summary: Option<RecordBatch>,
}

/// Cleaned, typed tables ready for the KPI engine.
#[derive(Debug, Clone)]
pub struct NormalizedTables {
    pub notes: RecordBatch,
    pub catalog: RecordBatch,
    pub divergences: RecordBatch,
    pub summary: Option<RecordBatch>,
}

/// Knobs for normalization that depend on how a given export is laid out.
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// Deduplicate base notes on these columns; `None` counts every row.
    pub note_key: Option<Vec<String>>,
    /// Summary column holding the status label.
    pub summary_status_column: String,
    /// Summary column holding the nullable scenario count.
    pub summary_quantity_column: String,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            note_key: None,
            summary_status_column: columns::SUMMARY_STATUS.to_string(),
            summary_quantity_column: columns::SUMMARY_QUANTITY.to_string(),
        }
    }
}

/// Default note identity: (branch, number, series).
pub fn default_note_key() -> Vec<String> {
    [columns::NOTE_BRANCH, columns::NOTE_NUMBER, columns::NOTE_SERIES]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Normalize all loaded tables.
pub fn normalize(
    raw: &RawTables,
    options: &NormalizeOptions,
) -> Result<NormalizedTables, EngineError> {
    let notes = normalize_notes(&raw.notes, options.note_key.as_deref())?;
    let catalog = normalize_catalog(&raw.catalog)?;
    let divergences = match &raw.divergences {
        Some(batch) => normalize_divergences(batch)?,
        None => empty_divergences(),
    };
    let summary = raw
        .summary
        .as_ref()
        .map(|batch| normalize_summary(batch, options))
        .transpose()?;

    info!(
        notes = notes.num_rows(),
        catalog = catalog.num_rows(),
        divergences = divergences.num_rows(),
        summary = summary.as_ref().map(|s| s.num_rows()),
        "normalized tables"
    );
    Ok(NormalizedTables {
        notes,
        catalog,
        divergences,
        summary,
    })
}

/// Drop empty rows and, if a key is given, duplicate notes.
pub fn normalize_notes(
    batch: &RecordBatch,
    note_key: Option<&[String]>,
) -> Result<RecordBatch, EngineError> {
    let cleaned = drop_empty_rows(batch)?;
    match note_key {
        Some(key) => {
            let deduped = dedup_rows(&cleaned, TableKind::Notes, key)?;
            debug!(
                before = cleaned.num_rows(),
                after = deduped.num_rows(),
                "deduplicated notes"
            );
            Ok(deduped)
        }
        None => Ok(cleaned),
    }
}

/// Rename `Número da Regra` to `ID_Regra` as text and make the validated
/// field column text as well.
///
/// Output columns follow [`normalized::catalog_schema`], then every other
/// source column in its original order.
pub fn normalize_catalog(batch: &RecordBatch) -> Result<RecordBatch, EngineError> {
    let cleaned = drop_empty_rows(batch)?;
    let rule_ids = text_column(&cleaned, TableKind::Catalog, columns::CATALOG_RULE_NUMBER)?;
    let fields = text_column(&cleaned, TableKind::Catalog, columns::CATALOG_VALIDATED_FIELD)?;

    let canonical = normalized::catalog_schema();
    let mut out_fields: Vec<Field> = canonical
        .fields()
        .iter()
        .map(|f| f.as_ref().clone())
        .collect();
    let mut out_columns: Vec<ArrayRef> = vec![Arc::new(rule_ids), Arc::new(fields)];

    let schema = cleaned.schema();
    for (field, column) in schema.fields().iter().zip(cleaned.columns()) {
        let name = field.name().as_str();
        if name != columns::CATALOG_RULE_NUMBER && canonical.field_with_name(name).is_err() {
            out_fields.push(field.as_ref().clone());
            out_columns.push(Arc::clone(column));
        }
    }
    Ok(RecordBatch::try_new(
        Arc::new(Schema::new(out_fields)),
        out_columns,
    )?)
}

/// Type the divergence export and derive `ID_Regra`.
///
/// Output columns follow [`normalized::divergence_schema`], then every other
/// source column in its original order. A source with no columns at all is
/// treated as "no divergences" and yields an empty canonical table.
pub fn normalize_divergences(batch: &RecordBatch) -> Result<RecordBatch, EngineError> {
    if batch.num_columns() == 0 {
        return Ok(empty_divergences());
    }
    let cleaned = drop_empty_rows(batch)?;

    let state = text_column(&cleaned, TableKind::Divergences, columns::DIVERGENCE_STATE)?;
    let applied = text_column(
        &cleaned,
        TableKind::Divergences,
        columns::DIVERGENCE_APPLIED_RULE,
    )?;
    let amount = coerce_amount(require_column(
        &cleaned,
        TableKind::Divergences,
        columns::DIVERGENCE_AMOUNT,
    )?)?;
    let note_date = text_column(&cleaned, TableKind::Divergences, columns::DIVERGENCE_NOTE_DATE)?;

    let applied: StringArray = applied
        .iter()
        .map(|text| Some(text.unwrap_or_default()))
        .collect();
    let rule_ids: StringArray = applied
        .iter()
        .map(|text| text.map(derive_rule_id))
        .collect();
    let note_date = parse_note_dates(&note_date);

    let canonical = normalized::divergence_schema();
    let mut out_fields: Vec<Field> = canonical
        .fields()
        .iter()
        .map(|f| f.as_ref().clone())
        .collect();
    let mut out_columns: Vec<ArrayRef> = vec![
        Arc::new(state),
        Arc::new(applied),
        Arc::new(amount),
        Arc::new(note_date),
        Arc::new(rule_ids),
    ];

    let schema = cleaned.schema();
    for (field, column) in schema.fields().iter().zip(cleaned.columns()) {
        if canonical.field_with_name(field.name()).is_err() {
            out_fields.push(field.as_ref().clone());
            out_columns.push(Arc::clone(column));
        }
    }

    Ok(RecordBatch::try_new(
        Arc::new(Schema::new(out_fields)),
        out_columns,
    )?)
}

/// Rename the configured summary columns to their canonical names.
pub fn normalize_summary(
    batch: &RecordBatch,
    options: &NormalizeOptions,
) -> Result<RecordBatch, EngineError> {
    let cleaned = drop_empty_rows(batch)?;
    require_column(&cleaned, TableKind::Summary, &options.summary_status_column)?;
    require_column(&cleaned, TableKind::Summary, &options.summary_quantity_column)?;

    let schema = cleaned.schema();
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|field| {
            let name = field.name();
            if *name == options.summary_status_column {
                field.as_ref().clone().with_name(columns::SUMMARY_STATUS)
            } else if *name == options.summary_quantity_column {
                field.as_ref().clone().with_name(columns::SUMMARY_QUANTITY)
            } else {
                field.as_ref().clone()
            }
        })
        .collect();
    Ok(RecordBatch::try_new(
        Arc::new(Schema::new(fields)),
        cleaned.columns().to_vec(),
    )?)
}

fn empty_divergences() -> RecordBatch {
    RecordBatch::new_empty(Arc::new(normalized::divergence_schema()))
}

/// Cast to `Float64`; anything that does not parse, and NaN, becomes zero.
fn coerce_amount(column: &ArrayRef) -> Result<Float64Array, EngineError> {
    let numeric = cast(column.as_ref(), &DataType::Float64)?;
    Ok(numeric
        .as_primitive::<Float64Type>()
        .iter()
        .map(|v| Some(v.filter(|x| !x.is_nan()).unwrap_or(0.0)))
        .collect())
}

/// Parse `dd/mm/yyyy` dates; anything else becomes null.
fn parse_note_dates(text: &StringArray) -> Date32Array {
    text.iter()
        .map(|value| {
            value
                .and_then(|s| NaiveDate::parse_from_str(s.trim(), NOTE_DATE_FORMAT).ok())
                .map(Date32Type::from_naive_date)
        })
        .collect()
}
