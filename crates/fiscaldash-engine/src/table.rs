//! Name-based column access and row cleaning for Arrow tables.

use std::collections::HashSet;

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, StringArray};
use arrow::compute::{cast, filter_record_batch};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;

use crate::{EngineError, TableKind};

/// Look up a column by name, failing with [`EngineError::MissingColumn`].
pub fn require_column<'a>(
    batch: &'a RecordBatch,
    table: TableKind,
    name: &str,
) -> Result<&'a ArrayRef, EngineError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| EngineError::MissingColumn {
            table,
            column: name.to_string(),
        })
}

/// Fetch a column and cast it to `Utf8`, whatever type the CSV reader inferred.
pub fn text_column(
    batch: &RecordBatch,
    table: TableKind,
    name: &str,
) -> Result<StringArray, EngineError> {
    let col = require_column(batch, table, name)?;
    let text = cast(col.as_ref(), &DataType::Utf8)?;
    Ok(text.as_string::<i32>().clone())
}

/// Values of a `Utf8` column, or nothing if the column is absent or not text.
pub fn utf8_values<'a>(batch: &'a RecordBatch, name: &str) -> Vec<Option<&'a str>> {
    batch
        .column_by_name(name)
        .and_then(|col| col.as_string_opt::<i32>())
        .map(|arr| arr.iter().collect())
        .unwrap_or_default()
}

/// A cell is blank when it is null or, for text, only whitespace.
///
/// Columns the CSV reader inferred as `Null` (no value anywhere) carry no
/// validity buffer, so they are checked by type.
pub fn is_blank(col: &dyn Array, row: usize) -> bool {
    if col.data_type() == &DataType::Null || col.is_null(row) {
        return true;
    }
    if let Some(arr) = col.as_string_opt::<i32>() {
        return arr.value(row).trim().is_empty();
    }
    if let Some(arr) = col.as_string_opt::<i64>() {
        return arr.value(row).trim().is_empty();
    }
    false
}

/// Remove rows in which every cell is blank.
pub fn drop_empty_rows(batch: &RecordBatch) -> Result<RecordBatch, EngineError> {
    let keep: BooleanArray = (0..batch.num_rows())
        .map(|row| {
            Some(
                batch
                    .columns()
                    .iter()
                    .any(|col| !is_blank(col.as_ref(), row)),
            )
        })
        .collect();
    Ok(filter_record_batch(batch, &keep)?)
}

/// Keep the first row of every distinct combination of `key_columns`.
pub fn dedup_rows(
    batch: &RecordBatch,
    table: TableKind,
    key_columns: &[String],
) -> Result<RecordBatch, EngineError> {
    let keys = key_columns
        .iter()
        .map(|name| text_column(batch, table, name))
        .collect::<Result<Vec<_>, _>>()?;

    let mut seen: HashSet<Vec<Option<&str>>> = HashSet::with_capacity(batch.num_rows());
    let keep: BooleanArray = (0..batch.num_rows())
        .map(|row| {
            let key: Vec<Option<&str>> = keys
                .iter()
                .map(|col| (!col.is_null(row)).then(|| col.value(row)))
                .collect();
            Some(seen.insert(key))
        })
        .collect();
    Ok(filter_record_batch(batch, &keep)?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int64Array, NullArray};
    use arrow::datatypes::{Field, Schema};
    use proptest::prelude::*;
    use std::sync::Arc;

    /// Build a batch of nullable `Utf8` columns from string literals.
    pub(crate) fn text_batch(columns: &[(&str, Vec<Option<&str>>)]) -> RecordBatch {
        let fields: Vec<Field> = columns
            .iter()
            .map(|(name, _)| Field::new(*name, DataType::Utf8, true))
            .collect();
        let arrays: Vec<ArrayRef> = columns
            .iter()
            .map(|(_, values)| Arc::new(StringArray::from(values.clone())) as ArrayRef)
            .collect();
        RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).unwrap()
    }

    #[test]
    fn drops_only_fully_empty_rows() {
        let batch = text_batch(&[
            ("a", vec![Some("x"), None, Some("  "), None]),
            ("b", vec![None, None, Some("y"), Some("")]),
        ]);
        let cleaned = drop_empty_rows(&batch).unwrap();
        assert_eq!(cleaned.num_rows(), 2);
    }

    #[test]
    fn drop_empty_rows_is_idempotent() {
        let batch = text_batch(&[
            ("a", vec![Some("x"), None, None, Some("z")]),
            ("b", vec![None, None, Some(" "), None]),
        ]);
        let once = drop_empty_rows(&batch).unwrap();
        let twice = drop_empty_rows(&once).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.num_rows(), 2);
    }

    #[test]
    fn numeric_zero_is_not_blank() {
        let schema = Schema::new(vec![Field::new("n", DataType::Float64, true)]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(Float64Array::from(vec![Some(0.0), None]))],
        )
        .unwrap();
        assert_eq!(drop_empty_rows(&batch).unwrap().num_rows(), 1);
    }

    #[test]
    fn null_typed_columns_are_blank() {
        let schema = Schema::new(vec![
            Field::new("a", DataType::Utf8, true),
            Field::new("empty", DataType::Null, true),
        ]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(StringArray::from(vec![Some("x"), None])),
                Arc::new(NullArray::new(2)),
            ],
        )
        .unwrap();
        assert_eq!(drop_empty_rows(&batch).unwrap().num_rows(), 1);
    }

    #[test]
    fn missing_column_is_reported_by_name() {
        let batch = text_batch(&[("a", vec![Some("x")])]);
        let err = require_column(&batch, TableKind::Catalog, "Campos Validados").unwrap_err();
        assert_eq!(
            err.to_string(),
            "rule catalog table is missing expected column 'Campos Validados'"
        );
    }

    #[test]
    fn text_column_casts_numbers() {
        let schema = Schema::new(vec![Field::new("n", DataType::Int64, true)]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(Int64Array::from(vec![Some(101), None]))],
        )
        .unwrap();
        let text = text_column(&batch, TableKind::Catalog, "n").unwrap();
        assert_eq!(text.value(0), "101");
        assert!(text.is_null(1));
    }

    #[test]
    fn utf8_values_tolerates_missing_column() {
        let batch = text_batch(&[("a", vec![Some("x")])]);
        assert!(utf8_values(&batch, "nope").is_empty());
        assert_eq!(utf8_values(&batch, "a"), vec![Some("x")]);
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let batch = text_batch(&[
            ("FILIAL", vec![Some("1"), Some("1"), Some("2"), Some("1")]),
            ("NUMNOTA", vec![Some("10"), Some("10"), Some("10"), Some("11")]),
            ("extra", vec![Some("first"), Some("dup"), Some("x"), Some("y")]),
        ]);
        let keys = vec!["FILIAL".to_string(), "NUMNOTA".to_string()];
        let deduped = dedup_rows(&batch, TableKind::Notes, &keys).unwrap();
        assert_eq!(deduped.num_rows(), 3);
        assert_eq!(
            utf8_values(&deduped, "extra"),
            vec![Some("first"), Some("x"), Some("y")]
        );
    }

    fn cell() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            Just(None),
            Just(Some(String::new())),
            Just(Some("  ".to_string())),
            "[a-z]{1,3}".prop_map(Some),
        ]
    }

    proptest! {
        #[test]
        fn drop_empty_rows_idempotent_on_generated_tables(
            rows in prop::collection::vec((cell(), cell()), 0..40)
        ) {
            let a: Vec<Option<&str>> = rows.iter().map(|r| r.0.as_deref()).collect();
            let b: Vec<Option<&str>> = rows.iter().map(|r| r.1.as_deref()).collect();
            let batch = text_batch(&[("a", a), ("b", b)]);

            let once = drop_empty_rows(&batch).unwrap();
            let twice = drop_empty_rows(&once).unwrap();
            prop_assert_eq!(&once, &twice);

            let kept = rows
                .iter()
                .filter(|(x, y)| {
                    [x, y]
                        .iter()
                        .any(|c| c.as_deref().is_some_and(|s| !s.trim().is_empty()))
                })
                .count();
            prop_assert_eq!(once.num_rows(), kept);
        }
    }
}
