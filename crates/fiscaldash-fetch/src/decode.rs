//! Text decoding and CSV parsing into a single Arrow table.
//!
//! Spreadsheet exports are usually UTF-8, but files saved from older desktop
//! tools arrive as Latin-1. Decoding tries UTF-8 first and falls back to
//! Windows-1252, which is a superset of Latin-1's printable range.

use std::borrow::Cow;
use std::io::Cursor;
use std::sync::Arc;

use arrow::compute::concat_batches;
use arrow::csv::ReaderBuilder;
use arrow::csv::reader::Format;
use arrow::datatypes::Schema;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use encoding_rs::WINDOWS_1252;
use tracing::debug;

use crate::FetchError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Decode bytes as UTF-8, falling back to a single-byte decode.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(e) => {
            debug!(valid_up_to = e.valid_up_to(), "not UTF-8, decoding as Windows-1252");
            WINDOWS_1252.decode_without_bom_handling(bytes).0
        }
    }
}

/// Parse CSV text with a header row into one table, inferring column types.
///
/// Blank input yields a table with no columns and no rows.
pub fn parse_csv(text: &str) -> Result<RecordBatch, ArrowError> {
    if text.trim().is_empty() {
        return Ok(RecordBatch::new_empty(Arc::new(Schema::empty())));
    }

    let format = Format::default().with_header(true);
    let (schema, records) = format.infer_schema(Cursor::new(text.as_bytes()), None)?;
    let schema = Arc::new(schema);
    debug!(columns = schema.fields().len(), records, "inferred CSV schema");

    let reader = ReaderBuilder::new(Arc::clone(&schema))
        .with_header(true)
        .build(Cursor::new(text.as_bytes()))?;
    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    concat_batches(&schema, &batches)
}

/// Decode and parse the bytes fetched from `location`.
pub fn read_csv_table(location: &str, bytes: &[u8]) -> Result<RecordBatch, FetchError> {
    parse_csv(&decode_text(bytes)).map_err(|source| FetchError::Csv {
        location: location.to_string(),
        source,
    })
}
