/// Column names as published in the spreadsheet exports.
///
/// The exports are maintained by hand in Portuguese, so the names keep their
/// accents and spacing exactly as they appear in the header row.
pub mod columns {
    /// Canonical join key between the rule catalog and the divergences.
    pub const RULE_ID: &str = "ID_Regra";

    // ── Rule catalog ──

    pub const CATALOG_RULE_NUMBER: &str = "Número da Regra";
    pub const CATALOG_VALIDATED_FIELD: &str = "Campos Validados";

    // ── Divergences ──

    pub const DIVERGENCE_STATE: &str = "ESTADO_FILIAL";
    pub const DIVERGENCE_APPLIED_RULE: &str = "Regra Aplicada";
    pub const DIVERGENCE_AMOUNT: &str = "Diferença";
    pub const DIVERGENCE_NOTE_DATE: &str = "DTNOTA";

    // ── Base notes (identity of a fiscal note) ──

    pub const NOTE_BRANCH: &str = "FILIAL";
    pub const NOTE_NUMBER: &str = "NUMNOTA";
    pub const NOTE_SERIES: &str = "SERIE";

    // ── Summary (resumo) ──

    pub const SUMMARY_STATUS: &str = "Status";
    pub const SUMMARY_QUANTITY: &str = "Quantidade";
}

/// Arrow schemas for the tables produced by normalization.
pub mod normalized {
    use arrow::datatypes::{DataType, Field, Schema};

    use super::columns;

    /// Divergence columns whose types are fixed after normalization.
    ///
    /// Other columns of the source export pass through untouched and are
    /// appended after these by the normalizer.
    pub fn divergence_schema() -> Schema {
        Schema::new(vec![
            Field::new(columns::DIVERGENCE_STATE, DataType::Utf8, true),
            Field::new(columns::DIVERGENCE_APPLIED_RULE, DataType::Utf8, false),
            Field::new(columns::DIVERGENCE_AMOUNT, DataType::Float64, false),
            Field::new(columns::DIVERGENCE_NOTE_DATE, DataType::Date32, true),
            Field::new(columns::RULE_ID, DataType::Utf8, false),
        ])
    }

    /// Leading catalog columns after renaming `Número da Regra` to
    /// `ID_Regra`. Both stay nullable: the catalog is maintained by hand and
    /// rows may have gaps. Remaining source columns follow these.
    pub fn catalog_schema() -> Schema {
        Schema::new(vec![
            Field::new(columns::RULE_ID, DataType::Utf8, true),
            Field::new(columns::CATALOG_VALIDATED_FIELD, DataType::Utf8, true),
        ])
    }
}
