//! Rule identifier derivation for divergence records.
//!
//! Divergence exports describe the rule that fired as free text, e.g.
//! `"Regra: R001 - ICMS - Base de cálculo divergente"`. The catalog keys
//! rules by their leading two tokens (`"R001 - ICMS"`), so the join key is
//! recovered textually.

const SEGMENT_SEPARATOR: &str = " - ";
const RULE_PREFIX: &str = "Regra: ";

/// Derive the catalog join key (`ID_Regra`) from an applied-rule description.
///
/// Splits on `" - "`, keeps the first two segments, rejoins them with
/// `" - "`, then strips every occurrence of `"Regra: "`. Text with fewer than
/// two segments keeps whatever is there; the empty string maps to itself.
pub fn derive_rule_id(applied_rule: &str) -> String {
    let head: Vec<&str> = applied_rule.split(SEGMENT_SEPARATOR).take(2).collect();
    head.join(SEGMENT_SEPARATOR).replace(RULE_PREFIX, "")
}
