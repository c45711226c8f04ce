//! Terminal rendering of a dashboard report.
//!
//! Renders into a `String` so the whole dashboard can be printed in one write
//! (and compared in tests). Bars are scaled to the largest bucket.

use std::fmt::{self, Write};

use chrono::{DateTime, Utc};
use fiscaldash_core::{CoverageSummary, DashboardReport, FrequencyEntry};

const BAR_WIDTH: usize = 40;
const LABEL_WIDTH: usize = 32;
const UNKNOWN_RULE: &str = "(no rule text)";

const UNCOVERED_CAVEAT: &str = "Absence of divergences describes this sample only; \
     it is not evidence that a rule is correct.";

// ── Public API ──

/// Render the full dashboard.
pub fn render_text(report: &DashboardReport, generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_dashboard(&mut out, report, generated_at);
    out
}

fn write_dashboard(
    out: &mut String,
    report: &DashboardReport,
    generated_at: DateTime<Utc>,
) -> fmt::Result {
    writeln!(out, "=== Fiscal Rule Validation Dashboard ===")?;
    writeln!(
        out,
        "generated {}  policy {}",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.policy
    )?;
    writeln!(out)?;

    render_kpis(out, report)?;

    if report.is_clean() {
        writeln!(
            out,
            "No divergences found. Every validation in this sample passed."
        )?;
        writeln!(out)?;
    } else {
        render_bars(out, "Top Rules with Most Failures", &report.top_failing_rules)?;
        render_shares(out, "Divergences by State", &report.divergences_by_state)?;
    }

    if let Some(coverage) = &report.coverage {
        render_coverage(out, coverage)?;
    }
    render_uncovered(out, report)
}

/// Pretty JSON for `--format json`.
pub fn render_json(report: &DashboardReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

// ── Sections ──

fn render_kpis(out: &mut String, report: &DashboardReport) -> fmt::Result {
    let k = &report.kpis;
    writeln!(out, "Validation Quality")?;
    writeln!(out, "  {:<26} {}", "notes validated", group_thousands(k.total_notes))?;
    if let Some(fields) = k.distinct_validated_fields {
        writeln!(out, "  {:<26} {}", "validated fields", fields)?;
    }
    writeln!(
        out,
        "  {:<26} {}",
        "validations performed",
        group_thousands(k.total_validations_possible)
    )?;
    writeln!(
        out,
        "  {:<26} {}",
        "divergences found",
        group_thousands(k.total_divergences)
    )?;
    writeln!(out, "  {:<26} {}", "success rate", percent(k.success_rate, 2))?;
    if !report.is_clean() {
        writeln!(
            out,
            "  {:<26} {:.2}",
            "total difference", k.divergence_amount_total
        )?;
    }
    if let (Some(first), Some(last)) = (&k.first_note_date, &k.last_note_date) {
        writeln!(out, "  {:<26} {} .. {}", "note dates", first, last)?;
    }
    writeln!(out)
}

/// Horizontal bar chart, one bar per entry.
fn render_bars(out: &mut String, header: &str, entries: &[FrequencyEntry]) -> fmt::Result {
    writeln!(out, "{header}")?;
    let max = entries.iter().map(|e| e.count).max().unwrap_or(0);
    for entry in entries {
        writeln!(
            out,
            "  {:<width$} {} {}",
            truncate(display_key(&entry.key), LABEL_WIDTH),
            bar(entry.count, max),
            entry.count,
            width = LABEL_WIDTH
        )?;
    }
    writeln!(out)
}

/// Proportional breakdown (the donut chart of the web dashboard).
fn render_shares(out: &mut String, header: &str, entries: &[FrequencyEntry]) -> fmt::Result {
    writeln!(out, "{header}")?;
    let total: usize = entries.iter().map(|e| e.count).sum();
    for entry in entries {
        let share = if total == 0 {
            0.0
        } else {
            entry.count as f64 / total as f64
        };
        writeln!(
            out,
            "  {:<8} {:>7} {} {}",
            entry.key,
            percent(share, 1),
            bar(entry.count, total),
            entry.count
        )?;
    }
    writeln!(out)
}

fn render_coverage(out: &mut String, coverage: &CoverageSummary) -> fmt::Result {
    writeln!(out, "Scenario Coverage")?;
    writeln!(
        out,
        "  {:<26} {}",
        "rules with scenario", coverage.validated_count
    )?;
    writeln!(
        out,
        "  {:<26} {}",
        "rules without scenario", coverage.unvalidated_count
    )?;
    writeln!(
        out,
        "  {:<26} {} {}",
        "coverage",
        bar(coverage.validated_count, coverage.total_rows),
        percent(coverage.coverage_ratio, 1)
    )?;
    for status in &coverage.status_counts {
        writeln!(out, "  {:<26} {}", status.key, status.count)?;
    }
    writeln!(out)
}

fn render_uncovered(out: &mut String, report: &DashboardReport) -> fmt::Result {
    let cov = &report.rule_coverage;
    writeln!(out, "Rules with No Recorded Failures")?;
    writeln!(
        out,
        "  Of the {} rules in the catalog, {} had no divergence in this sample.",
        cov.catalog_rules,
        cov.uncovered_rules.len()
    )?;
    writeln!(out, "  {UNCOVERED_CAVEAT}")?;
    for id in &cov.uncovered_rules {
        writeln!(out, "    {id}")?;
    }
    if !cov.unknown_divergence_rules.is_empty() {
        writeln!(
            out,
            "  {} rule IDs in divergences are not in the catalog: {}",
            cov.unknown_divergence_rules.len(),
            cov.unknown_divergence_rules
                .iter()
                .map(|id| display_key(id))
                .collect::<Vec<_>>()
                .join(", ")
        )?;
    }
    Ok(())
}

// ── Helpers ──

fn display_key(key: &str) -> &str {
    if key.trim().is_empty() { UNKNOWN_RULE } else { key }
}

fn bar(count: usize, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    let filled = (count * BAR_WIDTH).div_ceil(max).min(BAR_WIDTH);
    "█".repeat(filled)
}

/// `0.987654` → `"98.77%"` with `decimals = 2`.
fn percent(ratio: f64, decimals: usize) -> String {
    format!("{:.*}%", decimals, ratio * 100.0)
}

/// `1234567` → `"1,234,567"`.
fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let head: String = s.chars().take(max - 3).collect();
    format!("{head}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fiscaldash_core::{KpiSummary, RuleCoverage, ValidationPolicy};

    fn report(divergences: usize) -> DashboardReport {
        DashboardReport {
            policy: ValidationPolicy::NotesTimesFields,
            kpis: KpiSummary {
                total_notes: 1500,
                distinct_validated_fields: Some(12),
                total_validations_possible: 18_000,
                total_divergences: divergences,
                success_rate: 0.99,
                divergence_amount_total: 10.0,
                first_note_date: None,
                last_note_date: None,
            },
            top_failing_rules: if divergences > 0 {
                vec![FrequencyEntry::new("R1 - ICMS", 2), FrequencyEntry::new("", 1)]
            } else {
                vec![]
            },
            divergences_by_state: if divergences > 0 {
                vec![FrequencyEntry::new("SP", 3), FrequencyEntry::new("RJ", 1)]
            } else {
                vec![]
            },
            rule_coverage: RuleCoverage {
                catalog_rules: 3,
                rules_with_divergences: vec!["R1 - ICMS".into()],
                uncovered_rules: vec!["R2 - IPI".into(), "R3 - PIS".into()],
                unknown_divergence_rules: vec![],
            },
            coverage: Some(CoverageSummary {
                total_rows: 10,
                validated_count: 6,
                unvalidated_count: 4,
                coverage_ratio: 0.6,
                status_counts: vec![
                    FrequencyEntry::new("OK", 6),
                    FrequencyEntry::new("Sem cenário", 4),
                ],
            }),
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn percentages() {
        assert_eq!(percent(0.6, 1), "60.0%");
        assert_eq!(percent(0.98765, 2), "98.77%");
    }

    #[test]
    fn bars_scale_to_max() {
        assert_eq!(bar(2, 2).chars().count(), BAR_WIDTH);
        assert_eq!(bar(1, 2).chars().count(), BAR_WIDTH / 2);
        assert_eq!(bar(0, 0), "");
    }

    #[test]
    fn dashboard_with_divergences() {
        let text = render_text(&report(3), at());
        assert!(text.contains("2024-03-01 12:00:00 UTC"));
        assert!(text.contains("18,000"));
        assert!(text.contains("99.00%"));
        assert!(text.contains("Top Rules with Most Failures"));
        assert!(text.contains(UNKNOWN_RULE));
        assert!(text.contains("75.0%"), "SP share of 4 divergences");
        assert!(text.contains("60.0%"));
        assert!(text.contains("Sem cenário"));
        assert!(text.contains("Of the 3 rules in the catalog, 2 had no divergence"));
        assert!(text.contains(UNCOVERED_CAVEAT));
        assert!(!text.contains("No divergences found"));
    }

    #[test]
    fn clean_dashboard_shows_success_message_without_charts() {
        let text = render_text(&report(0), at());
        assert!(text.contains("No divergences found"));
        assert!(!text.contains("Top Rules with Most Failures"));
        assert!(!text.contains("Divergences by State"));
    }

    #[test]
    fn uncovered_listing_keeps_sorted_order() {
        let text = render_text(&report(0), at());
        let r2 = text.find("    R2 - IPI").unwrap();
        let r3 = text.find("    R3 - PIS").unwrap();
        assert!(r2 < r3);
    }

    #[test]
    fn json_output_round_trips_keys() {
        let json = render_json(&report(3)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["coverage"]["validated_count"], 6);
        assert_eq!(value["policy"], "notes_times_fields");
    }
}
