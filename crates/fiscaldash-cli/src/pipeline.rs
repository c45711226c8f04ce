//! One dashboard pass: load → normalize → aggregate.

use std::sync::Arc;

use anyhow::Context;
use arrow::record_batch::RecordBatch;
use fiscaldash_core::{DashboardReport, ValidationPolicy};
use fiscaldash_engine::{
    EngineError, NormalizeOptions, RawTables, ReportOptions, build_report, normalize,
};
use fiscaldash_fetch::{Fetch, SourceFetcher, TableLoader};
use tracing::info;

/// Source locations for one dashboard.
#[derive(Debug, Clone)]
pub struct Sources {
    pub base: String,
    pub rules: String,
    /// `None` means no divergence export is configured.
    pub divergences: Option<String>,
    pub summary: Option<String>,
}

pub struct Dashboard<F = SourceFetcher> {
    loader: TableLoader<F>,
    sources: Sources,
    normalize: NormalizeOptions,
    report: ReportOptions,
}

impl<F: Fetch> Dashboard<F> {
    pub fn new(
        loader: TableLoader<F>,
        sources: Sources,
        normalize: NormalizeOptions,
        report: ReportOptions,
    ) -> Self {
        Self {
            loader,
            sources,
            normalize,
            report,
        }
    }

    pub fn loader(&self) -> &TableLoader<F> {
        &self.loader
    }

    /// Fetch every configured source. Any failure aborts the pass.
    pub async fn load(&self) -> anyhow::Result<RawTables> {
        let notes = self.load_one("base notes", &self.sources.base).await?;
        let catalog = self.load_one("rule catalog", &self.sources.rules).await?;
        let divergences = match &self.sources.divergences {
            Some(location) => Some(self.load_one("divergences", location).await?),
            None => None,
        };
        let summary = match &self.sources.summary {
            Some(location) => Some(self.load_one("summary", location).await?),
            None => None,
        };
        Ok(RawTables {
            notes,
            catalog,
            divergences,
            summary,
        })
    }

    async fn load_one(&self, name: &str, location: &str) -> anyhow::Result<RecordBatch> {
        let table: Arc<RecordBatch> = self
            .loader
            .load(location)
            .await
            .with_context(|| format!("loading {name} from {location}"))?;
        // RecordBatch clones share the underlying buffers.
        Ok(table.as_ref().clone())
    }

    /// Run a full pass and return the report.
    pub async fn run(&self) -> anyhow::Result<DashboardReport> {
        if self.report.policy == ValidationPolicy::SummaryRows && self.sources.summary.is_none() {
            return Err(EngineError::MissingSummary(self.report.policy))
                .context("a summary export (--summary-url) is required");
        }

        let raw = self.load().await?;
        let tables = normalize(&raw, &self.normalize).context("normalizing tables")?;
        let report = build_report(&tables, &self.report).context("computing KPIs")?;
        info!(
            success_rate = report.kpis.success_rate,
            clean = report.is_clean(),
            "dashboard pass complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiscaldash_fetch::TableCache;
    use std::path::Path;

    const BASE: &str = "FILIAL,NUMNOTA,SERIE\n1,100,1\n1,101,1\n,,\n2,100,1\n1,100,1\n";
    const RULES: &str = "Número da Regra,Campos Validados\n\
        R1 - ICMS,CFOP\n\
        R1 - ICMS,NCM\n\
        R2 - IPI,CST\n\
        R3 - PIS,CFOP\n";
    const DIVERGENCES: &str = "ESTADO_FILIAL,NUMNOTA,SERIE,Regra Aplicada,Diferença,DTNOTA\n\
        SP,100,1,Regra: R1 - ICMS - Alíquota divergente,10.5,05/01/2024\n\
        SP,101,1,Regra: R1 - ICMS - CFOP inválido,abc,20/01/2024\n\
        RJ,100,1,Regra: R2 - IPI - CST inválido,2,31/13/2024\n";
    const SUMMARY: &str = "Status,Quantidade\nOK,2\nSem cenário,\nOK,1\nOK,\n";

    fn write(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path.display().to_string()
    }

    fn dashboard(dir: &Path, divergences: Option<&str>, summary: Option<&str>) -> Dashboard {
        let sources = Sources {
            base: write(dir, "base.csv", BASE),
            rules: write(dir, "regras.csv", RULES),
            divergences: divergences.map(|body| write(dir, "divergencias.csv", body)),
            summary: summary.map(|body| write(dir, "resumo.csv", body)),
        };
        Dashboard::new(
            TableLoader::new(SourceFetcher::default(), TableCache::default()),
            sources,
            NormalizeOptions::default(),
            ReportOptions::default(),
        )
    }

    #[tokio::test]
    async fn full_pass_over_local_exports() {
        let dir = tempfile::tempdir().unwrap();
        let report = dashboard(dir.path(), Some(DIVERGENCES), None)
            .run()
            .await
            .unwrap();

        assert_eq!(report.kpis.total_notes, 4);
        assert_eq!(report.kpis.distinct_validated_fields, Some(3));
        assert_eq!(report.kpis.total_validations_possible, 12);
        assert_eq!(report.kpis.total_divergences, 3);
        assert!((report.kpis.success_rate - 0.75).abs() < 1e-12);
        assert_eq!(report.kpis.divergence_amount_total, 12.5);
        assert_eq!(report.kpis.first_note_date.as_deref(), Some("2024-01-05"));
        assert_eq!(report.kpis.last_note_date.as_deref(), Some("2024-01-20"));

        assert_eq!(report.top_failing_rules[0].key, "R1 - ICMS");
        assert_eq!(report.top_failing_rules[0].count, 2);
        assert_eq!(report.divergences_by_state[0].key, "SP");
        assert_eq!(
            report.rule_coverage.uncovered_rules,
            vec!["R3 - PIS".to_string()]
        );
    }

    #[tokio::test]
    async fn dedup_counts_each_note_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut dash = dashboard(dir.path(), None, None);
        dash.normalize.note_key = Some(fiscaldash_engine::normalize::default_note_key());
        let report = dash.run().await.unwrap();
        assert_eq!(report.kpis.total_notes, 3);
    }

    #[tokio::test]
    async fn missing_divergence_source_is_clean() {
        let dir = tempfile::tempdir().unwrap();
        let report = dashboard(dir.path(), None, None).run().await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.rule_coverage.uncovered_rules.len(), 3);
    }

    #[tokio::test]
    async fn header_only_divergences_are_clean() {
        let dir = tempfile::tempdir().unwrap();
        let header = "ESTADO_FILIAL,Regra Aplicada,Diferença,DTNOTA\n";
        let report = dashboard(dir.path(), Some(header), None).run().await.unwrap();
        assert!(report.is_clean());
        assert!(report.top_failing_rules.is_empty());
    }

    #[tokio::test]
    async fn summary_policy_uses_summary_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut dash = dashboard(dir.path(), Some(DIVERGENCES), Some(SUMMARY));
        dash.report.policy = ValidationPolicy::SummaryRows;
        let report = dash.run().await.unwrap();
        assert_eq!(report.kpis.total_validations_possible, 4);
        let coverage = report.coverage.unwrap();
        assert_eq!(coverage.validated_count, 2);
        assert_eq!(coverage.unvalidated_count, 2);
        assert_eq!(coverage.coverage_ratio, 0.5);
        assert_eq!(coverage.status_counts[0].key, "OK");
        assert_eq!(coverage.status_counts[0].count, 3);
    }

    #[tokio::test]
    async fn summary_policy_without_summary_fails_before_fetching() {
        let dir = tempfile::tempdir().unwrap();
        let mut dash = dashboard(dir.path(), Some(DIVERGENCES), None);
        dash.report.policy = ValidationPolicy::SummaryRows;
        let err = dash.run().await.unwrap_err();
        assert!(format!("{err:#}").contains("summary"));
        assert!(dash.loader().cache().is_empty());
    }

    #[tokio::test]
    async fn missing_essential_source_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let mut dash = dashboard(dir.path(), Some(DIVERGENCES), None);
        dash.sources.rules = dir.path().join("absent.csv").display().to_string();
        let err = dash.run().await.unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("loading rule catalog"), "{message}");
        assert!(message.contains("absent.csv"), "{message}");
    }

    #[tokio::test]
    async fn missing_column_is_named() {
        let dir = tempfile::tempdir().unwrap();
        let mut dash = dashboard(dir.path(), None, None);
        dash.sources.rules = write(dir.path(), "bad.csv", "Número da Regra\nR1\n");
        let err = dash.run().await.unwrap_err();
        assert!(format!("{err:#}").contains("'Campos Validados'"));
    }

    #[tokio::test]
    async fn repeated_runs_reuse_cached_tables() {
        let dir = tempfile::tempdir().unwrap();
        let dash = dashboard(dir.path(), Some(DIVERGENCES), None);
        dash.run().await.unwrap();
        assert_eq!(dash.loader().cache().len(), 3);
        std::fs::remove_file(dir.path().join("base.csv")).unwrap();
        // Served from cache even though the file is gone.
        assert_eq!(dash.run().await.unwrap().kpis.total_notes, 4);
    }
}
