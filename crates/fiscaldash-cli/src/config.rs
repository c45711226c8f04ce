//! Command-line and environment configuration.

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use fiscaldash_core::{ValidationPolicy, columns};
use fiscaldash_engine::{NormalizeOptions, ReportOptions};

use crate::pipeline::Sources;

// Published exports of the validation workbook (one sheet per gid).
const DEFAULT_BASE_URL: &str = "https://docs.google.com/spreadsheets/d/e/2PACX-1vQXjBJDTJKEqmfsJ7--1yKYu4GS_HGjSL6oYqmxvBQAuq531vP9Tn8aAtslzfcv7-nBI2etu-66UFg1/pub?gid=0&single=true&output=csv";
const DEFAULT_RULES_URL: &str = "https://docs.google.com/spreadsheets/d/e/2PACX-1vQXjBJDTJKEqmfsJ7--1yKYu4GS_HGjSL6oYqmxvBQAuq531vP9Tn8aAtslzfcv7-nBI2etu-66UFg1/pub?gid=811132636&single=true&output=csv";
const DEFAULT_DIVERGENCES_URL: &str = "https://docs.google.com/spreadsheets/d/e/2PACX-1vQXjBJDTJKEqmfsJ7--1yKYu4GS_HGjSL6oYqmxvBQAuq531vP9Tn8aAtslzfcv7-nBI2etu-66UFg1/pub?gid=752190062&single=true&output=csv";

#[derive(Debug, Parser)]
#[command(
    name = "fiscaldash",
    version,
    about = "Fiscal rule validation dashboard over published spreadsheet exports"
)]
pub struct Cli {
    #[command(flatten)]
    pub sources: SourceArgs,

    #[command(flatten)]
    pub analysis: AnalysisArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load every source once and print the dashboard.
    Report {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Re-run the dashboard periodically until interrupted.
    Watch {
        /// Seconds between refreshes.
        #[arg(long, default_value_t = 300)]
        interval: u64,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

impl Default for Command {
    fn default() -> Self {
        Command::Report {
            format: OutputFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    NotesTimesFields,
    SummaryRows,
}

impl From<PolicyArg> for ValidationPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::NotesTimesFields => ValidationPolicy::NotesTimesFields,
            PolicyArg::SummaryRows => ValidationPolicy::SummaryRows,
        }
    }
}

/// Where the four exports live. URLs or local paths.
#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Base notes export.
    #[arg(long, env = "FISCALDASH_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Rule catalog export.
    #[arg(long, env = "FISCALDASH_RULES_URL", default_value = DEFAULT_RULES_URL)]
    pub rules_url: String,

    /// Divergences export.
    #[arg(long, env = "FISCALDASH_DIVERGENCES_URL", default_value = DEFAULT_DIVERGENCES_URL)]
    pub divergences_url: String,

    /// Skip the divergences export and treat the sample as divergence-free.
    #[arg(long)]
    pub no_divergences: bool,

    /// Optional summary (resumo) export with one row per catalog rule.
    #[arg(long, env = "FISCALDASH_SUMMARY_URL")]
    pub summary_url: Option<String>,
}

impl SourceArgs {
    pub fn sources(&self) -> Sources {
        Sources {
            base: self.base_url.clone(),
            rules: self.rules_url.clone(),
            divergences: (!self.no_divergences).then(|| self.divergences_url.clone()),
            summary: self.summary_url.clone(),
        }
    }
}

#[derive(Debug, Args)]
pub struct AnalysisArgs {
    /// How total validations are counted.
    #[arg(long, value_enum, env = "FISCALDASH_POLICY", default_value_t = PolicyArg::NotesTimesFields)]
    pub policy: PolicyArg,

    /// Rules shown in the failing-rules chart.
    #[arg(long, default_value_t = fiscaldash_engine::kpi::DEFAULT_TOP_N)]
    pub top: usize,

    /// Count each (branch, number, series) note once.
    #[arg(long)]
    pub dedup_notes: bool,

    /// Columns identifying a note when deduplicating.
    #[arg(
        long,
        value_delimiter = ',',
        default_values_t = [
            columns::NOTE_BRANCH.to_string(),
            columns::NOTE_NUMBER.to_string(),
            columns::NOTE_SERIES.to_string(),
        ]
    )]
    pub note_key: Vec<String>,

    /// Summary column with the status label.
    #[arg(long, default_value = columns::SUMMARY_STATUS)]
    pub summary_status_column: String,

    /// Summary column with the nullable scenario count.
    #[arg(long, default_value = columns::SUMMARY_QUANTITY)]
    pub summary_quantity_column: String,

    /// Seconds a loaded table stays cached; unset keeps it for the process.
    #[arg(long, env = "FISCALDASH_CACHE_TTL")]
    pub cache_ttl: Option<u64>,

    /// HTTP timeout in seconds.
    #[arg(long, default_value_t = 30)]
    pub http_timeout: u64,
}

impl AnalysisArgs {
    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            note_key: self.dedup_notes.then(|| self.note_key.clone()),
            summary_status_column: self.summary_status_column.clone(),
            summary_quantity_column: self.summary_quantity_column.clone(),
        }
    }

    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            policy: self.policy.into(),
            top_n: self.top,
        }
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl.map(Duration::from_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout)
    }
}
