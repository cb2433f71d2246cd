//! Repository Analytics Engine
//!
//! Fetch, extract and aggregate, run strictly in sequence for one repository
//! URL. The workspace is released before `analyze` returns, on every path.

use crate::aggregator::aggregate;
use crate::config::{AnalysisOptions, EngineConfig};
use crate::error::{AnalysisError, ExtractionError};
use crate::fetcher::Fetcher;
use crate::git_analyzer::HistoryExtractor;
use crate::model::AnalyticsResult;
use std::time::Instant;
use tracing::info;

pub struct Analyzer {
    fetcher: Fetcher,
    defaults: AnalysisOptions,
}

impl Analyzer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            fetcher: Fetcher::new(config),
            defaults: config.defaults,
        }
    }

    /// Analyze `repo_url`. Unset bounds fall back to the configured defaults.
    pub async fn analyze(
        &self,
        repo_url: &str,
        window_days: Option<i64>,
        max_commits: Option<i64>,
    ) -> Result<AnalyticsResult, AnalysisError> {
        let options = AnalysisOptions::resolve(window_days, max_commits, self.defaults)?;
        let started = Instant::now();
        info!(
            "🔍 Analyzing repository: {} (window: {}d, cap: {})",
            repo_url, options.window_days, options.max_commits
        );

        let result = self
            .fetcher
            .with_workspace(repo_url, options.max_commits, |path| async move {
                let commits = tokio::task::spawn_blocking(move || {
                    HistoryExtractor::open(&path)?.extract(options.window_days, options.max_commits)
                })
                .await
                .map_err(|e| ExtractionError::Interrupted(e.to_string()))??;

                Ok(aggregate(&commits))
            })
            .await?;

        info!(
            "📊 Analyzed {}: {} commits from {} contributors in {:?}",
            repo_url,
            result.summary.total_commits,
            result.summary.total_contributors,
            started.elapsed()
        );
        Ok(result)
    }
}
