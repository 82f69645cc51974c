//! Job execution: load once, fan out to the rules, join in the report.
//!
//! [`JobRunner`] walks the [`TaskGraph`] stage by stage. Tasks of one
//! stage run together; the next stage starts only when all of them are
//! done, so the report always sees every rule's result for the same
//! snapshot.

pub mod graph;

pub use graph::{Task, TaskGraph};

use crate::config::JobConfig;
use crate::dataset::{self, DataSource, FilteredDataset};
use crate::error::{Error, Result};
use crate::report::{build_report, ReportFormat, WriteSummary};
use crate::retry::{RetryConfig, RetryExecutor};
use crate::rules::{self, Rule, RuleResult, RuleResults};
use std::future::Future;
use std::io::Write;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// What a finished run produced
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub year: i32,
    pub rows: usize,
    pub failed_rules: usize,
    pub output: WriteSummary,
}

/// Values passed between stages of one run
#[derive(Default)]
struct RunState {
    dataset: Option<FilteredDataset>,
    results: Vec<(Rule, RuleResult)>,
    summary: Option<RunSummary>,
}

pub struct JobRunner {
    source: Box<dyn DataSource>,
    year: i32,
    fetch_retry: RetryConfig,
    format: ReportFormat,
    graph: TaskGraph,
}

impl JobRunner {
    pub fn new(source: Box<dyn DataSource>, year: i32) -> Self {
        Self {
            source,
            year,
            fetch_retry: RetryConfig::fixed(0, std::time::Duration::ZERO),
            format: ReportFormat::Text,
            graph: TaskGraph::standard(),
        }
    }

    /// Runner for `config`, fetching from its configured source.
    pub fn from_config(config: &JobConfig) -> Result<Self> {
        let source =
            dataset::source_from_location(&config.job.source_url, config.job.http_timeout)?;
        Ok(Self::new(source, config.target_year()).with_fetch_retry(config.retry.fetch.clone()))
    }

    pub fn with_fetch_retry(mut self, retry: RetryConfig) -> Self {
        self.fetch_retry = retry;
        self
    }

    pub fn with_format(mut self, format: ReportFormat) -> Self {
        self.format = format;
        self
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Run to completion, writing the report to `out`.
    pub async fn run<W: Write>(&self, out: &mut W) -> Result<RunSummary> {
        self.run_until(out, std::future::pending::<()>()).await
    }

    /// Run, giving up if `shutdown` resolves before the data is loaded.
    ///
    /// Once loading has been cancelled no rule and no report is executed.
    pub async fn run_until<W, S>(&self, out: &mut W, shutdown: S) -> Result<RunSummary>
    where
        W: Write,
        S: Future<Output = ()>,
    {
        let started = Instant::now();
        let stages = self.graph.stages()?;
        info!(
            "Starting run for year {} ({} tasks in {} stages)",
            self.year,
            self.graph.len(),
            stages.len()
        );

        tokio::pin!(shutdown);
        let mut state = RunState::default();

        for (index, stage) in stages.iter().enumerate() {
            debug!(
                "Stage {}: {}",
                index,
                stage.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
            );

            let stage_rules: Vec<Rule> = stage
                .iter()
                .filter_map(|task| match task {
                    Task::Rule(rule) => Some(*rule),
                    _ => None,
                })
                .collect();

            for task in stage {
                match task {
                    Task::LoadData => {
                        let loaded = tokio::select! {
                            loaded = self.load_with_retry() => loaded?,
                            _ = &mut shutdown => {
                                info!("Run cancelled while loading data");
                                return Err(Error::Cancelled(Task::LoadData.to_string()));
                            }
                        };
                        state.dataset = Some(loaded);
                    }
                    Task::Report => {
                        let results = RuleResults::new(self.year, state.results.clone());
                        let report = build_report(&results);
                        let output = report.write_format(out, self.format);
                        state.summary = Some(RunSummary {
                            year: self.year,
                            rows: state.dataset.as_ref().map_or(0, FilteredDataset::len),
                            failed_rules: results.iter().filter(|(_, r)| r.is_err()).count(),
                            output,
                        });
                    }
                    Task::Rule(_) => {}
                }
            }

            if !stage_rules.is_empty() {
                let dataset = state.dataset.as_ref().ok_or_else(|| {
                    Error::TaskGraph("rules scheduled before data was loaded".to_string())
                })?;
                let mut results = rules::evaluate_parallel(dataset, &stage_rules).await?;
                state.results.append(&mut results);
            }
        }

        let summary = state
            .summary
            .ok_or_else(|| Error::TaskGraph("task graph has no report task".to_string()))?;
        info!(
            "Run for year {} finished in {:.2}s ({} rows, {} failed rules)",
            summary.year,
            started.elapsed().as_secs_f64(),
            summary.rows,
            summary.failed_rules
        );
        Ok(summary)
    }

    /// Run under a run-level retry policy, as the scheduler does.
    ///
    /// A failed run is started again from the fetch. A cancelled run is
    /// never retried.
    pub async fn run_with_retry<W: Write>(
        &self,
        retry: &RetryConfig,
        out: &mut W,
    ) -> Result<RunSummary> {
        let executor = RetryExecutor::new(retry.clone());
        let out = Mutex::new(out);
        let out = &out;

        let result = executor
            .execute_with_retry_when(
                move || async move {
                    let mut out = out.lock().await;
                    self.run(&mut **out).await
                },
                "run",
                |e: &Error| !matches!(e, Error::Cancelled(_)),
            )
            .await;

        let metrics = executor.metrics().await;
        info!(
            "Run for year {} took {} attempt(s) ({} retried)",
            self.year,
            metrics.total_attempts,
            metrics.retries.len()
        );
        result
    }

    async fn load_with_retry(&self) -> Result<FilteredDataset> {
        let executor = RetryExecutor::new(self.fetch_retry.clone());
        let loaded = executor
            .execute_with_retry_when(
                || dataset::load(self.source.as_ref(), self.year),
                Task::LoadData.to_string().as_str(),
                Error::is_fetch_failure,
            )
            .await;

        let metrics = executor.metrics().await;
        if !metrics.retries.is_empty() {
            debug!(
                "Fetch took {} attempt(s), waited {:?} in total",
                metrics.total_attempts,
                metrics.retries.iter().map(|(_, delay)| *delay).sum::<std::time::Duration>()
            );
        }
        loaded
    }
}
