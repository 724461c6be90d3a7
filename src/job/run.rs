//! Run context
//!
//! `JobRun::begin` and `JobRun::commit` mark the start and end of a run.
//! A run that stops early is closed with `JobRun::abort`.

use crate::config::JobParameters;
use crate::error::{Error, Result};
use crate::loader::LoadReport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Final state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

/// What a run did, written to the run log
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub job_name: String,
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub status: RunStatus,
    pub rows_loaded: usize,
    /// Stage and message of the error that ended the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub report: LoadReport,
}

/// An in-progress run
#[derive(Debug)]
pub struct JobRun {
    job_name: String,
    run_id: String,
    started_at: DateTime<Utc>,
    started: Instant,
    run_log: Option<PathBuf>,
}

impl JobRun {
    /// Start a run
    pub fn begin(params: &JobParameters) -> Self {
        let started_at = Utc::now();
        let run_id = format!(
            "{}-{:x}",
            started_at.format("%Y%m%dT%H%M%S"),
            started_at.timestamp_subsec_nanos()
        );

        tracing::info!("Starting job {} (run {run_id})", params.job_name);

        Self {
            job_name: params.job_name.clone(),
            run_id,
            started_at,
            started: Instant::now(),
            run_log: None,
        }
    }

    /// Write the run summary to `path` when the run ends
    #[must_use]
    pub fn with_run_log(mut self, path: Option<PathBuf>) -> Self {
        self.run_log = path;
        self
    }

    /// Unique id of this run
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    fn summary(&self, report: LoadReport, error: Option<&Error>) -> RunSummary {
        let status = if error.is_none() && report.is_success() {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        };

        RunSummary {
            job_name: self.job_name.clone(),
            run_id: self.run_id.clone(),
            started_at: self.started_at,
            finished_at: Utc::now(),
            duration_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            status,
            rows_loaded: report.loaded_rows(),
            error: error.map(Error::report),
            report,
        }
    }

    /// End the run with the load outcome
    ///
    /// Returns the summary when every table loaded, otherwise `Error::Load`.
    /// The run log is written first; failing to write it only fails a run
    /// that loaded everything.
    pub async fn commit(self, report: LoadReport) -> Result<RunSummary> {
        let failure = report.clone().into_result().err();
        let summary = self.summary(report, failure.as_ref());

        // A lost run log must not hide which table failed
        if let Err(e) = self.write_run_log(&summary).await {
            if failure.is_none() {
                return Err(e);
            }
            tracing::warn!("Failed to write run log: {e}");
        }

        match failure {
            None => {
                tracing::info!(
                    "Job {} committed: {} rows in {}ms",
                    self.job_name,
                    summary.rows_loaded,
                    summary.duration_ms
                );
                Ok(summary)
            }
            Some(e) => {
                tracing::error!("Job {} failed: {e}", self.job_name);
                Err(e)
            }
        }
    }

    /// End a run that stopped before loading
    pub async fn abort(self, error: Error) -> Error {
        tracing::error!("Job {} failed in {} stage: {error}", self.job_name, error.stage());

        let summary = self.summary(LoadReport::default(), Some(&error));
        if let Err(e) = self.write_run_log(&summary).await {
            tracing::warn!("Failed to write run log: {e}");
        }
        error
    }

    async fn write_run_log(&self, summary: &RunSummary) -> Result<()> {
        match &self.run_log {
            Some(path) => write_summary(path, summary).await,
            None => Ok(()),
        }
    }
}

/// Write a summary as pretty JSON, via a temp file and rename
pub async fn write_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    let contents = serde_json::to_string_pretty(summary)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let temp_path = path.with_extension("tmp");
    tokio::fs::write(&temp_path, &contents)
        .await
        .map_err(|e| Error::io(format!("Failed to write run log: {e}")))?;
    tokio::fs::rename(&temp_path, path)
        .await
        .map_err(|e| Error::io(format!("Failed to rename run log: {e}")))?;

    Ok(())
}
