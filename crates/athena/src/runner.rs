//! Submit-poll-fetch driver for remote query executions.
//!
//! [`QueryRunner::execute_query`] turns an asynchronous execution into a
//! single awaited call: submit, check status up to `max_attempts` times,
//! then fetch the first page of results on success.

use tracing::{debug, error, info, warn};

use crate::client::{
    AthenaService, ExecutionStatus, QueryExecutionHandle, QueryRequest, QueryService, QueryStatus,
};
use crate::config::{QueryConfig, RunnerConfig};
use crate::result::ResultTable;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors returned by [`QueryRunner`].
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The client session could not be established.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The per-call polling policy is unusable.
    #[error("Invalid query config: {0}")]
    InvalidConfig(String),

    /// The service rejected the query at submission.
    #[error("Submission rejected: {0}")]
    Submission(String),

    /// Checking the execution status failed; polling was aborted.
    #[error("Status check for query {query_id} failed: {message}")]
    StatusFetch { query_id: String, message: String },

    /// The execution ended in `FAILED` or `CANCELLED`.
    #[error("Query {query_id} {state}: {reason}")]
    QueryExecution {
        query_id: String,
        state: ExecutionStatus,
        reason: String,
    },

    /// The attempt budget ran out before a terminal state was reached.
    #[error("Query {query_id} did not complete within {attempts} status checks")]
    Timeout { query_id: String, attempts: u32 },

    /// The execution succeeded but its results could not be read.
    #[error("Fetching results for query {query_id} failed: {message}")]
    ResultFetch { query_id: String, message: String },
}

impl QueryError {
    /// Whether calling again with a fresh submission might succeed.
    ///
    /// The runner never retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::StatusFetch { .. })
    }

    /// Execution ID the error relates to, if the query got that far.
    pub fn query_id(&self) -> Option<&str> {
        match self {
            Self::StatusFetch { query_id, .. }
            | Self::QueryExecution { query_id, .. }
            | Self::Timeout { query_id, .. }
            | Self::ResultFetch { query_id, .. } => Some(query_id),
            Self::Connection(_) | Self::InvalidConfig(_) | Self::Submission(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Runs queries against a [`QueryService`] and waits for their results.
///
/// Holds no per-call state, so one runner can serve concurrent calls
/// (share it behind an `Arc`).
pub struct QueryRunner<S = AthenaService> {
    service: S,
    defaults: RunnerConfig,
}

impl QueryRunner<AthenaService> {
    /// Connect to Athena in `config.region`.
    pub async fn new(config: &RunnerConfig) -> Result<Self, QueryError> {
        let service = AthenaService::connect(config)
            .await
            .map_err(|e| QueryError::Connection(e.to_string()))?;
        Ok(Self::with_service(service, config.clone()))
    }
}

impl<S: QueryService> QueryRunner<S> {
    /// Use an existing service; `defaults` feed [`Self::execute_sql`].
    pub fn with_service(service: S, defaults: RunnerConfig) -> Self {
        Self { service, defaults }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn defaults(&self) -> &RunnerConfig {
        &self.defaults
    }

    /// Run `sql` with the runner's default database, workgroup and output
    /// location.
    pub async fn execute_sql(
        &self,
        sql: &str,
        config: &QueryConfig,
    ) -> Result<ResultTable, QueryError> {
        let request = QueryRequest {
            sql: sql.to_string(),
            database: self.defaults.database.clone(),
            catalog: None,
            workgroup: self.defaults.workgroup.clone(),
            output_location: self.defaults.output_location.clone(),
            client_request_token: None,
        };
        self.execute_query(&request, config).await
    }

    /// Submit `request`, wait for a terminal state, and return its rows.
    ///
    /// Either a complete table or an error comes back, never a partial
    /// result.
    pub async fn execute_query(
        &self,
        request: &QueryRequest,
        config: &QueryConfig,
    ) -> Result<ResultTable, QueryError> {
        config.validate()?;

        info!(sql = %request.sql, "Submitting query");
        let handle = self
            .service
            .submit(request)
            .await
            .map_err(|e| QueryError::Submission(e.to_string()))?;
        info!(query_id = %handle, "Query execution started");

        self.poll_until_complete(&handle, config).await?;

        let table = self.fetch_results(&handle).await?;
        info!(query_id = %handle, rows = table.row_count(), "Query succeeded");
        Ok(table)
    }

    /// Check status until `Succeeded`, a failure terminal, or the attempt
    /// budget is spent. Status-check errors end the loop at once.
    async fn poll_until_complete(
        &self,
        handle: &QueryExecutionHandle,
        config: &QueryConfig,
    ) -> Result<(), QueryError> {
        let mut interval = config.wait_interval;

        for attempt in 1..=config.max_attempts {
            let status = self
                .service
                .status(handle)
                .await
                .map_err(|e| QueryError::StatusFetch {
                    query_id: handle.to_string(),
                    message: e.to_string(),
                })?;

            debug!(
                query_id = %handle,
                attempt,
                max_attempts = config.max_attempts,
                state = %status.state,
                "Polling query status"
            );

            match status.state {
                ExecutionStatus::Succeeded => return Ok(()),
                ExecutionStatus::Failed | ExecutionStatus::Cancelled => {
                    return Err(terminal_failure(handle, status));
                }
                ExecutionStatus::Queued | ExecutionStatus::Running => {}
            }

            if attempt < config.max_attempts {
                tokio::time::sleep(interval).await;
                interval = config.next_interval(interval);
            }
        }

        warn!(
            query_id = %handle,
            attempts = config.max_attempts,
            "Query did not reach a terminal state"
        );

        if config.cancel_on_timeout {
            match self.service.cancel(handle).await {
                Ok(()) => info!(query_id = %handle, "Query cancellation requested"),
                Err(e) => warn!(query_id = %handle, error = %e, "Failed to cancel timed-out query"),
            }
        }

        Err(QueryError::Timeout {
            query_id: handle.to_string(),
            attempts: config.max_attempts,
        })
    }

    async fn fetch_results(&self, handle: &QueryExecutionHandle) -> Result<ResultTable, QueryError> {
        let raw = self
            .service
            .results(handle)
            .await
            .map_err(|e| QueryError::ResultFetch {
                query_id: handle.to_string(),
                message: e.to_string(),
            })?;
        Ok(ResultTable::from_raw_rows(raw))
    }
}

fn terminal_failure(handle: &QueryExecutionHandle, status: QueryStatus) -> QueryError {
    let reason = match (status.reason, status.state) {
        (Some(reason), _) => reason,
        (None, ExecutionStatus::Cancelled) => "query was cancelled".to_string(),
        (None, _) => "query failed".to_string(),
    };

    if status.state == ExecutionStatus::Cancelled {
        warn!(query_id = %handle, reason = %reason, "Query was cancelled");
    } else {
        error!(query_id = %handle, reason = %reason, "Query failed");
    }

    QueryError::QueryExecution {
        query_id: handle.to_string(),
        state: status.state,
        reason,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
