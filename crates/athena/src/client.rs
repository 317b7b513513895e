//! Remote query-execution service contract and its AWS Athena implementation.
//!
//! [`QueryService`] is the seam the runner polls through: submit, status,
//! results (first page) and a best-effort cancel. [`AthenaService`] backs it
//! with `aws-sdk-athena`; tests plug in scripted implementations.

use std::fmt;

use aws_config::BehaviorVersion;
use aws_sdk_athena::error::DisplayErrorContext;
use aws_sdk_athena::types::{QueryExecutionContext, QueryExecutionState, ResultConfiguration};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::RunnerConfig;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Error reported by a [`QueryService`] call (transport, auth, validation).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ServiceError(pub String);

impl ServiceError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Opaque identifier of one submitted query execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryExecutionHandle(String);

impl QueryExecutionHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryExecutionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a query execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    /// No further transitions happen after a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&QueryExecutionState> for ExecutionStatus {
    /// States the SDK does not know yet keep the loop polling.
    fn from(state: &QueryExecutionState) -> Self {
        match state {
            QueryExecutionState::Running => Self::Running,
            QueryExecutionState::Succeeded => Self::Succeeded,
            QueryExecutionState::Failed => Self::Failed,
            QueryExecutionState::Cancelled => Self::Cancelled,
            _ => Self::Queued,
        }
    }
}

/// One status observation, with the service's state-change reason if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStatus {
    pub state: ExecutionStatus,
    pub reason: Option<String>,
}

impl QueryStatus {
    pub fn new(state: ExecutionStatus) -> Self {
        Self { state, reason: None }
    }

    pub fn with_reason(state: ExecutionStatus, reason: impl Into<String>) -> Self {
        Self {
            state,
            reason: Some(reason.into()),
        }
    }
}

/// A result row as returned by the service; `None` is SQL NULL / absent.
pub type RawRow = Vec<Option<String>>;

/// Submission payload: query text plus where/how the service should run it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub sql: String,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub catalog: Option<String>,
    #[serde(default)]
    pub workgroup: Option<String>,
    /// S3 prefix the service writes results to.
    #[serde(default)]
    pub output_location: Option<String>,
    /// Idempotency token; resubmitting with the same token reuses the execution.
    #[serde(default)]
    pub client_request_token: Option<String>,
}

impl QueryRequest {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            ..Self::default()
        }
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn catalog(mut self, catalog: impl Into<String>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }

    pub fn workgroup(mut self, workgroup: impl Into<String>) -> Self {
        self.workgroup = Some(workgroup.into());
        self
    }

    pub fn output_location(mut self, location: impl Into<String>) -> Self {
        self.output_location = Some(location.into());
        self
    }

    pub fn client_request_token(mut self, token: impl Into<String>) -> Self {
        self.client_request_token = Some(token.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// Capabilities the runner needs from a remote query-execution service.
///
/// Implementations must be safe to share between concurrent calls.
#[async_trait::async_trait]
pub trait QueryService: Send + Sync {
    /// Start executing `request`; returns the execution handle.
    async fn submit(&self, request: &QueryRequest) -> Result<QueryExecutionHandle, ServiceError>;

    /// Current status of the execution.
    async fn status(&self, handle: &QueryExecutionHandle) -> Result<QueryStatus, ServiceError>;

    /// First page of result rows for a succeeded execution.
    async fn results(&self, handle: &QueryExecutionHandle) -> Result<Vec<RawRow>, ServiceError>;

    /// Ask the service to stop the execution.
    async fn cancel(&self, _handle: &QueryExecutionHandle) -> Result<(), ServiceError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Athena
// ---------------------------------------------------------------------------

/// [`QueryService`] backed by the AWS SDK Athena client.
#[derive(Debug, Clone)]
pub struct AthenaService {
    client: aws_sdk_athena::Client,
}

impl AthenaService {
    /// Load the AWS SDK config for `config.region` and build the client.
    ///
    /// Fails when the region is empty or the default chain yields no
    /// credentials provider.
    pub async fn connect(config: &RunnerConfig) -> Result<Self, ServiceError> {
        if config.region.trim().is_empty() {
            return Err(ServiceError::new("region must not be empty"));
        }

        let region = aws_sdk_athena::config::Region::new(config.region.clone());
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region);
        if let Some(profile) = &config.aws_profile {
            loader = loader.profile_name(profile);
        }
        let aws_cfg = loader.load().await;

        if aws_cfg.credentials_provider().is_none() {
            return Err(ServiceError::new("no AWS credentials provider configured"));
        }

        info!(
            region = %config.region,
            profile = config.aws_profile.as_deref().unwrap_or("default"),
            "Athena client initialised"
        );

        Ok(Self::from_client(aws_sdk_athena::Client::new(&aws_cfg)))
    }

    /// Wrap an already configured SDK client.
    pub fn from_client(client: aws_sdk_athena::Client) -> Self {
        Self { client }
    }
}

fn sdk_error<E: std::error::Error>(err: E) -> ServiceError {
    ServiceError(DisplayErrorContext(err).to_string())
}

#[async_trait::async_trait]
impl QueryService for AthenaService {
    async fn submit(&self, request: &QueryRequest) -> Result<QueryExecutionHandle, ServiceError> {
        let context = QueryExecutionContext::builder()
            .set_database(request.database.clone())
            .set_catalog(request.catalog.clone())
            .build();

        let result_configuration = request
            .output_location
            .as_ref()
            .map(|loc| ResultConfiguration::builder().output_location(loc).build());

        let resp = self
            .client
            .start_query_execution()
            .query_string(&request.sql)
            .query_execution_context(context)
            .set_result_configuration(result_configuration)
            .set_work_group(request.workgroup.clone())
            .set_client_request_token(request.client_request_token.clone())
            .send()
            .await
            .map_err(sdk_error)?;

        let id = resp
            .query_execution_id()
            .ok_or_else(|| ServiceError::new("no query execution ID returned"))?;

        Ok(QueryExecutionHandle::new(id))
    }

    async fn status(&self, handle: &QueryExecutionHandle) -> Result<QueryStatus, ServiceError> {
        let resp = self
            .client
            .get_query_execution()
            .query_execution_id(handle.as_str())
            .send()
            .await
            .map_err(sdk_error)?;

        let status = resp
            .query_execution()
            .ok_or_else(|| ServiceError::new("no query execution in response"))?
            .status();

        let state = status
            .and_then(|s| s.state())
            .map(ExecutionStatus::from)
            .unwrap_or(ExecutionStatus::Queued);

        let reason = status.and_then(|s| {
            s.athena_error()
                .and_then(|e| e.error_message())
                .or_else(|| s.state_change_reason())
                .map(str::to_string)
        });

        Ok(QueryStatus { state, reason })
    }

    async fn results(&self, handle: &QueryExecutionHandle) -> Result<Vec<RawRow>, ServiceError> {
        let resp = self
            .client
            .get_query_results()
            .query_execution_id(handle.as_str())
            .send()
            .await
            .map_err(sdk_error)?;

        let result_set = resp
            .result_set()
            .ok_or_else(|| ServiceError::new("no ResultSet in response"))?;

        if resp.next_token().is_some() {
            debug!(query_id = %handle, "Result set has more pages; only the first is read");
        }

        Ok(result_set
            .rows()
            .iter()
            .map(|row| {
                row.data()
                    .iter()
                    .map(|datum| datum.var_char_value().map(str::to_string))
                    .collect()
            })
            .collect())
    }

    async fn cancel(&self, handle: &QueryExecutionHandle) -> Result<(), ServiceError> {
        self.client
            .stop_query_execution()
            .query_execution_id(handle.as_str())
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }
}
