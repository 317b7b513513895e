//! Scripted [`QueryService`] used by the runner tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use athena_query::*;

/// Replays a status script in order. Once the script is exhausted every
/// further check reports `RUNNING`.
pub struct MockService {
    script: Mutex<VecDeque<Result<QueryStatus, ServiceError>>>,
    rows: Result<Vec<RawRow>, ServiceError>,
    submit_error: Option<ServiceError>,
    pub submits: AtomicUsize,
    pub status_checks: AtomicUsize,
    pub result_fetches: AtomicUsize,
    pub cancels: AtomicUsize,
    pub last_request: Mutex<Option<QueryRequest>>,
}

impl MockService {
    pub fn new(script: Vec<Result<QueryStatus, ServiceError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            rows: Ok(Vec::new()),
            submit_error: None,
            submits: AtomicUsize::new(0),
            status_checks: AtomicUsize::new(0),
            result_fetches: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Script made only of status values.
    pub fn states(states: &[ExecutionStatus]) -> Self {
        Self::new(states.iter().map(|s| Ok(QueryStatus::new(*s))).collect())
    }

    pub fn with_rows(mut self, rows: Vec<RawRow>) -> Self {
        self.rows = Ok(rows);
        self
    }

    pub fn with_result_error(mut self, msg: &str) -> Self {
        self.rows = Err(ServiceError::new(msg));
        self
    }

    pub fn rejecting(mut self, msg: &str) -> Self {
        self.submit_error = Some(ServiceError::new(msg));
        self
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl QueryService for MockService {
    async fn submit(&self, request: &QueryRequest) -> Result<QueryExecutionHandle, ServiceError> {
        let n = self.submits.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        match &self.submit_error {
            Some(err) => Err(err.clone()),
            None => Ok(QueryExecutionHandle::new(format!("exec-{n}"))),
        }
    }

    async fn status(&self, _handle: &QueryExecutionHandle) -> Result<QueryStatus, ServiceError> {
        self.status_checks.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(QueryStatus::new(ExecutionStatus::Running)))
    }

    async fn results(&self, _handle: &QueryExecutionHandle) -> Result<Vec<RawRow>, ServiceError> {
        self.result_fetches.fetch_add(1, Ordering::SeqCst);
        self.rows.clone()
    }

    async fn cancel(&self, _handle: &QueryExecutionHandle) -> Result<(), ServiceError> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn runner(service: MockService) -> QueryRunner<MockService> {
    QueryRunner::with_service(service, RunnerConfig::new("us-east-1"))
}

/// Fixed-interval policy with no wait, for tests that don't look at time.
pub fn no_wait(max_attempts: u32) -> QueryConfig {
    QueryConfig::new(Duration::ZERO, max_attempts, "us-east-1")
}

pub fn cell(v: &str) -> Option<String> {
    Some(v.to_string())
}
