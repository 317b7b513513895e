pub mod config;
pub mod client;
pub mod result;
pub mod runner;

pub use config::{QueryConfig, RunnerConfig};
pub use client::{
    AthenaService, ExecutionStatus, QueryExecutionHandle, QueryRequest, QueryService, QueryStatus,
    RawRow, ServiceError,
};
pub use result::ResultTable;
pub use runner::{QueryError, QueryRunner};
