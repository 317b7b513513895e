//! athena-query — run one SQL statement on Athena and print the rows.
//!
//! Settings come from flags, the environment or a `.env` file; flags win.

use std::time::Duration;

use clap::Parser;
use tracing::info;

use athena_query::{QueryConfig, QueryRequest, QueryRunner, RunnerConfig};

// ── CLI ─────────────────────────────────────────────────────────────

/// Submit a query to AWS Athena, wait for it, print the result rows.
#[derive(Parser, Debug)]
#[command(name = "athena-query", version, about)]
struct Cli {
    /// SQL statement to execute.
    #[arg(long, env = "ATHENA_SQL")]
    sql: String,

    /// AWS region (overrides ATHENA_REGION / AWS_REGION).
    #[arg(long)]
    region: Option<String>,

    /// Athena database.
    #[arg(long)]
    database: Option<String>,

    /// Athena workgroup.
    #[arg(long)]
    workgroup: Option<String>,

    /// S3 location for query output.
    #[arg(long)]
    output_location: Option<String>,

    /// Milliseconds between status checks.
    #[arg(long)]
    wait_ms: Option<u64>,

    /// Maximum number of status checks.
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Grow the wait by this factor after each check.
    #[arg(long)]
    backoff: Option<f64>,

    /// Stop the execution on Athena when the attempt budget runs out.
    #[arg(long)]
    cancel_on_timeout: bool,

    /// Print rows as a JSON array instead of tab-separated lines.
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn runner_config(&self) -> RunnerConfig {
        let mut cfg = RunnerConfig::from_env();
        if let Some(region) = &self.region {
            cfg.region = region.clone();
        }
        if self.database.is_some() {
            cfg.database = self.database.clone();
        }
        if self.workgroup.is_some() {
            cfg.workgroup = self.workgroup.clone();
        }
        if self.output_location.is_some() {
            cfg.output_location = self.output_location.clone();
        }
        cfg
    }

    fn query_config(&self, region: &str) -> QueryConfig {
        let mut cfg = QueryConfig::from_env();
        cfg.region = region.to_string();
        if let Some(ms) = self.wait_ms {
            cfg.wait_interval = Duration::from_millis(ms);
        }
        if let Some(attempts) = self.max_attempts {
            cfg.max_attempts = attempts;
        }
        if let Some(factor) = self.backoff {
            cfg.backoff_factor = factor;
        }
        if self.cancel_on_timeout {
            cfg.cancel_on_timeout = true;
        }
        cfg
    }
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let runner_config = cli.runner_config();
    let query_config = cli.query_config(&runner_config.region);

    let runner = QueryRunner::new(&runner_config).await?;

    let mut request = QueryRequest::new(&cli.sql);
    request.database = runner_config.database.clone();
    request.workgroup = runner_config.workgroup.clone();
    request.output_location = runner_config.output_location.clone();

    let table = runner.execute_query(&request, &query_config).await?;
    info!(rows = table.row_count(), "query finished");

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&table)?);
    } else {
        print!("{table}");
    }

    Ok(())
}
