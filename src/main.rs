#![forbid(unsafe_code)]
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use prombench::config::{self, load_configuration};
use prombench::exporters::{CsvConverter, JsonlConverter};
use prombench::session::MetricsSession;
use std::path::PathBuf;
use tracing::Level;
use tracing::event;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Csv,
    Jsonl,
}

/// Run PromQL queries against a Prometheus storage directory.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Pre-populated Prometheus TSDB directory
    #[arg(long)]
    storage_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Queries, run in order against the same server
    #[arg(required = true)]
    queries: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;

    runtime.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    load_configuration().context("Failed to load configuration")?;
    let config = config::get().context("Failed to get configuration")?;

    let session = MetricsSession::open_with_config(&cli.storage_dir, config)
        .await
        .with_context(|| {
            format!("Failed to start Prometheus on {}", cli.storage_dir.display())
        })?;

    // The session is dropped on the error path, which stops Prometheus too
    for query in &cli.queries {
        let table = session
            .query(query)
            .await
            .with_context(|| format!("Query failed: {}", query))?;
        event!(
            Level::INFO,
            "{}: {} series, {} timestamps",
            query,
            table.num_columns(),
            table.num_rows()
        );
        let output = match cli.format {
            OutputFormat::Table => render_table(&table),
            OutputFormat::Csv => CsvConverter::to_csv(&table)?,
            OutputFormat::Jsonl => JsonlConverter::to_jsonl(&table)?,
        };
        print!("{}", output);
    }

    let status = session.shutdown().await.context("Failed to stop Prometheus")?;
    event!(Level::INFO, "Prometheus exited with {}", status);
    Ok(())
}

/// Plain text layout: one block per series.
fn render_table(table: &prombench::ResultTable) -> String {
    let mut output = String::new();
    for (labels, series) in table.columns() {
        output.push_str(&labels.to_string());
        output.push('\n');
        for point in series.points() {
            output.push_str(&format!("  {}  {}\n", point.timestamp, point.value));
        }
    }
    output
}
