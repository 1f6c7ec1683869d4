//! Econ - multi-source economic indicator CLI
//!
//! The `econ` command fetches one indicator for one country from the World
//! Bank, IMF, OECD and UN concurrently and prints the reconciled series.
//!
//! ## Commands
//!
//! - `fetch`: run the pipeline for flags given on the command line
//! - `query`: run the pipeline for a JSON query payload
//! - `indicators`: list the indicator keys each source understands

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use econ_core::{
    AggregatedResponse, ChatAnalyzer, Orchestrator, PipelineConfig, PipelineMode, QueryPayload,
};
use econ_sources::QueryParams;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "econ")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fetch and reconcile economic indicators from several agencies", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct RunOptions {
    /// Return one merged series or every per-source series
    #[arg(long, env = "ECON_OUTPUT_MODE")]
    mode: Option<PipelineMode>,

    /// Request deadline in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Skip the narrative analysis even when MISTRAL_API_KEY is set
    #[arg(long)]
    no_analysis: bool,

    /// Print a plain-text table instead of JSON
    #[arg(long)]
    table: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch an indicator for a country
    Fetch {
        /// Indicator key, e.g. "gdp" or "inflation"
        #[arg(short, long)]
        indicator: String,

        /// ISO-3166 alpha-3 country code
        #[arg(short, long)]
        country: String,

        /// First year (inclusive)
        #[arg(long, default_value = "2000")]
        start_year: i32,

        /// Last year (inclusive)
        #[arg(long, default_value = "2023")]
        end_year: i32,

        #[command(flatten)]
        options: RunOptions,
    },

    /// Run a JSON query payload (`-` reads stdin)
    Query {
        /// e.g. '{"indicator": "gdp", "country": "NPL"}'
        payload: String,

        #[command(flatten)]
        options: RunOptions,
    },

    /// List indicator keys per source
    Indicators,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    econ_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Fetch {
            indicator,
            country,
            start_year,
            end_year,
            options,
        } => {
            let params = QueryParams::new(&indicator, &country, start_year, end_year);
            cmd_fetch(params, &options).await
        }
        Commands::Query { payload, options } => {
            let payload = if payload == "-" {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("Failed to read query from stdin")?;
                buf
            } else {
                payload
            };
            let params = QueryPayload::parse(&payload).context("Invalid query payload")?;
            cmd_fetch(params, &options).await
        }
        Commands::Indicators => cmd_indicators(),
    }
}

fn build_orchestrator(options: &RunOptions) -> Result<Orchestrator> {
    let mut config = PipelineConfig::from_env();
    if let Some(mode) = options.mode {
        config = config.with_mode(mode);
    }
    if let Some(secs) = options.timeout {
        if secs == 0 {
            bail!("--timeout must be at least one second");
        }
        config = config.with_request_timeout(Duration::from_secs(secs));
    }

    let orchestrator =
        Orchestrator::from_config(config).context("Failed to build source adapters")?;

    if options.no_analysis {
        return Ok(orchestrator);
    }
    match ChatAnalyzer::from_env() {
        Ok(analyzer) => Ok(orchestrator.with_analyzer(Arc::new(analyzer))),
        Err(err) => {
            warn!(error = %err, "Analysis disabled");
            Ok(orchestrator)
        }
    }
}

async fn cmd_fetch(params: QueryParams, options: &RunOptions) -> Result<()> {
    let orchestrator = build_orchestrator(options)?;
    info!(
        indicator = %params.indicator,
        country = %params.country,
        mode = ?orchestrator.config().mode,
        "Fetching"
    );

    let response = orchestrator
        .fetch_with_retry(params)
        .await
        .context("No source returned data")?;

    if options.table {
        print_table(&response);
    } else {
        let json =
            serde_json::to_string_pretty(&response).context("Failed to serialize response")?;
        println!("{}", json);
    }
    Ok(())
}

fn cmd_indicators() -> Result<()> {
    let orchestrator = Orchestrator::from_config(PipelineConfig::from_env())
        .context("Failed to build source adapters")?;
    for (source, keys) in orchestrator.available_indicators() {
        println!("{}:", source);
        for key in keys {
            println!("  {}", key);
        }
    }
    Ok(())
}

fn print_table(response: &AggregatedResponse) {
    let params = &response.query_params;
    println!(
        "{} for {} ({}-{}), status: {:?}",
        params.indicator, params.country, params.start_year, params.end_year, response.status
    );

    for dataset in &response.datasets {
        println!();
        println!(
            "{} [{}] ({})",
            dataset.metadata.indicator_name,
            dataset.source(),
            dataset.metadata.unit
        );
        let series = dataset.series();
        for (year, value) in series.years.iter().zip(series.values.iter()) {
            match value {
                Some(v) => println!("  {:>4}  {:>18.6}", year, v),
                None => println!("  {:>4}  {:>18}", year, "-"),
            }
        }
    }

    if let Some(errors) = &response.error_summary {
        println!();
        println!("Failed sources:");
        for (source, messages) in errors {
            println!("  {}: {}", source, messages.join("; "));
        }
    }

    if let Some(analyses) = &response.analyses {
        for (label, text) in analyses {
            println!();
            println!("== Analysis ({}) ==", label);
            println!("{}", text);
        }
    }
}
