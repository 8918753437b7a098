//! Query Cascade command line
//!
//! Usage:
//!     query-cascade profile data_sales --dataset-id sales
//!     query-cascade ask "top 5 categories by revenue" --dataset sales

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use query_cascade::models::settings::SettingsUpdate;
use query_cascade::storage::ConfigService;
use query_cascade::utils::logging::{effective_level, init_logging};
use query_cascade::{AppState, ChatRequest, ChatResponse};

#[derive(Parser, Debug)]
#[command(
    name = "query-cascade",
    version,
    about = "Ask natural-language questions about tabular datasets"
)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level regardless of the configured level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask a question, optionally about a registered dataset
    Ask {
        question: String,
        #[arg(long)]
        dataset: Option<String>,
        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Profile an existing table and register it as a dataset
    Profile {
        table: String,
        /// Defaults to the table name without its `data_` prefix
        #[arg(long)]
        dataset_id: Option<String>,
    },
    /// List registered datasets
    Datasets,
    /// Build the KPI and chart dashboard for a registered dataset
    Dashboard {
        dataset: String,
        /// Regenerate instead of using a cached dashboard
        #[arg(long)]
        refresh: bool,
    },
    /// Report database, configuration and provider health
    Health {
        /// Also contact the LLM provider
        #[arg(long)]
        llm: bool,
    },
    /// Show or change the stored configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the stored configuration
    Show,
    /// Update stored settings
    Set {
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        database_path: Option<String>,
        #[arg(long)]
        cache_enabled: Option<bool>,
        #[arg(long)]
        request_timeout_secs: Option<u64>,
        #[arg(long)]
        log_level: Option<String>,
        #[arg(long)]
        max_retries: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config_service = match &cli.config {
        Some(path) => ConfigService::open(path.clone())?,
        None => ConfigService::new()?,
    };
    let config = config_service.effective_config()?;
    init_logging(effective_level(&config.log_level, cli.verbose))?;
    tracing::debug!("Using config at {}", config_service.path().display());

    match cli.command {
        Command::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", serde_json::to_string_pretty(config_service.get_config())?);
            }
            ConfigAction::Set {
                api_key,
                base_url,
                model,
                database_path,
                cache_enabled,
                request_timeout_secs,
                log_level,
                max_retries,
            } => {
                let update = SettingsUpdate {
                    api_key,
                    base_url,
                    model,
                    database_path,
                    cache_enabled,
                    request_timeout_secs,
                    log_level,
                    max_retries,
                    ..Default::default()
                };
                config_service.update_config(update)?;
                println!("Saved {}", config_service.path().display());
            }
        },
        Command::Ask {
            question,
            dataset,
            json,
        } => {
            let state = AppState::initialize(config)?;
            let mut request = ChatRequest::new(question);
            request.dataset_id = dataset;

            let token = CancellationToken::new();
            let ctrl_c = token.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted; stopping at the next stage boundary");
                    ctrl_c.cancel();
                }
            });

            let response = state.chat().chat_with_cancellation(request, token).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_response(&response);
            }
        }
        Command::Profile { table, dataset_id } => {
            let state = AppState::initialize(config)?;
            let dataset_id = dataset_id.unwrap_or_else(|| {
                table.strip_prefix("data_").unwrap_or(&table).to_string()
            });
            let schema = state.register_table(&table, &dataset_id)?;
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        Command::Datasets => {
            let state = AppState::initialize(config)?;
            for entry in state.list_datasets()? {
                println!(
                    "{}\t{}\t{} rows",
                    entry.dataset_id, entry.table_name, entry.row_count
                );
            }
        }
        Command::Dashboard { dataset, refresh } => {
            let state = AppState::initialize(config)?;
            let dashboard = state.dashboard(&dataset, refresh)?;
            println!("{}", serde_json::to_string_pretty(&dashboard)?);
        }
        Command::Health { llm } => {
            let state = AppState::initialize(config)?;
            let health = state.health(llm).await;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
    }

    Ok(())
}

fn print_response(response: &ChatResponse) {
    println!("{}", response.message.trim_end());
    if let Some(data) = &response.data {
        println!();
        if let Some(query_text) = &data.query_text {
            println!("Query: {}", query_text);
        }
        println!("Rows: {} (showing {})", data.count, data.results.len());
    }
    for chart in &response.visualizations {
        println!("Chart: {:?} \"{}\" ({} x {})", chart.chart_type, chart.title, chart.x_axis, chart.y_axis);
    }
    if !response.errors.is_empty() {
        eprintln!();
        for error in &response.errors {
            eprintln!("warning: {}", error);
        }
    }
}
