mod gate;
mod search;

use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "grocery")]
#[command(about = "Search grocery prices across Australian retailers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Search one store or all of them.
    Search(SearchArgs),
    /// List the stores that can be searched.
    Stores,
}

#[derive(Debug, clap::Args)]
struct SearchArgs {
    query: String,

    /// Store id (woolworths, coles, iga, harris, aldi) or `all`.
    #[arg(long, default_value = "all")]
    store: String,

    /// Stop each store once it has this many results.
    #[arg(long)]
    max: Option<usize>,

    /// Stop each store after this many pages. Overrides `--max` for fetching.
    #[arg(long)]
    pages: Option<u32>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    #[arg(long, value_enum, default_value_t = SortArg::Asc)]
    sort: SortArg,

    /// Only show products that are in stock.
    #[arg(long)]
    in_stock: bool,

    /// Only show discounted products.
    #[arg(long)]
    discounted: bool,

    /// Ask before fetching each further page (single store only).
    #[arg(long)]
    interactive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Table,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SortArg {
    Asc,
    Desc,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match grocery_core::load_app_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Logs go to stderr so JSON output on stdout stays machine-readable.
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let outcome = match cli.command {
        Commands::Search(args) => search::run_search(&config, args).await,
        Commands::Stores => search::run_stores(&config),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e:#}");
            if search::is_user_error(&e) {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
