use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use finbif_checks::api::LajiClient;
use finbif_checks::config::{Config, ConfigOverrides};
use finbif_checks::constants::{ACCESS_TOKEN_ENV, DEFAULT_CONFIG_FILE};
use finbif_checks::infra::ReqwestHttp;
use finbif_checks::logging;
use finbif_checks::pipeline::{self, PipelineResult};

#[derive(Parser)]
#[command(name = "finbif_checks")]
#[command(about = "Flag FinBIF specimens that contradict known distributions or species names")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    options: CommonOptions,
}

#[derive(Args)]
struct CommonOptions {
    /// TOML config file (defaults to finbif_checks.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// laji.fi access token; overrides the config file and LAJI_ACCESS_TOKEN
    #[arg(long, global = true)]
    token: Option<String>,

    /// Taxon identifiers to check (comma-separated), e.g. MX.44394,MX.44109
    #[arg(long, global = true, value_delimiter = ',')]
    taxa: Option<Vec<String>>,

    /// Directory the CSV reports are written to
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Name check only: include specimens that cannot be placed in a Finnish province
    #[arg(long, global = true)]
    all_provinces: bool,

    /// Directory for the rotating JSON log
    #[arg(long, global = true, default_value = "logs")]
    log_dir: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Find specimens outside the known distribution of their species
    NewTaxa,
    /// Find specimens whose species name does not resolve to a valid species
    InvalidNames,
}

fn build_config(options: &CommonOptions) -> anyhow::Result<Config> {
    let mut config = match &options.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(PathBuf::from(DEFAULT_CONFIG_FILE).as_path())?,
    };

    let overrides = ConfigOverrides {
        token: options.token.clone(),
        taxa: options.taxa.clone(),
        output_dir: options.output_dir.clone(),
        all_provinces: options.all_provinces,
    };
    config.apply_overrides(std::env::var(ACCESS_TOKEN_ENV).ok(), &overrides);

    config.validate()?;
    Ok(config)
}

fn print_summary(result: &PipelineResult) {
    println!("\nResults for {}:", result.check);
    println!("   Specimens checked: {}", result.records_fetched);
    println!("   Anomalies: {}", result.anomalies);
    if result.check == "new-taxa" {
        println!("   New to Finland: {}", result.new_to_finland);
        println!("   New to a province: {}", result.new_to_province);
    }
    for path in &result.output_files {
        println!("   Output file: {}", path.display());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = logging::init_logging(&cli.options.log_dir);

    let config = build_config(&cli.options).context("invalid configuration")?;
    let http = Arc::new(ReqwestHttp::new(config.timeout())?);
    let client = LajiClient::new(http, config)?;

    let run = match cli.command {
        Commands::NewTaxa => pipeline::run_new_taxa(&client).await,
        Commands::InvalidNames => pipeline::run_invalid_names(&client).await,
    };

    match run {
        Ok(result) => {
            info!("Check finished");
            print_summary(&result);
            Ok(())
        }
        Err(e) => {
            error!("Check failed: {}", e);
            Err(e).context("check aborted")
        }
    }
}
