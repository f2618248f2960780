

use std::path::PathBuf;

use clap::Parser;
use geoark::{GeoarkConfig, RunOptions, SearchPipeline};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "geoark-search")]
#[command(about = "Search a variable catalog with a natural-language query", long_about = None)]
#[command(version)]
struct Cli {
    query: String,
    #[arg(short, long, help = "Config file (TOML or JSON)")]
    config: Option<PathBuf>,
    #[arg(long, help = "Catalog JSON file (overrides catalog_path)")]
    catalog: Option<PathBuf>,
    #[arg(long, help = "Skip LLM relevance verification")]
    no_verify: bool,
    #[arg(long, help = "Total candidate budget across concepts")]
    budget: Option<usize>,
    #[arg(long, help = "Only print the query decomposition")]
    decompose_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive("warn".parse()?)
                .add_directive("geoark=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut config = GeoarkConfig::load(cli.config.as_deref())?;
    if let Some(catalog) = cli.catalog {
        config.catalog_path = Some(catalog);
    }

    let pipeline = SearchPipeline::from_config(&config).await?;

    let output = if cli.decompose_only {
        let decomposition = pipeline.decompose(&cli.query).await?;
        serde_json::to_string_pretty(&decomposition)?
    } else {
        let defaults = RunOptions::from_config(&config);
        let options = RunOptions {
            use_verification: defaults.use_verification && !cli.no_verify,
            total_budget: cli.budget.unwrap_or(defaults.total_budget),
        };
        let result = pipeline.run(&cli.query, options).await?;
        serde_json::to_string_pretty(&result)?
    };

    println!("{output}");
    Ok(())
}
