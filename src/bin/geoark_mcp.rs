

use std::path::PathBuf;

use geoark::mcp::run_server;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the MCP protocol; logs go to stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive("warn".parse()?)
                .add_directive("geoark=info".parse()?),
        )
        .init();

    let config_path = std::env::var_os("GEOARK_CONFIG").map(PathBuf::from);
    run_server(config_path.as_deref()).await
}
