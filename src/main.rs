use anyhow::Result;
use clap::Parser;
use tracing::warn;

use kestrel::{
    app::{load_config, load_config_from, Config},
    cli::{handle_command, Cli},
    utils::init_logger,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();
    init_logger(cli.verbose);

    // An explicit config file must load; the layered defaults may fall back
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config().unwrap_or_else(|e| {
            warn!(error = %e, "falling back to default configuration");
            Config::default()
        }),
    };

    let succeeded = handle_command(&cli, config).await?;

    // Exit with appropriate code
    if !succeeded {
        std::process::exit(1);
    }

    Ok(())
}
