use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use dl24read::{MeterClient, Output, OutputFormat, Settings};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Stream measurements from a DL24 electronic load or AC meter.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// How to print the measurements
    #[arg(value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Connect to the first device whose name contains this
    #[arg(short = 'n', long, env = "DL24_DEVICE_NAME")]
    device_name: Option<String>,

    /// Settings file, defaults to dl24.{toml,yaml,json} in the working directory
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only list the devices seen during one scan
    #[arg(long, conflicts_with = "explore")]
    scan: bool,

    /// Connect and log the device's services and characteristics, then exit
    #[arg(long)]
    explore: bool,
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    let mut settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    if let Some(name) = cli.device_name {
        settings.device_name = name;
    }

    if cli.scan {
        MeterClient::list_devices(settings.discovery.scan_window()).await?;
        return Ok(());
    }

    // Fail on a bad output before spending time on discovery.
    let mut output = if cli.explore { None } else { Some(Output::stdout(cli.format)?) };

    let (client, result) = match output.as_mut() {
        Some(output) => {
            let client = MeterClient::connect(&settings).await?;
            let result = client.stream(output).await;
            (client, result)
        }
        None => {
            let client = MeterClient::connect_device(&settings).await?;
            let result = client.explore().await;
            (client, result)
        }
    };

    info!("disconnecting...");
    if let Err(err) = client.stop().await {
        warn!("failed to disconnect: {err}");
    }

    Ok(result?)
}
