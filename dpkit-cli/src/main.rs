use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::bail;
use color_eyre::Result;
use dpkit_cli::pipeline::{load_pipeline, Release};
use dpkit_core::config::LoggingSection;
use dpkit_core::{load_config, ConfigFormat, EngineConfig};
use dpkit_ffi::manifest_json;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "dpkit",
    version,
    about = "Inspect the dpkit constructor surface and release privacy pipelines"
)]
struct Cli {
    /// Engine configuration (TOML or YAML). Falls back to `DPKIT_CONFIG`, then defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Explicit configuration format override.
    #[arg(long, value_enum, default_value_t = ConfigFormat::Auto)]
    config_format: ConfigFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the JSON manifest of the C ABI.
    Manifest,
    /// Check a pipeline against its budget and release it if the check passes.
    Release {
        #[arg(long, default_value = "configs/pipeline.toml")]
        pipeline: PathBuf,
    },
}

fn init_tracing(logging: &LoggingSection) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path, cli.config_format)?,
        None => EngineConfig::from_env()?,
    };
    init_tracing(&config.logging);

    match cli.command {
        Command::Manifest => println!("{}", manifest_json()?),
        Command::Release { pipeline } => {
            let pipeline = load_pipeline(&pipeline, ConfigFormat::Auto)?;
            match pipeline.release(config.noise_source())? {
                Release::Released { output } => println!("{}", output.render()),
                Release::Rejected { d_out, required } => bail!(
                    "privacy check rejected d-out = {d_out}; \
                     the pipeline certifies no less than {}",
                    required.render()
                ),
            }
        }
    }
    Ok(())
}
