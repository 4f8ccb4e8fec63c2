//! image2sdr CLI - run the service or encode images from the command line.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

use image2sdr_core::{ImageUpload, SdrError, SdrResponse, ServiceConfig, WeightedSdr};
use image2sdr_merge::SdrMerger;
use image2sdr_server::{run_http, Image2SdrService};

/// image2sdr - turn images into sparse distributed representations
#[derive(Parser)]
#[command(name = "image2sdr")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: searched in the user config dir, then ./)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// Address to bind (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Encode image files through the configured upstream services
    Encode {
        /// Image files; only the first one is merged
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Merge a JSON array of weighted SDRs
    Merge {
        /// JSON file with `[{"sdr": [...], "weight": ...}]`, or `-` for stdin
        input: String,

        /// SDR size (default: cortical_io.sdr_size from config)
        #[arg(long)]
        sdr_size: Option<usize>,

        /// Sparsity (default: sparsity from config)
        #[arg(long)]
        sparsity: Option<f64>,
    },
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

fn load_config(path: Option<&Path>) -> Result<ServiceConfig, SdrError> {
    match path {
        Some(path) => ServiceConfig::load(path),
        None => ServiceConfig::load_default(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            run_http(&config).await?;
        }
        Commands::Encode { files } => {
            encode(&config, &files).await?;
        }
        Commands::Merge {
            input,
            sdr_size,
            sparsity,
        } => {
            let merger = SdrMerger::new(
                sdr_size.unwrap_or(config.cortical_io.sdr_size),
                sparsity.unwrap_or(config.sparsity),
            )?;
            merge(&merger, &input)?;
        }
    }

    Ok(())
}

async fn encode(
    config: &ServiceConfig,
    files: &[PathBuf],
) -> Result<(), Box<dyn std::error::Error>> {
    let mut images = Vec::with_capacity(files.len());
    for path in files {
        let data = fs::read(path)?;
        debug!("Read {} ({} bytes)", path.display(), data.len());
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        images.push(ImageUpload::new(file_name, data));
    }

    let service = Image2SdrService::from_config(config)?;
    let sdr = service.encode(images).await?;
    println!("{}", serde_json::to_string(&SdrResponse { sdr })?);
    Ok(())
}

fn read_input(input: &str) -> Result<String, std::io::Error> {
    if input == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        fs::read_to_string(input)
    }
}

fn parse_weighted_sdrs(json: &str) -> Result<Vec<WeightedSdr>, SdrError> {
    Ok(serde_json::from_str(json)?)
}

fn merge(merger: &SdrMerger, input: &str) -> Result<(), Box<dyn std::error::Error>> {
    let inputs = parse_weighted_sdrs(&read_input(input)?)?;
    debug!(
        "Merging {} SDR(s) into at most {} bits",
        inputs.len(),
        merger.target_bits()
    );

    let sdr = merger.merge(&inputs);
    println!("{}", serde_json::to_string(&SdrResponse { sdr })?);
    Ok(())
}
