//! perfstream command line
//!
//! Browses the configured catalog and runs fetch, specs and bulk requests
//! against it. Encoded output goes to a file or stdout, logs to stderr.

use anyhow::Context;
use clap::{Parser, Subcommand};
use perfstream::{
    catalog::Catalog,
    config::{default_config_path, AppConfig, DEFAULT_LOG_FILTER},
    pipeline::{load_request, BulkDataRequest, Driver, FetchDataRequest},
    scripting::ScriptEngine,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Time-series pipeline engine for performance metrics
#[derive(Parser)]
#[command(name = "perfstream", version, about)]
struct Cli {
    /// Config file (defaults to perfstream/config.toml in the config directory)
    #[arg(long, short, global = true, env = "PERFSTREAM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List sources and their datasets as JSON
    Sources,
    /// Show one source and its datasets as JSON
    Source { id: String },
    /// Show one dataset's catalog entry as JSON
    Dataset { source: String, id: String },
    /// Print the output kinds of every pipeline in a fetch request
    Specs {
        /// Fetch request JSON file, `-` for stdin
        request: PathBuf,
    },
    /// Run a fetch request and write one framed block per pipeline
    Fetch {
        /// Fetch request JSON file, `-` for stdin
        request: PathBuf,
        /// Output file (stdout if omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Export one dataset as bare records
    Bulk {
        source: String,
        dataset: String,
        /// Bulk request JSON file, `-` for stdin
        request: PathBuf,
        /// Output file (stdout if omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Write the default configuration
    InitConfig {
        /// Target file (defaults to the platform config location)
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    // The config decides the log filter, so it is read before logging starts
    let config = AppConfig::resolve(cli.config.as_deref());
    let filter = config
        .as_ref()
        .map(|c| c.logging.filter.clone())
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // init-config must work even when the existing file is broken
    let result = match cli.command {
        Commands::InitConfig { path, force } => init_config(path, force),
        command => config
            .context("Failed to load configuration")
            .and_then(|config| run(command, config)),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        for cause in e.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
        std::process::exit(1);
    }
}

fn run(command: Commands, config: AppConfig) -> anyhow::Result<()> {
    match command {
        Commands::Sources => {
            let catalog = Catalog::from_config(&config.sources)?;
            let stdout = std::io::stdout();
            serde_json::to_writer_pretty(stdout.lock(), &catalog.listing())?;
            println!();
        }
        Commands::Source { id } => {
            let catalog = Catalog::from_config(&config.sources)?;
            println!("{}", serde_json::to_string_pretty(&catalog.source_listing(&id)?)?);
        }
        Commands::Dataset { source, id } => {
            let catalog = Catalog::from_config(&config.sources)?;
            println!("{}", serde_json::to_string_pretty(catalog.dataset(&source, &id)?)?);
        }
        Commands::Specs { request } => {
            let request: FetchDataRequest = load_request(&request)?;
            let catalog = Catalog::from_config(&config.sources)?;
            let specs = driver(&catalog, &config).specs(&request)?;
            println!("{}", serde_json::to_string_pretty(&specs)?);
        }
        Commands::Fetch { request, output } => {
            let request: FetchDataRequest = load_request(&request)?;
            let catalog = Catalog::from_config(&config.sources)?;
            let mut sink = open_output(output.as_deref())?;
            let stats = driver(&catalog, &config).fetch(&request, &mut sink)?;
            tracing::info!(
                "Wrote {} records from {} pipeline(s), {} bytes (compile {} us, range {} us, drain {} us)",
                stats.records,
                stats.pipelines,
                stats.bytes,
                stats.compile_time_us,
                stats.prepare_time_us,
                stats.drain_time_us
            );
        }
        Commands::Bulk {
            source,
            dataset,
            request,
            output,
        } => {
            let request: BulkDataRequest = load_request(&request)?;
            let catalog = Catalog::from_config(&config.sources)?;
            let sink = open_output(output.as_deref())?;
            let records = driver(&catalog, &config).bulk_export(&source, &dataset, &request, sink)?;
            tracing::info!("Exported {} records of {}/{}", records, source, dataset);
        }
        Commands::InitConfig { path, force } => init_config(path, force)?,
    }

    Ok(())
}

fn driver<'a>(catalog: &'a Catalog, config: &AppConfig) -> Driver<'a> {
    Driver::new(catalog, Arc::new(ScriptEngine::new()))
        .with_frame_capacity(config.encoding.frame_capacity)
}

fn open_output(path: Option<&Path>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(std::io::BufWriter::new(
            std::fs::File::create(path).with_context(|| format!("Failed to create {:?}", path))?,
        )),
        None => Box::new(std::io::BufWriter::new(std::io::stdout().lock())),
    })
}

fn init_config(path: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let path = path
        .or_else(default_config_path)
        .context("Could not determine the config directory")?;

    if path.exists() && !force {
        anyhow::bail!("{:?} already exists (use --force to overwrite)", path);
    }

    AppConfig::default().save(&path)?;
    tracing::info!("Wrote default configuration to {:?}", path);
    Ok(())
}
