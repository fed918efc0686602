//! Stress classifier CLI
//!
//! Serves the classification API and runs one-off analyses from the shell.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use stress_classifier::{
    classifier::ClassifierHandle,
    config::Config,
    core::{InferenceRequest, StressPipeline},
    dataset::load_dataset,
    long_term::{analyze_long_term_progress, VisitHistoryEntry},
    VERSION,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stress-classifier")]
#[command(version = VERSION)]
#[command(about = "Stress-state classification from wearable biosignals", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the per-user config location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Address to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// Model artifact path
        #[arg(long)]
        model: Option<PathBuf>,

        /// Pre-processed dataset path
        #[arg(long)]
        dataset: Option<PathBuf>,
    },

    /// Classify a recording and print the report
    Classify {
        /// Request JSON file (same body as the HTTP endpoint)
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Use simulated data regardless of the input
        #[arg(long)]
        simulate: bool,

        /// Seed for simulated data
        #[arg(long)]
        seed: Option<u64>,

        /// Model artifact path
        #[arg(long)]
        model: Option<PathBuf>,

        /// Write the report here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Summarize the pre-processed dataset
    Dataset {
        /// Dataset path
        #[arg(long)]
        path: Option<PathBuf>,

        /// Print the full chart view instead of the summary
        #[arg(long)]
        full: bool,
    },

    /// Analyze a visit history JSON file
    LongTerm {
        /// JSON array of visits ordered by date
        #[arg(long)]
        history: PathBuf,
    },

    /// Show configuration
    Config {
        /// Write the effective configuration to the config location
        #[arg(long)]
        save: bool,
    },
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Serve {
            host,
            port,
            model,
            dataset,
        } => {
            cmd_serve(config, host, port, model, dataset);
        }
        Commands::Classify {
            input,
            simulate,
            seed,
            model,
            output,
        } => {
            cmd_classify(config, input, simulate, seed, model, output);
        }
        Commands::Dataset { path, full } => {
            cmd_dataset(config, path, full);
        }
        Commands::LongTerm { history } => {
            cmd_long_term(config, &history);
        }
        Commands::Config { save } => {
            cmd_config(config, save);
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("stress_classifier=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config, stress_classifier::config::ConfigError> {
    match path {
        Some(path) => Config::load_from(path),
        None => {
            let config = Config::load()?;
            config.validate()?;
            Ok(config)
        }
    }
}

#[cfg(feature = "server")]
fn cmd_serve(
    mut config: Config,
    host: Option<String>,
    port: Option<u16>,
    model: Option<PathBuf>,
    dataset: Option<PathBuf>,
) {
    use stress_classifier::server::{run, ServerConfig};

    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(model) = model {
        config.model_path = model;
    }
    if let Some(dataset) = dataset {
        config.dataset_path = dataset;
    }

    let server_config = match ServerConfig::from_settings(config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting runtime: {e}");
            std::process::exit(1);
        }
    };

    let result: anyhow::Result<()> = runtime.block_on(async move {
        let (addr, shutdown_tx) = run(server_config).await?;
        println!("Stress classifier listening on http://{addr}");
        println!("Press Ctrl+C to stop.");

        tokio::signal::ctrl_c().await?;
        let _ = shutdown_tx.send(());
        println!();
        println!("Stopped.");
        Ok(())
    });

    if let Err(e) = result {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }
}

#[cfg(not(feature = "server"))]
fn cmd_serve(
    _config: Config,
    _host: Option<String>,
    _port: Option<u16>,
    _model: Option<PathBuf>,
    _dataset: Option<PathBuf>,
) {
    eprintln!("This build does not include the HTTP server (enable the `server` feature).");
    std::process::exit(1);
}

fn cmd_classify(
    mut config: Config,
    input: Option<PathBuf>,
    simulate: bool,
    seed: Option<u64>,
    model: Option<PathBuf>,
    output: Option<PathBuf>,
) {
    let mut request = match input {
        Some(path) => match read_json::<InferenceRequest>(&path) {
            Ok(request) => request,
            Err(e) => {
                eprintln!("Error reading {path:?}: {e}");
                std::process::exit(1);
            }
        },
        None => InferenceRequest::simulated(),
    };
    if simulate {
        request.use_simulation = true;
    }
    if seed.is_some() {
        config.simulation.seed = seed;
    }
    if let Some(model) = model {
        config.model_path = model;
    }

    let handle = ClassifierHandle::new(config.model_path.clone());
    let pipeline = StressPipeline::new(&handle, config.pipeline.clone());

    let report = match pipeline.classify_request(&request, &config.simulation) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(if e.is_client_error() { 2 } else { 1 });
        }
    };

    let json = match serde_json::to_string_pretty(&report) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error serializing report: {e}");
            std::process::exit(1);
        }
    };

    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, json) {
                eprintln!("Error writing {path:?}: {e}");
                std::process::exit(1);
            }
            println!("{}", report.narrative());
            println!("Report written to {path:?}");
        }
        None => println!("{json}"),
    }
}

fn cmd_dataset(config: Config, path: Option<PathBuf>, full: bool) {
    let path = path.unwrap_or(config.dataset_path.clone());
    let dataset = match load_dataset(&path) {
        Ok(dataset) => dataset,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    let view = dataset.to_view(&config.pipeline.window_spec());

    if full {
        match serde_json::to_string_pretty(&view) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error serializing: {e}"),
        }
        return;
    }

    let meta = &view.metadata;
    println!("Dataset {path:?}");
    println!("==========");
    println!();
    println!("  Segments: {}", meta.num_segments);
    println!("  Points per segment: {}", meta.points_per_segment);
    println!(
        "  Window / step: {}s / {}s at {} Hz",
        meta.segment_duration_seconds, meta.step_seconds, meta.sample_rate_hz
    );
    println!("  Total duration: {}s", meta.total_duration_seconds);
    println!();
    println!("Labels:");
    for stat in &view.label_statistics {
        println!(
            "  {:>3} {:<24} {:>6} ({:.2}%)",
            stat.label_id, stat.label_name, stat.count, stat.percentage
        );
    }
}

fn cmd_long_term(config: Config, history: &Path) {
    let visits = match read_json::<Vec<VisitHistoryEntry>>(history) {
        Ok(visits) => visits,
        Err(e) => {
            eprintln!("Error reading {history:?}: {e}");
            std::process::exit(1);
        }
    };

    match analyze_long_term_progress(&visits, &config.aggregator) {
        Ok(summary) => {
            println!("{}", summary.narrative);
            println!();
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).unwrap_or_else(|_| "Error".to_string())
            );
        }
        Err(e) => {
            eprintln!("Long-term analysis failed: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_config(config: Config, save: bool) {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );

    if save {
        if let Err(e) = config.save() {
            eprintln!("Error saving config: {e}");
            std::process::exit(1);
        }
        println!();
        println!("Saved to {:?}", Config::config_path());
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

