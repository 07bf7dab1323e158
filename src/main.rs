use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use file_rotate::{compression::Compression, suffix::AppendCount, ContentLimit, FileRotate};
use log::info;
use thiserror::Error;

use cluster_capacity::config::{
    load_pod_spec, load_scheduler_config, load_snapshot, ClusterCapacityConfig, ConfigError,
};
use cluster_capacity::core::cluster_client::InMemoryCluster;
use cluster_capacity::core::rest_client::RestError;
use cluster_capacity::core::scheduler::plugin::PluginRegistry;
use cluster_capacity::error::SimulationError;
use cluster_capacity::report::printer::{print_review, OutputFormat, PrintError};
use cluster_capacity::simulator::ClusterCapacity;

const LOG_FILE_SIZE_LIMIT: usize = 10 * 1024 * 1024;
const LOG_FILES_KEPT: usize = 3;

/// Estimates how many instances of a pod the cluster can still schedule.
#[derive(Parser)]
#[clap(name = "cluster-capacity")]
struct Args {
    /// YAML snapshot of the cluster objects (nodes, pods, volumes, namespaces, ...)
    #[clap(long)]
    snapshot: PathBuf,
    /// YAML definition of the pod to place copies of
    #[clap(long)]
    podspec: PathBuf,
    /// Number of instances of the pod to simulate, 0 means no limit
    #[clap(long, default_value_t = 0)]
    max_limit: usize,
    /// Scheduler config with the scheduling profiles, the default profile if not set
    #[clap(long)]
    default_config: Option<PathBuf>,
    /// Print the pod requirements, termination reason and per-node distribution
    #[clap(long)]
    verbose: bool,
    #[clap(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
    output: OutputFormat,
    /// Write logs to the size-rotated file instead of stderr
    #[clap(long)]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to load cluster snapshot: {0}")]
    Cluster(#[from] RestError),
    #[error("simulation failed: {0}")]
    Simulation(#[from] SimulationError),
    #[error("failed to print review: {0}")]
    Print(#[from] PrintError),
}

fn init_logger(log_file: Option<&PathBuf>) {
    // log level INFO by default
    let mut env_logger_builder = env_logger::builder();
    if env::var("RUST_LOG").is_err() {
        env_logger_builder.filter_level(log::LevelFilter::Info);
    }
    if let Some(path) = log_file {
        let log_file = FileRotate::new(
            path,
            AppendCount::new(LOG_FILES_KEPT),
            ContentLimit::Bytes(LOG_FILE_SIZE_LIMIT),
            Compression::None,
            #[cfg(unix)]
            None,
        );
        env_logger_builder.target(env_logger::Target::Pipe(Box::new(log_file)));
    }
    env_logger_builder.init();
}

fn run(args: &Args) -> Result<(), CliError> {
    let pod = load_pod_spec(&args.podspec)?;
    let scheduler_config = load_scheduler_config(args.default_config.as_deref())?;
    let registry = PluginRegistry::default();
    let config = ClusterCapacityConfig {
        pod,
        max_limit: args.max_limit,
        scheduler_config,
    };
    config.validate(&registry)?;

    info!("Path to cluster snapshot: {:?}", args.snapshot);
    let cluster = InMemoryCluster::from_snapshot(load_snapshot(&args.snapshot)?)?;

    let mut cc = ClusterCapacity::new(config, Arc::new(cluster), &registry)?;
    cc.sync_with_client()?;
    cc.run()?;

    let mut stdout = std::io::stdout().lock();
    print_review(cc.report(), args.output, args.verbose, &mut stdout)?;
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_logger(args.log_file.as_ref());

    if let Err(err) = run(&args) {
        eprintln!("{}", err);
        if matches!(err, CliError::Config(_)) {
            let _ = Args::command().print_help();
        }
        std::process::exit(1);
    }
}
