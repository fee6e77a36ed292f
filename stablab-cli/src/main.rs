//! StabLab CLI: evaluate the structural stability of interpretable models.
//!
//! Examples:
//! - `stablab --list-datasets`
//! - `stablab --list-models`
//! - `stablab -d friedman1 -m DT:sklearn -s 10 -i 5 -g`
//! - `stablab -d linear -m "LM,ridge" -l --models-path models`
//! - `stablab --config eval.toml -s 3`
//!
//! Exit codes: 0 on success, 1 on evaluation failure, 2 on usage errors.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use stablab_core::data::{DatasetProvider, StandardDatasetProvider};
use stablab_core::AdapterRegistry;
use stablab_runner::{run_evaluation, EvaluationConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "stablab",
    about = "StabLab CLI: evaluate interpretable models stability"
)]
struct Cli {
    /// Dataset name (built-in or `<datasets-path>/<name>.csv`).
    #[arg(short = 'd', long = "dataset")]
    dataset_name: Option<String>,

    /// Model key, e.g. `DT:sklearn`, `LM,ridge`, `('LM', 'lasso')`.
    #[arg(short = 'm', long = "model")]
    model_key: Option<String>,

    /// Directory holding CSV datasets.
    #[arg(long, visible_alias = "dp")]
    datasets_path: Option<PathBuf>,

    /// Directory where trained ensembles are stored.
    #[arg(long, visible_alias = "mp")]
    models_path: Option<PathBuf>,

    /// Directory where stability results are written.
    #[arg(long, visible_alias = "rp")]
    results_path: Option<PathBuf>,

    /// Number of splits.
    #[arg(short = 's', long = "splits")]
    nbr_splits: Option<usize>,

    /// Number of iterations per split.
    #[arg(short = 'i', long = "iterations")]
    nbr_iter: Option<usize>,

    /// Number of preprocessing variants taken from the pipe.
    #[arg(long = "variants")]
    nbr_variants: Option<usize>,

    /// Load a stored ensemble instead of training.
    #[arg(short = 'l', long = "load", default_value_t = false)]
    load_existing_ensemble: bool,

    /// Show progress log.
    #[arg(short = 'g', long, default_value_t = false)]
    verbose: bool,

    /// Print available datasets and exit.
    #[arg(long, visible_alias = "sd", default_value_t = false)]
    list_datasets: bool,

    /// Print available models and exit.
    #[arg(long, visible_alias = "sm", default_value_t = false)]
    list_models: bool,

    /// TOML config file; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Master seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Worker threads (defaults to all cores).
    #[arg(long)]
    workers: Option<usize>,

    /// Held-out fraction of rows per split.
    #[arg(long)]
    test_fraction: Option<f64>,

    /// Train on the split's rows as-is instead of a bootstrap resample.
    #[arg(long, default_value_t = false)]
    no_bootstrap: bool,
}

impl Cli {
    /// Start from the config file (or defaults) and apply flags on top.
    fn to_config(&self) -> Result<EvaluationConfig> {
        let mut config = match &self.config {
            Some(path) => EvaluationConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => EvaluationConfig::default(),
        };

        if let Some(name) = &self.dataset_name {
            config.dataset_name = Some(name.clone());
        }
        if let Some(key) = &self.model_key {
            config.model_key = Some(key.clone());
        }
        if let Some(path) = &self.datasets_path {
            config.datasets_path = path.clone();
        }
        if let Some(path) = &self.models_path {
            config.models_path = path.clone();
        }
        if let Some(path) = &self.results_path {
            config.results_path = path.clone();
        }
        if let Some(n) = self.nbr_splits {
            config.nbr_splits = n;
        }
        if let Some(n) = self.nbr_iter {
            config.nbr_iter = n;
        }
        if let Some(n) = self.nbr_variants {
            config.nbr_variants = n;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(workers) = self.workers {
            config.workers = Some(workers);
        }
        if let Some(fraction) = self.test_fraction {
            config.test_fraction = fraction;
        }
        config.load_existing_ensemble |= self.load_existing_ensemble;
        config.verbose |= self.verbose;
        if self.no_bootstrap {
            config.bootstrap = false;
        }
        Ok(config)
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.to_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::from(2);
        }
    };
    init_tracing(config.verbose);

    if cli.list_datasets {
        let provider = StandardDatasetProvider::new(&config.datasets_path);
        for name in provider.list_datasets() {
            println!("{name}");
        }
        return ExitCode::SUCCESS;
    }

    if cli.list_models {
        let registry = AdapterRegistry::standard(config.tree, config.linear);
        for key in registry.keys() {
            println!("{key}");
        }
        return ExitCode::SUCCESS;
    }

    if config.dataset_name.is_none() || config.model_key.is_none() {
        let _ = Cli::command().print_help();
        return ExitCode::from(2);
    }

    match run_evaluation(&config) {
        Ok(outcome) => {
            println!("{}", outcome.result_paths.json.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(1)
        }
    }
}
