use clap::Parser;
use std::path::PathBuf;
use stockrisk_core::training::TrainingOptions;

#[derive(Debug, Parser)]
#[command(name = "stockrisk_trainer")]
pub struct Args {
    /// Number of synthetic rows to generate.
    #[arg(long)]
    pub samples: Option<usize>,

    /// Seed for data generation, the train/test split and the forest.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of trees in the forest.
    #[arg(long)]
    pub trees: Option<usize>,

    #[arg(long)]
    pub max_depth: Option<usize>,

    #[arg(long)]
    pub min_samples_split: Option<usize>,

    /// Artifact directory. Defaults to MODEL_DIR.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Train and report metrics without writing artifacts.
    #[arg(long)]
    pub dry_run: bool,
}

impl Args {
    /// Flags win over env-derived options.
    pub fn apply(&self, mut opts: TrainingOptions) -> TrainingOptions {
        if let Some(n) = self.samples {
            opts.samples = n;
        }
        if let Some(seed) = self.seed {
            opts.seed = seed;
            opts.forest.seed = seed;
        }
        if let Some(n) = self.trees {
            opts.forest.n_estimators = n;
        }
        if let Some(n) = self.max_depth {
            opts.forest.max_depth = n;
        }
        if let Some(n) = self.min_samples_split {
            opts.forest.min_samples_split = n;
        }
        opts
    }
}
