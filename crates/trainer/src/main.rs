use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod options;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stockrisk_core::config::Settings::from_env();
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = options::Args::parse();
    let opts = args.apply(stockrisk_core::training::TrainingOptions::from_env());

    tracing::info!(
        samples = opts.samples,
        seed = opts.seed,
        trees = opts.forest.n_estimators,
        max_depth = opts.forest.max_depth,
        min_samples_split = opts.forest.min_samples_split,
        "training risk model"
    );

    let outcome = match stockrisk_core::training::train(&opts) {
        Ok(outcome) => outcome,
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "training failed");
            return Err(err);
        }
    };

    let fitted = outcome.artifacts.regressor.params();
    tracing::info!(
        trees = fitted.n_estimators,
        max_depth = fitted.max_depth,
        min_samples_split = fitted.min_samples_split,
        seed = fitted.seed,
        features = outcome.artifacts.regressor.n_features(),
        "forest fitted"
    );

    tracing::info!(
        train_rows = outcome.train_rows,
        test_rows = outcome.test_rows,
        mse = %format!("{:.2}", outcome.metrics.mse),
        r2 = %format!("{:.4}", outcome.metrics.r2),
        rmse = %format!("{:.2}", outcome.metrics.rmse),
        "model performance"
    );

    if args.dry_run {
        tracing::info!(dry_run = true, "skipping artifact write");
        return Ok(());
    }

    let output_dir = args.output_dir.unwrap_or(settings.model_dir);
    let paths = outcome
        .artifacts
        .save(&output_dir)
        .with_context(|| format!("failed to persist artifacts to {}", output_dir.display()))?;

    tracing::info!(
        model = %paths.model.display(),
        scaler = %paths.scaler.display(),
        feature_names = %paths.feature_names.display(),
        manifest = %paths.manifest.display(),
        "training complete"
    );
    Ok(())
}

fn init_sentry(settings: &stockrisk_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
