pub mod artifacts;
pub mod domain;
pub mod error;
pub mod features;
pub mod model;
pub mod scoring;
pub mod training;

pub mod config {
    use anyhow::Context;
    use std::path::PathBuf;

    const DEFAULT_MODEL_DIR: &str = "models";
    const DEFAULT_PORT: u16 = 5000;

    /// Settings shared by the API and the trainer. The listen port is read separately with
    /// [`listen_port`] so an offline training run never depends on `PORT`.
    #[derive(Debug, Clone)]
    pub struct Settings {
        pub model_dir: PathBuf,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> Self {
            let model_dir = non_empty_var("MODEL_DIR")
                .unwrap_or_else(|| DEFAULT_MODEL_DIR.to_string());

            Self {
                model_dir: PathBuf::from(model_dir),
                sentry_dsn: non_empty_var("SENTRY_DSN"),
            }
        }
    }

    pub fn listen_port() -> anyhow::Result<u16> {
        parse_port(std::env::var("PORT").ok())
    }

    fn parse_port(raw: Option<String>) -> anyhow::Result<u16> {
        match raw.filter(|s| !s.trim().is_empty()) {
            Some(s) => s
                .trim()
                .parse::<u16>()
                .with_context(|| format!("PORT must be a valid port number (got {s:?})")),
            None => Ok(DEFAULT_PORT),
        }
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|s| !s.trim().is_empty())
    }

}
