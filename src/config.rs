use crate::feed::RemovePolicy;
use clap::{Parser, Subcommand};
use config::{Config, Environment, File};
use serde::Deserialize;

/// Largest feed window the service will return in one list call.
const MAX_FEED_LIMIT: usize = 100;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Backend API endpoint (e.g. https://cloud.appwrite.io/v1)
    #[arg(long, env = "APPWRITE_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Backend project id
    #[arg(long, env = "APPWRITE_PROJECT_ID")]
    pub project_id: Option<String>,

    /// Database holding the ideas collection
    #[arg(long, env = "APPWRITE_DATABASE_ID")]
    pub database_id: Option<String>,

    /// Ideas collection id
    #[arg(long, env = "APPWRITE_COLLECTION_ID")]
    pub collection_id: Option<String>,

    /// Number of ideas kept in the feed window
    #[arg(long, env = "FEED_LIMIT")]
    pub feed_limit: Option<usize>,

    /// Emit JSON log lines
    #[arg(long, env = "LOG_JSON")]
    pub log_json: Option<bool>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the current feed window and exit
    Feed,
    /// Interactive console hosting the session and the feed
    Shell {
        /// Run against an in-process backend instead of the service
        #[arg(long)]
        offline: bool,
    },
}

impl Cli {
    #[must_use]
    pub fn offline(&self) -> bool {
        matches!(self.command, Some(Command::Shell { offline: true }))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub feed: FeedConfig,
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub endpoint: String,
    pub project_id: String,
    pub database_id: String,
    pub collection_id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    pub limit: usize,
    pub remove_policy: RemovePolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    pub filter: String,
    pub json: bool,
}

impl AppConfig {
    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Self::from_cli(&cli)
    }

    /// Build the configuration for an already-parsed command line.
    ///
    /// Priority: CLI flag > CLI env var > `IDEA_BOARD_*` env > config file > defaults.
    /// The `backend` section has no defaults outside offline mode, so a
    /// missing endpoint or id fails here, at startup.
    pub fn from_cli(cli: &Cli) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();

        // 1. Defaults
        builder = builder
            .set_default("feed.limit", 10)?
            .set_default("feed.remove_policy", "refetch")?
            .set_default("log.filter", "info")?
            .set_default("log.json", false)?;

        if cli.offline() {
            builder = builder
                .set_default("backend.endpoint", "memory://local")?
                .set_default("backend.project_id", "offline")?
                .set_default("backend.database_id", "offline")?
                .set_default("backend.collection_id", "ideas")?;
        }

        // 2. Config file: explicit path must exist, ./config.{yaml,toml,json} is optional
        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path)),
            None => builder.add_source(File::with_name("config").required(false)),
        };

        // 3. Environment variables (prefixed with IDEA_BOARD_)
        // E.g. IDEA_BOARD_FEED__LIMIT=20
        builder = builder.add_source(
            Environment::with_prefix("IDEA_BOARD")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // 4. CLI overrides (clap already folded in the APPWRITE_* env vars)
        if let Some(endpoint) = &cli.endpoint {
            builder = builder.set_override("backend.endpoint", endpoint.as_str())?;
        }
        if let Some(project) = &cli.project_id {
            builder = builder.set_override("backend.project_id", project.as_str())?;
        }
        if let Some(database) = &cli.database_id {
            builder = builder.set_override("backend.database_id", database.as_str())?;
        }
        if let Some(collection) = &cli.collection_id {
            builder = builder.set_override("backend.collection_id", collection.as_str())?;
        }
        if let Some(limit) = cli.feed_limit {
            builder = builder.set_override("feed.limit", limit as u64)?;
        }
        if let Some(json) = cli.log_json {
            builder = builder.set_override("log.json", json)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        let required = [
            ("backend.endpoint", &self.backend.endpoint),
            ("backend.project_id", &self.backend.project_id),
            ("backend.database_id", &self.backend.database_id),
            ("backend.collection_id", &self.backend.collection_id),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(config::ConfigError::Message(format!(
                    "{key} cannot be empty"
                )));
            }
        }

        url::Url::parse(&self.backend.endpoint).map_err(|e| {
            config::ConfigError::Message(format!("backend.endpoint is not a valid URL: {e}"))
        })?;

        if self.feed.limit == 0 || self.feed.limit > MAX_FEED_LIMIT {
            return Err(config::ConfigError::Message(format!(
                "feed.limit must be between 1 and {MAX_FEED_LIMIT}, got {}",
                self.feed.limit
            )));
        }
        Ok(())
    }
}
