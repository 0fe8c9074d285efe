use std::path::Path;
use std::time::Duration;

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::controller::{ControllerSettings, PlaybackSettings};

/// Prefix for environment overrides, e.g. `CAREER_MENTOR_SERVER__PORT=8080`.
const ENV_PREFIX: &str = "CAREER_MENTOR";

/// Config file picked up from the working directory when none is given.
const DEFAULT_CONFIG_FILE: &str = "config.yaml";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Address to bind
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Base URL of the chat backend
    #[arg(long, env = "CHAT_API_URL")]
    pub chat_url: Option<String>,

    /// Free interactions for visitors who are not signed in
    #[arg(long, env = "FREE_INTERACTIONS_LIMIT")]
    pub free_limit: Option<u32>,

    /// Secret used to verify identity provider session tokens
    #[arg(long, env = "AUTH_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    pub log_json: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub chat: ChatConfig,
    pub usage: UsageConfig,
    pub streaming: StreamingConfig,
    pub workspace: WorkspaceConfig,
    pub auth: AuthConfig,
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UsageConfig {
    pub free_limit: u32,
    pub popup_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StreamingConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkspaceConfig {
    pub idle_timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default)]
    pub jwt_secret: Option<String>,
    pub sign_in_url: String,
    pub sign_up_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    pub json: bool,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder();

        // 1. Defaults
        builder = builder
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("chat.base_url", "http://localhost:8000")?
            .set_default("usage.free_limit", 25)?
            .set_default("usage.popup_delay_ms", 2000)?
            .set_default("streaming.min_delay_ms", 50)?
            .set_default("streaming.max_delay_ms", 150)?
            .set_default("workspace.idle_timeout_secs", 30 * 60)?
            .set_default("workspace.sweep_interval_secs", 60)?
            .set_default("auth.sign_in_url", "/sign-in")?
            .set_default("auth.sign_up_url", "/sign-up")?
            .set_default("log.json", false)?;

        // 2. Config file: explicit path, else ./config.yaml when present
        match &cli.config {
            Some(path) => builder = builder.add_source(File::with_name(path)),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                builder = builder.add_source(File::with_name(DEFAULT_CONFIG_FILE));
            }
            None => {}
        }

        // 3. Prefixed environment, e.g. CAREER_MENTOR_CHAT__BASE_URL
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // 4. CLI flags (and their env aliases) win
        if let Some(host) = cli.host {
            builder = builder.set_override("server.host", host)?;
        }
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(url) = cli.chat_url {
            builder = builder.set_override("chat.base_url", url)?;
        }
        if let Some(limit) = cli.free_limit {
            builder = builder.set_override("usage.free_limit", i64::from(limit))?;
        }
        if let Some(secret) = cli.jwt_secret {
            builder = builder.set_override("auth.jwt_secret", secret)?;
        }
        if let Some(json) = cli.log_json {
            builder = builder.set_override("log.json", json)?;
        }

        let cfg: AppConfig = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        url::Url::parse(&self.chat.base_url).map_err(|e| {
            config::ConfigError::Message(format!("chat.base_url is not a valid URL: {e}"))
        })?;
        if self.usage.free_limit == 0 {
            return Err(config::ConfigError::Message(
                "usage.free_limit must be greater than zero".to_string(),
            ));
        }
        if self.streaming.min_delay_ms > self.streaming.max_delay_ms {
            return Err(config::ConfigError::Message(
                "streaming.min_delay_ms must not exceed streaming.max_delay_ms".to_string(),
            ));
        }
        Ok(())
    }

    /// Controller tunables derived from this configuration.
    #[must_use]
    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            free_limit: self.usage.free_limit,
            playback: PlaybackSettings {
                min_delay: Duration::from_millis(self.streaming.min_delay_ms),
                max_delay: Duration::from_millis(self.streaming.max_delay_ms),
            },
        }
    }

    #[must_use]
    pub fn popup_delay(&self) -> Duration {
        Duration::from_millis(self.usage.popup_delay_ms)
    }

    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.workspace.idle_timeout_secs)
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.workspace.sweep_interval_secs)
    }

    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
