use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::chat::RoutingMode;
use crate::db::Driver;
use crate::util::logging::LogFormat;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    /// Sessions untouched for longer than this are torn down.
    pub session_idle_minutes: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    pub backend: String, // "ollama" or "remote"
    pub model: String,   // Default model name
    /// Models offered in the UI. The default model is always offered.
    pub models: Vec<String>,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub temperature: f32,
    pub timeout_secs: Option<u64>,
}

/// Values pre-filled into the connection form.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub driver: Driver,
    pub host: String,
    pub port: String,
    pub username: String,
    pub database: String,
    /// Rows per table included in the schema description sent to the LLM.
    pub sample_rows: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatConfig {
    pub routing: RoutingMode,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub web: WebConfig,
    pub llm: LlmConfig,
    pub database: DatabaseConfig,
    pub chat: ChatConfig,
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Default LLM model
    #[arg(short, long)]
    pub model: Option<String>,

    /// Route every message to SQL, or classify each message first
    #[arg(long, value_enum)]
    pub routing: Option<RoutingMode>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        // Start with default configuration
        let mut config_builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let default_locations = vec![
                "config.toml",
                "config/config.toml",
                "/etc/sql-chat/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        // SQLCHAT__LLM__MODEL=llama3 and friends
        config_builder = config_builder.add_source(
            Environment::with_prefix("SQLCHAT")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("llm.models")
                .try_parsing(true),
        );

        // Build the config
        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        // Override with command line args if provided
        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }
        if let Some(model) = &args.model {
            config.llm.model = model.clone();
        }
        if let Some(routing) = args.routing {
            config.chat.routing = routing;
        }

        if !config.llm.models.contains(&config.llm.model) {
            config.llm.models.insert(0, config.llm.model.clone());
        }

        Ok(config)
    }
}

// Default implementation
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            web: WebConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                session_idle_minutes: 120,
            },
            llm: LlmConfig {
                backend: "ollama".to_string(),
                model: "llama3.2:latest".to_string(),
                models: vec!["llama3.2:latest".to_string(), "llama3:latest".to_string()],
                api_key: None,
                api_url: None,
                temperature: 0.1,
                timeout_secs: None,
            },
            database: DatabaseConfig {
                driver: Driver::Mysql,
                host: "localhost".to_string(),
                port: "3306".to_string(),
                username: "root".to_string(),
                database: "dbname".to_string(),
                sample_rows: 3,
            },
            chat: ChatConfig {
                routing: RoutingMode::Classify,
            },
        }
    }
}
