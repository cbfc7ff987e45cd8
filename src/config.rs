use arc_swap::ArcSwap;
use log::info;
use once_cell::sync::Lazy;
use serde_derive::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::errors::Error;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Globally available configuration.
static CONFIG: Lazy<ArcSwap<Config>> = Lazy::new(|| ArcSwap::from_pointee(Config::default()));

/// General configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct General {
    #[serde(default = "General::default_host")]
    pub host: String,

    #[serde(default = "General::default_port")]
    pub port: u16,

    // DuckDB database file, or ":memory:".
    #[serde(default = "General::default_database_path")]
    pub database_path: String,

    #[serde(default = "General::default_worker_threads")]
    pub worker_threads: usize,

    // tcp backlog.
    #[serde(default = "General::default_backlog")]
    pub backlog: u32,

    // Largest frontend message accepted after startup.
    #[serde(default = "General::default_max_message_size")]
    pub max_message_size: i32,

    // Encoded result bytes buffered before they are written to the client.
    #[serde(default = "General::default_result_buffer_size")] // 8192
    pub result_buffer_size: usize,

    #[serde(default = "General::default_tcp_keepalives_idle")]
    pub tcp_keepalives_idle: u64,
    #[serde(default = "General::default_tcp_keepalives_count")]
    pub tcp_keepalives_count: u32,
    #[serde(default = "General::default_tcp_keepalives_interval")]
    pub tcp_keepalives_interval: u64,
    #[serde(default = "General::default_tcp_so_linger")]
    pub tcp_so_linger: u64,
    #[serde(default = "General::default_tcp_no_delay")]
    pub tcp_no_delay: bool,

    #[serde(default)] // false
    pub log_client_connections: bool,

    pub syslog_prog_name: Option<String>,
}

impl General {
    pub fn default_host() -> String {
        "0.0.0.0".into()
    }

    pub fn default_port() -> u16 {
        5432
    }

    pub fn default_database_path() -> String {
        ":memory:".into()
    }

    pub fn default_worker_threads() -> usize {
        num_cpus::get()
    }

    pub fn default_backlog() -> u32 {
        1024
    }

    pub fn default_max_message_size() -> i32 {
        256 * 1024 * 1024
    }

    pub fn default_result_buffer_size() -> usize {
        8192
    }

    pub fn default_tcp_keepalives_idle() -> u64 {
        5 // 5 seconds
    }

    pub fn default_tcp_keepalives_count() -> u32 {
        5 // 5 time
    }

    pub fn default_tcp_keepalives_interval() -> u64 {
        1 // 1 second
    }

    pub fn default_tcp_so_linger() -> u64 {
        0 // 0 seconds
    }

    pub fn default_tcp_no_delay() -> bool {
        true
    }

    pub fn default_include_files() -> Vec<String> {
        vec![]
    }

    pub fn default_include() -> Include {
        Include {
            files: Self::default_include_files(),
        }
    }
}

impl Default for General {
    fn default() -> General {
        General {
            host: Self::default_host(),
            port: Self::default_port(),
            database_path: Self::default_database_path(),
            worker_threads: Self::default_worker_threads(),
            backlog: Self::default_backlog(),
            max_message_size: Self::default_max_message_size(),
            result_buffer_size: Self::default_result_buffer_size(),
            tcp_keepalives_idle: Self::default_tcp_keepalives_idle(),
            tcp_keepalives_count: Self::default_tcp_keepalives_count(),
            tcp_keepalives_interval: Self::default_tcp_keepalives_interval(),
            tcp_so_linger: Self::default_tcp_so_linger(),
            tcp_no_delay: Self::default_tcp_no_delay(),
            log_client_connections: false,
            syslog_prog_name: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Include {
    #[serde(default = "General::default_include_files")]
    pub files: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GeneralWithInclude {
    #[serde(default = "General::default_include")]
    pub include: Include,
}

/// Configuration wrapper.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    // Simple fields go before nested tables, otherwise the toml
    // serializer fails with ValueAfterTable.
    #[serde(default = "Config::default_path")]
    pub path: String,

    // General and global settings.
    #[serde(default)]
    pub general: General,

    // Include files.
    #[serde(default = "General::default_include")]
    pub include: Include,
}

impl Config {
    pub fn default_path() -> String {
        String::from("pg_duckdb_gateway.toml")
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            path: Self::default_path(),
            general: General::default(),
            include: General::default_include(),
        }
    }
}

impl Config {
    /// Print current configuration.
    pub fn show(&self) {
        info!("Listen address: {}:{}", self.general.host, self.general.port);
        info!("Database: {}", self.general.database_path);
        info!("Worker threads: {}", self.general.worker_threads);
        info!("Backlog: {}", self.general.backlog);
        info!("Max message size: {}", self.general.max_message_size);
        info!("Result buffer size: {}", self.general.result_buffer_size);
        info!(
            "Log client connections: {}",
            self.general.log_client_connections
        );
        if !self.include.files.is_empty() {
            info!("Included config files: {:?}", self.include.files);
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.general.port == 0 {
            return Err(Error::BadConfig("port must be greater than 0".to_string()));
        }
        if self.general.worker_threads == 0 {
            return Err(Error::BadConfig(
                "worker_threads must be greater than 0".to_string(),
            ));
        }
        if self.general.max_message_size < 1024 {
            return Err(Error::BadConfig(format!(
                "max_message_size of {} is too small, use at least 1024",
                self.general.max_message_size
            )));
        }
        if self.general.result_buffer_size == 0 {
            return Err(Error::BadConfig(
                "result_buffer_size must be greater than 0".to_string(),
            ));
        }
        if self.general.database_path.is_empty() {
            return Err(Error::BadConfig(
                "database_path can't be empty, use \":memory:\" for an in-memory database"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Get a read-only instance of the configuration
/// from anywhere in the app.
/// ArcSwap makes this cheap and quick.
pub fn get_config() -> Config {
    (*(*CONFIG.load())).clone()
}

async fn load_file(path: &str) -> Result<String, Error> {
    let mut contents = String::new();
    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(err) => {
            return Err(Error::BadConfig(format!(
                "Could not open '{path}': {err}"
            )));
        }
    };
    match file.read_to_string(&mut contents).await {
        Ok(_) => (),
        Err(err) => {
            return Err(Error::BadConfig(format!(
                "Could not read config file: {err}"
            )));
        }
    };
    Ok(contents)
}

/// Parse the configuration file located at the path.
pub async fn parse(path: &str) -> Result<(), Error> {
    let config = load(path).await?;

    // Update the configuration globally.
    CONFIG.store(Arc::new(config));

    Ok(())
}

/// Read, merge and validate the configuration without publishing it.
pub async fn load(path: &str) -> Result<Config, Error> {
    // parse only include.files = ["./path/to/file",...]
    let contents = load_file(path).await?;
    let include_config: GeneralWithInclude = match toml::from_str(&contents) {
        Ok(config) => config,
        Err(err) => {
            return Err(Error::BadConfig(format!(
                "Could not parse config file {path}: {err}"
            )));
        }
    };

    // merge main with include files via serde-toml-merge.
    let mut config_merged: toml::Value = match toml::from_str(&contents) {
        Ok(value) => value,
        Err(err) => {
            return Err(Error::BadConfig(format!(
                "Could not toml parse file {path}: {err:?}"
            )));
        }
    };
    for file in include_config.include.files {
        info!("Merge config with include file: {file}");
        let include_file_content = load_file(file.as_str()).await?;
        let include_file_value = match toml::from_str(&include_file_content) {
            Ok(value) => value,
            Err(err) => {
                return Err(Error::BadConfig(format!(
                    "Could not toml parse file {file}: {err:?}"
                )));
            }
        };
        config_merged = match serde_toml_merge::merge(config_merged, include_file_value) {
            Ok(value) => value,
            Err(err) => {
                return Err(Error::BadConfig(format!(
                    "Could merge config file {file}: {err:?}"
                )));
            }
        };
    }

    let mut config: Config = match toml::from_str(&config_merged.to_string()) {
        Ok(config) => config,
        Err(err) => {
            return Err(Error::BadConfig(format!(
                "Could not merge config: {err:?}"
            )));
        }
    };

    config.validate()?;

    config.path = path.to_string();

    Ok(config)
}
