use centroid::{AccumulatorConfig, StoreConfig};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Command-line options. Every flag is optional and overrides the config
/// file and environment.
#[derive(Debug, Default, Clone, Parser)]
#[command(name = "centroid-server", version, about = "Running centroid accumulator HTTP server")]
pub struct Cli {
    /// Config file (toml, yaml, or json). Defaults to ./centroid.* if present.
    #[arg(long)]
    pub config: Option<String>,

    /// Vector dimensionality [default: 3]
    #[arg(long)]
    pub dim: Option<usize>,

    /// Address to bind [default: 0.0.0.0]
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind [default: 8080]
    #[arg(long)]
    pub port: Option<u16>,

    /// Aggregate store backend [default: redb]
    #[arg(long, value_enum)]
    pub store_backend: Option<StoreBackend>,

    /// Redis host [default: 127.0.0.1]
    #[arg(long)]
    pub store_host: Option<String>,

    /// Redis port [default: 6379]
    #[arg(long)]
    pub store_port: Option<u16>,

    /// Redb database file [default: centroid.redb]
    #[arg(long)]
    pub store_path: Option<String>,

    /// Log filter directive, e.g. `info` or `server=debug` [default: info]
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Which [`StoreConfig`] variant to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Redb,
    Redis,
    InMemory,
}

/// Connection settings for the aggregate store
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Redis host
    #[serde(default = "default_store_host")]
    pub host: String,

    /// Redis port
    #[serde(default = "default_store_port")]
    pub port: u16,

    /// Redb database file
    #[serde(default = "default_store_path")]
    pub path: String,

    /// Key holding the aggregate
    #[serde(default = "default_store_key")]
    pub key: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            host: default_store_host(),
            port: default_store_port(),
            path: default_store_path(),
            key: default_store_key(),
        }
    }
}

impl StoreSettings {
    /// Translate into the store crate's configuration. Redis calls are
    /// bounded by the same timeout the accumulator applies.
    pub fn store_config(&self, timeout: Duration) -> StoreConfig {
        let base = match self.backend {
            StoreBackend::Redb => StoreConfig::redb(self.path.clone()),
            StoreBackend::Redis => StoreConfig::redis(&self.host, self.port, timeout),
            StoreBackend::InMemory => StoreConfig::in_memory(),
        };
        base.with_key(self.key.clone())
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server bind address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum request body size in MB
    #[serde(default = "default_max_body_size_mb")]
    pub max_body_size_mb: usize,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Metrics endpoint enabled
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// Dimension, store timeout, and retry policy
    #[serde(default)]
    pub accumulator: AccumulatorConfig,

    #[serde(default)]
    pub store: StoreSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            max_body_size_mb: default_max_body_size_mb(),
            enable_cors: default_true(),
            log_level: default_log_level(),
            metrics_enabled: default_true(),
            accumulator: AccumulatorConfig::default(),
            store: StoreSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the config file, environment variables, and
    /// command-line flags, in increasing order of precedence.
    ///
    /// Environment variables use the `CENTROID` prefix and `__` as the
    /// nesting separator, e.g. `CENTROID__PORT=9000` or
    /// `CENTROID__STORE__BACKEND=redis`.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let file = match &cli.config {
            Some(path) => config::File::with_name(path).required(true),
            None => config::File::with_name("centroid").required(false),
        };

        let builder = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix("CENTROID").separator("__"));

        let mut config: ServerConfig = builder.build()?.try_deserialize()?;
        config.apply_cli(cli);
        config.accumulator.validate()?;
        Ok(config)
    }

    /// Overlay any flags that were given on the command line.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(dim) = cli.dim {
            self.accumulator.dim = dim;
        }
        if let Some(host) = &cli.host {
            self.bind_addr = host.clone();
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(backend) = cli.store_backend {
            self.store.backend = backend;
        }
        if let Some(host) = &cli.store_host {
            self.store.host = host.clone();
        }
        if let Some(port) = cli.store_port {
            self.store.port = port;
        }
        if let Some(path) = &cli.store_path {
            self.store.path = path.clone();
        }
        if let Some(level) = &cli.log_level {
            self.log_level = level.clone();
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.bind_addr, self.port);
        Ok(addr_str.parse()?)
    }

    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get max body size in bytes
    pub fn max_body_size(&self) -> usize {
        self.max_body_size_mb * 1024 * 1024
    }

    pub fn store_config(&self) -> StoreConfig {
        self.store.store_config(self.accumulator.store_timeout)
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_body_size_mb() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_store_host() -> String {
    "127.0.0.1".to_string()
}

fn default_store_port() -> u16 {
    6379
}

fn default_store_path() -> String {
    "centroid.redb".to_string()
}

fn default_store_key() -> String {
    store::DEFAULT_KEY.to_string()
}
