//! Parses config file
use std::{
    env,
    fs::OpenOptions,
    io::Read,
    path::{Path, PathBuf},
    time::Duration,
};

use eyre::eyre;
use serde::Deserialize;

use crate::{
    loader::{LoaderOptions, DEFAULT_LOCAL_CHUNK_SIZE, DEFAULT_REMOTE_CHUNK_SIZE},
    retry::{RetryPolicy, DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_BACKOFF},
    transport::RemoteOptions,
};

pub static CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    /// Missing means retry forever.
    pub max_attempts: Option<u32>,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF.as_millis() as u64,
            max_backoff_ms: DEFAULT_MAX_BACKOFF.as_millis() as u64,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Origin serving `data/<name>.wzx` and `data/<name>.wzl`
    pub base_url: Option<String>,
    /// Folder holding local archive pairs
    pub data_dir: Option<PathBuf>,
    /// Write fetched archives into `data_dir`
    pub mirror: bool,
    pub on_demand: bool,
    pub auto_load_delay_ms: u64,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub local_chunk_size: u64,
    pub remote_chunk_size: u64,
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        let loader = LoaderOptions::default();
        let remote = RemoteOptions::default();

        Self {
            base_url: None,
            data_dir: None,
            mirror: false,
            on_demand: loader.on_demand,
            auto_load_delay_ms: loader.auto_load_delay.as_millis() as u64,
            connect_timeout_ms: remote.connect_timeout.as_millis() as u64,
            read_timeout_ms: remote.read_timeout.as_millis() as u64,
            local_chunk_size: DEFAULT_LOCAL_CHUNK_SIZE,
            remote_chunk_size: DEFAULT_REMOTE_CHUNK_SIZE,
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    pub fn remote_options(&self) -> RemoteOptions {
        RemoteOptions {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let policy = match self.retry.max_attempts {
            Some(max_attempts) => RetryPolicy::bounded(max_attempts),
            None => RetryPolicy::forever(),
        };

        policy.with_backoff(
            Duration::from_millis(self.retry.initial_backoff_ms),
            Duration::from_millis(self.retry.max_backoff_ms),
        )
    }

    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions {
            local_chunk_size: self.local_chunk_size,
            remote_chunk_size: self.remote_chunk_size,
            on_demand: self.on_demand,
            auto_load_delay: Duration::from_millis(self.auto_load_delay_ms),
            retry: self.retry_policy(),
        }
    }

    fn check(&self) -> eyre::Result<()> {
        if self.local_chunk_size == 0 || self.remote_chunk_size == 0 {
            return Err(eyre!("Chunk sizes must be greater than 0"));
        }

        if self.retry.max_attempts == Some(0) {
            return Err(eyre!("retry.max_attempts must be at least 1"));
        }

        if let Some(base_url) = &self.base_url {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err(eyre!("base_url must be an http(s) url: {base_url}"));
            }
        }

        Ok(())
    }
}

/// Parse `config.toml` in the same folder as the binary.
///
/// A missing file is not an error, every field has a default.
pub fn parse_config() -> eyre::Result<Config> {
    let path = match env::current_exe() {
        Ok(path) => path
            .parent()
            .map(|parent| parent.join(CONFIG_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME)),
        Err(_) => PathBuf::from(CONFIG_FILE_NAME),
    };

    if !path.exists() {
        return Ok(Config::default());
    }

    parse_config_from_file(path.as_path())
}

pub fn parse_config_from_file(path: &Path) -> eyre::Result<Config> {
    let mut file = OpenOptions::new().read(true).open(path.as_os_str())?;
    let mut buffer = String::new();

    file.read_to_string(&mut buffer)?;

    let mut config: Config = toml::from_str(&buffer)?;

    config.check()?;

    // relative data folders are relative to the config file
    if let (Some(data_dir), Some(root)) = (&config.data_dir, path.parent()) {
        if data_dir.is_relative() {
            config.data_dir = Some(root.join(data_dir));
        }
    }

    Ok(config)
}
