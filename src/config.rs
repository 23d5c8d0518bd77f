//! Configuration for poolvfs
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for a pool instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Backing directory for the pool
    /// Internal structure:
    ///   {data_dir}/
    ///     └── .opaque/         (randomly named physical slots)
    pub data_dir: PathBuf,

    /// Number of slots created when the backing directory holds none
    pub initial_capacity: usize,

    /// Wipe every slot header while acquiring it (start fresh)
    pub clear_on_init: bool,

    /// Page size used by dirty-page persistence and tracking
    pub page_size: usize,

    // -------------------------------------------------------------------------
    // Acquisition Configuration
    // -------------------------------------------------------------------------
    /// Attempts made to acquire busy slots before force-deleting them
    pub acquire_attempts: u32,

    /// Base backoff between attempts; attempt `n` waits `n * backoff`
    pub acquire_backoff_ms: u64,

    /// Upper bound on pool initialization (0 disables the bound)
    pub open_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Connection read timeout (milliseconds)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds)
    pub write_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./poolvfs_data"),
            initial_capacity: 6,
            clear_on_init: false,
            page_size: 4096,
            acquire_attempts: 3,
            acquire_backoff_ms: 100,
            open_timeout_ms: 30_000,
            listen_addr: "127.0.0.1:7461".to_string(),
            read_timeout_ms: 0,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Initialization deadline, if one is configured
    pub fn open_timeout(&self) -> Option<Duration> {
        (self.open_timeout_ms > 0).then(|| Duration::from_millis(self.open_timeout_ms))
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the backing directory
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the capacity created for an empty backing directory
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.config.initial_capacity = capacity;
        self
    }

    /// Wipe all slots during initialization
    pub fn clear_on_init(mut self, clear: bool) -> Self {
        self.config.clear_on_init = clear;
        self
    }

    /// Set the page size (in bytes)
    pub fn page_size(mut self, size: usize) -> Self {
        self.config.page_size = size;
        self
    }

    /// Set the number of acquisition attempts
    pub fn acquire_attempts(mut self, attempts: u32) -> Self {
        self.config.acquire_attempts = attempts;
        self
    }

    /// Set the base acquisition backoff (in milliseconds)
    pub fn acquire_backoff_ms(mut self, ms: u64) -> Self {
        self.config.acquire_backoff_ms = ms;
        self
    }

    /// Set the initialization timeout (in milliseconds)
    pub fn open_timeout_ms(mut self, ms: u64) -> Self {
        self.config.open_timeout_ms = ms;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
