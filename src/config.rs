//! Configuration for romdb
//!
//! Centralized configuration with sensible defaults.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::RomError;

/// Main configuration for a romdb instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Dataset Configuration
    // -------------------------------------------------------------------------
    /// Source file the dataset is loaded from and watched for changes.
    /// Never written by the server process.
    pub source_path: PathBuf,

    /// File format of the source file
    pub backend: Backend,

    /// What to do when the initial load fails
    pub boot_policy: BootPolicy,

    // -------------------------------------------------------------------------
    // Reload Configuration
    // -------------------------------------------------------------------------
    /// How often the watcher stats the source file (milliseconds)
    pub watch_interval_ms: u64,

    /// Upper bound on how long shutdown waits for each background unit (milliseconds)
    pub shutdown_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// Wire protocol spoken to clients
    pub protocol: ProtocolKind,

    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,
}

/// Storage backend, i.e. the on-disk format of the source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Indexed binary file (see `loader::sstable`)
    SSTable,

    /// Flat JSON object mapping string keys to string values
    Json,
}

/// Wire protocol selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolKind {
    /// memcached text protocol, retrieval commands only
    Memcached,
}

/// Behaviour when the initial load fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootPolicy {
    /// Fail `Store::open` (default)
    Strict,

    /// Serve an empty dataset until the watcher picks up a valid file
    AllowEmpty,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_path: PathBuf::from("./data/sample.sst"),
            backend: Backend::SSTable,
            boot_policy: BootPolicy::Strict,
            watch_interval_ms: 5000,
            shutdown_timeout_ms: 10_000,
            protocol: ProtocolKind::Memcached,
            listen_addr: "127.0.0.1:11211".to_string(),
            max_connections: 1024,
            read_timeout_ms: 0,
            write_timeout_ms: 0,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Reject settings the background units cannot run with
    pub fn validate(&self) -> Result<(), RomError> {
        if self.watch_interval_ms == 0 {
            return Err(RomError::Config(
                "watch interval must be at least 1ms".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(RomError::Config(
                "max connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the source file path
    pub fn source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.source_path = path.into();
        self
    }

    /// Set the storage backend
    pub fn backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    /// Set the boot policy
    pub fn boot_policy(mut self, policy: BootPolicy) -> Self {
        self.config.boot_policy = policy;
        self
    }

    /// Set the watch interval (in milliseconds)
    pub fn watch_interval_ms(mut self, ms: u64) -> Self {
        self.config.watch_interval_ms = ms;
        self
    }

    /// Set the shutdown bound (in milliseconds)
    pub fn shutdown_timeout_ms(mut self, ms: u64) -> Self {
        self.config.shutdown_timeout_ms = ms;
        self
    }

    /// Set the wire protocol
    pub fn protocol(mut self, protocol: ProtocolKind) -> Self {
        self.config.protocol = protocol;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
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

// =============================================================================
// Name parsing (used by the CLI flags)
// =============================================================================

impl FromStr for Backend {
    type Err = RomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sstable" | "sst" => Ok(Backend::SSTable),
            "json" => Ok(Backend::Json),
            other => Err(RomError::Config(format!(
                "don't know how to handle store '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::SSTable => f.write_str("sstable"),
            Backend::Json => f.write_str("json"),
        }
    }
}

impl FromStr for ProtocolKind {
    type Err = RomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memcached" => Ok(ProtocolKind::Memcached),
            other => Err(RomError::Config(format!(
                "don't know how to handle protocol '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolKind::Memcached => f.write_str("memcached"),
        }
    }
}
