//! Process-wide settings of the server, read once at startup

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::server::{ListenAddr, ServerOptions};
use crate::storage::DEFAULT_DB_PATH;
use crate::thread_pool::ThreadPoolVariant;
use crate::Result;

/// Settings of the server. Missing fields of a configuration file take their default values.
///
/// ```
/// use echo_kvs::ServerConfig;
///
/// let config: ServerConfig = serde_json::from_str(r#"{ "port": 9000 }"#).unwrap();
/// assert_eq!(9000, config.port);
/// assert_eq!("0.0.0.0:9000", config.listen_addr().unwrap().to_string());
/// assert_eq!(None, config.idle_timeout());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP port that the server listens on all interfaces
    pub port: u16,
    /// Explicit listen address, takes precedence over `port` when not empty
    pub listen_addr: String,
    /// Seconds before an idle connection is closed, disabled when not positive
    pub idle_timeout_s: i64,
    /// Milliseconds the server waits for its connections when stopping
    pub logoff_ms: u64,
    /// Send the request attachment back with the response
    pub echo_attachment: bool,
    /// Directory of the backing store, removed when the server stops
    pub db_path: PathBuf,
    /// Thread pool serving the connections
    pub pool: ThreadPoolVariant,
    /// Number of worker threads, defaults to the number of CPUs
    pub threads: Option<u32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            listen_addr: String::new(),
            idle_timeout_s: -1,
            logoff_ms: 2000,
            echo_attachment: false,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            pool: ThreadPoolVariant::default(),
            threads: None,
        }
    }
}

impl ServerConfig {
    /// Read the settings from a JSON file
    pub fn from_json_file<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Resolve the address that the server binds to
    pub fn listen_addr(&self) -> Result<ListenAddr> {
        if self.listen_addr.is_empty() {
            return Ok(ListenAddr::any(self.port));
        }
        self.listen_addr.parse()
    }

    /// Idle timeout of the connections, `None` when disabled
    pub fn idle_timeout(&self) -> Option<Duration> {
        if self.idle_timeout_s > 0 {
            Some(Duration::from_secs(self.idle_timeout_s as u64))
        } else {
            None
        }
    }

    /// Number of threads of the worker pool
    pub fn threads(&self) -> u32 {
        self.threads.unwrap_or_else(|| num_cpus::get() as u32)
    }

    /// Options of the RPC server
    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            idle_timeout: self.idle_timeout(),
            logoff: Duration::from_millis(self.logoff_ms),
        }
    }
}
