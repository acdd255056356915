//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `INGESTCTL_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `INGESTCTL_` override YAML values
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `INGESTCTL_LIMITS__FILES__MAX_FILE_SIZE=1048576` sets the `limits.files.max_file_size` field.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use ingestctl::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Uploads are saved under {}", config.script_dir.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration Structure
//!
//! - **Server**: `host`, `port` - HTTP server binding configuration
//! - **Base directory**: `script_dir` - root used to resolve relative save paths
//! - **Limits**: `limits.files.*` - upload ceiling, parser memory cap, chunk size and the
//!   declared-length framing allowance
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! INGESTCTL_PORT=8080
//! INGESTCTL_SCRIPT_DIR=/srv/www
//! INGESTCTL_LIMITS__FILES__MAX_FILE_SIZE=10485760
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::errors::Error;
use crate::upload::{DEFAULT_UPLOAD_LIMIT, MIB, UploadSettings};

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "INGESTCTL_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// All fields have defaults defined in the `Default` implementation, so an empty (or missing)
/// YAML file yields a usable configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Base ("script") directory. Relative save targets are resolved under it.
    pub script_dir: PathBuf,
    /// Resource limits for protecting memory and disk
    pub limits: LimitsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            script_dir: PathBuf::from("."),
            limits: LimitsConfig::default(),
        }
    }
}

/// Resource limits configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    pub files: FileLimitsConfig,
}

/// File upload limits.
///
/// `max_file_size` is the default streaming ceiling; callers may override it per upload with an
/// explicit limit in MiB.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileLimitsConfig {
    /// Default upload ceiling in bytes.
    /// Default: 32MiB
    pub max_file_size: u64,
    /// Working-memory cap handed to the multipart parser. Form fields other than the one being
    /// ingested may not exceed this many bytes.
    /// Default: 32MiB
    pub memory_limit: u64,
    /// Bytes copied per step while streaming a field. Defaults to `memory_limit` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<u64>,
    /// Allowance subtracted from the declared `Content-Length` before the precheck compares it
    /// with the ceiling. Approximates multipart framing; the streaming ceiling is always enforced.
    /// Default: 20
    pub framing_overhead: u64,
}

impl Default for FileLimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_UPLOAD_LIMIT,
            memory_limit: DEFAULT_UPLOAD_LIMIT,
            chunk_size: None,
            framing_overhead: 20,
        }
    }
}

impl FileLimitsConfig {
    /// Build per-upload settings, optionally overriding the ceiling with a limit in MiB.
    pub fn upload_settings(&self, limit_mib: Option<u64>) -> UploadSettings {
        let limit = limit_mib.map_or(self.max_file_size, |mib| mib.saturating_mul(MIB));
        UploadSettings {
            limit,
            memory_cap: self.memory_limit,
            chunk_size: self.chunk_size.unwrap_or(self.memory_limit),
            framing_overhead: self.framing_overhead,
        }
    }

    /// Like [`upload_settings`](Self::upload_settings), for a limit supplied by a remote client:
    /// `limit_mib` can lower the configured ceiling but never raise it.
    pub fn capped_upload_settings(&self, limit_mib: Option<u64>) -> UploadSettings {
        let mut settings = self.upload_settings(limit_mib);
        settings.limit = settings.limit.min(self.max_file_size);
        settings
    }
}

impl Config {
    /// Load configuration from the YAML file named in `args`, merged with `INGESTCTL_` environment
    /// variables, then validate it.
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency
    pub fn validate(&self) -> Result<(), Error> {
        let files = &self.limits.files;
        if files.max_file_size == 0 {
            return Err(Error::Config {
                message: "limits.files.max_file_size must be greater than 0".to_string(),
            });
        }
        if files.memory_limit == 0 {
            return Err(Error::Config {
                message: "limits.files.memory_limit must be greater than 0".to_string(),
            });
        }
        if files.chunk_size == Some(0) {
            return Err(Error::Config {
                message: "limits.files.chunk_size must be greater than 0 when set".to_string(),
            });
        }
        if usize::try_from(files.max_file_size).is_err() {
            return Err(Error::Config {
                message: format!(
                    "limits.files.max_file_size ({}) does not fit in memory on this platform",
                    files.max_file_size
                ),
            });
        }
        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("INGESTCTL_").split("__"))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
