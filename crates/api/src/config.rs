use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Configuration that could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Where original and compressed documents live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// An S3-compatible bucket. `endpoint_url` points at non-AWS stores
    /// such as MinIO.
    S3 {
        bucket: String,
        endpoint_url: Option<String>,
    },
    /// A directory tree on local disk, for development.
    Local { root: PathBuf },
}

/// Server configuration loaded from environment variables.
#[derive(Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// HTTP request timeout in seconds (default: `600`). Must exceed the
    /// compression timeout so a slow job is failed by the pipeline rather
    /// than cut off by the HTTP layer.
    pub request_timeout_secs: u64,
    /// Shared secret expected in the `x-api-key` header.
    pub api_key: String,
    pub database_url: String,
    pub storage: StorageBackend,
    /// Ghostscript executable (default: `gs`, resolved through `PATH`).
    pub ghostscript_bin: PathBuf,
    /// Upper bound on one Ghostscript run in seconds (default: `300`).
    pub compression_timeout_secs: u64,
    /// Parent directory for per-job scratch space. `None` uses the system
    /// temp directory.
    pub staging_dir: Option<PathBuf>,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("api_key", &"<redacted>")
            .field("database_url", &"<redacted>")
            .field("storage", &self.storage)
            .field("ghostscript_bin", &self.ghostscript_bin)
            .field("compression_timeout_secs", &self.compression_timeout_secs)
            .field("staging_dir", &self.staging_dir)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default            |
    /// |----------------------------|--------------------|
    /// | `HOST`                     | `0.0.0.0`          |
    /// | `PORT`                     | `8080`             |
    /// | `REQUEST_TIMEOUT_SECS`     | `600`              |
    /// | `WORKER_API_KEY`           | required           |
    /// | `DATABASE_URL`             | required           |
    /// | `STORAGE_BACKEND`          | `s3`               |
    /// | `STORAGE_BUCKET`           | required for `s3`  |
    /// | `STORAGE_ENDPOINT_URL`     | unset              |
    /// | `LOCAL_STORAGE_ROOT`       | `./storage`        |
    /// | `GHOSTSCRIPT_BIN`          | `gs`               |
    /// | `COMPRESSION_TIMEOUT_SECS` | `300`              |
    /// | `STAGING_DIR`              | system temp        |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`ServerConfig::from_env`], reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values are treated as unset.
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let storage = match get("STORAGE_BACKEND")
            .unwrap_or_else(|| "s3".into())
            .to_ascii_lowercase()
            .as_str()
        {
            "s3" => StorageBackend::S3 {
                bucket: get("STORAGE_BUCKET").ok_or(ConfigError::Missing("STORAGE_BUCKET"))?,
                endpoint_url: get("STORAGE_ENDPOINT_URL"),
            },
            "local" => StorageBackend::Local {
                root: get("LOCAL_STORAGE_ROOT")
                    .unwrap_or_else(|| "./storage".into())
                    .into(),
            },
            other => {
                return Err(ConfigError::Invalid {
                    var: "STORAGE_BACKEND",
                    reason: format!("unknown backend '{other}', expected 's3' or 'local'"),
                });
            }
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(get("PORT"), "PORT", 8080)?,
            request_timeout_secs: parse_or(
                get("REQUEST_TIMEOUT_SECS"),
                "REQUEST_TIMEOUT_SECS",
                600,
            )?,
            api_key: get("WORKER_API_KEY").ok_or(ConfigError::Missing("WORKER_API_KEY"))?,
            database_url: get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            storage,
            ghostscript_bin: get("GHOSTSCRIPT_BIN")
                .unwrap_or_else(|| pdfpress_pipeline::ghostscript::DEFAULT_BINARY.into())
                .into(),
            compression_timeout_secs: parse_or(
                get("COMPRESSION_TIMEOUT_SECS"),
                "COMPRESSION_TIMEOUT_SECS",
                pdfpress_pipeline::ghostscript::DEFAULT_TIMEOUT.as_secs(),
            )?,
            staging_dir: get("STAGING_DIR").map(PathBuf::from),
        })
    }
}

fn parse_or<T>(raw: Option<String>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
    }
}
