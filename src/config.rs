use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "MedSim";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Follow-up doses may be prepared this long before the protocol delay elapses.
pub const FOLLOW_UP_GRACE_MINUTES: i64 = 60;

/// Maximum audit buffer size before flush.
pub const AUDIT_BUFFER_CAPACITY: usize = 100;

/// Audit rows older than this (in wall-clock days) are pruned at shutdown.
pub const AUDIT_RETENTION_DAYS: i64 = 365;

/// Longest order a prescription or follow-up may run for.
pub const MAX_ORDER_SPAN_DAYS: i64 = 3650;

/// Default HTTP bind address for the local training server.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";

const ENV_DB_PATH: &str = "MEDSIM_DB_PATH";
const ENV_BIND_ADDR: &str = "MEDSIM_BIND_ADDR";
const ENV_INSTRUCTOR_PIN: &str = "MEDSIM_INSTRUCTOR_PIN";

/// Get the application data directory
/// ~/MedSim/ on all platforms, falling back to the working directory
/// when no home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default database location inside the data directory.
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("medsim.db")
}

/// Filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "medsim_lib=info,medsim=info,tower_http=warn"
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid bind address in {var}: {value}")]
    InvalidBindAddr { var: &'static str, value: String },
    #[error("Instructor PIN must be 4-12 digits")]
    InvalidPin,
}

/// Runtime configuration for the server binary.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub bind_addr: SocketAddr,
    /// `None` disables the clock controls entirely.
    pub instructor_pin: Option<String>,
}

impl AppConfig {
    /// Build from `MEDSIM_*` environment variables, using defaults for unset ones.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let db_path = lookup(ENV_DB_PATH)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_db_path);

        let bind_raw = lookup(ENV_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidBindAddr {
                var: ENV_BIND_ADDR,
                value: bind_raw.clone(),
            })?;

        let instructor_pin = match lookup(ENV_INSTRUCTOR_PIN) {
            Some(pin) if !pin.trim().is_empty() => {
                let pin = pin.trim().to_string();
                if !(4..=12).contains(&pin.len()) || !pin.chars().all(|c| c.is_ascii_digit()) {
                    return Err(ConfigError::InvalidPin);
                }
                Some(pin)
            }
            _ => None,
        };

        Ok(Self {
            db_path,
            bind_addr,
            instructor_pin,
        })
    }
}
