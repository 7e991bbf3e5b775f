use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub qr: QrConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Shared gateway key, required for `api_key`.
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Trust `x-user-*` headers from the session gateway.
    TrustedHeaders,
    /// Like `TrustedHeaders`, but the gateway must also present the API key.
    ApiKey,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::TrustedHeaders => "trusted_headers",
            AuthMethod::ApiKey => "api_key",
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// How long a writer waits for the database lock.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("loket.db")
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

/// Ticket scheduling rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Office time zone as a fixed UTC offset (7 = WIB).
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,

    /// Reject scheduled times that are not in `time_slots`.
    #[serde(default = "default_true")]
    pub enforce_time_slots: bool,

    /// Allowed "HH:MM" slots.
    #[serde(default = "default_time_slots")]
    pub time_slots: Vec<String>,

    /// How far ahead a visit can be booked, in days. 0 disables the limit.
    #[serde(default = "default_max_days_ahead")]
    pub max_days_ahead: u32,

    #[serde(default)]
    pub allow_past_dates: bool,

    /// Attempts per operation when it hits a write conflict.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: default_utc_offset_hours(),
            enforce_time_slots: true,
            time_slots: default_time_slots(),
            max_days_ahead: default_max_days_ahead(),
            allow_past_dates: false,
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_utc_offset_hours() -> i32 {
    7
}

/// Morning 08:00-11:00 and afternoon 13:00-15:00, every 30 minutes.
pub fn default_time_slots() -> Vec<String> {
    let mut slots = Vec::new();
    for (start, end) in [(8, 11), (13, 15)] {
        for hour in start..=end {
            slots.push(format!("{:02}:00", hour));
            if hour < end {
                slots.push(format!("{:02}:30", hour));
            }
        }
    }
    slots
}

fn default_max_days_ahead() -> u32 {
    30
}

fn default_max_attempts() -> u32 {
    5
}

/// QR code rendering.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QrConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Pixels per module.
    #[serde(default = "default_qr_scale")]
    pub scale: u32,
    /// Quiet zone, in modules.
    #[serde(default = "default_qr_margin")]
    pub margin: u32,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scale: default_qr_scale(),
            margin: default_qr_margin(),
        }
    }
}

fn default_qr_scale() -> u32 {
    8
}

fn default_qr_margin() -> u32 {
    2
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    pub qr: QrConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
    pub api_key_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: config.auth.method.as_str().to_string(),
                api_key_configured: config
                    .auth
                    .api_key
                    .as_ref()
                    .is_some_and(|k| !k.is_empty()),
            },
            server: config.server.clone(),
            database: config.database.clone(),
            queue: config.queue.clone(),
            qr: config.qr.clone(),
            logging: config.logging.clone(),
        }
    }
}
