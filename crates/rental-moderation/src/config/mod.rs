use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration as StdDuration;

use chrono::Duration;

use crate::tickets::{SlaPolicy, UserId};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the moderation service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub sla: SlaConfig,
    pub scheduler: SchedulerConfig,
    pub staff: StaffConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let ansi = flag_var("APP_LOG_ANSI", environment == AppEnvironment::Development)?;

        let sla = SlaConfig {
            reminder_after_hours: hours_var("SLA_REMINDER_AFTER_HOURS", 24)?,
            claim_timeout_hours: hours_var("SLA_CLAIM_TIMEOUT_HOURS", 48)?,
            auto_assign_after_hours: hours_var("SLA_AUTO_ASSIGN_AFTER_HOURS", 48)?,
            auto_assign_batch: numeric_var("SLA_AUTO_ASSIGN_BATCH", 5)?,
            overload_threshold: numeric_var("SLA_OVERLOAD_THRESHOLD", 10)?,
        };

        let scheduler = SchedulerConfig {
            enabled: flag_var("SWEEP_ENABLED", true)?,
            reminder_interval_secs: numeric_var("SWEEP_REMINDER_INTERVAL_SECS", 3600)?,
            auto_assign_interval_secs: numeric_var("SWEEP_AUTO_ASSIGN_INTERVAL_SECS", 1800)?,
        };

        let staff = StaffConfig {
            moderators: id_list_var("MODERATOR_IDS"),
            admins: id_list_var("ADMIN_IDS"),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level, ansi },
            sla,
            scheduler,
            staff,
        })
    }
}

fn numeric_var<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { variable: name }),
        Err(_) => Ok(default),
    }
}

/// Longest SLA threshold accepted from the environment: ten years.
pub const MAX_SLA_HOURS: i64 = 24 * 365 * 10;

fn hours_var(name: &'static str, default: i64) -> Result<i64, ConfigError> {
    let hours = numeric_var(name, default)?;
    if (0..=MAX_SLA_HOURS).contains(&hours) && Duration::try_hours(hours).is_some() {
        Ok(hours)
    } else {
        Err(ConfigError::InvalidNumber { variable: name })
    }
}

fn flag_var(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag { variable: name }),
        },
        Err(_) => Ok(default),
    }
}

fn id_list_var(name: &'static str) -> Vec<UserId> {
    env::var(name)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| UserId(value.to_string()))
        .collect()
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    /// Colored output; off by default outside development so log shippers get plain text.
    pub ansi: bool,
}

/// Age thresholds and batch limits applied by the sweeps, in whole hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaConfig {
    pub reminder_after_hours: i64,
    pub claim_timeout_hours: i64,
    pub auto_assign_after_hours: i64,
    pub auto_assign_batch: usize,
    pub overload_threshold: usize,
}

impl SlaConfig {
    /// Hours outside `0..=MAX_SLA_HOURS` are clamped; `load` already rejects them.
    pub fn policy(&self) -> SlaPolicy {
        SlaPolicy {
            reminder_after: sla_hours(self.reminder_after_hours),
            claim_timeout: sla_hours(self.claim_timeout_hours),
            auto_assign_after: sla_hours(self.auto_assign_after_hours),
            auto_assign_batch: self.auto_assign_batch,
            overload_threshold: self.overload_threshold,
        }
    }
}

fn sla_hours(hours: i64) -> Duration {
    Duration::try_hours(hours.clamp(0, MAX_SLA_HOURS)).unwrap_or_else(Duration::zero)
}

/// Cadence of the two sweep timers. Only a deployment concern; the sweeps themselves
/// compare timestamps and tolerate irregular firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub reminder_interval_secs: u64,
    pub auto_assign_interval_secs: u64,
}

impl SchedulerConfig {
    pub fn reminder_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.reminder_interval_secs.max(1))
    }

    pub fn auto_assign_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.auto_assign_interval_secs.max(1))
    }
}

/// Seed for the in-process staff directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaffConfig {
    pub moderators: Vec<UserId>,
    pub admins: Vec<UserId>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { variable: &'static str },
    InvalidFlag { variable: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { variable } => {
                write!(f, "{variable} must be a non-negative integer")
            }
            ConfigError::InvalidFlag { variable } => {
                write!(f, "{variable} must be true or false")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidFlag { .. } => None,
        }
    }
}
