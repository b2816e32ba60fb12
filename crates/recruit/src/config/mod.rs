use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use chrono::{FixedOffset, NaiveTime, Offset, Utc};

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

/// Top-level configuration for the application, loaded once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub scheduling: SchedulingConfig,
    pub integrations: IntegrationConfig,
    pub cache: CacheConfig,
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

        let defaults = SchedulingConfig::default();
        let zone = match env::var("APP_BUSINESS_ZONE") {
            Ok(raw) => BusinessZone::parse(&raw)?,
            Err(_) => defaults.zone.clone(),
        };

        let scheduling = SchedulingConfig {
            zone,
            browse_days: numeric("APP_BROWSE_DAYS", defaults.browse_days)?,
            lead_days: numeric("APP_LEAD_DAYS", defaults.lead_days)?,
            slot_minutes: numeric("APP_SLOT_MINUTES", defaults.slot_minutes)?,
            workday_start: time_of_day("APP_WORKDAY_START", defaults.workday_start)?,
            workday_end: time_of_day("APP_WORKDAY_END", defaults.workday_end)?,
            booking_minutes: numeric("APP_BOOKING_MINUTES", defaults.booking_minutes)?,
            max_headcount: numeric("APP_MAX_HEADCOUNT", defaults.max_headcount)?,
            max_rounds: numeric("APP_MAX_ROUNDS", defaults.max_rounds)?,
            rollover_interval_secs: numeric(
                "APP_ROLLOVER_INTERVAL_SECS",
                defaults.rollover_interval_secs,
            )?,
            rollover_policy: match env::var("APP_ROLLOVER_POLICY") {
                Ok(raw) => RolloverPolicy::parse(&raw)?,
                Err(_) => defaults.rollover_policy,
            },
        };
        scheduling.validate()?;

        let integrations = IntegrationConfig {
            holiday_feed_url: env::var("APP_HOLIDAY_FEED_URL")
                .unwrap_or_else(|_| DEFAULT_HOLIDAY_FEED_URL.to_string()),
            calendar_api_url: env::var("APP_CALENDAR_API_URL")
                .unwrap_or_else(|_| DEFAULT_CALENDAR_API_URL.to_string()),
            documents: DocumentBackend::from_env()?,
        };

        let cache = CacheConfig {
            ttl_hours: numeric("APP_CACHE_TTL_HOURS", 24)?,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            scheduling,
            integrations,
            cache,
        })
    }
}

pub const DEFAULT_HOLIDAY_FEED_URL: &str = "https://holidays-jp.github.io/api/v1/{year}/date.json";
pub const DEFAULT_CALENDAR_API_URL: &str = "https://www.googleapis.com/calendar/v3";

fn numeric<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { name }),
        Err(_) => Ok(default),
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::MissingSetting { name })
}

fn time_of_day(name: &'static str, default: NaiveTime) -> Result<NaiveTime, ConfigError> {
    match env::var(name) {
        Ok(raw) => NaiveTime::parse_from_str(raw.trim(), "%H:%M")
            .map_err(|_| ConfigError::InvalidTime { name }),
        Err(_) => Ok(default),
    }
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
}

/// Fixed time zone in which working hours, holidays, and recurrence are interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessZone {
    pub name: String,
    pub offset: FixedOffset,
}

impl BusinessZone {
    pub fn tokyo() -> Self {
        Self {
            name: "Asia/Tokyo".to_string(),
            offset: FixedOffset::east_opt(9 * 3600).unwrap_or_else(|| Utc.fix()),
        }
    }

    pub fn utc() -> Self {
        Self {
            name: "UTC".to_string(),
            offset: Utc.fix(),
        }
    }

    /// Accepts `Asia/Tokyo`, `UTC`, or a literal `+HH:MM` / `-HH:MM` offset.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let value = raw.trim();
        match value {
            "Asia/Tokyo" | "JST" => return Ok(Self::tokyo()),
            "UTC" | "Etc/UTC" | "Z" => return Ok(Self::utc()),
            _ => {}
        }

        let invalid = || ConfigError::InvalidZone {
            value: value.to_string(),
        };
        let (sign, rest) = match value.as_bytes().first() {
            Some(b'+') => (1, &value[1..]),
            Some(b'-') => (-1, &value[1..]),
            _ => return Err(invalid()),
        };
        let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
        let hours: i32 = hours.parse().map_err(|_| invalid())?;
        let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
        if hours > 14 || minutes >= 60 {
            return Err(invalid());
        }
        let offset = FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)?;

        Ok(Self {
            name: value.to_string(),
            offset,
        })
    }
}

/// How far the rollover sweep advances an elapsed recurring anchor per pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloverPolicy {
    /// Advance by exactly one period per pass.
    SinglePeriod,
    /// Advance until the anchor starts at or after the sweep instant.
    CatchUp,
}

impl RolloverPolicy {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "single" | "single_period" => Ok(Self::SinglePeriod),
            "catch_up" | "catchup" => Ok(Self::CatchUp),
            _ => Err(ConfigError::InvalidRolloverPolicy {
                value: raw.to_string(),
            }),
        }
    }
}

/// Knobs for browsing availability and booking interviews.
#[derive(Debug, Clone)]
pub struct SchedulingConfig {
    pub zone: BusinessZone,
    pub browse_days: u32,
    pub lead_days: u32,
    pub slot_minutes: u32,
    pub workday_start: NaiveTime,
    pub workday_end: NaiveTime,
    pub booking_minutes: u32,
    pub max_headcount: u8,
    pub max_rounds: u8,
    pub rollover_interval_secs: u64,
    pub rollover_policy: RolloverPolicy,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            zone: BusinessZone::tokyo(),
            browse_days: 14,
            lead_days: 7,
            slot_minutes: 30,
            workday_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            workday_end: NaiveTime::from_hms_opt(20, 0, 0).unwrap_or_default(),
            booking_minutes: 60,
            max_headcount: 6,
            max_rounds: 30,
            rollover_interval_secs: 3600,
            rollover_policy: RolloverPolicy::SinglePeriod,
        }
    }
}

impl SchedulingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.browse_days == 0 {
            return Err(ConfigError::InvalidNumber {
                name: "APP_BROWSE_DAYS",
            });
        }
        if self.slot_minutes == 0 || self.slot_minutes > 24 * 60 {
            return Err(ConfigError::InvalidNumber {
                name: "APP_SLOT_MINUTES",
            });
        }
        if self.booking_minutes == 0 {
            return Err(ConfigError::InvalidNumber {
                name: "APP_BOOKING_MINUTES",
            });
        }
        if self.max_headcount == 0 {
            return Err(ConfigError::InvalidNumber {
                name: "APP_MAX_HEADCOUNT",
            });
        }
        if self.max_rounds == 0 {
            return Err(ConfigError::InvalidNumber {
                name: "APP_MAX_ROUNDS",
            });
        }
        if self.workday_end < self.workday_start {
            return Err(ConfigError::InvalidTime {
                name: "APP_WORKDAY_END",
            });
        }
        Ok(())
    }

    pub fn rollover_interval(&self) -> Duration {
        Duration::from_secs(self.rollover_interval_secs.max(1))
    }
}

/// Endpoints of the external collaborators the core calls.
#[derive(Debug, Clone)]
pub struct IntegrationConfig {
    pub holiday_feed_url: String,
    pub calendar_api_url: String,
    pub documents: DocumentBackend,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            holiday_feed_url: DEFAULT_HOLIDAY_FEED_URL.to_string(),
            calendar_api_url: DEFAULT_CALENDAR_API_URL.to_string(),
            documents: DocumentBackend::Memory,
        }
    }
}

/// Where applicant documents are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentBackend {
    Memory,
    /// One Drive folder, reached with a service-account key file.
    Drive {
        folder_id: String,
        service_account_key: PathBuf,
    },
}

impl DocumentBackend {
    fn from_env() -> Result<Self, ConfigError> {
        let raw = env::var("APP_DOCUMENT_BACKEND").unwrap_or_else(|_| "memory".to_string());
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" | "" => Ok(Self::Memory),
            "drive" | "google_drive" => Ok(Self::Drive {
                folder_id: required("APP_DRIVE_FOLDER_ID")?,
                service_account_key: PathBuf::from(required("APP_DRIVE_SERVICE_ACCOUNT_KEY")?),
            }),
            _ => Err(ConfigError::InvalidDocumentBackend { value: raw }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl_hours: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_hours: 24 }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { name: &'static str },
    InvalidTime { name: &'static str },
    InvalidZone { value: String },
    InvalidRolloverPolicy { value: String },
    InvalidDocumentBackend { value: String },
    MissingSetting { name: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { name } => {
                write!(f, "{name} must be a positive integer in range")
            }
            ConfigError::InvalidTime { name } => write!(f, "{name} must be a valid HH:MM time"),
            ConfigError::InvalidZone { value } => write!(
                f,
                "APP_BUSINESS_ZONE '{value}' must be Asia/Tokyo, UTC, or a +HH:MM offset"
            ),
            ConfigError::InvalidRolloverPolicy { value } => write!(
                f,
                "APP_ROLLOVER_POLICY '{value}' must be 'single' or 'catch_up'"
            ),
            ConfigError::InvalidDocumentBackend { value } => write!(
                f,
                "APP_DOCUMENT_BACKEND '{value}' must be 'memory' or 'drive'"
            ),
            ConfigError::MissingSetting { name } => write!(f, "{name} must be set"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for name in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_BUSINESS_ZONE",
            "APP_BROWSE_DAYS",
            "APP_LEAD_DAYS",
            "APP_SLOT_MINUTES",
            "APP_WORKDAY_START",
            "APP_WORKDAY_END",
            "APP_BOOKING_MINUTES",
            "APP_MAX_HEADCOUNT",
            "APP_MAX_ROUNDS",
            "APP_ROLLOVER_INTERVAL_SECS",
            "APP_ROLLOVER_POLICY",
            "APP_HOLIDAY_FEED_URL",
            "APP_CALENDAR_API_URL",
            "APP_CACHE_TTL_HOURS",
            "APP_DOCUMENT_BACKEND",
            "APP_DRIVE_FOLDER_ID",
            "APP_DRIVE_SERVICE_ACCOUNT_KEY",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.scheduling.zone, BusinessZone::tokyo());
        assert_eq!(config.scheduling.browse_days, 14);
        assert_eq!(config.scheduling.lead_days, 7);
        assert_eq!(config.scheduling.slot_minutes, 30);
        assert_eq!(config.scheduling.booking_minutes, 60);
        assert_eq!(config.scheduling.max_headcount, 6);
        assert_eq!(
            config.scheduling.rollover_policy,
            RolloverPolicy::SinglePeriod
        );
        assert_eq!(config.cache.ttl_hours, 24);
        assert_eq!(config.integrations.documents, DocumentBackend::Memory);
    }

    #[test]
    fn drive_backend_needs_folder_and_key() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_DOCUMENT_BACKEND", "drive");
        env::set_var("APP_DRIVE_FOLDER_ID", "folder-123");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::MissingSetting {
                name: "APP_DRIVE_SERVICE_ACCOUNT_KEY"
            })
        ));

        env::set_var("APP_DRIVE_SERVICE_ACCOUNT_KEY", "/etc/recruit/drive.json");
        let config = AppConfig::load().expect("drive config loads");
        assert_eq!(
            config.integrations.documents,
            DocumentBackend::Drive {
                folder_id: "folder-123".to_string(),
                service_account_key: PathBuf::from("/etc/recruit/drive.json"),
            }
        );

        env::set_var("APP_DOCUMENT_BACKEND", "s3");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidDocumentBackend { .. })
        ));
        reset_env();
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn rejects_unknown_zone_and_policy() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_BUSINESS_ZONE", "Mars/Olympus");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidZone { .. })
        ));
        reset_env();
        env::set_var("APP_ROLLOVER_POLICY", "sometimes");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidRolloverPolicy { .. })
        ));
        reset_env();
    }

    #[test]
    fn parses_fixed_offsets() {
        let zone = BusinessZone::parse("-05:30").expect("offset parses");
        assert_eq!(zone.offset.local_minus_utc(), -(5 * 3600 + 30 * 60));
        assert!(BusinessZone::parse("09:00").is_err());
        assert!(BusinessZone::parse("+25:00").is_err());
    }
}
