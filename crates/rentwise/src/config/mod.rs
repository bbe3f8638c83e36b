use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::workflows::leasing::lifecycle::MAX_GRACE_PERIOD_DAYS;
use crate::workflows::leasing::LeasePolicy;

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

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub leasing: LeasingConfig,
    pub payments: PaymentsConfig,
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

        let defaults = LeasePolicy::default();
        let term_months = parse_var("LEASE_TERM_MONTHS", defaults.term_months)?;
        if term_months == 0 {
            return Err(ConfigError::InvalidNumber {
                name: "LEASE_TERM_MONTHS",
                value: "0".to_string(),
            });
        }
        let grace_period_days = parse_var("LEASE_GRACE_PERIOD_DAYS", defaults.grace_period_days)?;
        if grace_period_days > MAX_GRACE_PERIOD_DAYS {
            return Err(ConfigError::InvalidNumber {
                name: "LEASE_GRACE_PERIOD_DAYS",
                value: grace_period_days.to_string(),
            });
        }
        let activation_requires_signatures = parse_flag(
            "LEASE_REQUIRE_SIGNATURES",
            defaults.activation_requires_signatures,
        )?;
        let reconcile_secs: u64 = parse_var("LEASE_RECONCILE_INTERVAL_SECS", 300)?;
        if reconcile_secs == 0 {
            return Err(ConfigError::InvalidNumber {
                name: "LEASE_RECONCILE_INTERVAL_SECS",
                value: "0".to_string(),
            });
        }

        let payments_base_url = env::var("PAYMENTS_BASE_URL")
            .unwrap_or_else(|_| "https://payments.sandbox.local".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            leasing: LeasingConfig {
                policy: LeasePolicy {
                    term_months,
                    grace_period_days,
                    activation_requires_signatures,
                },
                reconcile_interval: Duration::from_secs(reconcile_secs),
            },
            payments: PaymentsConfig {
                base_url: payments_base_url.trim_end_matches('/').to_string(),
            },
        })
    }
}

fn parse_var<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { name, value: raw }),
        Err(_) => Ok(default),
    }
}

fn parse_flag(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag { name, value: raw }),
        },
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

/// Lease rules plus the cadence of the expiry sweep.
#[derive(Debug, Clone)]
pub struct LeasingConfig {
    pub policy: LeasePolicy,
    pub reconcile_interval: Duration,
}

/// Where the sandbox payment processor points its onboarding and dashboard links.
#[derive(Debug, Clone)]
pub struct PaymentsConfig {
    pub base_url: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { name: &'static str, value: String },
    InvalidFlag { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { name, value } => {
                write!(f, "{name} must be a positive integer (got '{value}')")
            }
            ConfigError::InvalidFlag { name, value } => {
                write!(f, "{name} must be true or false (got '{value}')")
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
