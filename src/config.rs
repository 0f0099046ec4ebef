use std::env;
use std::time::Duration;

/// How recurring obligations resolve their fire dates.
///
/// `FixedAtCreation` reproduces the historical contract: the calendar slot is
/// chosen once from the obligation's creation moment and never moves.
/// `Rolling` steps relative to the creation anchor instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrenceMode {
    FixedAtCreation,
    Rolling,
}

impl RecurrenceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrenceMode::FixedAtCreation => "fixed-at-creation",
            RecurrenceMode::Rolling => "rolling",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "fixed-at-creation" | "fixed" => Some(RecurrenceMode::FixedAtCreation),
            "rolling" => Some(RecurrenceMode::Rolling),
            _ => None,
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tick_secs: u64,
    pub recurrence_mode: RecurrenceMode,
}

impl SchedulerConfig {
    /// Create scheduler config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let tick_secs = env::var("SCHEDULER_TICK_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);

        let recurrence_mode = match env::var("RECURRENCE_MODE") {
            Ok(raw) => RecurrenceMode::parse(&raw).ok_or_else(|| {
                format!(
                    "Invalid RECURRENCE_MODE: {}. Must be one of: [\"fixed-at-creation\", \"rolling\"]",
                    raw
                )
            })?,
            Err(_) => RecurrenceMode::FixedAtCreation,
        };

        // Validate configuration
        if tick_secs == 0 {
            return Err("SCHEDULER_TICK_SECS must be greater than 0".to_string());
        }

        Ok(Self {
            tick_secs,
            recurrence_mode,
        })
    }

    /// Get tick interval as Duration
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: 30,
            recurrence_mode: RecurrenceMode::FixedAtCreation,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    pub log_level: String,
    pub http_port: u16,
    pub ws_port: u16,
    pub environment: String,
}

impl AppConfig {
    /// Create application config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let scheduler = SchedulerConfig::from_env()?;

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let http_port = env::var("HTTP_PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(3000);

        let ws_port = env::var("WS_PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(8081);

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        // Validate log level
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_LEVEL: {}. Must be one of: {:?}",
                log_level, valid_log_levels
            ));
        }

        // Validate environment
        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&environment.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid ENVIRONMENT: {}. Must be one of: {:?}",
                environment, valid_environments
            ));
        }

        if http_port == ws_port {
            return Err("HTTP_PORT and WS_PORT must differ".to_string());
        }

        Ok(Self {
            scheduler,
            log_level: log_level.to_lowercase(),
            http_port,
            ws_port,
            environment: environment.to_lowercase(),
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Check if running in development
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            log_level: "info".to_string(),
            http_port: 3000,
            ws_port: 8081,
            environment: "development".to_string(),
        }
    }
}
