use chrono::{DateTime, Utc};
use colored::*;
use log::{Level, LevelFilter, Metadata, Record};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::env;
use std::io::{self, Write};
use std::sync::RwLock;
use std::time::{Duration, Instant};

static RELAY_LOGGER: Lazy<RelayLogger> = Lazy::new(RelayLogger::new);

pub fn init() -> Result<(), String> {
    init_with_config(LoggerConfig::from_env())
}

pub fn init_with_config(config: LoggerConfig) -> Result<(), String> {
    let max_level = config.min_level;
    RELAY_LOGGER.update_config(config);

    log::set_logger(&*RELAY_LOGGER).map_err(|e| format!("Failed to set logger: {:?}", e))?;
    log::set_max_level(max_level);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

fn level_color(level: Level) -> Color {
    match level {
        Level::Trace => Color::Cyan,
        Level::Debug => Color::Blue,
        Level::Info => Color::Green,
        Level::Warn => Color::Yellow,
        Level::Error => Color::Red,
    }
}

fn parse_level(raw: &str) -> LevelFilter {
    match raw.trim().to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "warn" | "warning" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// One JSON log line.
#[derive(Debug, Serialize)]
pub struct LogEntry<'a> {
    pub timestamp: DateTime<Utc>,
    pub level: &'a str,
    pub target: &'a str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub min_level: LevelFilter,
    pub format: LogFormat,
    pub show_colors: bool,
    pub show_file_location: bool,
    pub timestamp_format: String,
    /// Third-party crates below this level are dropped.
    pub dependency_level: LevelFilter,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LevelFilter::Info,
            format: LogFormat::Pretty,
            show_colors: true,
            show_file_location: false,
            timestamp_format: "%Y-%m-%d %H:%M:%S%.3f".to_string(),
            dependency_level: LevelFilter::Warn,
        }
    }
}

impl LoggerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(level) = env::var("LOG_LEVEL") {
            config.min_level = parse_level(&level);
        }
        if let Ok(format) = env::var("LOG_FORMAT") {
            config = config.with_format(LogFormat::parse(&format));
        }
        config
    }

    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.min_level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        if format == LogFormat::Json {
            self.show_colors = false;
        }
        self
    }

    pub fn production() -> Self {
        Self::default().with_format(LogFormat::Json)
    }

    pub fn development() -> Self {
        Self {
            min_level: LevelFilter::Debug,
            show_file_location: true,
            ..Default::default()
        }
    }
}

pub struct RelayLogger {
    config: RwLock<LoggerConfig>,
}

impl RelayLogger {
    fn new() -> Self {
        Self {
            config: RwLock::new(LoggerConfig::default()),
        }
    }

    fn update_config(&self, new_config: LoggerConfig) {
        if let Ok(mut config) = self.config.write() {
            *config = new_config;
        }
    }

    fn is_own_target(target: &str) -> bool {
        target.starts_with(env!("CARGO_CRATE_NAME"))
    }

    fn format_pretty(record: &Record, config: &LoggerConfig) -> String {
        let timestamp = Utc::now().format(&config.timestamp_format).to_string();
        let level = format!("{:<5}", record.level().as_str());
        let mut line = if config.show_colors {
            format!(
                "{} [{}] {}: {}",
                timestamp.bright_black(),
                level.color(level_color(record.level())).bold(),
                record.target().bright_blue(),
                record.args()
            )
        } else {
            format!(
                "{} [{}] {}: {}",
                timestamp,
                level,
                record.target(),
                record.args()
            )
        };

        if config.show_file_location {
            if let (Some(file), Some(lineno)) = (record.file(), record.line()) {
                line.push_str(&format!(" ({}:{})", file, lineno));
            }
        }
        line
    }

    fn format_json(record: &Record, config: &LoggerConfig) -> String {
        let entry = LogEntry {
            timestamp: Utc::now(),
            level: record.level().as_str(),
            target: record.target(),
            message: record.args().to_string(),
            location: if config.show_file_location {
                record
                    .file()
                    .zip(record.line())
                    .map(|(file, line)| format!("{}:{}", file, line))
            } else {
                None
            },
        };
        serde_json::to_string(&entry).unwrap_or_else(|_| entry.message.clone())
    }
}

impl log::Log for RelayLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        let Ok(config) = self.config.read() else {
            return true;
        };
        let limit = if Self::is_own_target(metadata.target()) {
            config.min_level
        } else {
            config.dependency_level.min(config.min_level)
        };
        metadata.level() <= limit
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let Ok(config) = self.config.read() else {
            return;
        };

        let line = match config.format {
            LogFormat::Pretty => Self::format_pretty(record, &config),
            LogFormat::Json => Self::format_json(record, &config),
        };

        if record.level() <= Level::Warn {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();
    }
}

/// Logs how long a named operation took when dropped.
pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        log::info!(
            "⏱️  {} completed in {}ms",
            self.name,
            self.elapsed().as_millis()
        );
    }
}

pub fn timer(name: impl Into<String>) -> Timer {
    Timer::new(name)
}

/// Startup banner; prints which collaborators are wired, never their keys.
pub fn log_config_info(config: &crate::config::Config) {
    let yes_no = |on: bool| if on { "✅" } else { "❌" };
    log::info!("⚙️  Configuration loaded:");
    log::info!("   Listen: {}:{}", config.host, config.port_or_default());
    log::info!("   Imagen keys: {}", config.imagen.api_keys.len());
    log::info!("   Gemini: {}", yes_no(config.gemini.api_key.is_some()));
    log::info!("   Moderation: {}", yes_no(config.moderation_active()));
    log::info!("   Cloudinary: {}", yes_no(config.cloudinary.is_complete()));
    log::info!("   Telegram notify: {}", yes_no(config.telegram.notify));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), LevelFilter::Debug);
        assert_eq!(parse_level("warning"), LevelFilter::Warn);
        assert_eq!(parse_level("nonsense"), LevelFilter::Info);
    }

    #[test]
    fn test_logger_config() {
        let config = LoggerConfig::development();
        assert_eq!(config.min_level, LevelFilter::Debug);
        assert!(config.show_colors);

        let prod_config = LoggerConfig::production();
        assert!(!prod_config.show_colors);
        assert_eq!(prod_config.format, LogFormat::Json);
    }

    #[test]
    fn test_json_line_is_valid_json() {
        let config = LoggerConfig::production();
        let line = RelayLogger::format_json(
            &Record::builder()
                .args(format_args!("image stored at {}", "https://x"))
                .level(Level::Info)
                .target("imagebot::service")
                .build(),
            &config,
        );
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["level"], "INFO");
        assert_eq!(value["message"], "image stored at https://x");
    }

    #[test]
    fn test_dependency_noise_is_filtered() {
        let logger = RelayLogger::new();
        logger.update_config(LoggerConfig::development());
        let own = Metadata::builder()
            .level(Level::Debug)
            .target("imagebot::providers")
            .build();
        let dep = Metadata::builder()
            .level(Level::Debug)
            .target("reqwest::connect")
            .build();
        assert!(log::Log::enabled(&logger, &own));
        assert!(!log::Log::enabled(&logger, &dep));
    }
}
