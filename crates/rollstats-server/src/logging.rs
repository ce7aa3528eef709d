//! Logging configuration and initialization.
//!
//! Presets pick a level per `rollstats::*` target; `--log target=level`
//! overrides single targets and `RUST_LOG` replaces the whole filter.

use std::collections::HashMap;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

const TARGET_PREFIX: &str = "rollstats::";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: '{}'. Use 'text' or 'json'.", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogPreset {
    /// Startup, stored rolls and warnings
    #[default]
    Production,
    /// Adds relay deliveries and HTTP requests
    Verbose,
    Debug,
    Trace,
    /// Warnings and errors only
    Quiet,
}

impl LogPreset {
    fn directives(self) -> Vec<String> {
        let directives: &[&str] = match self {
            LogPreset::Production => &[
                "rollstats::startup=info",
                "rollstats::api=info",
                "rollstats::db=info",
                "rollstats::intake=warn",
                "rollstats::relay=warn",
                "rollstats::sheets=info",
                "tower_http=warn",
            ],
            LogPreset::Verbose => &["rollstats=info", "tower_http=info"],
            LogPreset::Debug => &["rollstats=debug", "tower_http=debug"],
            LogPreset::Trace => &["rollstats=trace", "tower_http=trace"],
            LogPreset::Quiet => &["rollstats=warn", "tower_http=error"],
        };
        directives.iter().map(|d| d.to_string()).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub preset: LogPreset,
    /// Full target name -> level, e.g. "rollstats::relay" -> DEBUG
    pub overrides: HashMap<String, Level>,
    pub format: LogFormat,
}

impl LogConfig {
    /// Build from CLI flags. The quietest flag wins.
    pub fn from_cli(
        verbose: bool,
        debug: bool,
        trace: bool,
        quiet: bool,
        log_overrides: Vec<String>,
        format: LogFormat,
    ) -> Self {
        let preset = if quiet {
            LogPreset::Quiet
        } else if trace {
            LogPreset::Trace
        } else if debug {
            LogPreset::Debug
        } else if verbose {
            LogPreset::Verbose
        } else {
            LogPreset::Production
        };

        let overrides = log_overrides
            .iter()
            .flat_map(|arg| arg.split(','))
            .filter_map(|part| {
                let (target, level) = part.split_once('=')?;
                let level = parse_level(level.trim())?;
                Some((full_target(target.trim()), level))
            })
            .collect();

        Self {
            preset,
            overrides,
            format,
        }
    }

    pub fn build_filter(&self) -> EnvFilter {
        if let Ok(env_filter) = EnvFilter::try_from_default_env() {
            return env_filter;
        }

        let mut directives = self.preset.directives();
        for (target, level) in &self.overrides {
            directives.push(format!("{}={}", target, level.as_str().to_lowercase()));
        }

        EnvFilter::try_new(directives.join(",")).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// "relay" -> "rollstats::relay"; external targets pass through.
fn full_target(target: &str) -> String {
    if target == "rollstats" || target.starts_with(TARGET_PREFIX) || target.starts_with("tower_http") {
        target.to_string()
    } else {
        format!("{TARGET_PREFIX}{target}")
    }
}

fn parse_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

pub fn init(config: &LogConfig) {
    let filter = config.build_filter();

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(true).with_thread_ids(false))
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_events(FmtSpan::CLOSE),
                )
                .init();
        }
    }
}
