//! # Core Logging
//!
//! Installs the process-wide log pipeline: a `tracing-subscriber` fmt
//! subscriber (plain or JSON lines on stderr) filtered by `RUST_LOG` or the
//! configured level, with `log` records from the runtime bridged in through
//! `tracing-log`.
//!
//! [`LoggingModule`] is the module side: it journals every system signal it
//! sees and reports the pipeline status.
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};

use modhost_core::config::LoggingConfig;
use modhost_core::event::{Delivery, EventReceiver};
use modhost_core::kernel::constants::CORE_CATEGORY;
use modhost_core::module_system::{
    Module, ModuleCandidate, ModuleContext, ModuleError, ModuleResult, ModuleType, Processor,
};
use serde::Serialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

const JOURNAL_CAPACITY: usize = 64;
const EVENTS_TARGET: &str = "modhost::events";

static INSTALLED: AtomicBool = AtomicBool::new(false);
static ACTIVE: OnceLock<(String, LogFormat)> = OnceLock::new();

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {message}")]
    InvalidFilter { filter: String, message: String },

    #[error("Unknown log format '{0}' (expected plain or json)")]
    UnknownFormat(String),

    #[error("Logging is already installed: {0}")]
    AlreadyInstalled(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Plain,
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "plain" | "text" => Ok(LogFormat::Plain),
            "json" => Ok(LogFormat::Json),
            other => Err(LoggingError::UnknownFormat(other.to_string())),
        }
    }
}

/// Builds the filter: `RUST_LOG` when set, `level` otherwise
fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|e| LoggingError::InvalidFilter {
        filter: level.to_string(),
        message: e.to_string(),
    })
}

/// Installs the global subscriber and the `log` bridge. Only the first call
/// in a process succeeds.
pub fn init_logging(level: &str, format: LogFormat) -> Result<(), LoggingError> {
    let filter = build_filter(level)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> = match format {
        LogFormat::Plain => Box::new(builder.finish()),
        LogFormat::Json => Box::new(builder.json().finish()),
    };

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| LoggingError::AlreadyInstalled(e.to_string()))?;
    tracing_log::LogTracer::init().map_err(|e| LoggingError::AlreadyInstalled(e.to_string()))?;

    INSTALLED.store(true, Ordering::SeqCst);
    let _ = ACTIVE.set((level.to_string(), format));
    tracing::debug!(filter = level, ?format, "Logging installed");
    Ok(())
}

/// [`init_logging`] from the `logging` section of the runtime configuration
pub fn init_from_config(config: &LoggingConfig) -> Result<(), LoggingError> {
    init_logging(&config.level, config.format.parse()?)
}

pub fn is_installed() -> bool {
    INSTALLED.load(Ordering::SeqCst)
}

#[derive(Debug, Serialize)]
struct LoggingStatus<'a> {
    installed: bool,
    level: Option<&'a str>,
    format: Option<LogFormat>,
    journaled: usize,
}

/// Journals system signals and answers `status` and `recent`
#[derive(Default)]
pub struct LoggingModule {
    journal: Mutex<VecDeque<String>>,
}

impl LoggingModule {
    /// Signal names seen so far, oldest first, bounded
    pub fn recent(&self) -> Vec<String> {
        self.journal
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    fn record(&self, name: &str) {
        let mut journal = self.journal.lock().unwrap_or_else(|e| e.into_inner());
        if journal.len() == JOURNAL_CAPACITY {
            journal.pop_front();
        }
        journal.push_back(name.to_string());
    }

    fn status(&self) -> ModuleResult<String> {
        let active = ACTIVE.get();
        let status = LoggingStatus {
            installed: is_installed(),
            level: active.map(|(level, _)| level.as_str()),
            format: active.map(|(_, format)| *format),
            journaled: self.recent().len(),
        };
        serde_json::to_string(&status).map_err(|e| ModuleError::Other(Box::new(e)))
    }
}

impl Module for LoggingModule {
    fn name(&self) -> &str {
        "Logging"
    }

    fn initialize(&self, _ctx: &dyn ModuleContext) -> ModuleResult<()> {
        if !is_installed() {
            log::debug!("Logging module loaded without an installed subscriber");
        }
        Ok(())
    }

    fn as_processor(&self) -> Option<&dyn Processor> {
        Some(self)
    }

    fn as_event_receiver(&self) -> Option<&dyn EventReceiver> {
        Some(self)
    }
}

impl Processor for LoggingModule {
    fn process(&self, input: &str) -> ModuleResult<Option<String>> {
        match input.trim() {
            "status" => self.status().map(Some),
            "recent" => Ok(Some(self.recent().join(","))),
            other => Err(ModuleError::Unsupported(format!("command '{}'", other))),
        }
    }
}

impl EventReceiver for LoggingModule {
    fn on_system_event(&self, name: &str, payload: Option<&dyn std::any::Any>) -> ModuleResult<Delivery> {
        tracing::info!(target: EVENTS_TARGET, event = name, has_payload = payload.is_some(), "system signal");
        self.record(name);
        Ok(Delivery::Handled)
    }
}

impl ModuleType for LoggingModule {
    const CATEGORY: &'static str = CORE_CATEGORY;

    fn construct() -> ModuleResult<Self> {
        Ok(Self::default())
    }
}

/// Candidates for static registration
pub fn candidates() -> Vec<ModuleCandidate> {
    vec![ModuleCandidate::of::<LoggingModule>()]
}
