//! Structured logging helpers shared by the coordinator and the media context.
//!
//! Major operations (capture, release, fullscreen toggles, install events) are
//! always logged at info. Context maps are only built when debug logging is on,
//! see [`log_context!`](crate::log_context).

use std::collections::HashMap;

use once_cell::sync::OnceCell;
use serde::Serialize;

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Install the `env_logger` backend once. `RUST_LOG` overrides `default_level`.
pub fn init_logging(default_level: &str) {
    LOGGER_INIT.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(default_level),
        );
        builder.format_timestamp_millis();
        if let Err(e) = builder.try_init() {
            // Another logger was installed by the embedder
            eprintln!("tabcapture logging not installed: {}", e);
        }
    });
}

#[derive(Debug, Clone, Serialize)]
pub enum LogEvent {
    Operation {
        name: String,
        phase: OperationPhase,
        #[serde(skip_serializing_if = "Option::is_none")]
        context: Option<LogContext>,
    },
    Lifecycle {
        event: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        version: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub enum OperationPhase {
    Start,
    Complete { duration_ms: u64 },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct LogContext {
    #[serde(flatten)]
    pub fields: HashMap<String, String>,
}

pub fn log_event(event: LogEvent) {
    match event {
        LogEvent::Operation { name, phase, context } => {
            let ctx_str = context.map(|c| format!(" | {:?}", c.fields)).unwrap_or_default();
            match phase {
                OperationPhase::Start => {
                    log::info!("🚀 {} STARTING{}", name, ctx_str);
                }
                OperationPhase::Complete { duration_ms } => {
                    log::info!("✅ {} COMPLETE in {}ms{}", name, duration_ms, ctx_str);
                }
                OperationPhase::Failed { error } => {
                    log::error!("❌ {} FAILED: {}{}", name, error, ctx_str);
                }
            }
        }
        LogEvent::Lifecycle { event, version } => {
            log::info!(
                "🚀 LIFECYCLE {} - Version: {}",
                event,
                version.as_deref().unwrap_or("unknown")
            );
        }
    }
}

fn to_context(fields: &HashMap<String, String>) -> Option<LogContext> {
    if fields.is_empty() {
        None
    } else {
        Some(LogContext { fields: fields.clone() })
    }
}

#[inline]
pub fn log_operation_start(operation: &str, params: &HashMap<String, String>) {
    log_event(LogEvent::Operation {
        name: operation.to_string(),
        phase: OperationPhase::Start,
        context: to_context(params),
    });
}

#[inline]
pub fn log_operation_complete(operation: &str, duration_ms: u64, results: &HashMap<String, String>) {
    log_event(LogEvent::Operation {
        name: operation.to_string(),
        phase: OperationPhase::Complete { duration_ms },
        context: to_context(results),
    });
}

pub fn log_operation_failed(operation: &str, error: &str, context: &HashMap<String, String>) {
    log_event(LogEvent::Operation {
        name: operation.to_string(),
        phase: OperationPhase::Failed { error: error.to_string() },
        context: to_context(context),
    });
}

pub fn log_state_transition(component: &str, from: &str, to: &str, valid: bool, context: &HashMap<String, String>) {
    let ctx_str = to_context(context).map(|c| format!(" | {:?}", c.fields)).unwrap_or_default();
    if valid {
        log::info!("🔄 STATE [{}]: {} → {}{}", component, from, to, ctx_str);
    } else {
        log::error!("⚠️ STATE [{}]: {} → {} INVALID{}", component, from, to, ctx_str);
    }
}

/// Log install/update events of the extension
pub fn log_lifecycle_event(event: &str, version: Option<&str>) {
    log_event(LogEvent::Lifecycle {
        event: event.to_string(),
        version: version.map(|v| v.to_string()),
    });
}

/// Build a context map, only allocating when debug logging is enabled
#[macro_export]
macro_rules! log_context {
    ($($key:expr => $value:expr),* $(,)?) => {
        {
            if log::log_enabled!(log::Level::Debug) {
                let mut context = std::collections::HashMap::new();
                $(
                    context.insert($key.to_string(), $value.to_string());
                )*
                context
            } else {
                std::collections::HashMap::new()
            }
        }
    };
}
