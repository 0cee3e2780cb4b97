use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::version::build_info;

/// Where console logs go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Stdout,
    /// Keeps stdout free for chat output
    Stderr,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: tracing::Level,
    /// Directory for daily rolling log files, console only if unset
    pub log_dir: Option<PathBuf>,
    pub target: LogTarget,
}

fn env_filter(level: tracing::Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy()
}

/// Initialize logging, panic handler, and build info reporting.
/// Returns guards that must be kept alive for the duration of the program.
pub fn init_logging(config: &LogConfig) -> Vec<WorkerGuard> {
    let mut guards = Vec::new();

    let (console_writer, console_guard) = match config.target {
        LogTarget::Stdout => tracing_appender::non_blocking(std::io::stdout()),
        LogTarget::Stderr => tracing_appender::non_blocking(std::io::stderr()),
    };
    guards.push(console_guard);

    let console_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(console_writer)
        .with_filter(env_filter(config.level));

    let file_layer = config.log_dir.as_ref().and_then(|log_dir| {
        if let Err(e) = std::fs::create_dir_all(log_dir) {
            eprintln!(
                "Warning: Failed to create log directory {:?}: {}",
                log_dir, e
            );
            return None;
        }

        let file_appender = tracing_appender::rolling::daily(log_dir, "tunnel.log");
        let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
        guards.push(file_guard);

        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(env_filter(config.level)),
        )
    });

    // a second init (e.g. from tests) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init();

    register_panic_logger();
    report_build_info();

    guards
}

/// Registers a panic hook that logs panics using the `tracing` crate
pub fn register_panic_logger() {
    std::panic::set_hook(Box::new(|panic| match panic.location() {
        Some(loc) => {
            tracing::error!(
                message = %panic,
                panic.file = loc.file(),
                panic.line = loc.line(),
                panic.column = loc.column(),
            );
        }
        None => tracing::error!(message = %panic),
    }));
}

pub fn report_build_info() {
    let build = build_info();

    tracing::debug!(
        build_profile = build.build_profile,
        target = build.target,
        version = build.version,
        "tunnel starting up"
    );
}
