//! Logging setup: stdout or a daily-rotating file sink, `RUST_LOG` override.

use ledger_common::LedgerConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Holds the non-blocking writer's background thread alive for the life of
/// the process; dropping it flushes and stops the writer.
#[derive(Default)]
pub struct ObservabilityGuard {
    _log_guard: Option<WorkerGuard>,
}

pub fn init_observability(config: &LedgerConfig) -> crate::error::Result<ObservabilityGuard> {
    let mut guard = ObservabilityGuard::default();

    if config.is_console_logging() {
        init_subscriber_with_writer(std::io::stdout, true, config);
    } else {
        std::fs::create_dir_all(
            std::path::Path::new(&config.log_path)
                .parent()
                .unwrap_or_else(|| std::path::Path::new(".")),
        )?;
        let file_appender = tracing_appender::rolling::daily(
            std::path::Path::new(&config.log_path)
                .parent()
                .unwrap_or_else(|| std::path::Path::new(".")),
            std::path::Path::new(&config.log_path)
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "ledger.log".to_string()),
        );
        let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
        guard._log_guard = Some(worker_guard);
        init_subscriber_with_writer(non_blocking, false, config);
    }

    Ok(guard)
}

fn create_env_filter(config: &LedgerConfig) -> EnvFilter {
    let directive = std::env::var("RUST_LOG")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| config.log_level.clone());

    EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_subscriber_with_writer<W>(writer: W, use_ansi: bool, config: &LedgerConfig)
where
    W: for<'a> fmt::MakeWriter<'a> + Send + Sync + 'static,
{
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(use_ansi)
        .with_writer(writer);

    tracing_subscriber::registry()
        .with(create_env_filter(config))
        .with(fmt_layer)
        .try_init()
        .ok();
}
