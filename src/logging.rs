use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{fmt::time::UtcTime, prelude::*, EnvFilter, Layer, Registry};

use crate::config::{LogFormat, LoggingConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Initialize logging: stdout plus an optional rolling file appender.
///
/// Filter precedence is `logging.level` from config, then `RUST_LOG`, then "info".
/// The returned guard flushes buffered file output on drop, so `main` must hold it
/// for the lifetime of the process. Repeated calls are ignored.
#[must_use]
pub fn init_with_config(cfg: &LoggingConfig) -> Option<WorkerGuard> {
    let (file_writer, guard) = if cfg.enable_file_logging {
        match build_file_writer(cfg) {
            Some((writer, guard)) => (Some(writer), Some(guard)),
            None => (None, None),
        }
    } else {
        (None, None)
    };

    let mut layers: Vec<BoxedLayer> = Vec::with_capacity(2);
    match cfg.format {
        LogFormat::Json => {
            layers.push(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(std::io::stdout)
                    .boxed(),
            );
            if let Some(writer) = file_writer {
                layers.push(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_ansi(false)
                        .with_timer(UtcTime::rfc_3339())
                        .with_writer(writer)
                        .boxed(),
                );
            }
        }
        LogFormat::Text => {
            layers.push(
                tracing_subscriber::fmt::layer()
                    .with_ansi(true)
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(std::io::stdout)
                    .boxed(),
            );
            if let Some(writer) = file_writer {
                layers.push(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_timer(UtcTime::rfc_3339())
                        .with_writer(writer)
                        .boxed(),
                );
            }
        }
    }

    let _ = tracing_subscriber::registry()
        .with(layers)
        .with(env_filter(cfg))
        .try_init();

    guard
}

fn env_filter(cfg: &LoggingConfig) -> EnvFilter {
    match &cfg.level {
        Some(level) => EnvFilter::new(level.as_str()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

fn build_file_writer(cfg: &LoggingConfig) -> Option<(NonBlocking, WorkerGuard)> {
    let rotation = match cfg.rotation.to_lowercase().as_str() {
        "hourly" => tracing_appender::rolling::Rotation::HOURLY,
        "never" => tracing_appender::rolling::Rotation::NEVER,
        _ => tracing_appender::rolling::Rotation::DAILY,
    };

    if let Err(err) = std::fs::create_dir_all(&cfg.dir) {
        eprintln!(
            "Failed to create log directory '{}' ({err}), continuing with stdout logs",
            cfg.dir
        );
        return None;
    }

    let file_appender =
        tracing_appender::rolling::RollingFileAppender::new(rotation, &cfg.dir, &cfg.filename);
    Some(tracing_appender::non_blocking(file_appender))
}
