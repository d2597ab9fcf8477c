//! Tracing/logging initialization (ADDED ambient stack, grounded on the
//! teacher's `logging.rs`): console output plus an optional rolling file
//! appender, both built from [`crate::config::LoggingConfig`].

use time::UtcOffset;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::time::OffsetTime, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    Registry,
};

use crate::config::LoggingConfig;
use crate::errors::{InitializationError, ModbusError};

/// Guard returned by [`init`]; the non-blocking file writer flushes on drop,
/// so callers must keep this alive for the process lifetime.
pub struct LoggingGuard(#[allow(dead_code)] Option<WorkerGuard>);

pub fn init(config: &LoggingConfig) -> Result<LoggingGuard, ModbusError> {
    let timer = OffsetTime::new(
        UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC),
        time::format_description::well_known::Rfc3339,
    );

    let mut env_filter = EnvFilter::default().add_directive(config.level_filter().into());
    if config.trace_frames {
        env_filter = env_filter
            .add_directive("modbus_engine::frame=trace".parse().unwrap())
            .add_directive("modbus_engine::dispatch=trace".parse().unwrap());
    }

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(config.thread_ids)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_timer(timer);

    let (guard, file_layer) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "modbus-engine.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(guard), Some(layer))
        }
        None => (None, None),
    };

    let subscriber = Registry::default()
        .with(console_layer.with_filter(env_filter.clone()))
        .with(file_layer.map(|layer| layer.with_filter(env_filter)));

    subscriber.try_init().map_err(|err| {
        ModbusError::Init(InitializationError::logging(format!(
            "failed to initialize logging: {err}"
        )))
    })?;

    Ok(LoggingGuard(guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_filter_falls_back_to_info_on_unknown_level() {
        let config = LoggingConfig {
            level: "not-a-level".to_string(),
            ..Default::default()
        };
        assert_eq!(config.level_filter(), tracing::level_filters::LevelFilter::INFO);
    }
}
