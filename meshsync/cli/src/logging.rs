use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt::format::FmtSpan, prelude::*, EnvFilter};

/// Set to `true` to get JSON logs, e.g. when the sidecar's output is shipped to a log pipeline.
pub(crate) const JSON_LOG_ENV: &str = "MESHSYNC_JSON_LOG";

/// `log_level` (the `-log-level` flag) wins over `RUST_LOG`; with neither, logs at `info`.
pub(crate) fn init_tracing_registry(log_level: Option<&str>) {
    let env_filter = match log_level {
        Some(log_level) => EnvFilter::builder().parse_lossy(log_level),
        None => EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy(),
    };

    let json_log = std::env::var(JSON_LOG_ENV)
        .ok()
        .and_then(|json_log| json_log.parse().ok())
        .unwrap_or(false);

    if json_log {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_thread_ids(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .json(),
            )
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_line_number(true),
            )
            .with(env_filter)
            .init();
    }
}
