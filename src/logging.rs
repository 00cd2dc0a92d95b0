use std::io;
use tracing_appender::rolling;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Console filter when `RUST_LOG` is unset. Kept quiet so log lines do not
/// break up the operator prompt.
const DEFAULT_CONSOLE_FILTER: &str = "warn,sqlx=off";

const FILE_FILTER: &str = "info,db_cleaner=debug,db_query=debug,session=debug,sqlx=warn";

pub fn configure_logging() {
    // Stderr log configuration; stdout belongs to the interactive protocol
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_CONSOLE_FILTER));
    let stderr_log = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_filter(console_filter);

    // File log configuration
    let file_appender = rolling::daily("logs", "db_cleaner.log");
    let file_log = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_filter(EnvFilter::new(FILE_FILTER));

    tracing_subscriber::Registry::default()
        .with(stderr_log)
        .with(file_log)
        .init();
}
