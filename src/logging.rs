use std::fs;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Sets up console logging plus a daily-rolling JSON log file under logs/.
pub fn init_logging() {
    let _ = fs::create_dir_all("logs");

    let file_appender = tracing_appender::rolling::daily("logs", "agenda.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Respect RUST_LOG when set, default to info for this crate otherwise.
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("agenda_scraper=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json().with_writer(file_writer))
        .with(fmt::layer().with_writer(std::io::stdout))
        .init();

    // The guard flushes buffered lines on drop; the subscriber outlives
    // main, so leak it.
    std::mem::forget(guard);
}
