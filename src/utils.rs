use std::path::PathBuf;

use anyhow::bail;
use time::{OffsetDateTime, UtcOffset};
use tracing_subscriber::EnvFilter;

/// Local UTC offset, or UTC when the platform cannot report one.
pub fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

/// Current time in the local offset.
pub fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_utc().to_offset(local_offset())
}

/// Unix seconds of the midnight that starts `now`'s calendar day, in `now`'s offset.
pub fn start_of_day(now: OffsetDateTime) -> i64 {
    now.replace_time(time::Time::MIDNIGHT).unix_timestamp()
}

/// Install the global subscriber; logs go to stdout or a daily-rotated file in `log`.
pub fn init_log(log: Option<PathBuf>) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber_builder = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_thread_names(true);
    let (non_blocking, guard) = if let Some(log) = log {
        // output to file, daily rotate, non-blocking
        if !log.is_dir() {
            bail!("log path {} is not a directory", log.display());
        }
        let file_appender = tracing_appender::rolling::daily(log, "course_tracker.log");
        tracing_appender::non_blocking(file_appender)
    } else {
        tracing_appender::non_blocking(std::io::stdout())
    };
    tracing::subscriber::set_global_default(subscriber_builder.with_writer(non_blocking).finish())
        .map_err(|e| anyhow::anyhow!("init log failed: {e}"))?;
    Ok(guard)
}
