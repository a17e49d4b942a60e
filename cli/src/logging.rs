//! Stderr logging for the CLI.
//!
//! The library logs through the `log` facade; the CLI installs a
//! `tracing-subscriber` formatter on stderr, which also captures `log`
//! records. The level follows the global `-v`/`-q` flags: warnings by
//! default, one more level per `-v`, nothing at all with `-q`.

use log::LevelFilter;
use tracing_subscriber::filter::LevelFilter as SubscriberLevel;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Map the CLI verbosity flags to a level filter.
///
/// # Examples
///
/// ```
/// use log::LevelFilter;
/// use trustload_cli::logging::level_filter;
///
/// assert_eq!(level_filter(0, false), LevelFilter::Warn);
/// assert_eq!(level_filter(2, false), LevelFilter::Debug);
/// assert_eq!(level_filter(3, true), LevelFilter::Off);
/// ```
#[must_use]
pub fn level_filter(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Off;
    }
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Convert a `log` level filter into the subscriber's filter.
#[must_use]
pub fn subscriber_level(level: LevelFilter) -> SubscriberLevel {
    match level {
        LevelFilter::Off => SubscriberLevel::OFF,
        LevelFilter::Error => SubscriberLevel::ERROR,
        LevelFilter::Warn => SubscriberLevel::WARN,
        LevelFilter::Info => SubscriberLevel::INFO,
        LevelFilter::Debug => SubscriberLevel::DEBUG,
        LevelFilter::Trace => SubscriberLevel::TRACE,
    }
}

/// Install the stderr subscriber for the process.
///
/// A second call leaves the first subscriber in place.
pub fn init(level: LevelFilter) {
    let result = tracing_subscriber::registry()
        .with(subscriber_level(level))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(false)
                .without_time(),
        )
        .try_init();
    if result.is_err() {
        log::debug!("logger already installed");
    }
}
