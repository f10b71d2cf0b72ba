use parking_lot::Mutex;
/// Debug logging for channel-tint
///
/// Controlled by the CHANNEL_TINT_DEBUG_LEVEL environment variable or, once
/// `init_log_bridge` runs, by the effective `log` level:
/// - 0 or unset: No debugging
/// - 1: Errors only
/// - 2: Info level (passes, triggers, outcomes)
/// - 3: Debug level (resolution strategies, decoration changes)
/// - 4: Trace level (every page lookup)
///
/// Output goes to channel_tint_debug.log in the temp directory so a replay's
/// stdout stays clean. When RUST_LOG is set, lines are mirrored to stderr.
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use channel_tint_config::LogLevel;

/// Debug level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DebugLevel {
    Off = 0,
    Error = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl DebugLevel {
    fn from_env() -> Self {
        match std::env::var("CHANNEL_TINT_DEBUG_LEVEL") {
            Ok(val) => match val.trim().parse::<u8>() {
                Ok(1) => DebugLevel::Error,
                Ok(2) => DebugLevel::Info,
                Ok(3) => DebugLevel::Debug,
                Ok(4) => DebugLevel::Trace,
                _ => DebugLevel::Off,
            },
            Err(_) => DebugLevel::Off,
        }
    }

    fn from_filter(filter: log::LevelFilter) -> Self {
        match filter {
            log::LevelFilter::Off => DebugLevel::Off,
            log::LevelFilter::Error | log::LevelFilter::Warn => DebugLevel::Error,
            log::LevelFilter::Info => DebugLevel::Info,
            log::LevelFilter::Debug => DebugLevel::Debug,
            log::LevelFilter::Trace => DebugLevel::Trace,
        }
    }
}

/// Global debug logger
struct DebugLogger {
    level: DebugLevel,
    file: Option<std::fs::File>,
    mirror_stderr: bool,
}

impl DebugLogger {
    fn new() -> Self {
        Self::with_level(DebugLevel::from_env())
    }

    fn with_level(level: DebugLevel) -> Self {
        let mut logger = DebugLogger {
            level,
            file: None,
            mirror_stderr: std::env::var_os("RUST_LOG").is_some(),
        };
        if level == DebugLevel::Off {
            return logger;
        }

        let log_path = std::env::temp_dir().join("channel_tint_debug.log");
        // A log file that cannot be opened just means no file output
        if let Ok(f) = OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(&log_path)
        {
            logger.file = Some(f);
            logger.write_raw(&format!(
                "\n{}\nchannel-tint debug session started at {} (level={:?})\n{}\n",
                "=".repeat(80),
                get_timestamp(),
                level,
                "=".repeat(80)
            ));
        }
        logger
    }

    fn write_raw(&mut self, msg: &str) {
        if let Some(ref mut file) = self.file {
            let _ = file.write_all(msg.as_bytes());
            let _ = file.flush();
        }
    }

    fn log(&mut self, level: DebugLevel, category: &str, msg: &str) {
        if level > self.level {
            return;
        }
        let level_str = match level {
            DebugLevel::Error => "ERROR",
            DebugLevel::Info => "INFO ",
            DebugLevel::Debug => "DEBUG",
            DebugLevel::Trace => "TRACE",
            DebugLevel::Off => return,
        };
        let line = format!(
            "[{}] [{}] [{}] {}\n",
            get_timestamp(),
            level_str,
            category,
            msg
        );
        if self.mirror_stderr {
            eprint!("{line}");
        }
        self.write_raw(&line);
    }
}

static LOGGER: OnceLock<Mutex<DebugLogger>> = OnceLock::new();

fn get_logger() -> &'static Mutex<DebugLogger> {
    LOGGER.get_or_init(|| Mutex::new(DebugLogger::new()))
}

fn get_timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:06}", now.as_secs(), now.subsec_micros())
}

/// Check if debugging is enabled at given level
pub fn is_enabled(level: DebugLevel) -> bool {
    let logger = get_logger().lock();
    level <= logger.level
}

/// Log a message at specified level
pub fn log(level: DebugLevel, category: &str, msg: &str) {
    let mut logger = get_logger().lock();
    logger.log(level, category, msg);
}

/// Log formatted message
pub fn logf(level: DebugLevel, category: &str, args: fmt::Arguments) {
    if is_enabled(level) {
        log(level, category, &format!("{}", args));
    }
}

/// Routes `log::info!()` and friends into the debug log file.
struct LogBridge;

impl log::Log for LogBridge {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = match record.level() {
            log::Level::Error | log::Level::Warn => DebugLevel::Error,
            log::Level::Info => DebugLevel::Info,
            log::Level::Debug => DebugLevel::Debug,
            log::Level::Trace => DebugLevel::Trace,
        };
        crate::debug::log(level, record.target(), &record.args().to_string());
    }

    fn flush(&self) {}
}

static LOG_BRIDGE: LogBridge = LogBridge;

/// Install the `log` facade backend.
///
/// Precedence: `cli_level` (the `--log-level` flag), then `RUST_LOG` (a bare
/// level name), then `config_level`. Calling this more than once keeps the
/// first installation.
pub fn init_log_bridge(cli_level: Option<LogLevel>, config_level: LogLevel) {
    let env_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|v| v.trim().parse::<log::LevelFilter>().ok());
    let filter = cli_level
        .map(LogLevel::to_level_filter)
        .or(env_level)
        .unwrap_or_else(|| config_level.to_level_filter());

    let _ = LOGGER.set(Mutex::new(DebugLogger::with_level(DebugLevel::from_filter(
        filter,
    ))));
    if log::set_logger(&LOG_BRIDGE).is_ok() {
        log::set_max_level(filter);
    }
}

// Convenience macros for logging
#[macro_export]
macro_rules! debug_error {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Error, $category, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug_info {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Info, $category, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug_log {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Debug, $category, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug_trace {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Trace, $category, format_args!($($arg)*))
    };
}
