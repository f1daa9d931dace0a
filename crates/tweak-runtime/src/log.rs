//! Logging facility: six severities, a single replaceable process-wide
//! sink, ISO-8601 UTC timestamp + thread id + level + function + line +
//! message. The default sink here formats records into `tracing`
//! events so host applications that already install a
//! `tracing_subscriber` see these records for free. A custom sink
//! replaces that default entirely when `set_sink` is called, so the
//! sink is replaceable at runtime.

use std::sync::{OnceLock, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Trace,
    Debug,
    /// No direct `tracing::Level` equivalent; the default sink emits these
    /// as `DEBUG` on the `tweak::test` target.
    Test,
    Warn,
    Error,
    /// Aborts the process after the sink runs.
    Fatal,
}

#[derive(Debug, Clone)]
pub struct Record {
    pub timestamp: String,
    pub thread_id: String,
    pub level: Level,
    pub function: &'static str,
    pub line: u32,
    pub message: String,
}

type SinkFn = dyn Fn(&Record) + Send + Sync;

fn sink_lock() -> &'static RwLock<Box<SinkFn>> {
    static SINK: OnceLock<RwLock<Box<SinkFn>>> = OnceLock::new();
    SINK.get_or_init(|| {
        #[cfg(feature = "auto-subscriber")]
        tracing_subscriber::fmt::try_init().ok();
        RwLock::new(Box::new(default_sink) as Box<SinkFn>)
    })
}

/// Installs a new process-wide sink, replacing whatever was installed
/// before (the default, or a prior override).
pub fn set_sink(sink: Box<SinkFn>) {
    *sink_lock().write().expect("log sink lock poisoned") = sink;
}

/// Restores the default `tracing`-backed sink.
pub fn reset_sink() {
    set_sink(Box::new(default_sink));
}

fn default_sink(record: &Record) {
    match record.level {
        Level::Trace => {
            tracing::trace!(function = record.function, line = record.line, "{}", record.message)
        }
        Level::Debug => {
            tracing::debug!(function = record.function, line = record.line, "{}", record.message)
        }
        Level::Test => tracing::debug!(
            target: "tweak::test",
            function = record.function,
            line = record.line,
            "{}",
            record.message
        ),
        Level::Warn => {
            tracing::warn!(function = record.function, line = record.line, "{}", record.message)
        }
        Level::Error | Level::Fatal => {
            tracing::error!(function = record.function, line = record.line, "{}", record.message)
        }
    }
}

/// Builds a `Record` and dispatches it to the installed sink. `Fatal`
/// records abort the process after the sink returns. Use the `tweak_log!`
/// macro rather than calling this directly so `function`/`line` are
/// captured at the call site.
pub fn emit(level: Level, function: &'static str, line: u32, message: String) {
    let record = Record {
        timestamp: iso8601_utc_now(),
        thread_id: format!("{:?}", std::thread::current().id()),
        level,
        function,
        line,
        message,
    };
    let fatal = record.level == Level::Fatal;
    {
        let sink = sink_lock().read().expect("log sink lock poisoned");
        sink(&record);
    }
    if fatal {
        std::process::abort();
    }
}

/// Days-since-epoch to proleptic Gregorian civil date, Howard Hinnant's
/// `civil_from_days` algorithm (public domain), used so this crate can
/// format UTC timestamps without a date/time dependency.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

fn iso8601_utc_now() -> String {
    let dur = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    let secs = dur.as_secs() as i64;
    let millis = dur.subsec_millis();
    let days = secs.div_euclid(86400);
    let secs_of_day = secs.rem_euclid(86400);
    let (year, month, day) = civil_from_days(days);
    let hour = secs_of_day / 3600;
    let minute = (secs_of_day % 3600) / 60;
    let second = secs_of_day % 60;
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        year, month, day, hour, minute, second, millis
    )
}

/// Captures the enclosing function's name via the classic
/// `std::any::type_name` trick (no nightly features required).
#[macro_export]
macro_rules! function_name {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            std::any::type_name::<T>()
        }
        let name = type_name_of(f);
        &name[..name.len() - 3]
    }};
}

/// Logs a record at `$level`, capturing the call site's function name and
/// line number.
#[macro_export]
macro_rules! tweak_log {
    ($level:expr, $($arg:tt)*) => {
        $crate::log::emit($level, $crate::function_name!(), line!(), format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn civil_from_days_epoch_is_1970_01_01() {
        assert_eq!(civil_from_days(0), (1970, 1, 1));
    }

    #[test]
    fn civil_from_days_known_date() {
        // 2020-03-01 is 18322 days after the epoch.
        assert_eq!(civil_from_days(18322), (2020, 3, 1));
    }

    #[test]
    fn timestamp_has_iso8601_shape() {
        let ts = iso8601_utc_now();
        assert_eq!(ts.len(), "2024-01-01T00:00:00.000Z".len());
        assert!(ts.ends_with('Z'));
    }

    #[test]
    #[serial_test::serial]
    fn custom_sink_receives_records() {
        let captured: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let captured_clone = captured.clone();
        set_sink(Box::new(move |record: &Record| {
            captured_clone.lock().unwrap().push(record.message.clone());
        }));
        tweak_log!(Level::Warn, "hello {}", 42);
        assert_eq!(captured.lock().unwrap().as_slice(), &["hello 42".to_string()]);
        reset_sink();
    }
}
