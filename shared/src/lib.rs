//! This library provides shared code for the MySQL quota daemon.
//!
//! It contains the [quota types](types), the config value [parsers](parser), a journald
//! [logger](journald_logger) and the [shutdown] signal used by the polling loop.

pub mod journald_logger;
pub mod parser;
pub mod shutdown;
pub mod types;

/// Stringifies any Error that implements `AsRef<&dyn std::error::Error>` with additional context
/// and its sources.
#[macro_export]
macro_rules! error_chain {
    ($err:expr, $fmt:expr $(,$arg:expr)* $(,)?) => {{
        use std::fmt::Write;

        let mut err_string = String::new();
        write!(err_string, "{}", format_args!($fmt, $($arg,)*)).ok();

        let mut current_source: Option<&dyn std::error::Error> = Some($err.as_ref());
        while let Some(source) = current_source {
            write!(err_string, ": {}", source).ok();
            current_source = source.source();
        }

        err_string
    }};
}

/// Logs any error that implements `AsRef<&dyn std::error::Error>` with additional context and its
/// sources.
#[macro_export]
macro_rules! log_error_chain {
    ($err:expr, $fmt:expr $(,$arg:expr)* $(,)?) => {
        log::error!("{}", $crate::error_chain!($err, $fmt, $($arg,)*));
    };
}
