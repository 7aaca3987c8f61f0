// Logging is a true no-op unless the `logger` feature is enabled. As a
// library we can't rely on the caller to set a static max level.

#[cfg(feature = "logger")]
pub use log::{debug, trace, warn};

/// Returns true if the trace log level is enabled
#[cfg(feature = "logger")]
#[must_use]
pub fn trace_enabled() -> bool {
    log::log_enabled!(log::Level::Trace)
}

#[cfg(not(feature = "logger"))]
pub use noop_logger::{debug, trace, trace_enabled, warn};

#[cfg(not(feature = "logger"))]
mod noop_logger {
    #[doc(hidden)]
    #[macro_export]
    /// A noop logger, when the logger feature is disabled
    macro_rules! noop {
        ($($arg:tt)+) => {
            if $crate::logger::trace_enabled() {
                // Never taken; keeps the arguments "used" for lints.
                let _ = format!($($arg)+);
            }
        };
    }

    pub use crate::noop as debug;
    pub use crate::noop as trace;
    pub use crate::noop as warn;

    /// `trace_enabled` for a noop logger is always false
    #[inline]
    #[must_use]
    pub const fn trace_enabled() -> bool {
        false
    }
}
