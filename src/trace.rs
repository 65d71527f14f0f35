//! Logging for the searches.
//!
//! With the `tracing` feature the macros below are those of the `tracing`
//! crate. Without it they expand to nothing, so instrumented code needs no
//! `cfg` of its own:
//!
//! ```rust,ignore
//! use crate::trace::{debug, debug_span, trace};
//!
//! let _span = debug_span!("narrow", initial = initial.len()).entered();
//! trace!(depth, "narrowing state folded");
//! debug!(states, folded, "narrowing exhausted");
//! ```

#[cfg(feature = "tracing")]
pub use tracing::{debug, debug_span, trace, Span};

#[cfg(not(feature = "tracing"))]
mod disabled {
    /// Stands in for `tracing::Span`; entering it does nothing.
    pub struct Span;

    impl Span {
        pub fn none() -> Self {
            Span
        }

        pub fn entered(self) -> Self {
            self
        }
    }

    #[macro_export]
    macro_rules! trace {
        ($($tt:tt)*) => {};
    }

    #[macro_export]
    macro_rules! debug {
        ($($tt:tt)*) => {};
    }

    #[macro_export]
    macro_rules! debug_span {
        ($($tt:tt)*) => {
            $crate::trace::Span::none()
        };
    }

    pub use crate::{debug, debug_span, trace};
}

#[cfg(not(feature = "tracing"))]
pub use disabled::*;

/// Environment variable read by [`init_subscriber`].
pub const LOG_ENV: &str = "RWCORE_LOG";

/// Send events to stderr, filtered by `RWCORE_LOG` in `EnvFilter` syntax
/// (`rwcore::narrowing=trace,rwcore::variant=debug`). Without the variable
/// only warnings pass. Only the first call installs anything.
#[cfg(feature = "tracing")]
pub fn init_subscriber() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(false);
    // Fails when a subscriber is already set, which is fine.
    let _ = tracing_subscriber::registry().with(layer).with(filter).try_init();
}

#[cfg(not(feature = "tracing"))]
pub fn init_subscriber() {}

#[cfg(test)]
#[path = "tests/trace.rs"]
mod tests;
