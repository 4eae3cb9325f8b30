//! Tracing subscriber setup

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the stderr subscriber
///
/// `RUST_LOG` wins when set. Otherwise `-v` enables debug and `-vv` trace.
pub fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_thread_names(true)
        .with_writer(std::io::stderr);

    // A second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .try_init();
}
