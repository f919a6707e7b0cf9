use std::sync::Mutex;

use slog::Drain;
use slog::Fuse;
use slog_async::Async;
use slog_json::Json;

pub use slog::{debug, error, info, o, trace, warn, Logger};

/// Builds the root logger: JSON lines on stderr, drained on a
/// background thread.
pub fn initialize_logger() -> slog::Logger {
    let drain = Mutex::new(Json::default(std::io::stderr())).map(Fuse);
    let drain = Async::new(drain).build().fuse();

    Logger::root(
        drain,
        o!("version" => info::VERSION, "revision" => info::REVISION, "build_timestamp" => info::BUILD_TIMESTAMP),
    )
}

/// Builds a logger that throws every record away.
pub fn discarding_logger() -> slog::Logger {
    Logger::root(slog::Discard, o!())
}

/// Installs a terminal logger filtered by `RUST_LOG` as the `slog-scope`
/// global logger and returns a handle to it. Logging stops once the
/// guard is dropped.
#[cfg(feature = "env_logging")]
pub fn initialize_env_logger(
) -> Result<(slog::Logger, slog_scope::GlobalLoggerGuard), Box<dyn std::error::Error>> {
    let guard = slog_envlogger::init()?;

    Ok((slog_scope::logger(), guard))
}

#[cfg(all(test, feature = "env_logging"))]
mod tests {
    use super::initialize_env_logger;

    #[test]
    fn env_logger_becomes_global() {
        let (logger, _guard) = initialize_env_logger().expect("initialize env logger");

        slog::info!(logger, "installed");
        slog::info!(slog_scope::logger(), "reachable through slog-scope");
    }
}
