use std::path::Path;
use std::sync::OnceLock;

use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{Builder, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "rampstack";
const MAX_LOG_FILES: usize = 5;

/// Keeps the non-blocking file writer flushing until process exit.
static FILE_WRITER_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides `base_level`. Console output goes to stdout, with
/// warnings and errors mirrored to stderr. When `log_dir` is given, a
/// daily-rotating plain-text log is written there as well.
pub fn setup_logging(base_level: &str, log_dir: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(base_level))
        .unwrap_or_else(|e| panic!("Invalid log filter '{base_level}': {e}"));

    let terminal = std::io::stdout.and(std::io::stderr.with_min_level(Level::WARN));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_line_number(true)
                .with_writer(terminal),
        )
        .with(log_dir.map(|dir| {
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .with_writer(rolling_writer(dir))
        }))
        .try_init()
        .unwrap_or_else(|e| panic!("Logger initialization failed: {e}"));
}

/// Rolling `rampstack.<date>.log` writer under `dir`.
fn rolling_writer(dir: &Path) -> NonBlocking {
    std::fs::create_dir_all(dir)
        .unwrap_or_else(|e| panic!("Failed to create log directory {}: {e}", dir.display()));

    let appender = Builder::new()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(dir)
        .unwrap_or_else(|e| panic!("Failed to open rolling log in {}: {e}", dir.display()));

    let (writer, guard) = tracing_appender::non_blocking(appender);
    if FILE_WRITER_GUARD.set(guard).is_err() {
        panic!("File logging already initialized");
    }
    writer
}
