use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{AppError, Result};

/// Fatal, loop-terminating conditions. `tracing` tops out at ERROR, so these
/// are ERROR events tagged `severity="CRITICAL"`.
macro_rules! critical {
    ($($arg:tt)+) => {
        tracing::error!(severity = "CRITICAL", $($arg)+)
    };
}
pub(crate) use critical;

/// Console output plus an append-only plain-text log file.
/// `RUST_LOG` overrides `log_level` when set.
///
/// The returned guard flushes the file writer on drop; keep it alive until
/// the process exits.
pub fn init_logging(log_level: &str, log_file: impl AsRef<Path>) -> Result<WorkerGuard> {
    let log_file = log_file.as_ref();
    let file_name = log_file
        .file_name()
        .ok_or_else(|| AppError::Config(format!("LOG_FILE {} has no file name", log_file.display())))?;
    let dir = match log_file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    // one file, never rotated, opened in append mode
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(dir)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
        .init();

    tracing::info!(log_file = %log_file.display(), "Logging initialized at level: {log_level}");
    Ok(guard)
}

#[cfg(test)]
pub(crate) mod capture {
    //! Collects formatted events from the current thread for assertions.

    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    use tracing::subscriber::DefaultGuard;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

    impl LogCapture {
        /// Routes every event on this thread into the buffer until the guard
        /// drops. Paused-clock tokio tests run on the current thread, so
        /// events from awaited futures are captured too.
        pub fn install(&self) -> DefaultGuard {
            let subscriber = tracing_subscriber::fmt()
                .with_writer(self.clone())
                .with_ansi(false)
                .without_time()
                .with_max_level(tracing::Level::TRACE)
                .finish();
            tracing::subscriber::set_default(subscriber)
        }

        pub fn lines(&self) -> Vec<String> {
            String::from_utf8_lossy(&self.0.lock().unwrap())
                .lines()
                .map(str::to_string)
                .collect()
        }

        /// Lines at `level` that contain every one of `needles`.
        pub fn matching(&self, level: &str, needles: &[&str]) -> Vec<String> {
            self.lines()
                .into_iter()
                .filter(|l| l.trim_start().starts_with(level))
                .filter(|l| needles.iter().all(|n| l.contains(n)))
                .collect()
        }
    }

    impl Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogCapture {
        type Writer = LogCapture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }
}
