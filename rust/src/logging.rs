/// Logging initialization.
///
/// - stderr via `tracing-subscriber::fmt`, filtered by `RUST_LOG` when set
/// - `<data_dir>/advisor.log` as a file fallback so logs survive hosts that swallow stderr
///
/// Called once at the start of `FfiApp::new()`; later calls are no-ops.
pub fn init_logging(data_dir: &str) {
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "advisor_core=debug,info".into());

    let log_path = std::path::Path::new(data_dir).join("advisor.log");
    let _ = std::fs::create_dir_all(data_dir);
    let file_layer = if let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .with_target(true),
        )
    } else {
        None
    };

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
}
