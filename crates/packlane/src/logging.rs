use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Initialize stderr logging.
///
/// `--log-level` sets the default filter; a set `RUST_LOG` wins over it, so
/// per-module directives like `packlane_frame::pump=trace` can be dialed in
/// without flooding stderr with every packet event. Targets stay on for the
/// same reason: pump and framer events are only useful when attributable.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_directive()));

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(true);

    match format {
        LogFormat::Text => {
            let _ = builder.compact().try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}
