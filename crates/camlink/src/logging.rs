use clap::ValueEnum;

/// Environment override for the log level, same names as `--log-level`.
/// Useful when camlink runs embedded in a host process that owns the
/// argument list.
const LEVEL_ENV_VAR: &str = "CAMLINK_LOG";

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
    pub fn as_filter(self) -> tracing::level_filters::LevelFilter {
        match self {
            LogLevel::Error => tracing::level_filters::LevelFilter::ERROR,
            LogLevel::Warn => tracing::level_filters::LevelFilter::WARN,
            LogLevel::Info => tracing::level_filters::LevelFilter::INFO,
            LogLevel::Debug => tracing::level_filters::LevelFilter::DEBUG,
            LogLevel::Trace => tracing::level_filters::LevelFilter::TRACE,
        }
    }

    fn from_env() -> Option<Self> {
        let value = std::env::var(LEVEL_ENV_VAR).ok()?;
        Self::from_str(&value, true).ok()
    }
}

/// Logs go to stderr so stdout stays machine-parseable frame output.
/// `CAMLINK_LOG` takes precedence over the CLI level when set.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let level = LogLevel::from_env().unwrap_or(level);
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level.as_filter())
        .with_ansi(false)
        .with_target(false);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}
