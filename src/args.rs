use std::path::PathBuf;

#[derive(clap::Parser, Debug)]
pub struct Args {
    /// Set the format of log output.
    #[clap(short, long, default_value = "full")]
    pub log: LogFormat,

    /// Path to the broker configuration TOML. Pass `-` to read from stdin.
    ///
    /// All settings have defaults, so the broker also starts without a file.
    #[clap(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Debug, Copy, Clone)]
pub enum LogFormat {
    /// Emit human-readable single line logs for each event.
    Full,
    /// A variant of full, optimized for shorter line lengths.
    Compact,
    /// Format events in multi-line very "prettified" form.
    Pretty,
    /// Emit JSON-lines formatted events.
    Json,
}
