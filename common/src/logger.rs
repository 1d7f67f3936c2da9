use log::*;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

/// Initialize the process-wide logger.
///
/// Honors `RUST_LOG` (one of `error|warn|info|debug|trace`, case-insensitive),
/// defaulting to `info` when unset or unparsable.
pub fn init_logger() {
  let level = std::env::var("RUST_LOG")
    .ok()
    .and_then(|s| s.parse::<LevelFilter>().ok())
    .unwrap_or(LevelFilter::Info);
  TermLogger::init(
    level,
    Config::default(),
    TerminalMode::Mixed,
    ColorChoice::Auto,
  )
  .expect("Failed to initialize logger");
}
