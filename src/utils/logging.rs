use env_logger::{Builder, Env};
use log::LevelFilter;

///
/// Initializes the global logger at `log_level` for this crate.
/// A `RUST_LOG` in the environment takes precedence.
///
pub fn init_logging(log_level: LevelFilter) {
    let default_filter = format!("chunkstore={}", log_level);
    Builder::from_env(Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();
}

/// Level for the `-v` flag: info when verbose, warnings otherwise.
pub fn level_for_verbosity(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_verbosity() {
        assert_eq!(level_for_verbosity(true), LevelFilter::Info);
        assert_eq!(level_for_verbosity(false), LevelFilter::Warn);
    }
}
