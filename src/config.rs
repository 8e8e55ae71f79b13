//! Command-line and environment configuration.

use clap::Parser;
use clap::builder::FalseyValueParser;

/// Runtime settings for the gesture service.
///
/// Every flag can also come from the environment, which is how the service is
/// usually configured when run in a container.
#[derive(Debug, Clone, Parser)]
#[command(name = "gestures")]
#[command(version)]
#[command(about = "In-memory gesture store over HTTP", long_about = None)]
pub struct Config {
    /// Address to listen on
    #[arg(short, long, env = "GESTURES_ADDR", default_value = "127.0.0.1:8080")]
    pub addr: String,

    /// Log level or filter directive (trace, debug, info, warn, error)
    #[arg(short, long, env = "GESTURES_LOG", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    ///
    /// From the environment, `0`, `false`, `f`, `no`, `n` and `off` disable
    /// it; any other value enables it.
    #[arg(long, env = "GESTURES_JSON_LOGS", value_parser = FalseyValueParser::new())]
    pub json_logs: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Config::command().debug_assert();
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "gestures",
            "--addr",
            "0.0.0.0:9000",
            "--log-level",
            "debug",
            "--json-logs",
        ])
        .unwrap();
        assert_eq!(config.addr, "0.0.0.0:9000");
        assert_eq!(config.log_level, "debug");
        assert!(config.json_logs);
    }

    #[test]
    fn unknown_flag_is_rejected() {
        assert!(Config::try_parse_from(["gestures", "--port", "80"]).is_err());
    }
}
