//! Server configuration and CLI arguments.

use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;

/// Command-line arguments for the tierlog binary.
#[derive(Parser, Debug)]
#[command(name = "tierlog", about = "Tiered log store HTTP server")]
pub struct CliArgs {
    /// Port to listen on.
    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// Path to a YAML config file. Defaults apply when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl CliArgs {
    /// Loads the store configuration from the config file, falling
    /// back to defaults when no file was given.
    pub fn load_config(&self) -> Config {
        match &self.config {
            Some(path) => {
                let text =
                    std::fs::read_to_string(path).expect("failed to read config file");
                serde_yaml::from_str(&text).expect("failed to parse config file")
            }
            None => Config::default(),
        }
    }
}

/// HTTP server configuration.
pub struct ServerConfig {
    pub port: u16,
}

impl From<&CliArgs> for ServerConfig {
    fn from(args: &CliArgs) -> Self {
        Self { port: args.port }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_port_when_not_given() {
        // given/when
        let args = CliArgs::parse_from(["tierlog"]);

        // then
        assert_eq!(args.port, 8080);
        assert!(args.config.is_none());
    }

    #[test]
    fn should_fall_back_to_default_config_without_file() {
        // given
        let args = CliArgs::parse_from(["tierlog", "--port", "9000"]);

        // when
        let config = args.load_config();

        // then
        assert_eq!(config, Config::default());
        assert_eq!(ServerConfig::from(&args).port, 9000);
    }
}
