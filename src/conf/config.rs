use std::path::Path;

use config::{Config as CConfig, ConfigBuilder, Environment, builder::DefaultState};
use serde::{Deserialize, Serialize};

use crate::conf::{QueryConfig, ServerConfig, StorageConfig};
use crate::core::DashError::{self, ConfigParsingError};

const ENV_PREFIX: &str = "TABDASH";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

impl Config {
    pub fn from_str(toml_str: &str) -> Result<Config, DashError> {
        let builder = CConfig::builder()
            .add_source(config::File::from_str(toml_str, config::FileFormat::Toml));
        Self::build(builder)
    }

    /// Loads the optional TOML file, then applies `TABDASH_*` environment overrides
    /// (`TABDASH_SERVER__PORT=9000`).
    pub fn load(path: Option<&Path>) -> Result<Config, DashError> {
        let mut builder = CConfig::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );
        Self::build(builder)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Config, DashError> {
        let config = builder
            .build()
            .map_err(|e| ConfigParsingError(e.to_string()))?
            .try_deserialize::<Config>()
            .map_err(|e| ConfigParsingError(e.to_string()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn load_correct_toml() {
        let toml = r#"
        [server]
        host = "0.0.0.0"
        port = 3000

        [storage]
        export_dir = "/tmp/exports"

        [query]
        read_only = true
        "#;
        let conf = Config::from_str(toml);
        assert_eq!(
            conf,
            Ok(Config {
                server: ServerConfig {
                    host: String::from("0.0.0.0"),
                    port: 3000,
                    ..ServerConfig::default()
                },
                storage: StorageConfig {
                    export_dir: PathBuf::from("/tmp/exports"),
                    ..StorageConfig::default()
                },
                query: QueryConfig { read_only: true },
            })
        );
    }

    #[test]
    fn empty_toml_uses_defaults() {
        assert_eq!(Config::from_str(""), Ok(Config::default()));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let toml = r#"
        [server]
        hostname = "localhost"
        "#;
        assert!(matches!(
            Config::from_str(toml),
            Err(DashError::ConfigParsingError(_))
        ));
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let result = Config::load(Some(Path::new("/nonexistent/tabdash.toml")));
        assert!(matches!(result, Err(DashError::ConfigParsingError(_))));
    }
}
