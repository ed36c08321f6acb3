use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::samplers::NoiseSource;

/// Environment variable naming the engine configuration file.
pub const CONFIG_ENV: &str = "DPKIT_CONFIG";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ConfigFormat {
    Auto,
    Toml,
    Yaml,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {format:?} config: {details}")]
    Parse {
        format: ConfigFormat,
        details: String,
    },
    #[error("configuration invalid: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct EngineConfig {
    pub limits: LimitsSection,
    pub sampling: SamplingSection,
    pub logging: LoggingSection,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct LimitsSection {
    /// Largest element count accepted by `lift` or exposed through a slice.
    #[serde(default = "default_max_elements")]
    pub max_elements: usize,
    /// Live handles allowed per resource kind.
    #[serde(default = "default_max_handles")]
    pub max_handles: usize,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct SamplingSection {
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct LoggingSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

/// Handle indices occupy the low 32 bits of a handle.
pub const MAX_HANDLES: usize = u32::MAX as usize;

const fn default_max_elements() -> usize {
    1_000_000
}

const fn default_max_handles() -> usize {
    65_536
}

fn default_filter() -> String {
    "info".into()
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            max_elements: default_max_elements(),
            max_handles: default_max_handles(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            enabled: false,
            filter: default_filter(),
            json: false,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_elements == 0 {
            return Err(ConfigError::Validation(
                "max-elements must be greater than zero".into(),
            ));
        }
        if self.limits.max_handles == 0 {
            return Err(ConfigError::Validation(
                "max-handles must be greater than zero".into(),
            ));
        }
        if self.limits.max_handles > MAX_HANDLES {
            return Err(ConfigError::Validation(format!(
                "max-handles must not exceed {MAX_HANDLES}"
            )));
        }
        if self.logging.filter.trim().is_empty() {
            return Err(ConfigError::Validation(
                "logging filter must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Load the file named by `DPKIT_CONFIG`, or defaults when it is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match env::var_os(CONFIG_ENV) {
            Some(path) => load_config(Path::new(&path), ConfigFormat::Auto),
            None => Ok(Self::default()),
        }
    }

    pub fn noise_source(&self) -> NoiseSource {
        NoiseSource::from_seed(self.sampling.seed)
    }

    pub fn sample() -> Self {
        Self {
            sampling: SamplingSection { seed: Some(42) },
            logging: LoggingSection {
                enabled: true,
                filter: "dpkit=debug".into(),
                json: false,
            },
            ..Self::default()
        }
    }
}

pub fn load_config(path: &Path, format: ConfigFormat) -> Result<EngineConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: EngineConfig = parse_str(&contents, resolve_format(path, format))?;
    config.validate()?;
    Ok(config)
}

/// Deserialize `contents` in a resolved (non-`Auto`) format.
pub fn parse_str<T: serde::de::DeserializeOwned>(
    contents: &str,
    format: ConfigFormat,
) -> Result<T, ConfigError> {
    match format {
        ConfigFormat::Yaml => serde_yaml::from_str(contents).map_err(|err| ConfigError::Parse {
            format,
            details: err.to_string(),
        }),
        ConfigFormat::Toml | ConfigFormat::Auto => {
            toml::from_str(contents).map_err(|err| ConfigError::Parse {
                format: ConfigFormat::Toml,
                details: err.to_string(),
            })
        }
    }
}

pub fn resolve_format(path: &Path, format: ConfigFormat) -> ConfigFormat {
    match format {
        ConfigFormat::Auto => match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => ConfigFormat::Toml,
            Some("yaml") | Some("yml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Toml,
        },
        _ => format,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_yields_defaults() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.limits.max_elements, 1_000_000);
        assert_eq!(config.noise_source(), NoiseSource::Entropy);
    }

    #[test]
    fn detects_zero_limits() {
        let mut config = EngineConfig::sample();
        config.limits.max_handles = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn handle_limit_fits_in_the_index_bits() {
        let mut config = EngineConfig::sample();
        config.limits.max_handles = MAX_HANDLES;
        assert!(config.validate().is_ok());
        config.limits.max_handles = MAX_HANDLES + 1;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn parses_toml_config() {
        let contents = r#"
            [limits]
            max-elements = 10

            [sampling]
            seed = 7

            [logging]
            enabled = true
            json = true
        "#;
        let config: EngineConfig = toml::from_str(contents).unwrap();
        assert_eq!(config.limits.max_elements, 10);
        assert_eq!(config.limits.max_handles, 65_536);
        assert_eq!(config.noise_source(), NoiseSource::Seeded(7));
        assert_eq!(config.logging.filter, "info");
        assert!(config.logging.json);
    }

    #[test]
    fn loads_yaml_file_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "limits:\n  max-handles: 16\nlogging:\n  filter: \"dpkit=trace\""
        )
        .unwrap();
        let config = load_config(file.path(), ConfigFormat::Auto).unwrap();
        assert_eq!(config.limits.max_handles, 16);
        assert_eq!(config.logging.filter, "dpkit=trace");
    }

    #[test]
    fn invalid_file_reports_parse_error() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[limits]\nmax-elements = \"many\"").unwrap();
        let err = load_config(file.path(), ConfigFormat::Auto).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Parse {
                format: ConfigFormat::Toml,
                ..
            }
        ));
    }

    #[test]
    fn missing_file_reports_io_error() {
        let err =
            load_config(Path::new("/nonexistent/dpkit.toml"), ConfigFormat::Toml).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
