//! Configuration schema for testsynth.
//!
//! Every field has a default, so an empty or missing file is a valid
//! configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, MAX_SOURCE_CHARS};
use crate::language::Language;
use crate::store::StoreKind;
use crate::synthesis::{FanOut, Framework, DEFAULT_THROW_THRESHOLD};

/// Config file names searched in the working directory, in order.
pub const CONFIG_FILE_NAMES: &[&str] = &["testsynth.yaml", ".testsynth.yaml"];

/// Commented default configuration written by `testsynth init`.
pub const DEFAULT_CONFIG_YAML: &str = include_str!("templates/default.yaml");

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub coverage: CoverageConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AnalysisConfig {
    /// Maximum source length in characters (capped at 1,000,000)
    #[serde(default = "default_max_source_chars")]
    pub max_source_chars: usize,
    /// Accepted languages (default: all)
    #[serde(default = "default_languages")]
    pub languages: Vec<Language>,
    /// Always re-analyze, ignoring cached results
    #[serde(default)]
    pub force: bool,
    /// Skip grammar-aware parsing
    #[serde(default)]
    pub heuristic_only: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_source_chars: default_max_source_chars(),
            languages: default_languages(),
            force: false,
            heuristic_only: false,
        }
    }
}

fn default_max_source_chars() -> usize {
    MAX_SOURCE_CHARS
}

fn default_languages() -> Vec<Language> {
    Language::ALL.to_vec()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SynthesisConfig {
    /// Framework per language, overriding the language default
    #[serde(default)]
    pub frameworks: BTreeMap<Language, Framework>,
    /// Generator calls in flight at once (default: 4)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Per-target generator timeout in seconds (default: 30)
    #[serde(default = "default_target_timeout")]
    pub target_timeout_secs: u64,
    /// Distinct call targets above which a function is an integration target
    #[serde(default = "default_function_fan_out")]
    pub function_fan_out: usize,
    /// Same, for the union over a class's methods
    #[serde(default = "default_class_fan_out")]
    pub class_fan_out: usize,
    /// Complexity above which a thrown-error template test is added
    #[serde(default = "default_throw_threshold")]
    pub throw_threshold: u32,
    /// Upper bound on generated tests per target
    #[serde(default = "default_max_tests")]
    pub max_tests_per_target: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            frameworks: BTreeMap::new(),
            concurrency: default_concurrency(),
            target_timeout_secs: default_target_timeout(),
            function_fan_out: default_function_fan_out(),
            class_fan_out: default_class_fan_out(),
            throw_threshold: default_throw_threshold(),
            max_tests_per_target: default_max_tests(),
        }
    }
}

impl SynthesisConfig {
    pub fn fan_out(&self) -> FanOut {
        FanOut {
            function: self.function_fan_out,
            class: self.class_fan_out,
        }
    }

    pub fn target_timeout(&self) -> Duration {
        Duration::from_secs(self.target_timeout_secs)
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_target_timeout() -> u64 {
    30
}

fn default_function_fan_out() -> usize {
    FanOut::default().function
}

fn default_class_fan_out() -> usize {
    FanOut::default().class
}

fn default_throw_threshold() -> u32 {
    DEFAULT_THROW_THRESHOLD
}

fn default_max_tests() -> usize {
    5
}

/// Sliding-window limit on generator calls per pipeline run.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_calls")]
    pub max_calls: usize,
    #[serde(default = "default_window")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls: default_max_calls(),
            window_secs: default_window(),
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

fn default_max_calls() -> usize {
    60
}

fn default_window() -> u64 {
    60
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GeneratorConfig {
    /// Whether to call the test body generator (default: false)
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Environment variable holding the bearer token
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// HTTP request timeout in seconds (default: 20)
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            model: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_request_timeout(),
        }
    }
}

impl GeneratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_api_key_env() -> String {
    "TESTSYNTH_API_KEY".to_string()
}

fn default_request_timeout() -> u64 {
    20
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CoverageConfig {
    /// Fixed seed for the simulation (default: derived from the inputs)
    #[serde(default)]
    pub seed: Option<u64>,
    /// Share of a target's lines an error-handling test reaches
    #[serde(default = "default_error_path_line_rate")]
    pub error_path_line_rate: f64,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            seed: None,
            error_path_line_rate: default_error_path_line_rate(),
        }
    }
}

fn default_error_path_line_rate() -> f64 {
    crate::coverage::DEFAULT_ERROR_PATH_LINE_RATE
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,
    /// Directory for the file store (default: the user cache directory)
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Per-call store timeout in seconds (default: 10)
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            directory: None,
            timeout_secs: default_store_timeout(),
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_store_timeout() -> u64 {
    10
}

impl Config {
    /// Parse a config from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse_str(&content, &path.display().to_string())
    }

    fn parse_str(content: &str, origin: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    /// Load `explicit` if given, otherwise the first discovered file, or
    /// defaults when none exists. The result is validated.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => discover(),
        };
        let config = match &path {
            Some(p) => Self::parse_file(p)?,
            None => Self::default(),
        };
        validate(&config)?;
        Ok((config, path))
    }
}

/// Find a config file: the working directory first, then the user config
/// directory.
pub fn discover() -> Option<PathBuf> {
    for name in CONFIG_FILE_NAMES {
        let path = PathBuf::from(name);
        if path.exists() {
            return Some(path);
        }
    }
    directories::ProjectDirs::from("", "", "testsynth")
        .map(|dirs| dirs.config_dir().join("config.yaml"))
        .filter(|p| p.exists())
}

/// Validate a config for correctness.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    let invalid = |field: &'static str, reason: String| ConfigError::Invalid { field, reason };

    if config.analysis.max_source_chars == 0 {
        return Err(invalid("analysis.max_source_chars", "must be greater than 0".to_string()));
    }
    if config.analysis.languages.is_empty() {
        return Err(invalid("analysis.languages", "at least one language is required".to_string()));
    }

    let synthesis = &config.synthesis;
    if synthesis.concurrency == 0 || synthesis.concurrency > 64 {
        return Err(invalid(
            "synthesis.concurrency",
            format!("{} is outside 1..=64", synthesis.concurrency),
        ));
    }
    if synthesis.target_timeout_secs == 0 {
        return Err(invalid("synthesis.target_timeout_secs", "must be greater than 0".to_string()));
    }
    if synthesis.function_fan_out > 100 || synthesis.class_fan_out > 100 {
        return Err(invalid("synthesis.*_fan_out", "must be at most 100".to_string()));
    }
    if synthesis.throw_threshold > 100 {
        return Err(invalid("synthesis.throw_threshold", "must be at most 100".to_string()));
    }
    for (language, framework) in &synthesis.frameworks {
        if !framework.supports(*language) {
            return Err(invalid(
                "synthesis.frameworks",
                format!("{} cannot generate tests for {}", framework, language),
            ));
        }
    }

    if config.rate_limit.max_calls == 0 {
        return Err(invalid("rate_limit.max_calls", "must be greater than 0".to_string()));
    }
    if config.rate_limit.window_secs == 0 {
        return Err(invalid("rate_limit.window_secs", "must be greater than 0".to_string()));
    }

    if config.generator.enabled {
        match config.generator.endpoint.as_deref() {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => {}
            Some(url) => {
                return Err(invalid("generator.endpoint", format!("{:?} is not an http(s) URL", url)));
            }
            None => {
                return Err(invalid(
                    "generator.endpoint",
                    "required when the generator is enabled".to_string(),
                ));
            }
        }
    }
    if config.generator.timeout_secs == 0 {
        return Err(invalid("generator.timeout_secs", "must be greater than 0".to_string()));
    }
    if config.store.timeout_secs == 0 {
        return Err(invalid("store.timeout_secs", "must be greater than 0".to_string()));
    }

    let rate = config.coverage.error_path_line_rate;
    if !(0.0..=1.0).contains(&rate) {
        return Err(invalid("coverage.error_path_line_rate", format!("{} is outside 0..=1", rate)));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let yaml = r#"
synthesis:
  concurrency: 2
  frameworks:
    python: unittest
    typescript: vitest
coverage:
  seed: 42
store:
  kind: file
  directory: /tmp/testsynth
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.synthesis.concurrency, 2);
        assert_eq!(config.synthesis.frameworks.get(&Language::Python), Some(&Framework::Unittest));
        assert_eq!(config.synthesis.throw_threshold, 3);
        assert_eq!(config.coverage.seed, Some(42));
        assert_eq!(config.store.kind, StoreKind::File);
        assert_eq!(config.store.timeout(), Duration::from_secs(10));
        assert_eq!(config.analysis.languages.len(), 6);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_config_is_default() {
        let config = Config::parse_str("  \n", "inline").unwrap();
        assert_eq!(config, Config::default());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_default_template_parses_and_validates() {
        let config = Config::parse_str(DEFAULT_CONFIG_YAML, "default.yaml").unwrap();
        assert!(validate(&config).is_ok());
        assert_eq!(config.rate_limit.max_calls, 60);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.synthesis.concurrency = 0;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Invalid { field: "synthesis.concurrency", .. })
        ));

        let mut config = Config::default();
        config.rate_limit.window_secs = 0;
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.synthesis.frameworks.insert(Language::Java, Framework::Pytest);
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.generator.enabled = true;
        assert!(validate(&config).is_err());
        config.generator.endpoint = Some("https://tests.example.com/generate".to_string());
        assert!(validate(&config).is_ok());

        let mut config = Config::default();
        config.coverage.error_path_line_rate = 1.5;
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.store.timeout_secs = 0;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Invalid { field: "store.timeout_secs", .. })
        ));
    }

    #[test]
    fn test_parse_error_names_the_file() {
        let err = Config::parse_str("synthesis: [", "broken.yaml").unwrap_err();
        assert!(err.to_string().contains("broken.yaml"));
    }
}
