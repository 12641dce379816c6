//! Configuration loading and defaults.
//!
//! Configuration is persisted as TOML at `$XDG_CONFIG_HOME/per-ankh/config.toml`
//! (falling back to `~/.config`). Every field has a default, so a missing file
//! or a partial file both work. Secrets never live in the file itself: the
//! config names environment variables and the values are read at startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::graph::EndpointConfig;
use crate::llm::{LlmConfig, ModelRef};
use crate::pipeline::PipelineOptions;
use crate::prompt::PromptSet;
use crate::repair::DEFAULT_MAX_RETRIES;

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnkhConfig {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub graph: GraphSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub prompts: PromptSection,
}

/// Completion backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSection {
    /// Base URL of an OpenAI-compatible chat completions API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key, if the
    /// backend needs one. The key itself is never written to disk.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Model used for query generation and repair.
    #[serde(default = "default_model")]
    pub query_model: String,
    /// Model used for answer synthesis.
    #[serde(default = "default_model")]
    pub answer_model: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

/// SPARQL endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSection {
    /// SPARQL endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Basic-auth username, if the endpoint requires one.
    #[serde(default)]
    pub username: Option<String>,
    /// Name of the environment variable holding the basic-auth password.
    #[serde(default)]
    pub password_env: Option<String>,
    /// Per-query timeout in seconds.
    #[serde(default = "default_graph_timeout_secs")]
    pub timeout_secs: u64,
}

/// Question-answering pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Repair rounds allowed after the initial execution.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Stop early when a repair round returns the failed query unchanged.
    #[serde(default)]
    pub stop_on_repeat: bool,
    /// Wall-clock budget for one question in seconds. Unset means unbounded.
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

/// Prompt template overrides. Unset fields keep the built-in templates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptSection {
    #[serde(default)]
    pub generation: Option<String>,
    #[serde(default)]
    pub repair: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:11434/v1".into()
}
fn default_model() -> String {
    "llama3.2".into()
}
fn default_llm_timeout_secs() -> u64 {
    120
}
fn default_endpoint() -> String {
    "http://localhost:7200/repositories/imkg".into()
}
fn default_graph_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> usize {
    DEFAULT_MAX_RETRIES
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: None,
            query_model: default_model(),
            answer_model: default_model(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl Default for GraphSection {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            username: None,
            password_env: None,
            timeout_secs: default_graph_timeout_secs(),
        }
    }
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            stop_on_repeat: false,
            deadline_secs: None,
        }
    }
}

impl AnkhConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// `$XDG_CONFIG_HOME/per-ankh/config.toml`, falling back to `~/.config`.
    pub fn default_path() -> ConfigResult<PathBuf> {
        let config_dir = match std::env::var("XDG_CONFIG_HOME") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => {
                let home = std::env::var("HOME")
                    .map(PathBuf::from)
                    .map_err(|_| ConfigError::NoHome)?;
                home.join(".config")
            }
        };
        Ok(config_dir.join("per-ankh").join("config.toml"))
    }

    /// Load an explicit path, or the default path if it exists, or defaults.
    ///
    /// An explicit path must exist; the default path is optional.
    pub fn load_or_default(explicit: Option<&Path>) -> ConfigResult<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let path = Self::default_path()?;
                if path.exists() {
                    Self::load(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Prompt templates with config overrides applied.
    pub fn prompt_set(&self) -> PromptSet {
        let mut prompts = PromptSet::default();
        if let Some(generation) = &self.prompts.generation {
            prompts.generation = generation.clone();
        }
        if let Some(repair) = &self.prompts.repair {
            prompts.repair = repair.clone();
        }
        if let Some(answer) = &self.prompts.answer {
            prompts.answer = answer.clone();
        }
        prompts
    }

    /// Completion client settings.
    pub fn llm_config(&self) -> LlmConfig {
        LlmConfig {
            base_url: self.llm.base_url.clone(),
            api_key_env: self.llm.api_key_env.clone(),
            timeout_secs: self.llm.timeout_secs,
        }
    }

    /// Endpoint settings, resolving the password from the environment.
    pub fn endpoint_config(&self) -> ConfigResult<EndpointConfig> {
        let password = match &self.graph.password_env {
            Some(env) => Some(
                std::env::var(env).map_err(|_| ConfigError::MissingEnv { env: env.clone() })?,
            ),
            None => None,
        };
        Ok(EndpointConfig {
            url: self.graph.endpoint.clone(),
            username: self.graph.username.clone(),
            password,
            timeout_secs: self.graph.timeout_secs,
        })
    }

    /// Pipeline knobs.
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            query_model: ModelRef::new(&self.llm.query_model),
            answer_model: ModelRef::new(&self.llm.answer_model),
            max_retries: self.pipeline.max_retries,
            stop_on_repeat: self.pipeline.stop_on_repeat,
            deadline: self.pipeline.deadline_secs.map(Duration::from_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config: AnkhConfig = toml::from_str("").unwrap();
        assert_eq!(config.llm.base_url, "http://localhost:11434/v1");
        assert_eq!(config.graph.endpoint, "http://localhost:7200/repositories/imkg");
        assert_eq!(config.pipeline.max_retries, DEFAULT_MAX_RETRIES);
        assert!(config.pipeline.deadline_secs.is_none());
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: AnkhConfig = toml::from_str(
            r#"
            [llm]
            query_model = "mistral"

            [pipeline]
            max_retries = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.llm.query_model, "mistral");
        assert_eq!(config.llm.answer_model, "llama3.2");
        assert_eq!(config.pipeline.max_retries, 5);
        assert!(!config.pipeline.stop_on_repeat);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AnkhConfig::default();
        config.llm.query_model = "qwen2.5".into();
        config.graph.username = Some("reader".into());
        config.pipeline.deadline_secs = Some(90);
        config.save(&path).unwrap();

        let loaded = AnkhConfig::load(&path).unwrap();
        assert_eq!(loaded.llm.query_model, "qwen2.5");
        assert_eq!(loaded.graph.username.as_deref(), Some("reader"));
        assert_eq!(loaded.pipeline.deadline_secs, Some(90));
    }

    #[test]
    fn explicit_path_must_exist() {
        let missing = Path::new("/nonexistent/config.toml");
        assert!(AnkhConfig::load_or_default(Some(missing)).is_err());
    }

    #[test]
    fn prompt_overrides_apply() {
        let mut config = AnkhConfig::default();
        config.prompts.repair = Some("fix {{query}}".into());
        let prompts = config.prompt_set();
        assert_eq!(prompts.repair, "fix {{query}}");
        assert_ne!(prompts.repair, PromptSet::default().repair);
        assert_eq!(prompts.answer, PromptSet::default().answer);
    }

    #[test]
    fn unset_password_env_is_an_error() {
        let mut config = AnkhConfig::default();
        config.graph.password_env = Some("ANKH_TEST_PASSWORD_THAT_IS_NEVER_SET".into());
        let err = config.endpoint_config().unwrap_err();
        assert!(err.to_string().contains("ANKH_TEST_PASSWORD_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn pipeline_options_carry_models_and_deadline() {
        let mut config = AnkhConfig::default();
        config.llm.answer_model = "phi4".into();
        config.pipeline.deadline_secs = Some(30);

        let options = config.pipeline_options();
        assert_eq!(options.answer_model.as_str(), "phi4");
        assert_eq!(options.deadline, Some(Duration::from_secs(30)));
    }

    #[test]
    fn default_path_is_under_config_dir() {
        if let Ok(path) = AnkhConfig::default_path() {
            assert!(path.ends_with("per-ankh/config.toml"));
        }
    }
}
