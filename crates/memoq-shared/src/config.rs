//! # Configuration surface
//!
//! Assembles `MemoqConfig` from a TOML file layered with `MEMOQ_`-prefixed
//! environment variables, built on `config::Config` the way most of our
//! services layer per-component TOML + env. Out-of-range values are
//! clamped to a sane default with a warning rather than rejected.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{MemoqError, MemoqResult};

/// Top-level configuration for the memoq process.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoqConfig {
    pub database: DatabaseConfig,
    pub runner: RunnerConfig,
    pub llm: LlmConfig,
    /// Emit JSON-formatted logs (production) instead of pretty (dev).
    pub json_logs: bool,
}

impl Default for MemoqConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            runner: RunnerConfig::default(),
            llm: LlmConfig::default(),
            json_logs: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres connection string. Empty means "use the in-memory task
    /// store", a legal production backend in its own right.
    pub dsn: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dsn: String::new(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub worker_count: i64,
    pub queue_size: usize,
    pub stuck_task_age_seconds: u64,
    pub stuck_check_interval_seconds: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            worker_count: 2,
            queue_size: 100,
            stuck_task_age_seconds: 30 * 60,
            stuck_check_interval_seconds: 5 * 60,
        }
    }
}

impl RunnerConfig {
    /// Worker count clamped to at least 1.
    pub fn clamped_worker_count(&self) -> usize {
        if self.worker_count < 1 {
            tracing::warn!(
                configured = self.worker_count,
                "worker_count < 1, clamping to 1"
            );
            1
        } else {
            self.worker_count as usize
        }
    }

    pub fn stuck_task_age(&self) -> Duration {
        Duration::from_secs(self.stuck_task_age_seconds)
    }

    pub fn stuck_check_interval(&self) -> Duration {
        Duration::from_secs(self.stuck_check_interval_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub max_retries: i64,
    pub base_delay_seconds: i64,
    pub endpoint: String,
    pub model_name: String,
    pub prompt_template_path: String,
    pub api_key: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_seconds: 2,
            endpoint: String::new(),
            model_name: String::new(),
            prompt_template_path: String::new(),
            api_key: String::new(),
        }
    }
}

impl LlmConfig {
    /// Negative `max_retries` is treated as the default of 3.
    pub fn clamped_max_retries(&self) -> u32 {
        if self.max_retries < 0 {
            tracing::warn!(
                configured = self.max_retries,
                "llm.max_retries is negative, treating as default (3)"
            );
            3
        } else {
            self.max_retries as u32
        }
    }

    /// `base_delay < 1s` is treated as the default of 2s.
    pub fn clamped_base_delay(&self) -> Duration {
        if self.base_delay_seconds < 1 {
            tracing::warn!(
                configured = self.base_delay_seconds,
                "llm.base_delay_seconds < 1, treating as default (2)"
            );
            Duration::from_secs(2)
        } else {
            Duration::from_secs(self.base_delay_seconds as u64)
        }
    }

    /// Startup-fatal validation: a prompt template path and API key must be
    /// present for the LLM adapter to function at all.
    pub fn validate(&self) -> MemoqResult<()> {
        if self.prompt_template_path.trim().is_empty() {
            return Err(MemoqError::ConfigurationInvalid(
                "llm.prompt_template_path must be set".to_string(),
            ));
        }
        if self.api_key.trim().is_empty() {
            return Err(MemoqError::ConfigurationInvalid(
                "llm.api_key must be set".to_string(),
            ));
        }
        if self.endpoint.trim().is_empty() {
            return Err(MemoqError::ConfigurationInvalid(
                "llm.endpoint must be set".to_string(),
            ));
        }
        Ok(())
    }
}

impl MemoqConfig {
    /// Load configuration from an optional TOML file, layered with
    /// `MEMOQ_`-prefixed environment variables (e.g. `MEMOQ_LLM__API_KEY`).
    pub fn load(path: Option<&str>) -> MemoqResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("MEMOQ")
                .separator("__")
                .try_parsing(true),
        );
        let raw = builder.build()?;
        let config: MemoqConfig = raw.try_deserialize()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_specification() {
        let cfg = MemoqConfig::default();
        assert_eq!(cfg.runner.clamped_worker_count(), 2);
        assert_eq!(cfg.runner.queue_size, 100);
        assert_eq!(cfg.runner.stuck_task_age(), Duration::from_secs(1800));
        assert_eq!(
            cfg.runner.stuck_check_interval(),
            Duration::from_secs(300)
        );
        assert_eq!(cfg.llm.clamped_max_retries(), 3);
        assert_eq!(cfg.llm.clamped_base_delay(), Duration::from_secs(2));
    }

    #[test]
    fn negative_worker_count_clamps_to_one() {
        let mut runner = RunnerConfig::default();
        runner.worker_count = -5;
        assert_eq!(runner.clamped_worker_count(), 1);
    }

    #[test]
    fn negative_max_retries_clamps_to_three() {
        let mut llm = LlmConfig::default();
        llm.max_retries = -1;
        assert_eq!(llm.clamped_max_retries(), 3);
    }

    #[test]
    fn sub_second_base_delay_clamps_to_two_seconds() {
        let mut llm = LlmConfig::default();
        llm.base_delay_seconds = 0;
        assert_eq!(llm.clamped_base_delay(), Duration::from_secs(2));
    }

    #[test]
    fn validate_rejects_missing_prompt_template() {
        let llm = LlmConfig {
            api_key: "sk-test".to_string(),
            ..LlmConfig::default()
        };
        let err = llm.validate().unwrap_err();
        assert!(matches!(err, MemoqError::ConfigurationInvalid(_)));
    }

    #[test]
    fn validate_rejects_missing_api_key() {
        let llm = LlmConfig {
            prompt_template_path: "templates/cards.tera".to_string(),
            endpoint: "https://example.invalid/v1/complete".to_string(),
            ..LlmConfig::default()
        };
        let err = llm.validate().unwrap_err();
        assert!(matches!(err, MemoqError::ConfigurationInvalid(_)));
    }

    #[test]
    fn validate_rejects_missing_endpoint() {
        let llm = LlmConfig {
            prompt_template_path: "templates/cards.tera".to_string(),
            api_key: "sk-test".to_string(),
            ..LlmConfig::default()
        };
        let err = llm.validate().unwrap_err();
        assert!(matches!(err, MemoqError::ConfigurationInvalid(_)));
    }

    #[test]
    fn validate_accepts_complete_config() {
        let llm = LlmConfig {
            prompt_template_path: "templates/cards.tera".to_string(),
            api_key: "sk-test".to_string(),
            endpoint: "https://example.invalid/v1/complete".to_string(),
            ..LlmConfig::default()
        };
        assert!(llm.validate().is_ok());
    }
}
