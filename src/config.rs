//! Client-side settings.
//!
//! Defaults are production friendly; every knob can be overridden from the
//! environment (`SELECT_AI_*`) or a YAML document.

use crate::error::{Error, ErrorContext};
use crate::Result;
use serde::Deserialize;
use std::env;
use std::path::Path;

pub const DEFAULT_LOB_CHUNK_SIZE: usize = 64 * 1024;
pub const DEFAULT_LIST_PATTERN: &str = ".*";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SelectAiConfig {
    /// Bytes requested per read when draining a large object.
    pub lob_chunk_size: usize,
    /// Pattern used when `list` is called without one (or with an empty one).
    pub default_list_pattern: String,
    /// Upper-case resource names before binding them into catalogue queries.
    pub normalize_names: bool,
    /// Refuse pipeline submissions larger than this.
    pub max_pipeline_requests: Option<usize>,
}

impl Default for SelectAiConfig {
    fn default() -> Self {
        Self {
            lob_chunk_size: DEFAULT_LOB_CHUNK_SIZE,
            default_list_pattern: DEFAULT_LIST_PATTERN.to_string(),
            normalize_names: true,
            max_pipeline_requests: None,
        }
    }
}

impl SelectAiConfig {
    /// Defaults overlaid with `SELECT_AI_*` environment variables.
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(size) = env::var("SELECT_AI_LOB_CHUNK_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|s| *s > 0)
        {
            self.lob_chunk_size = size;
        }
        if let Ok(pattern) = env::var("SELECT_AI_DEFAULT_LIST_PATTERN") {
            if !pattern.is_empty() {
                self.default_list_pattern = pattern;
            }
        }
        if let Some(normalize) = env::var("SELECT_AI_NORMALIZE_NAMES")
            .ok()
            .and_then(|s| s.parse::<bool>().ok())
        {
            self.normalize_names = normalize;
        }
        if let Some(max) = env::var("SELECT_AI_MAX_PIPELINE_REQUESTS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
        {
            self.max_pipeline_requests = Some(max);
        }
        self
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content).map_err(|e| {
            Error::configuration_with_context(
                "invalid configuration document",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("config.yaml"),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content).map_err(|e| match e {
            Error::Configuration { message, context } => Error::Configuration {
                message,
                context: context.with_field_path(path.display().to_string()),
            },
            other => other,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.lob_chunk_size == 0 {
            return Err(Error::configuration_with_context(
                "lob_chunk_size must be positive",
                ErrorContext::new().with_field_path("lob_chunk_size"),
            ));
        }
        if self.default_list_pattern.is_empty() {
            return Err(Error::configuration_with_context(
                "default_list_pattern must not be empty",
                ErrorContext::new().with_field_path("default_list_pattern"),
            ));
        }
        Ok(())
    }

    /// Pattern actually sent for a `list` call.
    pub fn list_pattern<'a>(&'a self, pattern: Option<&'a str>) -> &'a str {
        match pattern {
            Some(p) if !p.is_empty() => p,
            _ => &self.default_list_pattern,
        }
    }

    /// Name as bound into catalogue queries.
    pub fn normalize_name(&self, name: &str) -> String {
        if self.normalize_names {
            name.to_uppercase()
        } else {
            name.to_string()
        }
    }
}
