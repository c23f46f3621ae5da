//! AI provider descriptors
//!
//! One descriptor per configured provider. The order of the descriptor list
//! is the fallback order used by the synthesis client.

use crate::config::{secs, ConfigError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request/response envelope family spoken by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Chat completions API (OpenAI and compatible servers)
    #[default]
    OpenAiCompatible,
    /// Messages API (Anthropic)
    Anthropic,
}

impl ProviderKind {
    /// Identifier string for this kind
    pub fn id(&self) -> &'static str {
        match self {
            ProviderKind::OpenAiCompatible => "openai_compatible",
            ProviderKind::Anthropic => "anthropic",
        }
    }

    /// Default model when a descriptor lists none
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAiCompatible => "gpt-4",
            ProviderKind::Anthropic => "claude-3-sonnet-20240229",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "openai_compatible" | "openai-compatible" => {
                Ok(ProviderKind::OpenAiCompatible)
            }
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            _ => Err(format!("Unknown provider kind: {}", s)),
        }
    }
}

fn default_rate_limit_per_minute() -> u32 {
    60
}

fn default_timeout_secs() -> f64 {
    30.0
}

/// Static description of one AI provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Unique identifier, also the rate-limiter key
    pub id: String,
    /// Envelope family
    #[serde(default)]
    pub kind: ProviderKind,
    /// Base URL of the provider API
    pub base_endpoint: String,
    /// Models this provider serves; the first one is used
    #[serde(default)]
    pub supported_models: Vec<String>,
    /// Admissions per 60 second window
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,
    /// Name of the environment variable holding the credential
    #[serde(default)]
    pub credential_ref: String,
    /// Per-call timeout, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,
}

impl ProviderDescriptor {
    /// Create a descriptor with default limits
    pub fn new(id: impl Into<String>, kind: ProviderKind, base_endpoint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            base_endpoint: base_endpoint.into(),
            supported_models: Vec::new(),
            rate_limit_per_minute: default_rate_limit_per_minute(),
            credential_ref: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Add a supported model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.supported_models.push(model.into());
        self
    }

    /// Set the per-minute admission limit
    pub fn with_rate_limit(mut self, per_minute: u32) -> Self {
        self.rate_limit_per_minute = per_minute;
        self
    }

    /// Set the credential environment variable
    pub fn with_credential_ref(mut self, name: impl Into<String>) -> Self {
        self.credential_ref = name.into();
        self
    }

    /// Set the per-call timeout
    pub fn with_timeout(mut self, secs: f64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Model used for requests
    pub fn model(&self) -> &str {
        self.supported_models
            .first()
            .map(String::as_str)
            .unwrap_or_else(|| self.kind.default_model())
    }

    /// Per-call timeout
    pub fn timeout(&self) -> Duration {
        secs(self.timeout_secs)
    }

    /// Validate the descriptor
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidProvider {
            id: self.id.clone(),
            reason: reason.to_string(),
        };
        if self.id.trim().is_empty() {
            return Err(invalid("id is empty"));
        }
        if self.base_endpoint.trim().is_empty() {
            return Err(invalid("base endpoint is empty"));
        }
        if self.rate_limit_per_minute == 0 {
            return Err(invalid("rate limit must be at least 1 per minute"));
        }
        if !self.timeout_secs.is_finite() || self.timeout_secs <= 0.0 {
            return Err(invalid("timeout must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str() {
        assert_eq!(
            "openai".parse::<ProviderKind>().unwrap(),
            ProviderKind::OpenAiCompatible
        );
        assert_eq!(
            "Claude".parse::<ProviderKind>().unwrap(),
            ProviderKind::Anthropic
        );
        assert!("bogus".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_model_defaults_per_kind() {
        let d = ProviderDescriptor::new("a", ProviderKind::Anthropic, "https://x");
        assert_eq!(d.model(), "claude-3-sonnet-20240229");
        let d = d.with_model("claude-3-haiku");
        assert_eq!(d.model(), "claude-3-haiku");
    }

    #[test]
    fn test_descriptor_validation() {
        let ok = ProviderDescriptor::new("a", ProviderKind::OpenAiCompatible, "https://x");
        assert!(ok.validate().is_ok());
        assert!(ok.clone().with_rate_limit(0).validate().is_err());
        assert!(ok.clone().with_timeout(-1.0).validate().is_err());
        let mut no_id = ok;
        no_id.id = " ".into();
        assert!(no_id.validate().is_err());
    }

    #[test]
    fn test_descriptor_deserialize_defaults() {
        let d: ProviderDescriptor =
            serde_json::from_str(r#"{ "id": "p", "base_endpoint": "https://api" }"#).unwrap();
        assert_eq!(d.kind, ProviderKind::OpenAiCompatible);
        assert_eq!(d.rate_limit_per_minute, 60);
        assert_eq!(d.timeout(), Duration::from_secs(30));
    }
}
