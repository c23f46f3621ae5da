//! Targets and the actions sent to them

use crate::behavior::{BehaviorKind, BehaviorPattern};
use crate::config::ConfigError;
use serde::{Deserialize, Serialize};

/// An endpoint that sessions send traffic to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    /// Display name
    pub name: String,
    /// Base URL, without a trailing path
    pub base_url: String,
    /// Relative pages visited in rotation when a pattern names no path
    #[serde(default)]
    pub pages: Vec<String>,
}

impl TargetDescriptor {
    /// Create a target with no extra pages
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            pages: Vec::new(),
        }
    }

    /// Add a page to the rotation
    pub fn with_page(mut self, page: impl Into<String>) -> Self {
        self.pages.push(page.into());
        self
    }

    /// Page for the `index`-th action of a session
    ///
    /// The landing page (`""`) comes first, then the configured pages in order.
    pub fn page_for(&self, index: usize) -> &str {
        let slots = self.pages.len() + 1;
        match index % slots {
            0 => "",
            n => &self.pages[n - 1],
        }
    }

    /// Absolute URL for a relative `path`
    pub fn resolve(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{}/{}", base, path)
        }
    }

    /// Validate the target
    pub fn validate(&self) -> Result<(), ConfigError> {
        let scheme_ok =
            self.base_url.starts_with("http://") || self.base_url.starts_with("https://");
        if !scheme_ok {
            return Err(ConfigError::InvalidTarget {
                name: self.name.clone(),
                reason: format!("base URL must be http(s): {}", self.base_url),
            });
        }
        Ok(())
    }
}

/// One action handed to the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    /// Behavior category
    pub kind: BehaviorKind,
    /// Human-readable action description
    pub action: String,
    /// Element the action addresses, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_element: Option<String>,
    /// Page path relative to the target's base URL
    pub path: String,
    /// Free-form parameters from the pattern
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

impl ActionSpec {
    /// Build the `index`-th action of a session from a pattern
    ///
    /// A string `path` parameter wins over the target's page rotation.
    pub fn from_pattern(pattern: &BehaviorPattern, target: &TargetDescriptor, index: usize) -> Self {
        let path = pattern
            .parameters
            .get("path")
            .and_then(|v| v.as_str())
            .unwrap_or_else(|| target.page_for(index))
            .to_string();
        Self {
            kind: pattern.kind,
            action: pattern.action.clone(),
            target_element: pattern.target_element.clone(),
            path,
            parameters: pattern.parameters.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_rotation() {
        let target = TargetDescriptor::new("t", "https://example.test")
            .with_page("games")
            .with_page("news");
        assert_eq!(target.page_for(0), "");
        assert_eq!(target.page_for(1), "games");
        assert_eq!(target.page_for(2), "news");
        assert_eq!(target.page_for(3), "");
    }

    #[test]
    fn test_resolve_joins_slashes() {
        let target = TargetDescriptor::new("t", "https://example.test/");
        assert_eq!(target.resolve(""), "https://example.test");
        assert_eq!(target.resolve("/games"), "https://example.test/games");
        assert_eq!(target.resolve("a/b"), "https://example.test/a/b");
    }

    #[test]
    fn test_validate_scheme() {
        assert!(TargetDescriptor::new("t", "https://x").validate().is_ok());
        assert!(TargetDescriptor::new("t", "ftp://x").validate().is_err());
    }

    #[test]
    fn test_action_prefers_pattern_path() {
        let target = TargetDescriptor::new("t", "https://x").with_page("games");
        let mut pattern = BehaviorPattern::synthetic(BehaviorKind::Search, "search for news");
        pattern
            .parameters
            .insert("path".into(), serde_json::json!("search"));
        let action = ActionSpec::from_pattern(&pattern, &target, 1);
        assert_eq!(action.path, "search");
        assert_eq!(action.kind, BehaviorKind::Search);

        let plain = BehaviorPattern::synthetic(BehaviorKind::Browsing, "browse");
        let action = ActionSpec::from_pattern(&plain, &target, 1);
        assert_eq!(action.path, "games");
    }
}
