//! Behavior patterns and the stateless validators applied to them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of a simulated interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorKind {
    /// Reading a page
    Browsing,
    /// Clicking an element
    Clicking,
    /// Scrolling through content
    Scrolling,
    /// Filling in a form
    FormFilling,
    /// Following navigation
    Navigation,
    /// Running a search
    Search,
    /// Social interaction (comments, follows)
    Social,
    /// Shopping interaction
    Ecommerce,
}

impl BehaviorKind {
    /// Category used for unrecognized type strings
    pub const DEFAULT: BehaviorKind = BehaviorKind::Browsing;

    /// Identifier string for this kind
    pub fn id(&self) -> &'static str {
        match self {
            BehaviorKind::Browsing => "browsing",
            BehaviorKind::Clicking => "clicking",
            BehaviorKind::Scrolling => "scrolling",
            BehaviorKind::FormFilling => "form_filling",
            BehaviorKind::Navigation => "navigation",
            BehaviorKind::Search => "search",
            BehaviorKind::Social => "social",
            BehaviorKind::Ecommerce => "ecommerce",
        }
    }

    /// All kinds, in declaration order
    pub fn all() -> &'static [BehaviorKind] {
        &[
            BehaviorKind::Browsing,
            BehaviorKind::Clicking,
            BehaviorKind::Scrolling,
            BehaviorKind::FormFilling,
            BehaviorKind::Navigation,
            BehaviorKind::Search,
            BehaviorKind::Social,
            BehaviorKind::Ecommerce,
        ]
    }

    /// Recognize a type string; case, `-` and spaces are normalized
    pub fn recognize(raw: &str) -> Option<BehaviorKind> {
        let normalized = raw.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "browsing" | "browse" => Some(BehaviorKind::Browsing),
            "clicking" | "click" => Some(BehaviorKind::Clicking),
            "scrolling" | "scroll" => Some(BehaviorKind::Scrolling),
            "form_filling" | "form" => Some(BehaviorKind::FormFilling),
            "navigation" | "navigate" => Some(BehaviorKind::Navigation),
            "search" | "searching" => Some(BehaviorKind::Search),
            "social" | "social_engagement" => Some(BehaviorKind::Social),
            "ecommerce" | "e_commerce" | "shopping" => Some(BehaviorKind::Ecommerce),
            _ => None,
        }
    }

    /// Map a type string to a kind, falling back to [`BehaviorKind::DEFAULT`]
    pub fn parse_or_default(raw: &str) -> BehaviorKind {
        Self::recognize(raw).unwrap_or(Self::DEFAULT)
    }
}

impl std::fmt::Display for BehaviorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// One simulated user interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorPattern {
    /// Category
    pub kind: BehaviorKind,
    /// Element selector or description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_element: Option<String>,
    /// What the simulated user does
    pub action: String,
    /// Free-form parameters
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Why the pattern was produced
    #[serde(default)]
    pub reasoning: String,
    /// When the pattern was produced
    pub generated_at: DateTime<Utc>,
}

impl BehaviorPattern {
    /// A full-confidence pattern produced from a static profile
    pub fn synthetic(kind: BehaviorKind, action: impl Into<String>) -> Self {
        Self {
            kind,
            target_element: None,
            action: action.into(),
            parameters: serde_json::Map::new(),
            confidence: 1.0,
            reasoning: "static profile plan".to_string(),
            generated_at: Utc::now(),
        }
    }

    /// Set the confidence, clamped into [0, 1]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_confidence(confidence);
        self
    }
}

/// Clamp a confidence value into [0, 1]; NaN becomes 0
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Keep only patterns whose confidence reaches `threshold`
pub fn retain_confident(patterns: Vec<BehaviorPattern>, threshold: f64) -> Vec<BehaviorPattern> {
    patterns
        .into_iter()
        .filter(|p| {
            let keep = p.confidence >= threshold;
            if !keep {
                tracing::debug!(
                    kind = %p.kind,
                    confidence = p.confidence,
                    threshold,
                    "Dropping low-confidence behavior"
                );
            }
            keep
        })
        .collect()
}

/// Repeat `patterns` in order until `count` entries are produced
pub fn cycle_plan(patterns: &[BehaviorPattern], count: usize) -> Vec<BehaviorPattern> {
    patterns.iter().cycle().take(count).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognize_known_kinds() {
        for kind in BehaviorKind::all() {
            assert_eq!(BehaviorKind::recognize(kind.id()), Some(*kind));
        }
        assert_eq!(
            BehaviorKind::recognize("Form-Filling"),
            Some(BehaviorKind::FormFilling)
        );
        assert_eq!(
            BehaviorKind::recognize(" E-Commerce "),
            Some(BehaviorKind::Ecommerce)
        );
    }

    #[test]
    fn test_unknown_kind_defaults_to_browsing() {
        assert_eq!(BehaviorKind::recognize("teleport"), None);
        assert_eq!(
            BehaviorKind::parse_or_default("teleport"),
            BehaviorKind::Browsing
        );
        assert_eq!(BehaviorKind::parse_or_default(""), BehaviorKind::DEFAULT);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&BehaviorKind::FormFilling).unwrap(),
            "\"form_filling\""
        );
    }

    #[test]
    fn test_retain_confident_boundary() {
        let patterns = vec![
            BehaviorPattern::synthetic(BehaviorKind::Clicking, "a").with_confidence(0.69),
            BehaviorPattern::synthetic(BehaviorKind::Clicking, "b").with_confidence(0.7),
            BehaviorPattern::synthetic(BehaviorKind::Clicking, "c").with_confidence(0.95),
        ];
        let kept = retain_confident(patterns, 0.7);
        let actions: Vec<_> = kept.iter().map(|p| p.action.as_str()).collect();
        assert_eq!(actions, vec!["b", "c"]);
    }

    #[test]
    fn test_clamp_confidence() {
        assert_eq!(clamp_confidence(1.7), 1.0);
        assert_eq!(clamp_confidence(-0.2), 0.0);
        assert_eq!(clamp_confidence(f64::NAN), 0.0);
        assert_eq!(clamp_confidence(0.42), 0.42);
    }

    #[test]
    fn test_cycle_plan() {
        let patterns = vec![
            BehaviorPattern::synthetic(BehaviorKind::Browsing, "a"),
            BehaviorPattern::synthetic(BehaviorKind::Scrolling, "b"),
        ];
        let plan = cycle_plan(&patterns, 5);
        let actions: Vec<_> = plan.iter().map(|p| p.action.as_str()).collect();
        assert_eq!(actions, vec!["a", "b", "a", "b", "a"]);
        assert!(cycle_plan(&[], 3).is_empty());
    }
}
