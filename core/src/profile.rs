//! Behavior profiles and per-session profile selection

use crate::behavior::{BehaviorKind, BehaviorPattern};
use crate::config::ProfileSelection;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A simulated user archetype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorProfile {
    /// Unique name
    pub name: String,
    /// Age bracket, e.g. `"18-25"`
    pub age_group: String,
    /// Topics of interest, forwarded to behavior synthesis
    #[serde(default)]
    pub interests: BTreeSet<String>,
    /// Profile-specific rate multiplier
    pub exponential_factor: f64,
    /// Nominal session length in seconds
    pub session_duration_secs: u64,
    /// Ordered interaction kinds used when no synthesized plan is available
    pub interaction_patterns: Vec<String>,
}

impl BehaviorProfile {
    /// Create a profile
    pub fn new(
        name: impl Into<String>,
        age_group: impl Into<String>,
        exponential_factor: f64,
        session_duration_secs: u64,
    ) -> Self {
        Self {
            name: name.into(),
            age_group: age_group.into(),
            interests: BTreeSet::new(),
            exponential_factor,
            session_duration_secs,
            interaction_patterns: Vec::new(),
        }
    }

    /// Add interests
    pub fn with_interests<I, S>(mut self, interests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interests.extend(interests.into_iter().map(Into::into));
        self
    }

    /// Add interaction patterns, in order
    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interaction_patterns
            .extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Check the profile can drive a session; returns the reason when it cannot
    pub fn check(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("profile name is empty".into());
        }
        if !self.exponential_factor.is_finite() || self.exponential_factor <= 0.0 {
            return Err(format!(
                "exponential factor must be positive, got {}",
                self.exponential_factor
            ));
        }
        if self.session_duration_secs == 0 {
            return Err("session duration is zero".into());
        }
        if self.interaction_patterns.is_empty() {
            return Err("no interaction patterns".into());
        }
        Ok(())
    }

    /// Hint for the synthesis prompt: the profile's leading interaction kind
    pub fn primary_kind(&self) -> BehaviorKind {
        self.interaction_patterns
            .first()
            .map(|p| BehaviorKind::parse_or_default(p))
            .unwrap_or(BehaviorKind::DEFAULT)
    }

    /// Deterministic plan cycling through `interaction_patterns`
    pub fn static_plan(&self, count: usize) -> Vec<BehaviorPattern> {
        self.interaction_patterns
            .iter()
            .cycle()
            .take(count)
            .map(|raw| {
                let kind = BehaviorKind::parse_or_default(raw);
                let mut pattern = BehaviorPattern::synthetic(kind, raw.clone());
                pattern.reasoning = format!("static plan for profile {}", self.name);
                pattern
            })
            .collect()
    }
}

/// Built-in profile table
pub fn default_profiles() -> Vec<BehaviorProfile> {
    vec![
        BehaviorProfile::new("gamer", "18-25", 1.8, 300)
            .with_interests(["gaming", "esports", "technology"])
            .with_patterns(["browsing", "clicking", "scrolling", "form_filling"]),
        BehaviorProfile::new("casual_player", "25-35", 1.3, 180)
            .with_interests(["gaming", "entertainment", "social"])
            .with_patterns(["browsing", "social"]),
        BehaviorProfile::new("competitive_player", "16-24", 2.2, 600)
            .with_interests(["esports", "competitive_gaming", "tournaments"])
            .with_patterns(["browsing", "search", "navigation", "social"]),
        BehaviorProfile::new("streamer", "20-30", 1.6, 450)
            .with_interests(["streaming", "content_creation", "gaming"])
            .with_patterns(["browsing", "scrolling", "social"]),
        BehaviorProfile::new("shopper", "25-45", 1.2, 240)
            .with_interests(["ecommerce", "deals"])
            .with_patterns(["search", "clicking", "ecommerce", "form_filling"]),
    ]
}

/// Hands out profiles to sessions
#[derive(Debug)]
pub struct ProfileSelector {
    profiles: Vec<BehaviorProfile>,
    mode: SelectorMode,
}

#[derive(Debug)]
enum SelectorMode {
    RoundRobin(AtomicUsize),
    Random(Mutex<StdRng>),
}

impl ProfileSelector {
    /// Create a selector over a non-empty table
    ///
    /// Returns `None` when `profiles` is empty.
    pub fn new(profiles: Vec<BehaviorProfile>, selection: ProfileSelection) -> Option<Self> {
        if profiles.is_empty() {
            return None;
        }
        let mode = match selection {
            ProfileSelection::RoundRobin => SelectorMode::RoundRobin(AtomicUsize::new(0)),
            ProfileSelection::Random { seed } => {
                SelectorMode::Random(Mutex::new(StdRng::seed_from_u64(seed)))
            }
        };
        Some(Self { profiles, mode })
    }

    /// Next profile; wraps around the table
    pub fn next(&self) -> &BehaviorProfile {
        let index = match &self.mode {
            SelectorMode::RoundRobin(cursor) => {
                cursor.fetch_add(1, Ordering::Relaxed) % self.profiles.len()
            }
            SelectorMode::Random(rng) => rng.lock().gen_range(0..self.profiles.len()),
        };
        &self.profiles[index]
    }

    /// The `count` next profiles
    pub fn take(&self, count: usize) -> Vec<BehaviorProfile> {
        (0..count).map(|_| self.next().clone()).collect()
    }

    /// The whole table
    pub fn profiles(&self) -> &[BehaviorProfile] {
        &self.profiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profiles_are_valid() {
        let profiles = default_profiles();
        assert!(profiles.len() >= 4);
        for profile in &profiles {
            assert!(profile.check().is_ok(), "{} is invalid", profile.name);
        }
    }

    #[test]
    fn test_check_rejects_malformed() {
        let base = BehaviorProfile::new("p", "18-25", 1.0, 60).with_patterns(["browsing"]);
        assert!(base.check().is_ok());

        let mut bad = base.clone();
        bad.exponential_factor = 0.0;
        assert!(bad.check().is_err());

        let mut bad = base.clone();
        bad.session_duration_secs = 0;
        assert!(bad.check().is_err());

        let mut bad = base;
        bad.interaction_patterns.clear();
        assert!(bad.check().unwrap_err().contains("patterns"));
    }

    #[test]
    fn test_static_plan_cycles() {
        let profile = BehaviorProfile::new("p", "18-25", 1.0, 60)
            .with_patterns(["browsing", "clicking", "teleporting"]);
        let plan = profile.static_plan(7);
        assert_eq!(plan.len(), 7);
        assert_eq!(plan[0].kind, BehaviorKind::Browsing);
        assert_eq!(plan[1].kind, BehaviorKind::Clicking);
        assert_eq!(plan[2].kind, BehaviorKind::Browsing);
        assert_eq!(plan[2].action, "teleporting");
        assert_eq!(plan[3].kind, BehaviorKind::Browsing);
        assert_eq!(plan[4].kind, BehaviorKind::Clicking);
    }

    #[test]
    fn test_round_robin_wraps_with_repetition() {
        let profiles = default_profiles();
        let n = profiles.len();
        let selector = ProfileSelector::new(profiles.clone(), ProfileSelection::RoundRobin).unwrap();
        let picked = selector.take(n + 2);
        assert_eq!(picked.len(), n + 2);
        assert_eq!(picked[0].name, profiles[0].name);
        assert_eq!(picked[n].name, profiles[0].name);
        assert_eq!(picked[n + 1].name, profiles[1].name);
    }

    #[test]
    fn test_random_selection_is_seeded() {
        let a = ProfileSelector::new(default_profiles(), ProfileSelection::Random { seed: 42 })
            .unwrap()
            .take(20);
        let b = ProfileSelector::new(default_profiles(), ProfileSelection::Random { seed: 42 })
            .unwrap()
            .take(20);
        let names_a: Vec<_> = a.iter().map(|p| p.name.clone()).collect();
        let names_b: Vec<_> = b.iter().map(|p| p.name.clone()).collect();
        assert_eq!(names_a, names_b);
    }

    #[test]
    fn test_selector_rejects_empty_table() {
        assert!(ProfileSelector::new(Vec::new(), ProfileSelection::RoundRobin).is_none());
    }

    #[test]
    fn test_primary_kind() {
        let profile = BehaviorProfile::new("p", "18-25", 1.0, 60).with_patterns(["search"]);
        assert_eq!(profile.primary_kind(), BehaviorKind::Search);
    }
}
