//! What a session asks the synthesis client for

use crate::behavior::BehaviorKind;
use crate::profile::BehaviorProfile;
use crate::target::TargetDescriptor;
use serde::{Deserialize, Serialize};

/// Session facts forwarded to the provider prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Profile driving the session
    pub profile_name: String,
    /// Profile age bracket
    pub age_group: String,
    /// Profile interests, sorted
    pub interests: Vec<String>,
    /// Phase the session runs in
    pub phase: u32,
    /// Planned action count
    pub planned_actions: usize,
    /// Nominal session length in seconds
    pub session_duration_secs: u64,
    /// Planned rate in requests per minute
    pub intensity_rpm: f64,
}

/// Input to [`BehaviorSynthesisClient::synthesize`](super::BehaviorSynthesisClient::synthesize)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    /// Where the behaviors will be performed
    pub target: TargetDescriptor,
    /// Behavior category the plan should lean towards
    pub behavior_hint: BehaviorKind,
    /// Session facts
    pub context: SessionContext,
}

impl SynthesisRequest {
    /// Request for one session of `profile` against `target`
    pub fn for_session(
        profile: &BehaviorProfile,
        target: &TargetDescriptor,
        phase: u32,
        intensity_rpm: f64,
        planned_actions: usize,
    ) -> Self {
        Self {
            target: target.clone(),
            behavior_hint: profile.primary_kind(),
            context: SessionContext {
                profile_name: profile.name.clone(),
                age_group: profile.age_group.clone(),
                interests: profile.interests.iter().cloned().collect(),
                phase,
                planned_actions,
                session_duration_secs: profile.session_duration_secs,
                intensity_rpm,
            },
        }
    }
}
