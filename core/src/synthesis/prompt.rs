//! Prompt text and provider-specific request payloads

use super::request::SynthesisRequest;
use crate::behavior::BehaviorKind;
use crate::config::SynthesisConfig;
use crate::provider::{ProviderDescriptor, ProviderKind};
use serde_json::{json, Value};

const SYSTEM_PROMPT: &str = "You generate interaction plans for synthetic load tests. \
Reply with a single JSON object and nothing else.";

/// Number of patterns to ask for
pub(crate) fn requested_patterns(request: &SynthesisRequest, config: &SynthesisConfig) -> usize {
    request
        .context
        .planned_actions
        .clamp(1, config.max_patterns_per_request.max(1))
}

/// User prompt describing the session and the required reply shape
pub(crate) fn render(request: &SynthesisRequest, config: &SynthesisConfig) -> String {
    let ctx = &request.context;
    let kinds: Vec<&str> = BehaviorKind::all().iter().map(|k| k.id()).collect();
    let interests = if ctx.interests.is_empty() {
        "none".to_string()
    } else {
        ctx.interests.join(", ")
    };
    let pages = if request.target.pages.is_empty() {
        "(landing page only)".to_string()
    } else {
        request.target.pages.join(", ")
    };

    format!(
        "Target: {name} ({url})\n\
         Known pages: {pages}\n\
         Preferred behavior category: {hint}\n\
         Profile: {profile}, age group {age}, interests: {interests}\n\
         Phase: {phase}, intensity: {rpm:.1} requests/minute, \
         session length: {duration} seconds\n\
         \n\
         Produce {count} behaviors for one session, in the order they should be performed.\n\
         Allowed types: {kinds}.\n\
         Put a relative page in parameters.path when a behavior visits a specific page.\n\
         \n\
         Reply format:\n\
         {{\"behaviors\": [{{\"type\": \"browsing\", \"target_element\": \"nav a.games\", \
         \"action\": \"open the games section\", \"parameters\": {{\"path\": \"games\"}}, \
         \"confidence\": 0.85, \"reasoning\": \"...\"}}]}}",
        name = request.target.name,
        url = request.target.base_url,
        pages = pages,
        hint = request.behavior_hint,
        profile = ctx.profile_name,
        age = ctx.age_group,
        interests = interests,
        phase = ctx.phase,
        rpm = ctx.intensity_rpm,
        duration = ctx.session_duration_secs,
        count = requested_patterns(request, config),
        kinds = kinds.join(", "),
    )
}

/// Request body for `provider`
pub(crate) fn payload(
    provider: &ProviderDescriptor,
    prompt: &str,
    config: &SynthesisConfig,
) -> Value {
    match provider.kind {
        ProviderKind::OpenAiCompatible => json!({
            "model": provider.model(),
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "temperature": config.temperature,
            "max_tokens": config.max_tokens,
            "response_format": { "type": "json_object" },
        }),
        ProviderKind::Anthropic => json!({
            "model": provider.model(),
            "system": SYSTEM_PROMPT,
            "messages": [
                { "role": "user", "content": prompt },
            ],
            "temperature": config.temperature,
            "max_tokens": config.max_tokens,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::default_profiles;
    use crate::target::TargetDescriptor;

    fn request(planned: usize) -> SynthesisRequest {
        let profile = &default_profiles()[0];
        let target = TargetDescriptor::new("shop", "https://shop.test").with_page("deals");
        SynthesisRequest::for_session(profile, &target, 2, 40.5, planned)
    }

    #[test]
    fn test_prompt_mentions_session_facts() {
        let prompt = render(&request(4), &SynthesisConfig::default());
        assert!(prompt.contains("https://shop.test"));
        assert!(prompt.contains("deals"));
        assert!(prompt.contains("Phase: 2"));
        assert!(prompt.contains("Produce 4 behaviors"));
        assert!(prompt.contains("form_filling"));
    }

    #[test]
    fn test_requested_patterns_capped() {
        let config = SynthesisConfig::default();
        assert_eq!(requested_patterns(&request(500), &config), 10);
        assert_eq!(requested_patterns(&request(0), &config), 1);
    }

    #[test]
    fn test_openai_payload_shape() {
        let provider = ProviderDescriptor::new("p", ProviderKind::OpenAiCompatible, "https://api")
            .with_model("gpt-4o-mini");
        let body = payload(&provider, "hi", &SynthesisConfig::default());
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["max_tokens"], 1000);
    }

    #[test]
    fn test_anthropic_payload_shape() {
        let provider = ProviderDescriptor::new("c", ProviderKind::Anthropic, "https://api");
        let body = payload(&provider, "hi", &SynthesisConfig::default());
        assert_eq!(body["model"], "claude-3-sonnet-20240229");
        assert!(body["system"].is_string());
        assert_eq!(body["messages"].as_array().map(Vec::len), Some(1));
        assert!(body.get("response_format").is_none());
    }
}
