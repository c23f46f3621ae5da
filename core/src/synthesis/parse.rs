//! Turning provider replies into behavior patterns
//!
//! Parsing is strict about structure and lenient about vocabulary: a reply
//! without a `behaviors` list, or an entry missing `type` or `action`, fails
//! the whole reply; an unknown `type` string maps to the default category.

use crate::behavior::{clamp_confidence, BehaviorKind, BehaviorPattern};
use crate::provider::ProviderKind;
use crate::traits::ProviderError;
use chrono::Utc;
use serde_json::{Map, Value};

/// Extract patterns from a raw provider reply
pub(crate) fn parse_reply(
    kind: ProviderKind,
    reply: &Value,
) -> Result<Vec<BehaviorPattern>, ProviderError> {
    let content = unwrap_envelope(kind, reply)?;
    parse_behaviors(&content)
}

/// Locate the structured content inside a provider envelope
///
/// A reply that already carries a top-level `behaviors` key is taken as is.
pub(crate) fn unwrap_envelope(kind: ProviderKind, reply: &Value) -> Result<Value, ProviderError> {
    if reply.get("behaviors").is_some() {
        return Ok(reply.clone());
    }

    let content = match kind {
        ProviderKind::OpenAiCompatible => reply.pointer("/choices/0/message/content"),
        ProviderKind::Anthropic => reply.pointer("/content/0/text"),
    }
    .ok_or_else(|| ProviderError::Malformed(format!("no content in {} reply", kind)))?;

    match content {
        Value::String(text) => serde_json::from_str(strip_fences(text))
            .map_err(|e| ProviderError::Malformed(format!("content is not JSON: {}", e))),
        Value::Object(_) => Ok(content.clone()),
        other => Err(ProviderError::Malformed(format!(
            "unexpected content type: {}",
            type_name(other)
        ))),
    }
}

/// Strip a surrounding Markdown code fence, if any
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.strip_prefix("json").unwrap_or(rest);
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Parse the `behaviors` list of a structured reply
pub(crate) fn parse_behaviors(content: &Value) -> Result<Vec<BehaviorPattern>, ProviderError> {
    let entries = content
        .get("behaviors")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::Malformed("missing behaviors list".into()))?;

    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| parse_entry(entry).map_err(|reason| {
            ProviderError::Malformed(format!("behavior {}: {}", i, reason))
        }))
        .collect()
}

fn parse_entry(entry: &Value) -> Result<BehaviorPattern, String> {
    let obj = entry.as_object().ok_or("not an object")?;

    let raw_kind = required_str(obj, "type")?;
    let action = required_str(obj, "action")?;

    let kind = BehaviorKind::recognize(raw_kind).unwrap_or_else(|| {
        tracing::debug!(raw = raw_kind, "Unknown behavior type, using default");
        BehaviorKind::DEFAULT
    });

    let target_element = match obj.get("target_element") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => return Err(format!("target_element is {}", type_name(other))),
    };

    let parameters = match obj.get("parameters") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(other) => return Err(format!("parameters is {}", type_name(other))),
    };

    let confidence = match obj.get("confidence") {
        None | Some(Value::Null) => 1.0,
        Some(value) => value
            .as_f64()
            .ok_or_else(|| format!("confidence is {}", type_name(value)))?,
    };

    let reasoning = obj
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(BehaviorPattern {
        kind,
        target_element,
        action: action.to_string(),
        parameters,
        confidence: clamp_confidence(confidence),
        reasoning,
        generated_at: Utc::now(),
    })
}

fn required_str<'a>(obj: &'a Map<String, Value>, key: &str) -> Result<&'a str, String> {
    match obj.get(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(format!("{} is {}", key, type_name(other))),
        None => Err(format!("missing {}", key)),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
