use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::OrchidError;

/// One structured-output request to the language-model collaborator.
#[derive(Clone, Debug, PartialEq)]
pub struct LlmRequest {
    pub system: String,
    pub user: String,
    /// JSON Schema the reply should conform to, when a typed decision is
    /// expected. `None` means free text.
    pub output_schema: Option<Value>,
    pub temperature: Option<f32>,
}

impl LlmRequest {
    pub fn text(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            output_schema: None,
            temperature: None,
        }
    }

    pub fn structured<T: JsonSchema>(
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            output_schema: Some(output_schema::<T>()),
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LlmReply {
    pub content: String,
}

/// Language-model calling capability. Transport, timeouts, and token
/// accounting live behind this seam; the engine collapses every failure to
/// `OrchidError::DecisionUnavailable`.
#[async_trait]
pub trait LlmCaller: Send + Sync {
    async fn invoke(&self, request: LlmRequest) -> Result<LlmReply, OrchidError>;
}

pub fn output_schema<T: JsonSchema>() -> Value {
    let schema = schemars::gen::SchemaGenerator::default().into_root_schema_for::<T>();
    serde_json::to_value(schema).unwrap_or(Value::Null)
}

/// Tagged outcome of parsing a structured LLM reply. Parsing never panics
/// and never raises; a malformed reply is data, not an exception.
#[derive(Clone, Debug)]
pub enum ParseOutcome<T> {
    Parsed(T),
    Failed { raw: String, reason: String },
}

impl<T> ParseOutcome<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            ParseOutcome::Parsed(value) => Some(value),
            ParseOutcome::Failed { .. } => None,
        }
    }

    pub fn unwrap_or_default(self) -> T
    where
        T: Default,
    {
        self.ok().unwrap_or_default()
    }
}

/// Parse a (possibly chatty) LLM reply into a typed record.
///
/// Strips markdown code fences, then falls back to extracting the last
/// balanced JSON object when the reply wraps the payload in prose.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> ParseOutcome<T> {
    let cleaned = strip_code_fences(raw);
    match serde_json::from_str::<T>(cleaned) {
        Ok(value) => ParseOutcome::Parsed(value),
        Err(first_err) => {
            if let Some(object) = extract_last_object(cleaned) {
                if let Ok(value) = serde_json::from_str::<T>(object) {
                    return ParseOutcome::Parsed(value);
                }
            }
            ParseOutcome::Failed {
                raw: raw.to_string(),
                reason: first_err.to_string(),
            }
        }
    }
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .trim_end()
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

/// Find the last balanced top-level `{ ... }` span, tracking strings and
/// escapes so braces inside string values do not confuse the balance.
fn extract_last_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut start = None;
    let mut last_span = None;
    for (i, &b) in bytes.iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' if depth > 0 => in_string = !in_string,
            b'{' if !in_string => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            b'}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    if let Some(s) = start.take() {
                        last_span = Some((s, i));
                    }
                }
            }
            _ => {}
        }
    }
    last_span.map(|(s, e)| &text[s..=e])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Demo {
        answer: String,
    }

    #[test]
    fn parses_plain_json() {
        let outcome = parse_structured::<Demo>(r#"{"answer": "yes"}"#);
        assert_eq!(outcome.ok().unwrap().answer, "yes");
    }

    #[test]
    fn strips_markdown_fences() {
        let raw = "```json\n{\"answer\": \"fenced\"}\n```";
        assert_eq!(parse_structured::<Demo>(raw).ok().unwrap().answer, "fenced");
    }

    #[test]
    fn recovers_object_from_chatty_reply() {
        let raw = "Sure! Here is the result: {\"answer\": \"buried\"} Hope that helps.";
        assert_eq!(parse_structured::<Demo>(raw).ok().unwrap().answer, "buried");
    }

    #[test]
    fn malformed_reply_is_a_tagged_failure() {
        match parse_structured::<Demo>("not json at all") {
            ParseOutcome::Failed { raw, .. } => assert_eq!(raw, "not json at all"),
            ParseOutcome::Parsed(_) => panic!("should not parse"),
        }
    }
}
