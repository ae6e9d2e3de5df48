//! Reply extraction and rendering.
//!
//! Backends answer with one of several field names. [`Reply::from_body`]
//! probes them in a fixed priority order and falls back to the raw body, so
//! a successful exchange always yields non-empty text.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::endpoint::EndpointKind;

/// Fields probed for the reply text, highest priority first.
pub const REPLY_FIELDS: [&str; 6] = ["answer", "reply", "response", "explanation", "text", "result"];

const PLACEHOLDER: &str = "<empty response>";

/// Normalized backend answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    /// Main reply text. Never empty.
    pub text: String,
    /// Route that produced the reply.
    pub endpoint: EndpointKind,
    /// Field the text was taken from, `None` when the raw body was used.
    pub source_field: Option<String>,
    /// Ordered fix steps, when the backend provides them.
    #[serde(default)]
    pub steps_to_fix: Vec<String>,
    /// Suggested replacement code.
    #[serde(default)]
    pub corrected_code: Option<String>,
    /// Further reading.
    #[serde(default)]
    pub resources: Vec<String>,
    /// Decoded response body.
    pub raw: Value,
    /// Response body exactly as received.
    #[serde(default)]
    pub body: String,
}

impl Reply {
    /// Build a reply from a successful response body.
    pub fn from_body(endpoint: EndpointKind, body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(raw) => Self {
                body: body.to_string(),
                ..Self::from_json(endpoint, raw)
            },
            Err(_) => {
                let trimmed = body.trim();
                let text = if trimmed.is_empty() {
                    PLACEHOLDER.to_string()
                } else {
                    trimmed.to_string()
                };
                Self {
                    text,
                    endpoint,
                    source_field: None,
                    steps_to_fix: Vec::new(),
                    corrected_code: None,
                    resources: Vec::new(),
                    raw: Value::String(body.to_string()),
                    body: body.to_string(),
                }
            }
        }
    }

    /// Build a reply from decoded JSON.
    pub fn from_json(endpoint: EndpointKind, raw: Value) -> Self {
        let (text, source_field) = match extract_text(&raw) {
            Some((field, text)) => (text, Some(field.to_string())),
            None => (fallback_text(&raw), None),
        };

        let steps_to_fix = raw
            .get("stepsToFix")
            .or_else(|| raw.get("steps_to_fix"))
            .map(string_list)
            .unwrap_or_default();
        let corrected_code = raw
            .get("correctedCode")
            .or_else(|| raw.get("corrected_code"))
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string);
        let resources = raw.get("resources").map(string_list).unwrap_or_default();
        let body = serde_json::to_string(&raw).unwrap_or_default();

        Self {
            text,
            endpoint,
            source_field,
            steps_to_fix,
            corrected_code,
            resources,
            raw,
            body,
        }
    }

    /// Whether the backend sent more than a plain text answer.
    #[must_use]
    pub fn is_structured(&self) -> bool {
        !self.steps_to_fix.is_empty() || self.corrected_code.is_some() || !self.resources.is_empty()
    }

    /// Content mirrored to the history store for this reply.
    ///
    /// Structured replies are stored as the response body byte for byte,
    /// keeping the backend's key order; plain replies are stored as their text.
    #[must_use]
    pub fn transcript_content(&self) -> String {
        if self.is_structured() {
            if self.body.is_empty() {
                serde_json::to_string(&self.raw).unwrap_or_else(|_| self.text.clone())
            } else {
                self.body.clone()
            }
        } else {
            self.text.clone()
        }
    }

    /// Render the reply as user-facing text.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = self.text.clone();

        if !self.steps_to_fix.is_empty() {
            out.push_str("\n\nSteps to fix:");
            for (i, step) in self.steps_to_fix.iter().enumerate() {
                let _ = write!(out, "\n{}. {step}", i + 1);
            }
        }

        if let Some(code) = &self.corrected_code {
            let _ = write!(out, "\n\nCorrected code:\n```\n{}\n```", code.trim_end());
        }

        if !self.resources.is_empty() {
            out.push_str("\n\nResources:");
            for resource in &self.resources {
                let _ = write!(out, "\n- {resource}");
            }
        }

        out
    }
}

fn extract_text(raw: &Value) -> Option<(&'static str, String)> {
    REPLY_FIELDS.iter().find_map(|field| {
        raw.get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(|s| (*field, s.to_string()))
    })
}

fn fallback_text(raw: &Value) -> String {
    match raw {
        Value::Null => PLACEHOLDER.to_string(),
        Value::String(s) if !s.trim().is_empty() => s.clone(),
        Value::String(_) => PLACEHOLDER.to_string(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| PLACEHOLDER.to_string()),
    }
}

/// Accept a string, a list of strings, or a list of `{title, url}` objects.
fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Object(obj) => {
                    let title = obj.get("title").and_then(Value::as_str);
                    let url = obj.get("url").and_then(Value::as_str);
                    match (title, url) {
                        (Some(t), Some(u)) => Some(format!("{t} ({u})")),
                        (Some(t), None) => Some(t.to_string()),
                        (None, Some(u)) => Some(u.to_string()),
                        (None, None) => serde_json::to_string(item).ok(),
                    }
                }
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn probes_fields_in_priority_order() {
        let reply = Reply::from_json(
            EndpointKind::Query,
            json!({"text": "t", "explanation": "e", "reply": "r"}),
        );
        assert_eq!(reply.text, "r");
        assert_eq!(reply.source_field.as_deref(), Some("reply"));

        let reply = Reply::from_json(EndpointKind::Query, json!({"answer": "a", "reply": "r"}));
        assert_eq!(reply.text, "a");
    }

    #[test]
    fn skips_empty_and_non_string_candidates() {
        let reply = Reply::from_json(
            EndpointKind::TutorChat,
            json!({"answer": "", "reply": 42, "response": "from response"}),
        );
        assert_eq!(reply.text, "from response");
    }

    #[test]
    fn falls_back_to_serialized_json() {
        let reply = Reply::from_json(EndpointKind::Query, json!({"status": "ok", "count": 2}));
        assert!(reply.source_field.is_none());
        assert!(reply.text.contains("\"status\""));
        assert!(!reply.text.is_empty());
    }

    #[test]
    fn non_json_body_is_used_verbatim() {
        let reply = Reply::from_body(EndpointKind::Query, "plain words\n");
        assert_eq!(reply.text, "plain words");

        let reply = Reply::from_body(EndpointKind::Query, "   ");
        assert_eq!(reply.text, PLACEHOLDER);

        let reply = Reply::from_body(EndpointKind::Query, "null");
        assert_eq!(reply.text, PLACEHOLDER);
    }

    #[test]
    fn renders_structured_tutor_reply() {
        let reply = Reply::from_json(
            EndpointKind::TutorChat,
            json!({
                "explanation": "Missing colon",
                "stepsToFix": ["Add ':' after the condition", "Re-run"],
                "correctedCode": "if x:\n    pass",
                "resources": [{"title": "Python docs", "url": "https://docs.python.org"}, "PEP 8"]
            }),
        );
        assert!(reply.is_structured());
        let rendered = reply.render();
        assert!(rendered.starts_with("Missing colon"));
        assert!(rendered.contains("1. Add ':' after the condition"));
        assert!(rendered.contains("2. Re-run"));
        assert!(rendered.contains("```\nif x:\n    pass\n```"));
        assert!(rendered.contains("- Python docs (https://docs.python.org)"));
        assert!(rendered.contains("- PEP 8"));
    }

    #[test]
    fn transcript_content_depends_on_structure() {
        let plain = Reply::from_json(EndpointKind::Query, json!({"reply": "hello"}));
        assert_eq!(plain.transcript_content(), "hello");

        let body = json!({"explanation": "e", "correctedCode": "c"});
        let structured = Reply::from_json(EndpointKind::Query, body.clone());
        let stored: Value = serde_json::from_str(&structured.transcript_content()).unwrap();
        assert_eq!(stored, body);
    }

    #[test]
    fn structured_transcript_keeps_wire_key_order() {
        let wire = r#"{"explanation":"Syntax error","correctedCode":"x + 1"}"#;
        let reply = Reply::from_body(EndpointKind::Query, wire);
        assert!(reply.is_structured());
        assert_eq!(reply.transcript_content(), wire);
    }
}
