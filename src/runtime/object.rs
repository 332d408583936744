//! Schema-constrained object output
//!
//! Object mode reuses the text primitive: the call carries the schema in
//! `OutputMode::Object` plus a JSON-only system hint, and the returned text is
//! parsed (with a light repair pass) and validated here.

use serde_json::Value;

use crate::error::LlmError;
use crate::types::{ChatMessage, MessageRole, OutputMode};

/// A compiled JSON schema for object generation.
pub struct ObjectSchema {
    schema: Value,
    name: Option<String>,
    validator: jsonschema::Validator,
}

impl ObjectSchema {
    pub fn compile(schema: Value, name: Option<String>) -> Result<Self, LlmError> {
        let validator = jsonschema::validator_for(&schema)
            .map_err(|e| LlmError::InvalidParameter(format!("Invalid JSON Schema: {e}")))?;
        Ok(Self {
            schema,
            name,
            validator,
        })
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    pub fn output_mode(&self) -> OutputMode {
        OutputMode::Object {
            schema: self.schema.clone(),
            name: self.name.clone(),
        }
    }

    /// System hint asking for a single JSON value matching the schema.
    pub fn instruction(&self) -> ChatMessage {
        ChatMessage::system(format!(
            "Respond only with a single JSON value that matches this JSON Schema, \
             without code fences or commentary:\n{}",
            self.schema
        ))
    }

    /// Prepend the JSON-only hint unless the conversation already opens with it.
    pub fn constrain(&self, messages: &mut Vec<ChatMessage>) {
        let hint = self.instruction();
        let present = messages
            .first()
            .is_some_and(|m| m.role == MessageRole::System && m.content == hint.content);
        if !present {
            messages.insert(0, hint);
        }
    }

    /// Parse model text into a value and validate it against the schema.
    pub fn parse(&self, text: &str) -> Result<Value, LlmError> {
        let value = match serde_json::from_str::<Value>(text.trim()) {
            Ok(v) => v,
            Err(first) => repair_json_text(text)
                .and_then(|fixed| serde_json::from_str::<Value>(&fixed).ok())
                .ok_or_else(|| LlmError::ParseError(format!("Failed to parse JSON: {first}")))?,
        };
        self.validate(&value)?;
        Ok(value)
    }

    pub fn validate(&self, value: &Value) -> Result<(), LlmError> {
        if self.validator.is_valid(value) {
            return Ok(());
        }
        let msgs: Vec<String> = self
            .validator
            .iter_errors(value)
            .take(3)
            .map(|err| format!("{} at {}", err, err.instance_path))
            .collect();
        Err(LlmError::ParseError(format!(
            "Object does not match schema: {}",
            msgs.join("; ")
        )))
    }
}

/// Strip code fences, cut to the first balanced JSON block and drop trailing commas.
pub fn repair_json_text(text: &str) -> Option<String> {
    let mut s = text.trim();
    if s.starts_with("```") {
        s = s.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
    }
    if let Some(idx) = s.rfind("```") {
        s = &s[..idx];
    }
    balanced_json_slice(s).map(strip_trailing_commas)
}

/// First balanced `{...}` or `[...]` block, ignoring brackets inside strings.
pub fn balanced_json_slice(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let mut depth = 0i32;
    let mut in_str = false;
    let mut escape = false;
    for (i, c) in text[start..].char_indices() {
        if in_str {
            match c {
                _ if escape => escape = false,
                '\\' => escape = true,
                '"' => in_str = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_str = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth -= 1;
                if depth == 0 {
                    return text.get(start..=start + i);
                }
            }
            _ => {}
        }
    }
    None
}

fn strip_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_str = false;
    let mut escape = false;
    for (i, &c) in chars.iter().enumerate() {
        if in_str {
            match c {
                _ if escape => escape = false,
                '\\' => escape = true,
                '"' => in_str = false,
                _ => {}
            }
        } else if c == '"' {
            in_str = true;
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}
