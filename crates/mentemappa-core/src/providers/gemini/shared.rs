//! Gemini request building and error classification.

use serde_json::{Value, json};

use crate::providers::{ChatMessage, ChatRole, ProviderError, ProviderErrorKind};

/// Generation parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f64,
    pub max_output_tokens: Option<u32>,
}

/// Classifies a reqwest error into a `ProviderError`.
pub fn classify_reqwest_error(e: &reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::timeout(format!("Request timed out: {e}"))
    } else if e.is_connect() {
        ProviderError::timeout(format!("Connection failed: {e}"))
    } else if e.is_request() {
        ProviderError::new(ProviderErrorKind::HttpStatus, format!("Request error: {e}"))
    } else {
        ProviderError::new(ProviderErrorKind::HttpStatus, format!("Network error: {e}"))
    }
}

/// Builds Gemini-format contents array from chat messages.
///
/// Consecutive messages with the same role are merged into one content entry,
/// Gemini rejects two adjacent turns from the same speaker.
pub fn build_contents(messages: &[ChatMessage]) -> Vec<Value> {
    let mut contents: Vec<Value> = Vec::with_capacity(messages.len());
    let mut last_role: Option<ChatRole> = None;

    for msg in messages {
        if msg.text.is_empty() {
            continue;
        }
        let part = json!({ "text": msg.text });
        if last_role == Some(msg.role)
            && let Some(parts) = contents
                .last_mut()
                .and_then(|c| c.get_mut("parts"))
                .and_then(Value::as_array_mut)
        {
            parts.push(part);
            continue;
        }
        contents.push(json!({
            "role": role_name(msg.role),
            "parts": [part],
        }));
        last_role = Some(msg.role);
    }

    contents
}

fn role_name(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "user",
        ChatRole::Model => "model",
    }
}

/// Builds a `streamGenerateContent` request body.
pub fn build_gemini_request(
    messages: &[ChatMessage],
    system: Option<&str>,
    params: GenerationParams,
) -> Value {
    let mut request = json!({
        "contents": build_contents(messages),
    });

    if let Some(prompt) = system
        && !prompt.trim().is_empty()
    {
        request["system_instruction"] = json!({
            "parts": [{"text": prompt}]
        });
    }

    let mut generation_config = json!({
        "temperature": params.temperature,
    });
    if let Some(max) = params.max_output_tokens
        && max > 0
    {
        generation_config["maxOutputTokens"] = json!(max);
    }
    request["generationConfig"] = generation_config;

    request
}
