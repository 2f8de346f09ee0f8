//! Gemini SSE stream parser.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use eventsource_stream::{EventStream, Eventsource};
use futures_util::Stream;
use serde_json::Value;

use crate::providers::{ProviderError, ProviderErrorKind, ProviderResult, StreamEvent};

/// Gemini SSE stream parser.
///
/// Turns the `data:` payloads of a `streamGenerateContent?alt=sse` response
/// into normalized `StreamEvent`s. Each payload carries only the text produced
/// since the previous one, so every non-thought text part becomes one
/// `TextDelta`.
pub struct GeminiSseParser<S> {
    inner: EventStream<S>,
    pending: VecDeque<StreamEvent>,
    finish_reason: Option<String>,
    emitted_done: bool,
    failed: bool,
}

impl<S> GeminiSseParser<S> {
    pub fn new(stream: S) -> Self
    where
        S: Eventsource,
    {
        Self {
            inner: stream.eventsource(),
            pending: VecDeque::new(),
            finish_reason: None,
            emitted_done: false,
            failed: false,
        }
    }

    fn handle_event_data(&mut self, data: &str) -> ProviderResult<()> {
        let trimmed = data.trim();
        if trimmed.is_empty() || trimmed == "[DONE]" {
            return Ok(());
        }

        let value = serde_json::from_str::<Value>(trimmed).map_err(|err| {
            ProviderError::new(
                ProviderErrorKind::Parse,
                format!("Failed to parse SSE JSON: {err}"),
            )
        })?;
        self.handle_chunk(&value);
        Ok(())
    }

    fn handle_chunk(&mut self, value: &Value) {
        let payload = value.get("response").unwrap_or(value);

        if let Some(error) = value.get("error").or_else(|| payload.get("error")) {
            let error_type = error
                .get("status")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| error.get("code").map(ToString::to_string))
                .unwrap_or_else(|| "error".to_string());
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error")
                .to_string();
            self.pending.push_back(StreamEvent::Error {
                error_type,
                message,
            });
            return;
        }

        let Some(candidate) = payload
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|candidates| candidates.first())
        else {
            return;
        };

        if let Some(parts) = candidate
            .get("content")
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
        {
            let text: String = parts
                .iter()
                .filter(|part| !part.get("thought").and_then(Value::as_bool).unwrap_or(false))
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect();
            if !text.is_empty() {
                self.pending.push_back(StreamEvent::TextDelta { text });
            }
        }

        if let Some(reason) = candidate.get("finishReason").and_then(Value::as_str) {
            self.finish_reason = Some(map_finish_reason(reason));
        }

        if self.finish_reason.is_some() && !self.emitted_done {
            self.emitted_done = true;
            self.pending.push_back(StreamEvent::MessageCompleted {
                stop_reason: self.finish_reason.clone(),
            });
        }
    }
}

impl<S, E> Stream for GeminiSseParser<S>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = ProviderResult<StreamEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if self.failed {
                return Poll::Ready(None);
            }

            let inner = Pin::new(&mut self.inner);
            match inner.poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    if let Err(err) = self.handle_event_data(&event.data) {
                        self.failed = true;
                        return Poll::Ready(Some(Err(err)));
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    self.failed = true;
                    return Poll::Ready(Some(Err(ProviderError::new(
                        ProviderErrorKind::Parse,
                        format!("SSE stream error: {e}"),
                    ))));
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Maps Gemini finish reasons to normalized stop reasons.
pub fn map_finish_reason(reason: &str) -> String {
    match reason {
        "MAX_TOKENS" | "max_tokens" => "max_tokens".to_string(),
        "STOP" | "stop" => "stop".to_string(),
        other => other.to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures_util::{StreamExt, stream};
    use serde_json::json;

    use super::*;

    fn create_test_parser() -> GeminiSseParser<impl Stream<Item = Result<Bytes, std::io::Error>>> {
        GeminiSseParser::new(stream::empty())
    }

    fn parser_over(body: &str) -> GeminiSseParser<impl Stream<Item = Result<Bytes, std::io::Error>>> {
        let chunks: Vec<Result<Bytes, std::io::Error>> =
            vec![Ok(Bytes::from(body.to_string()))];
        GeminiSseParser::new(stream::iter(chunks))
    }

    #[test]
    fn text_parts_become_one_delta_per_chunk() {
        let mut parser = create_test_parser();
        parser.handle_chunk(&json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{ "text": "# Sistema" }, { "text": " Solare\n" }]
                }
            }]
        }));

        assert_eq!(
            parser.pending.pop_front(),
            Some(StreamEvent::TextDelta {
                text: "# Sistema Solare\n".to_string()
            })
        );
        assert!(parser.pending.is_empty());
    }

    #[test]
    fn thought_parts_are_skipped() {
        let mut parser = create_test_parser();
        parser.handle_chunk(&json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "thought": true, "text": "thinking about planets" },
                        { "text": "## Pianeti\n" }
                    ]
                }
            }]
        }));

        assert_eq!(
            parser.pending.pop_front(),
            Some(StreamEvent::TextDelta {
                text: "## Pianeti\n".to_string()
            })
        );
    }

    #[test]
    fn finish_reason_emits_completion_once() {
        let mut parser = create_test_parser();
        let chunk = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "- Venere\n" }] },
                "finishReason": "STOP"
            }]
        });
        parser.handle_chunk(&chunk);
        parser.handle_chunk(&chunk);

        let completions = parser
            .pending
            .iter()
            .filter(|e| matches!(e, StreamEvent::MessageCompleted { .. }))
            .count();
        assert_eq!(completions, 1);
        assert!(parser.pending.contains(&StreamEvent::MessageCompleted {
            stop_reason: Some("stop".to_string())
        }));
    }

    #[test]
    fn error_payload_becomes_error_event() {
        let mut parser = create_test_parser();
        parser.handle_chunk(&json!({
            "error": { "code": 503, "message": "The model is overloaded.", "status": "UNAVAILABLE" }
        }));

        assert_eq!(
            parser.pending.pop_front(),
            Some(StreamEvent::Error {
                error_type: "UNAVAILABLE".to_string(),
                message: "The model is overloaded.".to_string(),
            })
        );
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        let mut parser = create_test_parser();
        let err = parser.handle_event_data("{not json").unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Parse);
    }

    #[test]
    fn map_finish_reason_normalizes() {
        assert_eq!(map_finish_reason("MAX_TOKENS"), "max_tokens");
        assert_eq!(map_finish_reason("STOP"), "stop");
        assert_eq!(map_finish_reason("SAFETY"), "safety");
    }

    #[tokio::test]
    async fn parses_a_full_sse_body() {
        let body = concat!(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"# A\\n\"}]}}]}\n\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"## B\\n\"}]},\"finishReason\":\"STOP\"}]}\n\n",
        );
        let events: Vec<_> = parser_over(body).collect().await;

        assert_eq!(
            events.into_iter().map(Result::unwrap).collect::<Vec<_>>(),
            vec![
                StreamEvent::TextDelta {
                    text: "# A\n".to_string()
                },
                StreamEvent::TextDelta {
                    text: "## B\n".to_string()
                },
                StreamEvent::MessageCompleted {
                    stop_reason: Some("stop".to_string())
                },
            ]
        );
    }

    #[tokio::test]
    async fn parse_error_ends_the_stream() {
        let body = "data: {oops\n\ndata: {\"candidates\":[]}\n\n";
        let events: Vec<_> = parser_over(body).collect().await;

        assert_eq!(events.len(), 1);
        assert!(events[0].is_err());
    }
}
