//! Streaming session client.
//!
//! A `ChatSession` is one long-lived conversation with the remote model:
//! fixed preamble, fixed temperature, growing history. Each `send` performs
//! one exchange and hands back an `Exchange`, a finite stream of text
//! fragments in arrival order.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use anyhow::Result;
use futures_util::Stream;

use crate::prompts::MINDMAP_SYSTEM_PROMPT;
use crate::providers::gemini::GeminiClient;
use crate::providers::{ChatMessage, ProviderError, ProviderResult, ProviderStream, StreamEvent};

pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Behavioral settings fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub model: String,
    pub temperature: f64,
    pub system_prompt: String,
    pub max_output_tokens: Option<u32>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            system_prompt: MINDMAP_SYSTEM_PROMPT.trim().to_string(),
            max_output_tokens: None,
        }
    }
}

/// Remote text-generation service as seen by a session.
pub trait ModelBackend {
    /// Opens one streamed reply to `history` (whose last entry is the new
    /// user message).
    fn stream_reply(
        &self,
        history: &[ChatMessage],
        system: &str,
    ) -> impl Future<Output = Result<ProviderStream>> + Send;
}

impl ModelBackend for GeminiClient {
    async fn stream_reply(&self, history: &[ChatMessage], system: &str) -> Result<ProviderStream> {
        self.send_messages_stream(history, Some(system)).await
    }
}

/// An open conversation with the remote model.
pub struct ChatSession<B> {
    backend: B,
    settings: SessionSettings,
    history: Vec<ChatMessage>,
}

impl<B: ModelBackend> ChatSession<B> {
    pub fn new(backend: B, settings: SessionSettings) -> Self {
        Self {
            backend,
            settings,
            history: Vec::new(),
        }
    }

    /// Sends one user message and returns its reply fragments.
    ///
    /// The history only grows once the returned exchange completes; a failed
    /// exchange leaves it as it was.
    ///
    /// # Errors
    /// Returns an error if the request cannot be opened.
    pub async fn send(&mut self, message: &str) -> Result<Exchange<'_>> {
        let mut request = self.history.clone();
        request.push(ChatMessage::user(message));

        let events = self
            .backend
            .stream_reply(&request, &self.settings.system_prompt)
            .await?;

        Ok(Exchange {
            events,
            history: &mut self.history,
            prompt: message.to_string(),
            reply: String::new(),
            finished: false,
        })
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }
}

/// Reply fragments for one exchange.
///
/// Yields non-empty text fragments until the remote side signals completion.
/// A transport or service failure is yielded once as `Err`, after which the
/// stream ends. Not restartable.
pub struct Exchange<'a> {
    events: ProviderStream,
    history: &'a mut Vec<ChatMessage>,
    prompt: String,
    reply: String,
    finished: bool,
}

impl Exchange<'_> {
    /// Text received so far.
    pub fn reply(&self) -> &str {
        &self.reply
    }

    fn commit(&mut self) {
        self.finished = true;
        self.history.push(ChatMessage::user(std::mem::take(&mut self.prompt)));
        self.history.push(ChatMessage::model(self.reply.clone()));
    }

    fn fail(&mut self, err: ProviderError) -> Poll<Option<ProviderResult<String>>> {
        self.finished = true;
        Poll::Ready(Some(Err(err)))
    }
}

impl Stream for Exchange<'_> {
    type Item = ProviderResult<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        loop {
            match this.events.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(StreamEvent::TextDelta { text }))) => {
                    if text.is_empty() {
                        continue;
                    }
                    this.reply.push_str(&text);
                    return Poll::Ready(Some(Ok(text)));
                }
                Poll::Ready(Some(Ok(StreamEvent::MessageCompleted { stop_reason }))) => {
                    tracing::debug!(?stop_reason, bytes = this.reply.len(), "exchange completed");
                    this.commit();
                    return Poll::Ready(None);
                }
                Poll::Ready(Some(Ok(StreamEvent::Error {
                    error_type,
                    message,
                }))) => {
                    return this.fail(ProviderError::api_error(&error_type, &message));
                }
                Poll::Ready(Some(Err(err))) => return this.fail(err),
                Poll::Ready(None) => {
                    this.commit();
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

type Connector<B> = Box<dyn Fn(&SessionSettings) -> Result<B> + Send + Sync>;

/// Session handle that connects on first use.
///
/// Owned by whoever issues requests. The connector runs on the first `get`;
/// its failure is returned and nothing is cached, so the next call tries
/// again. Once connected, the same session serves every later exchange.
pub struct LazySession<B> {
    connector: Connector<B>,
    settings: SessionSettings,
    session: Option<ChatSession<B>>,
}

impl<B: ModelBackend> LazySession<B> {
    pub fn new(
        settings: SessionSettings,
        connector: impl Fn(&SessionSettings) -> Result<B> + Send + Sync + 'static,
    ) -> Self {
        Self {
            connector: Box::new(connector),
            settings,
            session: None,
        }
    }

    /// Returns the session, connecting first if needed.
    ///
    /// # Errors
    /// Returns the connector's error (e.g. a missing API key).
    pub fn get(&mut self) -> Result<&mut ChatSession<B>> {
        if self.session.is_none() {
            let backend = (self.connector)(&self.settings)?;
            tracing::info!(model = %self.settings.model, "session opened");
            self.session = Some(ChatSession::new(backend, self.settings.clone()));
        }
        self.session
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("session unavailable"))
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }
}
