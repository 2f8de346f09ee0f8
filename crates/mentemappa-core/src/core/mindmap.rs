//! Mind-map send handler.
//!
//! Wires one user message through the pipeline: session exchange, outline
//! accumulation, conversation store and renderer. Every failure inside an
//! exchange ends up as a single error entry in the transcript; nothing is
//! propagated to the caller.

use std::ops::{Deref, DerefMut};
use std::path::PathBuf;

use anyhow::Result;
use futures_util::StreamExt;

use super::conversation::{Conversation, EXCHANGE_FAILED_MESSAGE, MessageId};
use super::events::{AppEvent, EventSender};
use super::outline::OutlineAccumulator;
use super::session::{LazySession, ModelBackend, SessionSettings};
use crate::config::Config;
use crate::export::{ExportFormat, Exporter};
use crate::providers::gemini::shared::GenerationParams;
use crate::providers::gemini::{GeminiClient, GeminiConfig};
use crate::render::{DiagramSnapshot, OutlineRenderer};

/// How a call to [`MindMapApp::send`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// Blank input, or another exchange was still running. Nothing changed.
    Ignored,
    /// The reply streamed to the end.
    Completed { reply_id: MessageId },
    /// The exchange failed and `error_id` was appended to the transcript.
    Failed { error_id: MessageId, cause: String },
}

/// Builds a session handle that connects to Gemini on first use.
///
/// Key and base URL come from `config` with the usual environment fallbacks,
/// resolved at connect time.
pub fn gemini_session(config: &Config) -> LazySession<GeminiClient> {
    let api_key = config.gemini.api_key.clone();
    let base_url = config.gemini.base_url.clone();

    LazySession::new(config.session_settings(), move |settings: &SessionSettings| {
        let params = GenerationParams {
            temperature: settings.temperature,
            max_output_tokens: settings.max_output_tokens,
        };
        let gemini = GeminiConfig::from_env(
            settings.model.clone(),
            params,
            base_url.as_deref(),
            api_key.as_deref(),
        )?;
        Ok(GeminiClient::new(gemini))
    })
}

/// Conversation, session and diagram of one mind-map chat.
pub struct MindMapApp<B, R> {
    session: LazySession<B>,
    conversation: Conversation,
    renderer: R,
    events: Option<EventSender>,
}

impl<B: ModelBackend, R: OutlineRenderer> MindMapApp<B, R> {
    pub fn new(session: LazySession<B>, renderer: R) -> Self {
        Self {
            session,
            conversation: Conversation::new(),
            renderer,
            events: None,
        }
    }

    /// Publishes progress to `events` while exchanges run.
    #[must_use]
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Sends one user message and streams the reply into the conversation
    /// and the diagram.
    ///
    /// Dropping the returned future mid-exchange still clears the loading
    /// flag, so the next send is accepted.
    pub async fn send(&mut self, text: &str) -> ExchangeOutcome {
        if text.trim().is_empty() || self.conversation.is_loading() {
            return ExchangeOutcome::Ignored;
        }

        let user_id = self.conversation.append_user_message(text);
        let mut conversation = LoadingGuard::start(&mut self.conversation);
        let reply_id = conversation.append_placeholder_model_message();
        if let Some(events) = &self.events {
            events
                .send_important(AppEvent::ExchangeStarted { user_id, reply_id })
                .await;
        }

        let result = stream_reply(
            &mut self.session,
            &mut conversation,
            &mut self.renderer,
            self.events.as_ref(),
            text,
            reply_id,
        )
        .await;
        drop(conversation);

        match result {
            Ok(()) => {
                if let Some(events) = &self.events {
                    events
                        .send_important(AppEvent::ExchangeCompleted { reply_id })
                        .await;
                }
                ExchangeOutcome::Completed { reply_id }
            }
            Err(err) => {
                let cause = format!("{err:#}");
                tracing::error!(error = %cause, "mind map generation failed");
                let error_id = self.conversation.append_error_message(EXCHANGE_FAILED_MESSAGE);
                if let Some(events) = &self.events {
                    events
                        .send_important(AppEvent::ExchangeFailed {
                            error_id,
                            cause: cause.clone(),
                        })
                        .await;
                }
                ExchangeOutcome::Failed { error_id, cause }
            }
        }
    }

    /// Re-fits the diagram; the layout is settled on return.
    pub fn refit(&mut self) {
        self.renderer.refit();
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn current_outline(&self) -> &str {
        self.conversation.current_outline()
    }

    pub fn is_loading(&self) -> bool {
        self.conversation.is_loading()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn session(&self) -> &LazySession<B> {
        &self.session
    }
}

async fn stream_reply<B: ModelBackend>(
    session: &mut LazySession<B>,
    conversation: &mut Conversation,
    renderer: &mut impl OutlineRenderer,
    events: Option<&EventSender>,
    text: &str,
    reply_id: MessageId,
) -> Result<()> {
    let session = session.get()?;
    let mut exchange = session.send(text).await?;
    let mut accumulator = OutlineAccumulator::new();
    let mut fragments = 0usize;

    while let Some(fragment) = exchange.next().await {
        let fragment = fragment?;
        fragments += 1;

        accumulator.push(&fragment);
        let outline = accumulator.outline();
        conversation.update_model_message(reply_id, accumulator.raw());
        conversation.set_current_outline(outline);
        renderer.render_or_update(outline);

        if let Some(events) = events {
            events.send_delta(AppEvent::ReplyUpdated {
                reply_id,
                text: accumulator.raw().to_string(),
                outline: outline.to_string(),
            });
        }
    }

    tracing::debug!(
        fragments,
        bytes = accumulator.raw().len(),
        "mind map reply finished"
    );
    Ok(())
}

/// Holds the conversation in the loading state until dropped.
struct LoadingGuard<'a> {
    conversation: &'a mut Conversation,
}

impl<'a> LoadingGuard<'a> {
    fn start(conversation: &'a mut Conversation) -> Self {
        conversation.set_loading(true);
        Self { conversation }
    }
}

impl Deref for LoadingGuard<'_> {
    type Target = Conversation;

    fn deref(&self) -> &Conversation {
        self.conversation
    }
}

impl DerefMut for LoadingGuard<'_> {
    fn deref_mut(&mut self) -> &mut Conversation {
        self.conversation
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.conversation.set_loading(false);
    }
}

impl<B: ModelBackend, R: OutlineRenderer + DiagramSnapshot> MindMapApp<B, R> {
    /// Writes the current map in `format` and returns the file path.
    ///
    /// # Errors
    /// Returns an error if there is no map yet or the file cannot be written.
    pub fn export(&mut self, format: ExportFormat, exporter: &Exporter) -> Result<PathBuf> {
        self.renderer.refit();
        exporter.export(format, self.conversation.current_outline(), &self.renderer)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::core::conversation::Role;
    use crate::core::events::create_event_channel;
    use crate::core::session::testing::{Script, ScriptedBackend};
    use crate::providers::ChatMessage;
    use crate::render::{SvgMindMap, Viewport};

    /// Renderer that records every outline it is handed.
    #[derive(Default)]
    struct RecordingRenderer {
        rendered: Vec<String>,
        refits: usize,
    }

    impl OutlineRenderer for RecordingRenderer {
        fn render_or_update(&mut self, outline: &str) {
            self.rendered.push(outline.to_string());
        }

        fn refit(&mut self) {
            self.refits += 1;
        }
    }

    fn app_with<R: OutlineRenderer>(
        scripts: Vec<Script>,
        renderer: R,
    ) -> (MindMapApp<ScriptedBackend, R>, ScriptedBackend) {
        let backend = ScriptedBackend::new(scripts);
        let connect = backend.clone();
        let session = LazySession::new(SessionSettings::default(), move |_| Ok(connect.clone()));
        (MindMapApp::new(session, renderer), backend)
    }

    #[tokio::test]
    async fn solar_system_exchange() {
        let (mut app, _) = app_with(
            vec![Script::reply(&[
                "```markdown\n# Sistema",
                " Solare\n## Pianeti\n- Mercurio\n",
                "- Venere\n```",
            ])],
            RecordingRenderer::default(),
        );

        let outcome = app.send("Sistema Solare").await;

        let ExchangeOutcome::Completed { reply_id } = outcome else {
            panic!("expected completion, got {outcome:?}");
        };
        let messages = app.conversation().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].text, "Sistema Solare");
        assert_eq!(messages[1].id, reply_id);
        assert_eq!(
            messages[1].text,
            "```markdown\n# Sistema Solare\n## Pianeti\n- Mercurio\n- Venere\n```"
        );
        assert_eq!(
            app.current_outline(),
            "# Sistema Solare\n## Pianeti\n- Mercurio\n- Venere\n"
        );
        assert!(!app.is_loading());
        assert_eq!(
            app.renderer().rendered,
            vec![
                "# Sistema",
                "# Sistema Solare\n## Pianeti\n- Mercurio\n",
                "# Sistema Solare\n## Pianeti\n- Mercurio\n- Venere\n",
            ]
        );
    }

    #[tokio::test]
    async fn follow_up_carries_previous_map() {
        let (mut app, backend) = app_with(
            vec![
                Script::reply(&["# Sistema Solare\n## Pianeti\n"]),
                Script::reply(&["# Sistema Solare\n## Pianeti\n## Lune\n"]),
            ],
            RecordingRenderer::default(),
        );

        app.send("Sistema Solare").await;
        app.send("aggiungi le lune").await;

        let requests = backend.requests();
        assert_eq!(
            requests[1].0,
            vec![
                ChatMessage::user("Sistema Solare"),
                ChatMessage::model("# Sistema Solare\n## Pianeti\n"),
                ChatMessage::user("aggiungi le lune"),
            ]
        );
        assert_eq!(app.current_outline(), "# Sistema Solare\n## Pianeti\n## Lune\n");
        assert_eq!(app.conversation().messages().len(), 4);
    }

    #[tokio::test]
    async fn mid_stream_failure_appends_one_error() {
        let (mut app, _) = app_with(
            vec![Script::broken(&["# Sistema Solare\n## Pia"])],
            RecordingRenderer::default(),
        );

        let outcome = app.send("Sistema Solare").await;

        let ExchangeOutcome::Failed { error_id, cause } = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(cause.contains("connection reset"));
        let messages = app.conversation().messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].text, "# Sistema Solare\n## Pia");
        assert_eq!(messages[2].id, error_id);
        assert!(messages[2].is_error);
        assert_eq!(messages[2].text, EXCHANGE_FAILED_MESSAGE);
        assert_eq!(messages.iter().filter(|m| m.is_error).count(), 1);
        assert!(!app.is_loading());
        assert_eq!(app.current_outline(), "# Sistema Solare\n## Pia");
    }

    #[tokio::test]
    async fn connect_failure_is_reported_and_retried() {
        let attempts = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = std::sync::Arc::clone(&attempts);
        let backend = ScriptedBackend::new([Script::reply(&["# A\n"])]);
        let session = LazySession::new(SessionSettings::default(), move |_| {
            if counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                anyhow::bail!("No API key available. Set GEMINI_API_KEY or api_key in [gemini].");
            }
            Ok(backend.clone())
        });
        let mut app = MindMapApp::new(session, RecordingRenderer::default());

        let outcome = app.send("A").await;
        assert!(matches!(&outcome, ExchangeOutcome::Failed { cause, .. } if cause.contains("GEMINI_API_KEY")));
        assert!(!app.is_loading());
        assert!(app.renderer().rendered.is_empty());

        let outcome = app.send("A").await;
        assert!(matches!(outcome, ExchangeOutcome::Completed { .. }));
        assert_eq!(app.current_outline(), "# A\n");
    }

    #[tokio::test]
    async fn open_failure_is_one_error_entry() {
        let (mut app, _) = app_with(
            vec![Script::OpenFailure("HTTP 400: API key not valid".to_string())],
            RecordingRenderer::default(),
        );

        let outcome = app.send("x").await;
        assert!(matches!(outcome, ExchangeOutcome::Failed { .. }));
        assert_eq!(app.conversation().messages().iter().filter(|m| m.is_error).count(), 1);
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let (mut app, backend) = app_with(vec![], RecordingRenderer::default());

        assert_eq!(app.send("").await, ExchangeOutcome::Ignored);
        assert_eq!(app.send("   \n\t").await, ExchangeOutcome::Ignored);
        assert!(app.conversation().messages().is_empty());
        assert!(backend.requests().is_empty());
        assert!(!app.session().is_connected());
    }

    #[tokio::test]
    async fn send_while_loading_is_ignored() {
        let (mut app, backend) = app_with(vec![], RecordingRenderer::default());
        app.conversation.set_loading(true);

        assert_eq!(app.send("Sistema Solare").await, ExchangeOutcome::Ignored);
        assert!(app.conversation().messages().is_empty());
        assert!(backend.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_exchange_releases_loading() {
        let (mut app, _) = app_with(
            vec![
                Script::stalled(&["# Sistema Solare\n"]),
                Script::reply(&["# Pianeti\n"]),
            ],
            RecordingRenderer::default(),
        );

        let timed_out =
            tokio::time::timeout(std::time::Duration::from_millis(50), app.send("A")).await;
        assert!(timed_out.is_err());
        assert!(!app.is_loading());
        assert_eq!(app.current_outline(), "# Sistema Solare\n");

        let outcome = app.send("B").await;
        assert!(matches!(outcome, ExchangeOutcome::Completed { .. }));
        assert_eq!(app.current_outline(), "# Pianeti\n");
    }

    #[tokio::test]
    async fn events_follow_the_exchange() {
        let (tx, mut rx) = create_event_channel();
        let (app, _) = app_with(
            vec![Script::reply(&["# A\n", "## B\n"])],
            RecordingRenderer::default(),
        );
        let mut app = app.with_events(EventSender::new(tx));

        app.send("A").await;
        drop(app);

        let mut kinds = Vec::new();
        while let Some(event) = rx.recv().await {
            kinds.push(match &*event {
                AppEvent::ExchangeStarted { .. } => "started",
                AppEvent::ReplyUpdated { .. } => "updated",
                AppEvent::ExchangeCompleted { .. } => "completed",
                AppEvent::ExchangeFailed { .. } => "failed",
            });
        }
        assert_eq!(kinds, vec!["started", "updated", "updated", "completed"]);
    }

    #[tokio::test]
    async fn export_after_exchange() {
        let dir = tempdir().unwrap();
        let (mut app, _) = app_with(
            vec![Script::reply(&["# Sistema Solare\n## Pianeti\n"])],
            SvgMindMap::new(Viewport::new(640, 400)),
        );
        let exporter = Exporter::new(dir.path());

        assert!(app.export(ExportFormat::Outline, &exporter).is_err());

        app.send("Sistema Solare").await;
        let md = app.export(ExportFormat::Outline, &exporter).unwrap();
        let svg = app.export(ExportFormat::Svg, &exporter).unwrap();
        let png = app.export(ExportFormat::Png, &exporter).unwrap();

        assert_eq!(
            std::fs::read_to_string(md).unwrap(),
            "# Sistema Solare\n## Pianeti\n"
        );
        assert!(std::fs::read_to_string(svg).unwrap().contains(">Pianeti</text>"));
        let image = image::open(png).unwrap();
        assert_eq!((image.width(), image.height()), (1280, 800));
    }

    #[tokio::test]
    async fn refit_reaches_renderer() {
        let (mut app, _) = app_with(vec![], RecordingRenderer::default());
        app.refit();
        app.renderer_mut().refits += 1;
        assert_eq!(app.renderer().refits, 2);
    }
}
