//! Single-shot exec mode.
//!
//! Output contract:
//! - the final outline goes to stdout
//! - progress and export paths go to stderr

use std::io::{Write, stderr, stdout};
use std::path::PathBuf;

use anyhow::{Result, bail};
use mentemappa_core::config::Config;
use mentemappa_core::core::events::{AppEvent, AppEventRx, EventSender, create_event_channel};
use mentemappa_core::core::mindmap::{ExchangeOutcome, MindMapApp, gemini_session};
use mentemappa_core::export::{ExportFormat, Exporter};
use mentemappa_core::render::SvgMindMap;
use tokio::task::JoinHandle;

/// Options for exec execution.
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// Files to write once the map is complete.
    pub formats: Vec<ExportFormat>,
    pub out_dir: PathBuf,
}

/// Sends `prompt`, prints the final outline and writes the requested exports.
///
/// Returns the outline.
pub async fn run_exec(prompt: &str, config: &Config, options: &ExecOptions) -> Result<String> {
    let (tx, rx) = create_event_channel();
    let progress = spawn_progress_task(rx);

    let renderer = SvgMindMap::new(config.viewport.into());
    let mut app =
        MindMapApp::new(gemini_session(config), renderer).with_events(EventSender::new(tx));

    let outcome = app.send(prompt).await;
    let outline = app.current_outline().to_string();
    let exporter = Exporter::new(&options.out_dir);

    let exported = match outcome {
        ExchangeOutcome::Completed { .. } => {
            let mut out = stdout();
            write!(out, "{outline}")?;
            if !outline.ends_with('\n') {
                writeln!(out)?;
            }
            out.flush()?;

            options
                .formats
                .iter()
                .map(|&format| app.export(format, &exporter))
                .collect::<Result<Vec<_>>>()
        }
        ExchangeOutcome::Failed { cause, .. } => Err(anyhow::anyhow!(cause)),
        ExchangeOutcome::Ignored => Err(anyhow::anyhow!("Prompt is empty")),
    };

    // Closes the event channel so the progress task can finish.
    drop(app);
    let _ = progress.await;

    for path in exported? {
        let _ = writeln!(stderr(), "Saved {}", path.display());
    }

    if outline.trim().is_empty() {
        bail!("The model returned an empty outline");
    }
    Ok(outline)
}

/// Reports exchange progress on stderr.
fn spawn_progress_task(mut rx: AppEventRx) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut err = stderr();
        let mut fragments = 0usize;
        while let Some(event) = rx.recv().await {
            match &*event {
                AppEvent::ExchangeStarted { .. } => {
                    let _ = write!(err, "Generating mind map...");
                }
                AppEvent::ReplyUpdated { .. } => fragments += 1,
                AppEvent::ExchangeCompleted { .. } => {
                    let _ = writeln!(err, " done ({fragments} fragments).");
                }
                AppEvent::ExchangeFailed { .. } => {
                    let _ = writeln!(err, " failed.");
                }
            }
            let _ = err.flush();
        }
    })
}
