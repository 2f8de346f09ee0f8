//! Interactive chat mode.
//!
//! Each input line is one message to the model. Lines starting with `/` are
//! local commands that never reach the model.

use std::io::{BufRead, Write};
use std::pin::pin;

use anyhow::Result;
use mentemappa_core::core::conversation::{EXCHANGE_FAILED_MESSAGE, Role};
use mentemappa_core::core::events::{AppEvent, AppEventRx};
use mentemappa_core::core::mindmap::{ExchangeOutcome, MindMapApp};
use mentemappa_core::core::session::ModelBackend;
use mentemappa_core::export::{ExportFormat, Exporter};
use mentemappa_core::render::{DiagramSnapshot, SvgMindMap, Viewport};

const PROMPT_PREFIX: &str = "you> ";
const MAP_PREFIX: &str = "map> ";

const HELP: &str = "\
Commands:
  /export <md|svg|png>  Save the current map
  /fit                  Re-fit the diagram to the viewport
  /resize <w> <h>       Change the viewport size and re-fit
  /outline              Print the current outline
  /history              Print the conversation
  /help                 Show this help
  /quit                 Exit";

/// A parsed `/` command.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ChatCommand {
    Export(ExportFormat),
    Fit,
    Resize(Viewport),
    Outline,
    History,
    Help,
    Quit,
}

impl ChatCommand {
    fn parse(line: &str) -> Result<Self, String> {
        let mut parts = line.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        match (name, args.as_slice()) {
            ("/export", [format]) => format
                .parse()
                .map(ChatCommand::Export)
                .map_err(|e| format!("{e}")),
            ("/export", _) => Err("Usage: /export <md|svg|png>".to_string()),
            ("/fit", []) => Ok(ChatCommand::Fit),
            ("/resize", [w, h]) => match (w.parse::<u32>(), h.parse::<u32>()) {
                (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok(ChatCommand::Resize(Viewport::new(w, h))),
                _ => Err("Usage: /resize <width> <height> (positive integers)".to_string()),
            },
            ("/resize", _) => Err("Usage: /resize <width> <height>".to_string()),
            ("/outline", []) => Ok(ChatCommand::Outline),
            ("/history", []) => Ok(ChatCommand::History),
            ("/help", _) => Ok(ChatCommand::Help),
            ("/quit" | "/exit", _) => Ok(ChatCommand::Quit),
            _ => Err(format!("Unknown command '{line}'. Type /help for a list.")),
        }
    }
}

/// Runs the chat loop until `/quit` or end of input.
///
/// `events` must receive what `app` publishes; it drives the progress line.
pub async fn run_chat<B, R, W>(
    input: R,
    output: &mut W,
    app: &mut MindMapApp<B, SvgMindMap>,
    events: &mut AppEventRx,
    exporter: &Exporter,
) -> Result<()>
where
    B: ModelBackend,
    R: BufRead,
    W: Write,
{
    writeln!(
        output,
        "Describe a topic to get a mind map, or ask for changes to the current one. /help lists commands."
    )?;
    write!(output, "{PROMPT_PREFIX}")?;
    output.flush()?;

    for line in input.lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.starts_with('/') {
            match ChatCommand::parse(trimmed) {
                Ok(ChatCommand::Quit) => {
                    writeln!(output, "Goodbye!")?;
                    return Ok(());
                }
                Ok(command) => run_command(output, app, exporter, command)?,
                Err(message) => writeln!(output, "{message}")?,
            }
        } else if !trimmed.is_empty() {
            send_message(output, app, events, trimmed).await?;
        }

        write!(output, "{PROMPT_PREFIX}")?;
        output.flush()?;
    }

    writeln!(output)?;
    Ok(())
}

async fn send_message<B, W>(
    output: &mut W,
    app: &mut MindMapApp<B, SvgMindMap>,
    events: &mut AppEventRx,
    text: &str,
) -> Result<()>
where
    B: ModelBackend,
    W: Write,
{
    write!(output, "Generating mind map")?;
    output.flush()?;

    let outcome = {
        let mut send = pin!(app.send(text));
        loop {
            tokio::select! {
                outcome = &mut send => break outcome,
                Some(event) = events.recv() => show_progress(output, &event)?,
            }
        }
    };
    while let Ok(event) = events.try_recv() {
        show_progress(output, &event)?;
    }
    writeln!(output)?;

    match outcome {
        ExchangeOutcome::Completed { reply_id } => {
            let reply = app.conversation().message(reply_id);
            if reply.is_some_and(|m| m.is_outline()) {
                writeln!(output, "{MAP_PREFIX}Mind map generated:")?;
                writeln!(output, "{}", app.current_outline().trim_end())?;
            } else if let Some(reply) = reply {
                writeln!(output, "{MAP_PREFIX}{}", reply.text.trim_end())?;
            }
        }
        ExchangeOutcome::Failed { cause, .. } => {
            writeln!(output, "Error: {EXCHANGE_FAILED_MESSAGE}")?;
            writeln!(output, "  Details: {cause}")?;
        }
        ExchangeOutcome::Ignored => {}
    }
    Ok(())
}

/// One dot per streamed fragment.
fn show_progress<W: Write>(output: &mut W, event: &AppEvent) -> Result<()> {
    if let AppEvent::ReplyUpdated { .. } = event {
        write!(output, ".")?;
        output.flush()?;
    }
    Ok(())
}

fn run_command<B, W>(
    output: &mut W,
    app: &mut MindMapApp<B, SvgMindMap>,
    exporter: &Exporter,
    command: ChatCommand,
) -> Result<()>
where
    B: ModelBackend,
    W: Write,
{
    match command {
        ChatCommand::Export(format) => match app.export(format, exporter) {
            Ok(path) => writeln!(output, "Saved {}", path.display())?,
            Err(e) => writeln!(output, "Error: {e:#}")?,
        },
        ChatCommand::Fit => {
            app.refit();
            let Viewport { width, height } = app.renderer().viewport();
            writeln!(output, "Diagram fitted to {width}x{height}.")?;
        }
        ChatCommand::Resize(viewport) => {
            app.renderer_mut().set_viewport(viewport);
            app.refit();
            writeln!(
                output,
                "Viewport set to {}x{}.",
                viewport.width, viewport.height
            )?;
        }
        ChatCommand::Outline => {
            let outline = app.current_outline();
            if outline.trim().is_empty() {
                writeln!(output, "(no mind map yet)")?;
            } else {
                writeln!(output, "{}", outline.trim_end())?;
            }
        }
        ChatCommand::History => {
            for message in app.conversation().messages() {
                let text = if message.is_outline() {
                    "[mind map]"
                } else {
                    message.text.as_str()
                };
                let speaker = match (message.role, message.is_error) {
                    (_, true) => "error",
                    (Role::User, false) => "you",
                    (Role::Model, false) => "model",
                };
                writeln!(output, "{speaker}: {text}")?;
            }
        }
        ChatCommand::Help => writeln!(output, "{HELP}")?,
        ChatCommand::Quit => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use mentemappa_core::core::conversation::Conversation;

    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(
            ChatCommand::parse("/export png"),
            Ok(ChatCommand::Export(ExportFormat::Png))
        );
        assert_eq!(ChatCommand::parse("/fit"), Ok(ChatCommand::Fit));
        assert_eq!(
            ChatCommand::parse("/resize 800 600"),
            Ok(ChatCommand::Resize(Viewport::new(800, 600)))
        );
        assert_eq!(ChatCommand::parse("/quit"), Ok(ChatCommand::Quit));
        assert_eq!(ChatCommand::parse("/exit"), Ok(ChatCommand::Quit));
    }

    #[test]
    fn progress_prints_one_dot_per_fragment() {
        let mut output = Vec::new();
        let reply_id = Conversation::new().append_placeholder_model_message();
        let updated = AppEvent::ReplyUpdated {
            reply_id,
            text: "# A".to_string(),
            outline: "# A".to_string(),
        };

        show_progress(&mut output, &updated).unwrap();
        show_progress(&mut output, &AppEvent::ExchangeCompleted { reply_id }).unwrap();
        show_progress(&mut output, &updated).unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), "..");
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(ChatCommand::parse("/export").is_err());
        assert!(ChatCommand::parse("/export pdf").is_err());
        assert!(ChatCommand::parse("/resize 0 600").is_err());
        assert!(ChatCommand::parse("/resize wide tall").is_err());
        assert!(ChatCommand::parse("/bogus").unwrap_err().contains("/help"));
    }
}
