//! Interactive chat command handler.

use anyhow::Result;
use mentemappa_core::config::Config;
use mentemappa_core::core::events::{EventSender, create_event_channel};
use mentemappa_core::core::mindmap::{MindMapApp, gemini_session};
use mentemappa_core::export::Exporter;
use mentemappa_core::render::SvgMindMap;

use crate::modes;

pub async fn run(config: &Config) -> Result<()> {
    let renderer = SvgMindMap::new(config.viewport.into());
    let (tx, mut rx) = create_event_channel();
    let mut app =
        MindMapApp::new(gemini_session(config), renderer).with_events(EventSender::new(tx));
    let exporter = Exporter::new(&config.export.out_dir);

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    modes::chat::run_chat(stdin.lock(), &mut stdout, &mut app, &mut rx, &exporter).await
}
