//! Exec command handler.

use anyhow::{Context, Result};
use mentemappa_core::config;
use mentemappa_core::export::ExportFormat;

use crate::modes;

pub struct ExecRunOptions<'a> {
    pub prompt: &'a str,
    pub config: &'a config::Config,
    pub export: &'a [String],
}

pub async fn run(options: ExecRunOptions<'_>) -> Result<()> {
    let formats = parse_export_formats(options.export)?;

    let exec_opts = modes::exec::ExecOptions {
        formats,
        out_dir: options.config.export.out_dir.clone(),
    };

    modes::exec::run_exec(options.prompt, options.config, &exec_opts)
        .await
        .context("generate mind map")?;

    Ok(())
}

/// Parses `--export` values, dropping blanks and duplicates.
fn parse_export_formats(raw: &[String]) -> Result<Vec<ExportFormat>> {
    let mut formats = Vec::new();
    for value in raw.iter().map(|v| v.trim()).filter(|v| !v.is_empty()) {
        let format: ExportFormat = value.parse()?;
        if !formats.contains(&format) {
            formats.push(format);
        }
    }
    Ok(formats)
}
