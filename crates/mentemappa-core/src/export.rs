//! Export of the current map to files.
//!
//! Three formats: the sanitized outline as Markdown, the diagram as SVG and
//! the diagram rasterized to PNG at twice its on-screen size.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, bail};

use crate::images::rasterize_svg_to_png;
use crate::render::DiagramSnapshot;

pub const OUTLINE_FILE_NAME: &str = "mappa_mentale.md";
pub const SVG_FILE_NAME: &str = "mappa_mentale.svg";
pub const PNG_FILE_NAME: &str = "mappa_mentale.png";

/// Pixel-density multiplier for raster exports.
pub const RASTER_SCALE: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Outline,
    Svg,
    Png,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Outline, ExportFormat::Svg, ExportFormat::Png];

    pub fn file_name(self) -> &'static str {
        match self {
            ExportFormat::Outline => OUTLINE_FILE_NAME,
            ExportFormat::Svg => SVG_FILE_NAME,
            ExportFormat::Png => PNG_FILE_NAME,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Outline => write!(f, "md"),
            ExportFormat::Svg => write!(f, "svg"),
            ExportFormat::Png => write!(f, "png"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "md" | "markdown" => Ok(ExportFormat::Outline),
            "svg" => Ok(ExportFormat::Svg),
            "png" => Ok(ExportFormat::Png),
            other => bail!("Unknown export format '{other}' (expected md, svg or png)"),
        }
    }
}

/// Writes `mappa_mentale.*` files into one directory.
#[derive(Debug, Clone)]
pub struct Exporter {
    out_dir: PathBuf,
}

impl Exporter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Exports the map in `format` and returns the written path.
    ///
    /// `diagram` must already be fitted to its viewport; raster exports
    /// capture it as is.
    ///
    /// # Errors
    /// Returns an error if there is no outline yet, no diagram to capture,
    /// rasterization fails, or the file cannot be written.
    pub fn export(
        &self,
        format: ExportFormat,
        outline: &str,
        diagram: &dyn DiagramSnapshot,
    ) -> Result<PathBuf> {
        if outline.trim().is_empty() {
            bail!("Nothing to export: no mind map has been generated yet");
        }

        let bytes = match format {
            ExportFormat::Outline => outline.as_bytes().to_vec(),
            ExportFormat::Svg => current_svg(diagram)?.into_bytes(),
            ExportFormat::Png => {
                let svg = current_svg(diagram)?;
                let png = rasterize_svg_to_png(&svg, RASTER_SCALE)
                    .map_err(anyhow::Error::msg)
                    .context("Failed to rasterize mind map")?;
                png.png_bytes
            }
        };

        let path = self.out_dir.join(format.file_name());
        write_atomic(&path, &bytes)?;
        tracing::info!(%format, path = %path.display(), bytes = bytes.len(), "exported mind map");
        Ok(path)
    }
}

fn current_svg(diagram: &dyn DiagramSnapshot) -> Result<String> {
    diagram
        .svg_markup()
        .context("Nothing to export: the diagram has not been drawn yet")
}

/// Writes through a sibling temp file and renames it into place.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, bytes)
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| {
        format!(
            "Failed to rename {} to {}",
            tmp_path.display(),
            path.display()
        )
    })?;
    Ok(())
}
