//! SVG rasterization to PNG.

use std::sync::{Arc, LazyLock};

use resvg::tiny_skia::{Color, Pixmap, Transform};
use resvg::usvg::{self, fontdb};

/// System fonts, loaded once per process.
static FONTS: LazyLock<Arc<fontdb::Database>> = LazyLock::new(|| {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    tracing::debug!(faces = db.len(), "loaded system fonts");
    Arc::new(db)
});

/// PNG bytes with the rendered pixel dimensions.
#[derive(Debug, Clone)]
pub struct RasterizedPng {
    pub png_bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Renders an SVG document onto an opaque white canvas, `scale` times its
/// nominal size, and encodes the result as PNG.
///
/// # Errors
/// Returns an error string if the SVG cannot be parsed, the scaled size is
/// empty or too large, or PNG encoding fails.
pub fn rasterize_svg_to_png(svg: &str, scale: f32) -> Result<RasterizedPng, String> {
    let options = usvg::Options {
        fontdb: Arc::clone(&FONTS),
        ..usvg::Options::default()
    };
    let tree = usvg::Tree::from_str(svg, &options).map_err(|e| format!("parse svg: {e}"))?;

    let size = tree
        .size()
        .to_int_size()
        .scale_by(scale)
        .ok_or_else(|| "rasterize: invalid output size".to_string())?;
    let mut pixmap = Pixmap::new(size.width(), size.height())
        .ok_or_else(|| "rasterize: invalid output size".to_string())?;
    pixmap.fill(Color::WHITE);

    resvg::render(&tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    let (width, height) = (pixmap.width(), pixmap.height());
    let png_bytes = encode_opaque_png(pixmap.take(), width, height)?;
    Ok(RasterizedPng {
        png_bytes,
        width,
        height,
    })
}

/// Encodes RGBA pixels of a fully opaque canvas as an RGB PNG.
fn encode_opaque_png(rgba: Vec<u8>, width: u32, height: u32) -> Result<Vec<u8>, String> {
    use image::ImageEncoder as _;
    use image::codecs::png::{CompressionType, FilterType, PngEncoder};

    let rgba = image::RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| "encode: invalid pixel buffer".to_string())?;
    let rgb = image::DynamicImage::ImageRgba8(rgba).to_rgb8();

    let mut buf = Vec::new();
    let encoder =
        PngEncoder::new_with_quality(&mut buf, CompressionType::Default, FilterType::Adaptive);
    encoder
        .write_image(rgb.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .map_err(|e| format!("encode: {e}"))?;
    Ok(buf)
}
