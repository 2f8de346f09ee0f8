//! Image helpers.

pub mod raster;

pub use raster::{RasterizedPng, rasterize_svg_to_png};
