//! Bulletpointer turns one annotated SVG into a series of slides.
//!
//! A YAML config lists source SVGs and, for each, an ordered list of layers. A
//! layer hides and shows elements by `id`; every layer is written as its own SVG
//! and converted to a PNG by a [`Rasterizer`].
#![forbid(unsafe_code)]

mod foundation;

pub mod config;
pub mod document;
pub mod process;
pub mod raster;
pub mod style;

pub use foundation::error;

pub use config::{ImageDescriptor, LayerDescriptor, load_config, parse_config};
pub use document::{ElementHandle, SvgDocument};
pub use error::{BulletpointerError, BulletpointerResult};
pub use process::{
    ImageProcessor, LayerOutput, RunOptions, RunSummary, SourceFile, apply_layer, run_config,
};
pub use raster::{
    InkscapeRasterizer, RasterJob, RasterSize, Rasterizer, RecordingRasterizer, ResvgRasterizer,
};
