use std::path::{Path, PathBuf};

use crate::{
    config::{ImageDescriptor, LayerDescriptor},
    document::SvgDocument,
    error::{BulletpointerError, BulletpointerResult},
    raster::{RasterJob, RasterSize, Rasterizer},
};

/// Files produced for one layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerOutput {
    pub svg: PathBuf,
    /// Set unless rasterization was skipped.
    pub png: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub images: usize,
    pub outputs: Vec<LayerOutput>,
}

/// A validated source file, split into the parts used to name its outputs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub stem: String,
    /// Extension as written in the file name, without the dot.
    pub extension: String,
}

impl SourceFile {
    /// `stem + suffix + .extension`
    pub fn layer_file_name(&self, suffix: &str) -> String {
        format!("{}{}.{}", self.stem, suffix, self.extension)
    }

    /// `stem + suffix + .png`
    pub fn raster_file_name(&self, suffix: &str) -> String {
        format!("{}{}.png", self.stem, suffix)
    }
}

/// Turns image descriptors into per-layer SVG and PNG files.
#[derive(Clone, Debug)]
pub struct ImageProcessor {
    input_dir: PathBuf,
    output_dir: PathBuf,
    size: RasterSize,
    rasterize: bool,
}

impl ImageProcessor {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            size: RasterSize::default(),
            rasterize: true,
        }
    }

    pub fn with_size(mut self, size: RasterSize) -> Self {
        self.size = size;
        self
    }

    /// Write SVG outputs only; the rasterizer is never called.
    pub fn skip_rasterize(mut self, skip: bool) -> Self {
        self.rasterize = !skip;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn check_output_dir(&self) -> BulletpointerResult<()> {
        match std::fs::metadata(&self.output_dir) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(BulletpointerError::validation(format!(
                "destination should be a directory: '{}'",
                self.output_dir.display()
            ))),
            Err(e) => Err(BulletpointerError::validation(format!(
                "destination dir needs to exist: '{}': {e}",
                self.output_dir.display()
            ))),
        }
    }

    /// Resolve `image.filename` against the input directory and check it is a regular `.svg` file.
    pub fn resolve_source(&self, image: &ImageDescriptor) -> BulletpointerResult<SourceFile> {
        let path = self.input_dir.join(&image.filename);

        let meta = std::fs::metadata(&path).map_err(|e| {
            BulletpointerError::validation(format!(
                "source file needs to exist: '{}': {e}",
                path.display()
            ))
        })?;
        if !meta.is_file() {
            return Err(BulletpointerError::validation(format!(
                "input file is not a regular file: '{}'",
                path.display()
            )));
        }

        // Split on the last dot so `.svg` is accepted with an empty stem.
        let (stem, extension) = path
            .file_name()
            .and_then(|s| s.to_str())
            .and_then(|name| name.rsplit_once('.'))
            .filter(|(_, ext)| ext.eq_ignore_ascii_case("svg"))
            .map(|(stem, ext)| (stem.to_string(), ext.to_string()))
            .ok_or_else(|| {
                BulletpointerError::validation(format!(
                    "expected .svg file but got '{}'",
                    path.display()
                ))
            })?;

        Ok(SourceFile {
            path,
            stem,
            extension,
        })
    }

    /// Process every image in order, stopping at the first error.
    ///
    /// All sources are resolved before anything is written, so a missing or
    /// mistyped source leaves the output directory untouched.
    pub fn process_all(
        &self,
        images: &[ImageDescriptor],
        rasterizer: &mut dyn Rasterizer,
    ) -> BulletpointerResult<RunSummary> {
        self.check_output_dir()?;
        self.process_checked(images, rasterizer)
    }

    /// [`Self::process_all`] for callers that already ran [`Self::check_output_dir`].
    fn process_checked(
        &self,
        images: &[ImageDescriptor],
        rasterizer: &mut dyn Rasterizer,
    ) -> BulletpointerResult<RunSummary> {
        let sources = images
            .iter()
            .map(|image| self.resolve_source(image))
            .collect::<BulletpointerResult<Vec<_>>>()?;

        let mut summary = RunSummary::default();
        for (image, source) in images.iter().zip(&sources) {
            let outputs = self.process_source(image, source, rasterizer)?;
            summary.images += 1;
            summary.outputs.extend(outputs);
        }
        Ok(summary)
    }

    pub fn process_image(
        &self,
        image: &ImageDescriptor,
        rasterizer: &mut dyn Rasterizer,
    ) -> BulletpointerResult<Vec<LayerOutput>> {
        let source = self.resolve_source(image)?;
        self.process_source(image, &source, rasterizer)
    }

    #[tracing::instrument(skip_all, fields(source = %source.path.display()))]
    fn process_source(
        &self,
        image: &ImageDescriptor,
        source: &SourceFile,
        rasterizer: &mut dyn Rasterizer,
    ) -> BulletpointerResult<Vec<LayerOutput>> {
        if image.layers.is_empty() {
            tracing::warn!("image has no layers; nothing to write");
            return Ok(Vec::new());
        }

        let mut doc = SvgDocument::load(&source.path)?;
        tracing::info!(layers = image.layers.len(), "processing image");

        let mut outputs = Vec::with_capacity(image.layers.len());
        for layer in &image.layers {
            let svg = self.output_dir.join(source.layer_file_name(&layer.suffix));
            apply_layer(&mut doc, layer).map_err(|e| {
                BulletpointerError::in_layer(&source.path, layer.suffix.as_str(), e)
            })?;
            doc.write_to(&svg)?;
            tracing::debug!(out = %svg.display(), "wrote svg");

            let png = if self.rasterize {
                let job = RasterJob {
                    input: svg.clone(),
                    output: self.output_dir.join(source.raster_file_name(&layer.suffix)),
                    size: self.size,
                };
                rasterizer.rasterize(&job)?;
                tracing::debug!(
                    out = %job.output.display(),
                    rasterizer = rasterizer.name(),
                    "wrote png"
                );
                Some(job.output)
            } else {
                None
            };

            outputs.push(LayerOutput { svg, png });
        }
        Ok(outputs)
    }
}

/// Apply a layer's toggles: all hides first, then all shows, so an id listed
/// in both ends up shown.
pub fn apply_layer(doc: &mut SvgDocument, layer: &LayerDescriptor) -> BulletpointerResult<()> {
    for id in &layer.hide_ids {
        doc.hide_by_id(id)?;
    }
    for id in &layer.show_ids {
        doc.show_by_id(id)?;
    }
    Ok(())
}

/// Settings for one run over a configuration file.
#[derive(Clone, Debug)]
pub struct RunOptions {
    pub output_dir: PathBuf,
    pub size: RasterSize,
    /// Write SVG outputs only.
    pub dry_run: bool,
}

/// Load `config_path` and process it, reading sources relative to the config's directory.
pub fn run_config(
    config_path: &Path,
    opts: &RunOptions,
    rasterizer: &mut dyn Rasterizer,
) -> BulletpointerResult<RunSummary> {
    let input_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let processor = ImageProcessor::new(input_dir, &opts.output_dir)
        .with_size(opts.size)
        .skip_rasterize(opts.dry_run);
    processor.check_output_dir()?;

    let images = crate::config::load_config(config_path)?;
    processor.process_checked(&images, rasterizer)
}
