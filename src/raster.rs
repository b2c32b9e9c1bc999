use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    sync::Arc,
};

use anyhow::Context as _;

use crate::error::{BulletpointerError, BulletpointerResult};

/// Output raster size in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RasterSize {
    pub width: u32,
    pub height: u32,
}

impl RasterSize {
    pub const HD_720: Self = Self {
        width: 1280,
        height: 720,
    };

    pub fn new(width: u32, height: u32) -> BulletpointerResult<Self> {
        if width == 0 || height == 0 {
            return Err(BulletpointerError::validation(
                "raster width/height must be non-zero",
            ));
        }
        Ok(Self { width, height })
    }
}

impl Default for RasterSize {
    fn default() -> Self {
        Self::HD_720
    }
}

/// One conversion request: the SVG at `input` becomes a PNG at `output`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub size: RasterSize,
}

/// Converts a written SVG file into a PNG.
///
/// Calls block until the PNG is on disk or the conversion has failed.
pub trait Rasterizer {
    /// Short name used in log output.
    fn name(&self) -> &str;
    fn rasterize(&mut self, job: &RasterJob) -> BulletpointerResult<()>;
}

/// Runs Inkscape as a subprocess, either installed directly or through flatpak.
#[derive(Clone, Debug)]
pub struct InkscapeRasterizer {
    program: PathBuf,
    prefix_args: Vec<OsString>,
}

impl InkscapeRasterizer {
    pub const FLATPAK_APP_ID: &'static str = "org.inkscape.Inkscape";

    /// `inkscape` (or another Inkscape executable) invoked directly.
    pub fn direct(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
        }
    }

    /// `flatpak run org.inkscape.Inkscape`.
    pub fn flatpak() -> Self {
        Self {
            program: PathBuf::from("flatpak"),
            prefix_args: vec!["run".into(), Self::FLATPAK_APP_ID.into()],
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn command_args(&self, job: &RasterJob) -> Vec<OsString> {
        let mut filename = OsString::from("--export-filename=");
        filename.push(&job.output);

        let mut args = self.prefix_args.clone();
        args.push(filename);
        args.push(format!("--export-width={}", job.size.width).into());
        args.push(format!("--export-height={}", job.size.height).into());
        args.push(job.input.clone().into_os_string());
        args
    }
}

impl Rasterizer for InkscapeRasterizer {
    fn name(&self) -> &str {
        "inkscape"
    }

    fn rasterize(&mut self, job: &RasterJob) -> BulletpointerResult<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.command_args(job))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        tracing::debug!(
            program = %self.program.display(),
            input = %job.input.display(),
            "spawn inkscape"
        );
        let output = cmd.output().map_err(|e| {
            BulletpointerError::raster(format!(
                "failed to spawn '{}' (is Inkscape installed?): {e}",
                self.program.display()
            ))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit = match output.status.code() {
                Some(code) => format!("exit code {code}"),
                None => "terminated by signal".to_string(),
            };
            return Err(BulletpointerError::raster(format!(
                "could not convert '{}' to png: '{}' failed ({exit}): {}",
                job.input.display(),
                self.program.display(),
                stderr.trim()
            )));
        }

        Ok(())
    }
}

/// Renders in-process with `resvg`, stretching the document to the requested size.
#[derive(Debug)]
pub struct ResvgRasterizer {
    fontdb: Arc<usvg::fontdb::Database>,
}

impl ResvgRasterizer {
    pub fn new() -> Self {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        Self {
            fontdb: Arc::new(db),
        }
    }
}

impl Default for ResvgRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Rasterizer for ResvgRasterizer {
    fn name(&self) -> &str {
        "resvg"
    }

    fn rasterize(&mut self, job: &RasterJob) -> BulletpointerResult<()> {
        let bytes = std::fs::read(&job.input)
            .with_context(|| format!("read svg '{}'", job.input.display()))?;

        let opts = usvg::Options {
            resources_dir: job.input.parent().map(Path::to_path_buf),
            fontdb: Arc::clone(&self.fontdb),
            ..Default::default()
        };
        let tree = usvg::Tree::from_data(&bytes, &opts).map_err(|e| {
            BulletpointerError::raster(format!("parse svg '{}': {e}", job.input.display()))
        })?;

        let mut rgba = rasterize_tree_to_premul_rgba8(&tree, job.size)?;
        demultiply_rgba8_in_place(&mut rgba);

        image::save_buffer_with_format(
            &job.output,
            &rgba,
            job.size.width,
            job.size.height,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .with_context(|| format!("write png '{}'", job.output.display()))?;

        Ok(())
    }
}

fn rasterize_tree_to_premul_rgba8(
    tree: &usvg::Tree,
    size: RasterSize,
) -> BulletpointerResult<Vec<u8>> {
    let doc_size = tree.size();
    if !doc_size.width().is_finite() || doc_size.width() <= 0.0 || doc_size.height() <= 0.0 {
        return Err(BulletpointerError::raster("svg has invalid width/height"));
    }

    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width, size.height)
        .ok_or_else(|| BulletpointerError::raster("failed to allocate pixmap"))?;

    let sx = (size.width as f32) / doc_size.width();
    let sy = (size.height as f32) / doc_size.height();
    let xform = resvg::tiny_skia::Transform::from_scale(sx, sy);

    resvg::render(tree, xform, &mut pixmap.as_mut());
    Ok(pixmap.take())
}

fn demultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 || a == 255 {
            continue;
        }
        px[0] = ((px[0] as u16 * 255 + a / 2) / a).min(255) as u8;
        px[1] = ((px[1] as u16 * 255 + a / 2) / a).min(255) as u8;
        px[2] = ((px[2] as u16 * 255 + a / 2) / a).min(255) as u8;
    }
}

/// Rasterizer for tests and debugging: records every job and writes an empty
/// placeholder file at the requested output path.
#[derive(Debug, Default)]
pub struct RecordingRasterizer {
    jobs: Vec<RasterJob>,
}

impl RecordingRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs in the order they were requested.
    pub fn jobs(&self) -> &[RasterJob] {
        &self.jobs
    }
}

impl Rasterizer for RecordingRasterizer {
    fn name(&self) -> &str {
        "recording"
    }

    fn rasterize(&mut self, job: &RasterJob) -> BulletpointerResult<()> {
        std::fs::write(&job.output, b"")
            .with_context(|| format!("write placeholder '{}'", job.output.display()))?;
        self.jobs.push(job.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> RasterJob {
        RasterJob {
            input: PathBuf::from("out/slide_1.svg"),
            output: PathBuf::from("out/slide_1.png"),
            size: RasterSize::default(),
        }
    }

    #[test]
    fn zero_size_is_rejected() {
        assert!(RasterSize::new(0, 720).is_err());
        assert!(RasterSize::new(1280, 0).is_err());
        assert_eq!(RasterSize::new(1280, 720).unwrap(), RasterSize::HD_720);
    }

    #[test]
    fn flatpak_command_line() {
        let r = InkscapeRasterizer::flatpak();
        assert_eq!(r.program(), Path::new("flatpak"));
        assert_eq!(
            r.command_args(&job()),
            vec![
                OsString::from("run"),
                OsString::from("org.inkscape.Inkscape"),
                OsString::from("--export-filename=out/slide_1.png"),
                OsString::from("--export-width=1280"),
                OsString::from("--export-height=720"),
                OsString::from("out/slide_1.svg"),
            ]
        );
    }

    #[test]
    fn direct_command_line_has_no_prefix() {
        let r = InkscapeRasterizer::direct("/opt/inkscape/bin/inkscape");
        let args = r.command_args(&job());
        assert_eq!(args.len(), 4);
        assert_eq!(args[0], OsString::from("--export-filename=out/slide_1.png"));
    }

    #[test]
    fn launch_failure_is_a_raster_error() {
        let mut r = InkscapeRasterizer::direct("target/raster_tests/no-such-inkscape");
        let err = r.rasterize(&job()).unwrap_err();
        assert!(matches!(err, BulletpointerError::Raster(_)));
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_is_a_raster_error() {
        let mut r = InkscapeRasterizer::direct("false");
        let err = r.rasterize(&job()).unwrap_err();
        assert!(matches!(err, BulletpointerError::Raster(_)));
        let msg = err.to_string();
        assert!(msg.contains("'false' failed (exit code 1)"), "{msg}");
        assert!(msg.contains("out/slide_1.svg"), "{msg}");
    }

    #[test]
    fn demultiply_restores_straight_alpha() {
        // Premultiplied red @ 50% alpha.
        let mut px = vec![128u8, 0, 0, 128];
        demultiply_rgba8_in_place(&mut px);
        assert_eq!(px, vec![255u8, 0, 0, 128]);
    }

    #[test]
    fn resvg_stretches_to_requested_size() {
        let svg = br##"<svg xmlns="http://www.w3.org/2000/svg" width="16" height="9"><rect width="16" height="9" fill="#ff0000"/></svg>"##;
        let opts = usvg::Options::default();
        let tree = usvg::Tree::from_data(svg, &opts).unwrap();
        let rgba = rasterize_tree_to_premul_rgba8(&tree, RasterSize::new(32, 18).unwrap()).unwrap();
        assert_eq!(rgba.len(), 32 * 18 * 4);
        assert_eq!(&rgba[..4], &[255, 0, 0, 255]);
        assert_eq!(&rgba[rgba.len() - 4..], &[255, 0, 0, 255]);
    }
}
