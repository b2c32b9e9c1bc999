use std::{io::IsTerminal as _, path::PathBuf, process::ExitCode};

use clap::{ArgAction, Parser, ValueEnum};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "bulletpointer", version)]
#[command(about = "Write one SVG and one PNG per layer of each annotated SVG in a YAML config")]
struct Cli {
    /// YAML config listing source SVGs and their layers. Sources are resolved
    /// relative to the config's directory.
    config: PathBuf,

    /// Existing directory that receives every output file.
    out_dir: PathBuf,

    /// How PNGs are produced.
    #[arg(long, value_enum, default_value_t = RasterizerChoice::Flatpak)]
    rasterizer: RasterizerChoice,

    /// Inkscape executable used with `--rasterizer inkscape`.
    #[arg(long, default_value = "inkscape")]
    inkscape: PathBuf,

    /// PNG width in pixels.
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// PNG height in pixels.
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Write the per-layer SVGs but skip PNG conversion.
    #[arg(long)]
    dry_run: bool,

    /// More log output (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RasterizerChoice {
    /// `flatpak run org.inkscape.Inkscape`
    Flatpak,
    /// An Inkscape executable, see `--inkscape`.
    Inkscape,
    /// Built-in renderer, no external program.
    Resvg,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(cli) {
        Ok(summary) => {
            tracing::info!(
                images = summary.images,
                layers = summary.outputs.len(),
                "done"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => Level::ERROR,
        (false, 0) => Level::WARN,
        (false, 1) => Level::INFO,
        (false, _) => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<bulletpointer::RunSummary> {
    let opts = bulletpointer::RunOptions {
        output_dir: cli.out_dir,
        size: bulletpointer::RasterSize::new(cli.width, cli.height)?,
        dry_run: cli.dry_run,
    };

    let mut rasterizer = make_rasterizer(cli.rasterizer, cli.inkscape);
    let summary = bulletpointer::run_config(&cli.config, &opts, rasterizer.as_mut())?;
    Ok(summary)
}

fn make_rasterizer(
    choice: RasterizerChoice,
    inkscape: PathBuf,
) -> Box<dyn bulletpointer::Rasterizer> {
    match choice {
        RasterizerChoice::Flatpak => Box::new(bulletpointer::InkscapeRasterizer::flatpak()),
        RasterizerChoice::Inkscape => Box::new(bulletpointer::InkscapeRasterizer::direct(inkscape)),
        RasterizerChoice::Resvg => Box::new(bulletpointer::ResvgRasterizer::new()),
    }
}
