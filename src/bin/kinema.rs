use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use kinema::{Composition, Frame, RenderSettings, Renderer};

#[derive(Parser, Debug)]
#[command(name = "kinema", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a composition document.
    Verify(VerifyArgs),
    /// Print the merged static time ranges of a document.
    Ranges(RangesArgs),
    /// Render a single frame as a PNG.
    Frame(FrameArgs),
}

#[derive(Parser, Debug)]
struct VerifyArgs {
    /// Input composition JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct RangesArgs {
    /// Input composition JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input composition JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Frame index (0-based).
    #[arg(long)]
    frame: i64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Verify(args) => cmd_verify(args),
        Command::Ranges(args) => cmd_ranges(args),
        Command::Frame(args) => cmd_frame(args),
    }
}

fn load_composition(path: &Path) -> anyhow::Result<Composition> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("open composition '{}'", path.display()))?;
    let comp: Composition = serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("parse composition '{}'", path.display()))?;
    Ok(comp)
}

fn cmd_verify(args: VerifyArgs) -> anyhow::Result<()> {
    let comp = load_composition(&args.in_path)?;
    if !comp.verify() {
        anyhow::bail!("composition '{}' is invalid", args.in_path.display());
    }
    println!(
        "ok: {} layers, {}x{}, {} frames @ {:.3} fps",
        comp.layers.len(),
        comp.width,
        comp.height,
        comp.duration.0,
        comp.fps.as_f64(),
    );
    Ok(())
}

fn cmd_ranges(args: RangesArgs) -> anyhow::Result<()> {
    let comp = load_composition(&args.in_path)?;
    if !comp.verify() {
        anyhow::bail!("composition '{}' is invalid", args.in_path.display());
    }
    for range in comp.static_time_ranges() {
        println!(
            "[{}, {})  {:.3}s..{:.3}s",
            range.start.0,
            range.end.0,
            comp.fps.frames_to_secs(range.start.0),
            comp.fps.frames_to_secs(range.end.0),
        );
    }
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let comp = load_composition(&args.in_path)?;
    if !comp.verify() {
        anyhow::bail!("composition '{}' is invalid", args.in_path.display());
    }

    let mut renderer = Renderer::new();
    let frame = renderer.render_frame(&comp, Frame(args.frame), RenderSettings::default())?;
    let data = frame.to_straight_rgba();

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    image::save_buffer_with_format(
        &args.out,
        &data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}
