use std::{
    path::{Path, PathBuf},
    sync::mpsc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use sha2::Digest as _;

use layerstack::render::backend::{BackendKind, create_backend};

#[derive(Parser, Debug)]
#[command(name = "layerstack", version)]
struct Cli {
    /// Log export progress and pipeline decisions.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a single frame as a PNG.
    Frame(FrameArgs),
    /// Export a GIF or an MP4 (MP4 requires `ffmpeg` on PATH).
    Export(ExportArgs),
    /// Load and validate a scene file.
    Validate(ValidateArgs),
}

#[derive(Parser, Debug)]
struct SceneArgs {
    /// Input scene JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Directory that image and sticker paths are relative to (defaults to the scene's directory).
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Output width in pixels (defaults to the canvas width).
    #[arg(long)]
    width: Option<u32>,

    /// Output height in pixels (defaults to the canvas height).
    #[arg(long)]
    height: Option<u32>,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    #[command(flatten)]
    scene: SceneArgs,

    /// Scene time in seconds.
    #[arg(long, default_value_t = 0.0)]
    time: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    #[command(flatten)]
    scene: SceneArgs,

    /// Output path; `.gif` or `.mp4`.
    #[arg(long)]
    out: PathBuf,

    /// Output format (inferred from the extension when omitted).
    #[arg(long, value_enum)]
    format: Option<Format>,

    /// Frames per second.
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Range start in seconds.
    #[arg(long, default_value_t = 0.0)]
    start: f64,

    /// Range end in seconds (defaults to the scene duration).
    #[arg(long)]
    end: Option<f64>,

    /// Enable frame-level parallelism.
    #[arg(long, default_value_t = false)]
    parallel: bool,

    /// Override rayon worker threads (parallel mode only).
    #[arg(long)]
    threads: Option<usize>,

    /// Render chunk size (parallel mode only).
    #[arg(long, default_value_t = 64)]
    chunk_size: usize,

    /// Reuse pixels for frames whose layer state repeats within a chunk.
    #[arg(long, default_value_t = false)]
    static_frame_elision: bool,
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Input scene JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Gif,
    Mp4,
}

impl Format {
    fn infer(path: &Path) -> anyhow::Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(e) if e.eq_ignore_ascii_case("gif") => Ok(Self::Gif),
            Some(e) if e.eq_ignore_ascii_case("mp4") => Ok(Self::Mp4),
            _ => anyhow::bail!(
                "cannot infer output format from '{}', pass --format",
                path.display()
            ),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();

    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Export(args) => cmd_export(args),
        Command::Validate(args) => cmd_validate(args),
    }
}

fn load(args: &SceneArgs) -> anyhow::Result<(layerstack::Scene, layerstack::InMemoryAssets)> {
    let scene = layerstack::Scene::from_path(&args.in_path)?;
    let assets_root = match &args.assets {
        Some(dir) => dir.clone(),
        None => args
            .in_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf(),
    };
    let assets = layerstack::InMemoryAssets::load_scene_assets(&assets_root, &scene)
        .with_context(|| format!("load assets from '{}'", assets_root.display()))?;
    Ok((scene, assets))
}

fn output_canvas(args: &SceneArgs, scene: &layerstack::Scene) -> layerstack::Canvas {
    let canvas = scene.canvas();
    layerstack::Canvas::new(
        args.width.unwrap_or(canvas.width),
        args.height.unwrap_or(canvas.height),
    )
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let (scene, assets) = load(&args.scene)?;
    let output = output_canvas(&args.scene, &scene);

    let mut backend = create_backend(BackendKind::Cpu, &layerstack::RenderSettings::default())?;
    let frame = backend.render_scene(&scene, args.time, output, &assets)?;

    layerstack::encode::sink::ensure_parent_dir(&args.out)?;
    let straight = unpremultiply(&frame.data);
    image::save_buffer_with_format(
        &args.out,
        &straight,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    println!("{}", sha256_hex(&frame.data));
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let (scene, assets) = load(&args.scene)?;
    let format = match args.format {
        Some(f) => f,
        None => Format::infer(&args.out)?,
    };

    let fps = layerstack::Fps::new(args.fps, 1)?;
    let request = match args.end {
        Some(end) => layerstack::ExportRequest::new(
            layerstack::TimeRange::new(args.start, end)?,
            fps,
            output_canvas(&args.scene, &scene),
        )?,
        None => {
            let whole = layerstack::ExportRequest::for_scene(&scene, fps)?;
            layerstack::ExportRequest::new(
                layerstack::TimeRange::new(args.start, whole.range.end_s)?,
                fps,
                output_canvas(&args.scene, &scene),
            )?
        }
    };

    let mut opts = layerstack::ExportOpts::from_env();
    opts.parallel = args.parallel;
    opts.chunk_size = args.chunk_size;
    opts.static_frame_elision = args.static_frame_elision;
    if args.threads.is_some() {
        opts.threads = args.threads;
    }

    let mut sink: Box<dyn layerstack::FrameSink> = match format {
        Format::Gif => Box::new(layerstack::GifSink::create(&args.out)?),
        Format::Mp4 => {
            let sink_opts =
                layerstack::FfmpegSinkOpts::new(&args.out).with_matte(scene.background());
            Box::new(layerstack::FfmpegSink::new(sink_opts))
        }
    };

    let (tx, rx) = mpsc::channel();
    let job = layerstack::ExportJob::new(scene, request)?
        .with_opts(opts)?
        .with_events(tx);
    let total = job.request().frames_total();
    let reporter = std::thread::spawn(move || report_progress(rx, total));

    let mut backend = create_backend(BackendKind::Cpu, &layerstack::RenderSettings::default())?;
    let result = job.run(backend.as_mut(), &assets, sink.as_mut());
    drop(job);
    let _ = reporter.join();

    let report = result?;
    eprintln!(
        "wrote {} ({} frames, {} rendered, {} elided)",
        args.out.display(),
        report.stats.frames_total,
        report.stats.frames_rendered,
        report.stats.frames_elided
    );
    Ok(())
}

fn cmd_validate(args: ValidateArgs) -> anyhow::Result<()> {
    let scene = layerstack::Scene::from_path(&args.in_path)?;
    let canvas = scene.canvas();
    println!(
        "ok: {}x{} canvas, {} layers, duration {}",
        canvas.width,
        canvas.height,
        scene.len(),
        scene
            .duration_s()
            .map_or_else(|| "still".to_string(), |d| format!("{d}s"))
    );
    Ok(())
}

fn report_progress(rx: mpsc::Receiver<layerstack::ExportEvent>, total: u64) {
    let step = (total / 10).max(1);
    for event in rx {
        match event {
            layerstack::ExportEvent::Progress { progress, .. } => {
                if progress.frames_produced % step == 0 || progress.frames_produced == total {
                    tracing::info!(
                        produced = progress.frames_produced,
                        total = progress.frames_total,
                        "export progress"
                    );
                }
            }
            layerstack::ExportEvent::Status { job, status } => {
                tracing::debug!(%job, ?status, "export status");
            }
        }
    }
}

fn unpremultiply(premul: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(premul.len());
    for px in premul.chunks_exact(4) {
        let a = px[3];
        if a == 0 {
            out.extend_from_slice(&[0, 0, 0, 0]);
            continue;
        }
        for &c in &px[..3] {
            let v = (u16::from(c) * 255 + u16::from(a) / 2) / u16::from(a);
            out.push(v.min(255) as u8);
        }
        out.push(a);
    }
    out
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = sha2::Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{:02x}", b));
    }
    out
}
