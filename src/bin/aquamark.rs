use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use rayon::prelude::*;

use aquamark::{
    Compositor, EditSession, OutputFormat, OutputSettings, Surface, Transform, ValidationStage,
    WatermarkSettings, encode_frame, load_image,
};

#[derive(Parser, Debug)]
#[command(name = "aquamark", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply a watermark document to one or more images.
    Apply(ApplyArgs),
    /// Validate a watermark document without rendering anything.
    Validate(ValidateArgs),
}

#[derive(Parser, Debug)]
struct ApplyArgs {
    /// Watermark document JSON.
    #[arg(long)]
    watermarks: PathBuf,

    /// Input images.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Output format; overrides the document's output settings.
    #[arg(long, value_enum)]
    format: Option<FormatChoice>,

    /// Encoder quality (1-100); lossy formats only.
    #[arg(long)]
    quality: Option<u8>,

    /// Uniform scale factor for anchor-positioned watermarks.
    #[arg(long, default_value_t = 1.0)]
    scale_factor: f64,

    /// Process inputs on a thread pool.
    #[arg(long)]
    parallel: bool,
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Watermark document JSON.
    #[arg(long)]
    watermarks: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatChoice {
    Png,
    Jpeg,
    Webp,
}

impl From<FormatChoice> for OutputFormat {
    fn from(choice: FormatChoice) -> Self {
        match choice {
            FormatChoice::Png => OutputFormat::Png,
            FormatChoice::Jpeg => OutputFormat::Jpeg,
            FormatChoice::Webp => OutputFormat::Webp,
        }
    }
}

/// On-disk watermark document: a stack of watermark entries applied to every
/// input image.
#[derive(Debug, serde::Deserialize)]
struct WatermarkDoc {
    watermarks: Vec<WatermarkEntry>,
}

#[derive(Debug, serde::Deserialize)]
struct WatermarkEntry {
    #[serde(flatten)]
    settings: WatermarkSettings,
    #[serde(default)]
    transform: Option<Transform>,
    #[serde(default)]
    z_index: Option<i32>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Apply(args) => cmd_apply(args),
        Command::Validate(args) => cmd_validate(args),
    }
}

fn read_doc(path: &Path) -> anyhow::Result<WatermarkDoc> {
    let f = File::open(path).with_context(|| format!("open document '{}'", path.display()))?;
    let doc: WatermarkDoc =
        serde_json::from_reader(BufReader::new(f)).context("parse watermark document JSON")?;
    if doc.watermarks.is_empty() {
        anyhow::bail!("watermark document contains no watermarks");
    }
    Ok(doc)
}

/// Build session watermarks from the document, decoding referenced image
/// sources relative to the document's directory.
fn build_session(doc: WatermarkDoc, doc_dir: &Path) -> anyhow::Result<EditSession> {
    let mut session = EditSession::new();

    for (i, mut entry) in doc.watermarks.into_iter().enumerate() {
        if let Some(image) = entry.settings.image.as_mut()
            && image.image_data.is_none()
            && let Some(source) = &image.source
        {
            let path = doc_dir.join(source);
            image.image_data = Some(
                load_image(&path)
                    .with_context(|| format!("load watermark image '{}'", path.display()))?,
            );
        }

        let report = entry.settings.validate();
        if !report.is_valid() {
            anyhow::bail!(
                "watermark #{i} is invalid:\n  {}",
                report.errors.join("\n  ")
            );
        }

        let id = session.add_with_transform(entry.settings, entry.transform);
        if let Some(z) = entry.z_index
            && let Some(wm) = session.get_mut(id)
        {
            wm.z_index = z;
        }
    }

    Ok(session)
}

fn cmd_validate(args: ValidateArgs) -> anyhow::Result<()> {
    let doc = read_doc(&args.watermarks)?;

    let mut invalid = 0usize;
    for (i, entry) in doc.watermarks.iter().enumerate() {
        // Document stage: sourced rasters decode at apply time, so they
        // are not required to be decoded yet.
        let report = entry.settings.validate_at(ValidationStage::Document);
        for error in &report.errors {
            eprintln!("watermark #{i}: {error}");
            invalid += 1;
        }
    }

    if invalid > 0 {
        anyhow::bail!("{invalid} validation error(s)");
    }
    eprintln!("{} watermark(s) ok", doc.watermarks.len());
    Ok(())
}

fn cmd_apply(args: ApplyArgs) -> anyhow::Result<()> {
    let doc = read_doc(&args.watermarks)?;
    let doc_dir = args
        .watermarks
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    let session = build_session(doc, &doc_dir)?;
    let output = output_settings(&args, &session);
    let watermarks = session.clone_for_export();

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create output dir '{}'", args.out_dir.display()))?;

    let process = |input: &PathBuf, compositor: &mut Compositor| -> anyhow::Result<PathBuf> {
        let base = load_image(input)
            .with_context(|| format!("load input image '{}'", input.display()))?;
        let mut surface = Surface::from_image(&base)?;

        let report = compositor.composite(&mut surface, &watermarks, args.scale_factor);
        for (id, error) in &report.failures {
            tracing::warn!(watermark = id.0, input = %input.display(), "{error}");
        }

        let encoded = encode_frame(&surface.into_frame(), &output)?;
        let out_path = output_path(&args.out_dir, input, output.format);
        std::fs::write(&out_path, encoded)
            .with_context(|| format!("write output '{}'", out_path.display()))?;
        Ok(out_path)
    };

    let results: Vec<(PathBuf, anyhow::Result<PathBuf>)> = if args.parallel {
        args.inputs
            .par_iter()
            .map_init(Compositor::new, |compositor, input| {
                (input.clone(), process(input, compositor))
            })
            .collect()
    } else {
        let mut compositor = Compositor::new();
        args.inputs
            .iter()
            .map(|input| (input.clone(), process(input, &mut compositor)))
            .collect()
    };

    let mut failed = 0usize;
    for (input, result) in &results {
        match result {
            Ok(out_path) => eprintln!("wrote {}", out_path.display()),
            Err(e) => {
                failed += 1;
                eprintln!("failed {}: {e:#}", input.display());
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} input(s) failed", results.len());
    }
    Ok(())
}

fn output_settings(args: &ApplyArgs, session: &EditSession) -> OutputSettings {
    let mut settings = session
        .iter()
        .find_map(|w| w.settings.output)
        .unwrap_or_default();
    if let Some(format) = args.format {
        settings.format = format.into();
    }
    if let Some(quality) = args.quality {
        settings.quality = quality.clamp(1, 100);
    }
    settings
}

fn output_path(out_dir: &Path, input: &Path, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let ext = match format {
        OutputFormat::Png => "png",
        OutputFormat::Jpeg => "jpg",
        OutputFormat::Webp => "webp",
    };
    out_dir.join(format!("{stem}.watermarked.{ext}"))
}
