use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand};
use loopforge_core::catalog::AssetIndex;
use loopforge_core::job::{BatchProgress, BatchResult, JobState};
use loopforge_core::naming::{is_edit_file, is_source_clip};
use loopforge_core::settings::Settings;
use loopforge_core::transition::TransitionKind;
use loopforge_core::types::{Catalog, DistributionPolicy};
use loopforge_render::engine::{FfmpegEngine, RenderEngine, RenderProgress};
use loopforge_render::orchestrator::{resolve_catalog, BatchOptions, BatchRequest, Orchestrator};
use loopforge_render::source::{CatalogSource, CsvFileCatalog, SheetCatalog};
use loopforge_render::upload::DirectoryUploader;
use tokio::sync::watch;

const DEFAULT_SETTINGS: &str = "loopforge.json";

#[derive(Parser, Debug)]
#[command(name = "loopforge", version, about = "Loop short clips into long music videos")]
struct Cli {
    /// Settings file (JSON). Missing file means defaults.
    #[arg(long, global = true, default_value = DEFAULT_SETTINGS)]
    settings: PathBuf,

    /// Debug logging (overrides RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render every (clip, variant) pair.
    Render(RenderArgs),
    /// Match the song catalog against the music folder and report.
    CheckCatalog(CatalogArgs),
    /// Probe clips and the hardware encoders.
    Probe(ProbeArgs),
    /// Print the effective settings, or write defaults with --init.
    Settings {
        #[arg(long)]
        init: bool,
    },
}

#[derive(Parser, Debug)]
struct CatalogArgs {
    /// Catalog as a local CSV export instead of the sheet.
    #[arg(long, conflicts_with_all = ["sheet", "preset"])]
    catalog: Option<PathBuf>,

    /// Sheet URL (edit link or CSV export link).
    #[arg(long)]
    sheet: Option<String>,

    /// Named sheet from `sheet_presets`.
    #[arg(long)]
    preset: Option<String>,

    /// Folder of `<name>.wav` song assets.
    #[arg(long)]
    music: Option<PathBuf>,

    #[command(flatten)]
    binaries: BinaryArgs,
}

#[derive(Parser, Debug)]
struct BinaryArgs {
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    #[arg(long, default_value = "ffprobe")]
    ffprobe: PathBuf,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input clips or folders of clips (`.mp4`, `_edit` files skipped).
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output folder.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Target duration in seconds.
    #[arg(short, long)]
    duration: Option<u64>,

    /// Number of variants per clip.
    #[arg(long)]
    variants: Option<usize>,

    /// Songs per variant.
    #[arg(long)]
    songs: Option<usize>,

    /// Draw songs at random instead of in catalog order.
    #[arg(long)]
    random: bool,

    /// Seed for --random, for reproducible song lists.
    #[arg(long, requires = "random")]
    seed: Option<u64>,

    /// Transition effect (none, fade, slide_left, ...).
    #[arg(long)]
    transition: Option<TransitionKind>,

    /// Disable the music fade-out.
    #[arg(long)]
    no_fade: bool,

    /// Skip the timestamp files.
    #[arg(long)]
    no_timestamps: bool,

    /// Concurrent render jobs.
    #[arg(short = 'j', long)]
    workers: Option<usize>,

    /// Copy finished outputs into this folder.
    #[arg(long)]
    upload: Option<PathBuf>,

    /// Write the batch result as JSON.
    #[arg(long)]
    report: Option<PathBuf>,

    #[command(flatten)]
    catalog: CatalogArgs,
}

#[derive(Parser, Debug)]
struct ProbeArgs {
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    #[command(flatten)]
    binaries: BinaryArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = Settings::load_or_default(&cli.settings)
        .with_context(|| format!("load settings '{}'", cli.settings.display()))?;

    match cli.cmd {
        Command::Render(args) => cmd_render(settings, args).await,
        Command::CheckCatalog(args) => cmd_check_catalog(settings, args).await,
        Command::Probe(args) => cmd_probe(args).await,
        Command::Settings { init } => cmd_settings(&cli.settings, settings, init),
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_render(mut settings: Settings, args: RenderArgs) -> anyhow::Result<()> {
    check_dependencies(&args.catalog.binaries)?;
    apply_overrides(&mut settings, &args);
    settings.validate().context("invalid settings")?;

    let clips = collect_clips(&args.inputs)?;
    if clips.is_empty() {
        bail!("no input clips found");
    }
    let output_dir = args
        .output
        .clone()
        .or_else(|| settings.output_folder.clone())
        .context("no output folder: pass --output or set output_folder")?;

    let catalog = fetch_catalog(&settings, &args.catalog).await?;
    let assets = scan_music(&settings)?;

    let (progress_tx, progress_rx) = watch::channel(RenderProgress::default());
    let engine = FfmpegEngine::with_binaries(&args.catalog.binaries.ffmpeg, &args.catalog.binaries.ffprobe)
        .with_progress(progress_tx);

    let mut orchestrator = Orchestrator::new(engine, BatchOptions::from_settings(&settings));
    let upload_folder = args.upload.clone().or_else(|| {
        settings
            .auto_upload
            .then(|| settings.upload_folder.clone())
            .flatten()
    });
    if let Some(folder) = upload_folder {
        tracing::info!(folder = %folder.display(), "uploading finished outputs");
        orchestrator = orchestrator.with_uploader(DirectoryUploader::new(folder));
    }

    let cancel = orchestrator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; finishing running jobs, skipping the rest");
            cancel.cancel();
        }
    });
    spawn_batch_logger(orchestrator.subscribe());
    spawn_render_logger(progress_rx);

    let mut request = BatchRequest::from_settings(&settings, clips, catalog, assets, output_dir);
    request.seed = args.seed;

    let result = orchestrator.run(request).await?;
    print_summary(&result);

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(path, json).with_context(|| format!("write report '{}'", path.display()))?;
    }

    if result.failed > 0 {
        bail!("{} of {} jobs failed", result.failed, result.total());
    }
    Ok(())
}

async fn cmd_check_catalog(mut settings: Settings, args: CatalogArgs) -> anyhow::Result<()> {
    check_dependencies(&args.binaries)?;
    apply_catalog_overrides(&mut settings, &args);

    let catalog = fetch_catalog(&settings, &args).await?;
    let assets = scan_music(&settings)?;
    let engine = FfmpegEngine::with_binaries(&args.binaries.ffmpeg, &args.binaries.ffprobe);

    let report = resolve_catalog(&engine, &catalog, &assets, 0).await?;
    println!(
        "{} catalog entries, {} eligible, {} unresolved",
        catalog.len(),
        report.eligible.len(),
        report.unresolved.len()
    );
    for song in &report.eligible {
        println!("  ok       {} ({})", song.name, song.duration);
    }
    for warning in report.warnings() {
        println!("  missing  {warning}");
    }

    let needed = settings.min_songs();
    if report.eligible.len() < needed {
        bail!("only {} eligible songs; a batch needs {needed}", report.eligible.len());
    }
    Ok(())
}

async fn cmd_probe(args: ProbeArgs) -> anyhow::Result<()> {
    check_dependencies(&args.binaries)?;
    let engine = FfmpegEngine::with_binaries(&args.binaries.ffmpeg, &args.binaries.ffprobe);

    for path in collect_clips(&args.inputs)? {
        match engine.probe_clip(&path).await {
            Ok(clip) => println!(
                "{}: {} {}x{} @ {:.2} fps",
                path.display(),
                clip.duration,
                clip.width,
                clip.height,
                clip.fps
            ),
            Err(e) => println!("{}: {}", path.display(), e.cause()),
        }
    }

    let capability = engine.probe_capability().await?;
    if capability.is_available() {
        let codecs: Vec<&str> = capability.encoders.iter().map(|e| e.codec()).collect();
        println!("hardware encoders: {}", codecs.join(", "));
    } else {
        println!("hardware encoders: none (transitions disabled)");
    }
    Ok(())
}

fn cmd_settings(path: &Path, settings: Settings, init: bool) -> anyhow::Result<()> {
    if init {
        if path.exists() {
            bail!("'{}' already exists", path.display());
        }
        Settings::default()
            .save_to_file(path)
            .with_context(|| format!("write settings '{}'", path.display()))?;
        eprintln!("wrote {}", path.display());
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn check_dependencies(binaries: &BinaryArgs) -> anyhow::Result<()> {
    let deps = [
        (&binaries.ffmpeg, "rendering and audio assembly"),
        (&binaries.ffprobe, "clip and song probing"),
    ];

    let mut missing = Vec::new();
    for (bin, purpose) in deps {
        if std::process::Command::new(bin)
            .arg("-version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .is_err()
        {
            missing.push((bin, purpose));
        }
    }

    if !missing.is_empty() {
        eprintln!("\n=== loopforge: missing required dependencies ===\n");
        for (bin, purpose) in &missing {
            eprintln!("  ✗ {} -- {purpose}", bin.display());
        }
        eprintln!("\nInstall with:");
        eprintln!("  sudo apt install ffmpeg\n");
        bail!("ffmpeg tools not found");
    }
    Ok(())
}

fn apply_overrides(settings: &mut Settings, args: &RenderArgs) {
    if let Some(secs) = args.duration {
        settings.loop_duration_secs = secs;
    }
    if let Some(n) = args.variants {
        settings.variants = n;
    }
    if let Some(n) = args.songs {
        settings.songs_per_variant = n;
    }
    if args.random {
        settings.distribution = DistributionPolicy::Random;
    }
    if let Some(kind) = args.transition {
        settings.transition = kind;
        settings.hardware_acceleration = !kind.is_none();
    }
    if args.no_fade {
        settings.fade_audio = false;
    }
    if args.no_timestamps {
        settings.export_timestamp = false;
    }
    if let Some(n) = args.workers {
        settings.max_workers = n;
    }
    apply_catalog_overrides(settings, &args.catalog);
}

fn apply_catalog_overrides(settings: &mut Settings, args: &CatalogArgs) {
    if let Some(music) = &args.music {
        settings.music_folder = Some(music.clone());
    }
    if let Some(url) = &args.sheet {
        settings.sheet_url = Some(url.clone());
    }
    if let Some(preset) = &args.preset {
        settings.sheet_url = None;
        settings.sheet_preset = Some(preset.clone());
    }
}

/// Expand folders (one level) and drop anything that is not a source clip.
/// Order follows the arguments; folder contents are sorted by name. A folder
/// holding a clip named after itself (`beach/beach.mp4`) contributes only
/// that clip.
fn collect_clips(inputs: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut clips = Vec::new();
    let mut seen = HashSet::new();

    for input in inputs {
        let candidates = if input.is_dir() {
            if let Some(own) = folder_clip(input) {
                tracing::debug!(folder = %input.display(), clip = %own.display(), "using the folder's own clip");
                if seen.insert(own.clone()) {
                    clips.push(own);
                }
                continue;
            }
            let mut entries: Vec<PathBuf> = std::fs::read_dir(input)
                .with_context(|| format!("read folder '{}'", input.display()))?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.is_file())
                .collect();
            entries.sort();
            entries
        } else if input.exists() {
            vec![input.clone()]
        } else {
            bail!("input '{}' does not exist", input.display());
        };

        for path in candidates {
            if is_edit_file(&path) {
                tracing::info!(path = %path.display(), "skipping edit render");
                continue;
            }
            if !is_source_clip(&path) {
                tracing::debug!(path = %path.display(), "not an mp4 clip");
                continue;
            }
            if seen.insert(path.clone()) {
                clips.push(path);
            }
        }
    }
    Ok(clips)
}

/// `<dir>/<dir name>.mp4`, when it exists and is not an edit render.
fn folder_clip(dir: &Path) -> Option<PathBuf> {
    let name = dir.file_name()?;
    let mut file = name.to_os_string();
    file.push(".mp4");
    let candidate = dir.join(file);
    (candidate.is_file() && is_source_clip(&candidate)).then_some(candidate)
}

async fn fetch_catalog(settings: &Settings, args: &CatalogArgs) -> anyhow::Result<Catalog> {
    let catalog = if let Some(csv) = &args.catalog {
        fetch_from(&CsvFileCatalog::new(csv)).await?
    } else {
        let url = settings
            .resolved_sheet_url()
            .context("no song sheet: pass --catalog, --sheet or --preset, or set sheet_url")?;
        fetch_from(&SheetCatalog::new(url)?).await?
    };
    Ok(catalog)
}

async fn fetch_from(source: &impl CatalogSource) -> anyhow::Result<Catalog> {
    let catalog = source
        .fetch()
        .await
        .with_context(|| format!("fetch catalog from {}", source.describe()))?;
    tracing::info!(source = %source.describe(), songs = catalog.len(), "catalog loaded");
    Ok(catalog)
}

fn scan_music(settings: &Settings) -> anyhow::Result<AssetIndex> {
    let folder = settings
        .music_folder
        .as_ref()
        .context("no music folder: pass --music or set music_folder")?;
    let assets = AssetIndex::scan(folder)
        .with_context(|| format!("scan music folder '{}'", folder.display()))?;
    if assets.is_empty() {
        tracing::warn!(folder = %folder.display(), "music folder has no .wav files");
    }
    Ok(assets)
}

fn spawn_batch_logger(mut rx: watch::Receiver<BatchProgress>) {
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let p = rx.borrow_and_update().clone();
            if let Some(current) = &p.current {
                tracing::info!(completed = p.completed, total = p.total, current = %current, "batch progress");
            }
        }
    });
}

fn spawn_render_logger(mut rx: watch::Receiver<RenderProgress>) {
    tokio::spawn(async move {
        let mut last_step = None;
        while rx.changed().await.is_ok() {
            let p = rx.borrow_and_update().clone();
            // one line per 10%
            let step = (p.percent / 10.0).floor() as i64;
            if last_step == Some(step) {
                continue;
            }
            last_step = Some(step);
            tracing::info!(
                output = %p.output,
                percent = format_args!("{:.0}", p.percent),
                speed = %p.speed,
                eta = ?p.eta_seconds.map(|s| s.round()),
                "rendering"
            );
        }
    });
}

fn print_summary(result: &BatchResult) {
    println!();
    for outcome in &result.outcomes {
        let name = outcome
            .outputs
            .as_ref()
            .and_then(|o| o.video.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| outcome.clip.display().to_string());
        match &outcome.state {
            JobState::Succeeded => println!("  ✓ {name}"),
            JobState::Failed(reason) => println!("  ✗ {name} (variant {}): {reason}", outcome.variant + 1),
            JobState::Skipped(reason) => println!("  - {name} (variant {}): {reason}", outcome.variant + 1),
            other => println!("  ? {name}: {other}"),
        }
        for warning in &outcome.warnings {
            println!("      warning: {warning}");
        }
    }
    for warning in &result.warnings {
        println!("  warning: {warning}");
    }
    println!(
        "\n{} succeeded, {} failed, {} skipped",
        result.succeeded, result.failed, result.skipped
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        std::fs::write(path, b"").unwrap();
    }

    #[test]
    fn folder_with_its_own_clip_contributes_only_that_clip() {
        let root = TempDir::new().unwrap();
        let folder = root.path().join("beach");
        std::fs::create_dir(&folder).unwrap();
        touch(&folder.join("beach.mp4"));
        touch(&folder.join("beach_raw.mp4"));
        touch(&folder.join("b-roll.mp4"));

        let clips = collect_clips(&[folder.clone()]).unwrap();
        assert_eq!(clips, vec![folder.join("beach.mp4")]);
    }

    #[test]
    fn other_folders_expand_to_every_source_clip() {
        let root = TempDir::new().unwrap();
        let folder = root.path().join("shoot");
        std::fs::create_dir(&folder).unwrap();
        touch(&folder.join("b.mp4"));
        touch(&folder.join("a.mp4"));
        touch(&folder.join("a_edit.mp4"));
        touch(&folder.join("notes.txt"));

        let clips = collect_clips(&[folder.clone()]).unwrap();
        assert_eq!(clips, vec![folder.join("a.mp4"), folder.join("b.mp4")]);
    }

    #[test]
    fn edited_namesake_does_not_claim_the_folder() {
        let root = TempDir::new().unwrap();
        let folder = root.path().join("beach_edit");
        std::fs::create_dir(&folder).unwrap();
        touch(&folder.join("beach_edit.mp4"));
        touch(&folder.join("beach.mp4"));

        let clips = collect_clips(&[folder.clone()]).unwrap();
        assert_eq!(clips, vec![folder.join("beach.mp4")]);
    }

    #[test]
    fn repeated_inputs_are_listed_once() {
        let root = TempDir::new().unwrap();
        let folder = root.path().join("beach");
        std::fs::create_dir(&folder).unwrap();
        touch(&folder.join("beach.mp4"));

        let clips = collect_clips(&[folder.clone(), folder.join("beach.mp4")]).unwrap();
        assert_eq!(clips, vec![folder.join("beach.mp4")]);
    }
}
