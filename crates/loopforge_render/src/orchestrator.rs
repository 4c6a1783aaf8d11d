//! Batch setup and execution: one render job per (clip, variant), run
//! through a bounded worker pool.

use crate::engine::{EngineResult, RenderEngine, RenderInstruction};
use crate::error::{EngineError, Result};
use crate::upload::{DirectoryUploader, Uploader};
use futures::stream::{self, StreamExt};
use loopforge_core::assembler::assemble;
use loopforge_core::catalog::{match_catalog, AssetIndex, MatchReport};
use loopforge_core::distribution::distribute;
use loopforge_core::error::CoreError;
use loopforge_core::job::{BatchProgress, BatchResult, JobOutcome, JobState, RenderJob};
use loopforge_core::naming::{unique_base, OutputPaths};
use loopforge_core::planner::plan_loops;
use loopforge_core::settings::Settings;
use loopforge_core::timestamps::{render_song_list, render_timestamps, render_timestamps_full};
use loopforge_core::transition::{select_transition, TransitionKind, TransitionPlan};
use loopforge_core::types::{AudioTimeline, Catalog, ClipSpec, DistributionPolicy, TimeUs};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

const CANCELLED: &str = "batch cancelled";

// ---------------------------------------------------------------------------
// Request / options
// ---------------------------------------------------------------------------

/// What to render in one batch.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub clips: Vec<PathBuf>,
    /// Snapshot fetched before setup; never mutated by the batch.
    pub catalog: Catalog,
    pub assets: AssetIndex,
    pub output_dir: PathBuf,
    pub target: TimeUs,
    pub variants: usize,
    pub songs_per_variant: usize,
    pub min_songs: usize,
    pub policy: DistributionPolicy,
    pub transition: TransitionKind,
    pub fade_audio: bool,
    pub export_timestamps: bool,
    /// Fixed seed for random distribution; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl BatchRequest {
    pub fn from_settings(
        settings: &Settings,
        clips: Vec<PathBuf>,
        catalog: Catalog,
        assets: AssetIndex,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            clips,
            catalog,
            assets,
            output_dir,
            target: settings.target(),
            variants: settings.variants,
            songs_per_variant: settings.songs_per_variant,
            min_songs: settings.min_songs(),
            policy: settings.distribution,
            transition: settings.requested_transition(),
            fade_audio: settings.fade_audio,
            export_timestamps: settings.export_timestamp,
            seed: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub max_workers: usize,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_workers: 1,
            max_attempts: 3,
            retry_backoff: Duration::from_millis(2000),
        }
    }
}

impl BatchOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_workers: settings.max_workers.max(1),
            max_attempts: settings.max_attempts.max(1),
            retry_backoff: Duration::from_millis(settings.retry_backoff_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator<E, U = DirectoryUploader> {
    engine: E,
    uploader: Option<U>,
    options: BatchOptions,
    cancel: CancellationToken,
    progress: watch::Sender<BatchProgress>,
}

impl<E: RenderEngine> Orchestrator<E> {
    pub fn new(engine: E, options: BatchOptions) -> Self {
        Self {
            engine,
            uploader: None,
            options,
            cancel: CancellationToken::new(),
            progress: watch::channel(BatchProgress::default()).0,
        }
    }
}

impl<E: RenderEngine, U: Uploader> Orchestrator<E, U> {
    pub fn with_uploader<V: Uploader>(self, uploader: V) -> Orchestrator<E, V> {
        Orchestrator {
            engine: self.engine,
            uploader: Some(uploader),
            options: self.options,
            cancel: self.cancel,
            progress: self.progress,
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops dispatch of new jobs when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BatchProgress> {
        self.progress.subscribe()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Run a whole batch. Only setup problems (catalog matching, distribution,
    /// bad target) are returned as errors; per-job failures land in the
    /// [`BatchResult`].
    pub async fn run(&self, request: BatchRequest) -> Result<BatchResult> {
        let span = tracing::info_span!("batch", id = %Uuid::new_v4());
        self.run_inner(request).instrument(span).await
    }

    async fn run_inner(&self, request: BatchRequest) -> Result<BatchResult> {
        let setup = self.setup(&request).await?;
        let total = setup.jobs.len() + setup.failed.len();
        tracing::info!(
            jobs = total,
            clips = request.clips.len(),
            variants = request.variants,
            workers = self.options.max_workers,
            "batch setup complete"
        );

        self.progress.send_replace(BatchProgress {
            completed: setup.failed.len(),
            total,
            current: None,
        });

        let request = &request;
        let mut outcomes: Vec<JobOutcome> = stream::iter(setup.jobs)
            .map(|job| self.run_job(job, request))
            .buffer_unordered(self.options.max_workers.max(1))
            .collect()
            .await;
        outcomes.extend(setup.failed);

        let result = BatchResult::new(outcomes, setup.warnings);
        tracing::info!(
            succeeded = result.succeeded,
            failed = result.failed,
            skipped = result.skipped,
            "batch finished"
        );
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Setup
    // -----------------------------------------------------------------------

    async fn setup(&self, request: &BatchRequest) -> Result<BatchSetup> {
        if !request.target.is_positive() {
            return Err(CoreError::InvalidDuration(format!(
                "target duration must be positive, got {}",
                request.target
            ))
            .into());
        }

        let mut warnings = Vec::new();

        // 1. catalog -> eligible pool
        let report =
            resolve_catalog(&self.engine, &request.catalog, &request.assets, request.min_songs).await?;
        warnings.extend(report.warnings());

        // 2. eligible pool -> variants
        let mut rng = match request.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let plan = distribute(
            &report.eligible,
            request.variants,
            request.songs_per_variant,
            request.policy,
            &mut rng,
        )?;

        // 3. one capability probe for the whole batch
        let transition = if request.transition.is_none() {
            TransitionPlan::none()
        } else {
            select_transition(request.transition, self.engine.probe_capability().await)
        };
        if let Some(warning) = transition.warning() {
            warnings.push(warning);
        }

        let timelines: Vec<AudioTimeline> = plan
            .variants
            .iter()
            .map(|songs| assemble(songs, request.target, request.fade_audio))
            .collect::<std::result::Result<_, _>>()?;

        // 4. probe each clip once and enumerate jobs clip-major
        let variant_count = plan.variant_count();
        let mut jobs = Vec::new();
        let mut failed = Vec::new();
        let mut taken_bases = HashSet::new();
        for (clip_idx, clip_path) in request.clips.iter().enumerate() {
            let clip = self.probe_clip(clip_path).await;
            let stem = clip
                .as_ref()
                .map(ClipSpec::base_name)
                .unwrap_or_else(|_| file_stem(clip_path));
            let base = unique_base(&stem, &mut taken_bases);
            if base != stem {
                tracing::warn!(clip = %clip_path.display(), %base, "clip name already used in this batch; renaming outputs");
                warnings.push(format!(
                    "{} shares its name with another clip; outputs are named {base}",
                    clip_path.display()
                ));
            }
            for (variant, timeline) in timelines.iter().enumerate() {
                let id = clip_idx * variant_count + variant;
                let outputs =
                    OutputPaths::new(&request.output_dir, &base, variant, variant_count, request.target);

                let planned = clip.clone().and_then(|spec| {
                    let loop_plan = plan_loops(spec.duration, request.target)
                        .map_err(|e| e.to_string())?;
                    Ok((spec, loop_plan))
                });
                match planned {
                    Ok((spec, loop_plan)) => jobs.push(RenderJob {
                        id,
                        clip: spec,
                        variant,
                        target: request.target,
                        loop_plan,
                        timeline: timeline.clone(),
                        transition,
                        outputs,
                    }),
                    Err(cause) => {
                        tracing::error!(job = id, clip = %clip_path.display(), %cause, "job cannot be planned");
                        failed.push(JobOutcome {
                            job_id: id,
                            clip: clip_path.clone(),
                            variant,
                            state: JobState::Failed(cause),
                            attempts: 0,
                            outputs: None,
                            warnings: Vec::new(),
                        });
                    }
                }
            }
        }

        Ok(BatchSetup {
            jobs,
            failed,
            warnings,
        })
    }

    async fn probe_clip(&self, path: &Path) -> std::result::Result<ClipSpec, String> {
        let (result, _) = self
            .retry_engine("probe_clip", None, || self.engine.probe_clip(path))
            .await;
        result
            .and_then(|spec| {
                if spec.duration.is_positive() {
                    Ok(spec)
                } else {
                    Err(EngineError::Permanent("clip has zero duration".into()))
                }
            })
            .map_err(|e| {
                CoreError::InvalidDuration(format!("{}: {}", path.display(), e.cause())).to_string()
            })
    }

    // -----------------------------------------------------------------------
    // Per-job execution
    // -----------------------------------------------------------------------

    async fn run_job(&self, job: RenderJob, request: &BatchRequest) -> JobOutcome {
        let mut outcome = JobOutcome {
            job_id: job.id,
            clip: job.clip.path.clone(),
            variant: job.variant,
            state: JobState::Planned,
            attempts: 0,
            outputs: None,
            warnings: Vec::new(),
        };

        if self.cancel.is_cancelled() {
            tracing::info!(job = job.id, "skipping job; batch cancelled");
            outcome.state = JobState::Skipped(CANCELLED.into());
            self.progress.send_modify(|p| p.completed += 1);
            return outcome;
        }

        let label = job.label();
        self.progress
            .send_modify(|p| p.current = Some(label.clone()));
        outcome.state = JobState::Rendering;
        tracing::info!(job = job.id, variant = job.variant, output = %label, "rendering");

        match self.execute_job(&job, request).await {
            Ok(attempts) => {
                outcome.attempts = attempts;
                outcome.state = JobState::Succeeded;
                outcome.outputs = Some(job.outputs.clone());
                if let Some(warning) = self.upload(&job, request).await {
                    outcome.warnings.push(warning);
                }
                tracing::info!(job = job.id, output = %label, attempts, "job succeeded");
            }
            Err(failure) => {
                outcome.attempts = failure.attempts;
                remove_written(&failure.written).await;
                tracing::error!(job = job.id, output = %label, cause = %failure.cause, "job failed");
                outcome.state = JobState::Failed(failure.cause);
            }
        }

        self.progress.send_modify(|p| p.completed += 1);
        outcome
    }

    /// Render one job inside its own scratch folder. The folder is removed
    /// when this returns, whatever the outcome.
    ///
    /// The video is rendered under its partial name and only moved over the
    /// final name once it has been checked, so a failed job never clobbers
    /// a file it did not write.
    async fn execute_job(
        &self,
        job: &RenderJob,
        request: &BatchRequest,
    ) -> std::result::Result<u32, JobFailure> {
        let scratch = tempfile::Builder::new()
            .prefix("loopforge-job-")
            .tempdir()
            .map_err(|e| JobFailure::new(format!("cannot create scratch folder: {e}"), 0))?;
        let work_dir = scratch.path();

        let timeline = &job.timeline;
        let (audio, _) = self
            .retry_engine("assemble_audio", Some(job.id), || {
                self.engine.assemble_audio(timeline, work_dir)
            })
            .await;
        let audio = audio.map_err(|e| JobFailure::engine("audio assembly", &e, 0))?;

        if let Some(parent) = job.outputs.video.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| JobFailure::new(format!("cannot create output folder: {e}"), 0))?;
        }

        let partial = job.outputs.partial_video();
        let mut written = vec![partial.clone()];
        let instruction = RenderInstruction {
            clip: job.clip.clone(),
            loop_plan: job.loop_plan,
            audio,
            transition: job.transition,
            output: partial.clone(),
            work_dir: work_dir.to_path_buf(),
        };
        let instruction = &instruction;
        let (rendered, attempts) = self
            .retry_engine("render", Some(job.id), || self.engine.render(instruction))
            .await;
        rendered.map_err(|e| JobFailure::engine("render", &e, attempts).wrote(&written))?;

        let (validated, _) = self
            .retry_engine("validate", Some(job.id), || {
                self.engine.validate_output(&partial, job.target)
            })
            .await;
        validated
            .map_err(|e| JobFailure::engine("post-render check", &e, attempts).wrote(&written))?;

        tokio::fs::rename(&partial, &job.outputs.video)
            .await
            .map_err(|e| {
                JobFailure::new(format!("cannot move render into place: {e}"), attempts)
                    .wrote(&written)
            })?;
        written.push(job.outputs.video.clone());

        write_song_files(job, request.export_timestamps, &mut written)
            .await
            .map_err(|e| {
                JobFailure::new(format!("cannot write song list: {e}"), attempts).wrote(&written)
            })?;

        drop(scratch);
        Ok(attempts)
    }

    /// Returns a warning when the upload fails; the job still counts as
    /// succeeded.
    async fn upload(&self, job: &RenderJob, request: &BatchRequest) -> Option<String> {
        let uploader = self.uploader.as_ref()?;
        let mut files = vec![job.outputs.video.clone(), job.outputs.song_list.clone()];
        if request.export_timestamps {
            files.push(job.outputs.timestamps.clone());
            files.push(job.outputs.timestamps_full.clone());
        }
        match uploader.upload(&files).await {
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(job = job.id, error = %e, "upload failed");
                Some(format!("upload of {} failed: {e}", job.label()))
            }
        }
    }

    /// Call an engine operation, retrying transient failures up to
    /// `max_attempts` times. Returns the final result and attempts spent.
    async fn retry_engine<T, F, Fut>(
        &self,
        stage: &str,
        job: Option<usize>,
        mut op: F,
    ) -> (EngineResult<T>, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = EngineResult<T>>,
    {
        let max_attempts = self.options.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return (Ok(value), attempt),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    tracing::warn!(
                        ?job,
                        stage,
                        attempt,
                        max_attempts,
                        wait = ?self.options.retry_backoff,
                        error = %err,
                        "transient engine failure; retrying"
                    );
                    if !self.options.retry_backoff.is_zero() {
                        tokio::time::sleep(self.options.retry_backoff).await;
                    }
                }
                Err(err) => return (Err(err), attempt),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Match `catalog` against `assets`, reading each resolved asset's duration
/// through `engine` (once per distinct file). Probe failures leave the entry
/// unresolved.
pub async fn resolve_catalog<E: RenderEngine>(
    engine: &E,
    catalog: &Catalog,
    assets: &AssetIndex,
    min_songs: usize,
) -> Result<MatchReport> {
    let mut durations: HashMap<PathBuf, EngineResult<TimeUs>> = HashMap::new();
    for entry in catalog.entries() {
        let Some(path) = assets.resolve(&entry.name) else {
            continue;
        };
        if durations.contains_key(path) {
            continue;
        }
        let duration = engine.probe_duration(path).await;
        durations.insert(path.to_path_buf(), duration);
    }

    let report = match_catalog(catalog, assets, min_songs, |path| {
        durations
            .get(path)
            .cloned()
            .unwrap_or_else(|| Err(EngineError::Permanent("not probed".into())))
    })?;
    Ok(report)
}

struct BatchSetup {
    jobs: Vec<RenderJob>,
    /// Jobs that failed before rendering (unprobeable clip).
    failed: Vec<JobOutcome>,
    warnings: Vec<String>,
}

struct JobFailure {
    cause: String,
    attempts: u32,
    /// Files this job created or overwrote; removed on failure.
    written: Vec<PathBuf>,
}

impl JobFailure {
    fn new(cause: String, attempts: u32) -> Self {
        Self {
            cause,
            attempts,
            written: Vec::new(),
        }
    }

    fn wrote(mut self, paths: &[PathBuf]) -> Self {
        self.written = paths.to_vec();
        self
    }

    fn engine(stage: &str, err: &EngineError, attempts: u32) -> Self {
        let kind = if err.is_transient() {
            "transient failure persisted"
        } else {
            "failed"
        };
        Self::new(format!("{stage} {kind}: {}", err.cause()), attempts)
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}

/// Write the side files, recording each path before it is touched.
async fn write_song_files(
    job: &RenderJob,
    export_timestamps: bool,
    written: &mut Vec<PathBuf>,
) -> std::io::Result<()> {
    let mut files = vec![(&job.outputs.song_list, render_song_list(&job.timeline))];
    if export_timestamps {
        files.push((&job.outputs.timestamps, render_timestamps(&job.timeline)));
        files.push((
            &job.outputs.timestamps_full,
            render_timestamps_full(&job.timeline),
        ));
    }
    for (path, contents) in files {
        written.push(path.clone());
        tokio::fs::write(path, contents).await?;
    }
    Ok(())
}

async fn remove_written(paths: &[PathBuf]) {
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::debug!(path = %path.display(), "removed partial output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "could not remove partial output"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
