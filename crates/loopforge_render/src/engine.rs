use crate::audio::{build_audio_args, concat_list, ffmpeg_secs};
use crate::capability::{probe_hw_capability, VAAPI_DEVICE};
use crate::error::{classify_failure, EngineError, RenderError};
use crate::probe::probe_media;
use loopforge_core::planner::LoopPlan;
use loopforge_core::transition::{HwCapability, HwEncoder, TransitionKind, TransitionPlan};
use loopforge_core::types::{AudioTimeline, ClipSpec, TimeUs};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::sync::watch;

/// Rendered output must reach this share of the target duration.
pub const MIN_DURATION_RATIO: f64 = 0.95;

/// stderr lines kept for failure classification.
const STDERR_TAIL: usize = 40;

pub type EngineResult<T> = std::result::Result<T, EngineError>;

// ---------------------------------------------------------------------------
// Engine seam
// ---------------------------------------------------------------------------

/// Everything the engine needs to produce one output video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderInstruction {
    pub clip: ClipSpec,
    pub loop_plan: LoopPlan,
    /// Assembled music track for this job.
    pub audio: PathBuf,
    pub transition: TransitionPlan,
    pub output: PathBuf,
    /// Job-scoped scratch folder for intermediates.
    pub work_dir: PathBuf,
}

/// The external encode/decode collaborator. The orchestrator only looks at
/// the outcome classification of each call.
pub trait RenderEngine: Send + Sync {
    fn probe_clip(&self, path: &Path) -> impl Future<Output = EngineResult<ClipSpec>> + Send;

    fn probe_duration(&self, path: &Path) -> impl Future<Output = EngineResult<TimeUs>> + Send;

    fn probe_capability(&self) -> impl Future<Output = EngineResult<HwCapability>> + Send;

    /// Render `timeline` into one audio file inside `work_dir` and return its
    /// path.
    fn assemble_audio(
        &self,
        timeline: &AudioTimeline,
        work_dir: &Path,
    ) -> impl Future<Output = EngineResult<PathBuf>> + Send;

    fn render(&self, instruction: &RenderInstruction)
        -> impl Future<Output = EngineResult<()>> + Send;

    /// Check a finished output: it exists, is long enough and has audio.
    fn validate_output(
        &self,
        path: &Path,
        target: TimeUs,
    ) -> impl Future<Output = EngineResult<()>> + Send;
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress update during rendering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderProgress {
    /// File name of the output being written.
    pub output: String,
    pub percent: f64,
    pub frame: u64,
    pub fps: f64,
    pub speed: String,
    pub eta_seconds: Option<f64>,
}

/// Parse an ffmpeg stderr progress line.
///
/// Example line: `frame=  123 fps= 60 ... time=00:01:02.05 speed=1.50x`
pub fn parse_progress(line: &str, total_secs: f64) -> Option<RenderProgress> {
    if !line.contains("time=") {
        return None;
    }

    let frame = extract_value(line, "frame=")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    let fps = extract_value(line, "fps=")
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(0.0);

    let speed_str = extract_value(line, "speed=").unwrap_or_default();

    let time_secs = extract_value(line, "time=")
        .and_then(|v| parse_time_str(&v))
        .unwrap_or(0.0);

    let percent = if total_secs > 0.0 {
        (time_secs / total_secs * 100.0).min(100.0)
    } else {
        0.0
    };

    let speed_factor = speed_str
        .trim_end_matches('x')
        .parse::<f64>()
        .unwrap_or(0.0);

    let eta_seconds = if speed_factor > 0.0 && total_secs > time_secs {
        Some((total_secs - time_secs) / speed_factor)
    } else {
        None
    };

    Some(RenderProgress {
        output: String::new(),
        percent,
        frame,
        fps,
        speed: speed_str,
        eta_seconds,
    })
}

/// Extract a value from an ffmpeg key=value progress line.
fn extract_value(line: &str, key: &str) -> Option<String> {
    let start = line.find(key)? + key.len();
    let rest = &line[start..];
    let trimmed = rest.trim_start();
    let end = trimmed
        .find(|c: char| c.is_whitespace())
        .unwrap_or(trimmed.len());
    let val = trimmed[..end].to_string();
    if val.is_empty() {
        None
    } else {
        Some(val)
    }
}

/// Parse an ffmpeg time string like "00:01:02.05" into seconds.
fn parse_time_str(s: &str) -> Option<f64> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours: f64 = parts[0].parse().ok()?;
    let mins: f64 = parts[1].parse().ok()?;
    let secs: f64 = parts[2].parse().ok()?;
    Some(hours * 3600.0 + mins * 60.0 + secs)
}

// ---------------------------------------------------------------------------
// Argument building
// ---------------------------------------------------------------------------

/// ffmpeg `xfade` transition used for each effect kind.
pub fn xfade_name(kind: TransitionKind) -> Option<&'static str> {
    Some(match kind {
        TransitionKind::None => return None,
        TransitionKind::Fade => "fade",
        TransitionKind::SlideLeft => "slideleft",
        TransitionKind::SlideRight => "slideright",
        TransitionKind::Zoom => "zoomin",
        TransitionKind::WipeDown => "wipedown",
        TransitionKind::WipeUp => "wipeup",
        TransitionKind::Blinds => "hlslice",
        TransitionKind::Pixelate => "pixelize",
        TransitionKind::Dissolve => "dissolve",
        TransitionKind::ExpandLine => "horzopen",
    })
}

/// Whether the intro/outro effect can be rendered for this clip: an effect
/// and encoder were selected, the frame size is known and the clip is long
/// enough to hold both ends.
pub fn transition_applies(instruction: &RenderInstruction) -> bool {
    let plan = &instruction.transition;
    let clip = &instruction.clip;
    xfade_name(plan.kind).is_some()
        && plan.encoder.is_some()
        && clip.width > 0
        && clip.height > 0
        && clip.fps > 0.0
        && clip.duration > plan.duration * 2
}

/// Filter graph that fades the clip in from black and back out to black
/// using the selected transition at both ends.
pub fn transition_filter(clip: &ClipSpec, plan: &TransitionPlan, encoder: HwEncoder) -> Option<String> {
    let name = xfade_name(plan.kind)?;
    let d = ffmpeg_secs(plan.duration);
    let outro_at = ffmpeg_secs(clip.duration - plan.duration);
    let black = format!(
        "color=c=black:s={}x{}:r={}:d={d},format=yuv420p,setsar=1,settb=AVTB",
        clip.width, clip.height, clip.fps
    );
    let upload = if encoder == HwEncoder::Vaapi {
        ",format=nv12,hwupload"
    } else {
        ""
    };
    Some(format!(
        "{black}[b0];{black}[b1];\
         [0:v]fps={fps},format=yuv420p,setsar=1,settb=AVTB[src];\
         [b0][src]xfade=transition={name}:duration={d}:offset=0[intro];\
         [intro][b1]xfade=transition={name}:duration={d}:offset={outro_at}{upload}[vout]",
        fps = clip.fps
    ))
}

/// Arguments that re-encode the source clip with its intro/outro effect.
pub fn build_transition_args(instruction: &RenderInstruction, output: &Path) -> Option<Vec<String>> {
    let encoder = instruction.transition.encoder?;
    let graph = transition_filter(&instruction.clip, &instruction.transition, encoder)?;

    let mut args = vec!["-y".to_string()];
    if encoder == HwEncoder::Vaapi {
        args.extend(["-vaapi_device".to_string(), VAAPI_DEVICE.to_string()]);
    }
    args.extend([
        "-i".to_string(),
        instruction.clip.path.to_string_lossy().to_string(),
        "-filter_complex".to_string(),
        graph,
        "-map".to_string(),
        "[vout]".to_string(),
        "-an".to_string(),
        "-c:v".to_string(),
        encoder.codec().to_string(),
        output.to_string_lossy().to_string(),
    ]);
    Some(args)
}

/// Arguments for the final mux: loop `video` by the plan, lay the assembled
/// audio under it and cut at the target. Video is stream-copied, so playback
/// speed is never touched.
pub fn build_render_args(instruction: &RenderInstruction, video: &Path) -> Vec<String> {
    let plan = &instruction.loop_plan;
    vec![
        "-y".to_string(),
        "-stream_loop".to_string(),
        plan.input_repeats().to_string(),
        "-i".to_string(),
        video.to_string_lossy().to_string(),
        "-i".to_string(),
        instruction.audio.to_string_lossy().to_string(),
        "-map".to_string(),
        "0:v:0".to_string(),
        "-map".to_string(),
        "1:a:0".to_string(),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "192k".to_string(),
        "-t".to_string(),
        ffmpeg_secs(plan.target),
        "-movflags".to_string(),
        "+faststart".to_string(),
        instruction.output.to_string_lossy().to_string(),
    ]
}

// ---------------------------------------------------------------------------
// FfmpegEngine
// ---------------------------------------------------------------------------

/// Command for an ffmpeg-family tool. On Unix the child gets its own process
/// group, so a terminal Ctrl-C reaches only loopforge and running encodes
/// are left to finish.
pub(crate) fn tool_command(program: &Path) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    cmd.stdin(std::process::Stdio::null());
    #[cfg(unix)]
    cmd.process_group(0);
    cmd
}

/// [`RenderEngine`] backed by the ffmpeg and ffprobe command-line tools.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    progress: Option<watch::Sender<RenderProgress>>,
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegEngine {
    /// Use `ffmpeg` and `ffprobe` from `PATH`.
    pub fn new() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            progress: None,
        }
    }

    pub fn with_binaries(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            progress: None,
        }
    }

    /// Publish render progress of the final mux on `tx`.
    pub fn with_progress(mut self, tx: watch::Sender<RenderProgress>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// Spawn ffmpeg and wait for it, classifying a failure from its stderr.
    async fn run_ffmpeg(&self, args: &[String], progress: Option<(&str, TimeUs)>) -> EngineResult<()> {
        use std::process::Stdio;
        use tokio::io::{AsyncBufReadExt, BufReader};

        tracing::debug!(args = ?args, "running ffmpeg");

        let mut child = tool_command(&self.ffmpeg)
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RenderError::FfmpegNotFound
                } else {
                    RenderError::Io(e)
                }
            })?;

        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL);
        if let Some(stderr) = child.stderr.take() {
            // ffmpeg ends progress lines with '\r'; split on both.
            let mut reader = BufReader::new(stderr);
            let mut buf = Vec::new();
            while let Ok(n) = reader.read_until(b'\n', &mut buf).await {
                if n == 0 {
                    break;
                }
                for line in String::from_utf8_lossy(&buf).split('\r') {
                    let line = line.trim_end();
                    if line.is_empty() {
                        continue;
                    }
                    if let (Some(tx), Some((label, total))) = (&self.progress, progress) {
                        if let Some(mut p) = parse_progress(line, total.as_seconds()) {
                            p.output = label.to_string();
                            let _ = tx.send(p);
                        }
                    }
                    if tail.len() == STDERR_TAIL {
                        tail.pop_front();
                    }
                    tail.push_back(line.to_string());
                }
                buf.clear();
            }
        }

        let status = child.wait().await.map_err(RenderError::Io)?;
        if status.success() {
            return Ok(());
        }
        let stderr = Vec::from(tail).join("\n");
        Err(classify_failure("ffmpeg", status.code(), &stderr))
    }
}

impl RenderEngine for FfmpegEngine {
    async fn probe_clip(&self, path: &Path) -> EngineResult<ClipSpec> {
        let info = probe_media(&self.ffprobe, path).await?;
        if !info.has_video {
            return Err(EngineError::Permanent(format!(
                "{} has no video stream",
                path.display()
            )));
        }
        if !info.duration.is_positive() {
            return Err(EngineError::Permanent(format!(
                "{} has no usable duration",
                path.display()
            )));
        }
        Ok(info.into_clip(path))
    }

    async fn probe_duration(&self, path: &Path) -> EngineResult<TimeUs> {
        Ok(probe_media(&self.ffprobe, path).await?.duration)
    }

    async fn probe_capability(&self) -> EngineResult<HwCapability> {
        Ok(probe_hw_capability(&self.ffmpeg).await?)
    }

    async fn assemble_audio(&self, timeline: &AudioTimeline, work_dir: &Path) -> EngineResult<PathBuf> {
        let list = work_dir.join("music_concat.txt");
        let output = work_dir.join("music.wav");
        tokio::fs::write(&list, concat_list(timeline))
            .await
            .map_err(RenderError::Io)?;

        let args = build_audio_args(timeline, &list, &output);
        self.run_ffmpeg(&args, None).await?;
        tracing::debug!(path = %output.display(), total = %timeline.total, "assembled music track");
        Ok(output)
    }

    async fn render(&self, instruction: &RenderInstruction) -> EngineResult<()> {
        let label = instruction
            .output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut video = instruction.clip.path.clone();
        if transition_applies(instruction) {
            let effect = instruction.work_dir.join("transition.mp4");
            if let Some(args) = build_transition_args(instruction, &effect) {
                tracing::info!(
                    transition = %instruction.transition.kind,
                    output = %label,
                    "rendering intro/outro effect"
                );
                match self.run_ffmpeg(&args, None).await {
                    Ok(()) => video = effect,
                    Err(e) => tracing::warn!(
                        transition = %instruction.transition.kind,
                        output = %label,
                        error = %e,
                        "transition render failed; rendering without it"
                    ),
                }
            }
        } else if !instruction.transition.kind.is_none() {
            tracing::warn!(
                transition = %instruction.transition.kind,
                clip = %instruction.clip.path.display(),
                "clip too short or unprobed for transition; rendering without it"
            );
        }

        let args = build_render_args(instruction, &video);
        self.run_ffmpeg(&args, Some((label.as_str(), instruction.loop_plan.target)))
            .await
    }

    async fn validate_output(&self, path: &Path, target: TimeUs) -> EngineResult<()> {
        if !path.exists() {
            return Err(EngineError::Permanent(format!(
                "rendered file not found: {}",
                path.display()
            )));
        }
        let info = probe_media(&self.ffprobe, path).await?;
        check_rendered(&info.duration, info.has_audio, target)
    }
}

/// Post-render acceptance rule shared by every engine.
pub fn check_rendered(duration: &TimeUs, has_audio: bool, target: TimeUs) -> EngineResult<()> {
    if duration.as_seconds() < target.as_seconds() * MIN_DURATION_RATIO {
        return Err(EngineError::Permanent(format!(
            "rendered file too short: {duration} (expected {target})"
        )));
    }
    if !has_audio {
        return Err(EngineError::Permanent(
            "rendered file has no audio stream".into(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use super::*;
    use loopforge_core::planner::plan_loops;
    use loopforge_core::transition::{select_transition, TRANSITION_DURATION};

    fn clip(secs: u64) -> ClipSpec {
        ClipSpec {
            path: PathBuf::from("/v/beach.mp4"),
            duration: TimeUs::from_secs(secs),
            fps: 30.0,
            width: 1920,
            height: 1080,
        }
    }

    fn instruction(clip: ClipSpec, target: u64, transition: TransitionPlan) -> RenderInstruction {
        RenderInstruction {
            loop_plan: plan_loops(clip.duration, TimeUs::from_secs(target)).unwrap(),
            clip,
            audio: PathBuf::from("/tmp/job/music.wav"),
            transition,
            output: PathBuf::from("/out/beach_1h.mp4"),
            work_dir: PathBuf::from("/tmp/job"),
        }
    }

    fn nvenc() -> HwCapability {
        HwCapability {
            encoders: vec![HwEncoder::Nvenc],
        }
    }

    #[test]
    fn render_args_loop_and_cut_to_target() {
        let instr = instruction(clip(600), 3650, TransitionPlan::none());
        let args = build_render_args(&instr, &instr.clip.path);

        assert_eq!(args[0], "-y");
        assert_eq!(&args[1..5], ["-stream_loop", "6", "-i", "/v/beach.mp4"]);
        assert!(args.windows(2).any(|w| w == ["-c:v", "copy"]));
        assert!(args.windows(2).any(|w| w == ["-i", "/tmp/job/music.wav"]));
        assert!(args.windows(2).any(|w| w == ["-t", "3650.000000"]));
        assert_eq!(args.last().unwrap(), "/out/beach_1h.mp4");
    }

    #[test]
    fn exact_multiple_loops_one_less() {
        let instr = instruction(clip(600), 3600, TransitionPlan::none());
        let args = build_render_args(&instr, &instr.clip.path);
        assert_eq!(args[2], "5");
    }

    #[test]
    fn trim_plays_input_once() {
        let instr = instruction(clip(900), 300, TransitionPlan::none());
        let args = build_render_args(&instr, &instr.clip.path);
        assert_eq!(args[2], "0");
        assert!(args.windows(2).any(|w| w == ["-t", "300.000000"]));
    }

    #[test]
    fn every_effect_has_an_xfade_name() {
        for kind in TransitionKind::ALL {
            assert_eq!(xfade_name(kind).is_none(), kind.is_none());
        }
    }

    #[test]
    fn transition_filter_fades_both_ends() {
        let plan = select_transition::<String>(TransitionKind::SlideLeft, Ok(nvenc()));
        let graph = transition_filter(&clip(600), &plan, HwEncoder::Nvenc).unwrap();
        assert!(graph.contains("color=c=black:s=1920x1080:r=30:d=1.500000"));
        assert!(graph.contains("xfade=transition=slideleft:duration=1.500000:offset=0[intro]"));
        assert!(graph.contains("offset=598.500000[vout]"));
        assert!(!graph.contains("hwupload"));
    }

    #[test]
    fn vaapi_uploads_frames() {
        let cap = HwCapability {
            encoders: vec![HwEncoder::Vaapi],
        };
        let plan = select_transition::<String>(TransitionKind::Fade, Ok(cap));
        let instr = instruction(clip(600), 3600, plan);
        let args = build_transition_args(&instr, Path::new("/tmp/job/transition.mp4")).unwrap();
        assert_eq!(&args[1..3], ["-vaapi_device", "/dev/dri/renderD128"]);
        assert!(args.iter().any(|a| a.ends_with("hwupload[vout]")));
        assert!(args.windows(2).any(|w| w == ["-c:v", "h264_vaapi"]));
    }

    #[test]
    fn transition_needs_room_for_both_ends() {
        let plan = select_transition::<String>(TransitionKind::Zoom, Ok(nvenc()));
        assert!(transition_applies(&instruction(clip(600), 3600, plan)));

        let short = ClipSpec {
            duration: TRANSITION_DURATION * 2,
            ..clip(1)
        };
        assert!(!transition_applies(&instruction(short, 3600, plan)));

        let downgraded = select_transition::<String>(TransitionKind::Zoom, Ok(HwCapability::default()));
        assert!(!transition_applies(&instruction(clip(600), 3600, downgraded)));
    }

    #[test]
    fn validation_tolerates_five_percent() {
        let target = TimeUs::from_secs(3600);
        assert!(check_rendered(&TimeUs::from_secs(3600), true, target).is_ok());
        assert!(check_rendered(&TimeUs::from_secs(3420), true, target).is_ok());
        assert!(check_rendered(&TimeUs::from_secs(3419), true, target).is_err());
        assert_eq!(
            check_rendered(&target, false, target),
            Err(EngineError::Permanent("rendered file has no audio stream".into()))
        );
    }

    #[test]
    fn parse_progress_extracts_time_and_calculates_percent() {
        let line =
            "frame=  150 fps= 30 q=28.0 size=    1024kB time=00:00:05.00 bitrate= 200.0kbits/s speed=1.50x";
        let progress = parse_progress(line, 10.0).unwrap();

        assert_eq!(progress.frame, 150);
        assert!((progress.fps - 30.0).abs() < 0.01);
        assert!((progress.percent - 50.0).abs() < 0.1);
        assert_eq!(progress.speed, "1.50x");
        assert!((progress.eta_seconds.unwrap() - 3.33).abs() < 0.1);
    }

    #[test]
    fn parse_progress_ignores_other_lines() {
        assert!(parse_progress("Input #0, mov,mp4...", 10.0).is_none());
        assert!(parse_progress("", 10.0).is_none());
    }

    #[test]
    fn parse_time_str_valid_and_invalid() {
        assert!((parse_time_str("00:01:02.05").unwrap() - 62.05).abs() < 0.001);
        assert!((parse_time_str("01:00:00.00").unwrap() - 3600.0).abs() < 0.001);
        assert!(parse_time_str("00:00").is_none());
    }

    #[test]
    fn extract_value_works() {
        let line = "frame=  150 fps= 30.0 time=00:00:05.00 speed=1.50x";
        assert_eq!(extract_value(line, "frame=").unwrap(), "150");
        assert_eq!(extract_value(line, "time=").unwrap(), "00:00:05.00");
        assert!(extract_value(line, "missing=").is_none());
    }

    #[tokio::test]
    async fn missing_output_fails_validation() {
        let engine = FfmpegEngine::new();
        let err = engine
            .validate_output(Path::new("/tmp/loopforge_missing_output.mp4"), TimeUs::from_secs(10))
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn missing_ffmpeg_is_permanent() {
        let engine = FfmpegEngine::with_binaries("/nonexistent/ffmpeg", "/nonexistent/ffprobe");
        let err = engine.run_ffmpeg(&["-version".to_string()], None).await.unwrap_err();
        assert_eq!(err, EngineError::Permanent("ffmpeg not found".into()));
    }

    /// Stand-in ffmpeg: fails any effect render the way NVENC does without a
    /// GPU, otherwise touches its output. Every call is appended to `calls.log`.
    #[cfg(unix)]
    #[tokio::test]
    async fn failed_transition_falls_back_to_plain_clip() {
        use super::test_support::fake_ffmpeg;

        let dir = tempfile::TempDir::new().unwrap();
        let engine = FfmpegEngine::with_binaries(fake_ffmpeg(dir.path()), "/nonexistent/ffprobe");

        let mut instr = instruction(
            clip(600),
            3600,
            select_transition(TransitionKind::Fade, Ok::<_, String>(nvenc())),
        );
        instr.output = dir.path().join("beach_1h.mp4");
        instr.work_dir = dir.path().to_path_buf();
        assert!(transition_applies(&instr));

        engine.render(&instr).await.unwrap();

        assert!(instr.output.exists());
        let calls = std::fs::read_to_string(dir.path().join("calls.log")).unwrap();
        let calls: Vec<&str> = calls.lines().collect();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].contains("-filter_complex"));
        assert!(calls[1].contains("-i /v/beach.mp4"));
        assert!(!calls[1].contains("transition.mp4"));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn tools_run_in_their_own_process_group() {
        // `exec` makes cat the direct child, so its pid is the group id only
        // when the command started a new group.
        let output = tool_command(Path::new("sh"))
            .args(["-c", "exec cat /proc/self/stat"])
            .output()
            .await
            .unwrap();
        let stat = String::from_utf8(output.stdout).unwrap();
        let fields: Vec<&str> = stat.split_whitespace().collect();
        assert_eq!(fields[1], "(cat)");
        assert_eq!(fields[0], fields[4], "pid should lead its process group");
    }
}
