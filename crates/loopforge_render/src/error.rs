use loopforge_core::error::CoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Classified failure of an external engine call. Only `Transient` failures
/// are worth retrying.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("transient engine failure: {0}")]
    Transient(String),

    #[error("{0}")]
    Permanent(String),
}

impl EngineError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn cause(&self) -> &str {
        match self {
            Self::Transient(c) | Self::Permanent(c) => c,
        }
    }
}

/// stderr fragments (lowercased) that mean the hardware or driver is absent.
/// Checked before the transient markers: an NVENC init failure on a machine
/// without a GPU also prints `OpenEncodeSessionEx failed`.
const PERMANENT_MARKERS: &[&str] = &[
    "no capable devices found",
    "incompatible client key",
    "cannot load libcuda",
    "cannot load libnvidia-encode",
    "no nvenc capable devices",
    "device creation failed",
    "failed to initialise vaapi connection",
    "no device available for encoder",
    "unsupported device",
];

/// stderr fragments (lowercased) that mean "try again later" rather than
/// "this input can never work".
const TRANSIENT_MARKERS: &[&str] = &[
    "resource temporarily unavailable",
    "device or resource busy",
    "temporarily unavailable",
    "openencodesessionex failed",
    "out of memory",
    "cannot allocate memory",
    "connection reset",
    "broken pipe",
];

/// Classify a failed ffmpeg/ffprobe run from its exit code and stderr.
/// `code == None` means the process was killed by a signal.
pub fn classify_failure(program: &str, code: Option<i32>, stderr: &str) -> EngineError {
    let lower = stderr.to_lowercase();
    let detail = last_error_line(stderr);

    let Some(code) = code else {
        return EngineError::Transient(format!("{program} was terminated by a signal"));
    };

    let message = match detail {
        Some(line) => format!("{program} exited with code {code}: {line}"),
        None => format!("{program} exited with code {code}"),
    };

    if PERMANENT_MARKERS.iter().any(|m| lower.contains(m)) {
        EngineError::Permanent(message)
    } else if TRANSIENT_MARKERS.iter().any(|m| lower.contains(m)) {
        EngineError::Transient(message)
    } else {
        EngineError::Permanent(message)
    }
}

/// Last non-empty stderr line, which is where ffmpeg puts the fatal cause.
fn last_error_line(stderr: &str) -> Option<&str> {
    stderr
        .lines()
        .map(str::trim)
        .rev()
        .find(|l| !l.is_empty() && !l.starts_with("frame=") && !l.starts_with("size="))
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to execute ffprobe: {0}")]
    FfprobeExec(String),

    #[error("ffprobe not found")]
    FfprobeNotFound,

    #[error("ffprobe failed: {0}")]
    FfprobeFailed(String),

    #[error("ffmpeg not found")]
    FfmpegNotFound,

    #[error("catalog source error: {0}")]
    Catalog(String),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, RenderError>;

impl From<RenderError> for EngineError {
    /// Tool-level errors surfaced through an engine call. Missing tools and
    /// files cannot fix themselves; only interrupted IO and spawn failures
    /// of a binary that exists are transient.
    fn from(e: RenderError) -> Self {
        match e {
            RenderError::Engine(inner) => inner,
            RenderError::Io(ref io) if io.kind() == std::io::ErrorKind::Interrupted => {
                EngineError::Transient(e.to_string())
            }
            RenderError::FfprobeExec(_) => EngineError::Transient(e.to_string()),
            other => EngineError::Permanent(other.to_string()),
        }
    }
}
