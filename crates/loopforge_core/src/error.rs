use thiserror::Error;

/// How many missing names the `InsufficientSongs` message spells out.
const MISSING_PREVIEW: usize = 10;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error(
        "only {available} of {required} songs resolved to audio files; {}",
        missing_detail(.missing, .available)
    )]
    InsufficientSongs {
        required: usize,
        available: usize,
        missing: Vec<String>,
    },

    #[error("catalog exhausted: distribution needs {needed} songs but only {available} are eligible")]
    CatalogExhausted { needed: usize, available: usize },

    #[error("unknown transition: {0}")]
    InvalidTransition(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

fn missing_detail(missing: &[String], available: impl std::fmt::Display) -> String {
    if missing.is_empty() {
        return format!("catalog has only {available} eligible entries");
    }
    format!("missing:\n{}", preview_missing(missing))
}

fn preview_missing(missing: &[String]) -> String {
    let mut lines: Vec<String> = missing
        .iter()
        .take(MISSING_PREVIEW)
        .map(|name| format!("  {name}"))
        .collect();
    if missing.len() > MISSING_PREVIEW {
        lines.push(format!("  … and {} more", missing.len() - MISSING_PREVIEW));
    }
    lines.join("\n")
}
