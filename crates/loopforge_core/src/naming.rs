use crate::types::TimeUs;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Marker in a file name that flags an already-edited render.
const EDIT_MARKER: &str = "_edit";

/// `1h`, `2h` for whole hours, otherwise the raw seconds (`3650s`).
pub fn duration_suffix(target: TimeUs) -> String {
    let secs = target.whole_seconds();
    if secs > 0 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else {
        format!("{secs}s")
    }
}

/// Output file set for one job, all inside the output folder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputPaths {
    pub video: PathBuf,
    pub song_list: PathBuf,
    pub timestamps: PathBuf,
    pub timestamps_full: PathBuf,
}

impl OutputPaths {
    /// Build the names for variant `variant` (0-based) of `variant_count`
    /// rendered from a clip named `base`. A lone variant gets no `_Part`
    /// marker.
    pub fn new(
        output_dir: &Path,
        base: &str,
        variant: usize,
        variant_count: usize,
        target: TimeUs,
    ) -> Self {
        let stem = if variant_count > 1 {
            format!("{base}_Part{}", variant + 1)
        } else {
            base.to_string()
        };
        let suffix = duration_suffix(target);
        Self {
            video: output_dir.join(format!("{stem}_{suffix}.mp4")),
            song_list: output_dir.join(format!("{stem}_song_list.txt")),
            timestamps: output_dir.join(format!("{stem}_song_list_timestamp.txt")),
            timestamps_full: output_dir.join(format!("{stem}_song_list_timestamp_full.txt")),
        }
    }

    /// Where the video is rendered before it is checked and moved into
    /// place: `beach_1h.mp4` renders to `beach_1h.partial.mp4`.
    pub fn partial_video(&self) -> PathBuf {
        let stem = self
            .video
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.video.with_file_name(format!("{stem}.partial.mp4"))
    }

    /// Every path in the set, video first.
    pub fn all(&self) -> [&Path; 4] {
        [
            self.video.as_path(),
            self.song_list.as_path(),
            self.timestamps.as_path(),
            self.timestamps_full.as_path(),
        ]
    }
}

/// Reserve an output base name for a clip. The first clip with a given stem
/// keeps it; later clips sharing the stem get `_2`, `_3`, ... appended.
pub fn unique_base(stem: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(stem.to_string()) {
        return stem.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{stem}_{n}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// `true` for files whose name contains `_edit` in any case.
pub fn is_edit_file(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase().contains(EDIT_MARKER))
        .unwrap_or(false)
}

/// `true` for `.mp4` inputs that are not edit renders.
pub fn is_source_clip(path: &Path) -> bool {
    let is_mp4 = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("mp4"))
        .unwrap_or(false);
    is_mp4 && !is_edit_file(path)
}
