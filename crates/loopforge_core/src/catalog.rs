use crate::error::{CoreError, Result};
use crate::types::{Catalog, SongEntry, TimeUs};
use std::collections::HashMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};

/// Extension of the audio assets the music folder holds.
pub const ASSET_EXTENSION: &str = "wav";

// ---------------------------------------------------------------------------
// AssetIndex
// ---------------------------------------------------------------------------

/// Name -> file lookup over a folder of audio assets. Keys are file stems and
/// lookups are exact and case-sensitive.
#[derive(Debug, Clone, Default)]
pub struct AssetIndex {
    by_name: HashMap<String, PathBuf>,
}

impl AssetIndex {
    /// Index every `.wav` file (extension matched case-insensitively) directly
    /// inside `dir`.
    pub fn scan(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut by_name = HashMap::new();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let is_asset = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case(ASSET_EXTENSION))
                .unwrap_or(false);
            if !is_asset {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                by_name.insert(stem.to_string(), path.clone());
            }
        }

        tracing::debug!(dir = %dir.display(), assets = by_name.len(), "indexed music folder");
        Ok(Self { by_name })
    }

    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, PathBuf)>,
        S: Into<String>,
    {
        Self {
            by_name: entries.into_iter().map(|(n, p)| (n.into(), p)).collect(),
        }
    }

    pub fn resolve(&self, name: &str) -> Option<&Path> {
        self.by_name.get(name).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MatchReport {
    /// The full catalog with resolution results filled in; unresolved
    /// entries are kept for reporting.
    pub catalog: Catalog,
    /// Resolved entries in catalog (recency) order.
    pub eligible: Vec<SongEntry>,
    /// Display names that did not resolve to a usable asset, in catalog order.
    pub unresolved: Vec<String>,
}

impl MatchReport {
    /// The `n` most recent eligible songs.
    pub fn newest(&self, n: usize) -> &[SongEntry] {
        &self.eligible[..n.min(self.eligible.len())]
    }

    /// One human-readable warning per unresolved entry.
    pub fn warnings(&self) -> Vec<String> {
        self.unresolved
            .iter()
            .map(|name| format!("no audio asset for \"{name}\" ({name}.{ASSET_EXTENSION})"))
            .collect()
    }
}

/// Resolve every catalog entry against `assets`, probing each match for its
/// duration. Entries that are missing or whose duration cannot be read are
/// excluded from the eligible pool. Fails with `InsufficientSongs` when fewer
/// than `min_required` entries resolve.
pub fn match_catalog<F, E>(
    catalog: &Catalog,
    assets: &AssetIndex,
    min_required: usize,
    mut probe_duration: F,
) -> Result<MatchReport>
where
    F: FnMut(&Path) -> std::result::Result<TimeUs, E>,
    E: Display,
{
    let mut resolved = Vec::with_capacity(catalog.len());
    let mut eligible = Vec::new();
    let mut unresolved = Vec::new();

    for entry in catalog.entries() {
        let mut entry = entry.clone();
        entry.asset = None;
        entry.duration = TimeUs::ZERO;

        if let Some(path) = assets.resolve(&entry.name) {
            match probe_duration(path) {
                Ok(duration) if duration.is_positive() => {
                    entry.asset = Some(path.to_path_buf());
                    entry.duration = duration;
                }
                Ok(_) => {
                    tracing::warn!(song = %entry.name, path = %path.display(), "audio asset has zero duration");
                }
                Err(e) => {
                    tracing::warn!(song = %entry.name, path = %path.display(), error = %e, "could not read audio duration");
                }
            }
        }

        if entry.is_resolved() {
            eligible.push(entry.clone());
        } else if !unresolved.contains(&entry.name) {
            unresolved.push(entry.name.clone());
        }
        resolved.push(entry);
    }

    if !unresolved.is_empty() {
        tracing::warn!(
            missing = unresolved.len(),
            eligible = eligible.len(),
            "some catalog entries have no matching audio asset"
        );
    }

    if eligible.len() < min_required {
        return Err(CoreError::InsufficientSongs {
            required: min_required,
            available: eligible.len(),
            missing: unresolved,
        });
    }

    Ok(MatchReport {
        catalog: Catalog::new(resolved),
        eligible,
        unresolved,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn catalog(names: &[&str]) -> Catalog {
        Catalog::new(
            names
                .iter()
                .enumerate()
                .map(|(i, n)| SongEntry::new(i as u32 + 1, *n))
                .collect(),
        )
    }

    fn index(names: &[&str]) -> AssetIndex {
        AssetIndex::from_entries(
            names
                .iter()
                .map(|n| (*n, PathBuf::from(format!("/music/{n}.wav")))),
        )
    }

    fn fixed_probe(_: &Path) -> std::result::Result<TimeUs, String> {
        Ok(TimeUs::from_secs(200))
    }

    #[test]
    fn all_entries_resolve() {
        let report = match_catalog(&catalog(&["a", "b", "c"]), &index(&["a", "b", "c"]), 3, fixed_probe)
            .unwrap();
        assert_eq!(report.eligible.len(), 3);
        assert!(report.unresolved.is_empty());
        assert_eq!(report.eligible[0].asset, Some(PathBuf::from("/music/a.wav")));
        assert_eq!(report.eligible[0].duration, TimeUs::from_secs(200));
    }

    #[test]
    fn missing_asset_is_reported_but_setup_proceeds() {
        let report = match_catalog(
            &catalog(&["One Love", "Amazing", "Jamming"]),
            &index(&["One Love", "Jamming"]),
            2,
            fixed_probe,
        )
        .unwrap();
        assert_eq!(report.unresolved, vec!["Amazing".to_string()]);
        let names: Vec<&str> = report.eligible.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["One Love", "Jamming"]);
        // unresolved entry stays in the catalog snapshot
        assert_eq!(report.catalog.len(), 3);
        assert!(report.warnings()[0].contains("Amazing.wav"));
    }

    #[test]
    fn missing_asset_below_minimum_fails_with_names() {
        let err = match_catalog(
            &catalog(&["One Love", "Amazing", "Jamming"]),
            &index(&["One Love", "Jamming"]),
            3,
            fixed_probe,
        )
        .unwrap_err();
        match err {
            CoreError::InsufficientSongs {
                required,
                available,
                missing,
            } => {
                assert_eq!(required, 3);
                assert_eq!(available, 2);
                assert_eq!(missing, vec!["Amazing".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let report =
            match_catalog(&catalog(&["amazing"]), &index(&["Amazing"]), 0, fixed_probe).unwrap();
        assert!(report.eligible.is_empty());
        assert_eq!(report.unresolved, vec!["amazing".to_string()]);
    }

    #[test]
    fn unprobeable_asset_counts_as_unresolved() {
        let probe = |p: &Path| -> std::result::Result<TimeUs, String> {
            if p.ends_with("bad.wav") {
                Err("corrupt header".into())
            } else if p.ends_with("empty.wav") {
                Ok(TimeUs::ZERO)
            } else {
                Ok(TimeUs::from_secs(100))
            }
        };
        let report = match_catalog(
            &catalog(&["good", "bad", "empty"]),
            &index(&["good", "bad", "empty"]),
            1,
            probe,
        )
        .unwrap();
        assert_eq!(report.eligible.len(), 1);
        assert_eq!(report.unresolved, vec!["bad".to_string(), "empty".to_string()]);
    }

    #[test]
    fn eligible_pool_keeps_recency_order() {
        let report = match_catalog(
            &catalog(&["newest", "gone", "middle", "oldest"]),
            &index(&["oldest", "middle", "newest"]),
            0,
            fixed_probe,
        )
        .unwrap();
        let names: Vec<&str> = report.newest(2).iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["newest", "middle"]);
        assert_eq!(report.newest(10).len(), 3);
    }

    #[test]
    fn scan_indexes_wav_files_only() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("12_Amazing.wav"), b"").unwrap();
        std::fs::write(dir.path().join("13_Loud.WAV"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        std::fs::create_dir(dir.path().join("sub.wav")).unwrap();

        let index = AssetIndex::scan(dir.path()).unwrap();
        assert_eq!(index.len(), 2);
        assert!(index.resolve("12_Amazing").is_some());
        assert!(index.resolve("13_Loud").is_some());
        assert!(index.resolve("notes").is_none());
    }

    #[test]
    fn scan_missing_folder_is_an_error() {
        assert!(AssetIndex::scan("/tmp/does_not_exist_loopforge_music").is_err());
    }
}
