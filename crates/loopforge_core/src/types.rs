use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Sub};
use std::path::PathBuf;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// TimeUs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimeUs(pub i64);

impl TimeUs {
    pub const ZERO: Self = Self(0);

    pub fn from_seconds(s: f64) -> Self {
        Self((s * 1_000_000.0).round() as i64)
    }

    /// Saturates at `i64::MAX` microseconds instead of wrapping.
    pub fn from_secs(s: u64) -> Self {
        let secs = i64::try_from(s).unwrap_or(i64::MAX);
        Self(secs.saturating_mul(1_000_000))
    }

    pub fn as_seconds(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Whole seconds, truncated toward zero.
    pub fn whole_seconds(&self) -> i64 {
        self.0 / 1_000_000
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// `HH:MM:SS`, truncated to the second. Used for song timestamps.
    pub fn hms(&self) -> String {
        let total_secs = self.0.unsigned_abs() / 1_000_000;
        let secs = total_secs % 60;
        let mins = (total_secs / 60) % 60;
        let hours = total_secs / 3600;
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{sign}{hours:02}:{mins:02}:{secs:02}")
    }
}

impl Add for TimeUs {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for TimeUs {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for TimeUs {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Mul<i64> for TimeUs {
    type Output = Self;
    fn mul(self, rhs: i64) -> Self {
        Self(self.0 * rhs)
    }
}

impl Div<i64> for TimeUs {
    type Output = Self;
    fn div(self, rhs: i64) -> Self {
        Self(self.0 / rhs)
    }
}

impl fmt::Display for TimeUs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_us = self.0.unsigned_abs();
        let total_ms = total_us / 1_000;
        let ms = total_ms % 1_000;
        let total_secs = total_ms / 1_000;
        let secs = total_secs % 60;
        let total_mins = total_secs / 60;
        let mins = total_mins % 60;
        let hours = total_mins / 60;
        if self.0 < 0 {
            write!(f, "-{:02}:{:02}:{:02}.{:03}", hours, mins, secs, ms)
        } else {
            write!(f, "{:02}:{:02}:{:02}.{:03}", hours, mins, secs, ms)
        }
    }
}

// ---------------------------------------------------------------------------
// ClipSpec
// ---------------------------------------------------------------------------

/// A probed source clip. Immutable once probed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClipSpec {
    pub path: PathBuf,
    pub duration: TimeUs,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

impl ClipSpec {
    /// File stem of the source, used as the base of every output name.
    pub fn base_name(&self) -> String {
        self.path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string())
    }
}

// ---------------------------------------------------------------------------
// SongEntry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SongEntry {
    pub id: u32,
    /// Display name; also the stem of the audio asset (`<name>.wav`).
    pub name: String,
    pub week: Option<String>,
    /// Resolved local asset. `None` means unmatched.
    pub asset: Option<PathBuf>,
    pub duration: TimeUs,
}

impl SongEntry {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            week: None,
            asset: None,
            duration: TimeUs::ZERO,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.asset.is_some() && self.duration.is_positive()
    }

    /// Display name without the leading numeric id (`"12_Amazing"` -> `"Amazing"`).
    pub fn short_name(&self) -> &str {
        match self.name.split_once('_') {
            Some((prefix, rest))
                if !prefix.is_empty() && prefix.bytes().all(|b| b.is_ascii_digit()) =>
            {
                rest
            }
            _ => &self.name,
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Immutable, recency-ordered snapshot of the song catalog (newest first).
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Arc<[SongEntry]>,
}

impl Catalog {
    pub fn new(entries: Vec<SongEntry>) -> Self {
        Self {
            entries: entries.into(),
        }
    }

    pub fn entries(&self) -> &[SongEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Distribution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistributionPolicy {
    #[default]
    Sequential,
    Random,
}

impl std::str::FromStr for DistributionPolicy {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(Self::Sequential),
            "random" => Ok(Self::Random),
            other => Err(crate::error::CoreError::InvalidInput(format!(
                "unknown distribution policy: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistributionPlan {
    pub policy: DistributionPolicy,
    /// One ordered song sequence per variant.
    pub variants: Vec<Vec<SongEntry>>,
}

impl DistributionPlan {
    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }
}

// ---------------------------------------------------------------------------
// AudioTimeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineEntry {
    pub song: SongEntry,
    pub start: TimeUs,
    pub duration: TimeUs,
}

impl TimelineEntry {
    pub fn end(&self) -> TimeUs {
        self.start + self.duration
    }
}

/// Assembled music track for one job variant. Replaced, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioTimeline {
    pub entries: Vec<TimelineEntry>,
    pub total: TimeUs,
    /// Length of the trailing fade-out, if one was applied.
    pub fade_out: Option<TimeUs>,
}

impl AudioTimeline {
    pub fn has_fade(&self) -> bool {
        self.fade_out.is_some()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
