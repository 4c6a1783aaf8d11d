use crate::error::{CoreError, Result};
use crate::types::{AudioTimeline, SongEntry, TimeUs, TimelineEntry};

/// Length of the trailing fade-out applied when fading is enabled.
pub const FADE_OUT: TimeUs = TimeUs(5_000_000);

/// Lay one variant's songs end to end until the timeline reaches `target`.
///
/// The playlist restarts from its first song whenever it runs out, and the
/// song that crosses `target` is cut at the remaining length. With `fade`
/// set, the last [`FADE_OUT`] of the timeline ramps to silence, or the whole
/// timeline when it is shorter than that.
pub fn assemble(songs: &[SongEntry], target: TimeUs, fade: bool) -> Result<AudioTimeline> {
    if !target.is_positive() {
        return Err(CoreError::InvalidDuration(format!(
            "target duration must be positive, got {target}"
        )));
    }
    if songs.is_empty() {
        return Err(CoreError::InvalidInput(
            "cannot assemble a track from an empty song list".into(),
        ));
    }
    if let Some(bad) = songs.iter().find(|s| !s.duration.is_positive()) {
        return Err(CoreError::InvalidDuration(format!(
            "song \"{}\" has non-positive duration {}",
            bad.name, bad.duration
        )));
    }

    let mut entries = Vec::new();
    let mut cursor = TimeUs::ZERO;
    for song in songs.iter().cycle() {
        if cursor >= target {
            break;
        }
        // Stopping exactly on `target` means a zero-length slice is never emitted.
        let duration = song.duration.min(target - cursor);
        entries.push(TimelineEntry {
            song: song.clone(),
            start: cursor,
            duration,
        });
        cursor += duration;
    }

    if cursor != target {
        return Err(CoreError::InvalidDuration(format!(
            "assembled track is {cursor}, expected {target}"
        )));
    }

    let timeline = AudioTimeline {
        entries,
        total: target,
        fade_out: fade.then(|| FADE_OUT.min(target)),
    };
    tracing::debug!(
        slices = timeline.entries.len(),
        total = %timeline.total,
        fade = timeline.has_fade(),
        "assembled audio timeline"
    );
    Ok(timeline)
}
