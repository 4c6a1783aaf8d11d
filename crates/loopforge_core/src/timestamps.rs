//! Song list and timestamp text derived from an [`AudioTimeline`].
//!
//! Everything here is a pure function of the timeline, so rendering the same
//! timeline twice produces identical bytes.

use crate::types::{AudioTimeline, TimeUs, TimelineEntry};
use std::fmt::Write;

/// One timeline slice as it appears in the text reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampRecord<'a> {
    /// Full display name (`"12_Amazing"`).
    pub name: &'a str,
    /// Display name without the numeric id prefix (`"Amazing"`).
    pub short_name: &'a str,
    pub start: TimeUs,
    pub duration: TimeUs,
}

/// Iterator over a timeline's records. A clone is an independent cursor, so
/// the same records can be walked more than once.
#[derive(Debug, Clone)]
pub struct TimestampRecords<'a> {
    inner: std::slice::Iter<'a, TimelineEntry>,
}

impl<'a> Iterator for TimestampRecords<'a> {
    type Item = TimestampRecord<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|entry| TimestampRecord {
            name: &entry.song.name,
            short_name: entry.song.short_name(),
            start: entry.start,
            duration: entry.duration,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for TimestampRecords<'_> {}

pub fn records(timeline: &AudioTimeline) -> TimestampRecords<'_> {
    TimestampRecords {
        inner: timeline.entries.iter(),
    }
}

/// Display names in play order, one per line.
pub fn render_song_list(timeline: &AudioTimeline) -> String {
    records(timeline).fold(String::new(), |mut out, r| {
        out.push_str(r.name);
        out.push('\n');
        out
    })
}

/// `HH:MM:SS <short name>` per line, ready to paste into a video description.
pub fn render_timestamps(timeline: &AudioTimeline) -> String {
    render_with(timeline, |r| r.short_name)
}

/// `HH:MM:SS <display name>` per line.
pub fn render_timestamps_full(timeline: &AudioTimeline) -> String {
    render_with(timeline, |r| r.name)
}

fn render_with<'a>(
    timeline: &'a AudioTimeline,
    label: impl Fn(&TimestampRecord<'a>) -> &'a str,
) -> String {
    let mut out = String::new();
    for record in records(timeline) {
        // Writing into a String cannot fail.
        let _ = writeln!(out, "{} {}", record.start.hms(), label(&record));
    }
    out
}
