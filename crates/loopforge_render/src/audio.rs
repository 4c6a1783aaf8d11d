//! Turning an [`AudioTimeline`] into a single WAV with ffmpeg's concat
//! demuxer.

use loopforge_core::types::{AudioTimeline, TimeUs};
use std::fmt::Write;
use std::path::Path;

/// Seconds with microsecond precision, as ffmpeg time arguments expect.
pub(crate) fn ffmpeg_secs(t: TimeUs) -> String {
    format!("{:.6}", t.as_seconds())
}

/// Quote a path for a concat list `file` directive.
fn quote_concat_path(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    format!("'{}'", raw.replace('\'', r"'\''"))
}

/// Build the concat list for a timeline. Slices shorter than their song get
/// an `outpoint` so the last song stops exactly at the timeline end.
pub fn concat_list(timeline: &AudioTimeline) -> String {
    let mut out = String::from("ffconcat version 1.0\n");
    for entry in &timeline.entries {
        let Some(asset) = entry.song.asset.as_deref() else {
            continue;
        };
        let _ = writeln!(out, "file {}", quote_concat_path(asset));
        if entry.duration < entry.song.duration {
            let _ = writeln!(out, "outpoint {}", ffmpeg_secs(entry.duration));
        }
    }
    out
}

/// ffmpeg arguments that render `list` (written from [`concat_list`]) into a
/// PCM WAV at `output`, applying the timeline's fade-out.
pub fn build_audio_args(timeline: &AudioTimeline, list: &Path, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = ["-y", "-f", "concat", "-safe", "0", "-i"]
        .into_iter()
        .map(String::from)
        .collect();
    args.push(list.to_string_lossy().to_string());

    if let Some(fade) = timeline.fade_out {
        let start = timeline.total - fade;
        args.push("-af".to_string());
        args.push(format!(
            "afade=t=out:st={}:d={}",
            ffmpeg_secs(start),
            ffmpeg_secs(fade)
        ));
    }

    args.extend([
        "-t".to_string(),
        ffmpeg_secs(timeline.total),
        "-c:a".to_string(),
        "pcm_s16le".to_string(),
        output.to_string_lossy().to_string(),
    ]);
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use loopforge_core::assembler::assemble;
    use loopforge_core::types::SongEntry;
    use std::path::PathBuf;

    fn song(id: u32, name: &str, secs: u64) -> SongEntry {
        let mut s = SongEntry::new(id, name);
        s.asset = Some(PathBuf::from(format!("/music/{name}.wav")));
        s.duration = TimeUs::from_secs(secs);
        s
    }

    #[test]
    fn concat_list_truncates_only_the_last_slice() {
        let songs = [song(1, "1_a", 200), song(2, "2_b", 150), song(3, "3_c", 300)];
        let timeline = assemble(&songs, TimeUs::from_secs(500), false).unwrap();
        assert_eq!(
            concat_list(&timeline),
            "ffconcat version 1.0\n\
             file '/music/1_a.wav'\n\
             file '/music/2_b.wav'\n\
             file '/music/3_c.wav'\n\
             outpoint 150.000000\n"
        );
    }

    #[test]
    fn concat_list_escapes_quotes() {
        let songs = [song(1, "1_Don't Stop", 100)];
        let timeline = assemble(&songs, TimeUs::from_secs(100), false).unwrap();
        assert!(concat_list(&timeline).contains(r"file '/music/1_Don'\''t Stop.wav'"));
    }

    #[test]
    fn audio_args_with_fade() {
        let songs = [song(1, "1_a", 200)];
        let timeline = assemble(&songs, TimeUs::from_secs(3600), true).unwrap();
        let args = build_audio_args(&timeline, Path::new("/tmp/list.txt"), Path::new("/tmp/music.wav"));

        assert_eq!(&args[..7], ["-y", "-f", "concat", "-safe", "0", "-i", "/tmp/list.txt"]);
        assert!(args.contains(&"afade=t=out:st=3595.000000:d=5.000000".to_string()));
        let t = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[t + 1], "3600.000000");
        assert_eq!(args.last().unwrap(), "/tmp/music.wav");
    }

    #[test]
    fn audio_args_without_fade() {
        let songs = [song(1, "1_a", 200)];
        let timeline = assemble(&songs, TimeUs::from_secs(60), false).unwrap();
        let args = build_audio_args(&timeline, Path::new("l.txt"), Path::new("m.wav"));
        assert!(!args.contains(&"-af".to_string()));
    }

    #[test]
    fn ffmpeg_secs_formats_microseconds() {
        assert_eq!(ffmpeg_secs(TimeUs(1_500_001)), "1.500001");
        assert_eq!(ffmpeg_secs(TimeUs::ZERO), "0.000000");
    }
}
