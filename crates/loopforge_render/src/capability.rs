use loopforge_core::transition::{HwCapability, HwEncoder};
use std::path::Path;
use std::process::Stdio;

use crate::engine::tool_command;
use crate::error::{classify_failure, RenderError, Result};

/// Render node handed to ffmpeg for VAAPI encodes.
pub const VAAPI_DEVICE: &str = "/dev/dri/renderD128";

/// Report which hardware H.264 encoders actually work on this machine.
///
/// `-encoders` only says what ffmpeg was built with (static builds list every
/// vendor), so each listed encoder is confirmed with a one-frame test encode.
pub async fn probe_hw_capability(ffmpeg: &Path) -> Result<HwCapability> {
    let output = tool_command(ffmpeg)
        .args(["-hide_banner", "-encoders"])
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RenderError::FfmpegNotFound
            } else {
                RenderError::Io(e)
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(classify_failure("ffmpeg", output.status.code(), &stderr).into());
    }

    let built = parse_encoders(&String::from_utf8_lossy(&output.stdout));
    let mut encoders = Vec::with_capacity(built.encoders.len());
    for encoder in built.encoders {
        match test_encode(ffmpeg, encoder).await {
            Ok(()) => encoders.push(encoder),
            Err(e) => tracing::info!(
                encoder = encoder.codec(),
                error = %e,
                "hardware encoder is built in but not usable"
            ),
        }
    }

    let capability = HwCapability { encoders };
    tracing::info!(encoders = ?capability.encoders, "probed hardware encoders");
    Ok(capability)
}

/// Encode a single synthetic frame with `encoder` and discard it.
async fn test_encode(ffmpeg: &Path, encoder: HwEncoder) -> Result<()> {
    let output = tool_command(ffmpeg)
        .args(test_encode_args(encoder))
        .stdout(Stdio::null())
        .output()
        .await?;
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(classify_failure("ffmpeg", output.status.code(), &stderr).into())
}

/// Arguments for the one-frame test encode of `encoder`.
pub fn test_encode_args(encoder: HwEncoder) -> Vec<String> {
    let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error"]
        .into_iter()
        .map(String::from)
        .collect();
    if encoder == HwEncoder::Vaapi {
        args.extend(["-vaapi_device".to_string(), VAAPI_DEVICE.to_string()]);
    }
    args.extend(
        ["-f", "lavfi", "-i", "color=c=black:s=256x256:d=0.1", "-frames:v", "1"]
            .into_iter()
            .map(String::from),
    );
    if encoder == HwEncoder::Vaapi {
        args.extend(["-vf".to_string(), "format=nv12,hwupload".to_string()]);
    }
    args.extend(
        ["-c:v", encoder.codec(), "-f", "null", "-"]
            .into_iter()
            .map(String::from),
    );
    args
}

/// Parse `ffmpeg -encoders` output. Each encoder line looks like
/// ` V....D h264_nvenc           NVIDIA NVENC H.264 encoder`.
pub fn parse_encoders(listing: &str) -> HwCapability {
    let names: Vec<&str> = listing
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .collect();

    let encoders = HwEncoder::ALL
        .into_iter()
        .filter(|enc| names.contains(&enc.codec()))
        .collect();

    HwCapability { encoders }
}
