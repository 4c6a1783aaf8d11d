use crate::error::CoreError;
use crate::types::TimeUs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of the intro and outro effect applied to the source clip.
pub const TRANSITION_DURATION: TimeUs = TimeUs(1_500_000);

// ---------------------------------------------------------------------------
// TransitionKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    #[default]
    None,
    Fade,
    SlideLeft,
    SlideRight,
    Zoom,
    WipeDown,
    WipeUp,
    Blinds,
    Pixelate,
    Dissolve,
    ExpandLine,
}

impl TransitionKind {
    pub const ALL: [TransitionKind; 11] = [
        Self::None,
        Self::Fade,
        Self::SlideLeft,
        Self::SlideRight,
        Self::Zoom,
        Self::WipeDown,
        Self::WipeUp,
        Self::Blinds,
        Self::Pixelate,
        Self::Dissolve,
        Self::ExpandLine,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Fade => "fade",
            Self::SlideLeft => "slide_left",
            Self::SlideRight => "slide_right",
            Self::Zoom => "zoom",
            Self::WipeDown => "wipe_down",
            Self::WipeUp => "wipe_up",
            Self::Blinds => "blinds",
            Self::Pixelate => "pixelate",
            Self::Dissolve => "dissolve",
            Self::ExpandLine => "expand_line",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransitionKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| CoreError::InvalidTransition(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Hardware capability
// ---------------------------------------------------------------------------

/// Hardware H.264 encoder families, in preference order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HwEncoder {
    Nvenc,
    QuickSync,
    Vaapi,
    Amf,
}

impl HwEncoder {
    pub const ALL: [HwEncoder; 4] = [Self::Nvenc, Self::QuickSync, Self::Vaapi, Self::Amf];

    /// ffmpeg encoder name.
    pub fn codec(&self) -> &'static str {
        match self {
            Self::Nvenc => "h264_nvenc",
            Self::QuickSync => "h264_qsv",
            Self::Vaapi => "h264_vaapi",
            Self::Amf => "h264_amf",
        }
    }
}

/// Result of probing the encode backend once per batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HwCapability {
    /// Available encoders, in preference order.
    pub encoders: Vec<HwEncoder>,
}

impl HwCapability {
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn is_available(&self) -> bool {
        !self.encoders.is_empty()
    }

    pub fn preferred(&self) -> Option<HwEncoder> {
        self.encoders.first().copied()
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransitionPlan {
    pub kind: TransitionKind,
    pub duration: TimeUs,
    pub capable: bool,
    /// Encoder used to render the effect; `None` when no effect is applied.
    pub encoder: Option<HwEncoder>,
    /// Set when the requested effect was dropped for lack of hardware support.
    pub downgraded_from: Option<TransitionKind>,
}

impl TransitionPlan {
    pub fn none() -> Self {
        Self {
            kind: TransitionKind::None,
            duration: TimeUs::ZERO,
            capable: true,
            encoder: None,
            downgraded_from: None,
        }
    }

    pub fn is_downgraded(&self) -> bool {
        self.downgraded_from.is_some()
    }

    /// User-facing notice for a downgraded plan.
    pub fn warning(&self) -> Option<String> {
        self.downgraded_from.map(|requested| {
            format!(
                "transition \"{requested}\" needs hardware-accelerated encoding, which is unavailable; rendering without transition"
            )
        })
    }
}

/// Decide which transition a batch renders with. Never fails: a probe error
/// is treated the same as "no hardware encoder".
pub fn select_transition<E: fmt::Display>(
    requested: TransitionKind,
    probe: Result<HwCapability, E>,
) -> TransitionPlan {
    if requested.is_none() {
        return TransitionPlan::none();
    }

    let capability = match probe {
        Ok(cap) => cap,
        Err(e) => {
            tracing::warn!(error = %e, "hardware capability probe failed; treating as unavailable");
            HwCapability::unavailable()
        }
    };

    match capability.preferred() {
        Some(encoder) => TransitionPlan {
            kind: requested,
            duration: TRANSITION_DURATION,
            capable: true,
            encoder: Some(encoder),
            downgraded_from: None,
        },
        None => {
            tracing::warn!(transition = %requested, "no hardware encoder; transition disabled");
            TransitionPlan {
                capable: false,
                downgraded_from: Some(requested),
                ..TransitionPlan::none()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nvenc() -> HwCapability {
        HwCapability {
            encoders: vec![HwEncoder::Nvenc, HwEncoder::Vaapi],
        }
    }

    #[test]
    fn none_is_always_capable() {
        for probe in [Ok(nvenc()), Ok(HwCapability::unavailable()), Err("boom")] {
            let plan = select_transition(TransitionKind::None, probe);
            assert_eq!(plan, TransitionPlan::none());
            assert!(plan.capable);
            assert!(plan.warning().is_none());
        }
    }

    #[test]
    fn effect_with_hardware_keeps_kind() {
        let plan = select_transition::<String>(TransitionKind::Zoom, Ok(nvenc()));
        assert_eq!(plan.kind, TransitionKind::Zoom);
        assert!(plan.capable);
        assert_eq!(plan.encoder, Some(HwEncoder::Nvenc));
        assert_eq!(plan.duration, TRANSITION_DURATION);
        assert!(!plan.is_downgraded());
    }

    #[test]
    fn every_effect_downgrades_without_hardware() {
        for kind in TransitionKind::ALL.into_iter().filter(|k| !k.is_none()) {
            let plan = select_transition::<String>(kind, Ok(HwCapability::unavailable()));
            assert_eq!(plan.kind, TransitionKind::None);
            assert!(!plan.capable);
            assert_eq!(plan.downgraded_from, Some(kind));
            assert!(plan.warning().unwrap().contains(kind.as_str()));
        }
    }

    #[test]
    fn probe_error_counts_as_unavailable() {
        let plan = select_transition(TransitionKind::Fade, Err("ffmpeg not found"));
        assert_eq!(plan.kind, TransitionKind::None);
        assert!(!plan.capable);
        assert_eq!(plan.downgraded_from, Some(TransitionKind::Fade));
    }

    #[test]
    fn parses_snake_case_names() {
        assert_eq!("slide_left".parse::<TransitionKind>().unwrap(), TransitionKind::SlideLeft);
        assert_eq!("Expand_Line".parse::<TransitionKind>().unwrap(), TransitionKind::ExpandLine);
        assert_eq!("none".parse::<TransitionKind>().unwrap(), TransitionKind::None);
        for kind in TransitionKind::ALL {
            assert_eq!(kind.to_string().parse::<TransitionKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        assert!(matches!(
            "swirl".parse::<TransitionKind>(),
            Err(CoreError::InvalidTransition(name)) if name == "swirl"
        ));
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&TransitionKind::WipeDown).unwrap();
        assert_eq!(json, "\"wipe_down\"");
    }
}
