use crate::{
    foundation::core::{Rgba8Premul, Vec2},
    foundation::error::{TickdownError, TickdownResult},
    render::transitions::{AnimationStyle, TransitionTiming},
};

/// Typeface settings for the digit layer.
///
/// `font_size_px` is expressed at the 1080-px reference height and scaled to
/// the export resolution by the glyph atlas builder, so the same config
/// produces the same relative type size at 480p and 1080p.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Typography {
    pub font_family: String,
    pub font_size_px: f64,
    pub color: Rgba8Premul,
    pub shadow: bool,
}

/// Pan/zoom placement for a media background.
///
/// `offset` is expressed at the 800-px reference height (the editing preview
/// scale) and is rescaled by the layout resolver, so placement is identical
/// at every export resolution.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct MediaTransform {
    pub scale: f64,
    pub offset: Vec2,
    pub intrinsic_width: u32,
    pub intrinsic_height: u32,
}

/// Background layer variants.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundKind {
    Solid { color: Rgba8Premul },
    /// Linear gradient along the top-left to bottom-right diagonal.
    Gradient { from: Rgba8Premul, to: Rgba8Premul },
    Media { transform: MediaTransform },
}

/// Export frame aspect ratio. Width is derived as `height * ratio`, rounded
/// to the nearest even integer.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "16:9")]
    Wide16x9,
    #[serde(rename = "9:16")]
    Tall9x16,
    #[serde(rename = "4:5")]
    Portrait4x5,
    #[serde(rename = "5:4")]
    Landscape5x4,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "4:3")]
    Standard4x3,
    #[serde(rename = "21:9")]
    Ultrawide21x9,
    #[serde(rename = "custom")]
    Custom(f64),
}

impl AspectRatio {
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Wide16x9 => 16.0 / 9.0,
            Self::Tall9x16 => 9.0 / 16.0,
            Self::Portrait4x5 => 4.0 / 5.0,
            Self::Landscape5x4 => 5.0 / 4.0,
            Self::Square => 1.0,
            Self::Standard4x3 => 4.0 / 3.0,
            Self::Ultrawide21x9 => 21.0 / 9.0,
            Self::Custom(v) => v,
        }
    }
}

impl BackgroundKind {
    /// Build a gradient background from a CSS-style gradient description by
    /// extracting its first two `#RRGGBB` stops. Descriptions without two
    /// parseable stops fall back to black-to-white.
    pub fn gradient_from_css(css: &str) -> Self {
        let mut stops = css
            .split(|c: char| !(c == '#' || c.is_ascii_hexdigit()))
            .filter(|tok| tok.len() == 7 && tok.starts_with('#'))
            .filter_map(|tok| Rgba8Premul::from_hex(tok).ok());

        match (stops.next(), stops.next()) {
            (Some(from), Some(to)) => Self::Gradient { from, to },
            _ => Self::Gradient {
                from: Rgba8Premul::from_straight_rgba(0, 0, 0, 255),
                to: Rgba8Premul::from_straight_rgba(255, 255, 255, 255),
            },
        }
    }
}

/// Product tier. The free tier gets the migrating watermark overlay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Free,
    Paid,
}

/// Full configuration for one render session.
///
/// Captured by the scheduler at `start()` and treated as immutable for the
/// session's lifetime; callers may swap configs only between sessions.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RenderConfig {
    pub typography: Typography,
    /// Text anchor offset from canvas center, in percent of the canvas
    /// dimension (x against width, y against height).
    pub text_offset_pct: Vec2,
    pub background: BackgroundKind,
    pub animation: AnimationStyle,
    pub transition: TransitionTiming,
    pub aspect: AspectRatio,
    /// Export height in pixels (480, 720, 1080, ...).
    pub export_height: u32,
    /// Countdown length in seconds.
    pub duration_secs: f64,
    pub tier: Tier,
    /// Brand string drawn by the free-tier watermark overlay.
    pub watermark_text: String,
    /// When true and the media source reports a duration, playback rate is
    /// stretched so the media spans exactly one countdown.
    pub sync_media_to_timer: bool,
    /// Session determinism seed (watermark repositioning).
    pub seed: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            typography: Typography {
                font_family: "Inter".to_string(),
                font_size_px: 120.0,
                color: Rgba8Premul::from_straight_rgba(17, 24, 39, 255),
                shadow: true,
            },
            text_offset_pct: Vec2::ZERO,
            background: BackgroundKind::Solid {
                color: Rgba8Premul::from_straight_rgba(243, 244, 246, 255),
            },
            animation: AnimationStyle::Roller,
            transition: TransitionTiming::default(),
            aspect: AspectRatio::Wide16x9,
            export_height: 720,
            duration_secs: 10.0,
            tier: Tier::Free,
            watermark_text: "tickdown.app".to_string(),
            sync_media_to_timer: false,
            seed: 0,
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> TickdownResult<()> {
        if !self.duration_secs.is_finite() || self.duration_secs <= 0.0 {
            return Err(TickdownError::validation("duration_secs must be > 0"));
        }
        if self.export_height < 2 {
            return Err(TickdownError::validation("export_height must be >= 2"));
        }
        if self.typography.font_family.trim().is_empty() {
            return Err(TickdownError::validation("font_family must be non-empty"));
        }
        if !self.typography.font_size_px.is_finite() || self.typography.font_size_px <= 0.0 {
            return Err(TickdownError::validation("font_size_px must be > 0"));
        }
        let ratio = self.aspect.as_f64();
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(TickdownError::validation("aspect ratio must be > 0"));
        }
        if let BackgroundKind::Media { transform } = &self.background {
            if transform.intrinsic_width == 0 || transform.intrinsic_height == 0 {
                return Err(TickdownError::validation(
                    "media intrinsic size must be non-zero",
                ));
            }
            if !transform.scale.is_finite() || transform.scale <= 0.0 {
                return Err(TickdownError::validation("media scale must be > 0"));
            }
        }
        self.transition.validate()?;
        Ok(())
    }
}
