//! Render domain types
//!
//! A `RenderSpec` is everything a render backend needs to turn generated
//! composition code plus media into a video file. Both backends consume the
//! same spec and must report the same `RenderContract` for it.

use serde::{Deserialize, Serialize};

/// Frame rate used for every composition.
pub const FPS: u32 = 30;
pub const CODEC: &str = "h264";
pub const IMAGE_FORMAT: &str = "jpeg";

/// Output frame size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Frame size for an aspect ratio. Unknown ratios fall back to portrait 9:16.
pub fn dimensions_for(aspect_ratio: &str) -> Dimensions {
    match aspect_ratio {
        "16:9" => Dimensions {
            width: 1920,
            height: 1080,
        },
        "1:1" => Dimensions {
            width: 1080,
            height: 1080,
        },
        _ => Dimensions {
            width: 1080,
            height: 1920,
        },
    }
}

/// Composition to render
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSpec {
    pub code: String,
    pub image_urls: Vec<String>,
    pub audio_url: Option<String>,
    pub total_frames: u32,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub codec: String,
    pub image_format: String,
}

impl RenderSpec {
    /// Build the spec for a job's target duration and aspect ratio.
    pub fn new(
        code: String,
        image_urls: Vec<String>,
        audio_url: Option<String>,
        target_duration_seconds: u32,
        aspect_ratio: &str,
    ) -> Self {
        let Dimensions { width, height } = dimensions_for(aspect_ratio);
        Self {
            code,
            image_urls,
            audio_url,
            total_frames: target_duration_seconds * FPS,
            fps: FPS,
            width,
            height,
            codec: CODEC.to_string(),
            image_format: IMAGE_FORMAT.to_string(),
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        f64::from(self.total_frames) / f64::from(self.fps.max(1))
    }

    /// Output properties any backend must honour for this spec.
    pub fn contract(&self) -> RenderContract {
        RenderContract {
            frames: self.total_frames,
            fps: self.fps,
            width: self.width,
            height: self.height,
            codec: self.codec.clone(),
        }
    }
}

/// Observable properties of a rendered video.
///
/// File size and wall-clock time vary between backends; these do not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderContract {
    pub frames: u32,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub codec: String,
}

impl RenderContract {
    pub fn duration_seconds(&self) -> f64 {
        f64::from(self.frames) / f64::from(self.fps.max(1))
    }

    /// Same output within one frame of rounding.
    pub fn is_equivalent(&self, other: &RenderContract) -> bool {
        self.frames.abs_diff(other.frames) <= 1
            && self.fps == other.fps
            && self.width == other.width
            && self.height == other.height
            && self.codec == other.codec
    }
}

/// Which render backend a process uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    Local,
    Distributed,
}

impl RenderMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderMode::Local => "local",
            RenderMode::Distributed => "distributed",
        }
    }

    /// Distributed rendering needs both the farm URL and the function name.
    pub fn select(farm_url: Option<&str>, function_name: Option<&str>) -> Self {
        let present = |value: Option<&str>| value.is_some_and(|v| !v.trim().is_empty());
        if present(farm_url) && present(function_name) {
            RenderMode::Distributed
        } else {
            RenderMode::Local
        }
    }
}

impl std::fmt::Display for RenderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(RenderMode::Local),
            "distributed" => Ok(RenderMode::Distributed),
            other => Err(format!("unknown render mode '{}'", other)),
        }
    }
}
