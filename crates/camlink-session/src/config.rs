use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// Color camera sensor resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RgbResolution {
    The1080P,
    The4K,
    The12Mp,
    The13Mp,
}

/// Color channel order of delivered image buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorOrder {
    Bgr,
    Rgb,
}

/// Mono (stereo pair) camera sensor resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonoResolution {
    The400P,
    The480P,
    The720P,
    The800P,
}

/// Median filter applied to the depth map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MedianFilter {
    MedianOff,
    Kernel3x3,
    Kernel5x5,
    Kernel7x7,
}

/// Replay source settings: where a recording lives and how to play it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Recording directory.
    pub path: PathBuf,
    /// Number of recorded frames, indices `0..frame_count`.
    pub frame_count: u32,
    /// Delivery rate during playback.
    pub fps: f32,
    /// Wrap to frame 0 at the bound instead of stopping.
    pub loop_replay: bool,
    /// Image names persisted per frame (`<name>_<n>.png`).
    pub image_names: Vec<String>,
    /// Start the session in replay mode instead of attempting live init.
    pub autostart: bool,
}

/// All device and camera parameters for one session.
///
/// Created once before connecting; a session never mutates it. Live frames
/// arrive over the bridge at `bridge_host:bridge_port`; the remaining
/// camera fields are forwarded to the device driver verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Device selection index, forwarded to the driver's close call.
    pub device_index: u32,
    /// Optional device id (mxid) when multiple devices are attached.
    pub device_id: Option<String>,

    /// Bridge peer address for live mode.
    pub bridge_host: String,
    pub bridge_port: u16,

    // Color camera
    pub color_fps: f32,
    pub color_resolution: RgbResolution,
    pub color_order: ColorOrder,
    pub color_interleaved: bool,
    pub preview_width: u32,
    pub preview_height: u32,

    // Mono cameras
    pub mono_fps: f32,
    pub mono_resolution: MonoResolution,

    // Stereo depth
    pub confidence_threshold: u32,
    pub left_right_check: bool,
    pub subpixel: bool,
    pub extended_disparity: bool,
    pub median_filter: MedianFilter,

    /// Neural network model files loaded by the driver.
    pub model_paths: Vec<PathBuf>,

    /// When set, every live frame is persisted here as it is delivered.
    pub record_path: Option<PathBuf>,

    /// Replay source, if one is configured. Its presence enables the
    /// fallback path when live init fails.
    pub replay: Option<ReplayConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            device_id: None,
            bridge_host: "127.0.0.1".to_string(),
            bridge_port: 12347,
            color_fps: 30.0,
            color_resolution: RgbResolution::The1080P,
            color_order: ColorOrder::Rgb,
            color_interleaved: false,
            preview_width: 300,
            preview_height: 300,
            mono_fps: 30.0,
            mono_resolution: MonoResolution::The400P,
            confidence_threshold: 230,
            left_right_check: true,
            subpixel: false,
            extended_disparity: false,
            median_filter: MedianFilter::Kernel7x7,
            model_paths: Vec::new(),
            record_path: None,
            replay: None,
        }
    }
}

impl PipelineConfig {
    /// Reject missing or inconsistent parameters before any resource opens.
    pub fn validate(&self) -> Result<()> {
        if self.bridge_host.is_empty() {
            return Err(SessionError::Config("bridge host must not be empty".into()));
        }
        if self.bridge_port == 0 {
            return Err(SessionError::Config("bridge port must not be zero".into()));
        }
        if self.color_fps <= 0.0 {
            return Err(SessionError::Config(format!(
                "color fps must be positive, got {}",
                self.color_fps
            )));
        }
        if let Some(path) = &self.record_path {
            if path.as_os_str().is_empty() {
                return Err(SessionError::Config("record path must not be empty".into()));
            }
        }
        if let Some(replay) = &self.replay {
            if replay.path.as_os_str().is_empty() {
                return Err(SessionError::Config("replay path must not be empty".into()));
            }
            if replay.fps <= 0.0 {
                return Err(SessionError::Config(format!(
                    "replay fps must be positive, got {}",
                    replay.fps
                )));
            }
        }
        Ok(())
    }

    /// True if a usable replay source is configured (path plus at least one
    /// frame), which is what the live-failure fallback requires.
    pub fn has_replay_source(&self) -> bool {
        self.replay
            .as_ref()
            .is_some_and(|replay| !replay.path.as_os_str().is_empty() && replay.frame_count > 0)
    }
}
