use bytes::Bytes;

use camlink_replay::NamedImage;
use camlink_transport::TransportSession;

use crate::config::PipelineConfig;
use crate::error::{Result, SessionError};

/// One set of results produced by the device for a single sampling instant.
#[derive(Debug, Clone)]
pub struct FrameResult {
    /// Textual metadata blob (JSON) describing detections/sensor state.
    pub metadata: Bytes,
    /// Named image buffers belonging to this frame. Valid only until the
    /// next frame overwrites them; copy if you need to keep them.
    pub images: Vec<NamedImage>,
}

/// The call boundary a session depends on to drive a camera device.
///
/// All three operations are synchronous and may take non-trivial time. A
/// session never calls `close` concurrently with `get_results` on the same
/// device index; implementations may rely on that.
pub trait CameraDriver: Send {
    /// Start the pipeline on the device. No resource may remain acquired
    /// when this returns an error.
    fn init(&mut self, config: &PipelineConfig) -> Result<()>;

    /// Poll for the next results. `Ok(None)` means no new frame is
    /// available yet — a stalled stream looks identical to one that is
    /// merely between frames.
    fn get_results(&mut self) -> Result<Option<FrameResult>>;

    /// Release the device. Called exactly once per successful `init`.
    fn close(&mut self, device_index: u32);
}

/// Live-mode driver backed by the bridge transport.
///
/// `init` opens the TCP connection from the session config; `get_results`
/// drains the transport's latest-frame slot; `close` tears the connection
/// down.
pub struct BridgeDriver {
    session: TransportSession,
    image_name: String,
}

impl BridgeDriver {
    /// Default name given to the single image the bridge delivers.
    pub const DEFAULT_IMAGE_NAME: &'static str = "color";

    pub fn new() -> Self {
        Self::with_image_name(Self::DEFAULT_IMAGE_NAME)
    }

    /// Use a custom name for the delivered image buffer.
    pub fn with_image_name(name: impl Into<String>) -> Self {
        Self {
            session: TransportSession::new(),
            image_name: name.into(),
        }
    }
}

impl Default for BridgeDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraDriver for BridgeDriver {
    fn init(&mut self, config: &PipelineConfig) -> Result<()> {
        self.session
            .open(&config.bridge_host, config.bridge_port)
            .map_err(|err| SessionError::DeviceInit(err.to_string()))
    }

    fn get_results(&mut self) -> Result<Option<FrameResult>> {
        Ok(self.session.latest_frame().map(|pair| FrameResult {
            metadata: pair.metadata.clone(),
            images: vec![NamedImage::new(self.image_name.clone(), pair.payload.clone())],
        }))
    }

    fn close(&mut self, _device_index: u32) {
        self.session.close();
    }
}
