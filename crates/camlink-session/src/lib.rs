//! Device session lifecycle for camera bridge clients.
//!
//! A [`DeviceSession`] owns one logical camera device end to end: it starts
//! the device (live over the bridge transport, or replay from a recording,
//! falling back to replay when live init fails), runs the poll loop on a
//! dedicated worker or once per external tick, delivers decoded results to
//! a callback, optionally records every live frame, and tears the device
//! down without leaving it half-open.
//!
//! One generic session replaces per-detector subclasses: pipeline-specific
//! behavior lives entirely in the [`PipelineConfig`] value and the
//! pluggable [`ResultDecoder`].

pub mod config;
pub mod decoder;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod session;

pub use config::{
    ColorOrder, MedianFilter, MonoResolution, PipelineConfig, ReplayConfig, RgbResolution,
};
pub use decoder::{JsonDecoder, ResultDecoder};
pub use dispatch::TaskQueue;
pub use driver::{BridgeDriver, CameraDriver, FrameResult};
pub use error::{Result, SessionError};
pub use session::{DeviceSession, FrameUpdate, ProcessMode, SessionState};
