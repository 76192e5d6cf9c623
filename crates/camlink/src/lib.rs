//! Depth/RGB camera bridge client with record/replay.
//!
//! camlink talks to a camera bridge peer over TCP, reassembles its
//! sentinel-delimited frame stream, and drives the device session
//! lifecycle, with frame-indexed recording and replay of every stream.
//!
//! # Crate Structure
//!
//! - [`frame`] — Sentinel-delimited stream demultiplexing
//! - [`transport`] — TCP client session with request/response cadence
//! - [`replay`] — Frame-indexed record/replay persistence
//! - [`session`] — Device session lifecycle, drivers, and decoding

/// Re-export frame types.
pub mod frame {
    pub use camlink_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use camlink_transport::*;
}

/// Re-export replay types.
pub mod replay {
    pub use camlink_replay::*;
}

/// Re-export session types.
pub mod session {
    pub use camlink_session::*;
}
