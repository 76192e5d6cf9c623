//! Sentinel-delimited frame demultiplexing for camera bridge byte streams.
//!
//! The bridge peer answers every request with one frame laid out as:
//! `<metadata bytes><<END_OF_JSON>><image bytes><<END>>`. Neither segment is
//! length-prefixed, so this crate reconstructs (metadata, payload) pairs out
//! of arbitrarily chunked socket reads by searching for the two delimiters.
//!
//! No partial segments, no buffer management in user code.

pub mod buffer;
pub mod demux;
pub mod wire;

pub use buffer::FrameBuffer;
pub use demux::{DemuxState, DemuxedFrame, StreamDemuxer};
pub use wire::{METADATA_DELIMITER, PAYLOAD_END_DELIMITER, REQUEST_TOKEN};
