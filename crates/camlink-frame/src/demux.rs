use bytes::Bytes;
use tracing::trace;

use crate::buffer::FrameBuffer;
use crate::wire::{METADATA_DELIMITER, PAYLOAD_END_DELIMITER};

/// One complete (metadata, payload) pair reconstructed from the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct DemuxedFrame {
    /// Textual metadata (JSON) describing the frame, delimiter excluded.
    pub metadata: Bytes,
    /// Binary image bytes, delimiter excluded.
    pub payload: Bytes,
}

/// Which segment the demuxer is currently accumulating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemuxState {
    AwaitingMetadata,
    AwaitingPayload,
}

/// Turns an unbounded chunked byte stream into discrete (metadata, payload)
/// pairs.
///
/// The two segments alternate strictly: a payload is never parsed before its
/// preceding metadata segment is fully delimited. Exactly one pair is
/// emitted per completed metadata+payload delimiter cycle, in receipt
/// order, regardless of how the stream is split into chunks.
///
/// The payload segment is binary, and the protocol does not prevent the end
/// delimiter from occurring inside image bytes; the peer relies on the
/// sequence being vanishingly rare. A stream whose payload delimiter never
/// arrives keeps the demuxer in [`DemuxState::AwaitingPayload`]; callers
/// observe that as "no pair yet", not as an error.
#[derive(Debug, Default)]
pub struct StreamDemuxer {
    state: Option<Pending>,
    metadata_buf: FrameBuffer,
    payload_buf: FrameBuffer,
}

/// Metadata extracted for the pair currently being completed.
#[derive(Debug)]
struct Pending {
    metadata: Bytes,
}

impl StreamDemuxer {
    /// Create a demuxer awaiting the first metadata segment.
    pub fn new() -> Self {
        Self {
            state: None,
            metadata_buf: FrameBuffer::new(),
            payload_buf: FrameBuffer::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> DemuxState {
        if self.state.is_some() {
            DemuxState::AwaitingPayload
        } else {
            DemuxState::AwaitingMetadata
        }
    }

    /// Feed one received chunk; returns a completed pair if this chunk
    /// finished one.
    pub fn feed(&mut self, chunk: &[u8]) -> Option<DemuxedFrame> {
        match self.state {
            None => {
                self.metadata_buf.append(chunk);
                let idx = self.metadata_buf.find_delimiter(METADATA_DELIMITER)?;
                let metadata = self
                    .metadata_buf
                    .extract_and_reset(idx, METADATA_DELIMITER.len());
                // Bytes that arrived after the delimiter in the same chunk
                // belong to the payload segment.
                self.payload_buf.append(self.metadata_buf.as_slice());
                self.metadata_buf.clear();
                self.state = Some(Pending { metadata });
                self.try_complete()
            }
            Some(_) => {
                self.payload_buf.append(chunk);
                self.try_complete()
            }
        }
    }

    /// Drop any partially accumulated segments and return to
    /// [`DemuxState::AwaitingMetadata`]. Used when a connection is torn
    /// down mid-frame.
    pub fn reset(&mut self) {
        self.state = None;
        self.metadata_buf.clear();
        self.payload_buf.clear();
    }

    fn try_complete(&mut self) -> Option<DemuxedFrame> {
        let idx = self.payload_buf.find_delimiter(PAYLOAD_END_DELIMITER)?;
        let payload = self
            .payload_buf
            .extract_and_reset(idx, PAYLOAD_END_DELIMITER.len());

        // The transport issues exactly one frame per request/response
        // cycle, so anything after the end marker is not ours to keep.
        if !self.payload_buf.is_empty() {
            trace!(
                dropped = self.payload_buf.len(),
                "dropping trailing bytes after payload delimiter"
            );
            self.payload_buf.clear();
        }

        let pending = self.state.take()?;
        Some(DemuxedFrame {
            metadata: pending.metadata,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(metadata: &[u8], payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(metadata);
        bytes.extend_from_slice(METADATA_DELIMITER);
        bytes.extend_from_slice(payload);
        bytes.extend_from_slice(PAYLOAD_END_DELIMITER);
        bytes
    }

    #[test]
    fn whole_buffer_delivery() {
        let mut demux = StreamDemuxer::new();
        let frame = demux.feed(&wire(b"{\"k\":1}", b"imagebytes")).unwrap();
        assert_eq!(frame.metadata.as_ref(), b"{\"k\":1}");
        assert_eq!(frame.payload.as_ref(), b"imagebytes");
        assert_eq!(demux.state(), DemuxState::AwaitingMetadata);
    }

    #[test]
    fn one_byte_at_a_time_matches_whole_buffer() {
        let stream = wire(b"{\"detections\":[]}", &[0xFF, 0xD8, 0x00, 0x7F, 0x3C]);

        let mut whole = StreamDemuxer::new();
        let expected = whole.feed(&stream).unwrap();

        let mut trickle = StreamDemuxer::new();
        let mut got = None;
        for byte in &stream {
            if let Some(frame) = trickle.feed(std::slice::from_ref(byte)) {
                assert!(got.is_none(), "more than one pair emitted");
                got = Some(frame);
            }
        }
        assert_eq!(got.unwrap(), expected);
        assert_eq!(trickle.state(), DemuxState::AwaitingMetadata);
    }

    #[test]
    fn payload_seeded_from_metadata_chunk_tail() {
        let mut demux = StreamDemuxer::new();
        // Metadata delimiter and the start of the payload share a chunk.
        let mut first = b"{\"a\":1}".to_vec();
        first.extend_from_slice(METADATA_DELIMITER);
        first.extend_from_slice(b"img-start");
        assert!(demux.feed(&first).is_none());
        assert_eq!(demux.state(), DemuxState::AwaitingPayload);

        let mut second = b"img-end".to_vec();
        second.extend_from_slice(PAYLOAD_END_DELIMITER);
        let frame = demux.feed(&second).unwrap();
        assert_eq!(frame.metadata.as_ref(), b"{\"a\":1}");
        assert_eq!(frame.payload.as_ref(), b"img-startimg-end");
    }

    #[test]
    fn entire_frame_in_one_chunk_after_metadata_delimiter() {
        // Both delimiters inside a single chunk: pair completes immediately.
        let mut demux = StreamDemuxer::new();
        let frame = demux.feed(&wire(b"m", b"p")).unwrap();
        assert_eq!(frame.metadata.as_ref(), b"m");
        assert_eq!(frame.payload.as_ref(), b"p");
    }

    #[test]
    fn successive_frames_in_receipt_order() {
        let mut demux = StreamDemuxer::new();
        for i in 0..5u8 {
            let metadata = format!("{{\"n\":{i}}}");
            let payload = vec![i; 16];
            let frame = demux.feed(&wire(metadata.as_bytes(), &payload)).unwrap();
            assert_eq!(frame.metadata.as_ref(), metadata.as_bytes());
            assert_eq!(frame.payload.as_ref(), payload.as_slice());
        }
    }

    #[test]
    fn missing_payload_delimiter_stalls_without_error() {
        let mut demux = StreamDemuxer::new();
        let mut stream = b"{\"x\":2}".to_vec();
        stream.extend_from_slice(METADATA_DELIMITER);
        stream.extend_from_slice(&vec![0xAB; 4096]);

        assert!(demux.feed(&stream).is_none());
        assert_eq!(demux.state(), DemuxState::AwaitingPayload);
        // More payload bytes without the marker: still no pair.
        assert!(demux.feed(&[0xCD; 512]).is_none());
        assert_eq!(demux.state(), DemuxState::AwaitingPayload);
    }

    #[test]
    fn trailing_bytes_after_payload_delimiter_are_dropped() {
        let mut demux = StreamDemuxer::new();
        let mut stream = wire(b"{}", b"img");
        stream.extend_from_slice(b"stray");
        let frame = demux.feed(&stream).unwrap();
        assert_eq!(frame.payload.as_ref(), b"img");

        // The stray bytes must not leak into the next metadata segment.
        let next = demux.feed(&wire(b"{\"n\":2}", b"img2")).unwrap();
        assert_eq!(next.metadata.as_ref(), b"{\"n\":2}");
    }

    #[test]
    fn reset_discards_partial_segments() {
        let mut demux = StreamDemuxer::new();
        assert!(demux.feed(b"{\"partial\":").is_none());
        demux.reset();
        assert_eq!(demux.state(), DemuxState::AwaitingMetadata);
        let frame = demux.feed(&wire(b"{\"n\":1}", b"img")).unwrap();
        assert_eq!(frame.metadata.as_ref(), b"{\"n\":1}");
    }

    #[test]
    fn spec_scenario_three_arbitrary_splits() {
        // 13 bytes of metadata, 100 bytes of image payload, three chunks.
        let metadata = b"{\"score\":0.9}";
        let payload: Vec<u8> = (0..100).map(|i| (i * 7) as u8).collect();
        let stream = wire(metadata, &payload);

        for (a, b) in [(3, 20), (14, 60), (1, 127)] {
            let mut demux = StreamDemuxer::new();
            let mut got = Vec::new();
            for chunk in [&stream[..a], &stream[a..b], &stream[b..]] {
                if let Some(frame) = demux.feed(chunk) {
                    got.push(frame);
                }
            }
            assert_eq!(got.len(), 1, "split ({a},{b}) must emit exactly one pair");
            assert_eq!(got[0].metadata.as_ref(), metadata);
            assert_eq!(got[0].payload.as_ref(), payload.as_slice());
            assert_eq!(demux.state(), DemuxState::AwaitingMetadata);
        }
    }
}
