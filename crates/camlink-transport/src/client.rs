use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use arc_swap::ArcSwapOption;
use tracing::{debug, info, warn};

use camlink_frame::{DemuxedFrame, StreamDemuxer, REQUEST_TOKEN};

use crate::error::{Result, TransportError};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// One outbound connection to a camera bridge peer.
///
/// After `open`, a reader thread pulls raw chunks off the socket, feeds the
/// demuxer, and publishes each completed (metadata, payload) pair into a
/// single-slot holder. Storing a pair immediately sends the next `DATA`
/// request token, so the peer produces at most one frame in flight.
///
/// An unconsumed pair is overwritten when the next one completes: the slot
/// retains at most one frame, always the freshest.
///
/// There is no cancellation token threaded through reads; `close` shuts the
/// socket down, which fails the in-flight read and lets the reader thread
/// exit, then joins it.
pub struct TransportSession {
    latest: Arc<ArcSwapOption<DemuxedFrame>>,
    connected: Arc<AtomicBool>,
    conn: Option<Conn>,
}

struct Conn {
    stream: TcpStream,
    reader: JoinHandle<()>,
}

impl TransportSession {
    /// Create a session with no connection.
    pub fn new() -> Self {
        Self {
            latest: Arc::new(ArcSwapOption::empty()),
            connected: Arc::new(AtomicBool::new(false)),
            conn: None,
        }
    }

    /// Connect to `host:port` and start the reader thread.
    ///
    /// Single attempt; connection failures propagate, they are not retried
    /// here. Sends the initial request token before returning. Calling
    /// `open` while already connected is a no-op.
    pub fn open(&mut self, host: &str, port: u16) -> Result<()> {
        if self.conn.is_some() {
            debug!("open called on already-connected session");
            return Ok(());
        }

        let addr = format!("{host}:{port}");
        let stream = TcpStream::connect(&addr).map_err(|source| TransportError::Connect {
            addr: addr.clone(),
            source,
        })?;
        // Request tokens and frames are latency-sensitive; never batch them.
        stream.set_nodelay(true)?;

        let mut writer = stream.try_clone()?;
        writer.write_all(REQUEST_TOKEN).map_err(TransportError::Request)?;

        let reader_stream = stream.try_clone()?;
        self.connected.store(true, Ordering::Release);
        let latest = Arc::clone(&self.latest);
        let connected = Arc::clone(&self.connected);
        let reader = std::thread::spawn(move || {
            read_loop(reader_stream, writer, latest);
            connected.store(false, Ordering::Release);
        });

        info!(%addr, "connected to bridge peer");
        self.conn = Some(Conn { stream, reader });
        Ok(())
    }

    /// Take the latest completed pair, leaving the slot empty.
    ///
    /// `None` means no new frame since the last take — either the stream is
    /// between frames or it has stalled mid-segment. Both look the same
    /// here by design.
    pub fn latest_frame(&self) -> Option<Arc<DemuxedFrame>> {
        self.latest.swap(None)
    }

    /// True while the reader thread is attached to a live connection.
    pub fn is_connected(&self) -> bool {
        self.conn.is_some() && self.connected.load(Ordering::Acquire)
    }

    /// Close the connection and join the reader thread.
    ///
    /// Idempotent: closing an already-closed session is a no-op. The socket
    /// shutdown unblocks any in-flight read.
    pub fn close(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if let Err(err) = conn.stream.shutdown(Shutdown::Both) {
            // Already gone (peer closed first); the reader exits on its own.
            debug!(%err, "socket shutdown during close");
        }
        if conn.reader.join().is_err() {
            warn!("reader thread panicked");
        }
        self.connected.store(false, Ordering::Release);
        self.latest.store(None);
        info!("bridge connection closed");
    }
}

impl Default for TransportSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Socket-side loop: read chunks, demux, publish pairs, request the next
/// frame. Must never block on anything except the socket itself, and never
/// calls back into consumer code.
fn read_loop(
    mut stream: TcpStream,
    mut writer: TcpStream,
    latest: Arc<ArcSwapOption<DemuxedFrame>>,
) {
    let mut demux = StreamDemuxer::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    loop {
        let read = match stream.read(&mut chunk) {
            Ok(0) => {
                debug!("peer closed connection");
                break;
            }
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                // Includes the read failure provoked by close(); quiet exit.
                debug!(%err, "read loop ending");
                break;
            }
        };

        if let Some(pair) = demux.feed(&chunk[..read]) {
            latest.store(Some(Arc::new(pair)));
            if let Err(err) = writer.write_all(REQUEST_TOKEN) {
                debug!(%err, "failed to request next frame");
                break;
            }
        }
    }
}
