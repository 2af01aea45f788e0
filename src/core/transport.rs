//! Duplex transport abstraction
//! One logical message may arrive as several transport-level frames;
//! the connection layer reassembles them under its framing rules.

use async_trait::async_trait;

use crate::error::Result;

/// One transport-level chunk as delivered by the underlying socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A chunk of message data; `fin` marks the end of the logical message
    Data { payload: Vec<u8>, fin: bool },
    /// Peer-initiated connection closure
    Close,
}

/// Read half of a duplex transport
#[async_trait]
pub trait TransportStream: Send {
    /// Wait for the next frame from the peer.
    ///
    /// Returns `Frame::Close` when the peer has closed the connection;
    /// transport failures surface as `TransportError`.
    async fn next_frame(&mut self) -> Result<Frame>;
}

/// Write half of a duplex transport
#[async_trait]
pub trait TransportSink: Send {
    /// Write one complete logical message
    async fn send(&mut self, payload: &[u8]) -> Result<()>;

    /// Signal closure to the peer; best effort, never blocks teardown
    async fn close(&mut self) -> Result<()>;
}

/// Channel-backed in-process transport, used by the test suite and for
/// local sessions that bypass the network entirely.
pub mod memory {
    use tokio::sync::mpsc;

    use super::{Frame, TransportSink, TransportStream};
    use crate::error::{HubError, Result};
    use async_trait::async_trait;

    /// Write half of an in-memory duplex connection
    pub struct MemorySink {
        tx: mpsc::UnboundedSender<Frame>,
    }

    impl MemorySink {
        /// Push a raw frame, bypassing whole-message framing.
        /// Lets tests exercise multi-frame assembly and close handling.
        pub fn send_frame(&self, frame: Frame) -> Result<()> {
            self.tx
                .send(frame)
                .map_err(|_| HubError::TransportError("peer endpoint dropped".to_string()))
        }
    }

    #[async_trait]
    impl TransportSink for MemorySink {
        async fn send(&mut self, payload: &[u8]) -> Result<()> {
            self.send_frame(Frame::Data {
                payload: payload.to_vec(),
                fin: true,
            })
        }

        async fn close(&mut self) -> Result<()> {
            // The peer may already be gone; closure is best effort
            let _ = self.tx.send(Frame::Close);
            Ok(())
        }
    }

    /// Read half of an in-memory duplex connection
    pub struct MemoryStream {
        rx: mpsc::UnboundedReceiver<Frame>,
    }

    #[async_trait]
    impl TransportStream for MemoryStream {
        async fn next_frame(&mut self) -> Result<Frame> {
            // A dropped peer reads as closure, matching socket semantics
            Ok(self.rx.recv().await.unwrap_or(Frame::Close))
        }
    }

    /// Create a connected pair of in-memory endpoints.
    /// Frames written to one endpoint's sink arrive on the other's stream.
    pub fn pair() -> ((MemorySink, MemoryStream), (MemorySink, MemoryStream)) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            (MemorySink { tx: a_tx }, MemoryStream { rx: a_rx }),
            (MemorySink { tx: b_tx }, MemoryStream { rx: b_rx }),
        )
    }
}
