//! TCP player bridge: the production [`SurfaceFactory`].
//!
//! The playback surface lives in an external player process; this bridge
//! frames the embed wire protocol as JSON lines over a TCP connection to it.
//! Outbound command frames go down one line at a time, inbound event frames
//! come back the same way and feed the host's event loop.

use async_trait::async_trait;
use lbxhost::{EmbedSurface, Error as HostError, Result as HostResult, SurfaceFactory};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const INBOUND_QUEUE: usize = 64;

/// Connects to the configured player bridge address on each surface
/// creation.
pub struct TcpSurfaceFactory {
    addr: String,
}

impl TcpSurfaceFactory {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

struct BridgeSurface {
    outbound: mpsc::UnboundedSender<String>,
}

impl EmbedSurface for BridgeSurface {
    fn post(&self, raw: &str) -> HostResult<()> {
        self.outbound
            .send(raw.to_string())
            .map_err(|_| HostError::SurfaceClosed)
    }
}

#[async_trait]
impl SurfaceFactory for TcpSurfaceFactory {
    async fn create(&mut self) -> HostResult<(Box<dyn EmbedSurface>, mpsc::Receiver<String>)> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| HostError::SurfaceUnavailable(format!("{}: {e}", self.addr)))?;
        info!(addr = self.addr.as_str(), "Player bridge connected");
        let (read_half, write_half) = stream.into_split();

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            let mut write_half = write_half;
            while let Some(frame) = outbound_rx.recv().await {
                if write_half.write_all(frame.as_bytes()).await.is_err()
                    || write_half.write_all(b"\n").await.is_err()
                {
                    break;
                }
            }
            debug!("Bridge writer stopped");
        });

        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);
        tokio::spawn(async move {
            let mut lines = BufReader::new(read_half).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if inbound_tx.send(line).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Bridge read failed: {e}");
                        break;
                    }
                }
            }
            debug!("Bridge reader stopped");
        });

        Ok((Box::new(BridgeSurface { outbound: outbound_tx }), inbound_rx))
    }
}
