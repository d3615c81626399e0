//! The surface seam: where the host meets an actual embedded player.
//!
//! The host never talks to a concrete transport. It posts raw frames through
//! [`EmbedSurface`] and reads raw frames from the receiver handed out by
//! [`SurfaceFactory::create`]. Production wires this to a real player bridge;
//! tests drive the in-process [`ChannelSurface`].

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{Error, Result};

/// The single playback surface the host exclusively owns.
pub trait EmbedSurface: Send + Sync {
    /// Post a raw frame toward the embed.
    fn post(&self, raw: &str) -> Result<()>;
}

/// Creates a fresh surface together with its inbound frame stream.
///
/// Creation may suspend (a bridge connects somewhere); the host awaits it
/// inside its own task, so callers on the bus never race a second creation.
#[async_trait]
pub trait SurfaceFactory: Send + Sync {
    async fn create(&mut self) -> Result<(Box<dyn EmbedSurface>, mpsc::Receiver<String>)>;
}

/// Buffer for inbound frames per surface.
const INBOUND_QUEUE: usize = 64;

/// In-process surface backed by channels.
pub struct ChannelSurface {
    outbound: mpsc::UnboundedSender<String>,
}

impl EmbedSurface for ChannelSurface {
    fn post(&self, raw: &str) -> Result<()> {
        self.outbound
            .send(raw.to_string())
            .map_err(|_| Error::SurfaceClosed)
    }
}

/// The far ends of a [`ChannelSurface`]: what the driver (test or bridge)
/// holds to observe outbound frames and inject inbound ones.
pub struct SurfaceEnds {
    pub outbound: mpsc::UnboundedReceiver<String>,
    pub inbound: mpsc::Sender<String>,
}

/// Factory handing out channel surfaces; each creation publishes its far
/// ends on the channel returned by [`ChannelSurfaceFactory::new`].
pub struct ChannelSurfaceFactory {
    ends: mpsc::UnboundedSender<SurfaceEnds>,
}

impl ChannelSurfaceFactory {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SurfaceEnds>) {
        let (ends_tx, ends_rx) = mpsc::unbounded_channel();
        (Self { ends: ends_tx }, ends_rx)
    }
}

#[async_trait]
impl SurfaceFactory for ChannelSurfaceFactory {
    async fn create(&mut self) -> Result<(Box<dyn EmbedSurface>, mpsc::Receiver<String>)> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);
        self.ends
            .send(SurfaceEnds {
                outbound: outbound_rx,
                inbound: inbound_tx,
            })
            .map_err(|_| Error::SurfaceUnavailable("No driver attached".to_string()))?;
        Ok((Box::new(ChannelSurface { outbound: outbound_tx }), inbound_rx))
    }
}
