//! # lbxbus - Addressed messaging between the Lullabox contexts
//!
//! The coordinator (Background), the playback host (Offscreen) and any
//! number of panels (Popup) run as separate tasks that share no memory;
//! every interaction crosses this bus as an [`Envelope`].
//!
//! Delivery is fire-and-forget with an optional reply:
//! - [`MessageBus::notify`] sends without waiting for an answer,
//! - [`MessageBus::request`] attaches a oneshot reply slot.
//!
//! Both degrade gracefully: a missing or closed receiver resolves to
//! [`SendOutcome::Undeliverable`] instead of an error. A sender must never
//! crash merely because a panel is closed or the host has not been created
//! yet.

use std::sync::{Arc, Mutex};

use lbxmodel::{Ack, Command, Envelope, Target};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Mailbox depth per endpoint.
const ENDPOINT_QUEUE: usize = 32;

/// A delivered envelope plus its (optional) reply slot.
///
/// The slot is consumed by [`Delivery::respond`], so each inbound command is
/// answered at most once; dropping an unanswered delivery resolves the
/// requester through the soft-failure path.
#[derive(Debug)]
pub struct Delivery {
    pub envelope: Envelope,
    reply: Option<oneshot::Sender<Ack>>,
}

impl Delivery {
    pub fn command(&self) -> &Command {
        &self.envelope.command
    }

    pub fn expects_reply(&self) -> bool {
        self.reply.is_some()
    }

    /// Answer the sender. A second call, or a call on a notify-only
    /// delivery, is a no-op.
    pub fn respond(&mut self, ack: Ack) {
        if let Some(slot) = self.reply.take() {
            // The requester may have gone away; that is its problem.
            let _ = slot.send(ack);
        }
    }
}

/// What became of a send.
#[derive(Debug)]
pub enum SendOutcome {
    /// The receiver handled the command and answered.
    Replied(Ack),
    /// Handed to the receiver; no reply was requested (or none will come).
    Delivered,
    /// Nobody is listening on that target.
    Undeliverable(String),
}

impl SendOutcome {
    /// Collapse into the reply shape callers key on: undeliverable becomes a
    /// soft `{success:false}` ack.
    pub fn into_ack(self) -> Ack {
        match self {
            SendOutcome::Replied(ack) => ack,
            SendOutcome::Delivered => Ack::ok(),
            SendOutcome::Undeliverable(reason) => Ack::err(reason),
        }
    }

    pub fn is_delivered(&self) -> bool {
        !matches!(self, SendOutcome::Undeliverable(_))
    }
}

#[derive(Default)]
struct Registry {
    background: Option<mpsc::Sender<Delivery>>,
    offscreen: Option<mpsc::Sender<Delivery>>,
    panels: Vec<mpsc::Sender<Delivery>>,
}

/// The bus itself. Cheap to clone; all clones share the same registry.
#[derive(Clone, Default)]
pub struct MessageBus {
    registry: Arc<Mutex<Registry>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the single live endpoint for `Background` or `Offscreen`.
    /// Re-registering replaces the previous endpoint (its receiver closes).
    /// Registering `Popup` attaches an additional panel instead.
    pub fn register(&self, target: Target) -> mpsc::Receiver<Delivery> {
        if target == Target::Popup {
            return self.attach_panel();
        }
        let (tx, rx) = mpsc::channel(ENDPOINT_QUEUE);
        let mut registry = self.registry.lock().unwrap();
        match target {
            Target::Background => registry.background = Some(tx),
            Target::Offscreen => registry.offscreen = Some(tx),
            Target::Popup => unreachable!(),
        }
        rx
    }

    /// Attach one more panel endpoint. Panels receive every Popup-targeted
    /// envelope until their receiver is dropped.
    pub fn attach_panel(&self) -> mpsc::Receiver<Delivery> {
        let (tx, rx) = mpsc::channel(ENDPOINT_QUEUE);
        self.registry.lock().unwrap().panels.push(tx);
        rx
    }

    /// Fire-and-forget send.
    pub async fn notify(&self, envelope: Envelope) -> SendOutcome {
        self.dispatch(envelope, None).await
    }

    /// Send and wait for the receiver's reply.
    pub async fn request(&self, envelope: Envelope) -> SendOutcome {
        let (tx, rx) = oneshot::channel();
        let outcome = self.dispatch(envelope, Some(tx)).await;
        if !outcome.is_delivered() {
            return outcome;
        }
        match rx.await {
            Ok(ack) => SendOutcome::Replied(ack),
            // Receiver dropped the delivery without answering.
            Err(_) => SendOutcome::Undeliverable("No response".to_string()),
        }
    }

    async fn dispatch(
        &self,
        envelope: Envelope,
        reply: Option<oneshot::Sender<Ack>>,
    ) -> SendOutcome {
        match envelope.target {
            Target::Popup => self.fan_out_to_panels(envelope),
            target => {
                let endpoint = {
                    let registry = self.registry.lock().unwrap();
                    match target {
                        Target::Background => registry.background.clone(),
                        Target::Offscreen => registry.offscreen.clone(),
                        Target::Popup => unreachable!(),
                    }
                };
                let Some(tx) = endpoint else {
                    debug!(
                        action = envelope.command.action_name(),
                        ?target,
                        "No receiver registered"
                    );
                    return SendOutcome::Undeliverable(format!("No receiver for {target:?}"));
                };
                let delivery = Delivery { envelope, reply };
                if tx.send(delivery).await.is_err() {
                    // Endpoint task is gone; drop the stale registration.
                    let mut registry = self.registry.lock().unwrap();
                    match target {
                        Target::Background => registry.background = None,
                        Target::Offscreen => registry.offscreen = None,
                        Target::Popup => unreachable!(),
                    }
                    return SendOutcome::Undeliverable(format!("Receiver for {target:?} closed"));
                }
                SendOutcome::Delivered
            }
        }
    }

    /// Panels are best-effort listeners: closed ones are pruned, slow ones
    /// miss the update (the next broadcast carries the full state anyway).
    fn fan_out_to_panels(&self, envelope: Envelope) -> SendOutcome {
        let mut registry = self.registry.lock().unwrap();
        let mut reached = 0usize;
        registry.panels.retain(|tx| {
            match tx.try_send(Delivery {
                envelope: envelope.clone(),
                reply: None,
            }) {
                Ok(()) => {
                    reached += 1;
                    true
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        action = envelope.command.action_name(),
                        "Panel mailbox full, dropping update"
                    );
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
        if reached == 0 {
            SendOutcome::Undeliverable("No panel listening".to_string())
        } else {
            SendOutcome::Delivered
        }
    }
}
