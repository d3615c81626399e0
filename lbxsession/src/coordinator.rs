//! The coordinator task: single owner of the session state.
//!
//! Every inbound command re-hydrates the persisted fields from the store
//! before taking effect, so a restarted (or competing) coordinator never
//! trusts a stale in-memory cache. Transient fields (`is_playing`,
//! `current_time`, `duration`) live only in memory and restart as
//! not-playing / zero.

use async_trait::async_trait;
use lbxbus::{Delivery, MessageBus};
use lbxmodel::{
    Ack, Command, Envelope, Removal, RepeatMode, SessionState, StateDelta, Target, Track,
    DEFAULT_VOLUME,
};
use lbxstore::{keys, Store};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::policy::{self, CompletionAction};
use crate::{Error, Result};

/// Create-if-absent seam for the playback surface context.
///
/// The coordinator awaits `ensure_host` before any playback-affecting
/// command; because commands are handled one at a time, a creation in
/// progress is naturally awaited rather than raced. Implementations must
/// still be idempotent across coordinator restarts.
#[async_trait]
pub trait HostLauncher: Send + Sync {
    async fn ensure_host(&mut self) -> anyhow::Result<()>;
}

/// Handle to the spawned coordinator task.
pub struct CoordinatorHandle {
    join: JoinHandle<()>,
}

impl CoordinatorHandle {
    /// Wait for the coordinator to finish (it finishes when its bus endpoint
    /// is replaced or the bus goes away).
    pub async fn wait(self) {
        if let Err(err) = self.join.await {
            if !err.is_cancelled() {
                error!("Coordinator task panicked: {err}");
            }
        }
    }

    pub fn abort(&self) {
        self.join.abort();
    }
}

/// The session coordinator.
pub struct Coordinator;

impl Coordinator {
    /// Spawn the coordinator task and register it as the Background bus
    /// endpoint.
    pub fn spawn(
        store: Store,
        bus: MessageBus,
        launcher: Box<dyn HostLauncher>,
    ) -> CoordinatorHandle {
        let deliveries = bus.register(Target::Background);
        let join = tokio::spawn(async move {
            let mut state = CoordinatorState {
                store,
                bus,
                launcher,
                session: SessionState::new(),
                host_started: false,
            };
            state.hydrate().await;
            info!(
                queue_len = state.session.queue.len(),
                "Coordinator started"
            );
            state.run(deliveries).await;
            info!("Coordinator stopped");
        });
        CoordinatorHandle { join }
    }
}

struct CoordinatorState {
    store: Store,
    bus: MessageBus,
    launcher: Box<dyn HostLauncher>,
    session: SessionState,
    host_started: bool,
}

impl CoordinatorState {
    async fn run(&mut self, mut deliveries: mpsc::Receiver<Delivery>) {
        while let Some(mut delivery) = deliveries.recv().await {
            let command = delivery.envelope.command.clone();
            let action = command.action_name();
            let ack = match self.handle_command(command).await {
                Ok(ack) => ack,
                Err(err) => {
                    error!(action, "Command failed: {err}");
                    Ack::err(err.to_string())
                }
            };
            // Exactly one reply per inbound command, success or error.
            delivery.respond(ack);
        }
    }

    async fn handle_command(&mut self, command: Command) -> Result<Ack> {
        self.hydrate().await;

        if needs_playback_surface(&command) {
            self.ensure_host().await;
        }

        match command {
            Command::PlayNew(Some(track)) => self.play_new(track).await,
            Command::AddToQueue(track) => self.add_to_queue(track).await,
            Command::RemoveFromQueue { index } => self.remove_from_queue(index).await,
            Command::ClearQueue => self.clear_queue().await,
            Command::TogglePlay => {
                self.send_to_host(Command::TogglePlay).await;
                Ok(Ack::ok())
            }
            Command::NextTrack => self.advance(Direction::Next).await,
            Command::PrevTrack => self.advance(Direction::Previous).await,
            Command::Seek { time } => {
                self.send_to_host(Command::Seek { time }).await;
                Ok(Ack::ok())
            }
            Command::ToggleShuffle => {
                self.session.is_shuffle = !self.session.is_shuffle;
                self.store.set(keys::SHUFFLE, &self.session.is_shuffle).await?;
                self.broadcast().await;
                Ok(Ack::ok())
            }
            Command::ToggleRepeat => {
                self.session.repeat_mode = self.session.repeat_mode.cycle();
                self.store.set(keys::REPEAT, &self.session.repeat_mode).await?;
                self.broadcast().await;
                Ok(Ack::ok())
            }
            Command::ToggleMute { .. } => self.toggle_mute().await,
            Command::SetVolume { volume } => self.set_volume(volume).await,
            Command::GetCurrentState => {
                self.broadcast().await;
                Ok(Ack::ok())
            }
            Command::OffscreenReady => self.offscreen_ready().await,
            Command::OffscreenStateUpdate(delta) => self.offscreen_state_update(delta).await,
            Command::ShowError { message } => {
                // Relay player failures to whoever is watching.
                self.bus
                    .notify(Envelope::to_popup(Command::ShowError { message }))
                    .await;
                Ok(Ack::ok())
            }
            other => {
                debug!(action = other.action_name(), "Ignoring command");
                Ok(Ack::ok())
            }
        }
    }

    // ------------------------------------------------------------------
    // Queue commands
    // ------------------------------------------------------------------

    async fn play_new(&mut self, track: Track) -> Result<Ack> {
        if track.id.as_str().is_empty() {
            return Err(Error::InvalidPayload);
        }

        let selected = self.session.select_or_append(track);
        if selected.appended {
            self.persist_queue().await?;
        }
        self.persist_index().await?;
        self.play_current().await;
        self.broadcast().await;
        Ok(Ack::played())
    }

    async fn add_to_queue(&mut self, track: Track) -> Result<Ack> {
        if track.id.as_str().is_empty() {
            return Err(Error::InvalidPayload);
        }
        if !self.session.enqueue(track) {
            return Ok(Ack::duplicate());
        }
        self.persist_queue().await?;
        self.broadcast().await;
        Ok(Ack::added())
    }

    async fn remove_from_queue(&mut self, index: i64) -> Result<Ack> {
        let removal = match usize::try_from(index) {
            Ok(i) => self.session.remove(i),
            Err(_) => Removal::OutOfRange,
        };
        if removal == Removal::Emptied {
            // The playing track went away with the queue.
            self.send_to_host(Command::PlayNew(None)).await;
        }
        self.persist_queue().await?;
        self.persist_index().await?;
        self.broadcast().await;
        Ok(Ack::ok())
    }

    async fn clear_queue(&mut self) -> Result<Ack> {
        self.session.clear();
        self.persist_queue().await?;
        self.persist_index().await?;
        self.send_to_host(Command::PlayNew(None)).await;
        self.broadcast().await;
        Ok(Ack::ok())
    }

    // ------------------------------------------------------------------
    // Transport commands
    // ------------------------------------------------------------------

    async fn advance(&mut self, direction: Direction) -> Result<Ack> {
        let len = self.session.queue.len();
        if len > 0 {
            let current = self.session.current_index;
            let next = match direction {
                Direction::Next => {
                    policy::next_index(len, current, self.session.is_shuffle, &mut rand::rng())
                }
                Direction::Previous => policy::prev_index(len, current),
            };
            self.session.current_index = next;
            self.persist_index().await?;
            self.play_current().await;
        }
        self.broadcast().await;
        Ok(Ack::ok())
    }

    async fn toggle_mute(&mut self) -> Result<Ack> {
        self.session.is_muted = !self.session.is_muted;
        self.store.set(keys::MUTED, &self.session.is_muted).await?;
        self.send_to_host(Command::ToggleMute {
            mute: Some(self.session.is_muted),
        })
        .await;
        self.broadcast().await;
        Ok(Ack::ok())
    }

    async fn set_volume(&mut self, volume: u16) -> Result<Ack> {
        self.session.volume = volume.min(100);
        self.store.set(keys::VOLUME, &self.session.volume).await?;
        self.send_to_host(Command::SetVolume {
            volume: self.session.volume,
        })
        .await;
        self.broadcast().await;
        Ok(Ack::ok())
    }

    // ------------------------------------------------------------------
    // Host events
    // ------------------------------------------------------------------

    async fn offscreen_ready(&mut self) -> Result<Ack> {
        self.host_started = true;
        // The surface may have been recreated with defaults: push the
        // session's volume and mute state back down.
        self.send_to_host(Command::SetVolume {
            volume: self.session.volume,
        })
        .await;
        if self.session.is_muted {
            self.send_to_host(Command::ToggleMute { mute: Some(true) })
                .await;
        }
        Ok(Ack::ok())
    }

    async fn offscreen_state_update(&mut self, delta: StateDelta) -> Result<Ack> {
        let ended = self.session.merge_report(&delta);
        if ended && !self.session.queue.is_empty() {
            self.handle_track_ended().await?;
        }
        self.broadcast().await;
        Ok(Ack::ok())
    }

    async fn handle_track_ended(&mut self) -> Result<()> {
        let len = self.session.queue.len();
        let action = policy::on_track_ended(
            self.session.repeat_mode,
            self.session.is_shuffle,
            self.session.current_index,
            len,
        );
        match action {
            CompletionAction::Replay => self.play_current().await,
            CompletionAction::Advance => {
                self.session.current_index = policy::next_index(
                    len,
                    self.session.current_index,
                    self.session.is_shuffle,
                    &mut rand::rng(),
                );
                self.persist_index().await?;
                self.play_current().await;
            }
            CompletionAction::Stop => {
                // Queue exhausted: stay on the last track, stopped.
                self.session.is_playing = false;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------

    /// Re-read the durable fields. Transient playback fields are left alone.
    async fn hydrate(&mut self) {
        self.session.queue = self.store.get(keys::QUEUE, Vec::new()).await;
        let index: i64 = self.store.get(keys::CURRENT_INDEX, -1).await;
        self.session.current_index = usize::try_from(index).ok();
        self.session.volume = self.store.get(keys::VOLUME, DEFAULT_VOLUME).await;
        self.session.repeat_mode = self.store.get(keys::REPEAT, RepeatMode::Off).await;
        self.session.is_shuffle = self.store.get(keys::SHUFFLE, false).await;
        self.session.is_muted = self.store.get(keys::MUTED, false).await;
        self.session.clamp_index();
    }

    /// Make sure the playback surface context exists. Failure is logged and
    /// tolerated: commands toward a missing host soft-fail at the bus.
    async fn ensure_host(&mut self) {
        if self.host_started {
            return;
        }
        match self.launcher.ensure_host().await {
            Ok(()) => self.host_started = true,
            Err(err) => {
                warn!("Playback host creation failed: {err}");
                self.host_started = true;
            }
        }
    }

    /// Start (or restart) playback of the selected track.
    async fn play_current(&mut self) {
        if let Some(track) = self.session.current_track().cloned() {
            self.send_to_host(Command::PlayNew(Some(track))).await;
            self.session.is_playing = true;
        }
    }

    async fn send_to_host(&self, command: Command) {
        let outcome = self.bus.notify(Envelope::to_offscreen(command)).await;
        if !outcome.is_delivered() {
            debug!("Playback host not reachable");
        }
    }

    /// Push the canonical state to every open panel.
    async fn broadcast(&self) {
        self.bus
            .notify(Envelope::to_popup(Command::SyncUi(self.session.clone())))
            .await;
    }

    async fn persist_queue(&self) -> Result<()> {
        self.store.set(keys::QUEUE, &self.session.queue).await?;
        Ok(())
    }

    async fn persist_index(&self) -> Result<()> {
        let index: i64 = self.session.current_index.map_or(-1, |i| i as i64);
        self.store.set(keys::CURRENT_INDEX, &index).await?;
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Next,
    Previous,
}

/// Commands that need the playback surface context up before they run.
fn needs_playback_surface(command: &Command) -> bool {
    matches!(
        command,
        Command::PlayNew(_)
            | Command::TogglePlay
            | Command::NextTrack
            | Command::PrevTrack
            | Command::ToggleMute { .. }
    )
}
