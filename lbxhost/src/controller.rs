//! The playback host task: surface lifecycle, intent tracking, watchdog.
//!
//! Lifecycle: `NoSurface -> AwaitingHandshake -> Ready`. The first load
//! request creates the surface and starts a repeating `listening` probe;
//! the embed's first readiness signal promotes to `Ready`, at which point a
//! track requested early is started. Ordinary track changes re-use the Ready
//! surface through a load command.
//!
//! The `should_play` intent flag is the reference the watchdog compares the
//! observed embed phase against: while it is set, a reported pause or end is
//! treated as a stall and play is re-asserted within one retry interval.
//! Embed errors are terminal for the track and are never retried.

use std::time::Duration;

use lbxbus::{Delivery, MessageBus};
use lbxmodel::{Ack, Command, Envelope, PlayPhase, StateDelta, Target, Track, DEFAULT_VOLUME};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::surface::{EmbedSurface, SurfaceFactory};
use crate::wire::{
    error_message, listening_probe, parse_event, CommandFrame, EmbedEvent, InfoDelivery,
    STATE_ENDED, STATE_PAUSED, STATE_PLAYING,
};
use crate::Result;

/// Timing and defaults for the host.
#[derive(Clone, Debug)]
pub struct HostConfig {
    /// Probe period while waiting for the embed to start listening.
    pub handshake_interval: Duration,
    /// Watchdog period while intent is play but the embed is not playing.
    pub retry_interval: Duration,
    /// Volume re-asserted by the watchdog before any SET_VOLUME arrives.
    pub default_volume: u16,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            handshake_interval: Duration::from_millis(300),
            retry_interval: Duration::from_millis(800),
            default_volume: DEFAULT_VOLUME,
        }
    }
}

/// Handle to the spawned host task.
pub struct PlaybackHostHandle {
    join: JoinHandle<()>,
}

impl PlaybackHostHandle {
    /// Wait for the host task to finish (it finishes when its bus endpoint
    /// is replaced or the bus goes away).
    pub async fn wait(self) {
        if let Err(err) = self.join.await {
            if !err.is_cancelled() {
                error!("Playback host task panicked: {err}");
            }
        }
    }

    pub fn abort(&self) {
        self.join.abort();
    }
}

/// The playback host.
pub struct PlaybackHost;

impl PlaybackHost {
    /// Spawn the host task and register it as the Offscreen bus endpoint.
    pub fn spawn(
        factory: Box<dyn SurfaceFactory>,
        bus: MessageBus,
        config: HostConfig,
    ) -> PlaybackHostHandle {
        let deliveries = bus.register(Target::Offscreen);
        let join = tokio::spawn(async move {
            info!("Playback host started");
            let mut state = HostState::new(factory, bus, config);
            state.run(deliveries).await;
            info!("Playback host stopped");
        });
        PlaybackHostHandle { join }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SurfacePhase {
    NoSurface,
    AwaitingHandshake,
    Ready,
}

struct HostState {
    factory: Box<dyn SurfaceFactory>,
    bus: MessageBus,
    surface: Option<Box<dyn EmbedSurface>>,
    events: Option<mpsc::Receiver<String>>,
    phase: SurfacePhase,
    /// Track requested before the surface became Ready.
    pending: Option<Track>,
    /// The intent flag: true while the system is committed to audible
    /// playback of the current track.
    should_play: bool,
    retry_active: bool,
    last_volume: u16,
    handshake: Interval,
    retry: Interval,
}

impl HostState {
    fn new(factory: Box<dyn SurfaceFactory>, bus: MessageBus, config: HostConfig) -> Self {
        let mut handshake = interval(config.handshake_interval);
        handshake.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut retry = interval(config.retry_interval);
        retry.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            factory,
            bus,
            last_volume: config.default_volume,
            surface: None,
            events: None,
            phase: SurfacePhase::NoSurface,
            pending: None,
            should_play: false,
            retry_active: false,
            handshake,
            retry,
        }
    }

    async fn run(&mut self, mut deliveries: mpsc::Receiver<Delivery>) {
        loop {
            tokio::select! {
                delivery = deliveries.recv() => {
                    let Some(mut delivery) = delivery else { break };
                    let command = delivery.envelope.command.clone();
                    match self.handle_command(command).await {
                        Ok(()) => delivery.respond(Ack::ok()),
                        Err(err) => {
                            error!(
                                action = delivery.command().action_name(),
                                "Host command failed: {err}"
                            );
                            delivery.respond(Ack::err(err.to_string()));
                        }
                    }
                }
                raw = next_event(&mut self.events) => {
                    match raw {
                        Some(raw) => self.handle_surface_frame(&raw).await,
                        None => {
                            // Transport gone; a future load recreates it.
                            warn!("Surface transport closed");
                            self.surface = None;
                            self.events = None;
                            self.phase = SurfacePhase::NoSurface;
                            self.retry_active = false;
                        }
                    }
                }
                _ = self.handshake.tick(), if self.phase == SurfacePhase::AwaitingHandshake => {
                    if let Some(surface) = &self.surface {
                        let _ = surface.post(&listening_probe());
                    }
                }
                _ = self.retry.tick(), if self.retry_active => {
                    self.reassert_play();
                }
            }
        }
    }

    async fn handle_command(&mut self, command: Command) -> Result<()> {
        match command {
            Command::PlayNew(None) => self.stop(),
            Command::PlayNew(Some(track)) => self.load(track).await,
            Command::TogglePlay => {
                // Toggling always biases toward play: the pause path is
                // driven by explicit embed phase, not by this command.
                self.should_play = true;
                self.post(CommandFrame::play())
            }
            Command::SetVolume { volume } => {
                self.last_volume = volume;
                self.post(CommandFrame::set_volume(volume))
            }
            Command::ToggleMute { mute: Some(true) } => self.post(CommandFrame::mute()),
            Command::ToggleMute { mute: Some(false) } => self.post(CommandFrame::unmute()),
            Command::ToggleMute { mute: None } => Ok(()),
            Command::Seek { time } => self.post(CommandFrame::seek_to(time)),
            other => {
                debug!(action = other.action_name(), "Ignoring command");
                Ok(())
            }
        }
    }

    /// Explicit stop: clear intent, silence the embed, cancel the watchdog.
    fn stop(&mut self) -> Result<()> {
        self.should_play = false;
        self.retry_active = false;
        if self.surface.is_some() {
            self.post(CommandFrame::stop())?;
            self.post(CommandFrame::pause())?;
        }
        Ok(())
    }

    async fn load(&mut self, track: Track) -> Result<()> {
        self.should_play = true;

        if self.surface.is_none() {
            debug!(track = %track.id, "Creating playback surface");
            let (surface, events) = self.factory.create().await?;
            self.surface = Some(surface);
            self.events = Some(events);
            self.phase = SurfacePhase::AwaitingHandshake;
            self.handshake.reset();
            self.pending = Some(track);
            return Ok(());
        }

        if self.phase != SurfacePhase::Ready {
            self.pending = Some(track);
            return Ok(());
        }

        self.start_track(&track)
    }

    fn start_track(&mut self, track: &Track) -> Result<()> {
        info!(track = %track.id, title = track.title.as_str(), "Loading track");
        self.post(CommandFrame::load_video(&track.id))?;
        self.arm_retry();
        Ok(())
    }

    /// Arm the watchdog. The interval is shared and reset on arming, so
    /// exactly one retry cadence exists per surface.
    fn arm_retry(&mut self) {
        self.retry_active = true;
        self.retry.reset();
    }

    fn reassert_play(&mut self) {
        if !self.should_play {
            self.retry_active = false;
            return;
        }
        let _ = self.post(CommandFrame::play());
        let _ = self.post(CommandFrame::unmute());
        let _ = self.post(CommandFrame::set_volume(self.last_volume));
    }

    async fn handle_surface_frame(&mut self, raw: &str) {
        match parse_event(raw) {
            Some(EmbedEvent::Ready) => {
                if self.phase != SurfacePhase::Ready {
                    info!("Surface handshake complete");
                    self.phase = SurfacePhase::Ready;
                    self.notify(Envelope::to_background(Command::OffscreenReady))
                        .await;
                    if let Some(track) = self.pending.take() {
                        if let Err(err) = self.start_track(&track) {
                            error!(track = %track.id, "Deferred start failed: {err}");
                        }
                    }
                }
            }
            Some(EmbedEvent::Info(info)) => self.handle_info(info).await,
            None => {}
        }
    }

    async fn handle_info(&mut self, info: InfoDelivery) {
        if let Some(code) = info.error {
            // A real playback error: retrying cannot fix an unembeddable or
            // restricted video. Terminal for this track.
            warn!(code, "Embed reported an error");
            self.retry_active = false;
            self.should_play = false;
            self.notify(Envelope::to_background(Command::ShowError {
                message: error_message(code),
            }))
            .await;
            return;
        }

        if let Some(state) = info.player_state {
            let playing = state == STATE_PLAYING;
            let paused = state == STATE_PAUSED;
            let ended = state == STATE_ENDED;

            if self.should_play && (paused || ended) {
                // The embed stopped against the user's intent: force play
                // back on and keep poking until it sticks.
                warn!(state, "Unexpected stall, re-asserting play");
                self.arm_retry();
                let _ = self.post(CommandFrame::play());
            } else if playing {
                self.retry_active = false;
            }

            self.notify(Envelope::to_background(Command::OffscreenStateUpdate(
                StateDelta {
                    phase: Some(if playing {
                        PlayPhase::Playing
                    } else {
                        PlayPhase::Paused
                    }),
                    ended: Some(ended),
                    ..Default::default()
                },
            )))
            .await;
        }

        if info.current_time.is_some() {
            self.notify(Envelope::to_background(Command::OffscreenStateUpdate(
                StateDelta {
                    current_time: info.current_time,
                    duration: Some(info.duration.unwrap_or(0.0)),
                    is_muted: info.muted,
                    ..Default::default()
                },
            )))
            .await;
        }
    }

    fn post(&mut self, frame: CommandFrame) -> Result<()> {
        let Some(surface) = &self.surface else {
            debug!(func = ?frame.func, "No surface, dropping frame");
            return Ok(());
        };
        surface.post(&frame.encode()?)
    }

    async fn notify(&self, envelope: Envelope) {
        let outcome = self.bus.notify(envelope).await;
        if !outcome.is_delivered() {
            debug!("Coordinator not reachable for host event");
        }
    }
}

/// Next inbound frame, or pend forever while no surface exists.
async fn next_event(events: &mut Option<mpsc::Receiver<String>>) -> Option<String> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
