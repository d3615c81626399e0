//! Task-level tests for the coordinator: command replies, persistence,
//! broadcasting, completion policy, host interplay.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lbxbus::{Delivery, MessageBus};
use lbxmodel::{
    Ack, Command, Envelope, PlayPhase, RepeatMode, SessionState, StateDelta, Target, Track,
};
use lbxsession::{Coordinator, HostLauncher};
use lbxstore::{keys, Store};
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_millis(500);
const SILENCE: Duration = Duration::from_millis(100);

struct CountingLauncher {
    launches: Arc<AtomicUsize>,
}

#[async_trait]
impl HostLauncher for CountingLauncher {
    async fn ensure_host(&mut self) -> anyhow::Result<()> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Rig {
    bus: MessageBus,
    store: Store,
    offscreen: mpsc::Receiver<Delivery>,
    panel: mpsc::Receiver<Delivery>,
    launches: Arc<AtomicUsize>,
}

fn rig_with_store(store: Store) -> Rig {
    let bus = MessageBus::new();
    let offscreen = bus.register(Target::Offscreen);
    let panel = bus.attach_panel();
    let launches = Arc::new(AtomicUsize::new(0));
    Coordinator::spawn(
        store.clone(),
        bus.clone(),
        Box::new(CountingLauncher {
            launches: launches.clone(),
        }),
    );
    Rig {
        bus,
        store,
        offscreen,
        panel,
        launches,
    }
}

fn rig() -> Rig {
    rig_with_store(Store::open_in_memory().unwrap())
}

fn track(id: &str) -> Track {
    Track::new(id, format!("title {id}"), "channel", "http://thumb")
}

async fn command(rig: &Rig, cmd: Command) -> Ack {
    rig.bus
        .request(Envelope::to_background(cmd))
        .await
        .into_ack()
}

async fn next_host_command(rig: &mut Rig) -> Command {
    timeout(WAIT, rig.offscreen.recv())
        .await
        .expect("host command expected")
        .unwrap()
        .envelope
        .command
}

async fn next_sync(rig: &mut Rig) -> SessionState {
    loop {
        let delivery = timeout(WAIT, rig.panel.recv())
            .await
            .expect("panel broadcast expected")
            .unwrap();
        if let Command::SyncUi(state) = delivery.envelope.command {
            return state;
        }
    }
}

async fn drain(rig: &mut Rig) {
    while let Ok(Some(_)) = timeout(SILENCE, rig.offscreen.recv()).await {}
    while let Ok(Some(_)) = timeout(SILENCE, rig.panel.recv()).await {}
}

#[tokio::test]
async fn play_new_appends_selects_and_starts_playback() {
    let mut rig = rig();
    let ack = command(&rig, Command::PlayNew(Some(track("aaaaaaaaaaa")))).await;
    assert!(ack.success);
    assert_eq!(ack.played, Some(true));

    match next_host_command(&mut rig).await {
        Command::PlayNew(Some(t)) => assert_eq!(t.id.as_str(), "aaaaaaaaaaa"),
        other => panic!("expected PLAY_NEW, got {}", other.action_name()),
    }

    let state = next_sync(&mut rig).await;
    assert_eq!(state.queue.len(), 1);
    assert_eq!(state.current_index, Some(0));
    assert!(state.is_playing);

    // Durable fields hit the store immediately.
    let queue: Vec<Track> = rig.store.get(keys::QUEUE, Vec::new()).await;
    assert_eq!(queue.len(), 1);
    assert_eq!(rig.store.get::<i64>(keys::CURRENT_INDEX, -1).await, 0);
}

#[tokio::test]
async fn duplicate_play_new_reselects_without_duplicating() {
    let mut rig = rig();
    command(&rig, Command::PlayNew(Some(track("aaaaaaaaaaa")))).await;
    command(&rig, Command::AddToQueue(track("bbbbbbbbbbb"))).await;
    drain(&mut rig).await;

    let ack = command(&rig, Command::PlayNew(Some(track("aaaaaaaaaaa")))).await;
    assert!(ack.success);
    assert_eq!(ack.played, Some(true));

    let state = next_sync(&mut rig).await;
    assert_eq!(state.queue.len(), 2);
    assert_eq!(state.current_index, Some(0));
}

#[tokio::test]
async fn play_new_without_an_id_is_rejected() {
    let mut rig = rig();
    let ack = command(&rig, Command::PlayNew(Some(track("")))).await;
    assert!(!ack.success);
    assert_eq!(ack.error.as_deref(), Some("Invalid payload"));

    // No mutation, no playback.
    assert!(timeout(SILENCE, rig.offscreen.recv()).await.is_err());
    let queue: Vec<Track> = rig.store.get(keys::QUEUE, Vec::new()).await;
    assert!(queue.is_empty());
}

#[tokio::test]
async fn add_to_queue_rejects_duplicates_softly() {
    let mut rig = rig();
    let ack = command(&rig, Command::AddToQueue(track("aaaaaaaaaaa"))).await;
    assert!(ack.success);
    assert_eq!(ack.added, Some(true));

    let ack = command(&rig, Command::AddToQueue(track("aaaaaaaaaaa"))).await;
    assert!(ack.success);
    assert_eq!(ack.added, Some(false));
    assert_eq!(ack.reason.as_deref(), Some("duplicate"));

    drain(&mut rig).await;
    let queue: Vec<Track> = rig.store.get(keys::QUEUE, Vec::new()).await;
    assert_eq!(queue.len(), 1);
}

#[tokio::test]
async fn removal_before_the_playing_track_shifts_the_index() {
    let mut rig = rig();
    command(&rig, Command::AddToQueue(track("aaaaaaaaaaa"))).await;
    command(&rig, Command::AddToQueue(track("bbbbbbbbbbb"))).await;
    command(&rig, Command::PlayNew(Some(track("ccccccccccc")))).await;
    drain(&mut rig).await;

    let ack = command(&rig, Command::RemoveFromQueue { index: 0 }).await;
    assert!(ack.success);

    let state = next_sync(&mut rig).await;
    assert_eq!(state.queue.len(), 2);
    assert_eq!(state.current_index, Some(1));
    assert_eq!(state.queue[1].id.as_str(), "ccccccccccc");
    // No restart of the running track.
    assert!(timeout(SILENCE, rig.offscreen.recv()).await.is_err());
    assert_eq!(rig.store.get::<i64>(keys::CURRENT_INDEX, -1).await, 1);
}

#[tokio::test]
async fn removing_the_last_remaining_track_stops_playback() {
    let mut rig = rig();
    command(&rig, Command::PlayNew(Some(track("aaaaaaaaaaa")))).await;
    drain(&mut rig).await;

    command(&rig, Command::RemoveFromQueue { index: 0 }).await;

    match next_host_command(&mut rig).await {
        Command::PlayNew(None) => {}
        other => panic!("expected stop, got {}", other.action_name()),
    }
    let state = next_sync(&mut rig).await;
    assert!(state.queue.is_empty());
    assert_eq!(state.current_index, None);
    assert!(!state.is_playing);
    assert_eq!(rig.store.get::<i64>(keys::CURRENT_INDEX, 0).await, -1);
}

#[tokio::test]
async fn out_of_range_removal_still_acks() {
    let mut rig = rig();
    command(&rig, Command::AddToQueue(track("aaaaaaaaaaa"))).await;
    drain(&mut rig).await;

    let ack = command(&rig, Command::RemoveFromQueue { index: 9 }).await;
    assert!(ack.success);
    let state = next_sync(&mut rig).await;
    assert_eq!(state.queue.len(), 1);
}

#[tokio::test]
async fn clear_queue_resets_everything_and_stops() {
    let mut rig = rig();
    command(&rig, Command::PlayNew(Some(track("aaaaaaaaaaa")))).await;
    command(&rig, Command::AddToQueue(track("bbbbbbbbbbb"))).await;
    drain(&mut rig).await;

    command(&rig, Command::ClearQueue).await;
    match next_host_command(&mut rig).await {
        Command::PlayNew(None) => {}
        other => panic!("expected stop, got {}", other.action_name()),
    }
    let state = next_sync(&mut rig).await;
    assert!(state.queue.is_empty());
    assert_eq!(state.current_index, None);
    assert!(!state.is_playing);
    assert_eq!(state.current_time, 0.0);

    let queue: Vec<Track> = rig.store.get(keys::QUEUE, vec![track("sentinel0000")]).await;
    assert!(queue.is_empty());
}

#[tokio::test]
async fn next_and_previous_wrap_the_queue() {
    let mut rig = rig();
    command(&rig, Command::AddToQueue(track("aaaaaaaaaaa"))).await;
    command(&rig, Command::AddToQueue(track("bbbbbbbbbbb"))).await;
    command(&rig, Command::PlayNew(Some(track("ccccccccccc")))).await;
    drain(&mut rig).await;

    // At index 2 (last): next wraps to 0.
    command(&rig, Command::NextTrack).await;
    let state = next_sync(&mut rig).await;
    assert_eq!(state.current_index, Some(0));

    // Previous from 0 wraps to the end.
    command(&rig, Command::PrevTrack).await;
    let state = next_sync(&mut rig).await;
    assert_eq!(state.current_index, Some(2));
    assert_eq!(rig.store.get::<i64>(keys::CURRENT_INDEX, -1).await, 2);
}

#[tokio::test]
async fn toggle_play_is_forwarded_not_interpreted() {
    let mut rig = rig();
    command(&rig, Command::PlayNew(Some(track("aaaaaaaaaaa")))).await;
    drain(&mut rig).await;

    let ack = command(&rig, Command::TogglePlay).await;
    assert!(ack.success);
    match next_host_command(&mut rig).await {
        Command::TogglePlay => {}
        other => panic!("expected TOGGLE_PLAY, got {}", other.action_name()),
    }
    // is_playing is only flipped by host phase reports.
    assert!(timeout(SILENCE, rig.panel.recv()).await.is_err());
}

#[tokio::test]
async fn settings_toggles_persist_and_broadcast() {
    let mut rig = rig();

    command(&rig, Command::ToggleShuffle).await;
    let state = next_sync(&mut rig).await;
    assert!(state.is_shuffle);
    assert!(rig.store.get::<bool>(keys::SHUFFLE, false).await);

    command(&rig, Command::ToggleRepeat).await;
    let state = next_sync(&mut rig).await;
    assert_eq!(state.repeat_mode, RepeatMode::All);
    assert_eq!(
        rig.store.get::<RepeatMode>(keys::REPEAT, RepeatMode::Off).await,
        RepeatMode::All
    );

    command(&rig, Command::ToggleRepeat).await;
    let state = next_sync(&mut rig).await;
    assert_eq!(state.repeat_mode, RepeatMode::One);
}

#[tokio::test]
async fn set_volume_clamps_persists_and_forwards() {
    let mut rig = rig();
    command(&rig, Command::SetVolume { volume: 150 }).await;
    let state = next_sync(&mut rig).await;
    assert_eq!(state.volume, 100);
    assert_eq!(rig.store.get::<u16>(keys::VOLUME, 50).await, 100);
    match next_host_command(&mut rig).await {
        Command::SetVolume { volume } => assert_eq!(volume, 100),
        other => panic!("expected SET_VOLUME, got {}", other.action_name()),
    }
}

#[tokio::test]
async fn toggle_mute_resolves_the_flag_for_the_host() {
    let mut rig = rig();
    command(&rig, Command::ToggleMute { mute: None }).await;
    match next_host_command(&mut rig).await {
        Command::ToggleMute { mute } => assert_eq!(mute, Some(true)),
        other => panic!("expected TOGGLE_MUTE, got {}", other.action_name()),
    }
    assert!(rig.store.get::<bool>(keys::MUTED, false).await);

    command(&rig, Command::ToggleMute { mute: None }).await;
    match next_host_command(&mut rig).await {
        Command::ToggleMute { mute } => assert_eq!(mute, Some(false)),
        other => panic!("expected TOGGLE_MUTE, got {}", other.action_name()),
    }
}

#[tokio::test]
async fn offscreen_ready_resyncs_volume_and_mute() {
    let mut rig = rig();
    command(&rig, Command::SetVolume { volume: 70 }).await;
    command(&rig, Command::ToggleMute { mute: None }).await;
    drain(&mut rig).await;

    command(&rig, Command::OffscreenReady).await;
    match next_host_command(&mut rig).await {
        Command::SetVolume { volume } => assert_eq!(volume, 70),
        other => panic!("expected SET_VOLUME, got {}", other.action_name()),
    }
    match next_host_command(&mut rig).await {
        Command::ToggleMute { mute } => assert_eq!(mute, Some(true)),
        other => panic!("expected TOGGLE_MUTE, got {}", other.action_name()),
    }
}

#[tokio::test]
async fn state_updates_merge_without_touching_the_queue() {
    let mut rig = rig();
    command(&rig, Command::PlayNew(Some(track("aaaaaaaaaaa")))).await;
    drain(&mut rig).await;

    command(
        &rig,
        Command::OffscreenStateUpdate(StateDelta {
            current_time: Some(42.0),
            duration: Some(180.0),
            is_muted: Some(false),
            ..Default::default()
        }),
    )
    .await;
    let state = next_sync(&mut rig).await;
    assert_eq!(state.current_time, 42.0);
    assert_eq!(state.duration, 180.0);
    assert_eq!(state.queue.len(), 1);
    assert_eq!(state.current_index, Some(0));
}

#[tokio::test]
async fn ended_with_repeat_one_replays_the_same_track() {
    let mut rig = rig();
    command(&rig, Command::AddToQueue(track("bbbbbbbbbbb"))).await;
    command(&rig, Command::PlayNew(Some(track("aaaaaaaaaaa")))).await;
    // Off -> All -> One
    command(&rig, Command::ToggleRepeat).await;
    command(&rig, Command::ToggleRepeat).await;
    drain(&mut rig).await;

    command(
        &rig,
        Command::OffscreenStateUpdate(StateDelta {
            phase: Some(PlayPhase::Paused),
            ended: Some(true),
            ..Default::default()
        }),
    )
    .await;

    match next_host_command(&mut rig).await {
        Command::PlayNew(Some(t)) => assert_eq!(t.id.as_str(), "aaaaaaaaaaa"),
        other => panic!("expected replay, got {}", other.action_name()),
    }
    let state = next_sync(&mut rig).await;
    assert!(state.is_playing);
    assert_eq!(state.current_index, Some(1));
}

#[tokio::test]
async fn ended_mid_queue_advances_to_the_next_track() {
    let mut rig = rig();
    command(&rig, Command::PlayNew(Some(track("aaaaaaaaaaa")))).await;
    command(&rig, Command::AddToQueue(track("bbbbbbbbbbb"))).await;
    drain(&mut rig).await;

    command(
        &rig,
        Command::OffscreenStateUpdate(StateDelta {
            phase: Some(PlayPhase::Paused),
            ended: Some(true),
            ..Default::default()
        }),
    )
    .await;

    match next_host_command(&mut rig).await {
        Command::PlayNew(Some(t)) => assert_eq!(t.id.as_str(), "bbbbbbbbbbb"),
        other => panic!("expected advance, got {}", other.action_name()),
    }
    let state = next_sync(&mut rig).await;
    assert_eq!(state.current_index, Some(1));
    assert!(state.is_playing);
}

#[tokio::test]
async fn ended_on_the_last_track_without_repeat_stops() {
    let mut rig = rig();
    command(&rig, Command::AddToQueue(track("aaaaaaaaaaa"))).await;
    command(&rig, Command::PlayNew(Some(track("bbbbbbbbbbb")))).await;
    drain(&mut rig).await;

    command(
        &rig,
        Command::OffscreenStateUpdate(StateDelta {
            phase: Some(PlayPhase::Paused),
            ended: Some(true),
            ..Default::default()
        }),
    )
    .await;

    // Terminal: no advance, no replay.
    assert!(timeout(SILENCE, rig.offscreen.recv()).await.is_err());
    let state = next_sync(&mut rig).await;
    assert!(!state.is_playing);
    assert_eq!(state.current_index, Some(1));
}

#[tokio::test]
async fn show_error_is_relayed_to_panels() {
    let mut rig = rig();
    command(
        &rig,
        Command::ShowError {
            message: "Playback blocked (embedding restricted)".to_string(),
        },
    )
    .await;
    let delivery = timeout(WAIT, rig.panel.recv()).await.unwrap().unwrap();
    match delivery.envelope.command {
        Command::ShowError { message } => {
            assert_eq!(message, "Playback blocked (embedding restricted)");
        }
        other => panic!("expected SHOW_ERROR, got {}", other.action_name()),
    }
}

#[tokio::test]
async fn host_is_launched_once_and_only_for_playback_commands() {
    let rig = rig();
    command(&rig, Command::AddToQueue(track("aaaaaaaaaaa"))).await;
    assert_eq!(rig.launches.load(Ordering::SeqCst), 0);

    command(&rig, Command::PlayNew(Some(track("bbbbbbbbbbb")))).await;
    command(&rig, Command::TogglePlay).await;
    command(&rig, Command::NextTrack).await;
    assert_eq!(rig.launches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn state_is_hydrated_from_the_store_on_startup() {
    let store = Store::open_in_memory().unwrap();
    let seeded = vec![track("aaaaaaaaaaa"), track("bbbbbbbbbbb")];
    store.set(keys::QUEUE, &seeded).await.unwrap();
    // Out of range on purpose: restart hygiene clamps to the first entry.
    store.set(keys::CURRENT_INDEX, &7i64).await.unwrap();
    store.set(keys::VOLUME, &80u16).await.unwrap();
    store.set(keys::REPEAT, &RepeatMode::All).await.unwrap();
    store.set(keys::SHUFFLE, &true).await.unwrap();

    let mut rig = rig_with_store(store);
    command(&rig, Command::GetCurrentState).await;
    let state = next_sync(&mut rig).await;
    assert_eq!(state.queue, seeded);
    assert_eq!(state.current_index, Some(0));
    assert_eq!(state.volume, 80);
    assert_eq!(state.repeat_mode, RepeatMode::All);
    assert!(state.is_shuffle);
    // Transients restart cold.
    assert!(!state.is_playing);
    assert_eq!(state.current_time, 0.0);
}

#[tokio::test]
async fn shuffle_next_never_lands_on_the_current_index() {
    let mut rig = rig();
    for id in ["aaaaaaaaaaa", "bbbbbbbbbbb", "ccccccccccc", "ddddddddddd"] {
        command(&rig, Command::AddToQueue(track(id))).await;
    }
    command(&rig, Command::PlayNew(Some(track("aaaaaaaaaaa")))).await;
    command(&rig, Command::ToggleShuffle).await;
    drain(&mut rig).await;

    let mut previous = Some(0);
    for _ in 0..10 {
        command(&rig, Command::NextTrack).await;
        let state = next_sync(&mut rig).await;
        assert_ne!(state.current_index, previous);
        previous = state.current_index;
        // One load per advance.
        match next_host_command(&mut rig).await {
            Command::PlayNew(Some(_)) => {}
            other => panic!("expected load, got {}", other.action_name()),
        }
    }
}
