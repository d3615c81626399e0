//! Line-oriented panel: forwards user intent as bus commands and renders
//! the coordinator's SYNC_UI pushes.
//!
//! This is deliberately the thinnest possible presenter; everything it does
//! goes through the same command vocabulary any other panel would use. It
//! also owns the capped play history, which the core never touches.

use lbxbus::MessageBus;
use lbxmodel::{Command, Envelope, SessionState, Track};
use lbxsearch::CatalogSearch;
use lbxstore::{keys, Store};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

pub struct Panel {
    bus: MessageBus,
    store: Store,
    search: CatalogSearch,
    history_cap: usize,
    results: Vec<Track>,
}

impl Panel {
    pub fn new(bus: MessageBus, store: Store, search: CatalogSearch, history_cap: usize) -> Self {
        Self {
            bus,
            store,
            search,
            history_cap,
            results: Vec::new(),
        }
    }

    /// Run until `quit` or end of input.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut pushes = self.bus.attach_panel();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        // Hydrate the display from whatever the coordinator already has.
        self.command(Command::GetCurrentState).await;
        println!("Lullabox ready. Type `help` for commands.");

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line? {
                        Some(line) => {
                            if !self.handle_line(line.trim()).await {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                push = pushes.recv() => {
                    let Some(delivery) = push else { break };
                    match delivery.envelope.command {
                        Command::SyncUi(state) => render(&state),
                        Command::ShowError { message } => println!("!! {message}"),
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }

    /// Returns false when the panel should exit.
    async fn handle_line(&mut self, line: &str) -> bool {
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        match verb {
            "" => {}
            "quit" | "exit" => return false,
            "help" => print_help(),
            "search" => self.do_search(rest).await,
            "play" => self.do_play(rest).await,
            "add" => self.do_add(rest).await,
            "rm" => match rest.parse::<i64>() {
                Ok(index) => self.command(Command::RemoveFromQueue { index }).await,
                Err(_) => println!("usage: rm <queue index>"),
            },
            "next" => self.command(Command::NextTrack).await,
            "prev" => self.command(Command::PrevTrack).await,
            "toggle" => self.command(Command::TogglePlay).await,
            "shuffle" => self.command(Command::ToggleShuffle).await,
            "repeat" => self.command(Command::ToggleRepeat).await,
            "mute" => self.command(Command::ToggleMute { mute: None }).await,
            "vol" => match rest.parse::<u16>() {
                Ok(volume) => self.command(Command::SetVolume { volume }).await,
                Err(_) => println!("usage: vol <0-100>"),
            },
            "seek" => match rest.parse::<f64>() {
                Ok(time) => self.command(Command::Seek { time }).await,
                Err(_) => println!("usage: seek <seconds>"),
            },
            "list" => self.command(Command::GetCurrentState).await,
            "clear" => self.command(Command::ClearQueue).await,
            "history" => self.print_history().await,
            other => println!("Unknown command `{other}`; try `help`."),
        }
        true
    }

    async fn do_search(&mut self, query: &str) {
        if query.is_empty() {
            println!("usage: search <query>");
            return;
        }
        match self.search.search(query, None).await {
            Ok(results) => {
                for (i, track) in results.iter().enumerate() {
                    println!("{:2}. {} — {}", i + 1, track.title, track.channel);
                }
                if results.is_empty() {
                    println!("No results.");
                }
                self.results = results;
            }
            Err(e) => println!("!! Search failed: {e}"),
        }
    }

    async fn do_play(&mut self, arg: &str) {
        let Some(track) = self.pick(arg) else {
            println!("usage: play <result number>");
            return;
        };
        self.record_history(&track).await;
        self.command(Command::PlayNew(Some(track))).await;
    }

    async fn do_add(&mut self, arg: &str) {
        let Some(track) = self.pick(arg) else {
            println!("usage: add <result number>");
            return;
        };
        let ack = self
            .bus
            .request(Envelope::to_background(Command::AddToQueue(track)))
            .await
            .into_ack();
        if ack.added == Some(false) {
            println!("Already queued.");
        }
    }

    fn pick(&self, arg: &str) -> Option<Track> {
        let n: usize = arg.parse().ok()?;
        self.results.get(n.checked_sub(1)?).cloned()
    }

    async fn command(&self, command: Command) {
        let ack = self
            .bus
            .request(Envelope::to_background(command))
            .await
            .into_ack();
        if !ack.success {
            println!("!! {}", ack.error.unwrap_or_else(|| "Command failed".into()));
        }
    }

    /// Most-recently-played first, deduplicated, capped.
    async fn record_history(&self, track: &Track) {
        let mut history: Vec<Track> = self.store.get(keys::HISTORY, Vec::new()).await;
        history.retain(|t| t.id != track.id);
        history.insert(0, track.clone());
        history.truncate(self.history_cap);
        if let Err(e) = self.store.set(keys::HISTORY, &history).await {
            warn!("Failed to record history: {e}");
        }
    }

    async fn print_history(&self) {
        let history: Vec<Track> = self.store.get(keys::HISTORY, Vec::new()).await;
        if history.is_empty() {
            println!("No history yet.");
        }
        for (i, track) in history.iter().enumerate() {
            println!("{:2}. {} — {}", i + 1, track.title, track.channel);
        }
    }
}

fn render(state: &SessionState) {
    let marker = if state.is_playing { ">" } else { "||" };
    match state.current_track() {
        Some(track) => {
            let position = state
                .current_index
                .map(|i| format!("{}/{}", i + 1, state.queue.len()))
                .unwrap_or_default();
            println!(
                "{marker} {} — {}  [{position}]  {:.0}s/{:.0}s  vol {}{}",
                track.title,
                track.channel,
                state.current_time,
                state.duration,
                state.volume,
                if state.is_muted { " (muted)" } else { "" },
            );
        }
        None => println!("{marker} queue empty"),
    }
}

fn print_help() {
    println!(
        "commands:\n  \
         search <query>      search the catalog\n  \
         play <n> | add <n>  play / queue a search result\n  \
         rm <i>              remove queue entry i (0-based)\n  \
         next | prev | toggle\n  \
         shuffle | repeat | mute | vol <0-100> | seek <secs>\n  \
         list | clear | history | quit"
    );
}
