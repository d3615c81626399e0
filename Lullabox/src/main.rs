//! Lullabox: background media player.
//!
//! Wiring order matters only in that the coordinator must exist before the
//! panel starts issuing commands; the playback host is created lazily by the
//! coordinator through [`SpawnHost`] the first time playback is requested.

mod bridge;
mod panel;

use std::time::Duration;

use async_trait::async_trait;
use lbxbus::MessageBus;
use lbxhost::{HostConfig, PlaybackHost, PlaybackHostHandle};
use lbxsearch::CatalogSearch;
use lbxsession::{Coordinator, HostLauncher};
use lbxstore::Store;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::bridge::TcpSurfaceFactory;
use crate::panel::Panel;

/// Lazily spawns the playback host on first playback demand.
struct SpawnHost {
    bus: MessageBus,
    config: HostConfig,
    surface_addr: String,
    handle: Option<PlaybackHostHandle>,
}

#[async_trait]
impl HostLauncher for SpawnHost {
    async fn ensure_host(&mut self) -> anyhow::Result<()> {
        if self.handle.is_none() {
            let factory = TcpSurfaceFactory::new(self.surface_addr.clone());
            self.handle = Some(PlaybackHost::spawn(
                Box::new(factory),
                self.bus.clone(),
                self.config.clone(),
            ));
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = lbxconfig::get_config();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log.filter.clone())),
        )
        .init();

    info!("🎵 Lullabox starting");

    let store = Store::open(&config.db_path())?;
    let bus = MessageBus::new();

    let launcher = SpawnHost {
        bus: bus.clone(),
        config: HostConfig {
            handshake_interval: Duration::from_millis(config.player.handshake_interval_ms),
            retry_interval: Duration::from_millis(config.player.retry_interval_ms),
            default_volume: config.player.default_volume,
        },
        surface_addr: config.player.surface_addr.clone(),
        handle: None,
    };

    let coordinator = Coordinator::spawn(store.clone(), bus.clone(), Box::new(launcher));
    info!("✅ Session coordinator ready");

    let search = CatalogSearch::builder()
        .api_key(config.search.api_key.clone())
        .endpoint(config.search.endpoint.clone())
        .timeout(Duration::from_secs(config.search.timeout_secs))
        .max_results(config.search.max_results)
        .build();

    Panel::new(bus, store, search, config.history.max_entries)
        .run()
        .await?;

    coordinator.abort();
    info!("Lullabox stopped");
    Ok(())
}
