pub mod model;
pub mod config;
pub mod error;
pub mod logging;
pub mod decoder;
pub mod embed;
pub mod commands;
pub mod events;
pub mod serenity_ext;
pub mod voice;
pub mod notify;
pub mod source;
pub mod rest;
pub mod msg;
pub mod player;
pub mod manager;
pub mod poller;
#[cfg(test)]
mod testing;

use std::error::Error;
use std::sync::Arc;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use crate::config::Config;
use crate::embed::Station;
use crate::manager::SessionRegistry;
use crate::model::track::TrackInfo;
use crate::msg::SignalReceiver;
use crate::notify::Announcer;
use crate::poller::{PollerState, TrackPoller};
use crate::source::TrackSource;
use crate::voice::VoiceGateway;

pub type AnyError = Box<dyn Error + Send + Sync>;

/// Owns the session registry, the poller and their shared state.
pub struct Relay {
    config: Config,
    station: Station,
    registry: Arc<SessionRegistry>,
    poller: Arc<TrackPoller>,
    state: Arc<PollerState>,
    source: Arc<dyn TrackSource>,
    ready: watch::Sender<bool>,
    shutdown: CancellationToken,
    signals: Mutex<Option<SignalReceiver>>,
    tasks: Mutex<Vec<JoinHandle<()>>>
}

impl Relay {
    pub fn new(
        config: Config,
        gateway: Arc<dyn VoiceGateway>,
        source: Arc<dyn TrackSource>,
        announcer: Arc<dyn Announcer>
    ) -> Self {
        let (registry, signals) = SessionRegistry::new(gateway, config.stream_url.clone(), config.default_volume);
        let registry = Arc::new(registry);
        let state = Arc::new(PollerState::default());
        let poller = Arc::new(TrackPoller::new(
            Arc::clone(&source),
            Arc::clone(&registry),
            announcer,
            Arc::clone(&state),
            config.poll_interval,
            config.baseline_policy
        ));
        let (ready, _) = watch::channel(false);

        Self {
            station: Station::from(&config),
            config,
            registry,
            poller,
            state,
            source,
            ready,
            shutdown: CancellationToken::new(),
            signals: Mutex::new(Some(signals)),
            tasks: Mutex::new(Vec::new())
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn station(&self) -> &Station {
        &self.station
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn poller_state(&self) -> &Arc<PollerState> {
        &self.state
    }

    /// Spawns the signal reconciler and the track poller. The poller idles
    /// until [`Relay::mark_ready`] is called. Calling this again does nothing.
    pub fn start(&self) {
        let Some(signals) = self.signals.lock().take() else {
            debug!("Relay already started");
            return;
        };

        let reconciler = tokio::spawn(
            Arc::clone(&self.registry).run_reconciler(signals, self.shutdown.clone())
        );
        let poller = tokio::spawn(
            Arc::clone(&self.poller).run(self.ready.subscribe(), self.shutdown.clone())
        );

        self.tasks.lock().extend([reconciler, poller]);
    }

    /// Signals that the platform connection is up.
    pub fn mark_ready(&self) {
        if !self.ready.send_replace(true) {
            info!("Gateway ready, releasing track updates");
        }
    }

    /// Last observed track, or a fresh lookup when there is none yet.
    pub async fn current_track(&self) -> Option<TrackInfo> {
        match self.state.last_track() {
            Some(track) => Some(track),
            None => self.source.fetch_current_track().await
        }
    }

    /// Stops background tasks and disconnects every guild. Later calls do nothing.
    pub async fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in futures::future::join_all(tasks).await {
            if let Err(e) = task {
                debug!("Background task ended abnormally: {e}");
            }
        }

        self.registry.disconnect_all().await;
        info!("Relay shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::testing::{FakeGateway, RecordingAnnouncer, ScriptedSource};

    fn relay(source: Arc<ScriptedSource>, gateway: Arc<FakeGateway>) -> Relay {
        Relay::new(
            Config::default(),
            gateway,
            source,
            Arc::new(RecordingAnnouncer::default())
        )
    }

    #[tokio::test]
    async fn current_track_prefers_cached_baseline() {
        let source = Arc::new(ScriptedSource::new([Some(TrackInfo::new("Song A")), Some(TrackInfo::new("Fresh"))]));
        let relay = relay(source.clone(), Arc::new(FakeGateway::default()));

        relay.poller.run_cycle().await;
        assert_eq!(relay.current_track().await.map(|t| t.title), Some("Song A".into()));
        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test]
    async fn current_track_fetches_without_baseline() {
        let source = Arc::new(ScriptedSource::new([Some(TrackInfo::new("Fresh"))]));
        let relay = relay(source.clone(), Arc::new(FakeGateway::default()));

        assert_eq!(relay.current_track().await.map(|t| t.title), Some("Fresh".into()));
        assert_eq!(source.fetches(), 1);
        assert!(relay.poller_state().last_track().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn start_gates_polling_on_ready_and_shuts_down() {
        let source = Arc::new(ScriptedSource::default());
        let gateway = Arc::new(FakeGateway::default());
        let relay = relay(source.clone(), gateway.clone());

        relay.start();
        relay.start();
        relay.registry().connect(1, 10, None).await.unwrap();

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(source.fetches(), 0);

        relay.mark_ready();
        relay.mark_ready();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(source.fetches(), 1);

        relay.shutdown().await;
        assert!(relay.registry().is_empty());
        assert_eq!(gateway.leaves(), 1);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(source.fetches(), 1);

        relay.shutdown().await;
        assert_eq!(gateway.leaves(), 1);
    }
}
