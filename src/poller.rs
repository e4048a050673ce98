use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use crate::manager::SessionRegistry;
use crate::model::track::TrackInfo;
use crate::notify::{self, Announcer};
use crate::source::TrackSource;

/// How the baseline track is updated after a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BaselinePolicy {
    /// Always replace the baseline with the latest fetch, even a failed one.
    /// A failed fetch therefore resets change detection.
    #[default]
    Overwrite,
    /// Keep the last successfully fetched track when a fetch fails.
    KeepLastKnown
}

impl FromStr for BaselinePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "keep-last-known" | "keep_last_known" => Ok(Self::KeepLastKnown),
            other => Err(format!("unknown baseline policy: {other}"))
        }
    }
}

impl fmt::Display for BaselinePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overwrite => f.write_str("overwrite"),
            Self::KeepLastKnown => f.write_str("keep-last-known")
        }
    }
}

/// Process wide poller memory.
#[derive(Default)]
pub struct PollerState {
    last_track: Mutex<Option<TrackInfo>>
}

impl PollerState {
    pub fn last_track(&self) -> Option<TrackInfo> {
        self.last_track.lock().clone()
    }

    fn update(&self, track: Option<TrackInfo>, policy: BaselinePolicy) {
        let mut last = self.last_track.lock();

        match (policy, track) {
            (BaselinePolicy::KeepLastKnown, None) => {},
            (_, track) => *last = track
        }
    }
}

/// What happened during one poll cycle.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CycleOutcome {
    pub fetched: Option<TrackInfo>,
    /// Whether a track change was detected and announced.
    pub changed: bool,
    /// Guilds the announcement reached.
    pub notified: Vec<u64>,
    /// Guilds without any channel to post in.
    pub skipped: Vec<u64>,
    /// Guilds where posting failed.
    pub failed: Vec<u64>
}

enum Delivery {
    Sent,
    Skipped,
    Failed
}

/// Periodically fetches the current track and announces changes to every
/// guild with a live session.
pub struct TrackPoller {
    source: Arc<dyn TrackSource>,
    registry: Arc<SessionRegistry>,
    announcer: Arc<dyn Announcer>,
    state: Arc<PollerState>,
    interval: Duration,
    policy: BaselinePolicy
}

impl TrackPoller {
    pub fn new(
        source: Arc<dyn TrackSource>,
        registry: Arc<SessionRegistry>,
        announcer: Arc<dyn Announcer>,
        state: Arc<PollerState>,
        interval: Duration,
        policy: BaselinePolicy
    ) -> Self {
        Self {
            source,
            registry,
            announcer,
            state,
            interval,
            policy
        }
    }

    pub fn state(&self) -> &Arc<PollerState> {
        &self.state
    }

    /// Runs one fetch, compare and announce step.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let fetched = self.source.fetch_current_track().await;
        let mut outcome = CycleOutcome::default();

        if let (Some(previous), Some(current)) = (self.state.last_track(), fetched.as_ref()) {
            if !previous.same_track(current) && !self.registry.is_empty() {
                info!("Track changed: {} -> {}", previous.title, current.title);
                outcome.changed = true;
                self.announce(current, &mut outcome).await;
            }
        }

        self.state.update(fetched.clone(), self.policy);
        outcome.fetched = fetched;
        outcome
    }

    async fn announce(&self, track: &TrackInfo, outcome: &mut CycleOutcome) {
        let announcer = self.announcer.as_ref();

        let deliveries = self.registry.destinations()
            .into_iter()
            .map(|(guild, preferred)| async move {
                let Some(channel) = notify::resolve_destination(announcer, guild, preferred).await else {
                    debug!("No channel to announce in for guild {guild}");
                    return (guild, Delivery::Skipped);
                };

                match announcer.announce(channel, track).await {
                    Ok(()) => (guild, Delivery::Sent),
                    Err(e) => {
                        warn!("Failed to announce track in guild {guild}: {e}");
                        (guild, Delivery::Failed)
                    }
                }
            });

        for (guild, delivery) in join_all(deliveries).await {
            match delivery {
                Delivery::Sent => outcome.notified.push(guild),
                Delivery::Skipped => outcome.skipped.push(guild),
                Delivery::Failed => outcome.failed.push(guild)
            }
        }
    }

    /// Waits until `ready` turns true, then runs a cycle every interval until
    /// `shutdown` fires. A running cycle is allowed to finish.
    pub async fn run(self: Arc<Self>, mut ready: watch::Receiver<bool>, shutdown: CancellationToken) {
        let wait_ready = async move { ready.wait_for(|ready| *ready).await.is_ok() };

        tokio::select! {
            _ = shutdown.cancelled() => return,
            is_ready = wait_ready => if !is_ready {
                warn!("Readiness signal dropped before the bot became ready, track updates disabled");
                return;
            }
        }

        info!("Track updates started, polling every {:?}", self.interval);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let this = Arc::clone(&self);
            if let Err(e) = tokio::spawn(async move { this.run_cycle().await }).await {
                error!("Error in track update task: {e}");
            }
        }

        debug!("Track updates stopped");
    }
}
