//! In-memory stand-ins for the voice, notification and track source seams.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use parking_lot::Mutex;
use serenity::async_trait;
use uuid::Uuid;
use crate::error::{DeliveryError, PlaybackError, TransportError};
use crate::model::track::TrackInfo;
use crate::msg::{SessionSignal, SignalSender};
use crate::notify::Announcer;
use crate::source::TrackSource;
use crate::voice::{Playback, Transport, VoiceGateway};

#[derive(Default)]
struct Switches {
    fail_join: AtomicBool,
    fail_play: AtomicBool,
    fail_leave: AtomicBool,
    volume_unsupported: AtomicBool
}

#[derive(Default)]
pub struct FakeGateway {
    switches: Arc<Switches>,
    joins: AtomicUsize,
    leaves: Arc<AtomicUsize>,
    playbacks: Arc<Mutex<HashMap<u64, Arc<FakePlayback>>>>,
    links: Mutex<HashMap<u64, (Uuid, SignalSender)>>
}

impl FakeGateway {
    pub fn fail_join(&self, value: bool) {
        self.switches.fail_join.store(value, Ordering::SeqCst);
    }

    pub fn fail_play(&self, value: bool) {
        self.switches.fail_play.store(value, Ordering::SeqCst);
    }

    pub fn fail_leave(&self, value: bool) {
        self.switches.fail_leave.store(value, Ordering::SeqCst);
    }

    pub fn volume_unsupported(&self, value: bool) {
        self.switches.volume_unsupported.store(value, Ordering::SeqCst);
    }

    pub fn joins(&self) -> usize {
        self.joins.load(Ordering::SeqCst)
    }

    pub fn leaves(&self) -> usize {
        self.leaves.load(Ordering::SeqCst)
    }

    /// Latest playback started in `guild`.
    pub fn playback(&self, guild: u64) -> Option<Arc<FakePlayback>> {
        self.playbacks.lock().get(&guild).cloned()
    }

    /// Simulates the platform dropping the bot from voice.
    pub fn drop_connection(&self, guild: u64) {
        if let Some((session, signals)) = self.links.lock().get(&guild).cloned() {
            let _ = signals.send(SessionSignal::TransportLost { guild, session });
        }
    }
}

#[async_trait]
impl VoiceGateway for FakeGateway {
    async fn join(
        &self,
        guild: u64,
        _channel: u64,
        session: Uuid,
        signals: SignalSender
    ) -> Result<Box<dyn Transport>, TransportError> {
        tokio::task::yield_now().await;

        if self.switches.fail_join.load(Ordering::SeqCst) {
            return Err(TransportError::Connect("refused".into()));
        }

        self.joins.fetch_add(1, Ordering::SeqCst);
        self.links.lock().insert(guild, (session, signals));

        Ok(Box::new(FakeTransport {
            guild,
            switches: Arc::clone(&self.switches),
            leaves: Arc::clone(&self.leaves),
            playbacks: Arc::clone(&self.playbacks)
        }))
    }
}

struct FakeTransport {
    guild: u64,
    switches: Arc<Switches>,
    leaves: Arc<AtomicUsize>,
    playbacks: Arc<Mutex<HashMap<u64, Arc<FakePlayback>>>>
}

#[async_trait]
impl Transport for FakeTransport {
    async fn play(&self, stream_url: &str, volume: f32) -> Result<Box<dyn Playback>, TransportError> {
        if self.switches.fail_play.load(Ordering::SeqCst) {
            return Err(TransportError::Decoder(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "ffmpeg not found"
            )));
        }

        let playback = Arc::new(FakePlayback {
            url: stream_url.to_string(),
            playing: AtomicBool::new(true),
            volume: Mutex::new(volume),
            volume_calls: AtomicUsize::new(0),
            supports_volume: !self.switches.volume_unsupported.load(Ordering::SeqCst)
        });
        self.playbacks.lock().insert(self.guild, Arc::clone(&playback));

        Ok(Box::new(SharedPlayback(playback)))
    }

    async fn leave(&self) -> Result<(), TransportError> {
        self.leaves.fetch_add(1, Ordering::SeqCst);

        if self.switches.fail_leave.load(Ordering::SeqCst) {
            return Err(TransportError::Other("gateway closed".into()));
        }

        Ok(())
    }
}

pub struct FakePlayback {
    url: String,
    playing: AtomicBool,
    volume: Mutex<f32>,
    volume_calls: AtomicUsize,
    supports_volume: bool
}

impl FakePlayback {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    pub fn volume(&self) -> f32 {
        *self.volume.lock()
    }

    pub fn volume_calls(&self) -> usize {
        self.volume_calls.load(Ordering::SeqCst)
    }
}

struct SharedPlayback(Arc<FakePlayback>);

#[async_trait]
impl Playback for SharedPlayback {
    async fn is_active(&self) -> bool {
        self.0.is_playing()
    }

    fn stop(&self) -> Result<(), PlaybackError> {
        self.0.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn supports_volume(&self) -> bool {
        self.0.supports_volume
    }

    fn set_volume(&self, volume: f32) -> Result<(), PlaybackError> {
        self.0.volume_calls.fetch_add(1, Ordering::SeqCst);
        *self.0.volume.lock() = volume;
        Ok(())
    }
}

/// Track source answering from a script, then `None` once it runs out.
#[derive(Default)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<Option<TrackInfo>>>,
    fetches: AtomicUsize,
    panic_at: Mutex<Option<usize>>
}

impl ScriptedSource {
    pub fn new(script: impl IntoIterator<Item = Option<TrackInfo>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Makes the fetch with index `n` (zero based) panic instead of answering.
    pub fn panic_on_fetch(&self, n: usize) {
        *self.panic_at.lock() = Some(n);
    }

    pub fn push(&self, track: Option<TrackInfo>) {
        self.script.lock().push_back(track);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrackSource for ScriptedSource {
    async fn fetch_current_track(&self) -> Option<TrackInfo> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst);
        if *self.panic_at.lock() == Some(n) {
            panic!("track source failed hard on fetch {n}");
        }

        self.script.lock().pop_front().flatten()
    }
}

/// Announcer recording what would have been posted.
#[derive(Default)]
pub struct RecordingAnnouncer {
    channels: Mutex<HashMap<u64, Vec<u64>>>,
    failing: Mutex<Vec<u64>>,
    sent: Mutex<Vec<(u64, TrackInfo)>>
}

impl RecordingAnnouncer {
    /// Channels the bot may post in for `guild`, in display order.
    pub fn set_channels(&self, guild: u64, channels: Vec<u64>) {
        self.channels.lock().insert(guild, channels);
    }

    pub fn fail_channel(&self, channel: u64) {
        self.failing.lock().push(channel);
    }

    pub fn sent(&self) -> Vec<(u64, TrackInfo)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Announcer for RecordingAnnouncer {
    async fn sendable_channels(&self, guild: u64) -> Vec<u64> {
        self.channels.lock().get(&guild).cloned().unwrap_or_default()
    }

    async fn announce(&self, channel: u64, track: &TrackInfo) -> Result<(), DeliveryError> {
        if self.failing.lock().contains(&channel) {
            return Err(DeliveryError {
                channel,
                reason: "Missing Access".into()
            });
        }

        self.sent.lock().push((channel, track.clone()));
        Ok(())
    }
}
