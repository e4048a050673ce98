use std::sync::Arc;
use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use crate::error::SessionError;
use crate::msg::{SessionSignal, SignalReceiver, SignalSender};
use crate::player::{SessionSummary, VoiceSession};
use crate::voice::VoiceGateway;

/// Owns every live voice session, keyed by guild.
///
/// All operations on one guild are serialised by that guild's operation lock,
/// so a connect always commits or fails before a later stop or volume change
/// for the same guild is looked at. Storing the session in `sessions` is the
/// commit point of a connect. Guards on `sessions` are never held across an
/// await. A guild's lock is dropped from `locks` once it is idle and the guild
/// has no session.
pub struct SessionRegistry {
    gateway: Arc<dyn VoiceGateway>,
    signals: SignalSender,
    stream_url: String,
    default_volume: f32,
    sessions: DashMap<u64, VoiceSession>,
    locks: DashMap<u64, Arc<Mutex<()>>>
}

impl SessionRegistry {
    pub fn new(
        gateway: Arc<dyn VoiceGateway>,
        stream_url: impl Into<String>,
        default_volume: f32
    ) -> (Self, SignalReceiver) {
        let (signals, receiver) = mpsc::unbounded_channel();

        let this = Self {
            gateway,
            signals,
            stream_url: stream_url.into(),
            default_volume: default_volume.clamp(0.0, 1.0),
            sessions: DashMap::new(),
            locks: DashMap::new()
        };

        (this, receiver)
    }

    async fn lock_guild(&self, guild: u64) -> GuildGuard<'_> {
        let lock = Arc::clone(self.locks.entry(guild).or_default().value());

        GuildGuard {
            registry: self,
            guild,
            guard: Some(lock.lock_owned().await)
        }
    }

    pub fn is_connected(&self, guild: u64) -> bool {
        self.sessions.contains_key(&guild)
    }

    pub fn session(&self, guild: u64) -> Option<SessionSummary> {
        self.sessions.get(&guild).map(|s| s.summary())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Snapshot of every connected guild with the channel it asked to be
    /// notified in.
    pub fn destinations(&self) -> Vec<(u64, Option<u64>)> {
        self.sessions.iter()
            .map(|entry| (*entry.key(), entry.notify_channel()))
            .collect()
    }

    /// Joins `voice_channel` and starts relaying the stream into it.
    pub async fn connect(
        &self,
        guild: u64,
        voice_channel: u64,
        notify_channel: Option<u64>
    ) -> Result<SessionSummary, SessionError> {
        let _guard = self.lock_guild(guild).await;

        if self.sessions.contains_key(&guild) {
            return Err(SessionError::AlreadyConnected);
        }

        let id = Uuid::new_v4();
        let transport = self.gateway.join(guild, voice_channel, id, self.signals.clone())
            .await
            .map_err(SessionError::ConnectFailed)?;

        let playback = match transport.play(&self.stream_url, self.default_volume).await {
            Ok(playback) => playback,
            Err(e) => {
                error!("Failed to start stream in guild {guild}: {e}");

                if let Err(e) = transport.leave().await {
                    warn!("Failed to leave voice in guild {guild} after playback failure: {e}");
                }

                return Err(SessionError::PlaybackSetupFailed(e));
            }
        };

        let session = VoiceSession::new(
            id,
            guild,
            voice_channel,
            notify_channel,
            self.default_volume,
            transport,
            playback
        );
        let summary = session.summary();
        self.sessions.insert(guild, session);

        info!("Started streaming in guild {guild}, channel {voice_channel}");
        Ok(summary)
    }

    /// Stops the stream and leaves voice. The entry is removed even if
    /// stopping or leaving fails.
    pub async fn disconnect(&self, guild: u64) -> Result<(), SessionError> {
        let _guard = self.lock_guild(guild).await;

        let (_, session) = self.sessions.remove(&guild)
            .ok_or(SessionError::NotConnected)?;

        session.shutdown(true).await;
        info!("Stopped streaming in guild {guild}");
        Ok(())
    }

    /// Sets the volume of a guild's stream, `level` is a percentage.
    pub async fn set_volume(&self, guild: u64, level: i64) -> Result<(), SessionError> {
        if !(0..=100).contains(&level) {
            return Err(SessionError::InvalidLevel);
        }

        let _guard = self.lock_guild(guild).await;

        let mut session = self.sessions.get_mut(&guild)
            .ok_or(SessionError::NotConnected)?;

        session.set_volume(level as f32 / 100.0)?;
        info!("Volume set to {level}% in guild {guild}");
        Ok(())
    }

    /// Records that the bot was moved to `voice_channel` by someone else.
    /// Returns false if the guild has no session.
    pub async fn record_move(&self, guild: u64, voice_channel: u64) -> bool {
        let _guard = self.lock_guild(guild).await;

        let moved = match self.sessions.get_mut(&guild) {
            Some(mut session) => {
                session.move_to(voice_channel);
                true
            },
            None => false
        };

        if moved {
            info!("Bot was moved to channel {voice_channel} in guild {guild}");
        }
        moved
    }

    /// Forgets the session of a guild whose voice connection was closed from
    /// outside. Does nothing if the guild has no session.
    pub async fn handle_external_disconnect(&self, guild: u64) {
        let _guard = self.lock_guild(guild).await;

        if let Some((_, session)) = self.sessions.remove(&guild) {
            session.shutdown(false).await;
            info!("Bot was disconnected from voice in guild {guild}");
        }
    }

    /// Applies a signal from the voice layer. Signals for a session that is
    /// no longer the guild's current one are ignored. Returns whether a
    /// session was torn down.
    pub async fn reconcile(&self, signal: SessionSignal) -> bool {
        let guild = signal.guild();
        let _guard = self.lock_guild(guild).await;

        let Some((_, session)) = self.sessions.remove_if(&guild, |_, s| s.id() == signal.session()) else {
            debug!("Ignoring stale signal for guild {guild}: {signal:?}");
            return false;
        };

        match signal {
            SessionSignal::PlaybackEnded { error, .. } => {
                match error {
                    Some(e) => error!("Player error in guild {guild}: {e}"),
                    None => warn!("Stream ended on its own in guild {guild}")
                }

                session.shutdown(true).await;
            },
            SessionSignal::TransportLost { .. } => {
                info!("Voice connection lost in guild {guild}");
                session.shutdown(false).await;
            }
        }

        true
    }

    /// Drains voice layer signals until `shutdown` fires.
    pub async fn run_reconciler(self: Arc<Self>, mut signals: SignalReceiver, shutdown: CancellationToken) {
        loop {
            let signal = tokio::select! {
                _ = shutdown.cancelled() => break,
                signal = signals.recv() => match signal {
                    Some(signal) => signal,
                    None => break
                }
            };

            let this = Arc::clone(&self);
            tokio::spawn(async move {
                this.reconcile(signal).await;
            });
        }

        debug!("Session reconciler stopped");
    }

    /// Disconnects every guild, used on shutdown.
    pub async fn disconnect_all(&self) {
        let guilds = self.sessions.iter().map(|e| *e.key()).collect::<Vec<_>>();

        for guild in guilds {
            if let Err(e) = self.disconnect(guild).await {
                debug!("Guild {guild} was already gone during shutdown: {e}");
            }
        }
    }
}

/// Holds a guild's operation lock, pruning it from the registry on release
/// when nobody else is waiting and the guild has no session.
struct GuildGuard<'a> {
    registry: &'a SessionRegistry,
    guild: u64,
    guard: Option<OwnedMutexGuard<()>>
}

impl Drop for GuildGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();

        let sessions = &self.registry.sessions;
        self.registry.locks.remove_if(&self.guild, |guild, lock| {
            Arc::strong_count(lock) == 1 && !sessions.contains_key(guild)
        });
    }
}
