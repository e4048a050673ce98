use tracing::warn;
use uuid::Uuid;
use crate::error::{PlaybackError, SessionError};
use crate::voice::{Playback, Transport};

/// The live stream of one guild.
pub struct VoiceSession {
    id: Uuid,
    guild: u64,
    voice_channel: u64,
    notify_channel: Option<u64>,
    volume: f32,
    transport: Box<dyn Transport>,
    playback: Box<dyn Playback>
}

/// Plain copy of a session's state, safe to hold across awaits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSummary {
    pub id: Uuid,
    pub guild: u64,
    pub voice_channel: u64,
    pub notify_channel: Option<u64>,
    pub volume: f32
}

impl VoiceSession {
    pub(crate) fn new(
        id: Uuid,
        guild: u64,
        voice_channel: u64,
        notify_channel: Option<u64>,
        volume: f32,
        transport: Box<dyn Transport>,
        playback: Box<dyn Playback>
    ) -> Self {
        Self {
            id,
            guild,
            voice_channel,
            notify_channel,
            volume,
            transport,
            playback
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn notify_channel(&self) -> Option<u64> {
        self.notify_channel
    }

    /// Records that the bot was moved to another voice channel.
    pub(crate) fn move_to(&mut self, voice_channel: u64) {
        self.voice_channel = voice_channel;
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            guild: self.guild,
            voice_channel: self.voice_channel,
            notify_channel: self.notify_channel,
            volume: self.volume
        }
    }

    pub async fn is_active(&self) -> bool {
        self.playback.is_active().await
    }

    /// Sets the volume as a fraction in `[0, 1]`.
    pub fn set_volume(&mut self, volume: f32) -> Result<(), SessionError> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(SessionError::InvalidLevel);
        }

        if !self.playback.supports_volume() {
            return Err(SessionError::VolumeUnsupported);
        }

        self.playback.set_volume(volume)?;
        self.volume = volume;
        Ok(())
    }

    /// Stops the stream if it is still running.
    pub async fn stop(&self) -> Result<(), PlaybackError> {
        if self.playback.is_active().await {
            self.playback.stop()?;
        }

        Ok(())
    }

    /// Stops the stream and, unless the connection is already gone, leaves
    /// the voice channel. Failures are logged, the session is consumed either way.
    pub(crate) async fn shutdown(self, leave: bool) {
        if let Err(e) = self.stop().await {
            warn!("Failed to stop playback in guild {}: {e}", self.guild);
        }

        if leave {
            if let Err(e) = self.transport.leave().await {
                warn!("Failed to leave voice in guild {}: {e}", self.guild);
            }
        }
    }
}
