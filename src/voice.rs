use serenity::async_trait;
use uuid::Uuid;
use crate::error::{PlaybackError, TransportError};
use crate::msg::SignalSender;

/// Opens voice connections. Implemented over songbird in production.
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    /// Joins `channel` in `guild`. Transport level events for the resulting
    /// connection are reported through `signals`, tagged with `session`.
    async fn join(
        &self,
        guild: u64,
        channel: u64,
        session: Uuid,
        signals: SignalSender
    ) -> Result<Box<dyn Transport>, TransportError>;
}

/// An established voice connection for one guild.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Starts relaying `stream_url` at the given volume.
    async fn play(&self, stream_url: &str, volume: f32) -> Result<Box<dyn Playback>, TransportError>;

    /// Closes the connection.
    async fn leave(&self) -> Result<(), TransportError>;
}

/// Control handle over a running stream.
#[async_trait]
pub trait Playback: Send + Sync {
    async fn is_active(&self) -> bool;

    fn stop(&self) -> Result<(), PlaybackError>;

    fn supports_volume(&self) -> bool {
        true
    }

    fn set_volume(&self, volume: f32) -> Result<(), PlaybackError>;
}
