use serenity::async_trait;
use crate::error::DeliveryError;
use crate::model::track::TrackInfo;

/// Posts "now playing" announcements into guild text channels.
#[async_trait]
pub trait Announcer: Send + Sync {
    /// Text channels of `guild` the bot is allowed to post in, in the order
    /// they are shown to users.
    async fn sendable_channels(&self, guild: u64) -> Vec<u64>;

    async fn announce(&self, channel: u64, track: &TrackInfo) -> Result<(), DeliveryError>;
}

/// Picks where a guild's announcement goes: the channel recorded when the
/// session started if the bot can still post there, otherwise the first
/// channel it can post in. `None` when there is nowhere to post.
pub async fn resolve_destination(
    announcer: &dyn Announcer,
    guild: u64,
    preferred: Option<u64>
) -> Option<u64> {
    let channels = announcer.sendable_channels(guild).await;

    match preferred {
        Some(channel) if channels.contains(&channel) => Some(channel),
        _ => channels.first().copied()
    }
}
