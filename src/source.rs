use serenity::async_trait;
use crate::model::track::TrackInfo;

/// Where the "now playing" information comes from.
///
/// Lookups are best effort: any failure is logged by the implementation and
/// reported as `None`, never as an error.
#[async_trait]
pub trait TrackSource: Send + Sync {
    async fn fetch_current_track(&self) -> Option<TrackInfo>;
}
