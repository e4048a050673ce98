use serenity::all::{CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter};
use crate::config::Config;
use crate::model::track::TrackInfo;

const COLOR: u32 = 0x9370DB;

/// Branding shown on every embed.
#[derive(Debug, Clone)]
pub struct Station {
    pub name: String,
    pub footer: String
}

impl From<&Config> for Station {
    fn from(config: &Config) -> Self {
        Self {
            name: config.station_name.clone(),
            footer: config.station_footer.clone()
        }
    }
}

/// Detailed view of a track, used by `/track` and the change announcements.
pub fn track(track: &TrackInfo, station: &Station) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(&track.title)
        .color(COLOR)
        .author(CreateEmbedAuthor::new(&station.name))
        .field("Artist", track.artist.as_deref().unwrap_or("Unknown Artist"), true);

    if let Some(album) = track.album.as_deref().filter(|a| !a.is_empty()) {
        embed = embed.field("Album", album, true);
    }
    if let Some(duration) = track.duration_display() {
        embed = embed.field("Duration", duration, true);
    }
    if let Some(cover) = track.cover_url.as_deref().filter(|c| !c.is_empty()) {
        embed = embed.thumbnail(cover);
    }
    if let Some(link) = track.purchase_url.as_deref().filter(|l| !l.is_empty()) {
        embed = embed.field("Stream/Buy", format!("[Listen Online]({link})"), false);
    }

    embed.footer(CreateEmbedFooter::new(&station.footer))
}

/// Reply to a successful `/play`.
pub fn now_playing(voice_channel: &str, track: Option<&TrackInfo>, station: &Station) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(format!("📻 {} Now Playing", station.name))
        .description(format!("Connected to **{voice_channel}**"))
        .color(COLOR);

    if let Some(track) = track {
        embed = embed.field(
            "Current Track",
            format!(
                "**{}** - **{}**",
                track.artist.as_deref().unwrap_or("Unknown Artist"),
                track.title
            ),
            false
        );

        if let Some(cover) = track.cover_url.as_deref().filter(|c| !c.is_empty()) {
            embed = embed.thumbnail(cover);
        }
    }

    embed.footer(CreateEmbedFooter::new("Use /stop to disconnect | /track for detailed track info"))
}

pub fn help(station: &Station) -> CreateEmbed {
    CreateEmbed::new()
        .title(format!("📻 {} Bot Help", station.name))
        .description(format!("Listen to {} directly in your Discord server!", station.name))
        .color(COLOR)
        .field("/play", format!("Play {} in your voice channel", station.name), false)
        .field("/stop", "Stop the radio stream and disconnect the bot", false)
        .field("/track", "Show detailed information about the current track", false)
        .field("/volume <level>", "Adjust the volume (0-100)", false)
        .footer(CreateEmbedFooter::new(format!("{} - Tune in anytime!", station.name)))
}
