use std::sync::Arc;
use poise::CreateReply;
use tracing::{error, info};
use crate::embed;
use crate::error::SessionError;
use crate::serenity_ext::SerenityAnnouncer;
use crate::{AnyError, Relay};

/// State shared with every command and gateway event.
#[derive(Clone)]
pub struct Data {
    pub relay: Arc<Relay>,
    pub announcer: Arc<SerenityAnnouncer>
}

pub type Context<'a> = poise::Context<'a, Data, AnyError>;

pub fn all() -> Vec<poise::Command<Data, AnyError>> {
    vec![play(), stop(), track(), volume(), help()]
}

async fn reply_private(ctx: Context<'_>, content: impl Into<String>) -> Result<(), AnyError> {
    ctx.send(CreateReply::default().content(content).ephemeral(true)).await?;
    Ok(())
}

fn guild_of(ctx: Context<'_>) -> Result<u64, AnyError> {
    ctx.guild_id()
        .map(|g| g.get())
        .ok_or_else(|| "This command only works in a server".into())
}

/// Play the radio in your voice channel
#[poise::command(slash_command, guild_only)]
pub async fn play(ctx: Context<'_>) -> Result<(), AnyError> {
    let guild = guild_of(ctx)?;
    let voice = ctx.guild().and_then(|g| {
        let channel = g.voice_states.get(&ctx.author().id)?.channel_id?;
        let name = g.channels.get(&channel)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| channel.to_string());

        Some((channel, name))
    });

    let Some((channel, channel_name)) = voice else {
        return reply_private(ctx, "You need to join a voice channel first!").await;
    };

    let relay = &ctx.data().relay;
    if relay.registry().is_connected(guild) {
        return reply_private(ctx, SessionError::AlreadyConnected.to_string()).await;
    }

    ctx.defer().await?;

    if let Err(e) = relay.registry().connect(guild, channel.get(), Some(ctx.channel_id().get())).await {
        error!("Error in play command: {e}");
        return reply_private(ctx, e.to_string()).await;
    }

    let track = relay.current_track().await;
    ctx.send(CreateReply::default().embed(embed::now_playing(&channel_name, track.as_ref(), relay.station())))
        .await?;

    info!("Started playing in guild {guild} - {channel_name}");
    Ok(())
}

/// Stop the radio stream and disconnect the bot
#[poise::command(slash_command, guild_only)]
pub async fn stop(ctx: Context<'_>) -> Result<(), AnyError> {
    let guild = guild_of(ctx)?;
    ctx.defer().await?;

    match ctx.data().relay.registry().disconnect(guild).await {
        Ok(()) => {
            ctx.say("⏹️ Radio stream stopped and disconnected.").await?;
            Ok(())
        },
        Err(SessionError::NotConnected) => reply_private(ctx, "I'm not currently in a voice channel.").await,
        Err(e) => reply_private(ctx, format!("An error occurred: {e}")).await
    }
}

/// Adjust the volume of the radio stream (0-100)
#[poise::command(slash_command, guild_only)]
pub async fn volume(
    ctx: Context<'_>,
    #[description = "Volume level between 0 and 100"]
    level: i64
) -> Result<(), AnyError> {
    let guild = guild_of(ctx)?;

    match ctx.data().relay.registry().set_volume(guild, level).await {
        Ok(()) => {
            ctx.say(format!("🔊 Volume set to {level}%")).await?;
            Ok(())
        },
        Err(e) => reply_private(ctx, e.to_string()).await
    }
}

/// Show detailed information about the current track
#[poise::command(slash_command)]
pub async fn track(ctx: Context<'_>) -> Result<(), AnyError> {
    let relay = &ctx.data().relay;

    match relay.current_track().await {
        Some(track) => {
            ctx.send(CreateReply::default().embed(embed::track(&track, relay.station()))).await?;
            Ok(())
        },
        None => reply_private(
            ctx,
            "Unable to fetch current track information. Please try again later."
        ).await
    }
}

/// Show available commands and information about the bot
#[poise::command(slash_command)]
pub async fn help(ctx: Context<'_>) -> Result<(), AnyError> {
    ctx.send(CreateReply::default().embed(embed::help(ctx.data().relay.station()))).await?;
    Ok(())
}

pub async fn on_error(error: poise::FrameworkError<'_, Data, AnyError>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Error in /{} command: {error}", ctx.command().name);

            if let Err(e) = reply_private(ctx, format!("An error occurred: {error}")).await {
                error!("Failed to report command error: {e}");
            }
        },
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("Error while handling error: {e}");
            }
        }
    }
}
