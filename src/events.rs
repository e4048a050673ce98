use serenity::all::{ActivityData, Context, FullEvent, Ready};
use serenity::async_trait;
use songbird::events::{Event, EventContext, EventHandler as VoiceEventHandler};
use songbird::tracks::PlayMode;
use tracing::{debug, info};
use uuid::Uuid;
use crate::commands::Data;
use crate::config::Config;
use crate::msg::{SessionSignal, SignalSender};
use crate::AnyError;

/// Turns songbird track and driver events into [`SessionSignal`]s for the registry.
pub(crate) struct SignalForwarder {
    guild: u64,
    session: Uuid,
    signals: SignalSender
}

impl SignalForwarder {
    pub fn new(guild: u64, session: Uuid, signals: SignalSender) -> Self {
        Self {
            guild,
            session,
            signals
        }
    }

    fn signal_for(&self, ctx: &EventContext<'_>) -> Option<SessionSignal> {
        match ctx {
            EventContext::Track(tracks) => {
                let error = tracks.iter().find_map(|(state, _)| match &state.playing {
                    PlayMode::Errored(e) => Some(format!("{e:?}")),
                    _ => None
                });

                Some(SessionSignal::PlaybackEnded {
                    guild: self.guild,
                    session: self.session,
                    error
                })
            },
            EventContext::DriverDisconnect(_) => Some(SessionSignal::TransportLost {
                guild: self.guild,
                session: self.session
            }),
            _ => None
        }
    }
}

#[async_trait]
impl VoiceEventHandler for SignalForwarder {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let Some(signal) = self.signal_for(ctx) {
            if self.signals.send(signal).is_err() {
                debug!("Session registry is gone, dropping voice event for guild {}", self.guild);
            }
        }

        None
    }
}

/// Gateway ready: attach the announcer, set the presence and release the poller.
pub async fn on_ready(ctx: &Context, ready: &Ready, data: &Data) {
    info!("Logged in as {} (ID: {})", ready.user.name, ready.user.id);
    info!("Connected to {} guild(s)", ready.guilds.len());

    data.announcer.attach(ctx);
    ctx.set_activity(Some(presence(data.relay.config())));
    data.relay.mark_ready();
}

fn presence(config: &Config) -> ActivityData {
    ActivityData::streaming(config.station_name.as_str(), config.stream_url.as_str())
        .unwrap_or_else(|_| ActivityData::listening(config.station_name.as_str()))
}

/// What a voice state update for the bot itself means for its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BotVoiceChange {
    /// Someone moved the bot to another channel.
    Moved(u64),
    /// The bot is no longer in the session's channel.
    Left,
    Ignore
}

/// Classifies an update given the channel the guild's session is in, if any.
/// A leave reported for some other channel is a leftover from an earlier
/// connection and is ignored.
pub(crate) fn bot_voice_change(session_channel: Option<u64>, before: Option<u64>, after: Option<u64>) -> BotVoiceChange {
    let Some(current) = session_channel else {
        return BotVoiceChange::Ignore;
    };

    match (before, after) {
        (_, Some(channel)) if channel != current => BotVoiceChange::Moved(channel),
        (_, Some(_)) => BotVoiceChange::Ignore,
        (Some(before), None) if before != current => BotVoiceChange::Ignore,
        (_, None) => BotVoiceChange::Left
    }
}

pub async fn handle_event(
    ctx: &Context,
    event: &FullEvent,
    _framework: poise::FrameworkContext<'_, Data, AnyError>,
    data: &Data
) -> Result<(), AnyError> {
    match event {
        FullEvent::Ready { data_about_bot } => on_ready(ctx, data_about_bot, data).await,
        FullEvent::VoiceStateUpdate { old, new } => {
            if new.user_id != ctx.cache.current_user().id {
                return Ok(());
            }

            let Some(guild) = new.guild_id.map(|g| g.get()) else {
                return Ok(());
            };

            let registry = data.relay.registry();
            let before = old.as_ref().and_then(|o| o.channel_id).map(|c| c.get());
            let after = new.channel_id.map(|c| c.get());

            match bot_voice_change(registry.session(guild).map(|s| s.voice_channel), before, after) {
                BotVoiceChange::Moved(channel) => {
                    registry.record_move(guild, channel).await;
                },
                BotVoiceChange::Left => registry.handle_external_disconnect(guild).await,
                BotVoiceChange::Ignore => {}
            }
        },
        _ => {}
    }

    Ok(())
}
