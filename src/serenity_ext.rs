use std::sync::{Arc, OnceLock};
use serenity::all::{Cache, ChannelId, ChannelType, Context, CreateMessage, GuildChannel, GuildId, Http};
use serenity::async_trait;
use songbird::input::{ChildContainer, Input};
use songbird::tracks::{PlayMode, Track, TrackHandle};
use songbird::{Call, CoreEvent, Event, Songbird, TrackEvent};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;
use crate::decoder;
use crate::embed::{self, Station};
use crate::error::{DeliveryError, PlaybackError, TransportError};
use crate::events::SignalForwarder;
use crate::model::track::TrackInfo;
use crate::msg::SignalSender;
use crate::notify::Announcer;
use crate::voice::{Playback, Transport, VoiceGateway};

/// Voice connections through songbird.
pub struct SongbirdGateway {
    manager: Arc<Songbird>
}

impl SongbirdGateway {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self {
            manager
        }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    async fn join(
        &self,
        guild: u64,
        channel: u64,
        session: Uuid,
        signals: SignalSender
    ) -> Result<Box<dyn Transport>, TransportError> {
        let guild_id = GuildId::new(guild);

        let call = match self.manager.join(guild_id, ChannelId::new(channel)).await {
            Ok(call) => call,
            Err(e) => {
                if let Err(e) = self.manager.remove(guild_id).await {
                    debug!("Nothing to clean up after failed join in guild {guild}: {e}");
                }

                return Err(TransportError::Connect(e.to_string()));
            }
        };

        {
            let mut handler = call.lock().await;
            // A call outlives sessions when the bot was dropped from outside.
            handler.remove_all_global_events();
            handler.add_global_event(
                Event::Core(CoreEvent::DriverDisconnect),
                SignalForwarder::new(guild, session, signals.clone())
            );
        }

        Ok(Box::new(SongbirdTransport {
            manager: Arc::clone(&self.manager),
            guild: guild_id,
            call,
            session,
            signals
        }))
    }
}

struct SongbirdTransport {
    manager: Arc<Songbird>,
    guild: GuildId,
    call: Arc<Mutex<Call>>,
    session: Uuid,
    signals: SignalSender
}

#[async_trait]
impl Transport for SongbirdTransport {
    async fn play(&self, stream_url: &str, volume: f32) -> Result<Box<dyn Playback>, TransportError> {
        let child = decoder::spawn(stream_url)?;
        let input: Input = ChildContainer::from(child).into();

        let handle = self.call.lock().await
            .play_only(Track::from(input).volume(volume));

        for event in [TrackEvent::End, TrackEvent::Error] {
            let forwarder = SignalForwarder::new(self.guild.get(), self.session, self.signals.clone());

            if let Err(e) = handle.add_event(Event::Track(event), forwarder) {
                let _ = handle.stop();
                return Err(TransportError::Other(format!("stream ended before it started: {e}")));
            }
        }

        Ok(Box::new(SongbirdPlayback {
            handle
        }))
    }

    async fn leave(&self) -> Result<(), TransportError> {
        self.manager.remove(self.guild).await
            .map_err(|e| TransportError::Other(e.to_string()))
    }
}

struct SongbirdPlayback {
    handle: TrackHandle
}

#[async_trait]
impl Playback for SongbirdPlayback {
    async fn is_active(&self) -> bool {
        matches!(
            self.handle.get_info().await,
            Ok(state) if matches!(state.playing, PlayMode::Play | PlayMode::Pause)
        )
    }

    fn stop(&self) -> Result<(), PlaybackError> {
        self.handle.stop().map_err(|_| PlaybackError::Finished)
    }

    fn set_volume(&self, volume: f32) -> Result<(), PlaybackError> {
        self.handle.set_volume(volume)
            .map_err(|e| PlaybackError::Control(e.to_string()))
    }
}

/// Posts announcements through the Discord http api. Usable once
/// [`SerenityAnnouncer::attach`] has been called with the gateway context.
pub struct SerenityAnnouncer {
    station: Station,
    context: OnceLock<(Arc<Http>, Arc<Cache>)>
}

impl SerenityAnnouncer {
    pub fn new(station: Station) -> Self {
        Self {
            station,
            context: OnceLock::new()
        }
    }

    pub fn attach(&self, ctx: &Context) {
        if self.context.set((Arc::clone(&ctx.http), Arc::clone(&ctx.cache))).is_err() {
            debug!("Announcer already attached");
        }
    }
}

#[async_trait]
impl Announcer for SerenityAnnouncer {
    async fn sendable_channels(&self, guild: u64) -> Vec<u64> {
        let Some((_, cache)) = self.context.get() else {
            warn!("Announcer used before the gateway was ready");
            return Vec::new();
        };

        let me = cache.current_user().id;
        let Some(guild) = cache.guild(GuildId::new(guild)) else {
            return Vec::new();
        };
        let Some(member) = guild.members.get(&me) else {
            return Vec::new();
        };

        let mut channels = guild.channels.values()
            .filter(|c| c.kind == ChannelType::Text)
            .collect::<Vec<&GuildChannel>>();
        channels.sort_by_key(|c| (c.position, c.id));

        channels.into_iter()
            .filter(|c| guild.user_permissions_in(c, member).send_messages())
            .map(|c| c.id.get())
            .collect()
    }

    async fn announce(&self, channel: u64, track: &TrackInfo) -> Result<(), DeliveryError> {
        let Some((http, _)) = self.context.get() else {
            return Err(DeliveryError {
                channel,
                reason: "gateway not ready".into()
            });
        };

        let message = CreateMessage::new()
            .content("🎵 Now playing:")
            .embed(embed::track(track, &self.station));

        ChannelId::new(channel).send_message(http.as_ref(), message).await
            .map(|_| ())
            .map_err(|e| DeliveryError {
                channel,
                reason: e.to_string()
            })
    }
}
