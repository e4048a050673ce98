use std::sync::Arc;
use poise::serenity_prelude::{ClientBuilder, GatewayIntents};
use radio_relay::commands::{self, Data};
use radio_relay::config::Config;
use radio_relay::embed::Station;
use radio_relay::rest::RestClient;
use radio_relay::serenity_ext::{SerenityAnnouncer, SongbirdGateway};
use radio_relay::{decoder, events, logging, AnyError, Relay};
use songbird::Songbird;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    dotenvy::dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            logging::init(None)?;
            error!("Invalid configuration: {e}");
            return Err(e.into());
        }
    };

    logging::init(config.log_file.as_deref())?;

    if !decoder::ensure_ffmpeg().await {
        error!("ffmpeg is required to relay the stream, install it and try again");
        return Err("ffmpeg not available".into());
    }

    let songbird = Songbird::serenity();
    let announcer = Arc::new(SerenityAnnouncer::new(Station::from(&config)));
    let source = Arc::new(RestClient::new(&config.api_base_url, config.request_timeout)?);
    let token = config.token.clone();

    let relay = Arc::new(Relay::new(
        config,
        Arc::new(SongbirdGateway::new(Arc::clone(&songbird))),
        source,
        announcer.clone()
    ));

    let data = Data {
        relay: Arc::clone(&relay),
        announcer
    };

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            event_handler: |ctx, event, framework, data| {
                Box::pin(events::handle_event(ctx, event, framework, data))
            },
            on_error: |error| Box::pin(commands::on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| Box::pin(async move {
            match poise::builtins::register_globally(ctx, &framework.options().commands).await {
                Ok(()) => info!("Synced {} command(s)", framework.options().commands.len()),
                Err(e) => error!("Failed to sync commands: {e}")
            }

            // The ready event itself reaches `events::handle_event` once setup returns.
            Ok(data)
        }))
        .build();

    let mut client = ClientBuilder::new(token, GatewayIntents::non_privileged())
        .voice_manager_arc(songbird)
        .framework(framework)
        .await?;

    relay.start();

    let shard_manager = Arc::clone(&client.shard_manager);
    let stopping = Arc::clone(&relay);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {e}");
            return;
        }

        info!("Shutting down");
        // Leave voice while the gateway is still up, then close the shards.
        stopping.shutdown().await;
        shard_manager.shutdown_all().await;
    });

    if let Err(e) = client.start().await {
        error!("Error while running client, {e}");
    }

    relay.shutdown().await;
    Ok(())
}
