mod audio;
mod bot;
mod config;
mod error;
mod player;
mod resolver;

use std::sync::Arc;

use anyhow::Result;
use serenity::{prelude::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use tracing::{error, info};

use crate::{
    audio::SongbirdDriver,
    bot::AriaBot,
    config::Config,
    player::SessionRegistry,
    resolver::{Resolver, YtDlpResolver},
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("aria_music=debug,serenity=info,songbird=info")
            }),
        )
        .init();

    info!("🎵 iniciando Aria Music");
    let config = Config::load()?;

    let manager = Songbird::serenity();
    let driver = Arc::new(SongbirdDriver::new(manager.clone()));
    let registry = Arc::new(SessionRegistry::new(driver, config.default_volume));
    let resolver: Arc<dyn Resolver> = Arc::new(YtDlpResolver::new(config.ytdlp_binary.clone()));

    let bot = AriaBot {
        registry: registry.clone(),
        resolver,
        config: config.clone(),
    };

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(bot)
        .register_songbird_with(manager)
        .await?;

    // Apagado ordenado: primero se sueltan las conexiones de voz, después los
    // shards del gateway.
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        info!("🛑 señal de apagado recibida, cerrando sesiones");
        registry.shutdown().await;
        shard_manager.shutdown_all().await;
    });

    if let Err(e) = client.start().await {
        error!(error = %e, "el cliente de Discord terminó con error");
        return Err(e.into());
    }
    Ok(())
}
