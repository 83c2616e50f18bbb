//! Capa de Discord: registro de comandos slash, despacho de interacciones y
//! limpieza de sesiones cuando el bot es expulsado de un canal.

pub mod commands;
pub mod handlers;

use std::sync::Arc;

use serenity::{
    async_trait,
    model::{application::Interaction, gateway::Ready, id::GuildId, voice::VoiceState},
    prelude::{Context, EventHandler},
};
use tracing::{error, info, warn};

use crate::{
    config::Config, error::PlayerError, player::SessionRegistry, resolver::Resolver,
};

pub struct AriaBot {
    pub config: Config,
    pub registry: Arc<SessionRegistry>,
    pub resolver: Arc<dyn Resolver>,
}

#[async_trait]
impl EventHandler for AriaBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🚀 {} conectado a Discord", ready.user.name);

        // Con guild de desarrollo los comandos aparecen al instante; el
        // registro global tarda hasta una hora en propagarse.
        let result = match self.config.guild_id {
            Some(id) => commands::register_guild_commands(&ctx, GuildId::new(id)).await,
            None => commands::register_global_commands(&ctx).await,
        };
        match result {
            Ok(()) => info!("✅ comandos slash registrados"),
            Err(e) => error!(error = %e, "fallo registrando los comandos slash"),
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!(error = %e, "fallo respondiendo una interacción");
            }
        }
    }

    /// Si al bot lo desconectan del canal (kick, canal borrado), su sesión
    /// queda huérfana: se descarta acá para que el guild pueda empezar de cero.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let bot_id = ctx.cache.current_user().id;
        if new.user_id != bot_id || new.channel_id.is_some() {
            return;
        }
        let Some(guild) = new.guild_id else { return };
        if old.and_then(|state| state.channel_id).is_none() {
            return;
        }

        match self.registry.leave(guild).await {
            Ok(()) => info!(%guild, "🧹 sesión descartada tras desconexión forzada"),
            // leave ya la había limpiado; nada que hacer.
            Err(PlayerError::NotConnected) => {}
            Err(e) => warn!(%guild, error = %e, "fallo limpiando la sesión huérfana"),
        }
    }
}
