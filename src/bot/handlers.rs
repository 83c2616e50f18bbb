use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseFollowup,
        CreateInteractionResponseMessage,
    },
    model::{
        application::{CommandInteraction, ResolvedValue},
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::info;

use crate::{
    bot::AriaBot,
    error::PlayerError,
    player::{NowPlaying, PlaybackSession, QueueEntry, SessionRegistry},
    resolver::Resolver,
};

/// Respuesta de un comando: texto corto o un embed.
enum CommandReply {
    Text(String),
    Embed(CreateEmbed),
}

impl CommandReply {
    fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

/// Despacha un comando slash a la operación de sesión/cola correspondiente.
/// Todo fallo se rinde acá como mensaje de texto; nunca llega un error crudo
/// al usuario ni tumba el consumer loop.
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &AriaBot,
) -> Result<()> {
    let Some(guild) = command.guild_id else {
        return respond(
            ctx,
            &command,
            Ok(CommandReply::text("This command only works in a server")),
        )
        .await;
    };
    let user = command.user.id;

    info!(
        command = %command.data.name,
        user = %command.user.name,
        %guild,
        "📝 comando recibido"
    );

    // play difiere la respuesta: la resolución puede tardar segundos.
    if command.data.name == "play" {
        return handle_play(ctx, &command, bot, guild, user).await;
    }

    let outcome = match command.data.name.as_str() {
        "join" => join_cmd(ctx, bot, guild, user).await,
        "leave" => leave_cmd(bot, guild).await,
        "pause" => pause_cmd(bot, guild).await,
        "resume" => resume_cmd(bot, guild).await,
        "skip" => skip_cmd(bot, guild).await,
        "skipto" => skipto_cmd(&command, bot, guild).await,
        "stop" => stop_cmd(bot, guild).await,
        "queue" => queue_cmd(bot, guild).await,
        "nowplaying" => nowplaying_cmd(bot, guild).await,
        "shuffle" => shuffle_cmd(bot, guild).await,
        "swap" => swap_cmd(&command, bot, guild).await,
        "remove" => remove_cmd(&command, bot, guild).await,
        "volume" => volume_cmd(&command, bot, guild).await,
        _ => Ok(CommandReply::text("Unknown command")),
    };

    respond(ctx, &command, outcome).await
}

async fn respond(
    ctx: &Context,
    command: &CommandInteraction,
    outcome: Result<CommandReply, PlayerError>,
) -> Result<()> {
    let message = match outcome {
        Ok(CommandReply::Text(text)) => CreateInteractionResponseMessage::new().content(text),
        Ok(CommandReply::Embed(embed)) => CreateInteractionResponseMessage::new().embed(embed),
        Err(e) => CreateInteractionResponseMessage::new().content(e.to_string()),
    };
    command
        .create_response(&ctx.http, CreateInteractionResponse::Message(message))
        .await?;
    Ok(())
}

// Flujo de play

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &AriaBot,
    guild: GuildId,
    user: UserId,
) -> Result<()> {
    command.defer(&ctx.http).await?;

    let text = match string_option(command, "query") {
        Some(query) => {
            match caller_voice_channel(ctx, guild, user) {
                Ok(channel) => {
                    match play_request(&bot.registry, bot.resolver.as_ref(), guild, channel, user, &query)
                        .await
                    {
                        Ok(text) => text,
                        Err(e) => e.to_string(),
                    }
                }
                Err(e) => e.to_string(),
            }
        }
        None => "Missing search query".to_string(),
    };

    command
        .create_followup(
            &ctx.http,
            CreateInteractionResponseFollowup::new().content(text),
        )
        .await?;
    Ok(())
}

/// Núcleo del comando play, sin tipos de interacción de por medio.
///
/// Conecta la sesión si hace falta, resuelve la búsqueda **fuera** de todo
/// lock de sesión y recién entonces encola. Si la resolución falla no queda
/// ninguna entrada huérfana: el fallo se reporta y no se encoló nada.
pub async fn play_request(
    registry: &SessionRegistry,
    resolver: &dyn Resolver,
    guild: GuildId,
    channel: ChannelId,
    user: UserId,
    query: &str,
) -> Result<String, PlayerError> {
    let session = registry.get_or_create(guild);
    ensure_same_channel(&session, channel).await?;
    session.join(channel).await?;

    let source = resolver.resolve(query).await?;
    let title = source.title().to_string();
    let position = session.enqueue(QueueEntry::new(source, user)).await?;
    Ok(format!("Enqueued **{title}** (position {position} in queue)"))
}

// Comandos de conexión

async fn join_cmd(
    ctx: &Context,
    bot: &AriaBot,
    guild: GuildId,
    user: UserId,
) -> Result<CommandReply, PlayerError> {
    let channel = caller_voice_channel(ctx, guild, user)?;
    let session = bot.registry.get_or_create(guild);
    ensure_same_channel(&session, channel).await?;
    session.join(channel).await?;
    Ok(CommandReply::text(format!("Joined <#{channel}>")))
}

async fn leave_cmd(bot: &AriaBot, guild: GuildId) -> Result<CommandReply, PlayerError> {
    bot.registry.leave(guild).await?;
    Ok(CommandReply::text("Disconnected from the voice channel"))
}

// Comandos de control de reproducción

async fn pause_cmd(bot: &AriaBot, guild: GuildId) -> Result<CommandReply, PlayerError> {
    let changed = bot.registry.get_or_create(guild).pause().await?;
    Ok(CommandReply::text(if changed {
        "Playback paused"
    } else {
        "Nothing was playing"
    }))
}

async fn resume_cmd(bot: &AriaBot, guild: GuildId) -> Result<CommandReply, PlayerError> {
    let changed = bot.registry.get_or_create(guild).resume().await?;
    Ok(CommandReply::text(if changed {
        "Playback resumed"
    } else {
        "The player was not paused"
    }))
}

async fn skip_cmd(bot: &AriaBot, guild: GuildId) -> Result<CommandReply, PlayerError> {
    let skipped = bot.registry.get_or_create(guild).skip().await?;
    Ok(CommandReply::text(format!("Skipped **{skipped}**")))
}

async fn skipto_cmd(
    command: &CommandInteraction,
    bot: &AriaBot,
    guild: GuildId,
) -> Result<CommandReply, PlayerError> {
    let session = bot.registry.get_or_create(guild);
    let index = parse_user_index(integer_option(command, "index").unwrap_or(0), session.queue_len().await)?;
    let skipped = session.skip_to(index).await?;
    Ok(CommandReply::text(format!("Skipped **{skipped}**")))
}

async fn stop_cmd(bot: &AriaBot, guild: GuildId) -> Result<CommandReply, PlayerError> {
    bot.registry.get_or_create(guild).stop().await?;
    Ok(CommandReply::text("Playback stopped and queue cleared"))
}

// Comandos de cola

async fn queue_cmd(bot: &AriaBot, guild: GuildId) -> Result<CommandReply, PlayerError> {
    let entries = bot.registry.get_or_create(guild).queue_snapshot().await;
    if entries.is_empty() {
        return Err(PlayerError::EmptyQueue);
    }
    Ok(CommandReply::Embed(
        CreateEmbed::new().description(format_queue(&entries)),
    ))
}

async fn nowplaying_cmd(bot: &AriaBot, guild: GuildId) -> Result<CommandReply, PlayerError> {
    let Some(now) = bot.registry.get_or_create(guild).now_playing().await else {
        return Err(PlayerError::NothingPlaying);
    };
    Ok(CommandReply::Embed(format_now_playing(&now)))
}

async fn shuffle_cmd(bot: &AriaBot, guild: GuildId) -> Result<CommandReply, PlayerError> {
    bot.registry.get_or_create(guild).shuffle().await?;
    Ok(CommandReply::text("Queue shuffled"))
}

async fn swap_cmd(
    command: &CommandInteraction,
    bot: &AriaBot,
    guild: GuildId,
) -> Result<CommandReply, PlayerError> {
    let session = bot.registry.get_or_create(guild);
    let len = session.queue_len().await;
    let first = integer_option(command, "first").unwrap_or(0);
    let second = integer_option(command, "second").unwrap_or(0);
    session
        .swap(parse_user_index(first, len)?, parse_user_index(second, len)?)
        .await?;
    Ok(CommandReply::text(format!(
        "Swapped entries **{first}** and **{second}**"
    )))
}

async fn remove_cmd(
    command: &CommandInteraction,
    bot: &AriaBot,
    guild: GuildId,
) -> Result<CommandReply, PlayerError> {
    let session = bot.registry.get_or_create(guild);
    let index = parse_user_index(integer_option(command, "index").unwrap_or(0), session.queue_len().await)?;
    let title = session.remove(index).await?;
    Ok(CommandReply::text(format!(
        "Removed **{title}** from the queue"
    )))
}

async fn volume_cmd(
    command: &CommandInteraction,
    bot: &AriaBot,
    guild: GuildId,
) -> Result<CommandReply, PlayerError> {
    let percent = integer_option(command, "percent").unwrap_or(-1);
    bot.registry.get_or_create(guild).set_volume(percent).await?;
    Ok(CommandReply::text(format!("Volume set to {percent}%")))
}

// Guardas de estado de voz (el equivalente del ensure_voice_state original)

/// Canal de voz en el que está el usuario que invocó el comando.
fn caller_voice_channel(
    ctx: &Context,
    guild: GuildId,
    user: UserId,
) -> Result<ChannelId, PlayerError> {
    let guild_ref = ctx.cache.guild(guild).ok_or(PlayerError::NotInVoiceChannel)?;
    guild_ref
        .voice_states
        .get(&user)
        .and_then(|state| state.channel_id)
        .ok_or(PlayerError::NotInVoiceChannel)
}

/// Política previa a join/play: si la sesión ya está conectada en otro canal
/// distinto al del usuario, el comando se rechaza.
async fn ensure_same_channel(
    session: &PlaybackSession,
    caller_channel: ChannelId,
) -> Result<(), PlayerError> {
    match session.channel().await {
        Some(here) if here != caller_channel => Err(PlayerError::AlreadyConnectedElsewhere),
        _ => Ok(()),
    }
}

// Helpers de opciones y formato

fn integer_option(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options()
        .into_iter()
        .find(|option| option.name == name)
        .and_then(|option| match option.value {
            ResolvedValue::Integer(value) => Some(value),
            _ => None,
        })
}

fn string_option(command: &CommandInteraction, name: &str) -> Option<String> {
    command
        .data
        .options()
        .into_iter()
        .find(|option| option.name == name)
        .and_then(|option| match option.value {
            ResolvedValue::String(value) => Some(value.to_string()),
            _ => None,
        })
}

/// Traduce un índice base 1 del usuario al índice interno base 0. Única
/// frontera donde cambia la convención.
fn parse_user_index(value: i64, len: usize) -> Result<usize, PlayerError> {
    if value >= 1 && (value as usize) <= len {
        Ok((value - 1) as usize)
    } else {
        Err(PlayerError::IndexOutOfRange { given: value, len })
    }
}

/// Listado numerado en base 1, como lo ve el operador.
fn format_queue(entries: &[QueueEntry]) -> String {
    let lines: Vec<String> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| format!("`{}.` [**{}**]({})", i + 1, entry.title(), entry.source.url()))
        .collect();
    format!("**{} tracks:**\n\n{}", entries.len(), lines.join("\n"))
}

fn format_now_playing(now: &NowPlaying) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title("Now playing")
        .description(format!("[**{}**]({})", now.title, now.url))
        .field("Requested by", format!("<@{}>", now.requested_by), true);
    if let Some(duration) = now.duration {
        let rounded = std::time::Duration::from_secs(duration.as_secs());
        embed = embed.field("Duration", humantime::format_duration(rounded).to_string(), true);
    }
    embed
}
