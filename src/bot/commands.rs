use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

fn all_commands() -> Vec<CreateCommand> {
    vec![
        join_command(),
        leave_command(),
        play_command(),
        pause_command(),
        resume_command(),
        skip_command(),
        skipto_command(),
        stop_command(),
        queue_command(),
        nowplaying_command(),
        shuffle_command(),
        swap_command(),
        remove_command(),
        volume_command(),
    ]
}

/// Registra los comandos globalmente (propagación lenta).
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }
    Ok(())
}

/// Registra los comandos en una guild específica (desarrollo).
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;
    Ok(())
}

fn join_command() -> CreateCommand {
    CreateCommand::new("join").description("Conecta el bot a tu canal de voz")
}

fn leave_command() -> CreateCommand {
    CreateCommand::new("leave").description("Desconecta el bot y descarta la cola")
}

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Encola una canción por búsqueda o URL")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "query",
                "URL o término de búsqueda",
            )
            .required(true),
        )
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pausa la reproducción actual")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Reanuda la reproducción pausada")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Salta la canción actual")
}

fn skipto_command() -> CreateCommand {
    CreateCommand::new("skipto")
        .description("Salta a la canción en la posición dada de la cola")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "index",
                "Posición en la cola (empezando en 1)",
            )
            .required(true)
            .min_int_value(1),
        )
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Detiene la reproducción y vacía la cola")
}

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue").description("Muestra la cola de reproducción")
}

fn nowplaying_command() -> CreateCommand {
    CreateCommand::new("nowplaying").description("Muestra la canción en reproducción")
}

fn shuffle_command() -> CreateCommand {
    CreateCommand::new("shuffle").description("Mezcla la cola de reproducción")
}

fn swap_command() -> CreateCommand {
    CreateCommand::new("swap")
        .description("Intercambia dos entradas de la cola")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "first",
                "Primera posición (empezando en 1)",
            )
            .required(true)
            .min_int_value(1),
        )
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "second",
                "Segunda posición (empezando en 1)",
            )
            .required(true)
            .min_int_value(1),
        )
}

fn remove_command() -> CreateCommand {
    CreateCommand::new("remove")
        .description("Quita una entrada de la cola")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "index",
                "Posición en la cola (empezando en 1)",
            )
            .required(true)
            .min_int_value(1),
        )
}

fn volume_command() -> CreateCommand {
    CreateCommand::new("volume")
        .description("Ajusta el volumen del reproductor")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "percent",
                "Volumen en porcentaje (0-100)",
            )
            .required(true)
            .min_int_value(0)
            .max_int_value(100),
        )
}
