use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Configuración del bot, cargada del entorno (y de `.env` si existe).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    /// Guild de desarrollo: registra los comandos ahí (propagación rápida)
    /// en lugar de globalmente.
    pub guild_id: Option<u64>,

    // Audio
    /// Volumen inicial de cada sesión, en [0, 1].
    pub default_volume: f32,

    // Resolución
    pub ytdlp_binary: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            discord_token: std::env::var("DISCORD_TOKEN")?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()?,
            ytdlp_binary: std::env::var("YTDLP_BINARY")
                .unwrap_or_else(|_| "yt-dlp".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN must not be empty");
        }
        if !(0.0..=1.0).contains(&self.default_volume) {
            anyhow::bail!(
                "default volume must be between 0.0 and 1.0, got: {}",
                self.default_volume
            );
        }
        if self.ytdlp_binary.trim().is_empty() {
            anyhow::bail!("YTDLP_BINARY must not be empty");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            guild_id: None,
            default_volume: 0.5,
            ytdlp_binary: "yt-dlp".to_string(),
        }
    }
}
