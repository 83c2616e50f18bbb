use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serenity::model::id::GuildId;
use tracing::{info, warn};

use crate::{
    audio::output::OutputDriver,
    error::PlayerError,
    player::session::PlaybackSession,
};

/// Cuánto se espera el teardown de cada sesión durante el shutdown antes de
/// seguir con el resto.
const SHUTDOWN_LEAVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Mapa process-wide de guild → sesión de reproducción.
///
/// Único dueño de las sesiones: se crean bajo demanda y se quitan solo con un
/// leave explícito o en el shutdown del proceso. Sesiones distintas son
/// completamente independientes entre sí.
pub struct SessionRegistry {
    sessions: DashMap<GuildId, Arc<PlaybackSession>>,
    driver: Arc<dyn OutputDriver>,
    default_volume: f32,
}

impl SessionRegistry {
    pub fn new(driver: Arc<dyn OutputDriver>, default_volume: f32) -> Self {
        Self {
            sessions: DashMap::new(),
            driver,
            default_volume,
        }
    }

    /// Devuelve la sesión del guild, creándola si no existe. La entrada del
    /// DashMap garantiza que dos llamadas concurrentes para la misma key
    /// obtienen la misma sesión.
    ///
    /// Una sesión ya cerrada por `leave` nunca se entrega: se reemplaza por
    /// una nueva en el acto, así siempre existe a lo sumo una sesión viva por
    /// guild.
    pub fn get_or_create(&self, guild: GuildId) -> Arc<PlaybackSession> {
        let mut session = self.sessions.entry(guild).or_insert_with(|| {
            info!(%guild, "🆕 sesión de reproducción creada");
            PlaybackSession::spawn(guild, self.driver.clone(), self.default_volume)
        });
        if session.is_closed() {
            info!(%guild, "♻️ sesión cerrada reemplazada por una nueva");
            *session = PlaybackSession::spawn(guild, self.driver.clone(), self.default_volume);
        }
        session.clone()
    }

    pub fn get(&self, guild: GuildId) -> Option<Arc<PlaybackSession>> {
        self.sessions.get(&guild).map(|entry| entry.clone())
    }

    /// Quita la sesión del mapa. No-op silencioso si la key no existe. El
    /// caller ya debe haber invocado `leave` sobre la sesión.
    pub fn remove(&self, guild: GuildId) {
        self.sessions.remove(&guild);
    }

    /// Desconecta la sesión del guild y la descarta del mapa.
    pub async fn leave(&self, guild: GuildId) -> Result<(), PlayerError> {
        let Some(session) = self.get(guild) else {
            return Err(PlayerError::NotConnected);
        };
        match session.leave().await {
            Err(PlayerError::NotConnected) => Err(PlayerError::NotConnected),
            result => {
                // Aunque el disconnect haya fallado, la sesión ya está muerta.
                self.remove(guild);
                result
            }
        }
    }

    /// Teardown de todas las sesiones en el shutdown del proceso. Los fallos
    /// se toleran por sesión: una sesión colgada no bloquea a las demás.
    pub async fn shutdown(&self) {
        let sessions: Vec<Arc<PlaybackSession>> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        self.sessions.clear();

        let leaves = sessions.into_iter().map(|session| async move {
            let guild = session.guild();
            match tokio::time::timeout(SHUTDOWN_LEAVE_TIMEOUT, session.leave()).await {
                Ok(Ok(())) => info!(%guild, "sesión cerrada"),
                Ok(Err(PlayerError::NotConnected)) => {} // nunca llegó a conectarse
                Ok(Err(e)) => warn!(%guild, error = %e, "fallo al cerrar la sesión"),
                Err(_) => warn!(%guild, "timeout cerrando la sesión"),
            }
        });
        futures::future::join_all(leaves).await;
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serenity::model::id::ChannelId;

    use super::*;
    use crate::audio::testing::FakeDriver;

    const GUILD_A: GuildId = GuildId::new(1);
    const GUILD_B: GuildId = GuildId::new(2);
    const CHANNEL: ChannelId = ChannelId::new(10);

    fn registry(driver: &Arc<FakeDriver>) -> SessionRegistry {
        SessionRegistry::new(driver.clone(), 0.5)
    }

    #[tokio::test]
    async fn get_or_create_returns_the_same_session_per_guild() {
        let driver = FakeDriver::new();
        let registry = registry(&driver);

        let first = registry.get_or_create(GUILD_A);
        let second = registry.get_or_create(GUILD_A);
        let other = registry.get_or_create(GUILD_B);

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn remove_of_absent_key_is_a_silent_noop() {
        let driver = FakeDriver::new();
        let registry = registry(&driver);
        registry.remove(GUILD_A);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn leave_on_unknown_guild_reports_not_connected() {
        let driver = FakeDriver::new();
        let registry = registry(&driver);
        let err = registry.leave(GUILD_A).await.unwrap_err();
        assert!(matches!(err, PlayerError::NotConnected));
    }

    #[tokio::test]
    async fn leave_twice_on_the_same_guild_is_rejected_the_second_time() {
        let driver = FakeDriver::new();
        let registry = registry(&driver);
        let session = registry.get_or_create(GUILD_A);
        session.join(CHANNEL).await.unwrap();

        registry.leave(GUILD_A).await.unwrap();
        assert!(registry.is_empty());
        assert_eq!(driver.output.disconnects(), 1);

        let err = registry.leave(GUILD_A).await.unwrap_err();
        assert!(matches!(err, PlayerError::NotConnected));
    }

    #[tokio::test]
    async fn get_or_create_replaces_a_session_closed_behind_its_back() {
        let driver = FakeDriver::new();
        let registry = registry(&driver);
        let stale = registry.get_or_create(GUILD_A);
        stale.join(CHANNEL).await.unwrap();

        // La sesión se cierra sin pasar por el registry; la próxima búsqueda
        // no debe entregar ese cadáver.
        stale.leave().await.unwrap();
        let fresh = registry.get_or_create(GUILD_A);

        assert!(!Arc::ptr_eq(&stale, &fresh));
        assert!(!fresh.is_closed());
        fresh.join(CHANNEL).await.unwrap();
        assert_eq!(driver.connects(), 2);
    }

    #[tokio::test]
    async fn shutdown_tears_down_every_session_tolerating_failures() {
        let driver = FakeDriver::new();
        let registry = registry(&driver);

        let connected = registry.get_or_create(GUILD_A);
        connected.join(CHANNEL).await.unwrap();
        // GUILD_B nunca se conecta: su leave falla y no debe frenar el resto.
        registry.get_or_create(GUILD_B);

        registry.shutdown().await;

        assert!(registry.is_empty());
        assert!(connected.is_closed());
        assert_eq!(driver.output.disconnects(), 1);
    }
}
