use std::sync::Arc;

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use tokio::sync::oneshot;

use crate::{error::PlayerError, player::source::PlayableSource};

/// Fabrica conexiones de salida de audio, una por sesión.
///
/// La implementación de producción envuelve a songbird; los tests usan un
/// driver falso con la misma interfaz.
#[async_trait]
pub trait OutputDriver: Send + Sync {
    async fn connect(
        &self,
        guild: GuildId,
        channel: ChannelId,
    ) -> Result<Arc<dyn AudioOutput>, PlayerError>;
}

/// Una conexión de voz viva, propiedad exclusiva de su `PlaybackSession`.
/// Ningún otro componente la toca directamente.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Mueve la conexión a otro canal sin recrearla.
    async fn switch_to(&self, channel: ChannelId) -> Result<(), PlayerError>;

    /// Inicia la reproducción de una fuente al volumen dado y devuelve el
    /// control del stream junto con su señal de finalización.
    async fn begin(
        &self,
        source: &PlayableSource,
        volume: f32,
    ) -> Result<StartedTrack, PlayerError>;

    /// Libera la conexión subyacente.
    async fn disconnect(&self) -> Result<(), PlayerError>;
}

/// Un stream recién iniciado: el handle de control más la señal que el
/// consumer loop espera para saber que terminó (de forma natural o detenido).
pub struct StartedTrack {
    pub control: Box<dyn LiveTrack>,
    pub finished: oneshot::Receiver<()>,
}

/// Control sobre un stream en curso. Todas las operaciones son inmediatas.
pub trait LiveTrack: Send + Sync {
    fn pause(&self) -> Result<(), PlayerError>;
    fn resume(&self) -> Result<(), PlayerError>;

    /// Detiene el stream; la señal `finished` asociada debe resolverse.
    fn halt(&self) -> Result<(), PlayerError>;

    fn set_volume(&self, volume: f32) -> Result<(), PlayerError>;
}
