use std::sync::Arc;

use serenity::model::id::{ChannelId, GuildId};
use tokio::sync::{oneshot, Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    audio::output::{AudioOutput, LiveTrack, OutputDriver},
    error::PlayerError,
    player::{
        queue::SessionQueue,
        source::{NowPlaying, QueueEntry},
    },
};

/// Estado observable de una sesión.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Sin conexión de voz y sin entrada actual.
    Idle,
    /// Conexión abierta, nada en reproducción; la cola puede tener entradas.
    ConnectedIdle,
    Playing,
    Paused,
    /// Transitorio, solo durante el teardown de `leave`.
    Stopping,
}

struct SessionInner {
    output: Option<Arc<dyn AudioOutput>>,
    channel: Option<ChannelId>,
    queue: SessionQueue,
    current: Option<QueueEntry>,
    live: Option<Box<dyn LiveTrack>>,
    volume: f32,
    status: SessionStatus,
}

/// Una sesión de reproducción por conexión de voz activa.
///
/// Todas las operaciones mutantes se serializan con el mutex interno, así que
/// pueden invocarse desde comandos concurrentes sin interleavings
/// inconsistentes. El consumer loop (una tarea por sesión) es el único que
/// escribe `current` al iniciar y terminar streams; el resto de componentes
/// solo lo lee o encola señales de control. Nunca hay más de un stream activo
/// por sesión: el loop no saca la siguiente entrada hasta que la señal de
/// finalización del stream anterior se resolvió.
pub struct PlaybackSession {
    guild: GuildId,
    driver: Arc<dyn OutputDriver>,
    inner: Mutex<SessionInner>,
    /// Despierta al consumer loop cuando hay trabajo nuevo (enqueue, join).
    wakeup: Notify,
    /// Cancelación permanente del consumer loop; solo la dispara `leave`.
    shutdown: CancellationToken,
}

/// Qué hizo el consumer loop en una iteración de su paso de dequeue.
enum Step {
    /// Arrancó un stream; hay que esperar su señal de finalización.
    Started(oneshot::Receiver<()>),
    /// El arranque falló y la entrada se descartó; reintentar con la próxima.
    Retry,
    /// Nada para hacer; esperar una señal de wakeup.
    Wait,
}

impl PlaybackSession {
    /// Crea la sesión y lanza su consumer loop. La sesión nace `Idle`, sin
    /// conexión; `join` la conecta.
    pub fn spawn(
        guild: GuildId,
        driver: Arc<dyn OutputDriver>,
        default_volume: f32,
    ) -> Arc<Self> {
        let session = Arc::new(Self {
            guild,
            driver,
            inner: Mutex::new(SessionInner {
                output: None,
                channel: None,
                queue: SessionQueue::new(),
                current: None,
                live: None,
                volume: default_volume.clamp(0.0, 1.0),
                status: SessionStatus::Idle,
            }),
            wakeup: Notify::new(),
            shutdown: CancellationToken::new(),
        });

        tokio::spawn(consumer_loop(session.clone()));
        session
    }

    pub fn guild(&self) -> GuildId {
        self.guild
    }

    /// `true` una vez que `leave` canceló el consumer loop.
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Conecta la sesión a un canal de voz, o mueve la conexión existente si
    /// ya estaba en otro canal. La política de cuándo un movimiento está
    /// permitido vive en la capa de comandos, no acá.
    ///
    /// Sobre una sesión que ya pasó por `leave` falla con `NotConnected`: su
    /// consumer loop terminó para siempre, así que abrir una conexión acá
    /// dejaría un recurso vivo que nadie reproduce ni libera. Quien tenga un
    /// Arc viejo debe pedirle una sesión nueva al registry.
    pub async fn join(&self, channel: ChannelId) -> Result<(), PlayerError> {
        let mut inner = self.inner.lock().await;
        // `leave` cancela el token con este lock tomado, así que el chequeo
        // bajo el lock no corre contra él.
        if self.shutdown.is_cancelled() {
            return Err(PlayerError::NotConnected);
        }
        match (&inner.output, inner.channel) {
            (Some(output), Some(here)) if here != channel => {
                output.switch_to(channel).await?;
                inner.channel = Some(channel);
                info!(guild = %self.guild, %channel, "🔊 conexión movida de canal");
            }
            (Some(_), _) => {} // ya conectados a ese canal
            (None, _) => {
                let output = self.driver.connect(self.guild, channel).await?;
                inner.output = Some(output);
                inner.channel = Some(channel);
                inner.status = SessionStatus::ConnectedIdle;
                info!(guild = %self.guild, %channel, "🔊 conectado al canal de voz");
                self.wakeup.notify_one();
            }
        }
        Ok(())
    }

    /// Agrega una entrada al final de la cola y devuelve su posición (base 1).
    ///
    /// Nunca arranca la reproducción de forma síncrona: despierta al consumer
    /// loop y es él quien observa la cola no vacía y transiciona a `Playing`.
    /// Tras `leave` falla con `NotConnected`: ya no hay loop que consuma, y
    /// aceptar la entrada en silencio la perdería.
    pub async fn enqueue(&self, entry: QueueEntry) -> Result<usize, PlayerError> {
        let mut inner = self.inner.lock().await;
        if self.shutdown.is_cancelled() {
            return Err(PlayerError::NotConnected);
        }
        debug!(guild = %self.guild, title = entry.title(), "➕ agregado a la cola");
        inner.queue.enqueue(entry);
        let position = inner.queue.len();
        drop(inner);
        self.wakeup.notify_one();
        Ok(position)
    }

    /// Pausa el stream actual. Si no hay nada reproduciéndose es un no-op;
    /// devuelve `true` solo si el estado cambió.
    pub async fn pause(&self) -> Result<bool, PlayerError> {
        let mut inner = self.inner.lock().await;
        if inner.status != SessionStatus::Playing {
            return Ok(false);
        }
        if let Some(live) = &inner.live {
            live.pause()?;
        }
        inner.status = SessionStatus::Paused;
        Ok(true)
    }

    /// Reanuda un stream pausado. No-op si el reproductor no estaba pausado;
    /// devuelve `true` solo si el estado cambió.
    pub async fn resume(&self) -> Result<bool, PlayerError> {
        let mut inner = self.inner.lock().await;
        if inner.status != SessionStatus::Paused {
            return Ok(false);
        }
        if let Some(live) = &inner.live {
            live.resume()?;
        }
        inner.status = SessionStatus::Playing;
        Ok(true)
    }

    /// Detiene el stream actual; el consumer loop pasa solo a la siguiente
    /// entrada. Devuelve el título saltado.
    pub async fn skip(&self) -> Result<String, PlayerError> {
        let inner = self.inner.lock().await;
        match (&inner.current, &inner.live) {
            (Some(current), Some(live)) => {
                let title = current.title().to_string();
                live.halt()?;
                info!(guild = %self.guild, %title, "⏭️ entrada saltada");
                Ok(title)
            }
            _ => Err(PlayerError::NothingPlaying),
        }
    }

    /// Mueve la entrada en `index` (base 0) al frente de la cola y salta la
    /// actual, de modo que la elegida suene a continuación.
    pub async fn skip_to(&self, index: usize) -> Result<String, PlayerError> {
        let mut inner = self.inner.lock().await;
        let title = match (&inner.current, &inner.live) {
            (Some(current), Some(_)) => current.title().to_string(),
            _ => return Err(PlayerError::NothingPlaying),
        };
        if inner.queue.is_empty() {
            return Err(PlayerError::EmptyQueue);
        }
        inner.queue.move_to_front(index)?;
        if let Some(live) = &inner.live {
            live.halt()?;
        }
        info!(guild = %self.guild, %title, "⏭️ salto a entrada elegida");
        Ok(title)
    }

    /// Vacía la cola y detiene el stream actual. La conexión no se libera:
    /// la sesión queda `ConnectedIdle`, lista para volver a encolar.
    pub async fn stop(&self) -> Result<(), PlayerError> {
        let mut inner = self.inner.lock().await;
        if inner.output.is_none() {
            return Err(PlayerError::NotConnected);
        }
        inner.queue.clear();
        if let Some(live) = &inner.live {
            live.halt()?;
        }
        info!(guild = %self.guild, "⏹️ reproducción detenida, cola vaciada");
        Ok(())
    }

    /// Detiene todo, libera la conexión y cancela el consumer loop de forma
    /// permanente. Tras esto el registry descarta la sesión. Sobre una sesión
    /// ya desconectada falla con `NotConnected`.
    pub async fn leave(&self) -> Result<(), PlayerError> {
        let mut inner = self.inner.lock().await;
        let Some(output) = inner.output.take() else {
            return Err(PlayerError::NotConnected);
        };
        inner.status = SessionStatus::Stopping;
        inner.queue.clear();
        if let Some(live) = inner.live.take() {
            // Mejor esfuerzo: la conexión se libera igual si el halt falla.
            if let Err(e) = live.halt() {
                warn!(guild = %self.guild, error = %e, "fallo al detener el stream durante leave");
            }
        }
        inner.current = None;
        inner.channel = None;

        // Cancelar antes de desconectar: ninguna espera del loop sobrevive.
        self.shutdown.cancel();
        let result = output.disconnect().await;
        inner.status = SessionStatus::Idle;
        info!(guild = %self.guild, "👋 sesión desconectada");
        result
    }

    /// Valida el porcentaje, lo escala a [0, 1] y lo aplica de inmediato al
    /// stream activo; si no hay ninguno, rige desde la próxima reproducción.
    pub async fn set_volume(&self, percent: i64) -> Result<(), PlayerError> {
        if !(0..=100).contains(&percent) {
            return Err(PlayerError::InvalidVolume(percent));
        }
        let mut inner = self.inner.lock().await;
        inner.volume = percent as f32 / 100.0;
        if let Some(live) = &inner.live {
            live.set_volume(inner.volume)?;
        }
        info!(guild = %self.guild, volume = percent, "🔊 volumen ajustado");
        Ok(())
    }

    /// Intercambia dos entradas pendientes (índices base 0).
    pub async fn swap(&self, i: usize, j: usize) -> Result<(), PlayerError> {
        let mut inner = self.inner.lock().await;
        if inner.queue.is_empty() {
            return Err(PlayerError::EmptyQueue);
        }
        inner.queue.swap(i, j)
    }

    /// Quita la entrada pendiente en `index` (base 0) y devuelve su título.
    pub async fn remove(&self, index: usize) -> Result<String, PlayerError> {
        let mut inner = self.inner.lock().await;
        if inner.queue.is_empty() {
            return Err(PlayerError::EmptyQueue);
        }
        let entry = inner.queue.remove_at(index)?;
        Ok(entry.title().to_string())
    }

    /// Mezcla las entradas pendientes. La entrada actual no se toca.
    pub async fn shuffle(&self) -> Result<(), PlayerError> {
        let mut inner = self.inner.lock().await;
        if inner.queue.is_empty() {
            return Err(PlayerError::EmptyQueue);
        }
        inner.queue.shuffle();
        Ok(())
    }

    pub async fn now_playing(&self) -> Option<NowPlaying> {
        let inner = self.inner.lock().await;
        inner.current.as_ref().map(NowPlaying::from)
    }

    pub async fn queue_snapshot(&self) -> Vec<QueueEntry> {
        let inner = self.inner.lock().await;
        inner.queue.snapshot()
    }

    pub async fn queue_len(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.queue.len()
    }

    pub async fn status(&self) -> SessionStatus {
        let inner = self.inner.lock().await;
        inner.status
    }

    pub async fn channel(&self) -> Option<ChannelId> {
        let inner = self.inner.lock().await;
        inner.channel
    }

    pub async fn volume(&self) -> f32 {
        let inner = self.inner.lock().await;
        inner.volume
    }

    /// Paso de dequeue del consumer loop: si hay conexión, nada en curso y
    /// cola no vacía, extrae la cabeza y arranca su stream.
    async fn next_step(&self) -> Step {
        let mut inner = self.inner.lock().await;
        if inner.current.is_some() {
            // El stream anterior todavía no liberó su slot.
            return Step::Wait;
        }
        let Some(output) = inner.output.clone() else {
            return Step::Wait;
        };
        let Some(entry) = inner.queue.dequeue() else {
            return Step::Wait;
        };

        match output.begin(&entry.source, inner.volume).await {
            Ok(started) => {
                info!(guild = %self.guild, title = entry.title(), "🎵 reproduciendo");
                inner.current = Some(entry);
                inner.live = Some(started.control);
                inner.status = SessionStatus::Playing;
                Step::Started(started.finished)
            }
            Err(e) => {
                warn!(
                    guild = %self.guild,
                    title = entry.title(),
                    error = %e,
                    "no se pudo iniciar el stream, se descarta la entrada"
                );
                inner.status = SessionStatus::ConnectedIdle;
                Step::Retry
            }
        }
    }

    /// El stream terminó (natural o detenido): liberar el slot y volver al
    /// paso de dequeue.
    async fn on_track_finished(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(done) = inner.current.take() {
            debug!(guild = %self.guild, title = done.title(), "stream finalizado");
        }
        inner.live = None;
        if matches!(inner.status, SessionStatus::Playing | SessionStatus::Paused) {
            inner.status = SessionStatus::ConnectedIdle;
        }
    }
}

/// Tarea única por sesión que reproduce la cola secuencialmente.
///
/// Re-chequea la cola después de cada transición en lugar de cachear el
/// resultado de "estaba vacía", así un enqueue concurrente con un skip nunca
/// se pierde. Un `stop` no sale del loop; solo la cancelación de `leave`.
async fn consumer_loop(session: Arc<PlaybackSession>) {
    debug!(guild = %session.guild, "consumer loop iniciado");
    loop {
        if session.shutdown.is_cancelled() {
            break;
        }
        match session.next_step().await {
            Step::Started(finished) => {
                tokio::select! {
                    _ = session.shutdown.cancelled() => break,
                    _ = finished => session.on_track_finished().await,
                }
            }
            Step::Retry => continue,
            Step::Wait => {
                tokio::select! {
                    _ = session.shutdown.cancelled() => break,
                    _ = session.wakeup.notified() => {}
                }
            }
        }
    }
    debug!(guild = %session.guild, "consumer loop terminado");
}
