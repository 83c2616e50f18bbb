use std::sync::Arc;

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{HttpRequest, Input, YoutubeDl},
    tracks::TrackHandle,
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use tokio::sync::{oneshot, Mutex};
use tracing::debug;

use crate::{
    audio::output::{AudioOutput, LiveTrack, OutputDriver, StartedTrack},
    error::PlayerError,
    player::source::PlayableSource,
};

/// Driver de producción sobre el manager de songbird.
pub struct SongbirdDriver {
    manager: Arc<Songbird>,
    http: reqwest::Client,
}

impl SongbirdDriver {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self {
            manager,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl OutputDriver for SongbirdDriver {
    async fn connect(
        &self,
        guild: GuildId,
        channel: ChannelId,
    ) -> Result<Arc<dyn AudioOutput>, PlayerError> {
        let call = self
            .manager
            .join(guild, channel)
            .await
            .map_err(|e| PlayerError::Connection(e.to_string()))?;
        debug!(%guild, %channel, "call de songbird establecido");
        Ok(Arc::new(DiscordOutput {
            manager: self.manager.clone(),
            http: self.http.clone(),
            guild,
            call,
        }))
    }
}

/// Una conexión de voz viva de songbird, propiedad de una sesión.
struct DiscordOutput {
    manager: Arc<Songbird>,
    http: reqwest::Client,
    guild: GuildId,
    call: Arc<Mutex<Call>>,
}

#[async_trait]
impl AudioOutput for DiscordOutput {
    async fn switch_to(&self, channel: ChannelId) -> Result<(), PlayerError> {
        // Re-join sobre el mismo guild mueve el call existente de canal.
        self.manager
            .join(self.guild, channel)
            .await
            .map(|_| ())
            .map_err(|e| PlayerError::Connection(e.to_string()))
    }

    async fn begin(
        &self,
        source: &PlayableSource,
        volume: f32,
    ) -> Result<StartedTrack, PlayerError> {
        // Con stream directo del resolver se usa tal cual; si no, songbird
        // deriva el stream de la URL de la página vía yt-dlp.
        let input: Input = match source.stream_url() {
            Some(stream) => HttpRequest::new(self.http.clone(), stream.to_string()).into(),
            None => YoutubeDl::new(self.http.clone(), source.url().to_string()).into(),
        };

        let mut call = self.call.lock().await;
        let handle = call.play_input(input);
        handle.set_volume(volume).map_err(stream_err)?;

        let (tx, rx) = oneshot::channel();
        let notifier = TrackEndNotifier {
            tx: Arc::new(parking_lot::Mutex::new(Some(tx))),
        };
        // End cubre tanto el final natural como el stop; Error evita que el
        // consumer loop quede esperando un stream que reventó.
        handle
            .add_event(Event::Track(TrackEvent::End), notifier.clone())
            .map_err(stream_err)?;
        handle
            .add_event(Event::Track(TrackEvent::Error), notifier)
            .map_err(stream_err)?;

        Ok(StartedTrack {
            control: Box::new(DiscordTrack { handle }),
            finished: rx,
        })
    }

    async fn disconnect(&self) -> Result<(), PlayerError> {
        self.manager
            .remove(self.guild)
            .await
            .map_err(|e| PlayerError::Connection(e.to_string()))
    }
}

struct DiscordTrack {
    handle: TrackHandle,
}

impl LiveTrack for DiscordTrack {
    fn pause(&self) -> Result<(), PlayerError> {
        self.handle.pause().map_err(stream_err)
    }

    fn resume(&self) -> Result<(), PlayerError> {
        self.handle.play().map_err(stream_err)
    }

    fn halt(&self) -> Result<(), PlayerError> {
        self.handle.stop().map_err(stream_err)
    }

    fn set_volume(&self, volume: f32) -> Result<(), PlayerError> {
        self.handle.set_volume(volume).map_err(stream_err)
    }
}

fn stream_err(e: songbird::error::ControlError) -> PlayerError {
    PlayerError::Stream(e.to_string())
}

/// Resuelve la señal `finished` exactamente una vez, sea cual sea el evento
/// de track que llegue primero.
#[derive(Clone)]
struct TrackEndNotifier {
    tx: Arc<parking_lot::Mutex<Option<oneshot::Sender<()>>>>,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        if let Some(tx) = self.tx.lock().take() {
            let _ = tx.send(());
        }
        None
    }
}
