use std::time::Duration;

use serenity::model::id::UserId;

/// Un item de audio ya resuelto: metadatos más, opcionalmente, la URL directa
/// del stream. Inmutable una vez creado; la propiedad pasa a la `QueueEntry`
/// que lo envuelve.
#[derive(Debug, Clone)]
pub struct PlayableSource {
    title: String,
    url: String,
    duration: Option<Duration>,
    stream_url: Option<String>,
}

impl PlayableSource {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            duration: None,
            stream_url: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// URL directa del stream de audio, si el resolver ya la obtuvo. Si no
    /// está, la salida de audio la deriva de `url` al iniciar la reproducción.
    pub fn with_stream_url(mut self, stream_url: impl Into<String>) -> Self {
        self.stream_url = Some(stream_url.into());
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn stream_url(&self) -> Option<&str> {
        self.stream_url.as_deref()
    }
}

/// Entrada de la cola: la fuente más la identidad de quien la pidió.
///
/// La entrada "actual" (en reproducción) nunca es miembro de la cola
/// pendiente; el consumer loop la extrae antes de iniciar el stream.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub source: PlayableSource,
    pub requested_by: UserId,
}

impl QueueEntry {
    pub fn new(source: PlayableSource, requested_by: UserId) -> Self {
        Self {
            source,
            requested_by,
        }
    }

    pub fn title(&self) -> &str {
        self.source.title()
    }
}

/// Resumen de la entrada en reproducción, pensado para mostrarse al usuario.
#[derive(Debug, Clone)]
pub struct NowPlaying {
    pub title: String,
    pub url: String,
    pub duration: Option<Duration>,
    pub requested_by: UserId,
}

impl From<&QueueEntry> for NowPlaying {
    fn from(entry: &QueueEntry) -> Self {
        Self {
            title: entry.source.title().to_string(),
            url: entry.source.url().to_string(),
            duration: entry.source.duration(),
            requested_by: entry.requested_by,
        }
    }
}
