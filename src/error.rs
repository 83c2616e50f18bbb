use thiserror::Error;

/// Fallos de las operaciones de sesión y de cola.
///
/// El `Display` de cada variante es literalmente el mensaje que recibe el
/// usuario en Discord, así que se redacta en ese registro. Los índices se
/// reportan en base 1, igual que se muestran en el listado de la cola.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("index {given} is out of range (the queue has {len} entries)")]
    IndexOutOfRange { given: i64, len: usize },

    #[error("not connected to any voice channel")]
    NotConnected,

    #[error("already playing in another voice channel")]
    AlreadyConnectedElsewhere,

    #[error("you are not connected to any voice channel")]
    NotInVoiceChannel,

    #[error("the queue is empty")]
    EmptyQueue,

    #[error("nothing is currently being played")]
    NothingPlaying,

    #[error("volume must be between 0 and 100, got {0}")]
    InvalidVolume(i64),

    #[error("could not start the audio stream: {0}")]
    Stream(String),

    #[error("could not join the voice channel: {0}")]
    Connection(String),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

/// Fallos del colaborador de resolución (búsqueda/URL → fuente reproducible).
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("no results found for `{0}`")]
    NotFound(String),

    #[error("network error while resolving the source: {0}")]
    Network(String),

    #[error("unsupported source: {0}")]
    UnsupportedSource(String),
}
