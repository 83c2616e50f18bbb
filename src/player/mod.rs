//! Motor de reproducción por sesión: una cola ordenada, un consumer loop y
//! operaciones de mutación seguras bajo concurrencia por cada conexión de voz.

pub mod queue;
pub mod registry;
pub mod session;
pub mod source;

pub use registry::SessionRegistry;
pub use session::{PlaybackSession, SessionStatus};
pub use source::{NowPlaying, PlayableSource, QueueEntry};
