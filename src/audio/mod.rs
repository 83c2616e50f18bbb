//! Capa de salida de audio: el contrato que usa el motor de reproducción y su
//! implementación de producción sobre songbird.

pub mod discord;
pub mod output;

#[cfg(test)]
pub mod testing;

pub use discord::SongbirdDriver;
pub use output::{AudioOutput, LiveTrack, OutputDriver, StartedTrack};
