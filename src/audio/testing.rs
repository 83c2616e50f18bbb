//! Fakes de la capa de salida de audio para los tests del motor de
//! reproducción. Mismo contrato que el driver de songbird, sin Discord.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use tokio::sync::oneshot;

use crate::{
    audio::output::{AudioOutput, LiveTrack, OutputDriver, StartedTrack},
    error::PlayerError,
    player::source::PlayableSource,
};

/// Driver falso: entrega siempre el mismo `FakeOutput` para que el test pueda
/// inspeccionarlo.
pub struct FakeDriver {
    pub output: Arc<FakeOutput>,
    connects: AtomicUsize,
    fail_connect: AtomicBool,
}

impl FakeDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            output: Arc::new(FakeOutput::new()),
            connects: AtomicUsize::new(0),
            fail_connect: AtomicBool::new(false),
        })
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    #[allow(dead_code)]
    pub fn fail_connects(&self) {
        self.fail_connect.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl OutputDriver for FakeDriver {
    async fn connect(
        &self,
        _guild: GuildId,
        _channel: ChannelId,
    ) -> Result<Arc<dyn AudioOutput>, PlayerError> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(PlayerError::Connection("fake connect failure".into()));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.output.clone())
    }
}

/// Conexión falsa. Lleva un gauge de streams vivos para poder afirmar que la
/// sesión nunca superpone dos reproducciones.
pub struct FakeOutput {
    begins: AtomicUsize,
    disconnects: AtomicUsize,
    fail_next_begin: AtomicBool,
    live_gauge: Arc<AtomicUsize>,
    max_live: AtomicUsize,
    switches: Mutex<Vec<ChannelId>>,
    tracks: Mutex<Vec<Arc<FakeTrackState>>>,
}

impl FakeOutput {
    fn new() -> Self {
        Self {
            begins: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            fail_next_begin: AtomicBool::new(false),
            live_gauge: Arc::new(AtomicUsize::new(0)),
            max_live: AtomicUsize::new(0),
            switches: Mutex::new(Vec::new()),
            tracks: Mutex::new(Vec::new()),
        }
    }

    pub fn begins(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Máximo de streams simultáneamente vivos observado.
    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    pub fn switches(&self) -> Vec<ChannelId> {
        self.switches.lock().clone()
    }

    /// Hace fallar únicamente el próximo `begin`.
    pub fn fail_next_begin(&self) {
        self.fail_next_begin.store(true, Ordering::SeqCst);
    }

    /// El stream activo, si hay uno.
    pub fn current_track(&self) -> Option<Arc<FakeTrackState>> {
        self.tracks
            .lock()
            .iter()
            .rev()
            .find(|track| track.is_live())
            .cloned()
    }

    /// Completa "naturalmente" el stream activo, como si el audio hubiera
    /// terminado solo.
    pub fn finish_current(&self) {
        if let Some(track) = self.current_track() {
            track.finish();
        }
    }
}

#[async_trait]
impl AudioOutput for FakeOutput {
    async fn switch_to(&self, channel: ChannelId) -> Result<(), PlayerError> {
        self.switches.lock().push(channel);
        Ok(())
    }

    async fn begin(
        &self,
        source: &PlayableSource,
        volume: f32,
    ) -> Result<StartedTrack, PlayerError> {
        if self.fail_next_begin.swap(false, Ordering::SeqCst) {
            return Err(PlayerError::Stream("fake begin failure".into()));
        }
        self.begins.fetch_add(1, Ordering::SeqCst);
        let live = self.live_gauge.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(live, Ordering::SeqCst);

        let (tx, rx) = oneshot::channel();
        let state = Arc::new(FakeTrackState {
            title: source.title().to_string(),
            volume: Mutex::new(volume),
            paused: AtomicBool::new(false),
            finished: Mutex::new(Some(tx)),
            gauge: self.live_gauge.clone(),
        });
        self.tracks.lock().push(state.clone());

        Ok(StartedTrack {
            control: Box::new(FakeTrack { state }),
            finished: rx,
        })
    }

    async fn disconnect(&self) -> Result<(), PlayerError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Estado observable de un stream falso.
pub struct FakeTrackState {
    pub title: String,
    volume: Mutex<f32>,
    paused: AtomicBool,
    finished: Mutex<Option<oneshot::Sender<()>>>,
    gauge: Arc<AtomicUsize>,
}

impl FakeTrackState {
    pub fn volume(&self) -> f32 {
        *self.volume.lock()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_live(&self) -> bool {
        self.finished.lock().is_some()
    }

    /// Resuelve la señal de finalización exactamente una vez.
    fn finish(&self) {
        if let Some(tx) = self.finished.lock().take() {
            self.gauge.fetch_sub(1, Ordering::SeqCst);
            let _ = tx.send(());
        }
    }
}

struct FakeTrack {
    state: Arc<FakeTrackState>,
}

impl LiveTrack for FakeTrack {
    fn pause(&self) -> Result<(), PlayerError> {
        self.state.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&self) -> Result<(), PlayerError> {
        self.state.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn halt(&self) -> Result<(), PlayerError> {
        self.state.finish();
        Ok(())
    }

    fn set_volume(&self, volume: f32) -> Result<(), PlayerError> {
        *self.state.volume.lock() = volume;
        Ok(())
    }
}
