//! Geraete-Abstraktion
//!
//! Die Pipeline spricht Geraete nur ueber diese Traits an. Das echte
//! Backend ist [`crate::CpalBackend`] (Feature `cpal`), Tests nutzen
//! In-Memory-Implementierungen.

use peercall_core::{PeerId, TransportError};

use crate::error::AudioResult;
use crate::format::AudioFormat;

/// Zugang zu Ein- und Ausgabegeraeten
pub trait AudioBackend: Send + Sync + 'static {
    /// Oeffnet das Standard-Eingabegeraet mit genau diesem Format
    ///
    /// Wird auf dem Capture-Thread aufgerufen; der Stream verlaesst
    /// diesen Thread nie. Kann das Geraet das Format nicht liefern,
    /// kommt `AudioError::NichtUnterstuetztesFormat`.
    fn open_capture(&self, format: &AudioFormat) -> AudioResult<Box<dyn CaptureStream>>;

    /// Spielt einen Puffer synchron auf einem kurzlebigen Ausgabe-Stream ab
    ///
    /// Kehrt erst zurueck, wenn der Puffer abgespielt (oder verworfen) ist.
    fn play(&self, samples: &[i16], channels: u8, sample_rate: u32) -> AudioResult<()>;
}

/// Offener Capture-Stream, exklusiv im Besitz des Capture-Threads
pub trait CaptureStream {
    /// Liest hoechstens einen Frame in `buf`
    ///
    /// Gibt die Anzahl gelesener Samples zurueck, 0 wenn noch kein
    /// vollstaendiger Frame bereitliegt.
    fn read_frame(&mut self, buf: &mut [i16]) -> AudioResult<usize>;
}

/// Ziel der aufgenommenen Frames
pub trait FrameSink: Send + Sync + 'static {
    /// Peers, an die der naechste Frame gehen soll
    fn audio_targets(&self) -> Vec<PeerId>;

    /// Sendet einen Frame an einen Peer
    fn send_frame(
        &self,
        peer: PeerId,
        samples: &[i16],
        format: &AudioFormat,
    ) -> Result<(), TransportError>;
}
