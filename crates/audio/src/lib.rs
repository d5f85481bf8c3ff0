//! peercall-audio – Audio-Pipeline
//!
//! Ein gemeinsamer Capture-Thread fuer alle Anrufe:
//! - Capture-Geraet exklusiv im Besitz der Pipeline, solange sie laeuft
//! - Frames werden an alle Peers mit aktivem Audio verteilt ([`FrameSink`])
//! - Playback ueber kurzlebige Ausgabe-Streams
//! - Geraete-Backend austauschbar ([`AudioBackend`]), cpal hinter dem Feature `cpal`

#[cfg(feature = "cpal")]
pub mod cpal_backend;
pub mod device;
pub mod error;
pub mod format;
pub mod pipeline;

// Bequeme Re-Exporte der wichtigsten Typen
#[cfg(feature = "cpal")]
pub use cpal_backend::CpalBackend;
pub use device::{AudioBackend, CaptureStream, FrameSink};
pub use error::{AudioError, AudioResult};
pub use format::AudioFormat;
pub use pipeline::{AudioPipeline, PipelineStats, START_TIMEOUT};
