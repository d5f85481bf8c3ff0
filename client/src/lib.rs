//! peercall-client – Session-Kontext und lokale Laufzeit
//!
//! # Architektur
//! - [`session::Session`] – Kontextobjekt mit den UI-Operationen
//! - [`iterate::IterationLoop`] – Transport- und A/V-Iterations-Threads
//! - [`loopback::LoopbackTransport`] – simulierter Echo-Peer fuer lokale Laeufe
//! - [`echo::EchoPlugin`] – Beispiel-Plugin (ping/pong)
//! - [`console`] – zeilenbasierte Steuerung
//! - [`app::Client`] – Verdrahtung und geordnetes Beenden

pub mod app;
pub mod config;
pub mod console;
pub mod echo;
pub mod iterate;
pub mod logging;
pub mod loopback;
pub mod session;

pub use app::Client;
pub use config::ClientConfig;
pub use session::Session;

use std::sync::Arc;

use peercall_audio::AudioBackend;

/// Geraete-Backend des Clients
#[cfg(feature = "cpal")]
pub fn audio_backend() -> Arc<dyn AudioBackend> {
    Arc::new(peercall_audio::CpalBackend::new())
}

/// Ohne cpal gibt es kein lokales Audio; Anrufe laufen trotzdem
#[cfg(not(feature = "cpal"))]
pub fn audio_backend() -> Arc<dyn AudioBackend> {
    Arc::new(OhneAudio)
}

#[cfg(not(feature = "cpal"))]
struct OhneAudio;

#[cfg(not(feature = "cpal"))]
impl AudioBackend for OhneAudio {
    fn open_capture(
        &self,
        _format: &peercall_audio::AudioFormat,
    ) -> peercall_audio::AudioResult<Box<dyn peercall_audio::CaptureStream>> {
        Err(peercall_audio::AudioError::KeinStandardEingabegeraet)
    }

    fn play(&self, _samples: &[i16], _channels: u8, _sample_rate: u32) -> peercall_audio::AudioResult<()> {
        Err(peercall_audio::AudioError::KeinStandardAusgabegeraet)
    }
}
