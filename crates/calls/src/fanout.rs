//! Verteilung der Capture-Frames auf alle aktiven Anrufe

use std::sync::Arc;

use parking_lot::Mutex;

use peercall_audio::{AudioFormat, FrameSink};
use peercall_core::{AvTransport, PeerId, TransportError};

use crate::table::CallTable;

/// Verbindet die Audio-Pipeline mit Anruftabelle und A/V-Transport
///
/// Die Tabellensperre wird nur fuer das Ermitteln der Ziele gehalten,
/// nicht waehrend des Versands.
pub struct CallFanout {
    table: Arc<Mutex<CallTable>>,
    transport: Arc<dyn AvTransport>,
}

impl CallFanout {
    pub fn new(table: Arc<Mutex<CallTable>>, transport: Arc<dyn AvTransport>) -> Self {
        Self { table, transport }
    }
}

impl FrameSink for CallFanout {
    fn audio_targets(&self) -> Vec<PeerId> {
        self.table.lock().audio_targets()
    }

    fn send_frame(
        &self,
        peer: PeerId,
        samples: &[i16],
        format: &AudioFormat,
    ) -> Result<(), TransportError> {
        let sample_count = samples.len() / format.channels.max(1) as usize;
        self.transport
            .send_audio_frame(peer, samples, sample_count, format.channels, format.sample_rate)
    }
}
