//! Eingehende Ereignisse der Transport-Bibliothek
//!
//! Die Iterations-Loops des Clients holen diese Ereignisse ab und
//! reichen sie an den Session-Kontext weiter.

use std::time::Duration;

use crate::transport::CallStateFlags;
use crate::types::{ChannelKind, PeerId};

/// Alle Ereignisse, die peercall von der Transport-Bibliothek erhaelt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Ein Peer ruft an
    CallRequest {
        peer: PeerId,
        audio: bool,
        video: bool,
    },
    /// Zustandsaenderung eines Anrufs
    CallState { peer: PeerId, flags: CallStateFlags },
    /// Empfangener Audio-Frame eines Peers
    AudioFrame {
        peer: PeerId,
        samples: Vec<i16>,
        channels: u8,
        sample_rate: u32,
    },
    /// Custom-Packet, markiert mit dem Kanal auf dem es ankam
    CustomPacket {
        peer: PeerId,
        kind: ChannelKind,
        data: Vec<u8>,
    },
}

impl TransportEvent {
    /// Peer, von dem das Ereignis stammt
    pub fn peer(&self) -> PeerId {
        match self {
            Self::CallRequest { peer, .. }
            | Self::CallState { peer, .. }
            | Self::AudioFrame { peer, .. }
            | Self::CustomPacket { peer, .. } => *peer,
        }
    }
}

/// Quelle fuer Transport-Ereignisse, die periodisch iteriert wird
///
/// Entspricht einer Iterations-Schleife der Transport-Bibliothek: jeder
/// Aufruf von `iterate` arbeitet anstehende Netzwerkereignisse ab und
/// liefert die daraus entstandenen Ereignisse.
pub trait EventSource: Send + Sync + 'static {
    fn iterate(&self) -> Vec<TransportEvent>;

    /// Vom Protokoll gewuenschtes Intervall bis zur naechsten Iteration
    fn iteration_interval(&self) -> Duration;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_peer() {
        let e = TransportEvent::CustomPacket {
            peer: PeerId(4),
            kind: ChannelKind::Lossy,
            data: vec![1],
        };
        assert_eq!(e.peer(), PeerId(4));
    }
}
