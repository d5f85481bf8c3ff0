//! Fehlertypen der Transport-Schnittstelle
//!
//! Werden von Implementierungen der Traits in [`crate::transport`]
//! zurueckgegeben und von den Call- und Plugin-Crates weitergereicht.

use thiserror::Error;

use crate::types::PeerId;

/// Result-Alias fuer Transport-Aufrufe
pub type Result<T> = std::result::Result<T, TransportError>;

/// Fehler, die die Transport-Bibliothek melden kann
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Peer nicht gefunden: {0}")]
    PeerNichtGefunden(PeerId),

    #[error("Peer nicht verbunden: {0}")]
    PeerNichtVerbunden(PeerId),

    #[error("Kein Anruf mit {0} aktiv")]
    KeinAnrufAktiv(PeerId),

    #[error("Anruf mit {0} laeuft bereits")]
    AnrufBereitsAktiv(PeerId),

    #[error("Paket zu gross: {0} Bytes")]
    PaketZuGross(usize),

    #[error("Transport-Warteschlange voll")]
    Warteschlange,
}
