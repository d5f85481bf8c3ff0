//! Fehlertypen fuer die Anrufverwaltung

use thiserror::Error;

use peercall_core::{PeerId, TransportError};

use crate::state::CallPhase;

/// Fehler der Steueroperationen des Session-Managers
#[derive(Debug, Error)]
pub enum CallError {
    #[error("Kein Anruf mit {0}")]
    KeinAnruf(PeerId),

    #[error("Mit {0} laeuft bereits ein Anruf")]
    AnrufBereitsAktiv(PeerId),

    #[error("Anruf ohne Audio und Video ist nicht moeglich")]
    KeineMedien,

    #[error("Ungueltiger Uebergang fuer {peer}: {ereignis} in Phase {phase}")]
    UngueltigerUebergang {
        peer: PeerId,
        phase: CallPhase,
        ereignis: String,
    },

    #[error("Session wurde beendet")]
    Beendet,

    #[error("Transport-Fehler: {0}")]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, CallError>;
