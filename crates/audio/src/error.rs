//! Fehlertypen fuer die Audio-Pipeline

use thiserror::Error;

/// Alle moeglichen Fehler der Audio-Pipeline
#[derive(Debug, Error)]
pub enum AudioError {
    /// Das Geraet kann die geforderte Konfiguration nicht liefern.
    /// Aufrufer behandeln das als "kein lokales Audio", nicht als Abbruch.
    #[error("Nicht unterstuetztes Audio-Format: {0}")]
    NichtUnterstuetztesFormat(String),

    #[error("Ungueltiges Audio-Format: {0}")]
    UngueltigesFormat(String),

    #[error("Kein Standard-Eingabegeraet verfuegbar")]
    KeinStandardEingabegeraet,

    #[error("Kein Standard-Ausgabegeraet verfuegbar")]
    KeinStandardAusgabegeraet,

    #[error("Stream-Fehler: {0}")]
    StreamFehler(String),

    #[error("Lesefehler: {0}")]
    Lesefehler(String),

    #[error("Capture-Thread beendet sich vor dem Start")]
    ThreadAbgebrochen,

    #[error("Capture-Geraet hat sich nach {0:?} nicht gemeldet")]
    StartZeitueberschreitung(std::time::Duration),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

impl AudioError {
    /// Geraetefehler fuehren zu "Audio nicht verfuegbar", nicht zum Abbruch des Anrufs
    pub fn ist_geraetefehler(&self) -> bool {
        matches!(
            self,
            AudioError::NichtUnterstuetztesFormat(_)
                | AudioError::KeinStandardEingabegeraet
                | AudioError::KeinStandardAusgabegeraet
                | AudioError::StreamFehler(_)
                | AudioError::StartZeitueberschreitung(_)
        )
    }
}

pub type AudioResult<T> = Result<T, AudioError>;
