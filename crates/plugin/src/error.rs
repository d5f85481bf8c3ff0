//! Fehlertypen fuer das Plugin-System

use thiserror::Error;

use peercall_protocol::EnvelopeError;

/// Alle moeglichen Fehler im Plugin-System
#[derive(Debug, Error)]
pub enum PluginError {
    // --- Registrierung ---
    #[error("Plugin-Kurzname bereits registriert: {0}")]
    DoppelterKurzname(String),

    #[error("Ungueltiger Plugin-Name: {0:?}")]
    UngueltigerName(String),

    // --- Lifecycle ---
    #[error("Plugin nicht gefunden: {0}")]
    NichtGefunden(String),

    #[error("Plugin '{name}' fehlgeschlagen: {grund}")]
    Handler { name: String, grund: String },

    // --- Protokoll ---
    #[error("Envelope-Fehler: {0}")]
    Envelope(#[from] EnvelopeError),
}

/// Result-Alias fuer das Plugin-System
pub type Result<T> = std::result::Result<T, PluginError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige_doppelt() {
        let e = PluginError::DoppelterKurzname("chess".into());
        assert_eq!(e.to_string(), "Plugin-Kurzname bereits registriert: chess");
    }

    #[test]
    fn envelope_fehler_konvertierung() {
        let e: PluginError = EnvelopeError::NameLeer.into();
        assert!(e.to_string().contains("Envelope-Fehler"));
    }
}
