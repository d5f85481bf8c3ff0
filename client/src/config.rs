//! Client-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Client ohne Konfigurationsdatei
//! lauffaehig ist.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use peercall_audio::AudioFormat;
use peercall_calls::CallConfig;

use crate::logging::{log_format_gueltig, log_level_gueltig};

/// Vollstaendige Client-Konfiguration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub logging: LoggingEinstellungen,
    pub audio: AudioEinstellungen,
    /// Bitraten und Annahme-Verhalten
    pub calls: CallConfig,
    pub plugins: PluginEinstellungen,
    /// Iterations-Intervalle der Transport-Bibliothek
    pub transport: TransportEinstellungen,
}

/// Logging-Einstellungen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Capture-Einstellungen der Audio-Pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioEinstellungen {
    pub sample_rate: u32,
    pub channels: u8,
    pub frame_duration_ms: u32,
    /// Pause zwischen zwei Capture-Durchlaeufen
    pub poll_interval_ms: u64,
    /// Lesefehler in Folge, ab denen eskaliert wird
    pub max_consecutive_read_errors: u32,
}

impl Default for AudioEinstellungen {
    fn default() -> Self {
        let format = AudioFormat::default();
        Self {
            sample_rate: format.sample_rate,
            channels: format.channels,
            frame_duration_ms: format.frame_duration_ms,
            poll_interval_ms: format.poll_interval.as_millis() as u64,
            max_consecutive_read_errors: format.max_consecutive_read_errors,
        }
    }
}

impl AudioEinstellungen {
    pub fn format(&self) -> AudioFormat {
        AudioFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            frame_duration_ms: self.frame_duration_ms,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_consecutive_read_errors: self.max_consecutive_read_errors,
        }
    }
}

/// Plugin-Einstellungen
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginEinstellungen {
    /// Kurznamen der Plugins, die beim Start aktiviert werden
    pub active: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportEinstellungen {
    pub iteration_interval_ms: u64,
    pub av_iteration_interval_ms: u64,
}

impl Default for TransportEinstellungen {
    fn default() -> Self {
        Self {
            iteration_interval_ms: 50,
            av_iteration_interval_ms: 20,
        }
    }
}

impl TransportEinstellungen {
    pub fn iteration_interval(&self) -> Duration {
        Duration::from_millis(self.iteration_interval_ms)
    }

    pub fn av_iteration_interval(&self) -> Duration {
        Duration::from_millis(self.av_iteration_interval_ms)
    }
}

impl ClientConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt `None` zurueck wenn die Datei nicht existiert; der Aufrufer
    /// nimmt dann die Standardwerte und meldet das, sobald das Logging steht.
    pub fn laden(pfad: impl AsRef<Path>) -> anyhow::Result<Option<Self>> {
        let pfad = pfad.as_ref();
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt).map_err(|e| {
                    anyhow::anyhow!("Konfigurationsfehler in '{}': {e}", pfad.display())
                })?;
                Ok(Some(config))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{}' nicht lesbar: {e}",
                pfad.display()
            )),
        }
    }

    /// Schreibt die Konfiguration zurueck (z.B. geaenderte Plugin-Aktivierung)
    pub fn speichern(&self, pfad: impl AsRef<Path>) -> anyhow::Result<()> {
        let pfad = pfad.as_ref();
        let inhalt = toml::to_string_pretty(self)?;
        std::fs::write(pfad, inhalt).map_err(|e| {
            anyhow::anyhow!("Konfigurationsdatei '{}' nicht schreibbar: {e}", pfad.display())
        })
    }

    /// Prueft Werte, die serde allein nicht abfangen kann
    pub fn validieren(&self) -> anyhow::Result<()> {
        if !log_level_gueltig(&self.logging.level) {
            anyhow::bail!("Ungueltiges Log-Level: {:?}", self.logging.level);
        }
        if !log_format_gueltig(&self.logging.format) {
            anyhow::bail!("Ungueltiges Log-Format: {:?}", self.logging.format);
        }
        self.audio.format().validieren()?;
        if self.transport.iteration_interval_ms == 0 || self.transport.av_iteration_interval_ms == 0 {
            anyhow::bail!("Iterations-Intervalle muessen groesser als 0 sein");
        }
        Ok(())
    }
}
