//! Feste Capture-Konfiguration der Pipeline

use std::time::Duration;

use crate::error::{AudioError, AudioResult};

/// Audio-Format fuer Capture und Versand
///
/// Samples sind vorzeichenbehaftetes 16-Bit-PCM, bei mehreren Kanaelen
/// verschraenkt (interleaved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFormat {
    /// Abtastrate in Hz
    pub sample_rate: u32,
    /// Kanalanzahl (1 = Mono)
    pub channels: u8,
    /// Laenge eines Frames in Millisekunden
    pub frame_duration_ms: u32,
    /// Pause zwischen zwei Loop-Durchlaeufen
    pub poll_interval: Duration,
    /// Ab so vielen Lesefehlern in Folge wird eskaliert
    pub max_consecutive_read_errors: u32,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 8000,
            channels: 1,
            frame_duration_ms: 60,
            poll_interval: Duration::from_millis(10),
            max_consecutive_read_errors: 3,
        }
    }
}

impl AudioFormat {
    /// Samples pro Kanal und Frame (8 kHz * 60 ms = 480)
    pub fn samples_per_frame(&self) -> usize {
        (self.sample_rate as u64 * self.frame_duration_ms as u64 / 1000) as usize
    }

    /// Laenge eines Frame-Puffers ueber alle Kanaele
    pub fn frame_len(&self) -> usize {
        self.samples_per_frame() * self.channels as usize
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_millis(self.frame_duration_ms as u64)
    }

    /// Prueft die Konfiguration vor dem Oeffnen eines Geraets
    pub fn validieren(&self) -> AudioResult<()> {
        if self.sample_rate == 0 {
            return Err(AudioError::UngueltigesFormat("Abtastrate 0".into()));
        }
        if self.channels == 0 {
            return Err(AudioError::UngueltigesFormat("Kanalanzahl 0".into()));
        }
        if self.samples_per_frame() == 0 {
            return Err(AudioError::UngueltigesFormat(format!(
                "Frame von {} ms enthaelt keine Samples",
                self.frame_duration_ms
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(AudioError::UngueltigesFormat(
                "poll_interval muss groesser als 0 sein".into(),
            ));
        }
        if self.max_consecutive_read_errors == 0 {
            return Err(AudioError::UngueltigesFormat(
                "max_consecutive_read_errors muss mindestens 1 sein".into(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} Hz, {} Kanal/Kanaele, {} ms",
            self.sample_rate, self.channels, self.frame_duration_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_format() {
        let format = AudioFormat::default();
        assert_eq!(format.sample_rate, 8000);
        assert_eq!(format.channels, 1);
        assert_eq!(format.samples_per_frame(), 480);
        assert_eq!(format.frame_len(), 480);
        assert_eq!(format.frame_duration(), Duration::from_millis(60));
        assert!(format.validieren().is_ok());
    }

    #[test]
    fn stereo_verdoppelt_puffer() {
        let format = AudioFormat {
            sample_rate: 48000,
            channels: 2,
            frame_duration_ms: 20,
            ..Default::default()
        };
        assert_eq!(format.samples_per_frame(), 960);
        assert_eq!(format.frame_len(), 1920);
    }

    #[test]
    fn ungueltige_formate() {
        let null_rate = AudioFormat {
            sample_rate: 0,
            ..Default::default()
        };
        assert!(null_rate.validieren().is_err());

        let kein_kanal = AudioFormat {
            channels: 0,
            ..Default::default()
        };
        assert!(kein_kanal.validieren().is_err());

        let zu_kurz = AudioFormat {
            sample_rate: 8000,
            frame_duration_ms: 0,
            ..Default::default()
        };
        assert!(zu_kurz.validieren().is_err());

        let ohne_pause = AudioFormat {
            poll_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(ohne_pause.validieren().is_err());
    }
}
