//! Anruf-Konfiguration (Abschnitt `[calls]` der Client-Konfiguration)

use serde::{Deserialize, Serialize};

use peercall_core::Bitrates;

/// Bitraten und Annahme-Verhalten
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// Audio-Bitrate in kbit/s
    pub audio_bitrate_kbps: u32,
    /// Video-Bitrate in kbit/s
    pub video_bitrate_kbps: u32,
    /// Eingehende Anrufe auch mit Video annehmen
    pub answer_video: bool,
    /// Eingehende Anrufe sofort annehmen
    pub auto_answer: bool,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            audio_bitrate_kbps: 32,
            video_bitrate_kbps: 5000,
            answer_video: true,
            auto_answer: false,
        }
    }
}

/// Wie ein eingehender Anruf angenommen wird
///
/// Die Annahme richtet sich nicht nach den angefragten Medien, sondern
/// immer nach dieser Richtlinie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerPolicy {
    pub bitrates: Bitrates,
    pub video: bool,
}

impl CallConfig {
    /// Bitraten fuer einen ausgehenden Anruf; nicht angefragte Medien bekommen 0
    pub fn call_bitrates(&self, audio: bool, video: bool) -> Bitrates {
        Bitrates::new(
            if audio { self.audio_bitrate_kbps } else { 0 },
            if video { self.video_bitrate_kbps } else { 0 },
        )
    }

    pub fn answer_policy(&self) -> AnswerPolicy {
        AnswerPolicy {
            bitrates: self.call_bitrates(true, self.answer_video),
            video: self.answer_video,
        }
    }
}
