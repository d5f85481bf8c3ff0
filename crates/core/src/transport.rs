//! Vertrag mit der externen Transport-Bibliothek
//!
//! Die Traits beschreiben nur die Aufrufe, die peercall selbst benoetigt.
//! Implementierungen muessen thread-sicher sein: Aufrufe kommen aus den
//! Iterations-Loops, dem Audio-Thread und von Benutzeraktionen.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::PeerId;

/// Bitraten fuer Anruf und Annahme in kbit/s (0 = Medium aus)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bitrates {
    pub audio_kbps: u32,
    pub video_kbps: u32,
}

impl Bitrates {
    pub fn new(audio_kbps: u32, video_kbps: u32) -> Self {
        Self {
            audio_kbps,
            video_kbps,
        }
    }
}

/// Steuersignale fuer einen laufenden Anruf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallControl {
    Resume,
    Pause,
    /// Beendet oder lehnt einen Anruf ab, auch vor der Annahme
    Cancel,
    MuteAudio,
    UnmuteAudio,
    HideVideo,
    ShowVideo,
}

/// Zustandsbits eines Anrufs, wie sie die A/V-Bibliothek meldet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CallStateFlags(u32);

impl CallStateFlags {
    pub const ERROR: Self = Self(1);
    pub const FINISHED: Self = Self(2);
    pub const SENDING_AUDIO: Self = Self(4);
    pub const SENDING_VIDEO: Self = Self(8);
    pub const ACCEPTING_AUDIO: Self = Self(16);
    pub const ACCEPTING_VIDEO: Self = Self(32);

    /// Uebernimmt eine rohe Bitmaske (unbekannte Bits bleiben erhalten)
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn empty() -> Self {
        Self(0)
    }

    /// Prueft ob alle Bits von `other` gesetzt sind
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Anruf wurde beendet oder ist fehlgeschlagen
    pub fn ist_beendet(&self) -> bool {
        self.contains(Self::FINISHED) || self.contains(Self::ERROR)
    }

    /// Irgendein Medium wird gesendet oder angenommen
    pub fn hat_medien(&self) -> bool {
        self.0
            & (Self::SENDING_AUDIO.0
                | Self::SENDING_VIDEO.0
                | Self::ACCEPTING_AUDIO.0
                | Self::ACCEPTING_VIDEO.0)
            != 0
    }

    /// Video wird in irgendeine Richtung uebertragen
    pub fn hat_video(&self) -> bool {
        self.contains(Self::SENDING_VIDEO) || self.contains(Self::ACCEPTING_VIDEO)
    }
}

impl std::ops::BitOr for CallStateFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Ausgehende A/V-Aufrufe der Transport-Bibliothek
pub trait AvTransport: Send + Sync + 'static {
    /// Ruft einen Peer an
    fn call(&self, peer: PeerId, bitrates: Bitrates) -> Result<()>;

    /// Nimmt einen eingehenden Anruf an
    fn answer(&self, peer: PeerId, bitrates: Bitrates) -> Result<()>;

    /// Sendet ein Steuersignal fuer einen Anruf
    fn call_control(&self, peer: PeerId, control: CallControl) -> Result<()>;

    /// Sendet einen PCM-Frame (i16, interleaved) an einen Peer
    fn send_audio_frame(
        &self,
        peer: PeerId,
        samples: &[i16],
        sample_count: usize,
        channels: u8,
        sample_rate: u32,
    ) -> Result<()>;
}

/// Custom-Packet-Versand der Transport-Bibliothek
pub trait PacketTransport: Send + Sync + 'static {
    fn send_lossless_packet(&self, peer: PeerId, data: &[u8]) -> Result<()>;

    fn send_lossy_packet(&self, peer: PeerId, data: &[u8]) -> Result<()>;
}
