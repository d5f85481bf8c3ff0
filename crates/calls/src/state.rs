//! Zustandsmaschine eines einzelnen Anrufs
//!
//! ```text
//! ausgehend:  Proposed --(Gegenseite nimmt an)--> ActiveAudio | ActiveVideo
//! eingehend:  Ringing  --(lokale Annahme)-------> ActiveAudio | ActiveVideo
//! jede Phase --(Auflegen, FINISHED, ERROR)------> Ended
//! ```
//!
//! `Ended` ist terminal. Ein Eintrag in dieser Phase wird sofort aus der
//! Anruftabelle entfernt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use peercall_core::{CallStateFlags, PeerId};

use crate::error::{CallError, Result};

/// Phase eines Anrufs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallPhase {
    /// Wir haben angerufen, die Gegenseite hat noch nicht angenommen
    Proposed,
    /// Eingehender Anruf, noch nicht angenommen
    Ringing,
    ActiveAudio,
    ActiveVideo,
    Ended,
}

impl CallPhase {
    pub fn is_active(&self) -> bool {
        matches!(self, CallPhase::ActiveAudio | CallPhase::ActiveVideo)
    }

    pub fn is_ended(&self) -> bool {
        *self == CallPhase::Ended
    }
}

impl std::fmt::Display for CallPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CallPhase::Proposed => "proposed",
            CallPhase::Ringing => "ringing",
            CallPhase::ActiveAudio => "active_audio",
            CallPhase::ActiveVideo => "active_video",
            CallPhase::Ended => "ended",
        };
        f.write_str(s)
    }
}

/// Angeforderte bzw. bestaetigte Medien eines Anrufs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MediaFlags {
    pub audio: bool,
    pub video: bool,
}

impl MediaFlags {
    pub fn new(audio: bool, video: bool) -> Self {
        Self { audio, video }
    }

    pub fn audio_only() -> Self {
        Self::new(true, false)
    }

    pub fn is_empty(&self) -> bool {
        !self.audio && !self.video
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallDirection {
    Outgoing,
    Incoming,
}

/// Ereignisse, die eine Phase veraendern koennen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEvent {
    /// Zustandsbits von der A/V-Bibliothek
    RemoteState(CallStateFlags),
    /// Wir nehmen einen klingelnden Anruf an
    LocalAnswer { video: bool },
    /// Lokales oder entferntes Auflegen, Ablehnen oder Abbruch
    Hangup,
}

impl std::fmt::Display for CallEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallEvent::RemoteState(flags) => write!(f, "Zustand {}", flags.bits()),
            CallEvent::LocalAnswer { video } => write!(f, "Annahme (video={video})"),
            CallEvent::Hangup => f.write_str("Auflegen"),
        }
    }
}

/// Zustand eines Anrufs mit genau einem Peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallState {
    pub peer_id: PeerId,
    pub phase: CallPhase,
    pub media: MediaFlags,
    pub direction: CallDirection,
    pub started_at: DateTime<Utc>,
    /// Zeitpunkt des Uebergangs in eine aktive Phase
    pub connected_at: Option<DateTime<Utc>>,
}

impl CallState {
    /// Ausgehender Anruf, wartet auf die Gegenseite
    pub fn outgoing(peer_id: PeerId, media: MediaFlags) -> Self {
        Self::neu(peer_id, CallPhase::Proposed, media, CallDirection::Outgoing)
    }

    /// Eingehender Anruf mit den angefragten Medien
    pub fn incoming(peer_id: PeerId, media: MediaFlags) -> Self {
        Self::neu(peer_id, CallPhase::Ringing, media, CallDirection::Incoming)
    }

    fn neu(peer_id: PeerId, phase: CallPhase, media: MediaFlags, direction: CallDirection) -> Self {
        Self {
            peer_id,
            phase,
            media,
            direction,
            started_at: Utc::now(),
            connected_at: None,
        }
    }

    /// Audio-Frames gehen nur an angenommene Anrufe mit Audio
    pub fn sends_audio(&self) -> bool {
        self.phase.is_active() && self.media.audio
    }

    /// Wendet ein Ereignis an und gibt die neue Phase zurueck
    ///
    /// `ACCEPTING_AUDIO` setzt `media.audio` nur, es loescht es nie.
    pub fn apply(&mut self, event: CallEvent) -> Result<CallPhase> {
        if self.phase.is_ended() {
            return Err(self.ungueltig(event));
        }

        match event {
            CallEvent::Hangup => self.phase = CallPhase::Ended,
            CallEvent::RemoteState(flags) if flags.ist_beendet() => self.phase = CallPhase::Ended,
            CallEvent::RemoteState(flags) => {
                if flags.contains(CallStateFlags::ACCEPTING_AUDIO) {
                    self.media.audio = true;
                }
                if self.phase == CallPhase::Proposed && flags.hat_medien() {
                    let video = self.media.video && flags.hat_video();
                    self.verbinden(video);
                }
            }
            CallEvent::LocalAnswer { video } => {
                if self.phase != CallPhase::Ringing {
                    return Err(self.ungueltig(event));
                }
                self.verbinden(video && self.media.video);
            }
        }
        Ok(self.phase)
    }

    fn verbinden(&mut self, video: bool) {
        self.phase = if video {
            CallPhase::ActiveVideo
        } else {
            CallPhase::ActiveAudio
        };
        self.connected_at = Some(Utc::now());
    }

    fn ungueltig(&self, event: CallEvent) -> CallError {
        CallError::UngueltigerUebergang {
            peer: self.peer_id,
            phase: self.phase,
            ereignis: event.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: PeerId = PeerId(7);

    #[test]
    fn eingehend_annehmen_nur_audio() {
        let mut call = CallState::incoming(P, MediaFlags::audio_only());
        assert_eq!(call.phase, CallPhase::Ringing);
        assert!(!call.sends_audio());

        let phase = call.apply(CallEvent::LocalAnswer { video: true }).unwrap();
        assert_eq!(phase, CallPhase::ActiveAudio);
        assert!(call.sends_audio());
        assert!(call.connected_at.is_some());
    }

    #[test]
    fn eingehend_annehmen_mit_video() {
        let mut call = CallState::incoming(P, MediaFlags::new(true, true));
        assert_eq!(
            call.apply(CallEvent::LocalAnswer { video: true }).unwrap(),
            CallPhase::ActiveVideo
        );

        let mut ohne = CallState::incoming(P, MediaFlags::new(true, true));
        assert_eq!(
            ohne.apply(CallEvent::LocalAnswer { video: false }).unwrap(),
            CallPhase::ActiveAudio
        );
    }

    #[test]
    fn ausgehend_gegenseite_nimmt_an() {
        let mut call = CallState::outgoing(P, MediaFlags::new(true, true));
        let flags = CallStateFlags::SENDING_AUDIO | CallStateFlags::ACCEPTING_AUDIO;
        assert_eq!(call.apply(CallEvent::RemoteState(flags)).unwrap(), CallPhase::ActiveAudio);

        let mut video = CallState::outgoing(P, MediaFlags::new(true, true));
        let flags = CallStateFlags::SENDING_VIDEO | CallStateFlags::ACCEPTING_AUDIO;
        assert_eq!(video.apply(CallEvent::RemoteState(flags)).unwrap(), CallPhase::ActiveVideo);
    }

    #[test]
    fn ausgehend_ohne_medienbits_bleibt_proposed() {
        let mut call = CallState::outgoing(P, MediaFlags::audio_only());
        let phase = call
            .apply(CallEvent::RemoteState(CallStateFlags::empty()))
            .unwrap();
        assert_eq!(phase, CallPhase::Proposed);
    }

    #[test]
    fn accepting_audio_setzt_nur() {
        let mut call = CallState::incoming(P, MediaFlags::new(false, true));
        call.apply(CallEvent::LocalAnswer { video: true }).unwrap();
        assert!(!call.media.audio);

        call.apply(CallEvent::RemoteState(CallStateFlags::ACCEPTING_AUDIO)).unwrap();
        assert!(call.media.audio);
        assert_eq!(call.phase, CallPhase::ActiveVideo);

        // Spaeteres Update ohne das Bit loescht nichts
        call.apply(CallEvent::RemoteState(CallStateFlags::SENDING_VIDEO)).unwrap();
        assert!(call.media.audio);
    }

    #[test]
    fn accepting_audio_beim_klingeln_aendert_phase_nicht() {
        let mut call = CallState::incoming(P, MediaFlags::new(false, false));
        call.apply(CallEvent::RemoteState(CallStateFlags::ACCEPTING_AUDIO)).unwrap();
        assert_eq!(call.phase, CallPhase::Ringing);
        assert!(call.media.audio);
    }

    #[test]
    fn beendet_durch_finished_und_error() {
        for flags in [CallStateFlags::FINISHED, CallStateFlags::ERROR] {
            let mut call = CallState::incoming(P, MediaFlags::audio_only());
            call.apply(CallEvent::LocalAnswer { video: false }).unwrap();
            assert_eq!(call.apply(CallEvent::RemoteState(flags)).unwrap(), CallPhase::Ended);
        }
    }

    #[test]
    fn auflegen_aus_jeder_phase() {
        let mut proposed = CallState::outgoing(P, MediaFlags::audio_only());
        assert_eq!(proposed.apply(CallEvent::Hangup).unwrap(), CallPhase::Ended);

        let mut ringing = CallState::incoming(P, MediaFlags::audio_only());
        assert_eq!(ringing.apply(CallEvent::Hangup).unwrap(), CallPhase::Ended);
    }

    #[test]
    fn ended_ist_terminal() {
        let mut call = CallState::incoming(P, MediaFlags::audio_only());
        call.apply(CallEvent::Hangup).unwrap();
        let err = call.apply(CallEvent::LocalAnswer { video: false }).unwrap_err();
        assert!(matches!(err, CallError::UngueltigerUebergang { .. }));
        assert!(call.apply(CallEvent::Hangup).is_err());
    }

    #[test]
    fn annahme_nur_beim_klingeln() {
        let mut call = CallState::outgoing(P, MediaFlags::audio_only());
        let err = call.apply(CallEvent::LocalAnswer { video: false }).unwrap_err();
        assert!(matches!(
            err,
            CallError::UngueltigerUebergang {
                phase: CallPhase::Proposed,
                ..
            }
        ));
        assert_eq!(call.phase, CallPhase::Proposed);
    }
}
