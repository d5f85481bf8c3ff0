//! Loopback-Transport fuer lokale Laeufe
//!
//! Simuliert genau einen Freund, den Echo-Peer. Er nimmt Anrufe sofort
//! an, schickt empfangene Audio-Frames zurueck und spiegelt Custom-Packets
//! unveraendert. Ereignisse landen in zwei Warteschlangen, die wie die
//! beiden Iterations-Loops der echten Bibliothek abgefragt werden.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, info};

use peercall_core::{
    AvTransport, Bitrates, CallControl, CallStateFlags, ChannelKind, EventSource, PacketTransport,
    PeerId, Result, TransportError, TransportEvent,
};

/// Der einzige bekannte Freund
pub const ECHO_PEER: PeerId = PeerId(1);

/// Maximale Groesse eines Custom-Packets
pub const MAX_PAKET_GROESSE: usize = 1373;

/// Ereignis-Warteschlange fuer einen Iterations-Loop
pub struct LoopbackQueue {
    rx: Receiver<TransportEvent>,
    interval: Duration,
}

impl EventSource for LoopbackQueue {
    fn iterate(&self) -> Vec<TransportEvent> {
        self.rx.try_iter().collect()
    }

    fn iteration_interval(&self) -> Duration {
        self.interval
    }
}

#[derive(Default)]
struct Anrufe {
    /// Beim Echo-Peer klingelnd, von uns noch nicht angenommen
    eingehend: HashSet<PeerId>,
    verbunden: HashSet<PeerId>,
}

pub struct LoopbackTransport {
    transport_tx: Sender<TransportEvent>,
    av_tx: Sender<TransportEvent>,
    anrufe: Mutex<Anrufe>,
}

impl LoopbackTransport {
    /// Erstellt den Transport und die beiden Ereignisquellen (Transport, A/V)
    pub fn new(
        iteration_interval: Duration,
        av_iteration_interval: Duration,
    ) -> (Arc<Self>, Arc<LoopbackQueue>, Arc<LoopbackQueue>) {
        let (transport_tx, transport_rx) = unbounded();
        let (av_tx, av_rx) = unbounded();
        let transport = Arc::new(Self {
            transport_tx,
            av_tx,
            anrufe: Mutex::new(Anrufe::default()),
        });
        let transport_queue = Arc::new(LoopbackQueue {
            rx: transport_rx,
            interval: iteration_interval,
        });
        let av_queue = Arc::new(LoopbackQueue {
            rx: av_rx,
            interval: av_iteration_interval,
        });
        (transport, transport_queue, av_queue)
    }

    /// Der Echo-Peer ruft uns an
    pub fn simulate_incoming_call(&self, video: bool) {
        self.anrufe.lock().eingehend.insert(ECHO_PEER);
        info!(peer = %ECHO_PEER, video, "Echo-Peer ruft an");
        self.av(TransportEvent::CallRequest {
            peer: ECHO_PEER,
            audio: true,
            video,
        });
    }

    /// Der Echo-Peer legt auf
    pub fn simulate_hangup(&self) {
        let mut anrufe = self.anrufe.lock();
        let bekannt = anrufe.verbunden.remove(&ECHO_PEER) | anrufe.eingehend.remove(&ECHO_PEER);
        drop(anrufe);
        if bekannt {
            self.av(TransportEvent::CallState {
                peer: ECHO_PEER,
                flags: CallStateFlags::FINISHED,
            });
        }
    }

    pub fn is_connected(&self, peer: PeerId) -> bool {
        self.anrufe.lock().verbunden.contains(&peer)
    }

    fn av(&self, event: TransportEvent) {
        // Empfaenger lebt so lange wie der Client
        let _ = self.av_tx.send(event);
    }

    fn bekannt(peer: PeerId) -> Result<()> {
        if peer == ECHO_PEER {
            Ok(())
        } else {
            Err(TransportError::PeerNichtGefunden(peer))
        }
    }

    fn medien_flags(video: bool) -> CallStateFlags {
        let audio = CallStateFlags::SENDING_AUDIO | CallStateFlags::ACCEPTING_AUDIO;
        if video {
            audio | CallStateFlags::SENDING_VIDEO | CallStateFlags::ACCEPTING_VIDEO
        } else {
            audio
        }
    }

    fn spiegeln(&self, peer: PeerId, kind: ChannelKind, data: &[u8]) -> Result<()> {
        Self::bekannt(peer)?;
        if data.len() > MAX_PAKET_GROESSE {
            return Err(TransportError::PaketZuGross(data.len()));
        }
        self.transport_tx
            .send(TransportEvent::CustomPacket {
                peer,
                kind,
                data: data.to_vec(),
            })
            .map_err(|_| TransportError::Warteschlange)
    }
}

impl AvTransport for LoopbackTransport {
    fn call(&self, peer: PeerId, bitrates: Bitrates) -> Result<()> {
        Self::bekannt(peer)?;
        {
            let mut anrufe = self.anrufe.lock();
            if anrufe.verbunden.contains(&peer) {
                return Err(TransportError::AnrufBereitsAktiv(peer));
            }
            anrufe.verbunden.insert(peer);
        }
        debug!(%peer, ?bitrates, "Echo-Peer nimmt an");
        self.av(TransportEvent::CallState {
            peer,
            flags: Self::medien_flags(bitrates.video_kbps > 0),
        });
        Ok(())
    }

    fn answer(&self, peer: PeerId, bitrates: Bitrates) -> Result<()> {
        Self::bekannt(peer)?;
        {
            let mut anrufe = self.anrufe.lock();
            if !anrufe.eingehend.remove(&peer) {
                return Err(TransportError::KeinAnrufAktiv(peer));
            }
            anrufe.verbunden.insert(peer);
        }
        self.av(TransportEvent::CallState {
            peer,
            flags: Self::medien_flags(bitrates.video_kbps > 0),
        });
        Ok(())
    }

    fn call_control(&self, peer: PeerId, control: CallControl) -> Result<()> {
        Self::bekannt(peer)?;
        let mut anrufe = self.anrufe.lock();
        if control == CallControl::Cancel {
            let bekannt = anrufe.verbunden.remove(&peer) | anrufe.eingehend.remove(&peer);
            return if bekannt {
                Ok(())
            } else {
                Err(TransportError::KeinAnrufAktiv(peer))
            };
        }
        if !anrufe.verbunden.contains(&peer) {
            return Err(TransportError::KeinAnrufAktiv(peer));
        }
        debug!(%peer, ?control, "Steuersignal an Echo-Peer");
        Ok(())
    }

    fn send_audio_frame(
        &self,
        peer: PeerId,
        samples: &[i16],
        sample_count: usize,
        channels: u8,
        sample_rate: u32,
    ) -> Result<()> {
        if !self.is_connected(peer) {
            return Err(TransportError::KeinAnrufAktiv(peer));
        }
        let laenge = (sample_count * channels as usize).min(samples.len());
        self.av(TransportEvent::AudioFrame {
            peer,
            samples: samples[..laenge].to_vec(),
            channels,
            sample_rate,
        });
        Ok(())
    }
}

impl PacketTransport for LoopbackTransport {
    fn send_lossless_packet(&self, peer: PeerId, data: &[u8]) -> Result<()> {
        self.spiegeln(peer, ChannelKind::Lossless, data)
    }

    fn send_lossy_packet(&self, peer: PeerId, data: &[u8]) -> Result<()> {
        self.spiegeln(peer, ChannelKind::Lossy, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aufbauen() -> (Arc<LoopbackTransport>, Arc<LoopbackQueue>, Arc<LoopbackQueue>) {
        LoopbackTransport::new(Duration::from_millis(1), Duration::from_millis(1))
    }

    #[test]
    fn anruf_wird_angenommen() {
        let (t, _, av) = aufbauen();
        t.call(ECHO_PEER, Bitrates::new(32, 0)).unwrap();
        let events = av.iterate();
        assert_eq!(
            events,
            vec![TransportEvent::CallState {
                peer: ECHO_PEER,
                flags: CallStateFlags::SENDING_AUDIO | CallStateFlags::ACCEPTING_AUDIO,
            }]
        );
        assert!(matches!(
            t.call(ECHO_PEER, Bitrates::new(32, 0)),
            Err(TransportError::AnrufBereitsAktiv(_))
        ));
    }

    #[test]
    fn unbekannter_peer() {
        let (t, _, _) = aufbauen();
        assert!(matches!(
            t.call(PeerId(5), Bitrates::new(32, 0)),
            Err(TransportError::PeerNichtGefunden(_))
        ));
        assert!(t.send_lossless_packet(PeerId(5), b"x").is_err());
    }

    #[test]
    fn audio_wird_zurueckgeschickt() {
        let (t, _, av) = aufbauen();
        assert!(t.send_audio_frame(ECHO_PEER, &[1, 2], 2, 1, 8000).is_err());

        t.call(ECHO_PEER, Bitrates::new(32, 0)).unwrap();
        av.iterate();
        t.send_audio_frame(ECHO_PEER, &[1, 2, 3], 3, 1, 8000).unwrap();
        assert_eq!(
            av.iterate(),
            vec![TransportEvent::AudioFrame {
                peer: ECHO_PEER,
                samples: vec![1, 2, 3],
                channels: 1,
                sample_rate: 8000,
            }]
        );
    }

    #[test]
    fn pakete_werden_gespiegelt() {
        let (t, queue, _) = aufbauen();
        t.send_lossy_packet(ECHO_PEER, b"\xcbfoox").unwrap();
        let events = queue.iterate();
        assert_eq!(
            events,
            vec![TransportEvent::CustomPacket {
                peer: ECHO_PEER,
                kind: ChannelKind::Lossy,
                data: b"\xcbfoox".to_vec(),
            }]
        );

        let gross = vec![0u8; MAX_PAKET_GROESSE + 1];
        assert!(matches!(
            t.send_lossless_packet(ECHO_PEER, &gross),
            Err(TransportError::PaketZuGross(_))
        ));
    }

    #[test]
    fn eingehender_anruf_und_annahme() {
        let (t, _, av) = aufbauen();
        assert!(t.answer(ECHO_PEER, Bitrates::new(32, 5000)).is_err());

        t.simulate_incoming_call(true);
        assert!(matches!(
            av.iterate().as_slice(),
            [TransportEvent::CallRequest { video: true, .. }]
        ));
        t.answer(ECHO_PEER, Bitrates::new(32, 5000)).unwrap();
        assert!(t.is_connected(ECHO_PEER));

        t.simulate_hangup();
        let events = av.iterate();
        assert!(matches!(
            events.last(),
            Some(TransportEvent::CallState { flags, .. }) if flags.ist_beendet()
        ));
        assert!(!t.is_connected(ECHO_PEER));
    }

    #[test]
    fn cancel_beendet() {
        let (t, _, _) = aufbauen();
        t.call(ECHO_PEER, Bitrates::new(32, 0)).unwrap();
        t.call_control(ECHO_PEER, CallControl::Pause).unwrap();
        t.call_control(ECHO_PEER, CallControl::Cancel).unwrap();
        assert!(!t.is_connected(ECHO_PEER));
        assert!(t.call_control(ECHO_PEER, CallControl::Cancel).is_err());
    }
}
