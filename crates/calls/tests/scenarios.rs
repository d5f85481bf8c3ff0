//! Ablaufszenarien des Session-Managers mit In-Memory-Transport und -Audio

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use peercall_audio::{AudioBackend, AudioError, AudioFormat, AudioResult, CaptureStream};
use peercall_calls::{CallConfig, CallPhase, CallSessionManager};
use peercall_core::{AvTransport, Bitrates, CallControl, CallStateFlags, PeerId, TransportError};

#[derive(Default)]
struct AufzeichnenderTransport {
    controls: Mutex<Vec<(PeerId, CallControl)>>,
    frames: Mutex<Vec<(PeerId, usize, u8, u32)>>,
    nicht_verbunden: Mutex<Vec<PeerId>>,
}

impl AvTransport for AufzeichnenderTransport {
    fn call(&self, _peer: PeerId, _bitrates: Bitrates) -> peercall_core::Result<()> {
        Ok(())
    }

    fn answer(&self, _peer: PeerId, _bitrates: Bitrates) -> peercall_core::Result<()> {
        Ok(())
    }

    fn call_control(&self, peer: PeerId, control: CallControl) -> peercall_core::Result<()> {
        self.controls.lock().push((peer, control));
        Ok(())
    }

    fn send_audio_frame(
        &self,
        peer: PeerId,
        _samples: &[i16],
        sample_count: usize,
        channels: u8,
        sample_rate: u32,
    ) -> peercall_core::Result<()> {
        if self.nicht_verbunden.lock().contains(&peer) {
            return Err(TransportError::PeerNichtVerbunden(peer));
        }
        self.frames.lock().push((peer, sample_count, channels, sample_rate));
        Ok(())
    }
}

struct Sinus(u32);

impl CaptureStream for Sinus {
    fn read_frame(&mut self, buf: &mut [i16]) -> AudioResult<usize> {
        for s in buf.iter_mut() {
            self.0 = self.0.wrapping_add(1);
            *s = ((self.0 % 64) as i16 - 32) * 256;
        }
        Ok(buf.len())
    }
}

#[derive(Default)]
struct InMemoryAudio {
    geoeffnet: AtomicUsize,
    ohne_geraet: bool,
}

impl AudioBackend for InMemoryAudio {
    fn open_capture(&self, format: &AudioFormat) -> AudioResult<Box<dyn CaptureStream>> {
        if self.ohne_geraet {
            return Err(AudioError::NichtUnterstuetztesFormat(format.to_string()));
        }
        self.geoeffnet.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(Sinus(0)))
    }

    fn play(&self, _samples: &[i16], _channels: u8, _sample_rate: u32) -> AudioResult<()> {
        Ok(())
    }
}

fn format() -> AudioFormat {
    AudioFormat {
        poll_interval: Duration::from_millis(1),
        ..Default::default()
    }
}

fn aufbauen(audio: InMemoryAudio) -> (Arc<CallSessionManager>, Arc<AufzeichnenderTransport>) {
    let transport = Arc::new(AufzeichnenderTransport::default());
    let manager = CallSessionManager::new(
        transport.clone(),
        Arc::new(audio),
        format(),
        CallConfig::default(),
    );
    (Arc::new(manager), transport)
}

fn warten_bis(bedingung: impl Fn() -> bool) {
    let ende = Instant::now() + Duration::from_secs(5);
    while !bedingung() {
        assert!(Instant::now() < ende, "Zeitueberschreitung beim Warten");
        thread::sleep(Duration::from_millis(2));
    }
}

fn laeuft_genau_wenn_nicht_leer(m: &CallSessionManager) {
    assert_eq!(m.is_audio_running(), !m.active_calls().is_empty());
}

#[test]
fn szenario_eingehend_annehmen_beenden() {
    let (m, transport) = aufbauen(InMemoryAudio::default());
    let x = PeerId(10);

    m.on_call_request(x, true, false);
    assert_eq!(m.call(x).map(|c| c.phase), Some(CallPhase::Ringing));
    laeuft_genau_wenn_nicht_leer(&m);

    m.answer(x).unwrap();
    assert_eq!(m.call(x).map(|c| c.phase), Some(CallPhase::ActiveAudio));

    warten_bis(|| !transport.frames.lock().is_empty());
    let (peer, sample_count, channels, rate) = transport.frames.lock()[0];
    assert_eq!((peer, sample_count, channels, rate), (x, 480, 1, 8000));

    m.on_call_state(x, CallStateFlags::FINISHED);
    assert!(m.call(x).is_none());
    assert!(!m.is_audio_running());
    laeuft_genau_wenn_nicht_leer(&m);
}

#[test]
fn szenario_zwei_anrufe_einer_endet() {
    let (m, _) = aufbauen(InMemoryAudio::default());

    m.on_call_request(PeerId(1), true, false);
    m.on_call_request(PeerId(2), true, false);
    m.answer(PeerId(1)).unwrap();
    m.answer(PeerId(2)).unwrap();
    assert!(m.is_audio_running());

    m.on_call_state(PeerId(1), CallStateFlags::FINISHED);
    assert!(m.is_audio_running());
    laeuft_genau_wenn_nicht_leer(&m);

    m.stop_call(PeerId(2), false).unwrap();
    assert!(!m.is_audio_running());
    laeuft_genau_wenn_nicht_leer(&m);
}

#[test]
fn frames_nur_an_aktive_anrufe_mit_audio() {
    let (m, transport) = aufbauen(InMemoryAudio::default());

    m.start_call(PeerId(1), true, false).unwrap();
    m.on_call_request(PeerId(2), true, false);
    m.on_call_request(PeerId(3), false, true);
    m.answer(PeerId(3)).unwrap();
    m.on_call_state(PeerId(1), CallStateFlags::ACCEPTING_AUDIO | CallStateFlags::SENDING_AUDIO);

    warten_bis(|| transport.frames.lock().len() >= 5);
    m.shutdown();

    let frames = transport.frames.lock();
    assert!(frames.iter().all(|(peer, ..)| *peer == PeerId(1)));
}

#[test]
fn accepting_audio_schaltet_versand_frei() {
    let (m, transport) = aufbauen(InMemoryAudio::default());

    m.on_call_request(PeerId(3), false, true);
    m.answer(PeerId(3)).unwrap();
    m.on_call_state(PeerId(3), CallStateFlags::ACCEPTING_AUDIO);

    warten_bis(|| !transport.frames.lock().is_empty());
    assert!(m.call(PeerId(3)).is_some_and(|c| c.media.audio));
}

#[test]
fn defekter_peer_blockiert_andere_nicht() {
    let (m, transport) = aufbauen(InMemoryAudio::default());
    transport.nicht_verbunden.lock().push(PeerId(1));

    for peer in [PeerId(1), PeerId(2)] {
        m.on_call_request(peer, true, false);
        m.answer(peer).unwrap();
    }

    warten_bis(|| transport.frames.lock().len() >= 3);
    assert!(m.audio_stats().send_errors >= 1);
    assert!(transport
        .frames
        .lock()
        .iter()
        .all(|(peer, ..)| *peer == PeerId(2)));
}

#[test]
fn ohne_geraet_laeuft_anruf_weiter() {
    let (m, transport) = aufbauen(InMemoryAudio {
        ohne_geraet: true,
        ..Default::default()
    });

    m.start_call(PeerId(1), true, false).unwrap();
    assert!(m.call(PeerId(1)).is_some());
    assert!(!m.is_audio_running());

    m.stop_call(PeerId(1), false).unwrap();
    assert_eq!(
        transport.controls.lock().as_slice(),
        [(PeerId(1), CallControl::Cancel)]
    );
}

#[test]
fn gleichzeitige_ereignisse_halten_invariante() {
    let (m, _) = aufbauen(InMemoryAudio::default());

    let handles: Vec<_> = (0..4u32)
        .map(|t| {
            let m = Arc::clone(&m);
            thread::spawn(move || {
                for i in 0..25u32 {
                    let peer = PeerId(t * 100 + i % 3);
                    m.on_call_request(peer, true, false);
                    let _ = m.answer(peer);
                    if i % 2 == 0 {
                        m.on_call_state(peer, CallStateFlags::FINISHED);
                    } else {
                        let _ = m.stop_call(peer, false);
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert!(m.active_calls().is_empty());
    assert!(!m.is_audio_running());
}
