//! AudioPipeline – gemeinsamer Capture-Thread fuer alle Anrufe
//!
//! Die Pipeline besitzt das Eingabegeraet exklusiv, solange sie laeuft.
//! Der Capture-Thread oeffnet das Geraet selbst (Streams sind nicht
//! `Send`) und meldet Erfolg oder Fehler ueber einen Handshake-Kanal.
//! `stop()` setzt das Stop-Flag und wartet auf den Thread; danach wird
//! garantiert kein Frame mehr zugestellt.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::device::{AudioBackend, CaptureStream, FrameSink};
use crate::error::{AudioError, AudioResult};
use crate::format::AudioFormat;

/// Statistiken der Pipeline seit Erstellung
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Vom Geraet gelesene Frames
    pub frames_captured: u64,
    /// Erfolgreiche Zustellungen (ein Frame an n Peers zaehlt n-mal)
    pub frames_delivered: u64,
    pub read_errors: u64,
    pub send_errors: u64,
}

#[derive(Default)]
struct Zaehler {
    frames_captured: AtomicU64,
    frames_delivered: AtomicU64,
    read_errors: AtomicU64,
    send_errors: AtomicU64,
}

impl Zaehler {
    fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
        }
    }
}

/// Wie lange `start()` hoechstens auf das Oeffnen des Geraets wartet
pub const START_TIMEOUT: Duration = Duration::from_secs(2);

/// Laufender Capture-Thread
struct Worker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Prozessweite Audio-Pipeline
pub struct AudioPipeline {
    format: AudioFormat,
    backend: Arc<dyn AudioBackend>,
    sink: Arc<dyn FrameSink>,
    /// `Some` genau dann, wenn die Pipeline laeuft
    worker: Mutex<Option<Worker>>,
    zaehler: Arc<Zaehler>,
    start_timeout: Duration,
}

impl AudioPipeline {
    pub fn new(format: AudioFormat, backend: Arc<dyn AudioBackend>, sink: Arc<dyn FrameSink>) -> Self {
        Self {
            format,
            backend,
            sink,
            worker: Mutex::new(None),
            zaehler: Arc::new(Zaehler::default()),
            start_timeout: START_TIMEOUT,
        }
    }

    pub fn mit_start_timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout = timeout;
        self
    }

    pub fn format(&self) -> &AudioFormat {
        &self.format
    }

    /// Startet den Capture-Thread, no-op wenn er bereits laeuft
    ///
    /// Kann das Geraet das Format nicht liefern, wird der Thread wieder
    /// eingesammelt und der Fehler zurueckgegeben; die Pipeline bleibt aus.
    /// Meldet sich der Thread nicht innerhalb des Start-Timeouts, bekommt er
    /// das Stop-Signal und wird nicht mehr abgewartet.
    pub fn start(&self) -> AudioResult<()> {
        let mut slot = self.worker.lock();
        if slot.is_some() {
            debug!("AudioPipeline laeuft bereits");
            return Ok(());
        }
        self.format.validieren()?;

        let stop = Arc::new(AtomicBool::new(false));
        let (bereit_tx, bereit_rx) = bounded::<AudioResult<()>>(1);

        let format = self.format.clone();
        let backend = Arc::clone(&self.backend);
        let sink = Arc::clone(&self.sink);
        let zaehler = Arc::clone(&self.zaehler);
        let stop_thread = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("peercall-capture".to_string())
            .spawn(move || {
                let mut stream = match backend.open_capture(&format) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = bereit_tx.send(Err(e));
                        return;
                    }
                };
                let _ = bereit_tx.send(Ok(()));
                capture_loop(stream.as_mut(), sink.as_ref(), &format, &stop_thread, &zaehler);
                drop(stream);
                debug!("Capture-Geraet freigegeben");
            })?;

        match bereit_rx.recv_timeout(self.start_timeout) {
            Ok(Ok(())) => {
                *slot = Some(Worker { stop, handle });
                info!(format = %self.format, "AudioPipeline gestartet");
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                warn!(fehler = %e, "Capture-Geraet konnte nicht geoeffnet werden");
                Err(e)
            }
            Err(RecvTimeoutError::Timeout) => {
                // Thread beendet sich selbst, sobald das Oeffnen zurueckkehrt
                stop.store(true, Ordering::Release);
                drop(handle);
                error!(timeout = ?self.start_timeout, "Capture-Geraet meldet sich nicht");
                Err(AudioError::StartZeitueberschreitung(self.start_timeout))
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
                error!("Capture-Thread ohne Rueckmeldung beendet");
                Err(AudioError::ThreadAbgebrochen)
            }
        }
    }

    /// Stoppt den Capture-Thread, no-op wenn er nicht laeuft
    ///
    /// Blockiert bis der Thread beendet und das Geraet freigegeben ist
    /// (hoechstens ein Poll-Intervall plus ein Lesevorgang).
    pub fn stop(&self) {
        let mut slot = self.worker.lock();
        let Some(worker) = slot.take() else {
            return;
        };
        worker.stop.store(true, Ordering::Release);
        if worker.handle.join().is_err() {
            error!("Capture-Thread ist abgestuerzt");
        }
        info!("AudioPipeline gestoppt");
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Spielt einen Puffer ab, unabhaengig vom Capture-Geraet
    pub fn play(&self, samples: &[i16], channels: u8, sample_rate: u32) -> AudioResult<()> {
        if channels == 0 || sample_rate == 0 {
            return Err(AudioError::UngueltigesFormat(format!(
                "{channels} Kanaele bei {sample_rate} Hz"
            )));
        }
        if samples.is_empty() {
            return Ok(());
        }
        self.backend.play(samples, channels, sample_rate)
    }

    pub fn stats(&self) -> PipelineStats {
        self.zaehler.snapshot()
    }
}

impl Drop for AudioPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_loop(
    stream: &mut dyn CaptureStream,
    sink: &dyn FrameSink,
    format: &AudioFormat,
    stop: &AtomicBool,
    zaehler: &Zaehler,
) {
    let mut puffer = vec![0i16; format.frame_len()];
    let mut fehler_in_folge: u32 = 0;

    while !stop.load(Ordering::Acquire) {
        match stream.read_frame(&mut puffer) {
            Ok(0) => {}
            Ok(n) => {
                fehler_in_folge = 0;
                zaehler.frames_captured.fetch_add(1, Ordering::Relaxed);
                verteilen(&puffer[..n.min(puffer.len())], sink, format, zaehler);
            }
            Err(e) => {
                fehler_in_folge += 1;
                zaehler.read_errors.fetch_add(1, Ordering::Relaxed);
                if fehler_in_folge >= format.max_consecutive_read_errors {
                    error!(fehler = %e, in_folge = fehler_in_folge, "Capture liefert dauerhaft Fehler");
                    fehler_in_folge = 0;
                    // Zurueckhalten statt das Log zu fluten
                    thread::sleep(format.frame_duration());
                } else {
                    warn!(fehler = %e, "Lesefehler beim Capture");
                }
            }
        }
        thread::sleep(format.poll_interval);
    }
}

/// Stellt einen Frame allen Zielen zu; Fehler eines Peers betreffen andere nicht
fn verteilen(samples: &[i16], sink: &dyn FrameSink, format: &AudioFormat, zaehler: &Zaehler) {
    for peer in sink.audio_targets() {
        match sink.send_frame(peer, samples, format) {
            Ok(()) => {
                zaehler.frames_delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                zaehler.send_errors.fetch_add(1, Ordering::Relaxed);
                warn!(%peer, fehler = %e, "Audio-Frame konnte nicht gesendet werden");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peercall_core::{PeerId, TransportError};
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    /// Backend mit synthetischen Frames
    #[derive(Default)]
    struct TestBackend {
        offen: Arc<AtomicUsize>,
        geoeffnet: AtomicUsize,
        format_ablehnen: bool,
        oeffnen_verzoegerung: Duration,
        /// Jeder n-te Lesevorgang schlaegt fehl (0 = nie)
        fehler_alle: usize,
        immer_fehler: bool,
        abgespielt: Mutex<Vec<(usize, u8, u32)>>,
    }

    struct TestStream {
        offen: Arc<AtomicUsize>,
        zaehler: usize,
        fehler_alle: usize,
        immer_fehler: bool,
    }

    impl CaptureStream for TestStream {
        fn read_frame(&mut self, buf: &mut [i16]) -> AudioResult<usize> {
            self.zaehler += 1;
            if self.immer_fehler || (self.fehler_alle > 0 && self.zaehler % self.fehler_alle == 0) {
                return Err(AudioError::Lesefehler("Geraet weg".into()));
            }
            buf.fill(self.zaehler as i16);
            Ok(buf.len())
        }
    }

    impl Drop for TestStream {
        fn drop(&mut self) {
            self.offen.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl AudioBackend for TestBackend {
        fn open_capture(&self, format: &AudioFormat) -> AudioResult<Box<dyn CaptureStream>> {
            thread::sleep(self.oeffnen_verzoegerung);
            if self.format_ablehnen {
                return Err(AudioError::NichtUnterstuetztesFormat(format.to_string()));
            }
            self.geoeffnet.fetch_add(1, Ordering::SeqCst);
            self.offen.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(TestStream {
                offen: Arc::clone(&self.offen),
                zaehler: 0,
                fehler_alle: self.fehler_alle,
                immer_fehler: self.immer_fehler,
            }))
        }

        fn play(&self, samples: &[i16], channels: u8, sample_rate: u32) -> AudioResult<()> {
            self.abgespielt.lock().push((samples.len(), channels, sample_rate));
            Ok(())
        }
    }

    /// Senke mit fester Zielliste; Peer 666 schlaegt immer fehl
    #[derive(Default)]
    struct TestSink {
        ziele: Mutex<Vec<PeerId>>,
        empfangen: Mutex<Vec<(PeerId, usize)>>,
    }

    impl FrameSink for TestSink {
        fn audio_targets(&self) -> Vec<PeerId> {
            self.ziele.lock().clone()
        }

        fn send_frame(
            &self,
            peer: PeerId,
            samples: &[i16],
            _format: &AudioFormat,
        ) -> Result<(), TransportError> {
            if peer == PeerId(666) {
                return Err(TransportError::PeerNichtVerbunden(peer));
            }
            self.empfangen.lock().push((peer, samples.len()));
            Ok(())
        }
    }

    fn schnelles_format() -> AudioFormat {
        AudioFormat {
            poll_interval: Duration::from_millis(1),
            ..Default::default()
        }
    }

    fn warten_bis(bedingung: impl Fn() -> bool) {
        let ende = Instant::now() + Duration::from_secs(5);
        while !bedingung() {
            assert!(Instant::now() < ende, "Zeitueberschreitung beim Warten");
            thread::sleep(Duration::from_millis(2));
        }
    }

    fn pipeline(backend: Arc<TestBackend>, sink: Arc<TestSink>) -> AudioPipeline {
        AudioPipeline::new(schnelles_format(), backend, sink)
    }

    #[test]
    fn start_und_stop_sind_idempotent() {
        let backend = Arc::new(TestBackend::default());
        let p = pipeline(backend.clone(), Arc::new(TestSink::default()));

        assert!(!p.is_running());
        p.start().unwrap();
        p.start().unwrap();
        assert!(p.is_running());
        assert_eq!(backend.geoeffnet.load(Ordering::SeqCst), 1);

        p.stop();
        p.stop();
        assert!(!p.is_running());
        assert_eq!(backend.offen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn frames_gehen_an_alle_ziele() {
        let sink = Arc::new(TestSink::default());
        sink.ziele.lock().extend([PeerId(1), PeerId(2)]);
        let p = pipeline(Arc::new(TestBackend::default()), sink.clone());

        p.start().unwrap();
        warten_bis(|| p.stats().frames_delivered >= 4);
        p.stop();

        let empfangen = sink.empfangen.lock();
        assert!(empfangen.iter().any(|(peer, _)| *peer == PeerId(1)));
        assert!(empfangen.iter().any(|(peer, _)| *peer == PeerId(2)));
        assert!(empfangen.iter().all(|(_, n)| *n == 480));
    }

    #[test]
    fn kein_frame_nach_stop() {
        let sink = Arc::new(TestSink::default());
        sink.ziele.lock().push(PeerId(1));
        let p = pipeline(Arc::new(TestBackend::default()), sink.clone());

        p.start().unwrap();
        warten_bis(|| !sink.empfangen.lock().is_empty());
        p.stop();

        let anzahl = sink.empfangen.lock().len();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(sink.empfangen.lock().len(), anzahl);
    }

    #[test]
    fn sendefehler_eines_peers_stoppt_andere_nicht() {
        let sink = Arc::new(TestSink::default());
        sink.ziele.lock().extend([PeerId(666), PeerId(7)]);
        let p = pipeline(Arc::new(TestBackend::default()), sink.clone());

        p.start().unwrap();
        warten_bis(|| p.stats().frames_delivered >= 3);
        p.stop();

        let stats = p.stats();
        assert!(stats.send_errors >= 3);
        assert!(sink.empfangen.lock().iter().all(|(peer, _)| *peer == PeerId(7)));
    }

    #[test]
    fn lesefehler_beenden_den_thread_nicht() {
        let backend = Arc::new(TestBackend {
            fehler_alle: 2,
            ..Default::default()
        });
        let sink = Arc::new(TestSink::default());
        sink.ziele.lock().push(PeerId(1));
        let p = pipeline(backend, sink);

        p.start().unwrap();
        warten_bis(|| p.stats().read_errors >= 3 && p.stats().frames_captured >= 3);
        assert!(p.is_running());
        p.stop();
    }

    #[test]
    fn dauerhafte_lesefehler_werden_eskaliert() {
        let backend = Arc::new(TestBackend {
            immer_fehler: true,
            ..Default::default()
        });
        let p = pipeline(backend, Arc::new(TestSink::default()));

        p.start().unwrap();
        warten_bis(|| p.stats().read_errors >= 4);
        assert!(p.is_running());
        p.stop();
        assert_eq!(p.stats().frames_captured, 0);
    }

    #[test]
    fn nicht_unterstuetztes_format_laesst_pipeline_aus() {
        let backend = Arc::new(TestBackend {
            format_ablehnen: true,
            ..Default::default()
        });
        let p = pipeline(backend, Arc::new(TestSink::default()));

        let err = p.start().unwrap_err();
        assert!(matches!(err, AudioError::NichtUnterstuetztesFormat(_)));
        assert!(!p.is_running());
        // stop auf gestoppter Pipeline ist no-op
        p.stop();
    }

    #[test]
    fn haengendes_geraet_blockiert_start_nicht() {
        let backend = Arc::new(TestBackend {
            oeffnen_verzoegerung: Duration::from_millis(300),
            ..Default::default()
        });
        let p = pipeline(backend.clone(), Arc::new(TestSink::default()))
            .mit_start_timeout(Duration::from_millis(20));

        let beginn = Instant::now();
        let err = p.start().unwrap_err();
        assert!(matches!(err, AudioError::StartZeitueberschreitung(_)));
        assert!(beginn.elapsed() < Duration::from_millis(250));
        assert!(!p.is_running());

        // Der verspaetete Thread gibt das Geraet selbst wieder frei
        warten_bis(|| backend.geoeffnet.load(Ordering::SeqCst) == 1);
        warten_bis(|| backend.offen.load(Ordering::SeqCst) == 0);
    }

    #[test]
    fn neustart_nach_stop() {
        let backend = Arc::new(TestBackend::default());
        let p = pipeline(backend.clone(), Arc::new(TestSink::default()));

        p.start().unwrap();
        p.stop();
        p.start().unwrap();
        assert!(p.is_running());
        assert_eq!(backend.geoeffnet.load(Ordering::SeqCst), 2);
        drop(p);
        assert_eq!(backend.offen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn play_delegiert_an_backend() {
        let backend = Arc::new(TestBackend::default());
        let p = pipeline(backend.clone(), Arc::new(TestSink::default()));

        p.play(&[0i16; 960], 2, 48000).unwrap();
        p.play(&[], 1, 8000).unwrap();
        assert!(p.play(&[1, 2], 0, 8000).is_err());

        assert_eq!(backend.abgespielt.lock().as_slice(), [(960, 2, 48000)]);
        assert!(!p.is_running());
    }
}
