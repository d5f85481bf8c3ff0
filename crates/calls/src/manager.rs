//! CallSessionManager – einziger Einstiegspunkt fuer Anrufe
//!
//! Wird von Benutzeraktionen (Anrufen, Annehmen, Auflegen) und von den
//! Ereignissen der A/V-Bibliothek getrieben. Haelt die Anruftabelle und
//! steuert die Audio-Pipeline: sie laeuft genau dann, wenn die Tabelle
//! nicht leer ist.
//!
//! Sperr-Reihenfolge: erst `lifecycle`, dann die Tabelle. Der
//! Capture-Thread nimmt nur die Tabellensperre, deshalb wird
//! `AudioPipeline::stop()` immer ohne Tabellensperre aufgerufen.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use peercall_audio::{AudioBackend, AudioFormat, AudioPipeline, PipelineStats};
use peercall_core::{AvTransport, CallControl, CallStateFlags, PeerId};

use crate::config::CallConfig;
use crate::error::{CallError, Result};
use crate::fanout::CallFanout;
use crate::state::{CallEvent, CallPhase, CallState, MediaFlags};
use crate::table::CallTable;

pub struct CallSessionManager {
    transport: Arc<dyn AvTransport>,
    table: Arc<Mutex<CallTable>>,
    pipeline: AudioPipeline,
    config: CallConfig,
    /// Serialisiert Tabellenaenderungen mit dem Pipeline-Abgleich
    lifecycle: Mutex<()>,
    beendet: AtomicBool,
}

impl CallSessionManager {
    pub fn new(
        transport: Arc<dyn AvTransport>,
        backend: Arc<dyn AudioBackend>,
        format: AudioFormat,
        config: CallConfig,
    ) -> Self {
        let table = Arc::new(Mutex::new(CallTable::new()));
        let fanout = Arc::new(CallFanout::new(Arc::clone(&table), Arc::clone(&transport)));
        Self {
            transport,
            table,
            pipeline: AudioPipeline::new(format, backend, fanout),
            config,
            lifecycle: Mutex::new(()),
            beendet: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &CallConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Benutzeraktionen
    // -----------------------------------------------------------------------

    /// Ruft einen Peer an
    pub fn start_call(&self, peer: PeerId, audio: bool, video: bool) -> Result<()> {
        let media = MediaFlags::new(audio, video);
        if media.is_empty() {
            return Err(CallError::KeineMedien);
        }
        let _lifecycle = self.lifecycle_sperren()?;

        if self.table.lock().contains(peer) {
            return Err(CallError::AnrufBereitsAktiv(peer));
        }
        self.transport
            .call(peer, self.config.call_bitrates(audio, video))?;
        self.table.lock().insert(CallState::outgoing(peer, media));
        info!(%peer, audio, video, "Anruf gestartet");

        self.pipeline_abgleichen();
        Ok(())
    }

    /// Nimmt einen klingelnden Anruf an
    ///
    /// Die Annahme folgt immer der konfigurierten Richtlinie, nicht den
    /// angefragten Medien.
    pub fn answer(&self, peer: PeerId) -> Result<()> {
        let _lifecycle = self.lifecycle_sperren()?;
        self.annehmen(peer)
    }

    /// Lehnt einen eingehenden Anruf ab
    pub fn decline(&self, peer: PeerId) -> Result<()> {
        let phase = self.table.lock().get(peer).map(|c| c.phase);
        if phase == Some(CallPhase::Ringing) {
            info!(%peer, "Anruf abgelehnt");
        }
        self.stop_call(peer, false)
    }

    /// Beendet einen Anruf
    ///
    /// Lokal (`by_remote == false`) wird immer `Cancel` gesendet, auch wenn
    /// der Anruf nie angenommen wurde. Schlaegt das Senden fehl, wird der
    /// Anruf lokal trotzdem abgebaut und der Fehler danach gemeldet.
    pub fn stop_call(&self, peer: PeerId, by_remote: bool) -> Result<()> {
        let _lifecycle = self.lifecycle.lock();

        if !self.table.lock().contains(peer) {
            return Err(CallError::KeinAnruf(peer));
        }

        let gesendet = if by_remote {
            Ok(())
        } else {
            self.transport.call_control(peer, CallControl::Cancel)
        };

        // Kann inzwischen durch ein FINISHED entfernt worden sein
        if let Err(e) = self.table.lock().apply(peer, CallEvent::Hangup) {
            debug!(%peer, fehler = %e, "Anruf war bereits beendet");
        }
        info!(%peer, by_remote, "Anruf beendet");
        self.pipeline_abgleichen();

        gesendet.map_err(|e| {
            warn!(%peer, fehler = %e, "Cancel konnte nicht gesendet werden");
            CallError::from(e)
        })
    }

    /// Sendet ein Steuersignal fuer einen aktiven Anruf
    ///
    /// `Cancel` beendet den Anruf wie [`Self::stop_call`] und ist auch vor
    /// der Annahme erlaubt; alle anderen Signale nur in einer aktiven Phase.
    pub fn control(&self, peer: PeerId, control: CallControl) -> Result<()> {
        if control == CallControl::Cancel {
            return self.stop_call(peer, false);
        }
        let _lifecycle = self.lifecycle_sperren()?;
        let phase = self
            .table
            .lock()
            .get(peer)
            .map(|c| c.phase)
            .ok_or(CallError::KeinAnruf(peer))?;
        if !phase.is_active() {
            return Err(CallError::UngueltigerUebergang {
                peer,
                phase,
                ereignis: format!("{control:?}"),
            });
        }
        self.transport.call_control(peer, control)?;
        debug!(%peer, ?control, "Steuersignal gesendet");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Ereignisse der A/V-Bibliothek
    // -----------------------------------------------------------------------

    /// Eingehender Anruf
    ///
    /// Ein bestehender Eintrag fuer denselben Peer wird ersetzt; die
    /// A/V-Bibliothek ist die Quelle der Wahrheit.
    pub fn on_call_request(&self, peer: PeerId, audio: bool, video: bool) {
        let Ok(lifecycle) = self.lifecycle_sperren() else {
            debug!(%peer, "Anruf nach Shutdown ignoriert");
            return;
        };

        let alt = self
            .table
            .lock()
            .insert(CallState::incoming(peer, MediaFlags::new(audio, video)));
        if let Some(alt) = alt {
            debug!(%peer, phase = %alt.phase, "Bestehender Anruf durch neue Anfrage ersetzt");
        }
        info!(%peer, audio, video, "Eingehender Anruf");
        self.pipeline_abgleichen();

        if self.config.auto_answer {
            if let Err(e) = self.annehmen(peer) {
                warn!(%peer, fehler = %e, "Automatische Annahme fehlgeschlagen");
            }
        }
        drop(lifecycle);
    }

    /// Zustandsaenderung eines Anrufs
    pub fn on_call_state(&self, peer: PeerId, flags: CallStateFlags) {
        let Ok(_lifecycle) = self.lifecycle_sperren() else {
            return;
        };

        let ergebnis = self.table.lock().apply(peer, CallEvent::RemoteState(flags));
        match ergebnis {
            Ok(CallPhase::Ended) => {
                info!(%peer, flags = flags.bits(), "Anruf von Gegenseite beendet");
                self.pipeline_abgleichen();
            }
            Ok(phase) => debug!(%peer, flags = flags.bits(), %phase, "Anrufzustand aktualisiert"),
            Err(CallError::KeinAnruf(_)) => {
                debug!(%peer, flags = flags.bits(), "Zustand fuer unbekannten Anruf ignoriert")
            }
            Err(e) => warn!(%peer, fehler = %e, "Anrufzustand nicht anwendbar"),
        }
    }

    /// Empfangener Audio-Frame; wird nur fuer laufende Anrufe abgespielt
    ///
    /// Blockiert fuer die Dauer des Frames, ohne Sperren zu halten.
    pub fn on_audio_frame(&self, peer: PeerId, samples: &[i16], channels: u8, sample_rate: u32) {
        if self.beendet.load(Ordering::Acquire) {
            return;
        }
        let aktiv = self
            .table
            .lock()
            .get(peer)
            .is_some_and(|c| c.phase.is_active());
        if !aktiv {
            debug!(%peer, "Audio-Frame ohne aktiven Anruf verworfen");
            return;
        }
        if let Err(e) = self.pipeline.play(samples, channels, sample_rate) {
            warn!(%peer, fehler = %e, "Audio-Frame konnte nicht abgespielt werden");
        }
    }

    // -----------------------------------------------------------------------
    // Abfragen
    // -----------------------------------------------------------------------

    pub fn active_calls(&self) -> Vec<CallState> {
        self.table.lock().snapshot()
    }

    pub fn call(&self, peer: PeerId) -> Option<CallState> {
        self.table.lock().get(peer).cloned()
    }

    pub fn is_audio_running(&self) -> bool {
        self.pipeline.is_running()
    }

    pub fn audio_stats(&self) -> PipelineStats {
        self.pipeline.stats()
    }

    pub fn is_shut_down(&self) -> bool {
        self.beendet.load(Ordering::Acquire)
    }

    /// Beendet alle Anrufe ohne die Gegenseiten zu benachrichtigen und
    /// stoppt die Audio-Pipeline. Danach werden Ereignisse ignoriert und
    /// neue Anrufe abgelehnt.
    pub fn shutdown(&self) {
        let _lifecycle = self.lifecycle.lock();
        if self.beendet.swap(true, Ordering::AcqRel) {
            return;
        }
        let beendet = self.table.lock().drain();
        self.pipeline.stop();
        info!(anrufe = beendet.len(), "Anrufverwaltung beendet");
    }

    // -----------------------------------------------------------------------
    // Intern
    // -----------------------------------------------------------------------

    fn lifecycle_sperren(&self) -> Result<MutexGuard<'_, ()>> {
        let guard = self.lifecycle.lock();
        if self.beendet.load(Ordering::Acquire) {
            return Err(CallError::Beendet);
        }
        Ok(guard)
    }

    /// Annahme; Aufrufer haelt die Lifecycle-Sperre
    fn annehmen(&self, peer: PeerId) -> Result<()> {
        let phase = self
            .table
            .lock()
            .get(peer)
            .map(|c| c.phase)
            .ok_or(CallError::KeinAnruf(peer))?;
        if phase != CallPhase::Ringing {
            return Err(CallError::UngueltigerUebergang {
                peer,
                phase,
                ereignis: "Annahme".into(),
            });
        }

        let policy = self.config.answer_policy();
        self.transport.answer(peer, policy.bitrates)?;
        let phase = self
            .table
            .lock()
            .apply(peer, CallEvent::LocalAnswer { video: policy.video })?;
        info!(%peer, %phase, "Anruf angenommen");
        Ok(())
    }

    /// Startet oder stoppt die Pipeline passend zur Tabelle
    ///
    /// Nur mit gehaltener Lifecycle-Sperre und freigegebener Tabellensperre
    /// aufrufen. Ein Geraetefehler bedeutet "kein lokales Audio", der
    /// Anruf laeuft weiter.
    fn pipeline_abgleichen(&self) {
        let leer = self.table.lock().is_empty();
        if leer {
            self.pipeline.stop();
        } else if let Err(e) = self.pipeline.start() {
            warn!(fehler = %e, "Audio nicht verfuegbar, Anruf laeuft ohne lokales Audio");
        }
    }
}

impl Drop for CallSessionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
