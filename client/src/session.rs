//! Session-Kontext
//!
//! Ein explizit konstruiertes Objekt statt globaler Zustaende: haelt den
//! Anruf-Manager, die Plugin-Registry und den Paket-Transport und bietet
//! die Operationen fuer UI/Konsole. Transport-Ereignisse laufen ueber
//! [`Session::handle_event`] zu Anruf-Manager oder Plugin-Registry.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use peercall_calls::{CallError, CallSessionManager, CallState};
use peercall_core::{CallControl, PacketTransport, PeerId, TransportEvent};
use peercall_plugin::{PluginError, PluginInfo, PluginRegistry, PluginSender};
use peercall_protocol::ShortName;

use crate::config::ClientConfig;

/// Konfigurationsdatei, in die die Aktivierungsmenge geschrieben wird
struct AktivierungsSpeicher {
    pfad: PathBuf,
    config: ClientConfig,
}

pub struct Session {
    calls: Arc<CallSessionManager>,
    plugins: Arc<PluginRegistry>,
    packets: Arc<dyn PacketTransport>,
    speicher: Mutex<Option<AktivierungsSpeicher>>,
}

impl Session {
    pub fn new(
        calls: Arc<CallSessionManager>,
        plugins: Arc<PluginRegistry>,
        packets: Arc<dyn PacketTransport>,
    ) -> Self {
        Self {
            calls,
            plugins,
            packets,
            speicher: Mutex::new(None),
        }
    }

    /// Schreibt die Aktivierungsmenge ab jetzt nach jedem Umschalten in `pfad`
    ///
    /// Die uebrigen Abschnitte kommen aus `config`.
    pub fn aktivierung_speichern_in(&self, pfad: impl Into<PathBuf>, config: ClientConfig) {
        *self.speicher.lock() = Some(AktivierungsSpeicher {
            pfad: pfad.into(),
            config,
        });
    }

    pub fn calls(&self) -> &CallSessionManager {
        &self.calls
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// Leitet ein Ereignis der Transport-Bibliothek weiter
    pub fn handle_event(&self, event: TransportEvent) {
        trace!(peer = %event.peer(), "Transport-Ereignis");
        match event {
            TransportEvent::CallRequest { peer, audio, video } => {
                self.calls.on_call_request(peer, audio, video)
            }
            TransportEvent::CallState { peer, flags } => self.calls.on_call_state(peer, flags),
            TransportEvent::AudioFrame {
                peer,
                samples,
                channels,
                sample_rate,
            } => self.calls.on_audio_frame(peer, &samples, channels, sample_rate),
            TransportEvent::CustomPacket { peer, kind, data } => {
                self.plugins.handle_packet(kind, &data, peer)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Anrufe
    // -----------------------------------------------------------------------

    pub fn start_call(&self, peer: PeerId, audio: bool, video: bool) -> Result<(), CallError> {
        self.calls.start_call(peer, audio, video)
    }

    pub fn answer(&self, peer: PeerId) -> Result<(), CallError> {
        self.calls.answer(peer)
    }

    pub fn decline(&self, peer: PeerId) -> Result<(), CallError> {
        self.calls.decline(peer)
    }

    pub fn stop_call(&self, peer: PeerId, by_remote: bool) -> Result<(), CallError> {
        self.calls.stop_call(peer, by_remote)
    }

    pub fn call_control(&self, peer: PeerId, control: CallControl) -> Result<(), CallError> {
        self.calls.control(peer, control)
    }

    pub fn active_calls(&self) -> Vec<CallState> {
        self.calls.active_calls()
    }

    // -----------------------------------------------------------------------
    // Plugins
    // -----------------------------------------------------------------------

    /// `(display_name, is_active, description, short_name)` je Plugin
    pub fn list_registered_plugins(&self) -> Vec<PluginInfo> {
        self.plugins.list()
    }

    /// Schaltet ein Plugin um und gibt den neuen Zustand zurueck
    ///
    /// Die neue Aktivierungsmenge wird sofort persistiert, falls ein
    /// Speicherort gesetzt ist.
    pub fn toggle_plugin(&self, short_name: &str) -> Result<bool, PluginError> {
        let aktiv = self.plugins.toggle(short_name)?;
        debug!(
            plugin = short_name,
            aktive = ?self.plugins.active_short_names(),
            "Aktivierungsmenge geaendert"
        );
        self.aktivierung_speichern();
        Ok(aktiv)
    }

    fn aktivierung_speichern(&self) {
        let mut speicher = self.speicher.lock();
        let Some(speicher) = speicher.as_mut() else {
            return;
        };
        speicher.config.plugins.active = self.plugins.active_short_names();
        if let Err(e) = speicher.config.speichern(&speicher.pfad) {
            warn!(
                pfad = %speicher.pfad.display(),
                fehler = %e,
                "Plugin-Aktivierung konnte nicht gespeichert werden"
            );
        }
    }

    /// Kommando an ein Plugin (`<kurzname> <rest>`); false wenn kein aktives Plugin passt
    pub fn send_plugin_command(&self, text: &str) -> bool {
        self.plugins.route_command(text)
    }

    /// Sender fuer Plugin-Pakete unter diesem Kurznamen
    pub fn plugin_sender(&self, short_name: &str) -> Result<PluginSender, PluginError> {
        let name = ShortName::for_plugin(short_name)?;
        Ok(PluginSender::new(name, Arc::clone(&self.packets)))
    }

    /// Geordnetes Beenden: erst alle Anrufe und der Audio-Thread, dann die Plugins
    ///
    /// Die Iterations-Loops muessen vorher gestoppt sein.
    pub fn shutdown(&self) {
        self.calls.shutdown();
        self.plugins.shutdown();
        info!("Session beendet");
    }
}
