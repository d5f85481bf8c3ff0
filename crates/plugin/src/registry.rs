//! Plugin Registry – Kurzname -> Handler
//!
//! Eintraege sind nach der Registrierung unveraenderlich, bis auf das
//! Aktiv-Flag. Dieses Flag ist pro Eintrag gesperrt: `toggle` haelt die
//! Schreibsperre waehrend `start`/`stop`, der Dispatch eine Lesesperre
//! waehrend des Handler-Aufrufs.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info, trace, warn};

use peercall_core::{ChannelKind, PeerId};
use peercall_protocol::{decode, PluginEnvelope, ShortName};

use crate::error::{PluginError, Result};
use crate::handler::PluginHandler;
use crate::types::PluginInfo;

/// Eintrag in der Registry
struct RegistryEintrag {
    short_name: ShortName,
    display_name: String,
    description: String,
    handler: Arc<dyn PluginHandler>,
    aktiv: RwLock<bool>,
}

impl RegistryEintrag {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            display_name: self.display_name.clone(),
            is_active: *self.aktiv.read_recursive(),
            description: self.description.clone(),
            short_name: self.short_name.to_string(),
        }
    }
}

/// Plugin Registry – thread-sicher via DashMap
pub struct PluginRegistry {
    eintraege: DashMap<String, Arc<RegistryEintrag>>,
    /// Kurznamen, die bei der Registrierung automatisch gestartet werden
    autostart: HashSet<String>,
}

impl PluginRegistry {
    /// Erstellt eine neue leere Registry ohne Autostart
    pub fn new() -> Self {
        Self::with_autostart(Vec::<String>::new())
    }

    /// Erstellt eine Registry mit der gespeicherten Aktivierungsliste
    pub fn with_autostart<I, S>(autostart: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            eintraege: DashMap::new(),
            autostart: autostart.into_iter().map(Into::into).collect(),
        }
    }

    /// Registriert ein Plugin
    ///
    /// Steht der Kurzname in der Autostart-Liste, wird das Plugin sofort
    /// gestartet. Schlaegt der Start fehl, bleibt es registriert aber inaktiv.
    pub fn register(&self, handler: Arc<dyn PluginHandler>) -> Result<ShortName> {
        let display_name = handler.name().trim().to_string();
        if display_name.is_empty() {
            return Err(PluginError::UngueltigerName(handler.name().to_string()));
        }
        let short_name = ShortName::for_plugin(handler.short_name())?;
        let key = short_name.to_string();

        if self.eintraege.contains_key(&key) {
            return Err(PluginError::DoppelterKurzname(key));
        }

        // Start ausserhalb der Map-Sperre, Handler duerfen die Registry lesen
        let mut aktiv = false;
        if self.autostart.contains(&key) {
            match isolieren(|| handler.start()) {
                Ok(()) => aktiv = true,
                Err(grund) => warn!(plugin = %key, %grund, "Autostart fehlgeschlagen"),
            }
        }

        let eintrag = Arc::new(RegistryEintrag {
            short_name: short_name.clone(),
            display_name,
            description: handler.description().unwrap_or_default().to_string(),
            handler: Arc::clone(&handler),
            aktiv: RwLock::new(aktiv),
        });

        match self.eintraege.entry(key.clone()) {
            Entry::Occupied(_) => {
                // Gleichzeitige Registrierung desselben Namens hat gewonnen
                if aktiv {
                    if let Err(grund) = isolieren(|| handler.stop()) {
                        warn!(plugin = %key, %grund, "Stop nach Doppelregistrierung fehlgeschlagen");
                    }
                }
                Err(PluginError::DoppelterKurzname(key))
            }
            Entry::Vacant(v) => {
                v.insert(eintrag);
                info!(plugin = %key, aktiv, "Plugin registriert");
                Ok(short_name)
            }
        }
    }

    /// Leitet einen Envelope an das passende Plugin weiter
    ///
    /// Unbekannte oder inaktive Plugins sind kein Fehler: die Gegenseite
    /// kann Plugins nutzen, die hier nicht installiert sind. Fehler des
    /// Handlers werden protokolliert und nicht weitergereicht.
    pub fn dispatch(&self, envelope: &PluginEnvelope, peer: PeerId) {
        let name = envelope.plugin_name.as_str();
        let Some(eintrag) = self.eintrag(name) else {
            trace!(plugin = name, %peer, "Paket fuer unbekanntes Plugin verworfen");
            return;
        };

        let aktiv = eintrag.aktiv.read();
        if !*aktiv {
            debug!(plugin = name, %peer, "Paket fuer inaktives Plugin verworfen");
            return;
        }

        let handler = &eintrag.handler;
        let payload = &envelope.payload[..];
        let ergebnis = isolieren(|| match envelope.channel_kind {
            ChannelKind::Lossless => handler.on_lossless(payload, peer),
            ChannelKind::Lossy => handler.on_lossy(payload, peer),
        });
        if let Err(grund) = ergebnis {
            warn!(plugin = name, %peer, kanal = %envelope.channel_kind, %grund, "Plugin-Handler fehlgeschlagen");
        }
    }

    /// Dekodiert ein rohes Custom-Packet und leitet es weiter
    ///
    /// Fehlerhafte Pakete stammen von nicht vertrauenswuerdigen Peers und
    /// werden stillschweigend verworfen.
    pub fn handle_packet(&self, kind: ChannelKind, data: &[u8], peer: PeerId) {
        match decode(kind, data) {
            Ok(envelope) => self.dispatch(&envelope, peer),
            Err(e) => debug!(%peer, kanal = %kind, fehler = %e, "Fehlerhaftes Plugin-Paket verworfen"),
        }
    }

    /// Schaltet ein Plugin ein oder aus und gibt den neuen Zustand zurueck
    pub fn toggle(&self, short_name: &str) -> Result<bool> {
        let eintrag = self
            .eintrag(short_name)
            .ok_or_else(|| PluginError::NichtGefunden(short_name.to_string()))?;

        let mut aktiv = eintrag.aktiv.write();
        if *aktiv {
            if let Err(grund) = isolieren(|| eintrag.handler.stop()) {
                warn!(plugin = short_name, %grund, "Plugin-Stop fehlgeschlagen, wird trotzdem deaktiviert");
            }
            *aktiv = false;
            info!(plugin = short_name, "Plugin deaktiviert");
        } else {
            isolieren(|| eintrag.handler.start()).map_err(|grund| PluginError::Handler {
                name: short_name.to_string(),
                grund,
            })?;
            *aktiv = true;
            info!(plugin = short_name, "Plugin aktiviert");
        }
        Ok(*aktiv)
    }

    /// Leitet ein Textkommando an ein Plugin weiter
    ///
    /// Das erste Wort waehlt das Plugin per Kurzname, der Rest geht an
    /// `on_command`. Gibt false zurueck wenn kein aktives Plugin passt.
    pub fn route_command(&self, text: &str) -> bool {
        let text = text.trim_start();
        let (ziel, rest) = match text.split_once(char::is_whitespace) {
            Some((ziel, rest)) => (ziel, rest.trim_start()),
            None => (text, ""),
        };
        if ziel.is_empty() {
            return false;
        }

        let Some(eintrag) = self.eintrag(ziel) else {
            debug!(plugin = ziel, "Kommando fuer unbekanntes Plugin ignoriert");
            return false;
        };
        let aktiv = eintrag.aktiv.read();
        if !*aktiv {
            debug!(plugin = ziel, "Kommando fuer inaktives Plugin ignoriert");
            return false;
        }
        if let Err(grund) = isolieren(|| eintrag.handler.on_command(rest)) {
            warn!(plugin = ziel, %grund, "Plugin-Kommando fehlgeschlagen");
        }
        true
    }

    /// Alle Plugins, sortiert nach Kurzname
    pub fn list(&self) -> Vec<PluginInfo> {
        let mut liste: Vec<PluginInfo> = self.eintraege.iter().map(|e| e.value().info()).collect();
        liste.sort_by(|a, b| a.short_name.cmp(&b.short_name));
        liste
    }

    /// Aktuelle Aktivierungsmenge, zum Persistieren durch den Aufrufer
    pub fn active_short_names(&self) -> Vec<String> {
        let mut namen: Vec<String> = self
            .eintraege
            .iter()
            .filter(|e| *e.value().aktiv.read_recursive())
            .map(|e| e.key().clone())
            .collect();
        namen.sort();
        namen
    }

    pub fn is_active(&self, short_name: &str) -> Option<bool> {
        self.eintrag(short_name).map(|e| *e.aktiv.read_recursive())
    }

    pub fn contains(&self, short_name: &str) -> bool {
        self.eintraege.contains_key(short_name)
    }

    /// Anzahl registrierter Plugins
    pub fn len(&self) -> usize {
        self.eintraege.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eintraege.is_empty()
    }

    /// Stoppt alle aktiven Plugins beim Beenden
    ///
    /// Die Aktiv-Flags bleiben stehen, damit die Aktivierungsmenge beim
    /// naechsten Start wiederhergestellt werden kann.
    pub fn shutdown(&self) {
        let eintraege: Vec<Arc<RegistryEintrag>> =
            self.eintraege.iter().map(|e| Arc::clone(e.value())).collect();
        for eintrag in eintraege {
            let aktiv = eintrag.aktiv.read();
            if !*aktiv {
                continue;
            }
            if let Err(grund) = isolieren(|| eintrag.handler.stop()) {
                warn!(plugin = %eintrag.short_name, %grund, "Plugin-Stop beim Beenden fehlgeschlagen");
            }
        }
        debug!("Alle Plugins gestoppt");
    }

    fn eintrag(&self, short_name: &str) -> Option<Arc<RegistryEintrag>> {
        self.eintraege.get(short_name).map(|e| Arc::clone(e.value()))
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Fuehrt einen Handler-Aufruf aus und faengt Fehler und Paniken ab
fn isolieren<F>(op: F) -> std::result::Result<(), String>
where
    F: FnOnce() -> anyhow::Result<()>,
{
    match catch_unwind(AssertUnwindSafe(op)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(format!("{e:#}")),
        Err(panik) => {
            let text = panik
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panik.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unbekannte Panik".to_string());
            Err(format!("Panik: {text}"))
        }
    }
}
