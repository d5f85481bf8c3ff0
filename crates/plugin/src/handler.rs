//! Faehigkeits-Schnittstelle eines Plugins
//!
//! Alle Methoden haben leere Standard-Implementierungen, ein Plugin
//! ueberschreibt nur was es braucht. Fehler und Paniken aus den Methoden
//! werden von der Registry abgefangen und protokolliert.

use std::sync::Arc;

use peercall_core::{ChannelKind, PacketTransport, PeerId, TransportError};
use peercall_protocol::{encode, ShortName};

/// Ein registrierbares Plugin
///
/// Methoden werden aus den Iterations-Loops und aus Benutzeraktionen
/// aufgerufen, daher `&self` und `Send + Sync`. Callbacks duerfen die
/// Registry nicht umschalten (`toggle`), da sie waehrenddessen gesperrt ist.
pub trait PluginHandler: Send + Sync {
    /// Anzeigename
    fn name(&self) -> &str;

    /// Kurzname, unter dem das Plugin auf dem Draht adressiert wird
    fn short_name(&self) -> &str;

    fn description(&self) -> Option<&str> {
        None
    }

    fn start(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Nutzdaten eines Pakets vom verlustfreien Kanal
    fn on_lossless(&self, _data: &[u8], _peer: PeerId) -> anyhow::Result<()> {
        Ok(())
    }

    /// Nutzdaten eines Pakets vom verlustbehafteten Kanal
    fn on_lossy(&self, _data: &[u8], _peer: PeerId) -> anyhow::Result<()> {
        Ok(())
    }

    /// Textkommando ohne den fuehrenden Kurznamen
    fn on_command(&self, _command: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Versendet Plugin-Nutzdaten mit dem passenden Envelope
#[derive(Clone)]
pub struct PluginSender {
    short_name: ShortName,
    transport: Arc<dyn PacketTransport>,
}

impl PluginSender {
    pub fn new(short_name: ShortName, transport: Arc<dyn PacketTransport>) -> Self {
        Self {
            short_name,
            transport,
        }
    }

    pub fn short_name(&self) -> &ShortName {
        &self.short_name
    }

    pub fn send_lossless(&self, data: &[u8], peer: PeerId) -> Result<(), TransportError> {
        let paket = encode(ChannelKind::Lossless, &self.short_name, data);
        self.transport.send_lossless_packet(peer, &paket)
    }

    pub fn send_lossy(&self, data: &[u8], peer: PeerId) -> Result<(), TransportError> {
        let paket = encode(ChannelKind::Lossy, &self.short_name, data);
        self.transport.send_lossy_packet(peer, &paket)
    }
}

impl std::fmt::Debug for PluginSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginSender")
            .field("short_name", &self.short_name)
            .finish_non_exhaustive()
    }
}
