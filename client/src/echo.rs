//! Echo-Plugin
//!
//! Minimales Plugin fuer lokale Tests des Paket-Multiplexings:
//! `echo ping <peer> <text>` sendet `ping <text>` verlustfrei an den Peer,
//! ein empfangenes `ping` wird mit `pong` beantwortet, ein `pong` nur
//! protokolliert.

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{bail, Context};
use tracing::{debug, info};

use peercall_core::PeerId;
use peercall_plugin::{PluginHandler, PluginSender};

pub const ECHO_SHORT_NAME: &str = "echo";

const PING: &[u8] = b"ping ";
const PONG: &[u8] = b"pong ";

pub struct EchoPlugin {
    sender: PluginSender,
    pongs: AtomicU64,
    lossy: AtomicU64,
}

impl EchoPlugin {
    pub fn new(sender: PluginSender) -> Self {
        Self {
            sender,
            pongs: AtomicU64::new(0),
            lossy: AtomicU64::new(0),
        }
    }

    /// Anzahl empfangener Antworten
    pub fn pongs(&self) -> u64 {
        self.pongs.load(Ordering::Relaxed)
    }

    pub fn lossy_empfangen(&self) -> u64 {
        self.lossy.load(Ordering::Relaxed)
    }
}

impl PluginHandler for EchoPlugin {
    fn name(&self) -> &str {
        "Echo"
    }

    fn short_name(&self) -> &str {
        ECHO_SHORT_NAME
    }

    fn description(&self) -> Option<&str> {
        Some("Beantwortet ping-Pakete mit pong")
    }

    fn start(&self) -> anyhow::Result<()> {
        info!("Echo-Plugin gestartet");
        Ok(())
    }

    fn stop(&self) -> anyhow::Result<()> {
        info!("Echo-Plugin gestoppt");
        Ok(())
    }

    fn on_lossless(&self, data: &[u8], peer: PeerId) -> anyhow::Result<()> {
        if let Some(text) = data.strip_prefix(PING) {
            let antwort = [PONG, text].concat();
            self.sender
                .send_lossless(&antwort, peer)
                .context("pong konnte nicht gesendet werden")?;
            debug!(%peer, "ping beantwortet");
        } else if let Some(text) = data.strip_prefix(PONG) {
            self.pongs.fetch_add(1, Ordering::Relaxed);
            info!(%peer, text = %String::from_utf8_lossy(text), "pong empfangen");
        } else {
            bail!("Unbekannte Nachricht ({} Bytes)", data.len());
        }
        Ok(())
    }

    fn on_lossy(&self, data: &[u8], peer: PeerId) -> anyhow::Result<()> {
        self.lossy.fetch_add(1, Ordering::Relaxed);
        debug!(%peer, laenge = data.len(), "Verlustbehaftetes Paket empfangen");
        Ok(())
    }

    fn on_command(&self, command: &str) -> anyhow::Result<()> {
        let mut teile = command.splitn(3, char::is_whitespace);
        match (teile.next(), teile.next(), teile.next()) {
            (Some("ping"), Some(peer), text) => {
                let peer: u32 = peer
                    .parse()
                    .with_context(|| format!("Ungueltige Peer-Nummer: {peer}"))?;
                let nachricht = [PING, text.unwrap_or("").as_bytes()].concat();
                self.sender.send_lossless(&nachricht, PeerId(peer))?;
                Ok(())
            }
            _ => bail!("Unbekanntes Kommando: {command:?} (erwartet: ping <peer> <text>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use peercall_core::PacketTransport;
    use peercall_protocol::ShortName;
    use std::sync::Arc;

    #[derive(Default)]
    struct Aufzeichner {
        gesendet: Mutex<Vec<(PeerId, Vec<u8>)>>,
    }

    impl PacketTransport for Aufzeichner {
        fn send_lossless_packet(&self, peer: PeerId, data: &[u8]) -> peercall_core::Result<()> {
            self.gesendet.lock().push((peer, data.to_vec()));
            Ok(())
        }

        fn send_lossy_packet(&self, _peer: PeerId, _data: &[u8]) -> peercall_core::Result<()> {
            Ok(())
        }
    }

    fn plugin() -> (EchoPlugin, Arc<Aufzeichner>) {
        let transport = Arc::new(Aufzeichner::default());
        let sender = PluginSender::new(ShortName::new(ECHO_SHORT_NAME).unwrap(), transport.clone());
        (EchoPlugin::new(sender), transport)
    }

    #[test]
    fn ping_wird_beantwortet() {
        let (p, t) = plugin();
        p.on_lossless(b"ping hallo", PeerId(3)).unwrap();
        assert_eq!(
            t.gesendet.lock().as_slice(),
            [(PeerId(3), b"\xa4echopong hallo".to_vec())]
        );
    }

    #[test]
    fn pong_wird_gezaehlt() {
        let (p, t) = plugin();
        p.on_lossless(b"pong hallo", PeerId(3)).unwrap();
        assert_eq!(p.pongs(), 1);
        assert!(t.gesendet.lock().is_empty());
        assert!(p.on_lossless(b"quatsch", PeerId(3)).is_err());
    }

    #[test]
    fn kommando_ping() {
        let (p, t) = plugin();
        p.on_command("ping 1 wie gehts").unwrap();
        assert_eq!(
            t.gesendet.lock().as_slice(),
            [(PeerId(1), b"\xa4echoping wie gehts".to_vec())]
        );
        assert!(p.on_command("ping x").is_err());
        assert!(p.on_command("tanz").is_err());
    }
}
