//! Verdrahtung aller Komponenten
//!
//! Startreihenfolge: Transport, Plugins, Anruf-Manager, Session,
//! Iterations-Loops. Beenden in umgekehrter Abhaengigkeit: erst die
//! Loops, dann Anrufe und Audio-Thread, dann die Plugins, zuletzt die
//! Transport-Ressourcen.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use peercall_audio::AudioBackend;
use peercall_calls::CallSessionManager;
use peercall_core::PacketTransport;
use peercall_plugin::PluginRegistry;

use crate::config::ClientConfig;
use crate::echo::{EchoPlugin, ECHO_SHORT_NAME};
use crate::iterate::IterationLoop;
use crate::loopback::LoopbackTransport;
use crate::session::Session;

pub struct Client {
    session: Arc<Session>,
    loopback: Arc<LoopbackTransport>,
    echo: Arc<EchoPlugin>,
    loops: Vec<IterationLoop>,
}

impl Client {
    /// Baut den Client mit Loopback-Transport und dem gegebenen Audio-Backend auf
    pub fn starten(config: &ClientConfig, backend: Arc<dyn AudioBackend>) -> anyhow::Result<Self> {
        let (loopback, transport_queue, av_queue) = LoopbackTransport::new(
            config.transport.iteration_interval(),
            config.transport.av_iteration_interval(),
        );

        let plugins = Arc::new(PluginRegistry::with_autostart(
            config.plugins.active.iter().cloned(),
        ));
        let calls = Arc::new(CallSessionManager::new(
            loopback.clone(),
            backend,
            config.audio.format(),
            config.calls.clone(),
        ));
        let packets: Arc<dyn PacketTransport> = loopback.clone();
        let session = Arc::new(Session::new(calls, Arc::clone(&plugins), packets));

        let echo = Arc::new(EchoPlugin::new(session.plugin_sender(ECHO_SHORT_NAME)?));
        plugins
            .register(echo.clone())
            .context("Echo-Plugin konnte nicht registriert werden")?;

        let mut loops = Vec::with_capacity(2);
        for (name, quelle) in [
            ("peercall-transport", transport_queue),
            ("peercall-av", av_queue),
        ] {
            let s = Arc::clone(&session);
            let l = IterationLoop::starten(name, quelle, move |event| s.handle_event(event))
                .with_context(|| format!("Thread {name} konnte nicht gestartet werden"))?;
            loops.push(l);
        }

        info!(
            plugins = plugins.len(),
            aktiv = ?plugins.active_short_names(),
            "Client gestartet"
        );
        Ok(Self {
            session,
            loopback,
            echo,
            loops,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn loopback(&self) -> &LoopbackTransport {
        &self.loopback
    }

    pub fn echo(&self) -> &EchoPlugin {
        &self.echo
    }

    /// Geordnetes Beenden; gibt die Aktivierungsmenge zum Persistieren zurueck
    pub fn beenden(mut self) -> Vec<String> {
        for l in self.loops.iter_mut() {
            l.stoppen();
        }
        let aktiv = self.session.plugins().active_short_names();
        self.session.shutdown();
        if Arc::strong_count(&self.session) > 1 {
            warn!("Session wird beim Beenden noch referenziert");
        }
        aktiv
    }
}
