//! Iterations-Loops der Transport-Bibliothek
//!
//! Zwei benannte Threads (Transport und A/V), die ihre Ereignisquelle im
//! vom Protokoll gewuenschten Intervall abfragen. Das Stoppen ist
//! kooperativ: das Flag wird einmal pro Durchlauf geprueft.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info};

use peercall_core::{EventSource, TransportEvent};

/// Ein laufender Iterations-Thread
pub struct IterationLoop {
    name: String,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl IterationLoop {
    /// Startet einen Thread, der `source` abfragt und jedes Ereignis an `handler` gibt
    pub fn starten<F>(name: &str, source: Arc<dyn EventSource>, handler: F) -> std::io::Result<Self>
    where
        F: Fn(TransportEvent) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_thread = Arc::clone(&stop);
        let thread_name = name.to_string();

        let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            debug!(loop_name = %thread_name, "Iterations-Loop gestartet");
            while !stop_thread.load(Ordering::Acquire) {
                for event in source.iterate() {
                    handler(event);
                }
                thread::sleep(source.iteration_interval());
            }
            debug!(loop_name = %thread_name, "Iterations-Loop beendet");
        })?;

        info!(loop_name = name, "Iterations-Loop laeuft");
        Ok(Self {
            name: name.to_string(),
            stop,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Setzt das Stop-Flag und wartet auf den Thread (hoechstens ein Intervall)
    pub fn stoppen(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!(loop_name = %self.name, "Iterations-Loop ist abgestuerzt");
            }
        }
    }
}

impl Drop for IterationLoop {
    fn drop(&mut self) {
        self.stoppen();
    }
}
