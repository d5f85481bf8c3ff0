//! Tabelle der laufenden Anrufe
//!
//! Die Tabelle selbst ist nicht synchronisiert; der Session-Manager haelt
//! sie hinter einem `parking_lot::Mutex` und teilt sie mit dem
//! Capture-Thread (ueber [`crate::CallFanout`]).

use std::collections::HashMap;

use peercall_core::PeerId;

use crate::error::{CallError, Result};
use crate::state::{CallEvent, CallPhase, CallState};

/// Alle Anrufe, die nicht `Ended` sind, einer pro Peer
#[derive(Debug, Default)]
pub struct CallTable {
    calls: HashMap<PeerId, CallState>,
}

impl CallTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fuegt einen Anruf ein und gibt einen verdraengten Eintrag zurueck
    pub fn insert(&mut self, call: CallState) -> Option<CallState> {
        self.calls.insert(call.peer_id, call)
    }

    pub fn get(&self, peer: PeerId) -> Option<&CallState> {
        self.calls.get(&peer)
    }

    pub fn contains(&self, peer: PeerId) -> bool {
        self.calls.contains_key(&peer)
    }

    /// Wendet ein Ereignis an; endet der Anruf, wird er entfernt
    pub fn apply(&mut self, peer: PeerId, event: CallEvent) -> Result<CallPhase> {
        let call = self
            .calls
            .get_mut(&peer)
            .ok_or(CallError::KeinAnruf(peer))?;
        let phase = call.apply(event)?;
        if phase.is_ended() {
            self.calls.remove(&peer);
        }
        Ok(phase)
    }

    /// Peers, die aktuell Audio-Frames bekommen sollen
    pub fn audio_targets(&self) -> Vec<PeerId> {
        self.calls
            .values()
            .filter(|c| c.sends_audio())
            .map(|c| c.peer_id)
            .collect()
    }

    /// Momentaufnahme aller Anrufe, sortiert nach Peer
    pub fn snapshot(&self) -> Vec<CallState> {
        let mut calls: Vec<CallState> = self.calls.values().cloned().collect();
        calls.sort_by_key(|c| c.peer_id);
        calls
    }

    /// Leert die Tabelle ohne Zustandsuebergaenge
    pub fn drain(&mut self) -> Vec<CallState> {
        self.calls.drain().map(|(_, c)| c).collect()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}
