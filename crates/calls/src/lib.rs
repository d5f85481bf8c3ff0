//! peercall-calls – Anrufverwaltung
//!
//! # Architektur
//! - [`state::CallState`] – Zustandsmaschine pro Peer
//! - [`table::CallTable`] – laufende Anrufe (alles ausser `Ended`)
//! - [`fanout::CallFanout`] – verteilt Capture-Frames an aktive Anrufe
//! - [`manager::CallSessionManager`] – Einstiegspunkt fuer Benutzeraktionen
//!   und A/V-Ereignisse, steuert die Audio-Pipeline

pub mod config;
pub mod error;
pub mod fanout;
pub mod manager;
pub mod state;
pub mod table;

// Bequeme Re-Exporte
pub use config::{AnswerPolicy, CallConfig};
pub use error::{CallError, Result};
pub use fanout::CallFanout;
pub use manager::CallSessionManager;
pub use state::{CallDirection, CallEvent, CallPhase, CallState, MediaFlags};
pub use table::CallTable;
