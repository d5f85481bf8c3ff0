//! peercall-plugin – Plugin-Registry
//!
//! Plugins werden statisch oder dynamisch gelinkt und implementieren die
//! Faehigkeits-Schnittstelle [`PluginHandler`]. Das Laden selbst ist Sache
//! der Paketierung; dieses Crate verwaltet nur die registrierten Instanzen.
//!
//! # Architektur
//! - [`handler::PluginHandler`] – Faehigkeiten eines Plugins
//! - [`handler::PluginSender`] – Versand von Plugin-Paketen mit Envelope
//! - [`registry::PluginRegistry`] – Registrierung, Umschalten, Dispatch
//! - [`types::PluginInfo`] – Anzeige-Informationen fuer UI/Konsole

pub mod error;
pub mod handler;
pub mod registry;
pub mod types;

// Bequeme Re-Exporte
pub use error::{PluginError, Result};
pub use handler::{PluginHandler, PluginSender};
pub use registry::PluginRegistry;
pub use types::PluginInfo;
