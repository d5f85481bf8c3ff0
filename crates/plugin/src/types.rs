//! Anzeige-Typen fuer das Plugin-System

use serde::{Deserialize, Serialize};

/// Oeffentliche Informationen ueber ein registriertes Plugin (fuer UI/Konsole)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub display_name: String,
    pub is_active: bool,
    pub description: String,
    pub short_name: String,
}

impl PluginInfo {
    /// Tupel-Form `(display_name, is_active, description, short_name)`
    pub fn as_tuple(&self) -> (&str, bool, &str, &str) {
        (
            &self.display_name,
            self.is_active,
            &self.description,
            &self.short_name,
        )
    }
}
