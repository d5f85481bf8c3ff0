//! Gemeinsame Identifikationstypen fuer peercall

use serde::{Deserialize, Serialize};

/// Sitzungsbezogener Handle eines entfernten Peers
///
/// Die Transport-Bibliothek vergibt fortlaufende Nummern pro Freund;
/// der Wert ist ausserhalb einer Sitzung bedeutungslos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(pub u32);

impl PeerId {
    /// Gibt die innere Nummer zurueck
    pub fn inner(&self) -> u32 {
        self.0
    }
}

impl From<u32> for PeerId {
    fn from(n: u32) -> Self {
        Self(n)
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "peer:{}", self.0)
    }
}

/// Custom-Packet-Kanal der Transport-Bibliothek
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Unzuverlaessig, ungeordnet
    Lossy,
    /// Zuverlaessig, geordnet
    Lossless,
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelKind::Lossy => write!(f, "lossy"),
            ChannelKind::Lossless => write!(f, "lossless"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_id_display() {
        assert_eq!(PeerId(7).to_string(), "peer:7");
    }

    #[test]
    fn peer_id_aus_zahl() {
        let id: PeerId = 42u32.into();
        assert_eq!(id.inner(), 42);
    }

    #[test]
    fn channel_kind_serde() {
        let json = serde_json::to_string(&ChannelKind::Lossless).unwrap();
        assert_eq!(json, "\"lossless\"");
    }
}
