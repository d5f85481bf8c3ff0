//! peercall-core – Gemeinsame Typen, Transport-Traits und Fehlertypen
//!
//! Dieses Crate stellt die Bausteine bereit, die von allen anderen
//! peercall-Crates gemeinsam genutzt werden. Die eigentliche Transport-
//! Bibliothek (Peer-Discovery, Verschluesselung, Paketzustellung) ist
//! ein externer Kollaborateur und wird nur ueber die Traits in
//! [`transport`] angesprochen.

pub mod error;
pub mod event;
pub mod transport;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{Result, TransportError};
pub use event::{EventSource, TransportEvent};
pub use transport::{AvTransport, Bitrates, CallControl, CallStateFlags, PacketTransport};
pub use types::{ChannelKind, PeerId};
