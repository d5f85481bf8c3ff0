//! peercall-protocol – Plugin-Envelope
//!
//! Mehrere unabhaengige Plugins teilen sich die beiden Custom-Packet-Kanaele
//! der Transport-Bibliothek. Dieses Crate definiert die Rahmung, mit der
//! ein Paket seinem Plugin zugeordnet wird. Kein I/O, keine Zustaende.

pub mod envelope;

pub use envelope::{
    decode, encode, first_byte_base, EnvelopeError, PluginEnvelope, ShortName,
    LOSSLESS_FIRST_BYTE, LOSSY_FIRST_BYTE, MAX_SHORT_NAME_LENGTH,
};
