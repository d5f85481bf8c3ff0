//! Plugin-Envelope (Custom-Packet-Rahmung)
//!
//! ## Paketformat
//!
//! ```text
//! Offset  Len  Beschreibung
//! ------  ---  -----------
//!  0       1   Basis + N  (Basis = 160 lossless / 200 lossy, N in [0, 5])
//!  1       N   Kurzname des Plugins (ASCII)
//!  1+N     *   Nutzdaten (opak)
//! ```
//!
//! Das erste Byte kodiert Kanal und Namenslaenge zugleich. Der Kanal wird
//! beim Dekodieren trotzdem nicht aus dem Byte abgeleitet, sondern vom
//! Aufrufer vorgegeben (der Kanal, auf dem das Paket ankam).

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use peercall_core::ChannelKind;

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Maximale Laenge eines Plugin-Kurznamens in Bytes
pub const MAX_SHORT_NAME_LENGTH: usize = 5;

/// Basiswert des ersten Bytes auf dem verlustbehafteten Kanal
pub const LOSSY_FIRST_BYTE: u8 = 200;

/// Basiswert des ersten Bytes auf dem verlustfreien Kanal
pub const LOSSLESS_FIRST_BYTE: u8 = 160;

// Die beiden Header-Bereiche duerfen sich nicht ueberlappen
const _: () = assert!(
    (LOSSLESS_FIRST_BYTE as usize) + MAX_SHORT_NAME_LENGTH < LOSSY_FIRST_BYTE as usize
);
const _: () = assert!((LOSSY_FIRST_BYTE as usize) + MAX_SHORT_NAME_LENGTH <= u8::MAX as usize);

/// Basiswert des ersten Bytes fuer einen Kanal
pub fn first_byte_base(kind: ChannelKind) -> u8 {
    match kind {
        ChannelKind::Lossy => LOSSY_FIRST_BYTE,
        ChannelKind::Lossless => LOSSLESS_FIRST_BYTE,
    }
}

// ---------------------------------------------------------------------------
// Fehler
// ---------------------------------------------------------------------------

/// Fehler beim Bilden oder Zerlegen eines Envelopes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("Ungueltiges erstes Byte {byte} fuer Kanal {kind}")]
    InvalidHeader { byte: u8, kind: ChannelKind },

    #[error("Paket abgeschnitten: {actual} Bytes (mindestens {expected} erwartet)")]
    Truncated { expected: usize, actual: usize },

    #[error("Plugin-Kurzname ist kein ASCII: {0:?}")]
    NameNichtAscii(String),

    #[error("Plugin-Kurzname zu lang: {0} Bytes (Maximum {MAX_SHORT_NAME_LENGTH})")]
    NameZuLang(usize),

    #[error("Plugin-Name darf nicht leer sein")]
    NameLeer,
}

// ---------------------------------------------------------------------------
// ShortName
// ---------------------------------------------------------------------------

/// Kurzname eines Plugins: 0 bis 5 ASCII-Bytes
///
/// Ein leerer Kurzname ist auf dem Draht gueltig, wird aber von
/// [`ShortName::for_plugin`] bei der Registrierung abgelehnt.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShortName(String);

impl ShortName {
    /// Strikte Pruefung: ASCII und hoechstens `MAX_SHORT_NAME_LENGTH` Bytes
    pub fn new(name: &str) -> Result<Self, EnvelopeError> {
        if !name.is_ascii() {
            return Err(EnvelopeError::NameNichtAscii(name.to_string()));
        }
        if name.len() > MAX_SHORT_NAME_LENGTH {
            return Err(EnvelopeError::NameZuLang(name.len()));
        }
        Ok(Self(name.to_string()))
    }

    /// Normalisiert den Kurznamen eines Plugins
    ///
    /// Entfernt Leerraum am Rand, lehnt leere Namen ab und kuerzt
    /// auf `MAX_SHORT_NAME_LENGTH` Zeichen.
    pub fn for_plugin(raw: &str) -> Result<Self, EnvelopeError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(EnvelopeError::NameLeer);
        }
        if !trimmed.is_ascii() {
            return Err(EnvelopeError::NameNichtAscii(trimmed.to_string()));
        }
        let len = trimmed.len().min(MAX_SHORT_NAME_LENGTH);
        Ok(Self(trimmed[..len].to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ShortName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ShortName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// PluginEnvelope
// ---------------------------------------------------------------------------

/// Zerlegtes Custom-Packet (wird nie persistiert)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginEnvelope {
    pub channel_kind: ChannelKind,
    pub plugin_name: ShortName,
    pub payload: Bytes,
}

impl PluginEnvelope {
    pub fn new(channel_kind: ChannelKind, plugin_name: ShortName, payload: impl Into<Bytes>) -> Self {
        Self {
            channel_kind,
            plugin_name,
            payload: payload.into(),
        }
    }

    /// Serialisiert den Envelope in das Drahtformat
    pub fn encode(&self) -> Bytes {
        encode(self.channel_kind, &self.plugin_name, &self.payload)
    }
}

/// Bildet ein Custom-Packet fuer ein Plugin
pub fn encode(kind: ChannelKind, plugin_name: &ShortName, payload: &[u8]) -> Bytes {
    let name = plugin_name.as_str().as_bytes();
    let mut buf = BytesMut::with_capacity(1 + name.len() + payload.len());
    // ShortName garantiert len <= MAX_SHORT_NAME_LENGTH, also kein Ueberlauf
    buf.put_u8(first_byte_base(kind) + name.len() as u8);
    buf.put_slice(name);
    buf.put_slice(payload);
    buf.freeze()
}

/// Zerlegt ein Custom-Packet, das auf Kanal `kind` empfangen wurde
///
/// Die Nutzdaten werden nicht inspiziert. Fremde Eingaben fuehren nie
/// zu einer Panik, nur zu einem [`EnvelopeError`].
pub fn decode(kind: ChannelKind, data: &[u8]) -> Result<PluginEnvelope, EnvelopeError> {
    let (&first, rest) = data.split_first().ok_or(EnvelopeError::Truncated {
        expected: 1,
        actual: 0,
    })?;

    let base = first_byte_base(kind);
    let name_length = match first.checked_sub(base) {
        Some(n) if (n as usize) <= MAX_SHORT_NAME_LENGTH => n as usize,
        _ => return Err(EnvelopeError::InvalidHeader { byte: first, kind }),
    };

    if rest.len() < name_length {
        return Err(EnvelopeError::Truncated {
            expected: 1 + name_length,
            actual: data.len(),
        });
    }

    let (name, payload) = rest.split_at(name_length);
    let name = std::str::from_utf8(name)
        .ok()
        .filter(|n| n.is_ascii())
        .ok_or_else(|| EnvelopeError::NameNichtAscii(String::from_utf8_lossy(name).into_owned()))?;

    Ok(PluginEnvelope {
        channel_kind: kind,
        plugin_name: ShortName(name.to_string()),
        payload: Bytes::copy_from_slice(payload),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
