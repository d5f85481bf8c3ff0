//! Zeilenbasierte Steuerkonsole
//!
//! Ersetzt die grafische Oberflaeche fuer lokale Laeufe. Jede Zeile wird
//! zu einem [`Befehl`] geparst und gegen den [`Client`] ausgefuehrt; die
//! Ausgabe ist reiner Text.

use std::fmt::Write as _;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::error;

use peercall_core::{CallControl, PeerId};

use crate::app::Client;

/// Fehler beim Parsen einer Konsolenzeile
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KonsolenFehler {
    #[error("Unbekannter Befehl: {0} (help fuer eine Uebersicht)")]
    Unbekannt(String),

    #[error("Fehlendes Argument: {0}")]
    FehlendesArgument(&'static str),

    #[error("Ungueltige Peer-Nummer: {0}")]
    UngueltigerPeer(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Befehl {
    Call { peer: PeerId, video: bool },
    Answer(PeerId),
    Decline(PeerId),
    Hangup(PeerId),
    Control { peer: PeerId, control: CallControl },
    /// Der Loopback-Peer ruft an
    Ring { video: bool },
    Calls,
    Plugins,
    Toggle(String),
    Cmd(String),
    Stats,
    Help,
    Quit,
}

pub const HILFE: &str = "\
Befehle:
  call <peer> [video]   Anruf starten
  answer <peer>         eingehenden Anruf annehmen
  decline <peer>        eingehenden Anruf ablehnen
  hangup <peer>         Anruf beenden
  pause|resume|mute|unmute <peer>
  ring [video]          Echo-Peer ruft an
  calls                 laufende Anrufe
  plugins               registrierte Plugins
  toggle <kurzname>     Plugin ein-/ausschalten
  cmd <kurzname> <text> Kommando an ein Plugin
  stats                 Audio-Statistiken
  quit                  beenden";

fn peer_arg(arg: Option<&str>) -> Result<PeerId, KonsolenFehler> {
    let arg = arg.ok_or(KonsolenFehler::FehlendesArgument("peer"))?;
    arg.parse::<u32>()
        .map(PeerId)
        .map_err(|_| KonsolenFehler::UngueltigerPeer(arg.to_string()))
}

/// Parst eine Zeile; leere Zeilen ergeben `None`
pub fn parse(zeile: &str) -> Result<Option<Befehl>, KonsolenFehler> {
    let zeile = zeile.trim();
    let (kopf, rest) = zeile
        .split_once(char::is_whitespace)
        .map(|(k, r)| (k, r.trim_start()))
        .unwrap_or((zeile, ""));
    let mut args = rest.split_whitespace();

    let befehl = match kopf {
        "" => return Ok(None),
        "call" => Befehl::Call {
            peer: peer_arg(args.next())?,
            video: args.next() == Some("video"),
        },
        "answer" => Befehl::Answer(peer_arg(args.next())?),
        "decline" => Befehl::Decline(peer_arg(args.next())?),
        "hangup" => Befehl::Hangup(peer_arg(args.next())?),
        "pause" | "resume" | "mute" | "unmute" => {
            let control = match kopf {
                "pause" => CallControl::Pause,
                "resume" => CallControl::Resume,
                "mute" => CallControl::MuteAudio,
                _ => CallControl::UnmuteAudio,
            };
            Befehl::Control {
                peer: peer_arg(args.next())?,
                control,
            }
        }
        "ring" => Befehl::Ring {
            video: args.next() == Some("video"),
        },
        "calls" => Befehl::Calls,
        "plugins" => Befehl::Plugins,
        "toggle" => Befehl::Toggle(
            args.next()
                .ok_or(KonsolenFehler::FehlendesArgument("kurzname"))?
                .to_string(),
        ),
        "cmd" => {
            if rest.is_empty() {
                return Err(KonsolenFehler::FehlendesArgument("text"));
            }
            Befehl::Cmd(rest.to_string())
        }
        "stats" => Befehl::Stats,
        "help" | "?" => Befehl::Help,
        "quit" | "exit" => Befehl::Quit,
        anderes => return Err(KonsolenFehler::Unbekannt(anderes.to_string())),
    };
    Ok(Some(befehl))
}

/// Warum die Konsole beendet wurde
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KonsolenEnde {
    Quit,
    Eingabeende,
    /// Eingabe nicht lesbar (z.B. kein UTF-8); der Aufrufer beendet trotzdem geordnet
    Lesefehler,
}

/// Liest Befehle bis `quit`, Eingabeende oder Lesefehler
///
/// Jede Ausgabe geht an `ausgabe`. Ein Lesefehler wird protokolliert und
/// beendet nur die Schleife, nie den Prozess.
pub async fn bedienen<R>(eingabe: R, client: &Client, mut ausgabe: impl FnMut(&str)) -> KonsolenEnde
where
    R: AsyncBufRead + Unpin,
{
    let mut zeilen = eingabe.lines();
    loop {
        let zeile = match zeilen.next_line().await {
            Ok(Some(zeile)) => zeile,
            Ok(None) => return KonsolenEnde::Eingabeende,
            Err(e) => {
                error!(fehler = %e, "Konsoleneingabe nicht lesbar");
                return KonsolenEnde::Lesefehler;
            }
        };
        match parse(&zeile) {
            Ok(Some(Befehl::Quit)) => return KonsolenEnde::Quit,
            Ok(Some(befehl)) => ausgabe(&ausfuehren(&befehl, client)),
            Ok(None) => {}
            Err(e) => ausgabe(&e.to_string()),
        }
    }
}

/// Fuehrt einen Befehl aus und gibt die Ausgabe zurueck
pub fn ausfuehren(befehl: &Befehl, client: &Client) -> String {
    let session = client.session();
    let ergebnis = match befehl {
        Befehl::Call { peer, video } => session
            .start_call(*peer, true, *video)
            .map(|()| format!("Rufe {peer} an")),
        Befehl::Answer(peer) => session.answer(*peer).map(|()| format!("Anruf mit {peer} angenommen")),
        Befehl::Decline(peer) => session.decline(*peer).map(|()| format!("Anruf von {peer} abgelehnt")),
        Befehl::Hangup(peer) => session
            .stop_call(*peer, false)
            .map(|()| format!("Anruf mit {peer} beendet")),
        Befehl::Control { peer, control } => session
            .call_control(*peer, *control)
            .map(|()| format!("{control:?} an {peer} gesendet")),
        Befehl::Ring { video } => {
            client.loopback().simulate_incoming_call(*video);
            Ok("Echo-Peer ruft an".to_string())
        }
        Befehl::Calls => Ok(anrufe_anzeigen(client)),
        Befehl::Plugins => Ok(plugins_anzeigen(client)),
        Befehl::Toggle(name) => {
            return match session.toggle_plugin(name) {
                Ok(true) => format!("Plugin {name} aktiviert"),
                Ok(false) => format!("Plugin {name} deaktiviert"),
                Err(e) => format!("Fehler: {e}"),
            }
        }
        Befehl::Cmd(text) => {
            return if session.send_plugin_command(text) {
                "Kommando weitergeleitet".to_string()
            } else {
                "Kein aktives Plugin mit diesem Kurznamen".to_string()
            }
        }
        Befehl::Stats => {
            let stats = session.calls().audio_stats();
            Ok(format!(
                "Audio {}: {} Frames aufgenommen, {} zugestellt, {} Lesefehler, {} Sendefehler",
                if session.calls().is_audio_running() { "laeuft" } else { "aus" },
                stats.frames_captured,
                stats.frames_delivered,
                stats.read_errors,
                stats.send_errors
            ))
        }
        Befehl::Help => Ok(HILFE.to_string()),
        Befehl::Quit => Ok(String::new()),
    };
    ergebnis.unwrap_or_else(|e| format!("Fehler: {e}"))
}

fn anrufe_anzeigen(client: &Client) -> String {
    let anrufe = client.session().active_calls();
    if anrufe.is_empty() {
        return "Keine Anrufe".to_string();
    }
    let mut text = String::new();
    for call in anrufe {
        let _ = writeln!(
            text,
            "{}  {:<12} audio={} video={} seit {}",
            call.peer_id,
            call.phase.to_string(),
            call.media.audio,
            call.media.video,
            call.started_at.format("%H:%M:%S")
        );
    }
    text.trim_end().to_string()
}

fn plugins_anzeigen(client: &Client) -> String {
    let plugins = client.session().list_registered_plugins();
    if plugins.is_empty() {
        return "Keine Plugins registriert".to_string();
    }
    let mut text = String::new();
    for info in plugins {
        let (name, aktiv, beschreibung, kurz) = info.as_tuple();
        let _ = writeln!(
            text,
            "[{}] {:<5} {} – {}",
            if aktiv { "x" } else { " " },
            kurz,
            name,
            beschreibung
        );
    }
    text.trim_end().to_string()
}
