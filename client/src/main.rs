//! peercall – Einstiegspunkt
//!
//! Initialisiert das Logging, laedt die Konfiguration, startet den Client
//! und liest Befehle von stdin bis `quit`, EOF, Lesefehler oder Ctrl+C.
//! Jeder dieser Wege endet im geordneten Beenden.

use anyhow::Result;
use tokio::io::BufReader;
use tracing::{info, warn};

use peercall_client::console;
use peercall_client::logging::logging_initialisieren;
use peercall_client::{audio_backend, Client, ClientConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("PEERCALL_CONFIG").unwrap_or_else(|_| "peercall.toml".into());

    // Erst laden, dann Logging aus der Konfiguration; Meldungen zum Laden danach
    let geladen = ClientConfig::laden(&config_pfad)?;
    let fehlt = geladen.is_none();
    let config = geladen.unwrap_or_default();
    logging_initialisieren(&config.logging.level, &config.logging.format)?;
    if fehlt {
        warn!(
            pfad = %config_pfad,
            "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
        );
    }
    config.validieren()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "peercall wird initialisiert"
    );

    let client = Client::starten(&config, audio_backend())?;
    client
        .session()
        .aktivierung_speichern_in(&config_pfad, config.clone());
    println!("{}", console::HILFE);

    let eingabe = BufReader::new(tokio::io::stdin());
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Ctrl+C empfangen"),
        ende = console::bedienen(eingabe, &client, |zeile| println!("{zeile}")) => {
            info!(?ende, "Konsole beendet");
        }
    }

    let aktiv = client.beenden();
    info!(plugins = ?aktiv, "peercall beendet");
    Ok(())
}
