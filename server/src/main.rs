//! rufpost Server – Einstiegspunkt
//!
//! Liest die Kommandozeile, laedt die Konfiguration, initialisiert das
//! Logging und startet den Server.

use anyhow::Result;
use clap::Parser;
use rufpost_observability::logging::{log_format_gueltig, log_level_gueltig};
use rufpost_observability::logging_initialisieren;
use rufpost_server::{config::ServerConfig, Server};

/// Namensbasiertes Nachrichten-Relay ueber TCP
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TCP-Port des Relays (ueberschreibt die Konfigurationsdatei)
    #[arg(short, long)]
    port: Option<u16>,

    /// Pfad zur Konfigurationsdatei
    #[arg(short, long, env = "RUFPOST_CONFIG", default_value = "rufpost.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let mut config = ServerConfig::laden(&cli.config)?;
    if let Some(port) = cli.port {
        config.netzwerk.port = port;
    }

    logging_initialisieren(&config.logging.level, &config.logging.format);
    if !log_level_gueltig(&config.logging.level) {
        tracing::warn!(level = %config.logging.level, "Log-Level wird als Filter-Direktive gelesen");
    }
    if !log_format_gueltig(&config.logging.format) {
        tracing::warn!(format = %config.logging.format, "Unbekanntes Log-Format, verwende text");
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config,
        port = config.netzwerk.port,
        "rufpost Server wird initialisiert"
    );

    Server::neu(config).starten().await
}
