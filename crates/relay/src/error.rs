//! Fehlertypen fuer das Relay

use rufpost_core::RufpostError;
use rufpost_protocol::ProtokollFehler;
use thiserror::Error;

/// Fehlertyp fuer das Relay
#[derive(Debug, Error)]
pub enum RelayError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Name wird bereits von einer verbundenen Session gehalten
    #[error("Name bereits vergeben: {0}")]
    NameVergeben(String),

    /// Name verletzt die Namensregeln
    #[error("Ungueltiger Name: {0}")]
    NameUngueltig(#[from] RufpostError),

    /// Innerhalb des Zeitlimits kam kein Name an
    #[error("Kein Name empfangen: {0}")]
    NameNichtEmpfangen(String),

    /// Payload konnte nicht interpretiert werden
    #[error("Protokollfehler: {0}")]
    Protokoll(#[from] ProtokollFehler),

    /// Senden an Client fehlgeschlagen (Verbindung beendet)
    #[error("Senden fehlgeschlagen")]
    SendFehler,

    /// Operation passt nicht zum aktuellen Server-Zustand
    #[error("Ungueltiger Server-Zustand: {0}")]
    UngueltigerZustand(String),

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl RelayError {
    /// Erstellt einen internen Fehler
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}

/// Result-Typ fuer das Relay
pub type RelayResult<T> = Result<T, RelayError>;
