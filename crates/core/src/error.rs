//! Fehlertypen fuer rufpost
//!
//! Zentraler Fehler-Enum fuer alles, was nicht in einem Untermodul einen
//! eigenen Fehlertyp hat. Protokoll- und Relay-Crate definieren eigene Fehler
//! und konvertieren bei Bedarf via `#[from]`.

use thiserror::Error;

/// Globaler Result-Alias fuer rufpost
pub type Result<T> = std::result::Result<T, RufpostError>;

/// Alle moeglichen Fehler im rufpost-System
#[derive(Debug, Error)]
pub enum RufpostError {
    // --- Namen ---
    #[error("Name ist leer")]
    NameLeer,

    #[error("Name muss mit einem Buchstaben beginnen: {0}")]
    NameUngueltigerAnfang(String),

    #[error("Name enthaelt das Trennzeichen '|': {0}")]
    NameEnthaeltTrennzeichen(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl RufpostError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Gibt true zurueck wenn der Fehler einen ungueltigen Namen beschreibt
    pub fn ist_namensfehler(&self) -> bool {
        matches!(
            self,
            Self::NameLeer | Self::NameUngueltigerAnfang(_) | Self::NameEnthaeltTrennzeichen(_)
        )
    }
}
