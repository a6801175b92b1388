//! Fehlertypen fuer das Protokoll-Crate

use thiserror::Error;

/// Fehler beim Interpretieren eines eingehenden Payloads
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtokollFehler {
    /// Leerer Payload
    #[error("Leerer Payload")]
    LeererPayload,

    /// Nachricht hat nicht das Format `quelle|ziel|text`
    #[error("Ungueltiges Nachrichtenformat: {0}")]
    UngueltigesFormat(String),
}

/// Result-Typ fuer das Protokoll-Crate
pub type ProtokollResult<T> = Result<T, ProtokollFehler>;
