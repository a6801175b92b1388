//! rufpost-core – Gemeinsame Typen und Fehlertypen
//!
//! Dieses Crate stellt die Bausteine bereit, die Protokoll, Relay und
//! Server-Binary gemeinsam nutzen: den Client-Namen als Newtype und den
//! zentralen Fehler-Enum.

pub mod error;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{Result, RufpostError};
pub use types::{ClientName, NAME_TRENNZEICHEN, STANDARD_MAX_NAME_LAENGE};
