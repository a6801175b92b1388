//! rufpost-protocol – Netzwerkprotokoll-Definitionen
//!
//! Das Relay spricht ein unverpacktes ASCII-Protokoll:
//! - Anmeldung: der Client schickt direkt nach dem Verbinden seinen Namen
//! - Anwendungsnachricht: `quelle|ziel|text`
//! - Statussignal: eine Dezimalzahl aus [`StatusCode`]
//!
//! Ob ein Payload ein Statussignal oder eine Nachricht ist, entscheidet
//! allein das erste Byte (Ziffer oder nicht).

pub mod error;
pub mod nachricht;
pub mod status;
pub mod wire;

pub use error::{ProtokollFehler, ProtokollResult};
pub use nachricht::{Eingang, Nachricht};
pub use status::StatusCode;
pub use wire::PaketCodec;
