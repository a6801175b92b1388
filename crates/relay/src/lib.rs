//! rufpost-relay – Namensbasiertes Nachrichten-Relay
//!
//! Clients melden sich per TCP unter einem Namen an und schicken sich
//! gegenseitig Nachrichten. Das Relay stellt jede Nachricht dem Ziel zu,
//! wartet auf dessen Empfangsbestaetigung und meldet dem Absender Erfolg
//! oder Fehlschlag.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (RelayServer)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task)
//!     |  Anmeldung -> Leseschleife -> Trennung
//!     |
//!     +-- registration  (Name empfangen, pruefen, ConnAccepted/InvalidName/MissingName)
//!     +-- forwarding    (quelle|ziel|text -> Ziel, Bestaetigung abwarten)
//!
//! SessionRegistry – Name -> Session, Tombstones fuer getrennte Clients
//! ```

pub mod connection;
pub mod error;
pub mod forwarding;
pub mod registration;
pub mod registry;
pub mod server_state;
pub mod session;
pub mod tcp;

// Bequeme Re-Exporte
pub use connection::ClientConnection;
pub use error::{RelayError, RelayResult};
pub use registry::SessionRegistry;
pub use server_state::{RelayConfig, RelayState};
pub use session::{Session, SessionVerbindung, Zustellung};
pub use tcp::{RelayServer, ServerZustand};
