//! Statuscodes zwischen Relay und Clients
//!
//! Die Codes werden als ASCII-Dezimalzahl ohne Terminator uebertragen und
//! muessen bitgenau erhalten bleiben, damit bestehende Clients kompatibel
//! bleiben.
//!
//! | Code | Bedeutung                         | Richtung        |
//! |------|-----------------------------------|-----------------|
//! | 0    | Anmeldung akzeptiert              | Relay -> Client |
//! | 1    | Client meldet sich ab             | Client -> Relay |
//! | 2    | Name bereits vergeben / ungueltig | Relay -> Client |
//! | 3    | Kein Name empfangen               | Relay -> Client |
//! | 4    | Empfaenger bestaetigt Nachricht   | Client -> Relay |
//! | 5    | Zustellung bestaetigt             | Relay -> Sender |
//! | 6    | Zustellung fehlgeschlagen         | Relay -> Sender |
//! | 7    | Ziel unbekannt / nicht verbunden  | Relay -> Client |
//! | 8    | Liste verbundener Clients         | Client -> Relay |

use bytes::Bytes;

/// Alle Statuscodes des Protokolls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StatusCode {
    ConnAccepted = 0,
    Disconnect = 1,
    InvalidName = 2,
    MissingName = 3,
    MsgReceived = 4,
    MsgSuccess = 5,
    MsgFailed = 6,
    InvalidDest = 7,
    /// Definiert, wird vom Relay aber nicht beantwortet
    ReqClients = 8,
}

impl StatusCode {
    /// Alle Codes in aufsteigender Reihenfolge
    pub const ALLE: [StatusCode; 9] = [
        StatusCode::ConnAccepted,
        StatusCode::Disconnect,
        StatusCode::InvalidName,
        StatusCode::MissingName,
        StatusCode::MsgReceived,
        StatusCode::MsgSuccess,
        StatusCode::MsgFailed,
        StatusCode::InvalidDest,
        StatusCode::ReqClients,
    ];

    /// Numerischer Wert auf dem Draht
    pub fn wert(self) -> u8 {
        self as u8
    }

    /// Sucht den Code zu einem numerischen Wert
    pub fn aus_wert(wert: u32) -> Option<Self> {
        Self::ALLE.iter().copied().find(|c| u32::from(c.wert()) == wert)
    }

    /// Kodiert den Code als ASCII-Dezimalzahl
    pub fn kodieren(self) -> Bytes {
        Bytes::from(self.wert().to_string())
    }

    /// Name des Codes wie im Protokoll dokumentiert
    pub fn bezeichnung(self) -> &'static str {
        match self {
            StatusCode::ConnAccepted => "ConnAccepted",
            StatusCode::Disconnect => "Disconnect",
            StatusCode::InvalidName => "InvalidName",
            StatusCode::MissingName => "MissingName",
            StatusCode::MsgReceived => "MsgReceived",
            StatusCode::MsgSuccess => "MsgSuccess",
            StatusCode::MsgFailed => "MsgFailed",
            StatusCode::InvalidDest => "InvalidDest",
            StatusCode::ReqClients => "ReqClients",
        }
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.bezeichnung(), self.wert())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn werte_sind_drahtkompatibel() {
        let erwartet: Vec<u8> = (0..=8).collect();
        let werte: Vec<u8> = StatusCode::ALLE.iter().map(|c| c.wert()).collect();
        assert_eq!(werte, erwartet);
    }

    #[test]
    fn kodierung_ist_ascii_dezimal() {
        assert_eq!(&StatusCode::ConnAccepted.kodieren()[..], b"0");
        assert_eq!(&StatusCode::MsgSuccess.kodieren()[..], b"5");
        assert_eq!(&StatusCode::ReqClients.kodieren()[..], b"8");
    }

    #[test]
    fn aus_wert_kennt_nur_definierte_codes() {
        assert_eq!(StatusCode::aus_wert(4), Some(StatusCode::MsgReceived));
        assert_eq!(StatusCode::aus_wert(7), Some(StatusCode::InvalidDest));
        assert_eq!(StatusCode::aus_wert(9), None);
        assert_eq!(StatusCode::aus_wert(u32::MAX), None);
    }

    #[test]
    fn anzeige_enthaelt_name_und_wert() {
        assert_eq!(StatusCode::InvalidDest.to_string(), "InvalidDest(7)");
    }
}
