//! Client-Namen
//!
//! Ein Client meldet sich unter einem frei gewaehlten Anzeigenamen an. Der
//! Name ist gleichzeitig die Adresse, unter der andere Clients ihn
//! erreichen. Das Newtype-Pattern stellt sicher, dass nur validierte Namen in
//! die Registry gelangen.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RufpostError};

/// Standard-Maximallaenge eines Namens in Zeichen
pub const STANDARD_MAX_NAME_LAENGE: usize = 10;

/// Feldtrenner im Nachrichtenformat `quelle|ziel|text`
pub const NAME_TRENNZEICHEN: char = '|';

/// Validierter Client-Name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClientName(String);

impl ClientName {
    /// Validiert einen Namen ohne ihn zu kuerzen
    ///
    /// Regeln: nicht leer, erstes Zeichen alphabetisch, kein `|`.
    pub fn neu(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let erstes = name.chars().next().ok_or(RufpostError::NameLeer)?;
        if !erstes.is_alphabetic() {
            return Err(RufpostError::NameUngueltigerAnfang(name));
        }
        if name.contains(NAME_TRENNZEICHEN) {
            return Err(RufpostError::NameEnthaeltTrennzeichen(name));
        }
        Ok(Self(name))
    }

    /// Erzeugt einen Namen aus den rohen Bytes der Anmeldung
    ///
    /// Umgebende Leerzeichen und NUL-Bytes werden entfernt, danach wird auf
    /// `max_laenge` Zeichen gekuerzt und validiert.
    pub fn aus_rohdaten(rohdaten: &[u8], max_laenge: usize) -> Result<Self> {
        let text = String::from_utf8_lossy(rohdaten);
        let getrimmt = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
        let gekuerzt: String = getrimmt.chars().take(max_laenge).collect();
        Self::neu(gekuerzt)
    }

    /// Gibt den Namen als String-Slice zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ClientName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ClientName {
    type Error = RufpostError;

    fn try_from(value: String) -> Result<Self> {
        Self::neu(value)
    }
}

impl From<ClientName> for String {
    fn from(name: ClientName) -> Self {
        name.0
    }
}
