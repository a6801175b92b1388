//! Klassifizierung und Zerlegung eingehender Payloads
//!
//! Ein Payload, dessen erstes Byte eine ASCII-Ziffer ist, gilt als
//! Statussignal. Alles andere ist eine Anwendungsnachricht im Format
//! `quelle|ziel|text`.
//!
//! Beim Zerlegen gelten Folgen von Trennzeichen als ein einziger Trenner und
//! fuehrende Trennzeichen werden ignoriert. Der Text ist der komplette Rest
//! nach dem zweiten Trenner und darf selbst `|` enthalten.

use bytes::{BufMut, Bytes, BytesMut};
use rufpost_core::NAME_TRENNZEICHEN;

use crate::error::{ProtokollFehler, ProtokollResult};
use crate::status::StatusCode;

const TRENNER: u8 = NAME_TRENNZEICHEN as u8;

// ---------------------------------------------------------------------------
// Eingang
// ---------------------------------------------------------------------------

/// Ein klassifizierter eingehender Payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eingang {
    /// Bekannter Statuscode
    Status(StatusCode),
    /// Numerischer Payload ausserhalb des Vokabulars
    UnbekannterStatus(u32),
    /// Weiterzuleitende Anwendungsnachricht
    Nachricht(Nachricht),
}

impl Eingang {
    /// Klassifiziert einen Payload als Statussignal oder Nachricht
    pub fn klassifizieren(payload: &[u8]) -> ProtokollResult<Self> {
        let erstes = *payload.first().ok_or(ProtokollFehler::LeererPayload)?;

        if erstes.is_ascii_digit() {
            let wert = fuehrende_zahl(payload);
            return Ok(match StatusCode::aus_wert(wert) {
                Some(code) => Eingang::Status(code),
                None => Eingang::UnbekannterStatus(wert),
            });
        }

        Nachricht::parsen(payload).map(Eingang::Nachricht)
    }
}

/// Liest die fuehrenden Dezimalziffern (wie `atoi`, saettigend)
fn fuehrende_zahl(payload: &[u8]) -> u32 {
    payload
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .fold(0u32, |acc, b| {
            acc.saturating_mul(10).saturating_add(u32::from(b - b'0'))
        })
}

// ---------------------------------------------------------------------------
// Nachricht
// ---------------------------------------------------------------------------

/// Eine Anwendungsnachricht `quelle|ziel|text`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nachricht {
    /// Name des Absenders
    pub quelle: String,
    /// Name des Empfaengers
    pub ziel: String,
    /// Nutzdaten, unveraendert weitergereicht
    pub text: Bytes,
}

impl Nachricht {
    /// Zerlegt einen Payload in Quelle, Ziel und Text
    pub fn parsen(payload: &[u8]) -> ProtokollResult<Self> {
        let (quelle, rest) = naechstes_feld(payload).ok_or_else(|| format_fehler(payload))?;
        let (ziel, rest) = naechstes_feld(rest).ok_or_else(|| format_fehler(payload))?;

        let text = trenner_ueberspringen(rest);
        if text.is_empty() {
            return Err(format_fehler(payload));
        }

        Ok(Self {
            quelle: String::from_utf8_lossy(quelle).into_owned(),
            ziel: String::from_utf8_lossy(ziel).into_owned(),
            text: Bytes::copy_from_slice(text),
        })
    }

    /// Kodiert die Form, die beim Empfaenger ankommt: `quelle|text`
    pub fn weiterleitung_kodieren(&self) -> Bytes {
        let mut puffer = BytesMut::with_capacity(self.quelle.len() + 1 + self.text.len());
        puffer.put_slice(self.quelle.as_bytes());
        puffer.put_u8(TRENNER);
        puffer.put_slice(&self.text);
        puffer.freeze()
    }
}

fn trenner_ueberspringen(eingabe: &[u8]) -> &[u8] {
    let start = eingabe
        .iter()
        .position(|&b| b != TRENNER)
        .unwrap_or(eingabe.len());
    &eingabe[start..]
}

/// Liefert das naechste nicht-leere Feld und den Rest ab dem Trenner
fn naechstes_feld(eingabe: &[u8]) -> Option<(&[u8], &[u8])> {
    let eingabe = trenner_ueberspringen(eingabe);
    let ende = eingabe.iter().position(|&b| b == TRENNER)?;
    if ende == 0 {
        return None;
    }
    Some((&eingabe[..ende], &eingabe[ende..]))
}

fn format_fehler(payload: &[u8]) -> ProtokollFehler {
    ProtokollFehler::UngueltigesFormat(String::from_utf8_lossy(payload).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn einfache_nachricht() {
        let n = Nachricht::parsen(b"A|B|hello").unwrap();
        assert_eq!(n.quelle, "A");
        assert_eq!(n.ziel, "B");
        assert_eq!(&n.text[..], b"hello");
    }

    #[test]
    fn trennerfolgen_werden_zusammengefasst() {
        let n = Nachricht::parsen(b"||A|||B||hello").unwrap();
        assert_eq!(n.quelle, "A");
        assert_eq!(n.ziel, "B");
        assert_eq!(&n.text[..], b"hello");
    }

    #[test]
    fn text_darf_trennzeichen_enthalten() {
        let n = Nachricht::parsen(b"A|B|x|y||z").unwrap();
        assert_eq!(&n.text[..], b"x|y||z");
    }

    #[test]
    fn text_mit_beliebigen_bytes() {
        let n = Nachricht::parsen(b"A|B|\xff\x00ok").unwrap();
        assert_eq!(&n.text[..], b"\xff\x00ok");
    }

    #[test]
    fn fehlende_felder_sind_ungueltig() {
        assert!(matches!(
            Nachricht::parsen(b"hallo"),
            Err(ProtokollFehler::UngueltigesFormat(_))
        ));
        assert!(Nachricht::parsen(b"A|B").is_err());
        assert!(Nachricht::parsen(b"A|B|").is_err());
        assert!(Nachricht::parsen(b"A||||").is_err());
        assert!(Nachricht::parsen(b"|||").is_err());
    }

    #[test]
    fn weiterleitung_hat_quelle_und_text() {
        let n = Nachricht::parsen(b"A|B|hello").unwrap();
        assert_eq!(&n.weiterleitung_kodieren()[..], b"A|hello");
    }

    #[test]
    fn ziffer_am_anfang_ist_status() {
        assert_eq!(
            Eingang::klassifizieren(b"1").unwrap(),
            Eingang::Status(StatusCode::Disconnect)
        );
        assert_eq!(
            Eingang::klassifizieren(b"4").unwrap(),
            Eingang::Status(StatusCode::MsgReceived)
        );
    }

    #[test]
    fn nur_fuehrende_ziffern_zaehlen() {
        assert_eq!(
            Eingang::klassifizieren(b"4\r\n").unwrap(),
            Eingang::Status(StatusCode::MsgReceived)
        );
        assert_eq!(
            Eingang::klassifizieren(b"42abc").unwrap(),
            Eingang::UnbekannterStatus(42)
        );
    }

    #[test]
    fn riesige_zahl_saettigt() {
        assert_eq!(
            Eingang::klassifizieren(b"99999999999999999999").unwrap(),
            Eingang::UnbekannterStatus(u32::MAX)
        );
    }

    #[test]
    fn text_wird_als_nachricht_klassifiziert() {
        let eingang = Eingang::klassifizieren(b"A|B|hi").unwrap();
        assert!(matches!(eingang, Eingang::Nachricht(n) if n.ziel == "B"));
    }

    #[test]
    fn leerer_payload() {
        assert_eq!(
            Eingang::klassifizieren(b""),
            Err(ProtokollFehler::LeererPayload)
        );
    }
}
