//! Wire-Format fuer TCP-Verbindungen
//!
//! Das Protokoll kennt keine Rahmung: jeder Lesevorgang auf dem Socket ist
//! ein Payload. Der `PaketCodec` bildet das fuer `tokio_util::codec::Framed`
//! nach, indem er alle gepufferten Bytes (hoechstens `max_paket_groesse`)
//! als ein Paket ausgibt.
//!
//! ```text
//! Client                 Relay
//!   | "Alice"  ------------> |   Anmeldung
//!   | <------------ "0"      |   ConnAccepted
//!   | "Alice|Bob|hi" ------> |   Nachricht
//!   | <------------ "5"      |   MsgSuccess
//! ```

use bytes::{Bytes, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

use crate::status::StatusCode;

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-Paketgroesse (entspricht dem Empfangspuffer der Referenz-Clients)
pub const STANDARD_MAX_PAKET_GROESSE: usize = 512;

// ---------------------------------------------------------------------------
// PaketCodec
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer das ungerahmte ASCII-Protokoll
#[derive(Debug, Clone)]
pub struct PaketCodec {
    /// Maximale Groesse eines ausgegebenen Pakets in Bytes
    max_paket_groesse: usize,
}

impl PaketCodec {
    /// Erstellt einen neuen `PaketCodec` mit Standard-Limit
    pub fn new() -> Self {
        Self {
            max_paket_groesse: STANDARD_MAX_PAKET_GROESSE,
        }
    }

    /// Erstellt einen `PaketCodec` mit benutzerdefinierter Paketgroesse
    pub fn with_max_size(max_paket_groesse: usize) -> Self {
        Self {
            max_paket_groesse: max_paket_groesse.max(1),
        }
    }

    /// Gibt die konfigurierte maximale Paketgroesse zurueck
    pub fn max_paket_groesse(&self) -> usize {
        self.max_paket_groesse
    }
}

impl Default for PaketCodec {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Decoder-Implementierung
// ---------------------------------------------------------------------------

impl Decoder for PaketCodec {
    type Item = Bytes;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        // Groessere Puffer werden in mehrere Pakete aufgeteilt
        let laenge = src.len().min(self.max_paket_groesse);
        Ok(Some(src.split_to(laenge).freeze()))
    }
}

// ---------------------------------------------------------------------------
// Encoder-Implementierungen
// ---------------------------------------------------------------------------

impl Encoder<Bytes> for PaketCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&item);
        Ok(())
    }
}

impl Encoder<StatusCode> for PaketCodec {
    type Error = io::Error;

    fn encode(&mut self, item: StatusCode, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.encode(item.kodieren(), dst)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use tokio::io::AsyncWriteExt;
    use tokio_util::codec::Framed;

    #[test]
    fn leerer_puffer_liefert_nichts() {
        let mut codec = PaketCodec::new();
        let mut buf = BytesMut::new();
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn gepufferte_bytes_sind_ein_paket() {
        let mut codec = PaketCodec::new();
        let mut buf = BytesMut::from(&b"Alice|Bob|hallo"[..]);
        let paket = codec.decode(&mut buf).unwrap().expect("Paket erwartet");
        assert_eq!(&paket[..], b"Alice|Bob|hallo");
        assert!(buf.is_empty());
    }

    #[test]
    fn grosse_puffer_werden_aufgeteilt() {
        let mut codec = PaketCodec::with_max_size(4);
        let mut buf = BytesMut::from(&b"abcdefghij"[..]);

        let mut pakete = Vec::new();
        while let Some(p) = codec.decode(&mut buf).unwrap() {
            pakete.push(p);
        }
        assert_eq!(pakete.len(), 3);
        assert_eq!(&pakete[2][..], b"ij");
    }

    #[test]
    fn statuscode_wird_als_ziffer_geschrieben() {
        let mut codec = PaketCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(StatusCode::InvalidDest, &mut buf).unwrap();
        assert_eq!(&buf[..], b"7");
    }

    #[test]
    fn paketgroesse_mindestens_eins() {
        assert_eq!(PaketCodec::with_max_size(0).max_paket_groesse(), 1);
    }

    #[tokio::test]
    async fn framed_ueber_duplex() {
        let (client, server) = tokio::io::duplex(64);
        let mut server = Framed::new(server, PaketCodec::new());
        let mut client = client;

        client.write_all(b"Alice").await.unwrap();
        let paket = server.next().await.unwrap().unwrap();
        assert_eq!(&paket[..], b"Alice");

        server.send(StatusCode::ConnAccepted).await.unwrap();
        let mut antwort = [0u8; 8];
        let n = tokio::io::AsyncReadExt::read(&mut client, &mut antwort)
            .await
            .unwrap();
        assert_eq!(&antwort[..n], b"0");
    }
}
