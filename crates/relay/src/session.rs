//! Session und Verbindungs-Handle
//!
//! Eine `Session` ist der Registry-Eintrag eines angemeldeten Clients. Sie
//! haelt ein `SessionVerbindung`-Handle, ueber das andere Tasks Bytes an den
//! Client schicken und auf dessen Empfangsbestaetigung warten koennen.
//!
//! ## Bestaetigungs-Handshake
//! ```text
//! Sender-Task             SessionVerbindung (Ziel)         Ziel-Verbindungstask
//!     | zustellen() ---------> Sperre + Slot setzen
//!     |                        ausgang.send("A|text") ---->  schreibt auf Socket
//!     |                                                     liest "4"
//!     |                        Slot <-- bestaetigung_zustellen(4)
//!     | <--- Bestaetigt(4)
//! ```
//! Pro Ziel ist hoechstens eine Zustellung gleichzeitig offen, sodass eine
//! eingehende Ziffer eindeutig der wartenden Zustellung zugeordnet werden kann.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use rufpost_core::ClientName;
use rufpost_protocol::StatusCode;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{timeout_at, Instant};

use crate::error::{RelayError, RelayResult};

// ---------------------------------------------------------------------------
// Zustellung
// ---------------------------------------------------------------------------

/// Ergebnis einer Zustellung an ein Ziel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zustellung {
    /// Ziel hat mit dem enthaltenen Code geantwortet
    Bestaetigt(u32),
    /// Keine Antwort innerhalb des Zeitlimits
    Zeitlimit,
    /// Ziel hat sich waehrend der Zustellung getrennt
    Getrennt,
    /// Bytes konnten nicht an die Verbindung uebergeben werden
    SendFehler,
}

// ---------------------------------------------------------------------------
// SessionVerbindung
// ---------------------------------------------------------------------------

/// Exklusives Handle auf die Verbindung eines Clients
#[derive(Debug)]
pub struct SessionVerbindung {
    /// Ausgehende Bytes, geschrieben vom Verbindungstask
    ausgang: mpsc::Sender<Bytes>,
    /// Wartende Zustellung (hoechstens eine)
    bestaetigung: parking_lot::Mutex<Option<oneshot::Sender<u32>>>,
    /// Serialisiert Zustellungen an dieses Ziel
    weiterleitungs_sperre: tokio::sync::Mutex<()>,
    /// Gesetzt sobald die Session getrennt wurde
    geschlossen: AtomicBool,
}

impl SessionVerbindung {
    /// Erstellt ein neues Handle fuer den gegebenen Ausgangskanal
    pub fn neu(ausgang: mpsc::Sender<Bytes>) -> Arc<Self> {
        Arc::new(Self {
            ausgang,
            bestaetigung: parking_lot::Mutex::new(None),
            weiterleitungs_sperre: tokio::sync::Mutex::new(()),
            geschlossen: AtomicBool::new(false),
        })
    }

    /// Reiht Bytes zum Senden an den Client ein
    pub async fn senden(&self, daten: Bytes) -> RelayResult<()> {
        self.ausgang
            .send(daten)
            .await
            .map_err(|_| RelayError::SendFehler)
    }

    /// Reiht einen Statuscode zum Senden an den Client ein
    pub async fn status_senden(&self, code: StatusCode) -> RelayResult<()> {
        self.senden(code.kodieren()).await
    }

    /// Stellt Bytes zu und wartet begrenzt auf die Bestaetigung des Ziels
    ///
    /// Das Zeitlimit gilt fuer den gesamten Vorgang: Warten auf die Sperre,
    /// Einreihen in den Ausgangskanal und Warten auf die Bestaetigung.
    pub async fn zustellen(&self, daten: Bytes, zeitlimit: Duration) -> Zustellung {
        let frist = Instant::now() + zeitlimit;

        let _sperre = match timeout_at(frist, self.weiterleitungs_sperre.lock()).await {
            Ok(sperre) => sperre,
            Err(_) => return Zustellung::Zeitlimit,
        };

        let (tx, rx) = oneshot::channel();
        *self.bestaetigung.lock() = Some(tx);

        // Trennung zwischen Nachschlagen und Slot-Setzen
        if self.ist_geschlossen() {
            self.bestaetigung_verwerfen();
            return Zustellung::Getrennt;
        }

        match timeout_at(frist, self.ausgang.send(daten)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                self.bestaetigung_verwerfen();
                return Zustellung::SendFehler;
            }
            Err(_) => {
                // Ziel liest nicht, Ausgangskanal voll
                self.bestaetigung_verwerfen();
                return Zustellung::Zeitlimit;
            }
        }

        match timeout_at(frist, rx).await {
            Ok(Ok(wert)) => Zustellung::Bestaetigt(wert),
            Ok(Err(_)) => Zustellung::Getrennt,
            Err(_) => {
                self.bestaetigung_verwerfen();
                Zustellung::Zeitlimit
            }
        }
    }

    /// Uebergibt einen empfangenen Statuswert an die wartende Zustellung
    ///
    /// Gibt `false` zurueck wenn keine Zustellung wartet.
    pub fn bestaetigung_zustellen(&self, wert: u32) -> bool {
        match self.bestaetigung.lock().take() {
            Some(tx) => tx.send(wert).is_ok(),
            None => false,
        }
    }

    /// Prueft ob gerade eine Zustellung auf Bestaetigung wartet
    pub fn wartet_auf_bestaetigung(&self) -> bool {
        self.bestaetigung.lock().is_some()
    }

    /// Markiert die Verbindung als getrennt und loest wartende Zustellungen auf
    pub fn schliessen(&self) {
        self.geschlossen.store(true, Ordering::SeqCst);
        self.bestaetigung_verwerfen();
    }

    pub fn ist_geschlossen(&self) -> bool {
        self.geschlossen.load(Ordering::SeqCst)
    }

    fn bestaetigung_verwerfen(&self) {
        self.bestaetigung.lock().take();
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Registry-Eintrag eines Clients
///
/// Clone ist billig und teilt das Verbindungs-Handle.
#[derive(Debug, Clone)]
pub struct Session {
    pub name: ClientName,
    pub peer_addr: SocketAddr,
    pub verbunden: bool,
    /// Bei jeder (Neu-)Anmeldung des Namens hochgezaehlt
    pub generation: u64,
    pub verbunden_seit: DateTime<Utc>,
    pub verbindung: Arc<SessionVerbindung>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_verbindung() -> (Arc<SessionVerbindung>, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(8);
        (SessionVerbindung::neu(tx), rx)
    }

    #[tokio::test]
    async fn zustellung_wird_bestaetigt() {
        let (verbindung, mut rx) = test_verbindung();

        let v = Arc::clone(&verbindung);
        let zustellung = tokio::spawn(async move {
            v.zustellen(Bytes::from_static(b"A|hi"), Duration::from_secs(5))
                .await
        });

        let daten = rx.recv().await.expect("Daten erwartet");
        assert_eq!(&daten[..], b"A|hi");
        assert!(verbindung.wartet_auf_bestaetigung());
        assert!(verbindung.bestaetigung_zustellen(4));

        assert_eq!(zustellung.await.unwrap(), Zustellung::Bestaetigt(4));
        assert!(!verbindung.wartet_auf_bestaetigung());
    }

    #[tokio::test]
    async fn zustellung_ohne_antwort_laeuft_ab() {
        let (verbindung, _rx) = test_verbindung();
        let ergebnis = verbindung
            .zustellen(Bytes::from_static(b"A|hi"), Duration::from_millis(20))
            .await;
        assert_eq!(ergebnis, Zustellung::Zeitlimit);

        // Spaete Bestaetigung findet keinen Slot mehr
        assert!(!verbindung.bestaetigung_zustellen(4));
    }

    #[tokio::test]
    async fn schliessen_loest_wartende_zustellung() {
        let (verbindung, mut rx) = test_verbindung();

        let v = Arc::clone(&verbindung);
        let zustellung = tokio::spawn(async move {
            v.zustellen(Bytes::from_static(b"A|hi"), Duration::from_secs(30))
                .await
        });

        rx.recv().await.expect("Daten erwartet");
        verbindung.schliessen();

        assert_eq!(zustellung.await.unwrap(), Zustellung::Getrennt);
    }

    #[tokio::test]
    async fn geschlossene_verbindung_nimmt_nichts_an() {
        let (verbindung, mut rx) = test_verbindung();
        verbindung.schliessen();

        let ergebnis = verbindung
            .zustellen(Bytes::from_static(b"A|hi"), Duration::from_secs(1))
            .await;
        assert_eq!(ergebnis, Zustellung::Getrennt);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn beendeter_empfaenger_ist_sendfehler() {
        let (verbindung, rx) = test_verbindung();
        drop(rx);

        let ergebnis = verbindung
            .zustellen(Bytes::from_static(b"A|hi"), Duration::from_secs(1))
            .await;
        assert_eq!(ergebnis, Zustellung::SendFehler);
        assert!(verbindung.status_senden(StatusCode::MsgFailed).await.is_err());
    }

    #[tokio::test]
    async fn voller_ausgangskanal_respektiert_zeitlimit() {
        let (tx, _rx) = mpsc::channel(1);
        let verbindung = SessionVerbindung::neu(tx);
        verbindung
            .senden(Bytes::from_static(b"alt"))
            .await
            .unwrap();

        let ergebnis = tokio::time::timeout(
            Duration::from_secs(2),
            verbindung.zustellen(Bytes::from_static(b"A|hi"), Duration::from_millis(50)),
        )
        .await
        .expect("zustellen muss nach dem Zeitlimit zurueckkehren");

        assert_eq!(ergebnis, Zustellung::Zeitlimit);
        assert!(!verbindung.wartet_auf_bestaetigung());
    }

    #[tokio::test]
    async fn wartende_zustellung_teilt_die_frist() {
        let (verbindung, mut rx) = test_verbindung();

        let v = Arc::clone(&verbindung);
        let erste = tokio::spawn(async move {
            v.zustellen(Bytes::from_static(b"A|eins"), Duration::from_millis(100))
                .await
        });
        rx.recv().await.expect("Daten erwartet");

        // Zweite Zustellung haengt hinter der Sperre der ersten
        let start = std::time::Instant::now();
        let zweite = verbindung
            .zustellen(Bytes::from_static(b"B|zwei"), Duration::from_millis(50))
            .await;

        assert_eq!(zweite, Zustellung::Zeitlimit);
        assert!(start.elapsed() < Duration::from_millis(90));
        assert_eq!(erste.await.unwrap(), Zustellung::Zeitlimit);
    }

    #[tokio::test]
    async fn bestaetigung_ohne_zustellung_wird_ignoriert() {
        let (verbindung, _rx) = test_verbindung();
        assert!(!verbindung.bestaetigung_zustellen(4));
    }
}
