//! Client-Connection – Verwaltet eine einzelne TCP-Verbindung
//!
//! Jede TCP-Verbindung bekommt eine `ClientConnection` in einem eigenen
//! tokio-Task.
//!
//! ## Ablauf
//! ```text
//! Verbunden -> Anmeldung -> Angemeldet -> Getrennt
//!                 |                          ^
//!                 +---- MissingName ---------+
//! ```
//!
//! Nach der Anmeldung wird der Stream geteilt: ein Schreib-Task leert den
//! Ausgangskanal der Session, die Leseschleife verarbeitet Statussignale und
//! startet fuer jede Nachricht einen eigenen Weiterleitungs-Task.

use bytes::Bytes;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use rufpost_protocol::{Eingang, PaketCodec, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio_util::codec::Framed;

use crate::forwarding;
use crate::registration;
use crate::server_state::RelayState;
use crate::session::Session;

/// Verarbeitet eine einzelne Client-Verbindung
pub struct ClientConnection {
    state: Arc<RelayState>,
    peer_addr: SocketAddr,
}

impl ClientConnection {
    /// Erstellt eine neue ClientConnection
    pub fn neu(state: Arc<RelayState>, peer_addr: SocketAddr) -> Self {
        Self { state, peer_addr }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Laeuft bis der Client sich trennt, die Verbindung abbricht oder ein
    /// Shutdown-Signal eingeht.
    pub async fn verarbeiten<S>(self, stream: S, mut shutdown_rx: watch::Receiver<bool>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let peer_addr = self.peer_addr;
        tracing::debug!(peer = %peer_addr, "Neue Verbindung");

        let codec = PaketCodec::with_max_size(self.state.config.puffer_groesse);
        let mut framed = Framed::new(stream, codec);

        let anmeldung = tokio::select! {
            ergebnis = registration::registrieren(&self.state, &mut framed, peer_addr) => ergebnis,
            _ = shutdown_abwarten(&mut shutdown_rx) => {
                tracing::debug!(peer = %peer_addr, "Shutdown waehrend der Anmeldung");
                return;
            }
        };

        let (session, ausgang_rx) = match anmeldung {
            Ok(a) => a,
            Err(e) => {
                tracing::debug!(peer = %peer_addr, fehler = %e, "Anmeldung abgebrochen");
                return;
            }
        };

        let (schreiber, mut leser) = framed.split();
        let schreib_task = tokio::spawn(schreiben(schreiber, ausgang_rx, peer_addr));

        loop {
            tokio::select! {
                payload = leser.next() => {
                    match payload {
                        Some(Ok(payload)) => {
                            if !self.payload_verarbeiten(&session, &payload) {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!(
                                name = %session.name,
                                fehler = %e,
                                "Lesefehler"
                            );
                            break;
                        }
                        None => {
                            tracing::info!(name = %session.name, "Verbindung vom Client getrennt");
                            break;
                        }
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::debug!(name = %session.name, "Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        // Aufraeumen
        if self
            .state
            .registry
            .trennen_generation(session.name.as_str(), session.generation)
        {
            tracing::info!(
                name = %session.name,
                verbunden = self.state.registry.verbunden_anzahl(),
                "Client getrennt"
            );
        }
        self.state.verbunden_anzahl_melden();
        schreib_task.abort();
    }

    /// Verarbeitet einen gelesenen Payload
    ///
    /// Gibt `false` zurueck wenn die Verbindung beendet werden soll.
    fn payload_verarbeiten(&self, session: &Session, payload: &Bytes) -> bool {
        match Eingang::klassifizieren(payload) {
            Ok(Eingang::Status(StatusCode::Disconnect)) => {
                tracing::debug!(name = %session.name, "Disconnect empfangen");
                false
            }
            Ok(Eingang::Status(code)) => {
                self.status_verarbeiten(session, u32::from(code.wert()));
                true
            }
            Ok(Eingang::UnbekannterStatus(wert)) => {
                self.status_verarbeiten(session, wert);
                true
            }
            Ok(Eingang::Nachricht(nachricht)) => {
                let state = Arc::clone(&self.state);
                let absender = session.clone();
                tokio::spawn(async move {
                    if let Some(antwort) =
                        forwarding::weiterleiten(&state, &absender, nachricht).await
                    {
                        if let Err(e) = absender.verbindung.status_senden(antwort).await {
                            tracing::warn!(
                                name = %absender.name,
                                fehler = %e,
                                "Antwort an Absender nicht zustellbar"
                            );
                        }
                    }
                });
                true
            }
            Err(e) => {
                tracing::warn!(name = %session.name, fehler = %e, "Ungueltige Nachricht");
                self.state.metriken.weiterleitung("ungueltig");
                let verbindung = Arc::clone(&session.verbindung);
                let name = session.name.clone();
                tokio::spawn(async move {
                    if let Err(e) = verbindung.status_senden(StatusCode::MsgFailed).await {
                        tracing::warn!(
                            name = %name,
                            fehler = %e,
                            "Antwort an Absender nicht zustellbar"
                        );
                    }
                });
                true
            }
        }
    }

    fn status_verarbeiten(&self, session: &Session, wert: u32) {
        if session.verbindung.bestaetigung_zustellen(wert) {
            tracing::trace!(name = %session.name, code = wert, "Bestaetigung zugestellt");
            return;
        }

        match StatusCode::aus_wert(wert) {
            Some(code) => {
                tracing::warn!(name = %session.name, code = %code, "Unbehandelter Statuscode")
            }
            None => {
                tracing::warn!(name = %session.name, code = wert, "Unbekannter Statuscode")
            }
        }
    }
}

/// Wartet bis das Shutdown-Signal gesetzt ist
async fn shutdown_abwarten(shutdown_rx: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow() {
            return;
        }
        if shutdown_rx.changed().await.is_err() {
            // Sender weg, es kommt kein Signal mehr
            std::future::pending::<()>().await;
        }
    }
}

/// Schreibt alle Bytes aus dem Ausgangskanal auf die Verbindung
async fn schreiben<S>(
    mut schreiber: SplitSink<Framed<S, PaketCodec>, Bytes>,
    mut ausgang_rx: mpsc::Receiver<Bytes>,
    peer_addr: SocketAddr,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(daten) = ausgang_rx.recv().await {
        if let Err(e) = schreiber.send(daten).await {
            tracing::warn!(peer = %peer_addr, fehler = %e, "Senden fehlgeschlagen");
            break;
        }
    }
}
