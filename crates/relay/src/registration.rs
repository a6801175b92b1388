//! Anmeldung – Name empfangen, pruefen, registrieren
//!
//! ```text
//! Client                         Relay
//!   | connect ------------------> |
//!   | "Alice" ------------------> |  trimmen, kuerzen, pruefen
//!   | <-------------------- "0"   |  ConnAccepted
//!
//!   | "Alice" ------------------> |  Name vergeben oder ungueltig
//!   | <-------------------- "2"   |  InvalidName, neuer Versuch moeglich
//!
//!   | (nichts innerhalb Zeitlimit)|
//!   | <-------------------- "3"   |  MissingName, Verbindung wird geschlossen
//! ```

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use rufpost_core::ClientName;
use rufpost_protocol::{PaketCodec, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;

use crate::error::{RelayError, RelayResult};
use crate::server_state::{RelayConfig, RelayState};
use crate::session::{Session, SessionVerbindung};

/// Kapazitaet des Ausgangskanals einer Session
const AUSGANG_KAPAZITAET: usize = 64;

/// Wartet begrenzt auf den naechsten Payload mit dem Namen
///
/// Zeitlimit, EOF und Lesefehler ergeben `NameNichtEmpfangen`.
pub async fn name_empfangen<S>(
    framed: &mut Framed<S, PaketCodec>,
    config: &RelayConfig,
) -> RelayResult<Bytes>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match tokio::time::timeout(config.name_timeout, framed.next()).await {
        Ok(Some(Ok(payload))) => Ok(payload),
        Ok(Some(Err(e))) => Err(RelayError::NameNichtEmpfangen(format!("Lesefehler: {e}"))),
        Ok(None) => Err(RelayError::NameNichtEmpfangen(
            "Verbindung geschlossen".into(),
        )),
        Err(_) => Err(RelayError::NameNichtEmpfangen(format!(
            "Zeitlimit von {} ms ueberschritten",
            config.name_timeout.as_millis()
        ))),
    }
}

/// Fuehrt die Anmeldung auf einer frischen Verbindung durch
///
/// Bei Erfolg ist `ConnAccepted` bereits geschrieben und die Session
/// registriert. Der zurueckgegebene Empfaenger liefert alle Bytes, die
/// andere Tasks an diesen Client senden wollen.
pub async fn registrieren<S>(
    state: &Arc<RelayState>,
    framed: &mut Framed<S, PaketCodec>,
    peer_addr: SocketAddr,
) -> RelayResult<(Session, mpsc::Receiver<Bytes>)>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let rohdaten = match name_empfangen(framed, &state.config).await {
            Ok(r) => r,
            Err(e) => return kein_name(state, framed, peer_addr, e).await,
        };

        let name = match ClientName::aus_rohdaten(&rohdaten, state.config.max_name_laenge) {
            Ok(n) => n,
            Err(rufpost_core::RufpostError::NameLeer) => {
                let e = RelayError::NameNichtEmpfangen("leerer Name".into());
                return kein_name(state, framed, peer_addr, e).await;
            }
            Err(e) => {
                tracing::info!(peer = %peer_addr, fehler = %e, "Name abgelehnt");
                state.metriken.registrierung("ungueltig");
                framed.send(StatusCode::InvalidName).await?;
                continue;
            }
        };

        let (tx, rx) = mpsc::channel(AUSGANG_KAPAZITAET);
        match state
            .registry
            .registrieren(name, peer_addr, SessionVerbindung::neu(tx))
        {
            Ok(session) => {
                state.metriken.registrierung("akzeptiert");
                state.verbunden_anzahl_melden();
                framed.send(StatusCode::ConnAccepted).await?;
                tracing::info!(
                    name = %session.name,
                    peer = %peer_addr,
                    verbunden = state.registry.verbunden_anzahl(),
                    "Client angemeldet"
                );
                return Ok((session, rx));
            }
            Err(RelayError::NameVergeben(name)) => {
                tracing::info!(name = %name, peer = %peer_addr, "Name bereits vergeben");
                state.metriken.registrierung("vergeben");
                framed.send(StatusCode::InvalidName).await?;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn kein_name<S>(
    state: &Arc<RelayState>,
    framed: &mut Framed<S, PaketCodec>,
    peer_addr: SocketAddr,
    fehler: RelayError,
) -> RelayResult<(Session, mpsc::Receiver<Bytes>)>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    tracing::warn!(peer = %peer_addr, fehler = %fehler, "Anmeldung ohne Namen");
    state.metriken.registrierung("kein_name");

    // Gegenstelle ist evtl. schon weg
    if let Err(e) = framed.send(StatusCode::MissingName).await {
        tracing::debug!(peer = %peer_addr, fehler = %e, "MissingName nicht zustellbar");
    }
    Err(fehler)
}
