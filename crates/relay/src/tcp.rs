//! TCP-Listener – Bindet Socket, akzeptiert Verbindungen
//!
//! Der `RelayServer` bindet einen TCP-Socket und startet fuer jede
//! eingehende Verbindung einen eigenen tokio-Task mit einer `ClientConnection`.
//!
//! ## Lebenszyklus
//! ```text
//! Leerlauf -> Lauscht -> Laeuft -> Gestoppt
//!   neu()     binden()   starten()  Shutdown
//! ```
//! Der aktuelle Zustand wird ueber einen `watch`-Kanal veroeffentlicht.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::connection::ClientConnection;
use crate::error::{RelayError, RelayResult};
use crate::server_state::RelayState;

/// Lebenszyklus-Zustand des Servers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerZustand {
    /// Erstellt, noch kein Socket
    Leerlauf,
    /// Socket gebunden, noch keine Verbindungen angenommen
    Lauscht,
    /// Accept-Loop laeuft
    Laeuft,
    /// Beendet (endgueltig)
    Gestoppt,
}

/// TCP-Relay-Server
pub struct RelayServer {
    state: Arc<RelayState>,
    bind_addr: SocketAddr,
    listener: Option<TcpListener>,
    zustand_tx: watch::Sender<ServerZustand>,
}

impl RelayServer {
    /// Erstellt einen neuen RelayServer im Zustand `Leerlauf`
    pub fn neu(state: Arc<RelayState>, bind_addr: SocketAddr) -> Self {
        let (zustand_tx, _) = watch::channel(ServerZustand::Leerlauf);
        Self {
            state,
            bind_addr,
            listener: None,
            zustand_tx,
        }
    }

    /// Gibt den aktuellen Zustand zurueck
    pub fn zustand(&self) -> ServerZustand {
        *self.zustand_tx.borrow()
    }

    /// Abonniert Zustandsaenderungen
    pub fn zustand_abonnieren(&self) -> watch::Receiver<ServerZustand> {
        self.zustand_tx.subscribe()
    }

    /// Bindet den TCP-Socket und gibt die tatsaechliche Adresse zurueck
    ///
    /// Port 0 waehlt einen freien Port.
    pub async fn binden(&mut self) -> RelayResult<SocketAddr> {
        if self.zustand() != ServerZustand::Leerlauf {
            return Err(RelayError::UngueltigerZustand(format!(
                "binden im Zustand {:?}",
                self.zustand()
            )));
        }

        let listener = TcpListener::bind(self.bind_addr).await?;
        let lokale_addr = listener.local_addr()?;
        self.listener = Some(listener);
        self.zustand_tx.send_replace(ServerZustand::Lauscht);

        tracing::info!(adresse = %lokale_addr, "Relay lauscht");
        Ok(lokale_addr)
    }

    /// Gibt die gebundene Adresse zurueck (nur nach `binden`)
    pub fn lokale_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Startet die Accept-Loop
    ///
    /// Bindet selbst, falls `binden` noch nicht aufgerufen wurde. Laeuft bis
    /// `shutdown_rx` ein `true`-Signal empfaengt.
    pub async fn starten(mut self, mut shutdown_rx: watch::Receiver<bool>) -> RelayResult<()> {
        if self.listener.is_none() {
            self.binden().await?;
        }
        let listener = self
            .listener
            .take()
            .ok_or_else(|| RelayError::intern("Listener fehlt nach binden"))?;

        self.zustand_tx.send_replace(ServerZustand::Laeuft);
        tracing::info!(
            adresse = %listener.local_addr()?,
            "Relay-Server gestartet"
        );

        loop {
            tokio::select! {
                // Neue eingehende Verbindung
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            tracing::debug!(peer = %peer_addr, "Verbindung akzeptiert");

                            let verbindung = ClientConnection::neu(
                                Arc::clone(&self.state),
                                peer_addr,
                            );
                            let shutdown_rx_clone = shutdown_rx.clone();

                            tokio::spawn(async move {
                                verbindung.verarbeiten(stream, shutdown_rx_clone).await;
                            });
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Relay-Server: Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        self.zustand_tx.send_replace(ServerZustand::Gestoppt);
        tracing::info!(
            verbunden = self.state.registry.verbunden_anzahl(),
            "Relay-Server gestoppt"
        );
        Ok(())
    }

    /// Gibt die konfigurierte Bind-Adresse zurueck
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}
