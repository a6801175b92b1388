//! rufpost-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;

use anyhow::Result;
use config::ServerConfig;
use rufpost_observability::RelayMetriken;
use rufpost_relay::{RelayServer, RelayState};
use std::future::Future;
use tokio::sync::watch;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Server-Subsysteme und laeuft bis Ctrl-C
    pub async fn starten(self) -> Result<()> {
        self.laufen(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(fehler = %e, "Ctrl-C-Handler nicht verfuegbar");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Startet alle Server-Subsysteme und laeuft bis `stopp` fertig ist
    ///
    /// Reihenfolge:
    /// 1. Metriken und Relay-Zustand anlegen
    /// 2. Relay-Socket binden (Fehler beendet den Prozess)
    /// 3. Observability-Server starten (optional)
    /// 4. Accept-Loop starten und auf das Stopp-Signal warten
    pub async fn laufen(self, stopp: impl Future<Output = ()>) -> Result<()> {
        let metriken = RelayMetriken::neu()?;
        let state = RelayState::neu(self.config.relay_config(), metriken.clone());

        let mut relay = RelayServer::neu(state, self.config.relay_bind_adresse()?);
        let adresse = relay.binden().await?;

        tracing::info!(
            adresse = %adresse,
            name_timeout_ms = self.config.relay.name_timeout_ms,
            bestaetigung_timeout_ms = self.config.relay.bestaetigung_timeout_ms,
            "Server startet"
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let observability_task = if self.config.observability.aktiviert {
            let bind_addr = self.config.observability_bind_adresse()?;
            let rx = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                if let Err(e) =
                    rufpost_observability::observability_server_starten(bind_addr, metriken, rx)
                        .await
                {
                    tracing::error!(fehler = %e, "Observability-Server beendet");
                }
            }))
        } else {
            None
        };

        let relay_task = tokio::spawn(relay.starten(shutdown_rx));

        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        stopp.await;
        tracing::info!("Shutdown-Signal empfangen, Server wird beendet");

        // Empfaenger koennen schon weg sein
        let _ = shutdown_tx.send(true);

        relay_task.await??;
        if let Some(task) = observability_task {
            task.await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ServerConfig {
        let mut config = ServerConfig::default();
        config.netzwerk.bind_adresse = "127.0.0.1".into();
        config.netzwerk.port = 0;
        config
    }

    #[tokio::test]
    async fn server_startet_und_stoppt() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(Server::neu(test_config()).laufen(async {
            let _ = rx.await;
        }));

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn ungueltige_adresse_beendet_start() {
        let mut config = test_config();
        config.netzwerk.bind_adresse = "kein-host".into();

        let ergebnis = Server::neu(config).laufen(async {}).await;
        assert!(ergebnis.is_err());
    }
}
