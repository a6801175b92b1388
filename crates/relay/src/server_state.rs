//! Gemeinsamer Relay-Zustand
//!
//! Haelt Konfiguration, Registry und Metriken als Arc-Referenzen, die sicher
//! zwischen tokio-Tasks geteilt werden koennen.

use rufpost_core::STANDARD_MAX_NAME_LAENGE;
use rufpost_observability::RelayMetriken;
use rufpost_protocol::wire::STANDARD_MAX_PAKET_GROESSE;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::registry::SessionRegistry;

/// Konfiguration fuer das Relay
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Maximale Namenslaenge in Zeichen, laengere Namen werden gekuerzt
    pub max_name_laenge: usize,
    /// Wartezeit auf den Namen nach dem Verbindungsaufbau
    pub name_timeout: Duration,
    /// Wartezeit auf die Bestaetigung des Empfaengers
    pub bestaetigung_timeout: Duration,
    /// Maximale Groesse eines gelesenen Pakets in Bytes
    pub puffer_groesse: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_name_laenge: STANDARD_MAX_NAME_LAENGE,
            name_timeout: Duration::from_millis(2000),
            bestaetigung_timeout: Duration::from_millis(5000),
            puffer_groesse: STANDARD_MAX_PAKET_GROESSE,
        }
    }
}

/// Gemeinsamer Relay-Zustand (thread-safe, Arc-geteilt)
pub struct RelayState {
    /// Relay-Konfiguration
    pub config: Arc<RelayConfig>,
    /// Name -> Session
    pub registry: SessionRegistry,
    /// Prometheus-Metriken
    pub metriken: RelayMetriken,
    /// Startzeitpunkt (fuer Uptime-Berechnung)
    pub start_time: Instant,
}

impl RelayState {
    /// Erstellt einen neuen RelayState
    pub fn neu(config: RelayConfig, metriken: RelayMetriken) -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(config),
            registry: SessionRegistry::neu(),
            metriken,
            start_time: Instant::now(),
        })
    }

    /// Uebertraegt die aktuelle Anzahl verbundener Clients in die Metriken
    pub fn verbunden_anzahl_melden(&self) {
        self.metriken
            .connected_clients
            .set(self.registry.verbunden_anzahl() as i64);
    }

    /// Gibt die Uptime in Sekunden zurueck
    pub fn uptime_sek(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
