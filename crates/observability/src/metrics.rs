//! Prometheus-kompatible Metriken fuer das Relay
//!
//! Registrierte Metriken:
//! - `rufpost_connected_clients` – Gauge: Aktuell verbundene Clients
//! - `rufpost_registrations_total` – Counter: Anmeldeversuche (ergebnis)
//! - `rufpost_forwards_total` – Counter: Weiterleitungen (ergebnis)
//! - `rufpost_confirmation_seconds` – Histogram: Wartezeit auf die Bestaetigung

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Alle Relay-Prometheus-Metriken
///
/// Clone teilt dieselbe Registry und dieselben Zaehler.
#[derive(Clone)]
pub struct RelayMetriken {
    pub registry: Arc<Registry>,
    pub connected_clients: IntGauge,
    pub registrations_total: IntCounterVec,
    pub forwards_total: IntCounterVec,
    pub confirmation_seconds: Histogram,
}

impl RelayMetriken {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let connected_clients = IntGauge::with_opts(Opts::new(
            "rufpost_connected_clients",
            "Anzahl aktuell verbundener Clients",
        ))?;
        registry.register(Box::new(connected_clients.clone()))?;

        let registrations_total = IntCounterVec::new(
            Opts::new("rufpost_registrations_total", "Anmeldeversuche nach Ergebnis"),
            &["ergebnis"],
        )?;
        registry.register(Box::new(registrations_total.clone()))?;

        let forwards_total = IntCounterVec::new(
            Opts::new("rufpost_forwards_total", "Weiterleitungen nach Ergebnis"),
            &["ergebnis"],
        )?;
        registry.register(Box::new(forwards_total.clone()))?;

        let confirmation_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "rufpost_confirmation_seconds",
                "Wartezeit auf die Empfangsbestaetigung in Sekunden",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;
        registry.register(Box::new(confirmation_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_clients,
            registrations_total,
            forwards_total,
            confirmation_seconds,
        })
    }

    /// Zaehlt einen Anmeldeversuch
    pub fn registrierung(&self, ergebnis: &str) {
        self.registrations_total.with_label_values(&[ergebnis]).inc();
    }

    /// Zaehlt eine abgeschlossene Weiterleitung
    pub fn weiterleitung(&self, ergebnis: &str) {
        self.forwards_total.with_label_values(&[ergebnis]).inc();
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: RelayMetriken) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<RelayMetriken>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metriken_erstellen_erfolgreich() {
        let metriken = RelayMetriken::neu().unwrap();
        assert!(!metriken.registry.gather().is_empty());
    }

    #[test]
    fn gauge_connected_clients() {
        let metriken = RelayMetriken::neu().unwrap();
        metriken.connected_clients.inc();
        metriken.connected_clients.inc();
        metriken.connected_clients.dec();
        assert_eq!(metriken.connected_clients.get(), 1);
    }

    #[test]
    fn counter_mit_labels() {
        let metriken = RelayMetriken::neu().unwrap();
        metriken.weiterleitung("erfolg");
        metriken.weiterleitung("erfolg");
        metriken.weiterleitung("ungueltiges_ziel");
        assert_eq!(
            metriken.forwards_total.with_label_values(&["erfolg"]).get(),
            2
        );
        assert_eq!(
            metriken
                .forwards_total
                .with_label_values(&["ungueltiges_ziel"])
                .get(),
            1
        );
    }

    #[test]
    fn clone_teilt_zaehler() {
        let m1 = RelayMetriken::neu().unwrap();
        let m2 = m1.clone();
        m1.registrierung("akzeptiert");
        assert_eq!(
            m2.registrations_total
                .with_label_values(&["akzeptiert"])
                .get(),
            1
        );
    }

    #[test]
    fn metriken_export_prometheus_format() {
        let metriken = RelayMetriken::neu().unwrap();
        metriken.connected_clients.set(5);
        metriken.registrierung("akzeptiert");
        metriken.confirmation_seconds.observe(0.02);

        let output = metriken.exportieren().unwrap();
        assert!(output.contains("rufpost_connected_clients 5"));
        assert!(output.contains("rufpost_registrations_total"));
        assert!(output.contains("rufpost_confirmation_seconds"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }
}
