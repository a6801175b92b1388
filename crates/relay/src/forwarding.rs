//! Weiterleitung von Nachrichten mit Empfangsbestaetigung
//!
//! ```text
//! Alice                    Relay                      Bob
//!   | "Alice|Bob|hi" ------> |                          |
//!   |                        | "Alice|hi" ------------> |
//!   |                        | <-------------------- "4"|
//!   | <------------------ "5"|                          |
//! ```

use rufpost_protocol::{Nachricht, StatusCode};
use std::sync::Arc;
use std::time::Instant;

use crate::server_state::RelayState;
use crate::session::{Session, Zustellung};

/// Leitet eine Nachricht an ihr Ziel weiter
///
/// Gibt den Statuscode zurueck, den der Absender erhalten soll, oder `None`
/// wenn keine Antwort gesendet wird.
pub async fn weiterleiten(
    state: &Arc<RelayState>,
    absender: &Session,
    nachricht: Nachricht,
) -> Option<StatusCode> {
    match state.registry.nachschlagen(&nachricht.quelle) {
        Some(quelle) if quelle.name == absender.name => {}
        Some(_) => {
            tracing::error!(
                name = %absender.name,
                quelle = %nachricht.quelle,
                "Quelle passt nicht zur lesenden Session"
            );
            state.metriken.weiterleitung("inkonsistent");
            return None;
        }
        None => {
            tracing::error!(
                name = %absender.name,
                quelle = %nachricht.quelle,
                "Quelle nicht in der Registry"
            );
            state.metriken.weiterleitung("inkonsistent");
            return None;
        }
    }

    let ziel = match state.registry.nachschlagen(&nachricht.ziel) {
        Some(s) if s.verbunden => s,
        _ => {
            tracing::info!(
                quelle = %nachricht.quelle,
                ziel = %nachricht.ziel,
                "Ziel nicht erreichbar"
            );
            state.metriken.weiterleitung("ungueltiges_ziel");
            return Some(StatusCode::InvalidDest);
        }
    };

    let start = Instant::now();
    let zustellung = ziel
        .verbindung
        .zustellen(
            nachricht.weiterleitung_kodieren(),
            state.config.bestaetigung_timeout,
        )
        .await;

    let antwort = match zustellung {
        Zustellung::Bestaetigt(wert) if wert == u32::from(StatusCode::MsgReceived.wert()) => {
            state
                .metriken
                .confirmation_seconds
                .observe(start.elapsed().as_secs_f64());
            tracing::debug!(
                quelle = %nachricht.quelle,
                ziel = %nachricht.ziel,
                bytes = nachricht.text.len(),
                "Nachricht zugestellt"
            );
            state.metriken.weiterleitung("erfolg");
            StatusCode::MsgSuccess
        }
        Zustellung::Bestaetigt(wert) => {
            tracing::warn!(
                quelle = %nachricht.quelle,
                ziel = %nachricht.ziel,
                code = wert,
                "Unerwartete Bestaetigung"
            );
            state.metriken.weiterleitung("abgelehnt");
            StatusCode::MsgFailed
        }
        Zustellung::Zeitlimit => {
            tracing::warn!(
                quelle = %nachricht.quelle,
                ziel = %nachricht.ziel,
                "Keine Bestaetigung innerhalb des Zeitlimits"
            );
            state.metriken.weiterleitung("zeitlimit");
            StatusCode::MsgFailed
        }
        Zustellung::Getrennt | Zustellung::SendFehler => {
            tracing::warn!(
                quelle = %nachricht.quelle,
                ziel = %nachricht.ziel,
                ergebnis = ?zustellung,
                "Ziel waehrend der Zustellung verloren"
            );
            state.metriken.weiterleitung("getrennt");
            StatusCode::MsgFailed
        }
    };

    Some(antwort)
}
