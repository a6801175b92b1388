//! Session-Registry – Name -> Session
//!
//! Die Registry ist alleiniger Besitzer aller Sessions. Ein Name ist
//! eindeutig unter den *verbundenen* Sessions; getrennte Sessions bleiben als
//! Tombstone stehen und koennen von einer spaeteren Anmeldung unter demselben
//! Namen ueberschrieben werden.
//!
//! Thread-safe via Arc + DashMap. Die Pruefung "Name frei?" und das Einfuegen
//! laufen unter derselben Shard-Sperre (Entry-API), zwei gleichzeitige
//! Anmeldungen koennen also nie beide denselben Namen erhalten.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rufpost_core::ClientName;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{RelayError, RelayResult};
use crate::session::{Session, SessionVerbindung};

/// Verwaltet alle Sessions des Relays
///
/// Clone der Registry teilt den inneren Zustand.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<SessionRegistryInner>,
}

struct SessionRegistryInner {
    /// Alle Sessions inklusive Tombstones, indiziert nach Name
    sessions: DashMap<String, Session>,
    /// Anzahl Sessions mit `verbunden == true`
    verbunden: AtomicUsize,
    /// Letzte vergebene Generation
    generation: AtomicU64,
}

impl SessionRegistry {
    /// Erstellt eine leere Registry
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(SessionRegistryInner {
                sessions: DashMap::new(),
                verbunden: AtomicUsize::new(0),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Gibt die Session zu einem Namen zurueck, unabhaengig vom Verbindungsstatus
    pub fn nachschlagen(&self, name: &str) -> Option<Session> {
        self.inner.sessions.get(name).map(|e| e.clone())
    }

    /// Prueft ob ein Name frei ist (kein Eintrag oder nur ein Tombstone)
    pub fn name_verfuegbar(&self, name: &str) -> bool {
        self.inner
            .sessions
            .get(name)
            .map_or(true, |e| !e.verbunden)
    }

    /// Meldet eine neue Session an
    ///
    /// Schlaegt mit `NameVergeben` fehl wenn eine verbundene Session den
    /// Namen haelt; die bestehende Session bleibt dann unveraendert.
    pub fn registrieren(
        &self,
        name: ClientName,
        peer_addr: SocketAddr,
        verbindung: Arc<SessionVerbindung>,
    ) -> RelayResult<Session> {
        let session = match self.inner.sessions.entry(name.as_str().to_owned()) {
            Entry::Occupied(e) if e.get().verbunden => {
                return Err(RelayError::NameVergeben(name.to_string()));
            }
            Entry::Occupied(mut e) => {
                let session = self.neue_session(name, peer_addr, verbindung);
                e.insert(session.clone());
                session
            }
            Entry::Vacant(e) => {
                let session = self.neue_session(name, peer_addr, verbindung);
                e.insert(session.clone());
                session
            }
        };

        self.inner.verbunden.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            name = %session.name,
            generation = session.generation,
            "Session registriert"
        );
        Ok(session)
    }

    /// Trennt eine Session (Soft-Delete, der Eintrag bleibt als Tombstone)
    ///
    /// Mehrfacher Aufruf ist unschaedlich. Gibt `true` zurueck wenn die
    /// Session bis eben verbunden war.
    pub fn trennen(&self, name: &str) -> bool {
        self.trennen_wenn(name, |_| true)
    }

    /// Trennt eine Session nur wenn sie noch zur angegebenen Generation gehoert
    ///
    /// Verhindert dass ein alter Verbindungstask eine neuere Session unter
    /// demselben Namen trennt.
    pub fn trennen_generation(&self, name: &str, generation: u64) -> bool {
        self.trennen_wenn(name, |s| s.generation == generation)
    }

    /// Anzahl aktuell verbundener Sessions
    pub fn verbunden_anzahl(&self) -> usize {
        self.inner.verbunden.load(Ordering::SeqCst)
    }

    /// Namen aller verbundenen Sessions (sortiert, nur zur Diagnose)
    pub fn verbundene_namen(&self) -> Vec<String> {
        let mut namen: Vec<String> = self
            .inner
            .sessions
            .iter()
            .filter(|e| e.verbunden)
            .map(|e| e.key().clone())
            .collect();
        namen.sort();
        namen
    }

    /// Alle Sessions inklusive Tombstones (nur zur Diagnose)
    pub fn alle_sessions(&self) -> Vec<Session> {
        self.inner
            .sessions
            .iter()
            .map(|e| e.value().clone())
            .collect()
    }

    // -----------------------------------------------------------------------
    // Interne Hilfsmethoden
    // -----------------------------------------------------------------------

    fn neue_session(
        &self,
        name: ClientName,
        peer_addr: SocketAddr,
        verbindung: Arc<SessionVerbindung>,
    ) -> Session {
        Session {
            name,
            peer_addr,
            verbunden: true,
            generation: self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1,
            verbunden_seit: Utc::now(),
            verbindung,
        }
    }

    fn trennen_wenn(&self, name: &str, bedingung: impl FnOnce(&Session) -> bool) -> bool {
        let mut eintrag = match self.inner.sessions.get_mut(name) {
            Some(e) => e,
            None => {
                tracing::warn!(name = %name, "Trennung fuer unbekannten Namen");
                return false;
            }
        };

        if !eintrag.verbunden || !bedingung(eintrag.value()) {
            return false;
        }

        eintrag.verbunden = false;
        eintrag.verbindung.schliessen();
        drop(eintrag);

        self.inner.verbunden.fetch_sub(1, Ordering::SeqCst);
        true
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn test_verbindung() -> Arc<SessionVerbindung> {
        let (tx, _rx) = mpsc::channel(1);
        SessionVerbindung::neu(tx)
    }

    fn name(s: &str) -> ClientName {
        ClientName::neu(s).unwrap()
    }

    #[test]
    fn unbekannter_name_ist_verfuegbar() {
        let registry = SessionRegistry::neu();
        assert!(registry.name_verfuegbar("Alice"));
        assert!(registry.nachschlagen("Alice").is_none());
    }

    #[test]
    fn registrieren_belegt_namen() {
        let registry = SessionRegistry::neu();
        let session = registry
            .registrieren(name("Alice"), test_addr(), test_verbindung())
            .unwrap();

        assert!(session.verbunden);
        assert_eq!(session.peer_addr, test_addr());
        assert!(!registry.name_verfuegbar("Alice"));
        assert_eq!(registry.verbunden_anzahl(), 1);
        assert_eq!(registry.verbundene_namen(), vec!["Alice".to_string()]);
    }

    #[test]
    fn doppelte_anmeldung_aendert_nichts() {
        let registry = SessionRegistry::neu();
        let erste = registry
            .registrieren(name("Alice"), test_addr(), test_verbindung())
            .unwrap();

        let andere_addr: SocketAddr = "10.0.0.1:5000".parse().unwrap();
        let ergebnis = registry.registrieren(name("Alice"), andere_addr, test_verbindung());
        assert!(matches!(ergebnis, Err(RelayError::NameVergeben(n)) if n == "Alice"));

        let aktuell = registry.nachschlagen("Alice").unwrap();
        assert_eq!(aktuell.peer_addr, test_addr());
        assert_eq!(aktuell.generation, erste.generation);
        assert!(Arc::ptr_eq(&aktuell.verbindung, &erste.verbindung));
        assert_eq!(registry.verbunden_anzahl(), 1);
    }

    #[test]
    fn trennen_hinterlaesst_tombstone() {
        let registry = SessionRegistry::neu();
        registry
            .registrieren(name("Alice"), test_addr(), test_verbindung())
            .unwrap();

        assert!(registry.trennen("Alice"));
        assert!(registry.name_verfuegbar("Alice"));
        assert_eq!(registry.verbunden_anzahl(), 0);
        assert!(registry.verbundene_namen().is_empty());

        let tombstone = registry.nachschlagen("Alice").expect("Tombstone erwartet");
        assert!(!tombstone.verbunden);
        assert!(tombstone.verbindung.ist_geschlossen());
        assert_eq!(registry.alle_sessions().len(), 1);
    }

    #[test]
    fn trennen_ist_idempotent() {
        let registry = SessionRegistry::neu();
        registry
            .registrieren(name("Alice"), test_addr(), test_verbindung())
            .unwrap();

        assert!(registry.trennen("Alice"));
        assert!(!registry.trennen("Alice"));
        assert_eq!(registry.verbunden_anzahl(), 0);
        assert!(!registry.trennen("Niemand"));
    }

    #[test]
    fn name_kann_nach_trennung_neu_vergeben_werden() {
        let registry = SessionRegistry::neu();
        let alt = registry
            .registrieren(name("Alice"), test_addr(), test_verbindung())
            .unwrap();
        registry.trennen("Alice");

        let neu = registry
            .registrieren(name("Alice"), test_addr(), test_verbindung())
            .unwrap();
        assert!(neu.verbunden);
        assert!(neu.generation > alt.generation);
        assert!(!neu.verbindung.ist_geschlossen());
        assert!(!registry.name_verfuegbar("Alice"));
        assert_eq!(registry.verbunden_anzahl(), 1);
        assert_eq!(registry.alle_sessions().len(), 1);
    }

    #[test]
    fn alte_generation_trennt_neue_session_nicht() {
        let registry = SessionRegistry::neu();
        let alt = registry
            .registrieren(name("Alice"), test_addr(), test_verbindung())
            .unwrap();
        registry.trennen("Alice");
        let neu = registry
            .registrieren(name("Alice"), test_addr(), test_verbindung())
            .unwrap();

        assert!(!registry.trennen_generation("Alice", alt.generation));
        assert!(!registry.name_verfuegbar("Alice"));

        assert!(registry.trennen_generation("Alice", neu.generation));
        assert!(registry.name_verfuegbar("Alice"));
    }

    #[test]
    fn verbundene_namen_sind_sortiert() {
        let registry = SessionRegistry::neu();
        for n in ["Carol", "Alice", "Bob"] {
            registry
                .registrieren(name(n), test_addr(), test_verbindung())
                .unwrap();
        }
        registry.trennen("Bob");
        assert_eq!(registry.verbundene_namen(), vec!["Alice", "Carol"]);
        assert_eq!(registry.verbunden_anzahl(), 2);
    }

    #[test]
    fn clone_teilt_inneren_state() {
        let r1 = SessionRegistry::neu();
        let r2 = r1.clone();
        r1.registrieren(name("Shared"), test_addr(), test_verbindung())
            .unwrap();
        assert!(!r2.name_verfuegbar("Shared"));
    }

    #[test]
    fn gleichzeitige_anmeldungen_genau_eine_gewinnt() {
        let registry = SessionRegistry::neu();
        let threads: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    registry
                        .registrieren(name("Alice"), test_addr(), test_verbindung())
                        .is_ok()
                })
            })
            .collect();

        let erfolge = threads
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(erfolge, 1);
        assert_eq!(registry.verbunden_anzahl(), 1);
    }
}
