pub mod machine;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, RwLock};

use crate::analytics::EventSink;
use crate::protocol::{ServerMessage, SessionSnapshot};
use crate::provider::MovieProvider;
use crate::voice::{CommandRegistry, VoiceEngine};
use machine::{Effect, Session, SessionEvent};

/// Shared application state: the session state machine plus its
/// collaborators, and the broadcast channel presentation clients subscribe
/// to for snapshots.
pub struct AppState {
    session: RwLock<Session>,
    broadcast: broadcast::Sender<ServerMessage>,
    provider: Arc<dyn MovieProvider>,
    voice: Option<Arc<dyn VoiceEngine>>,
    analytics: Arc<dyn EventSink>,
    registry: Mutex<CommandRegistry>,
    /// Bumped on every reset. Timers and fetches capture the generation at
    /// spawn time and are dropped on mismatch, so work belonging to a
    /// superseded session can never mutate the new one.
    generation: AtomicU64,
}

impl AppState {
    pub fn new(
        provider: Arc<dyn MovieProvider>,
        voice: Option<Arc<dyn VoiceEngine>>,
        analytics: Arc<dyn EventSink>,
    ) -> Self {
        let (tx, _rx) = broadcast::channel(100);
        Self {
            session: RwLock::new(Session::new(Default::default())),
            broadcast: tx,
            provider,
            voice,
            analytics,
            registry: Mutex::new(CommandRegistry::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Production wiring: a WS-backed voice engine sharing the state's
    /// broadcast channel, so grammar updates reach the browser alongside
    /// the snapshots.
    pub fn new_with_ws_voice(
        provider: Arc<dyn MovieProvider>,
        analytics: Arc<dyn EventSink>,
    ) -> Self {
        let (tx, _rx) = broadcast::channel(100);
        let engine: Arc<dyn VoiceEngine> = Arc::new(crate::voice::WsVoiceEngine::new(tx.clone()));
        Self {
            session: RwLock::new(Session::new(Default::default())),
            broadcast: tx,
            provider,
            voice: Some(engine),
            analytics,
            registry: Mutex::new(CommandRegistry::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Same state but with a pre-built session, for tests that need a
    /// seeded RNG or a smaller game.
    pub fn with_session(
        session: Session,
        provider: Arc<dyn MovieProvider>,
        voice: Option<Arc<dyn VoiceEngine>>,
        analytics: Arc<dyn EventSink>,
    ) -> Self {
        let (tx, _rx) = broadcast::channel(100);
        Self {
            session: RwLock::new(session),
            broadcast: tx,
            provider,
            voice,
            analytics,
            registry: Mutex::new(CommandRegistry::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Kick the session off: register the static voice commands and start
    /// capture, or fail immediately when no engine exists in this
    /// environment. Fires the initial movie fetch.
    pub async fn start(self: &Arc<Self>) {
        match &self.voice {
            Some(engine) => {
                self.registry
                    .lock()
                    .expect("registry lock poisoned")
                    .register_static(engine.as_ref());
                engine.start();
                // The session authorizes until the engine reports capture;
                // movies load in the background meanwhile.
                self.spawn_fetch(self.generation());
                self.publish_snapshot().await;
            }
            None => {
                self.dispatch(self.generation(), SessionEvent::EngineMissing)
                    .await;
            }
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.broadcast.subscribe()
    }

    pub fn sender(&self) -> broadcast::Sender<ServerMessage> {
        self.broadcast.clone()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::from(&*self.session.read().await)
    }

    pub async fn config(&self) -> crate::types::GameConfig {
        self.session.read().await.config.clone()
    }

    /// Connect-time voice state for a client joining mid-game: the grammar
    /// its recognizer should load and whether it should be capturing.
    /// Broadcast grammar updates only reach clients already connected.
    pub fn voice_hello(&self) -> Vec<ServerMessage> {
        let Some(engine) = &self.voice else {
            return Vec::new();
        };
        let phrases = self
            .registry
            .lock()
            .expect("registry lock poisoned")
            .phrases();
        vec![
            ServerMessage::VoiceGrammar { phrases },
            ServerMessage::VoiceListening {
                active: engine.is_listening(),
            },
        ]
    }

    /// Resolve a grammar phrase recognized by the client-side engine and
    /// feed the resulting intent into the session.
    pub async fn handle_voice_phrase(self: &Arc<Self>, generation: u64, phrase: &str) {
        let intent = self
            .registry
            .lock()
            .expect("registry lock poisoned")
            .resolve(phrase);
        match intent {
            Some(intent) => {
                self.dispatch(generation, SessionEvent::Command(intent))
                    .await
            }
            None => tracing::debug!(%phrase, "unknown voice phrase ignored"),
        }
    }

    /// Apply one event to the session and execute the resulting effects.
    ///
    /// Events tagged with a stale generation are dropped. The pure
    /// transition runs under the write lock; effects run after it is
    /// released.
    pub async fn dispatch(self: &Arc<Self>, generation: u64, event: SessionEvent) {
        // The staleness check and the reset bump both happen inside the
        // critical section. Checking before taking the lock would let a
        // stale event pass the check, lose the lock race to a concurrent
        // reset, and then apply to the fresh session.
        let (effects, current) = {
            let mut session = self.session.write().await;
            if generation != self.generation() {
                tracing::debug!(?event, "dropping event from a superseded session");
                return;
            }
            // A reset obsoletes every timer and in-flight fetch of the old
            // session before any new work is spawned.
            if matches!(event, SessionEvent::Reset) {
                self.generation.fetch_add(1, Ordering::SeqCst);
            }
            (session.handle_event(event), self.generation())
        };

        self.publish_snapshot().await;
        self.run_effects(current, effects).await;
    }

    async fn publish_snapshot(&self) {
        let snapshot = self.snapshot().await;
        // No receivers connected is fine
        let _ = self.broadcast.send(ServerMessage::Snapshot { snapshot });
    }

    async fn run_effects(self: &Arc<Self>, generation: u64, effects: Vec<Effect>) {
        // Effects of a transition that a reset has since superseded are
        // dropped wholesale; the reset's own effects rebuild everything.
        if generation != self.generation() {
            return;
        }

        for effect in effects {
            match effect {
                Effect::StartCountdown => {
                    crate::clock::spawn_countdown(self.clone(), generation);
                }
                Effect::StartRoundClock => {
                    crate::clock::spawn_round_clock(self.clone(), generation);
                }
                Effect::FetchMovies => self.spawn_fetch(generation),
                Effect::StartCapture => {
                    if let Some(engine) = &self.voice {
                        if !engine.is_listening() {
                            engine.start();
                        }
                    }
                }
                Effect::AbortCapture => {
                    if let Some(engine) = &self.voice {
                        engine.abort();
                    }
                }
                Effect::SyncTitleCommand { title } => {
                    if let Some(engine) = &self.voice {
                        self.registry
                            .lock()
                            .expect("registry lock poisoned")
                            .sync_title(engine.as_ref(), &title);
                    }
                }
                Effect::ClearTitleCommand => {
                    if let Some(engine) = &self.voice {
                        self.registry
                            .lock()
                            .expect("registry lock poisoned")
                            .clear_title(engine.as_ref());
                    }
                }
                Effect::Track(event) => self.analytics.record(event),
            }
        }
    }

    fn spawn_fetch(self: &Arc<Self>, generation: u64) {
        let state = self.clone();
        tokio::spawn(async move {
            let event = match state.provider.fetch_movies().await {
                Ok(set) => SessionEvent::MoviesLoaded(set),
                Err(e) => SessionEvent::MoviesFailed(e.to_string()),
            };
            // dispatch drops the result if a reset superseded this fetch
            state.dispatch(generation, event).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{Event, TracingSink};
    use crate::provider::{MovieSet, ProviderResult};
    use crate::types::{GameConfig, GameStatus, Movie};
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct StaticProvider(MovieSet);

    #[async_trait]
    impl MovieProvider for StaticProvider {
        async fn fetch_movies(&self) -> ProviderResult<MovieSet> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct NullEngine {
        listening: std::sync::atomic::AtomicBool,
    }

    impl VoiceEngine for NullEngine {
        fn start(&self) {
            self.listening.store(true, Ordering::SeqCst);
        }
        fn abort(&self) {
            self.listening.store(false, Ordering::SeqCst);
        }
        fn is_listening(&self) -> bool {
            self.listening.load(Ordering::SeqCst)
        }
        fn add_commands(&self, _phrases: &[String]) {}
        fn remove_commands(&self, _phrase: &str) {}
    }

    fn movie(id: usize) -> Movie {
        Movie {
            id: format!("m{id}"),
            title: format!("Movie {id}"),
            poster_path: format!("/p{id}.jpg"),
            backdrop_path: format!("/b{id}.jpg"),
        }
    }

    fn small_state(questions: usize) -> Arc<AppState> {
        let set = MovieSet {
            movies: (0..questions).map(movie).collect(),
            extra_movies: (100..100 + 2 * questions).map(movie).collect(),
        };
        let session = Session::with_rng(
            GameConfig {
                movies_per_game: questions,
                ..GameConfig::default()
            },
            StdRng::seed_from_u64(11),
        );
        Arc::new(AppState::with_session(
            session,
            Arc::new(StaticProvider(set)),
            Some(Arc::new(NullEngine::default())),
            Arc::new(TracingSink),
        ))
    }

    #[tokio::test]
    async fn missing_engine_fails_on_start() {
        let state = Arc::new(AppState::new(
            Arc::new(StaticProvider(MovieSet::default())),
            None,
            Arc::new(TracingSink),
        ));
        state.start().await;

        let snapshot = state.snapshot().await;
        assert_eq!(snapshot.status, GameStatus::Failed);
    }

    #[tokio::test]
    async fn stale_generation_events_are_dropped() {
        let state = small_state(2);
        state.start().await;
        let old_generation = state.generation();

        state.dispatch(old_generation, SessionEvent::Reset).await;
        assert_eq!(state.generation(), old_generation + 1);

        // A clock that belonged to the pre-reset session fires late
        state.dispatch(old_generation, SessionEvent::ClockExpired).await;
        let snapshot = state.snapshot().await;
        assert_ne!(snapshot.status, GameStatus::Finished);
    }

    #[tokio::test]
    async fn connect_time_voice_state_reports_grammar_and_listening() {
        let state = small_state(2);
        state.start().await;

        let msgs = state.voice_hello();
        assert_eq!(msgs.len(), 2);
        match &msgs[0] {
            ServerMessage::VoiceGrammar { phrases } => {
                assert!(phrases.contains(&"pass".to_string()));
                assert!(phrases.contains(&"show options".to_string()));
            }
            other => panic!("expected a grammar message, got {other:?}"),
        }
        match &msgs[1] {
            ServerMessage::VoiceListening { active } => assert!(*active),
            other => panic!("expected a listening message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn without_an_engine_there_is_no_voice_state_to_sync() {
        let state = Arc::new(AppState::new(
            Arc::new(StaticProvider(MovieSet::default())),
            None,
            Arc::new(TracingSink),
        ));
        assert!(state.voice_hello().is_empty());
    }

    #[tokio::test]
    async fn unknown_voice_phrases_are_ignored() {
        let state = small_state(2);
        state.start().await;
        let generation = state.generation();

        state.handle_voice_phrase(generation, "open sesame").await;

        let snapshot = state.snapshot().await;
        assert_eq!(snapshot.results.len(), 0);
    }

    #[test]
    fn tracked_events_carry_labels() {
        let event = Event::with_label("Playing events", "Correct guess", "Movie 1".to_string());
        assert_eq!(event.label.as_deref(), Some("Movie 1"));
    }
}
