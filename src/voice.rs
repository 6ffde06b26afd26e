//! Voice command routing.
//!
//! The speech engine is an injected collaborator rather than an ambient
//! global, so tests can drive the session with a fake. Actual recognition
//! happens in the browser; the [`WsVoiceEngine`] keeps the client-side
//! recognizer's grammar in sync over the broadcast channel, and recognition
//! results come back in as session events.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::broadcast;

use crate::protocol::ServerMessage;

/// Phrases that skip the current question.
pub const PASS_PHRASES: &[&str] = &["pass", "next", "don't know"];
/// Phrases the engine recognizes but deliberately does nothing with.
pub const CURSE_PHRASES: &[&str] = &["fuck", "shit", "motherfucker"];
/// Phrase that reveals the multiple-choice options.
pub const OPTIONS_PHRASE: &str = "show options";

/// What a recognized phrase means to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandIntent {
    Pass,
    Curse,
    ShowOptions,
    /// The player said the current movie's title verbatim.
    TitleMatch,
}

/// Minimal surface of the speech-recognition collaborator.
pub trait VoiceEngine: Send + Sync {
    fn start(&self);
    fn abort(&self);
    fn is_listening(&self) -> bool;
    fn add_commands(&self, phrases: &[String]);
    fn remove_commands(&self, phrase: &str);
}

/// Maps recognized phrases to intents and keeps the engine's phrase set
/// bounded: exactly the static commands plus the lowercase title of the
/// current question. Every title registration is paired with the removal
/// of the previous one.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    current_title: Option<String>,
}

fn static_phrases() -> Vec<String> {
    PASS_PHRASES
        .iter()
        .chain(CURSE_PHRASES)
        .map(|p| p.to_string())
        .chain(std::iter::once(OPTIONS_PHRASE.to_string()))
        .collect()
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push the fixed command set to the engine. Called once per session.
    pub fn register_static(&self, engine: &dyn VoiceEngine) {
        engine.add_commands(&static_phrases());
    }

    /// The full phrase set the recognizer should currently know: the static
    /// commands plus the active title binding, if any. Used to bring a
    /// freshly connected client's grammar up to date.
    pub fn phrases(&self) -> Vec<String> {
        let mut phrases = static_phrases();
        if let Some(title) = &self.current_title {
            phrases.push(title.clone());
        }
        phrases
    }

    /// Bind the new question's title, dropping the superseded one so stale
    /// titles can never be recognized later.
    pub fn sync_title(&mut self, engine: &dyn VoiceEngine, title: &str) {
        let phrase = title.to_lowercase();
        if self.current_title.as_deref() == Some(phrase.as_str()) {
            return;
        }
        if let Some(previous) = self.current_title.take() {
            engine.remove_commands(&previous);
        }
        engine.add_commands(std::slice::from_ref(&phrase));
        self.current_title = Some(phrase);
    }

    /// Drop the active title binding (game finished or reset).
    pub fn clear_title(&mut self, engine: &dyn VoiceEngine) {
        if let Some(previous) = self.current_title.take() {
            engine.remove_commands(&previous);
        }
    }

    pub fn resolve(&self, phrase: &str) -> Option<CommandIntent> {
        let phrase = phrase.trim().to_lowercase();
        if PASS_PHRASES.contains(&phrase.as_str()) {
            return Some(CommandIntent::Pass);
        }
        if CURSE_PHRASES.contains(&phrase.as_str()) {
            return Some(CommandIntent::Curse);
        }
        if phrase == OPTIONS_PHRASE {
            return Some(CommandIntent::ShowOptions);
        }
        if self.current_title.as_deref() == Some(phrase.as_str()) {
            return Some(CommandIntent::TitleMatch);
        }
        None
    }
}

/// Engine implementation backed by the browser's recognizer: command
/// registrations are mirrored to the client as grammar updates, start/abort
/// toggle the client-side capture.
pub struct WsVoiceEngine {
    tx: broadcast::Sender<ServerMessage>,
    phrases: Mutex<BTreeSet<String>>,
    listening: AtomicBool,
}

impl WsVoiceEngine {
    pub fn new(tx: broadcast::Sender<ServerMessage>) -> Self {
        Self {
            tx,
            phrases: Mutex::new(BTreeSet::new()),
            listening: AtomicBool::new(false),
        }
    }

    fn push_grammar(&self) {
        let phrases: Vec<String> = self
            .phrases
            .lock()
            .expect("grammar lock poisoned")
            .iter()
            .cloned()
            .collect();
        // No receivers connected is fine
        let _ = self.tx.send(ServerMessage::VoiceGrammar { phrases });
    }
}

impl VoiceEngine for WsVoiceEngine {
    fn start(&self) {
        self.listening.store(true, Ordering::SeqCst);
        let _ = self.tx.send(ServerMessage::VoiceListening { active: true });
    }

    fn abort(&self) {
        self.listening.store(false, Ordering::SeqCst);
        let _ = self.tx.send(ServerMessage::VoiceListening { active: false });
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    fn add_commands(&self, phrases: &[String]) {
        {
            let mut set = self.phrases.lock().expect("grammar lock poisoned");
            set.extend(phrases.iter().cloned());
        }
        self.push_grammar();
    }

    fn remove_commands(&self, phrase: &str) {
        {
            let mut set = self.phrases.lock().expect("grammar lock poisoned");
            set.remove(phrase);
        }
        self.push_grammar();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingEngine {
        added: StdMutex<Vec<String>>,
        removed: StdMutex<Vec<String>>,
    }

    impl VoiceEngine for RecordingEngine {
        fn start(&self) {}
        fn abort(&self) {}
        fn is_listening(&self) -> bool {
            true
        }
        fn add_commands(&self, phrases: &[String]) {
            self.added.lock().unwrap().extend(phrases.iter().cloned());
        }
        fn remove_commands(&self, phrase: &str) {
            self.removed.lock().unwrap().push(phrase.to_string());
        }
    }

    #[test]
    fn resolves_static_phrases() {
        let registry = CommandRegistry::new();
        assert_eq!(registry.resolve("pass"), Some(CommandIntent::Pass));
        assert_eq!(registry.resolve("don't know"), Some(CommandIntent::Pass));
        assert_eq!(registry.resolve("shit"), Some(CommandIntent::Curse));
        assert_eq!(registry.resolve("show options"), Some(CommandIntent::ShowOptions));
        assert_eq!(registry.resolve("free-form speech"), None);
    }

    #[test]
    fn title_binding_is_paired_on_question_change() {
        let engine = RecordingEngine::default();
        let mut registry = CommandRegistry::new();

        registry.sync_title(&engine, "The Matrix");
        assert_eq!(registry.resolve("the matrix"), Some(CommandIntent::TitleMatch));

        registry.sync_title(&engine, "Titanic");
        assert_eq!(registry.resolve("the matrix"), None);
        assert_eq!(registry.resolve("titanic"), Some(CommandIntent::TitleMatch));

        assert_eq!(*engine.added.lock().unwrap(), vec!["the matrix", "titanic"]);
        assert_eq!(*engine.removed.lock().unwrap(), vec!["the matrix"]);
    }

    #[test]
    fn clear_title_removes_the_active_binding() {
        let engine = RecordingEngine::default();
        let mut registry = CommandRegistry::new();

        registry.sync_title(&engine, "Titanic");
        registry.clear_title(&engine);

        assert_eq!(registry.resolve("titanic"), None);
        assert_eq!(*engine.removed.lock().unwrap(), vec!["titanic"]);
    }

    #[test]
    fn phrases_include_the_active_title_binding() {
        let engine = RecordingEngine::default();
        let mut registry = CommandRegistry::new();
        assert!(!registry.phrases().contains(&"titanic".to_string()));

        registry.sync_title(&engine, "Titanic");
        let phrases = registry.phrases();
        assert!(phrases.contains(&"pass".to_string()));
        assert!(phrases.contains(&"show options".to_string()));
        assert!(phrases.contains(&"titanic".to_string()));

        registry.clear_title(&engine);
        assert!(!registry.phrases().contains(&"titanic".to_string()));
    }

    #[test]
    fn resyncing_the_same_title_is_a_no_op() {
        let engine = RecordingEngine::default();
        let mut registry = CommandRegistry::new();

        registry.sync_title(&engine, "Titanic");
        registry.sync_title(&engine, "Titanic");

        assert_eq!(engine.added.lock().unwrap().len(), 1);
        assert!(engine.removed.lock().unwrap().is_empty());
    }
}
