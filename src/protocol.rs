use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::session::machine::Session;
use crate::types::*;

/// Messages from the presentation layer: discrete UI intents plus the
/// events of the browser-side speech recognizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Player clicked one of the multiple-choice options. Carries the
    /// question index from the client's latest snapshot so an answer that
    /// raced the voice path can be recognized as stale and dropped.
    SelectAnswer {
        question_index: usize,
        answer_id: MovieId,
    },
    /// Player asked for the options through the UI
    RequestOptions,
    /// Start over after a finished game (or after a failed movie fetch)
    Reset,
    /// The recognizer began capturing audio
    VoiceStarted,
    /// The platform blocked microphone access
    VoicePermissionBlocked,
    /// The user declined microphone access
    VoicePermissionDenied,
    /// The recognizer matched one of the registered grammar phrases
    VoiceCommand { phrase: String },
    /// Free-form speech that matched no registered phrase; carries the
    /// recognizer's transcript alternatives and the question index the
    /// player was answering
    VoiceNoMatch {
        question_index: usize,
        transcripts: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        snapshot: SessionSnapshot,
        server_now: String,
    },
    /// Full session snapshot, broadcast after every transition
    Snapshot { snapshot: SessionSnapshot },
    ClockTick {
        seconds_left: u32,
        running_out: bool,
    },
    /// Phrase set the client-side recognizer should treat as commands
    VoiceGrammar { phrases: Vec<String> },
    /// Whether the client-side recognizer should be capturing
    VoiceListening { active: bool },
    Error {
        code: String,
        msg: String,
    },
}

/// A multiple-choice option as shown to the player (no is_correct, to
/// prevent spoilers on the wire).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerView {
    pub id: MovieId,
    pub label: String,
}

impl From<&Answer> for AnswerView {
    fn from(a: &Answer) -> Self {
        Self {
            id: a.id.clone(),
            label: a.label.clone(),
        }
    }
}

/// The current question as shown to the player. The title is deliberately
/// absent; it only travels back in results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionView {
    pub poster_path: String,
    pub backdrop_path: String,
    pub answers: Vec<AnswerView>,
}

impl From<&Question> for QuestionView {
    fn from(q: &Question) -> Self {
        Self {
            poster_path: q.movie.poster_path.clone(),
            backdrop_path: q.movie.backdrop_path.clone(),
            answers: q.answers.iter().map(AnswerView::from).collect(),
        }
    }
}

/// Read-only view of the session state, pushed to the presentation layer
/// each transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub status: GameStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<GameError>,
    pub is_loading_movies: bool,
    pub current_question_index: usize,
    pub total_questions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_question: Option<QuestionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    pub should_show_hint: bool,
    pub should_show_options: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster_position: Option<PosterPosition>,
    pub results: HashMap<MovieId, QuestionResult>,
    /// RFC3339 timestamp of round clock expiry, while playing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
}

impl From<&Session> for SessionSnapshot {
    fn from(session: &Session) -> Self {
        Self {
            status: session.status,
            error: session.error,
            is_loading_movies: session.is_loading_movies,
            current_question_index: session.current_question_index,
            total_questions: session.questionnaire.len(),
            current_question: session.current_question().map(QuestionView::from),
            hint: session.hint.clone(),
            should_show_hint: session.should_show_hint,
            should_show_options: session.should_show_options,
            poster_position: session.current_poster_position,
            results: session.results.clone(),
            deadline: session.deadline.map(|d| d.to_rfc3339()),
        }
    }
}
