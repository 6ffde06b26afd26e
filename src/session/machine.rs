//! The game session state machine.
//!
//! Pure transitions: every external stimulus (timer, voice event, UI
//! intent, fetch completion) is a [`SessionEvent`], and applying one to the
//! [`Session`] yields the [`Effect`]s the orchestrator must execute. No
//! I/O happens in here, which keeps every transition testable with a
//! seeded RNG and hand-built events.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::analytics::Event;
use crate::fuzzy::{is_strong_match, TitleIndex};
use crate::hint::create_hint;
use crate::provider::MovieSet;
use crate::questionnaire;
use crate::randomness::random_in_range;
use crate::types::*;
use crate::voice::CommandIntent;

/// Poster crop offsets stay inside these percent bands so the interesting
/// part of the artwork remains visible.
const POSITION_BOUNDARIES_X: (usize, usize) = (25, 75);
const POSITION_BOUNDARIES_Y: (usize, usize) = (30, 60);

/// External stimulus driving the session.
///
/// Answer-bearing events carry the question index the client was answering;
/// a mismatch with the current index means the question was already resolved
/// by the other input path and the event is dropped.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// No speech engine exists in this environment
    EngineMissing,
    /// The speech engine reports capture has started
    CaptureStarted,
    PermissionBlocked,
    PermissionDenied,
    /// The get-ready countdown elapsed
    CountdownFinished,
    /// The round clock ran out
    ClockExpired,
    MoviesLoaded(MovieSet),
    MoviesFailed(String),
    /// A registered grammar phrase was recognized
    Command(CommandIntent),
    /// Free-form speech matched no registered phrase
    TranscriptNoMatch {
        question_index: usize,
        transcripts: Vec<String>,
    },
    /// Multiple-choice selection from the UI
    SelectAnswer {
        question_index: usize,
        answer_id: MovieId,
    },
    Reset,
}

/// Side effects the orchestrator executes after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartCountdown,
    StartRoundClock,
    FetchMovies,
    StartCapture,
    AbortCapture,
    /// Register the new current title with the voice engine (the registry
    /// drops the superseded one)
    SyncTitleCommand { title: String },
    ClearTitleCommand,
    Track(Event),
}

pub struct Session {
    pub config: GameConfig,
    pub status: GameStatus,
    pub error: Option<GameError>,
    pub is_loading_movies: bool,
    pub questionnaire: Vec<Question>,
    pub title_index: TitleIndex,
    pub current_question_index: usize,
    pub results: HashMap<MovieId, QuestionResult>,
    pub should_show_hint: bool,
    pub should_show_options: bool,
    pub hint: Option<String>,
    pub current_poster_position: Option<PosterPosition>,
    pub deadline: Option<DateTime<Utc>>,
    rng: StdRng,
}

impl Session {
    pub fn new(config: GameConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    pub fn with_rng(config: GameConfig, rng: StdRng) -> Self {
        Self {
            config,
            status: GameStatus::Authorizing,
            error: None,
            is_loading_movies: true,
            questionnaire: Vec::new(),
            title_index: TitleIndex::default(),
            current_question_index: 0,
            results: HashMap::new(),
            should_show_hint: false,
            should_show_options: false,
            hint: None,
            current_poster_position: None,
            deadline: None,
            rng,
        }
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questionnaire.get(self.current_question_index)
    }

    pub fn handle_event(&mut self, event: SessionEvent) -> Vec<Effect> {
        match event {
            SessionEvent::EngineMissing => {
                self.fail(GameError::Unsupported, "SR is not supported in this environment")
            }
            SessionEvent::CaptureStarted => self.on_capture_started(),
            SessionEvent::PermissionBlocked => self.fail(
                GameError::BrowserDenial,
                "Permission to access microphone blocked by browser",
            ),
            SessionEvent::PermissionDenied => self.fail(
                GameError::UserDenial,
                "Permission to access microphone blocked by user",
            ),
            SessionEvent::CountdownFinished => self.on_countdown_finished(),
            SessionEvent::ClockExpired => self.on_clock_expired(),
            SessionEvent::MoviesLoaded(set) => self.on_movies_loaded(set),
            SessionEvent::MoviesFailed(reason) => self.on_movies_failed(reason),
            SessionEvent::Command(intent) => self.on_command(intent),
            SessionEvent::TranscriptNoMatch {
                question_index,
                transcripts,
            } => self.on_no_match(question_index, transcripts),
            SessionEvent::SelectAnswer {
                question_index,
                answer_id,
            } => self.on_select_answer(question_index, answer_id),
            SessionEvent::Reset => self.on_reset(),
        }
    }

    /// Capability/permission failures are terminal for the session and
    /// release the microphone; post-game stragglers are ignored.
    fn fail(&mut self, error: GameError, action: &'static str) -> Vec<Effect> {
        if matches!(self.status, GameStatus::Finished | GameStatus::Failed) {
            return Vec::new();
        }
        self.status = GameStatus::Failed;
        self.error = Some(error);
        self.deadline = None;
        vec![Effect::AbortCapture, Effect::Track(Event::new("Error", action))]
    }

    fn on_capture_started(&mut self) -> Vec<Effect> {
        // The engine restarts whenever it stops listening mid-game, which
        // fires this again; only the initial authorization moves the state.
        if self.status != GameStatus::Authorizing {
            return Vec::new();
        }
        self.status = GameStatus::Starting;
        vec![Effect::StartCountdown]
    }

    fn on_countdown_finished(&mut self) -> Vec<Effect> {
        if self.status != GameStatus::Starting {
            return Vec::new();
        }
        self.status = GameStatus::Playing;
        self.deadline = Some(Utc::now() + TimeDelta::seconds(self.config.game_seconds as i64));
        let mut effects = vec![
            Effect::StartRoundClock,
            Effect::Track(Event::new("App events", "Game started")),
        ];
        effects.extend(self.activate_current_question());
        effects
    }

    fn on_movies_loaded(&mut self, set: MovieSet) -> Vec<Effect> {
        if matches!(self.status, GameStatus::Finished | GameStatus::Failed) {
            return Vec::new();
        }
        // A questionnaire is only ever installed at the first question;
        // a duplicate fetch result mid-game must not clobber the round.
        if self.current_question_index != 0 {
            return Vec::new();
        }
        self.is_loading_movies = false;
        self.questionnaire = questionnaire::build(
            &mut self.rng,
            set.movies,
            set.extra_movies,
            self.config.movies_per_game,
        );
        self.title_index =
            TitleIndex::new(self.questionnaire.iter().map(|q| q.movie.title.clone()));
        self.current_question_index = 0;

        if self.questionnaire.is_empty() {
            tracing::warn!("movie pools too small, questionnaire unavailable");
            return Vec::new();
        }
        if self.status == GameStatus::Playing {
            return self.activate_current_question();
        }
        Vec::new()
    }

    fn on_movies_failed(&mut self, reason: String) -> Vec<Effect> {
        // Data unavailability is not FAILED: the session stays alive and
        // the player can retry via reset.
        self.is_loading_movies = false;
        tracing::error!(%reason, "movie fetch failed");
        vec![Effect::Track(Event::with_label(
            "Error",
            "Movie fetch failed",
            reason,
        ))]
    }

    fn on_command(&mut self, intent: CommandIntent) -> Vec<Effect> {
        match intent {
            CommandIntent::Pass => self.on_no_match(self.current_question_index, Vec::new()),
            CommandIntent::Curse => Vec::new(),
            CommandIntent::ShowOptions => self.on_show_options(),
            CommandIntent::TitleMatch => self.resolve_correct_by_voice(),
        }
    }

    fn on_show_options(&mut self) -> Vec<Effect> {
        // A displayed hint suppresses the options
        if self.status != GameStatus::Playing || self.should_show_hint {
            return Vec::new();
        }
        self.should_show_options = true;
        vec![Effect::Track(Event::new("Playing events", "Show options"))]
    }

    fn on_no_match(&mut self, question_index: usize, transcripts: Vec<String>) -> Vec<Effect> {
        // Stray audio after the last question, or an answer that raced the
        // other input path, must not mutate state.
        if self.status != GameStatus::Playing
            || question_index != self.current_question_index
        {
            return Vec::new();
        }
        let Some(question) = self.current_question() else {
            return Vec::new();
        };
        let movie = question.movie.clone();

        if let Some(fuzzy) = self.title_index.best_match(&transcripts, &movie.title) {
            if is_strong_match(fuzzy.score) {
                return self.resolve_correct_by_voice();
            }
            // One reprieve per question: a close-but-not-convincing guess
            // earns a hint instead of an incorrect result.
            if !self.should_show_hint {
                return self.show_hint(&movie.title);
            }
        }

        let result = QuestionResult {
            movie: movie.clone(),
            answer: None,
            spoken_answer: (!transcripts.is_empty()).then_some(transcripts),
            is_correct: false,
        };
        let effects = vec![Effect::Track(Event::with_label(
            "Playing events",
            "Incorrect guess",
            movie.title,
        ))];
        self.resume(result, effects)
    }

    fn resolve_correct_by_voice(&mut self) -> Vec<Effect> {
        if self.status != GameStatus::Playing {
            return Vec::new();
        }
        let Some(question) = self.current_question() else {
            return Vec::new();
        };
        let movie = question.movie.clone();
        let result = QuestionResult {
            movie: movie.clone(),
            answer: None,
            spoken_answer: Some(vec![movie.title.clone()]),
            is_correct: true,
        };
        let effects = vec![Effect::Track(Event::with_label(
            "Playing events",
            "Correct guess",
            movie.title,
        ))];
        self.resume(result, effects)
    }

    fn on_select_answer(&mut self, question_index: usize, answer_id: MovieId) -> Vec<Effect> {
        if self.status != GameStatus::Playing
            || question_index != self.current_question_index
        {
            return Vec::new();
        }
        let Some(question) = self.current_question() else {
            return Vec::new();
        };
        let Some(answer) = question.answers.iter().find(|a| a.id == answer_id).cloned() else {
            return Vec::new();
        };
        let movie = question.movie.clone();

        let result = QuestionResult {
            movie: movie.clone(),
            answer: Some(answer.clone()),
            spoken_answer: None,
            is_correct: answer.id == movie.id,
        };
        let effects = vec![Effect::Track(Event::with_label(
            "Playing events",
            "Option selection",
            format!("{}, user selected {}", movie.title, answer.label),
        ))];
        self.resume(result, effects)
    }

    /// Record one result and move on: next question or game over.
    fn resume(&mut self, result: QuestionResult, mut effects: Vec<Effect>) -> Vec<Effect> {
        self.results.insert(result.movie.id.clone(), result);
        self.current_question_index += 1;
        self.should_show_options = false;
        self.should_show_hint = false;
        self.hint = None;
        self.current_poster_position = None;

        if self.current_question_index >= self.questionnaire.len() {
            self.finish(&mut effects);
        } else {
            effects.extend(self.activate_current_question());
        }
        effects
    }

    fn on_clock_expired(&mut self) -> Vec<Effect> {
        if self.status != GameStatus::Playing {
            return Vec::new();
        }
        // Every question needs a result; unanswered ones count as misses.
        for question in &self.questionnaire {
            self.results
                .entry(question.movie.id.clone())
                .or_insert_with(|| QuestionResult {
                    movie: question.movie.clone(),
                    answer: None,
                    spoken_answer: None,
                    is_correct: false,
                });
        }
        let mut effects = Vec::new();
        self.finish(&mut effects);
        effects
    }

    fn finish(&mut self, effects: &mut Vec<Effect>) {
        self.status = GameStatus::Finished;
        self.deadline = None;
        effects.push(Effect::AbortCapture);
        effects.push(Effect::ClearTitleCommand);
        effects.push(Effect::Track(Event::new("App events", "Game finished")));
    }

    fn on_reset(&mut self) -> Vec<Effect> {
        // FAILED is terminal: capability and permission errors need a page
        // reload, not a retry.
        if self.status == GameStatus::Failed {
            return Vec::new();
        }
        self.status = GameStatus::Starting;
        self.error = None;
        self.is_loading_movies = true;
        self.questionnaire.clear();
        self.title_index = TitleIndex::default();
        self.current_question_index = 0;
        self.results.clear();
        self.should_show_options = false;
        self.should_show_hint = false;
        self.hint = None;
        self.current_poster_position = None;
        self.deadline = None;

        vec![
            Effect::ClearTitleCommand,
            Effect::FetchMovies,
            Effect::StartCapture,
            Effect::StartCountdown,
            Effect::Track(Event::new("App events", "Try again")),
        ]
    }

    fn show_hint(&mut self, title: &str) -> Vec<Effect> {
        self.hint = Some(create_hint(&mut self.rng, title));
        self.should_show_hint = true;
        self.should_show_options = false;
        Vec::new()
    }

    /// Make the question at the current index the active one: pick its
    /// poster crop (shared by poster and thumbnail) and bind its title as a
    /// voice command. The index is already final here, so the registry can
    /// never bind a stale title.
    fn activate_current_question(&mut self) -> Vec<Effect> {
        let Some(question) = self.questionnaire.get(self.current_question_index) else {
            return Vec::new();
        };
        let title = question.movie.title.clone();
        if self.current_poster_position.is_none() {
            self.current_poster_position = Some(PosterPosition {
                x: random_in_range(&mut self.rng, POSITION_BOUNDARIES_X.0, POSITION_BOUNDARIES_X.1)
                    as u32,
                y: random_in_range(&mut self.rng, POSITION_BOUNDARIES_Y.0, POSITION_BOUNDARIES_Y.1)
                    as u32,
            });
        }
        vec![Effect::SyncTitleCommand { title }]
    }
}
