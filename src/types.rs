use serde::{Deserialize, Serialize};

pub type MovieId = String;

/// Number of questions in one play-through
pub const MOVIES_PER_GAME: usize = 10;
/// Round clock length in seconds
pub const GAME_TIME: u32 = 120;
/// Cosmetic get-ready countdown before the round clock starts
pub const COUNTDOWN_TIME: u32 = 3;
/// Minimum score for a transcript to count as "close" to the current title
pub const FUZZY_MATCH_THRESHOLD: f64 = 0.2;
/// Minimum score for a transcript to be accepted as a correct guess
pub const MATCH_THRESHOLD: f64 = 0.8;
/// Percentage of a title redacted when showing a hint
pub const HINT_PERCENT_TO_REPLACE: usize = 20;
pub const HINT_CHARACTER: char = '_';
/// Seconds left at which the clock starts signalling "running out"
pub const CLOCK_RUNNING_OUT_THRESHOLD: u32 = 10;

/// A movie as returned by the provider. Extra metadata the API sends is
/// dropped at the provider boundary; the engine only needs these fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    pub poster_path: String,
    pub backdrop_path: String,
}

/// One multiple-choice option. Exactly one answer per question is correct
/// and its id always equals the question's movie id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub id: MovieId,
    pub label: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub movie: Movie,
    pub answers: Vec<Answer>,
}

/// Outcome recorded for one question, keyed by movie id in the session.
/// `answer` is set when the player clicked an option, `spoken_answer` when
/// the outcome came from speech; neither is set for timer backfills.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionResult {
    pub movie: Movie,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<Answer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spoken_answer: Option<Vec<String>>,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    Authorizing,
    Starting,
    Playing,
    Finished,
    Failed,
}

/// Why a session ended up in FAILED. Data unavailability is deliberately not
/// here: an empty questionnaire is recoverable and keeps the session alive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, thiserror::Error)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameError {
    #[error("speech recognition is not supported in this environment")]
    Unsupported,
    #[error("the browser blocked access to the microphone")]
    BrowserDenial,
    #[error("the user declined access to the microphone")]
    UserDenial,
    #[error("an unexpected error occurred")]
    Unexpected,
}

/// Crop coordinates shared by the full poster and its thumbnail so both are
/// cropped identically. Percent offsets into the image.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PosterPosition {
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    pub movies_per_game: usize,
    pub game_seconds: u32,
    pub countdown_seconds: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            movies_per_game: MOVIES_PER_GAME,
            game_seconds: GAME_TIME,
            countdown_seconds: COUNTDOWN_TIME,
        }
    }
}
