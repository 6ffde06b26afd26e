// Public API for integration tests and potential library usage

pub mod analytics;
pub mod clock;
pub mod fuzzy;
pub mod hint;
pub mod protocol;
pub mod provider;
pub mod questionnaire;
pub mod randomness;
pub mod session;
pub mod types;
pub mod voice;
pub mod ws;
