//! Fuzzy matching between speech transcripts and the known movie titles.
//!
//! The index is rebuilt once per questionnaire from all question titles.
//! Scores are Sorensen-Dice bigram similarity over normalized strings,
//! in `[0, 1]`.

use crate::types::{FUZZY_MATCH_THRESHOLD, MATCH_THRESHOLD};

/// A transcript that came close enough to the current title.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    /// The transcript, trimmed. Speech recognition sometimes returns
    /// results with a leading space.
    pub phrase: String,
    pub score: f64,
}

/// Fuzzy string-set index over the questionnaire's titles.
#[derive(Debug, Clone, Default)]
pub struct TitleIndex {
    titles: Vec<String>,
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

impl TitleIndex {
    pub fn new<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            titles: titles.into_iter().map(Into::into).collect(),
        }
    }

    /// Ranked `(score, title)` pairs for a phrase, best first.
    /// Titles keep their original casing.
    pub fn get(&self, phrase: &str) -> Vec<(f64, &str)> {
        let needle = normalize(phrase);
        let mut matches: Vec<(f64, &str)> = self
            .titles
            .iter()
            .map(|title| (strsim::sorensen_dice(&needle, &normalize(title)), title.as_str()))
            .collect();
        matches.sort_by(|a, b| b.0.total_cmp(&a.0));
        matches
    }

    /// Find a transcript whose score against the current title clears the
    /// fuzzy threshold. The first qualifying transcript wins; the engine
    /// does not need the highest-scoring one.
    pub fn best_match(&self, transcripts: &[String], current_title: &str) -> Option<FuzzyMatch> {
        for transcript in transcripts {
            let current = self
                .get(transcript)
                .into_iter()
                .find(|(_, title)| *title == current_title);

            if let Some((score, _)) = current.filter(|(score, _)| *score >= FUZZY_MATCH_THRESHOLD) {
                return Some(FuzzyMatch {
                    phrase: transcript.trim().to_string(),
                    score,
                });
            }
        }
        None
    }
}

/// Whether a fuzzy score is close enough to accept as a correct guess,
/// as opposed to merely close enough to earn a hint.
pub fn is_strong_match(score: f64) -> bool {
    score >= MATCH_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> TitleIndex {
        TitleIndex::new(["The Matrix", "Jurassic Park", "Titanic"])
    }

    #[test]
    fn get_ranks_closest_title_first() {
        let index = index();
        let matches = index.get("the matrix");
        assert_eq!(matches[0].1, "The Matrix");
        assert!(matches[0].0 > 0.99);
    }

    #[test]
    fn best_match_ignores_other_titles() {
        // "titanic" is a perfect match for a different title, so it must
        // not qualify against the current one.
        let m = index().best_match(&["titanic".to_string()], "The Matrix");
        assert!(m.is_none());
    }

    #[test]
    fn best_match_trims_the_transcript() {
        let m = index()
            .best_match(&[" the matrix".to_string()], "The Matrix")
            .expect("should match");
        assert_eq!(m.phrase, "the matrix");
        assert!(is_strong_match(m.score));
    }

    #[test]
    fn best_match_accepts_weak_but_qualifying_scores() {
        let m = index()
            .best_match(&["matrix".to_string()], "The Matrix")
            .expect("partial title should clear the fuzzy threshold");
        assert!(m.score >= FUZZY_MATCH_THRESHOLD);
    }

    #[test]
    fn best_match_empty_transcripts() {
        assert!(index().best_match(&[], "The Matrix").is_none());
    }

    #[test]
    fn strong_match_boundary() {
        assert!(is_strong_match(0.8));
        assert!(!is_strong_match(0.79));
    }
}
