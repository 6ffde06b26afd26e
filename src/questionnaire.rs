//! Turns a raw movie pool into the ordered question sequence for one game.

use rand::Rng;

use crate::randomness::shuffle;
use crate::types::{Answer, Movie, Question};

/// Build a questionnaire of `size` questions: for each question one correct
/// answer derived from the question's movie plus two decoys consumed in
/// non-overlapping pairs from the shuffled extra pool, so no decoy pair is
/// reused within a game.
///
/// Returns an empty questionnaire when the pools cannot support a full game
/// (fewer than `size` movies or fewer than `2 * size` extras). That is the
/// data-unavailability domain: the session renders a retry message instead
/// of failing.
pub fn build(
    rng: &mut impl Rng,
    mut movies: Vec<Movie>,
    mut extras: Vec<Movie>,
    size: usize,
) -> Vec<Question> {
    if size == 0 || movies.len() < size || extras.len() < 2 * size {
        return Vec::new();
    }

    shuffle(rng, &mut movies);
    shuffle(rng, &mut extras);

    movies
        .into_iter()
        .take(size)
        .enumerate()
        .map(|(i, movie)| {
            let mut answers = vec![
                Answer {
                    id: movie.id.clone(),
                    label: movie.title.clone(),
                    is_correct: true,
                },
                decoy(&extras[2 * i]),
                decoy(&extras[2 * i + 1]),
            ];
            shuffle(rng, &mut answers);
            Question { movie, answers }
        })
        .collect()
}

fn decoy(movie: &Movie) -> Answer {
    Answer {
        id: movie.id.clone(),
        label: movie.title.clone(),
        is_correct: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn movie(id: usize) -> Movie {
        Movie {
            id: format!("m{id}"),
            title: format!("Movie {id}"),
            poster_path: format!("/poster/{id}.jpg"),
            backdrop_path: format!("/backdrop/{id}.jpg"),
        }
    }

    fn pools(movies: usize, extras: usize) -> (Vec<Movie>, Vec<Movie>) {
        (
            (0..movies).map(movie).collect(),
            (1000..1000 + extras).map(movie).collect(),
        )
    }

    #[test]
    fn builds_the_configured_number_of_questions() {
        let mut rng = StdRng::seed_from_u64(1);
        let (movies, extras) = pools(20, 20);
        let questionnaire = build(&mut rng, movies, extras, 10);
        assert_eq!(questionnaire.len(), 10);
    }

    #[test]
    fn each_question_has_one_correct_answer_matching_its_movie() {
        let mut rng = StdRng::seed_from_u64(2);
        let (movies, extras) = pools(10, 20);
        for question in build(&mut rng, movies, extras, 10) {
            assert_eq!(question.answers.len(), 3);
            let correct: Vec<_> = question.answers.iter().filter(|a| a.is_correct).collect();
            assert_eq!(correct.len(), 1);
            assert_eq!(correct[0].id, question.movie.id);
            assert_eq!(correct[0].label, question.movie.title);
        }
    }

    #[test]
    fn answer_ids_are_unique_within_a_question() {
        let mut rng = StdRng::seed_from_u64(3);
        let (movies, extras) = pools(10, 20);
        for question in build(&mut rng, movies, extras, 10) {
            let ids: HashSet<_> = question.answers.iter().map(|a| a.id.as_str()).collect();
            assert_eq!(ids.len(), 3);
        }
    }

    #[test]
    fn decoys_are_never_reused_across_questions() {
        let mut rng = StdRng::seed_from_u64(4);
        let (movies, extras) = pools(10, 20);
        let questionnaire = build(&mut rng, movies, extras, 10);
        let mut seen = HashSet::new();
        for question in &questionnaire {
            for answer in question.answers.iter().filter(|a| !a.is_correct) {
                assert!(seen.insert(answer.id.clone()), "decoy {} reused", answer.id);
            }
        }
        assert_eq!(seen.len(), 20);
    }

    #[test]
    fn decoy_titles_never_equal_the_question_title() {
        let mut rng = StdRng::seed_from_u64(5);
        let (movies, extras) = pools(10, 20);
        for question in build(&mut rng, movies, extras, 10) {
            for answer in question.answers.iter().filter(|a| !a.is_correct) {
                assert_ne!(answer.label, question.movie.title);
            }
        }
    }

    #[test]
    fn short_pools_yield_an_empty_questionnaire() {
        let mut rng = StdRng::seed_from_u64(6);

        let (movies, extras) = pools(9, 20);
        assert!(build(&mut rng, movies, extras, 10).is_empty());

        let (movies, extras) = pools(10, 19);
        assert!(build(&mut rng, movies, extras, 10).is_empty());

        let (movies, extras) = pools(0, 0);
        assert!(build(&mut rng, movies, extras, 10).is_empty());
    }
}
