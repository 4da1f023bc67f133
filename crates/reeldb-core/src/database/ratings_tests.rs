//! Tests for `ratings` module

use super::ratings::{apply_rating, mean_q};
use crate::error::Error;
use crate::model::Movie;

#[test]
fn test_apply_rating_new_and_replace() {
    let mut movie = Movie::new(10, "X", &["Action"]);

    apply_rating(&mut movie, None, 400).expect("first");
    apply_rating(&mut movie, None, 500).expect("second user");
    apply_rating(&mut movie, Some(400), 200).expect("replace");

    assert_eq!(movie.rating_count, 2);
    assert_eq!(movie.sum_rating_q, 700);
}

#[test]
fn test_apply_rating_overflow_leaves_movie_unchanged() {
    let mut movie = Movie::new(10, "X", &["Action"]);
    movie.sum_rating_q = u32::MAX - 50;
    movie.rating_count = 7;

    let result = apply_rating(&mut movie, None, 100);

    assert!(matches!(result, Err(Error::Capacity(_))));
    assert_eq!(movie.sum_rating_q, u32::MAX - 50);
    assert_eq!(movie.rating_count, 7);
}

#[test]
fn test_mean_q_rounds() {
    assert_eq!(mean_q(0, 0), 0);
    assert_eq!(mean_q(900, 2), 450);
    assert_eq!(mean_q(1000, 3), 333);
    assert_eq!(mean_q(1001, 2), 501);
}
