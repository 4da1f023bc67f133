//! Stress tests for concurrent rating writes.
//!
//! Uses a **finite number of operations** per thread so every run terminates
//! and the expected aggregates can be computed exactly afterwards.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use reeldb_core::{quantize_rating, Database, ReelConfig};
use tempfile::tempdir;

fn stress_config() -> ReelConfig {
    let mut config = ReelConfig::default();
    config.storage.max_slots = 4096;
    config.index.user_lock_stripes = 8;
    config
}

/// Deterministic rating in `[1.0, 5.0]` with half-star steps.
fn rating_for(user_id: u32, movie_id: u32, round: u32) -> f32 {
    let x = user_id
        .wrapping_mul(31)
        .wrapping_add(movie_id.wrapping_mul(17))
        .wrapping_add(round.wrapping_mul(7));
    1.0 + (x % 9) as f32 * 0.5
}

fn seed(db: &Database, users: u32, movies: u32) {
    for id in 1..=users {
        db.add_user(id, &format!("user{id}")).expect("add user");
    }
    for id in 1..=movies {
        db.add_movie(1000 + id, &format!("Movie {id}"), &["Drama"])
            .expect("add movie");
    }
}

/// Smoke test: 8 writers all hammering the same movie.
#[test]
fn test_stress_same_movie_8_threads() {
    run_rating_stress(8, 1, 25);
}

/// Medium stress: 16 writers spread over 4 movies.
#[test]
fn test_stress_medium_16_threads() {
    run_rating_stress(16, 4, 40);
}

/// Heavy stress: 64 writers over 16 movies (ignored for CI)
#[test]
#[ignore = "Heavy stress test, run manually"]
fn test_stress_64_threads() {
    run_rating_stress(64, 16, 200);
}

/// Each writer thread owns one user and re-rates every movie `rounds` times.
/// Afterwards every movie aggregate must equal the sum of each user's last
/// rating, and every user's edge file must hold one entry per movie.
fn run_rating_stress(writers: u32, movies: u32, rounds: u32) {
    let dir = tempdir().expect("tempdir");
    let db = Arc::new(Database::open_with_config(dir.path(), &stress_config()).expect("open"));
    seed(&db, writers, movies);

    let writes = Arc::new(AtomicU64::new(0));
    let mut handles = Vec::new();

    for user_id in 1..=writers {
        let db = Arc::clone(&db);
        let writes = Arc::clone(&writes);
        handles.push(thread::spawn(move || {
            for round in 0..rounds {
                let movie_id = 1000 + 1 + (round % movies);
                let rating = rating_for(user_id, movie_id, round);
                db.add_rating(user_id, movie_id, rating).expect("add_rating");
                writes.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }
    for handle in handles {
        handle.join().expect("writer thread panicked");
    }

    assert_eq!(
        writes.load(Ordering::Relaxed),
        u64::from(writers) * u64::from(rounds)
    );

    for m in 1..=movies {
        let movie_id = 1000 + m;
        let mut expected_count = 0u32;
        let mut expected_sum = 0u32;
        for user_id in 1..=writers {
            let last_round = (0..rounds).rev().find(|r| r % movies == m - 1);
            if let Some(round) = last_round {
                expected_count += 1;
                expected_sum += quantize_rating(rating_for(user_id, movie_id, round))
                    .expect("quantize");
            }
        }

        let movie = db.get_movie(movie_id).expect("movie");
        assert_eq!(movie.rating_count, expected_count, "movie {movie_id} count");
        assert_eq!(movie.sum_rating_q, expected_sum, "movie {movie_id} sum");
    }

    let rated_movies = movies.min(rounds);
    for user_id in 1..=writers {
        let edges = db.user_ratings(user_id).expect("edges");
        assert_eq!(edges.len() as u32, rated_movies);
        assert_eq!(db.get_user(user_id).expect("user").total_ratings, rated_movies);
    }
}

/// Several threads rate different movies as the *same* user; the user
/// stripe lock must keep every edge.
#[test]
fn test_same_user_many_movies_keeps_every_edge() {
    let dir = tempdir().expect("tempdir");
    let db = Arc::new(Database::open_with_config(dir.path(), &stress_config()).expect("open"));
    seed(&db, 1, 32);

    let handles: Vec<_> = (0..4u32)
        .map(|t| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                for i in 0..8u32 {
                    let movie_id = 1000 + 1 + t * 8 + i;
                    db.add_rating(1, movie_id, 3.0).expect("add_rating");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("writer thread panicked");
    }

    let mut movies: Vec<u32> = db
        .user_ratings(1)
        .expect("edges")
        .iter()
        .map(|e| e.movie_id)
        .collect();
    movies.sort_unstable();
    assert_eq!(movies, (1001..=1032).collect::<Vec<_>>());
    let user = db.get_user(1).expect("user");
    assert_eq!(user.total_ratings, 32);
    assert_eq!(user.avg_rating_q, 300);
}

/// Readers run alongside writers and must never observe a torn edge file.
#[test]
fn test_readers_alongside_writers() {
    let dir = tempdir().expect("tempdir");
    let db = Arc::new(Database::open_with_config(dir.path(), &stress_config()).expect("open"));
    seed(&db, 4, 4);

    let mut handles = Vec::new();
    for user_id in 1..=4u32 {
        let db = Arc::clone(&db);
        handles.push(thread::spawn(move || {
            for round in 0..30u32 {
                let movie_id = 1001 + round % 4;
                db.add_rating(user_id, movie_id, rating_for(user_id, movie_id, round))
                    .expect("add_rating");
            }
        }));
    }
    for reader in 0..4u32 {
        let db = Arc::clone(&db);
        handles.push(thread::spawn(move || {
            for _ in 0..50 {
                let user_id = 1 + reader;
                let edges = db.user_ratings(user_id).expect("edges");
                assert!(edges.len() <= 4);
                for movie_id in 1001..=1004 {
                    let movie = db.get_movie(movie_id).expect("movie");
                    assert!(movie.rating_count <= 4);
                }
            }
        }));
    }
    for handle in handles {
        handle.join().expect("thread panicked");
    }

    assert_eq!(db.stats().users, 4);
}
