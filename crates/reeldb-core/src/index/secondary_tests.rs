//! Tests for `secondary` module

use super::secondary::{normalize_title, GenreIndex, TitleIndex};

#[test]
fn test_normalize_title() {
    assert_eq!(normalize_title("The Matrix (1999)"), "thematrix1999");
    assert_eq!(normalize_title("Amélie"), "amlie");
    assert_eq!(normalize_title("  --  "), "");
}

#[test]
fn test_genre_lists_keep_insertion_order() {
    let mut index = GenreIndex::new(10);

    index.insert(3, &["Drama"]);
    index.insert(1, &["Drama", "Comedy"]);

    assert_eq!(index.get("Drama"), vec![3, 1]);
    assert_eq!(index.get("Comedy"), vec![1]);
    assert!(index.get("Horror").is_empty());
}

#[test]
fn test_genre_cap_drops_extra_ids() {
    // Arrange
    let mut index = GenreIndex::new(2);

    // Act
    for id in 1..=4 {
        index.insert(id, &["Action"]);
    }

    // Assert
    assert_eq!(index.get("Action"), vec![1, 2]);
}

#[test]
fn test_genre_remove_drops_empty_lists() {
    let mut index = GenreIndex::new(10);
    index.insert(7, &["Action", "Sci-Fi"]);
    index.insert(8, &["Action"]);

    index.remove(7);

    assert_eq!(index.get("Action"), vec![8]);
    assert!(index.get("Sci-Fi").is_empty());
    assert_eq!(
        index.genres().into_iter().collect::<Vec<_>>(),
        vec!["Action".to_string()]
    );
}

#[test]
fn test_title_search_substring() {
    // Arrange
    let mut index = TitleIndex::new();
    index.insert(7, "The Matrix (1999)");
    index.insert(8, "The Matrix Reloaded (2003)");
    index.insert(9, "Toy Story (1995)");

    // Act
    let matrix = index.search("matrix");
    let punctuated = index.search("  MATRIX re-loaded ");

    // Assert
    assert_eq!(matrix, vec![7, 8]);
    assert_eq!(punctuated, vec![8]);
    assert!(index.search("alien").is_empty());
}

#[test]
fn test_title_search_empty_query_matches_nothing() {
    let mut index = TitleIndex::new();
    index.insert(1, "Heat");

    assert!(index.search("").is_empty());
    assert!(index.search("!!!").is_empty());
}

#[test]
fn test_shared_normalized_title_keeps_all_ids() {
    let mut index = TitleIndex::new();
    index.insert(2, "Heat");
    index.insert(1, "HEAT!");

    assert_eq!(index.search("heat"), vec![1, 2]);

    index.remove(2, "Heat");
    assert_eq!(index.search("heat"), vec![1]);
    assert_eq!(index.len(), 1);

    index.remove(1, "heat");
    assert!(index.is_empty());
}

#[test]
fn test_title_remove_id_without_title() {
    let mut index = TitleIndex::new();
    index.insert(4, "Alien");
    index.insert(5, "Aliens");
    index.insert(4, "Alien Director's Cut");

    index.remove_id(4);

    assert_eq!(index.search("alien"), vec![5]);
    assert_eq!(index.len(), 1);
}
