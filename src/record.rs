//! Catalog records and the persisted rows derived from them.

use serde::{Deserialize, Serialize};

use crate::enrichment::EnrichmentResult;

/// Immutable catalog entry read once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Stable catalog key (the MovieLens `movieId`).
    pub key: String,
    /// Display title, usually with the release year appended.
    pub title: String,
    /// Ordered genre list.
    pub genres: Vec<String>,
    /// Genre field exactly as the catalog spelled it; written back unchanged.
    pub genre_descriptor: String,
}

impl Record {
    /// Creates a record from its components.
    pub fn new(key: impl Into<String>, title: impl Into<String>, genres: Vec<String>) -> Self {
        let genre_descriptor = genres.join("|");
        Self {
            key: key.into(),
            title: title.into(),
            genres,
            genre_descriptor,
        }
    }

    /// Creates a record from a raw pipe-delimited genre descriptor.
    pub fn from_descriptor(
        key: impl Into<String>,
        title: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        let genre_descriptor = descriptor.into();
        Self {
            key: key.into(),
            title: title.into(),
            genres: Self::parse_genres(&genre_descriptor),
            genre_descriptor,
        }
    }

    /// Splits a pipe-delimited genre descriptor (`Comedy|Drama`) into its parts.
    pub fn parse_genres(raw: &str) -> Vec<String> {
        raw.split('|')
            .map(str::trim)
            .filter(|genre| !genre.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Genres joined with `sep`.
    pub fn genres_joined(&self, sep: &str) -> String {
        self.genres.join(sep)
    }
}

/// Persisted unit: the record plus whatever enrichment it ended with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    /// Catalog key, used as the join key on resume.
    pub key: String,
    /// Title copied from the record.
    pub title: String,
    /// Genres copied from the record.
    pub genres: Vec<String>,
    /// Raw genre field copied from the record.
    pub genre_descriptor: String,
    /// Generated text, complete or entirely empty.
    pub result: EnrichmentResult,
}

impl ResultRow {
    /// Pairs a record with the result its retry sequence terminated with.
    pub fn from_outcome(record: &Record, result: EnrichmentResult) -> Self {
        Self {
            key: record.key.clone(),
            title: record.title.clone(),
            genres: record.genres.clone(),
            genre_descriptor: record.genre_descriptor.clone(),
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pipe_delimited_genres() {
        assert_eq!(
            Record::parse_genres("Adventure|Animation|Children"),
            vec!["Adventure", "Animation", "Children"]
        );
    }

    #[test]
    fn empty_genre_descriptor_yields_no_genres() {
        assert!(Record::parse_genres("").is_empty());
        assert_eq!(Record::parse_genres("Drama||"), vec!["Drama"]);
    }

    #[test]
    fn descriptor_is_kept_verbatim_beside_parsed_genres() {
        let record = Record::from_descriptor("7", "Paths of Glory (1957)", "Drama| War|");
        assert_eq!(record.genres, vec!["Drama", "War"]);
        assert_eq!(record.genre_descriptor, "Drama| War|");
    }

    #[test]
    fn row_copies_record_fields() {
        let record = Record::new("1", "Toy Story (1995)", vec!["Comedy".into()]);
        let row = ResultRow::from_outcome(&record, EnrichmentResult::empty());
        assert_eq!(row.key, "1");
        assert_eq!(row.title, "Toy Story (1995)");
        assert_eq!(row.genres, vec!["Comedy"]);
        assert_eq!(row.genre_descriptor, "Comedy");
        assert!(row.result.is_empty());
    }
}
