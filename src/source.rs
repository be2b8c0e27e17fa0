//! Catalog readers.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::record::Record;

/// Supplies the full, ordered catalog. Read once per run.
pub trait RecordSource {
    /// Returns every record in catalog order.
    fn read_all(&self) -> Result<Vec<Record>>;
}

impl RecordSource for Vec<Record> {
    fn read_all(&self) -> Result<Vec<Record>> {
        Ok(self.clone())
    }
}

/// MovieLens-style `movies.csv` with `movieId,title,genres` columns.
#[derive(Debug, Clone)]
pub struct CsvRecordSource {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CatalogRow {
    #[serde(rename = "movieId")]
    movie_id: String,
    title: String,
    #[serde(default)]
    genres: String,
}

impl CsvRecordSource {
    /// Reads the catalog at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Catalog location.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSource for CsvRecordSource {
    fn read_all(&self) -> Result<Vec<Record>> {
        let file = File::open(&self.path)
            .with_context(|| format!("failed to open catalog {:?}", self.path))?;
        read_catalog(file).with_context(|| format!("failed to read catalog {:?}", self.path))
    }
}

/// Parses catalog CSV from any reader.
pub fn read_catalog<R: Read>(reader: R) -> Result<Vec<Record>> {
    let mut csv = csv::Reader::from_reader(reader);
    let mut records = Vec::new();
    for (row_no, row) in csv.deserialize::<CatalogRow>().enumerate() {
        let row = row.with_context(|| format!("invalid catalog row {}", row_no + 1))?;
        records.push(Record::from_descriptor(row.movie_id, row.title, row.genres));
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reads_catalog_in_file_order() {
        let csv = "movieId,title,genres\n\
                   1,Toy Story (1995),Adventure|Animation|Children\n\
                   2,Jumanji (1995),Adventure|Fantasy\n\
                   3,\"American President, The (1995)\",Comedy|Drama|Romance\n";

        let records = read_catalog(csv.as_bytes()).expect("catalog parses");

        assert_eq!(
            records,
            vec![
                Record::new(
                    "1",
                    "Toy Story (1995)",
                    vec!["Adventure".into(), "Animation".into(), "Children".into()]
                ),
                Record::new("2", "Jumanji (1995)", vec!["Adventure".into(), "Fantasy".into()]),
                Record::new(
                    "3",
                    "American President, The (1995)",
                    vec!["Comedy".into(), "Drama".into(), "Romance".into()]
                ),
            ]
        );
    }

    #[test]
    fn untidy_genre_field_is_kept_as_written() {
        let csv = "movieId,title,genres\n7,Paths of Glory (1957),Drama| War|\n";

        let records = read_catalog(csv.as_bytes()).expect("catalog parses");

        assert_eq!(records[0].genres, vec!["Drama", "War"]);
        assert_eq!(records[0].genre_descriptor, "Drama| War|");
    }

    #[test]
    fn missing_file_is_an_error() {
        let source = CsvRecordSource::new("/nonexistent/movies.csv");
        let err = source.read_all().unwrap_err();
        assert!(err.to_string().contains("failed to open catalog"));
    }

    #[test]
    fn row_without_title_is_an_error() {
        let csv = "movieId,title,genres\n1\n";
        assert!(read_catalog(csv.as_bytes()).is_err());
    }
}
