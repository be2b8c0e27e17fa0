//! Checkpoint persistence.
//!
//! Every write replaces the whole checkpoint with the accumulated rows in
//! catalog order. The CSV store writes to a sibling temp file and renames it
//! into place, so readers only ever see the previous or the next complete file.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::enrichment::EnrichmentResult;
use crate::record::{Record, ResultRow};

/// Durable home of the accumulated result rows.
pub trait CheckpointStore {
    /// Loads the persisted rows; an absent store reads as empty.
    fn read(&self) -> Result<Vec<ResultRow>>;
    /// Replaces the persisted rows with `rows`.
    fn write(&self, rows: &[ResultRow]) -> Result<()>;
}

impl<K: CheckpointStore + ?Sized> CheckpointStore for &K {
    fn read(&self) -> Result<Vec<ResultRow>> {
        (**self).read()
    }

    fn write(&self, rows: &[ResultRow]) -> Result<()> {
        (**self).write(rows)
    }
}

/// Rows for every attempted key, in catalog order.
///
/// Keys never attempted are skipped; keys in `accumulated` that are no longer
/// in the catalog are dropped.
pub fn ordered_rows(accumulated: &HashMap<String, ResultRow>, catalog: &[Record]) -> Vec<ResultRow> {
    catalog
        .iter()
        .filter_map(|record| accumulated.get(&record.key).cloned())
        .collect()
}

/// Writes the accumulated state to `store` in catalog order.
pub fn persist<K: CheckpointStore + ?Sized>(
    store: &K,
    accumulated: &HashMap<String, ResultRow>,
    catalog: &[Record],
) -> Result<usize> {
    let rows = ordered_rows(accumulated, catalog);
    store.write(&rows)?;
    Ok(rows.len())
}

/// CSV checkpoint: `movieId,title,genres` plus the six generated columns.
#[derive(Debug, Clone)]
pub struct CsvCheckpointStore {
    path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointRow {
    #[serde(rename = "movieId")]
    movie_id: String,
    title: String,
    genres: String,
    #[serde(default)]
    abstract_en: String,
    #[serde(default)]
    abstract_kk: String,
    #[serde(default)]
    abstract_fr: String,
    #[serde(default)]
    description_en: String,
    #[serde(default)]
    description_kk: String,
    #[serde(default)]
    description_fr: String,
}

impl From<&ResultRow> for CheckpointRow {
    fn from(row: &ResultRow) -> Self {
        let result = &row.result;
        Self {
            movie_id: row.key.clone(),
            title: row.title.clone(),
            genres: row.genre_descriptor.clone(),
            abstract_en: result.abstract_en.clone(),
            abstract_kk: result.abstract_kk.clone(),
            abstract_fr: result.abstract_fr.clone(),
            description_en: result.description_en.clone(),
            description_kk: result.description_kk.clone(),
            description_fr: result.description_fr.clone(),
        }
    }
}

impl From<CheckpointRow> for ResultRow {
    fn from(row: CheckpointRow) -> Self {
        Self {
            key: row.movie_id,
            title: row.title,
            genres: Record::parse_genres(&row.genres),
            genre_descriptor: row.genres,
            result: EnrichmentResult {
                abstract_en: row.abstract_en,
                abstract_kk: row.abstract_kk,
                abstract_fr: row.abstract_fr,
                description_en: row.description_en,
                description_kk: row.description_kk,
                description_fr: row.description_fr,
            },
        }
    }
}

impl CsvCheckpointStore {
    /// Store backed by the CSV file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Checkpoint location.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CheckpointStore for CsvCheckpointStore {
    fn read(&self) -> Result<Vec<ResultRow>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)
            .with_context(|| format!("failed to open checkpoint {:?}", self.path))?;
        read_rows(file).with_context(|| format!("failed to read checkpoint {:?}", self.path))
    }

    fn write(&self, rows: &[ResultRow]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {:?}", dir))?;
        let mut tmp = NamedTempFile::new_in(&dir)
            .with_context(|| format!("failed to create temp checkpoint in {:?}", dir))?;
        write_rows(tmp.as_file_mut(), rows)
            .with_context(|| format!("failed to write checkpoint {:?}", self.path))?;
        tmp.as_file()
            .sync_all()
            .with_context(|| format!("failed to sync checkpoint {:?}", self.path))?;
        tmp.persist(&self.path)
            .with_context(|| format!("failed to replace checkpoint {:?}", self.path))?;
        Ok(())
    }
}

/// Parses checkpoint CSV from any reader.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<ResultRow>> {
    let mut csv = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();
    for (row_no, row) in csv.deserialize::<CheckpointRow>().enumerate() {
        let row = row.with_context(|| format!("invalid checkpoint row {}", row_no + 1))?;
        rows.push(row.into());
    }
    Ok(rows)
}

/// Serializes `rows` as checkpoint CSV, header included even when empty.
pub fn write_rows<W: Write>(writer: W, rows: &[ResultRow]) -> Result<()> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv.write_record(CHECKPOINT_HEADER)?;
    for row in rows {
        csv.serialize(CheckpointRow::from(row))?;
    }
    csv.flush()?;
    Ok(())
}

const CHECKPOINT_HEADER: [&str; 9] = [
    "movieId",
    "title",
    "genres",
    "abstract_en",
    "abstract_kk",
    "abstract_fr",
    "description_en",
    "description_kk",
    "description_fr",
];

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(key: &str) -> Record {
        Record::new(key, format!("Movie {key}"), vec!["Drama".into(), "War".into()])
    }

    fn complete(tag: &str) -> EnrichmentResult {
        EnrichmentResult::from_fields(|field| Some(format!("{tag} {}", field.name())))
    }

    #[test]
    fn ordered_rows_follow_catalog_not_insertion() {
        let catalog: Vec<_> = ["1", "2", "3", "4"].iter().map(|key| record(key)).collect();
        let mut accumulated = HashMap::new();
        for key in ["4", "1", "3"] {
            accumulated.insert(
                key.to_string(),
                ResultRow::from_outcome(&record(key), complete(key)),
            );
        }

        let keys: Vec<_> = ordered_rows(&accumulated, &catalog)
            .into_iter()
            .map(|row| row.key)
            .collect();

        assert_eq!(keys, vec!["1", "3", "4"]);
    }

    #[test]
    fn persisting_twice_is_byte_identical() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = CsvCheckpointStore::new(dir.path().join("out.csv"));
        let catalog: Vec<_> = ["10", "20", "30"].iter().map(|key| record(key)).collect();
        let mut accumulated = HashMap::new();
        accumulated.insert("30".into(), ResultRow::from_outcome(&catalog[2], complete("c")));
        accumulated.insert(
            "10".into(),
            ResultRow::from_outcome(&catalog[0], EnrichmentResult::empty()),
        );

        persist(&store, &accumulated, &catalog).expect("first write");
        let first = fs::read(store.path()).expect("read first");
        persist(&store, &accumulated, &catalog).expect("second write");
        let second = fs::read(store.path()).expect("read second");

        assert_eq!(first, second);
    }

    #[test]
    fn csv_store_reads_back_what_it_wrote() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = CsvCheckpointStore::new(dir.path().join("nested").join("out.csv"));
        let mut text = complete("x");
        text.description_kk = "Кино, \"quoted\"\nwith newline".into();
        let rows = vec![
            ResultRow::from_outcome(&record("1"), text),
            ResultRow::from_outcome(&record("2"), EnrichmentResult::empty()),
        ];

        store.write(&rows).expect("write");

        assert_eq!(store.read().expect("read"), rows);
    }

    #[test]
    fn genre_field_round_trips_as_written() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = CsvCheckpointStore::new(dir.path().join("out.csv"));
        let record = Record::from_descriptor("7", "Paths of Glory (1957)", "Drama| War|");
        let rows = vec![ResultRow::from_outcome(&record, complete("p"))];

        store.write(&rows).expect("write");

        let text = fs::read_to_string(store.path()).expect("read");
        let data = text.lines().nth(1).expect("data row");
        assert!(data.starts_with("7,Paths of Glory (1957),Drama| War|,"), "{data}");
        assert_eq!(store.read().expect("read"), rows);
    }

    #[test]
    fn absent_checkpoint_reads_empty() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = CsvCheckpointStore::new(dir.path().join("missing.csv"));
        assert!(store.read().expect("read").is_empty());
    }

    #[test]
    fn empty_rows_write_header_only() {
        let mut buf = Vec::new();
        write_rows(&mut buf, &[]).expect("write");
        assert_eq!(
            String::from_utf8(buf).expect("utf8"),
            "movieId,title,genres,abstract_en,abstract_kk,abstract_fr,description_en,description_kk,description_fr\n"
        );
    }

    #[test]
    fn header_matches_serialized_columns() {
        let mut buf = Vec::new();
        write_rows(&mut buf, &[ResultRow::from_outcome(&record("5"), complete("t"))])
            .expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        let mut lines = text.lines();
        assert_eq!(lines.next().map(|line| line.split(',').count()), Some(9));
        assert!(lines.next().expect("data row").starts_with("5,Movie 5,Drama|War,t abstract_en"));
    }
}
