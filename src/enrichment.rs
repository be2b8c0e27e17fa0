//! The fixed six-field enrichment payload produced for every record.

use serde::{Deserialize, Serialize};

/// One of the six generated text fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Short English abstract.
    AbstractEn,
    /// Short Kazakh abstract.
    AbstractKk,
    /// Short French abstract.
    AbstractFr,
    /// Paragraph-length English description.
    DescriptionEn,
    /// Paragraph-length Kazakh description.
    DescriptionKk,
    /// Paragraph-length French description.
    DescriptionFr,
}

impl Field {
    /// Every field, in persisted column order.
    pub const ALL: [Field; 6] = [
        Field::AbstractEn,
        Field::AbstractKk,
        Field::AbstractFr,
        Field::DescriptionEn,
        Field::DescriptionKk,
        Field::DescriptionFr,
    ];

    /// JSON key and column name for the field.
    pub fn name(self) -> &'static str {
        match self {
            Field::AbstractEn => "abstract_en",
            Field::AbstractKk => "abstract_kk",
            Field::AbstractFr => "abstract_fr",
            Field::DescriptionEn => "description_en",
            Field::DescriptionKk => "description_kk",
            Field::DescriptionFr => "description_fr",
        }
    }
}

/// Generated text for a single record.
///
/// A result is either complete (every field non-empty) or, after the retry
/// budget is spent, entirely empty. Partially filled results are never built
/// by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    /// Short English abstract.
    pub abstract_en: String,
    /// Short Kazakh abstract.
    pub abstract_kk: String,
    /// Short French abstract.
    pub abstract_fr: String,
    /// Paragraph-length English description.
    pub description_en: String,
    /// Paragraph-length Kazakh description.
    pub description_kk: String,
    /// Paragraph-length French description.
    pub description_fr: String,
}

impl EnrichmentResult {
    /// The result recorded for a record whose retries were exhausted.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a result by looking each field up by name; absent fields become empty.
    pub fn from_fields<F>(mut lookup: F) -> Self
    where
        F: FnMut(Field) -> Option<String>,
    {
        let mut value = |field| lookup(field).unwrap_or_default();
        Self {
            abstract_en: value(Field::AbstractEn),
            abstract_kk: value(Field::AbstractKk),
            abstract_fr: value(Field::AbstractFr),
            description_en: value(Field::DescriptionEn),
            description_kk: value(Field::DescriptionKk),
            description_fr: value(Field::DescriptionFr),
        }
    }

    /// Returns the text stored for `field`.
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::AbstractEn => &self.abstract_en,
            Field::AbstractKk => &self.abstract_kk,
            Field::AbstractFr => &self.abstract_fr,
            Field::DescriptionEn => &self.description_en,
            Field::DescriptionKk => &self.description_kk,
            Field::DescriptionFr => &self.description_fr,
        }
    }

    /// True when every field carries text.
    pub fn is_complete(&self) -> bool {
        Field::ALL.iter().all(|field| !self.get(*field).is_empty())
    }

    /// True when no field carries text.
    pub fn is_empty(&self) -> bool {
        Field::ALL.iter().all(|field| self.get(*field).is_empty())
    }

    /// Fields that are still blank.
    pub fn missing_fields(&self) -> Vec<Field> {
        Field::ALL
            .iter()
            .copied()
            .filter(|field| self.get(*field).is_empty())
            .collect()
    }
}
