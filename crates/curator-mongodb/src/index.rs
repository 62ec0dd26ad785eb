//! Declarative index specifications
//!
//! An [`IndexSpec`] is the literal description of one index: its ordered key
//! document plus the options the scripts use (name, uniqueness, collation and
//! partial filter). It converts into a driver `IndexModel` without altering
//! any of those values.

use bson::{doc, Bson, Document as BsonDocument};
use mongodb::options::{Collation, CollationStrength, IndexOptions};
use mongodb::IndexModel;
use serde::{Deserialize, Serialize};

use crate::validation::validate_index_keys;
use crate::Result;
use curator_common::CuratorError;

/// Collation attached to an index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollationSpec {
    pub locale: String,
    /// Comparison level; 2 compares base letters and accents but ignores case
    pub strength: u32,
}

impl CollationSpec {
    pub fn new(locale: impl Into<String>, strength: u32) -> Self {
        Self {
            locale: locale.into(),
            strength,
        }
    }

    /// English, strength 2: case-insensitive, accent-sensitive
    pub fn case_insensitive_en() -> Self {
        Self::new("en", 2)
    }

    /// True when string comparison under this collation ignores case
    pub fn ignores_case(&self) -> bool {
        self.strength <= 2
    }

    fn to_collation(&self) -> Collation {
        let strength = match self.strength {
            1 => CollationStrength::Primary,
            2 => CollationStrength::Secondary,
            3 => CollationStrength::Tertiary,
            4 => CollationStrength::Quaternary,
            // 5; anything else is rejected by `IndexSpec::validate`
            _ => CollationStrength::Identical,
        };
        Collation::builder()
            .locale(self.locale.clone())
            .strength(strength)
            .build()
    }
}

/// One index, as declared by a script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSpec {
    #[serde(rename = "key")]
    pub keys: BsonDocument,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub unique: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collation: Option<CollationSpec>,
    #[serde(
        rename = "partialFilterExpression",
        skip_serializing_if = "Option::is_none"
    )]
    pub partial_filter: Option<BsonDocument>,
}

impl IndexSpec {
    /// Create a plain, non-unique index over `keys`
    pub fn new(keys: BsonDocument) -> Self {
        Self {
            keys,
            name: None,
            unique: false,
            collation: None,
            partial_filter: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn collation(mut self, collation: CollationSpec) -> Self {
        self.collation = Some(collation);
        self
    }

    /// Restrict the index (and its uniqueness) to documents matching `filter`
    pub fn partial_filter(mut self, filter: BsonDocument) -> Self {
        self.partial_filter = Some(filter);
        self
    }

    /// The name the server will give this index.
    ///
    /// An explicit name wins; otherwise `field_direction` pairs are joined
    /// with `_`, e.g. `userId_1_titleId_1`.
    pub fn resolved_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        self.keys
            .iter()
            .map(|(field, direction)| format!("{}_{}", field, direction_label(direction)))
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Key fields in declaration order
    pub fn fields(&self) -> Vec<&str> {
        self.keys.keys().map(String::as_str).collect()
    }

    pub fn validate(&self) -> Result<()> {
        validate_index_keys(&self.keys)?;
        if let Some(collation) = &self.collation {
            if !(1..=5).contains(&collation.strength) {
                return Err(CuratorError::Validation(format!(
                    "Collation strength must be between 1 and 5, got {}",
                    collation.strength
                )));
            }
        }
        Ok(())
    }

    /// Build the driver model. Options are copied verbatim.
    pub fn to_index_model(&self) -> IndexModel {
        let mut options = IndexOptions::default();
        options.name = self.name.clone();
        options.unique = self.unique.then_some(true);
        options.collation = self.collation.as_ref().map(CollationSpec::to_collation);
        options.partial_filter_expression = self.partial_filter.clone();

        IndexModel::builder()
            .keys(self.keys.clone())
            .options(options)
            .build()
    }
}

fn direction_label(direction: &Bson) -> String {
    match direction {
        Bson::String(kind) => kind.clone(),
        Bson::Int32(d) => d.to_string(),
        Bson::Int64(d) => d.to_string(),
        Bson::Double(d) if d.fract() == 0.0 => (*d as i64).to_string(),
        Bson::Double(d) => d.to_string(),
        other => other.to_string(),
    }
}

/// Partial filter used by the script indexes: `{field: {$exists: true}}`
pub fn exists_filter(field: &str) -> BsonDocument {
    doc! { field: { "$exists": true } }
}

/// Partial filter used by the application indexes: every field is a
/// non-empty string.
pub fn non_empty_strings_filter(fields: &[&str]) -> BsonDocument {
    let clauses: Vec<Bson> = fields
        .iter()
        .flat_map(|field| {
            [
                Bson::Document(doc! { *field: { "$type": "string" } }),
                Bson::Document(doc! { *field: { "$gt": "" } }),
            ]
        })
        .collect();
    doc! { "$and": clauses }
}
