//! Input validation for names and index keys
//!
//! Every collection, database and index key used by a command is checked
//! before it reaches the driver, so a typo in a script fails that one command
//! with a readable message instead of a server round trip.

use crate::Result;
use bson::{Bson, Document as BsonDocument};
use curator_common::CuratorError;

/// Maximum allowed length for collection names (MongoDB limit is 255, we're more conservative)
const MAX_COLLECTION_NAME_LENGTH: usize = 120;

/// Maximum database name length accepted by the server
const MAX_DATABASE_NAME_LENGTH: usize = 63;

/// Characters the server rejects in database names
const FORBIDDEN_DATABASE_CHARS: &[char] = &['/', '\\', '.', ' ', '"', '$', '\0'];

/// Validated collection name
///
/// # Guarantees
/// - Not empty
/// - Maximum 120 characters
/// - No null bytes
/// - No "system." prefix (system collections)
/// - No $ characters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCollectionName {
    name: String,
}

impl ValidatedCollectionName {
    /// Creates a new validated collection name
    ///
    /// # Errors
    /// Returns `CuratorError::Validation` if any guarantee does not hold.
    pub fn new(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(CuratorError::Validation(
                "Collection name cannot be empty".to_string(),
            ));
        }

        if name.len() > MAX_COLLECTION_NAME_LENGTH {
            return Err(CuratorError::Validation(format!(
                "Collection name exceeds maximum length of {} characters: '{}'",
                MAX_COLLECTION_NAME_LENGTH, name
            )));
        }

        if name.contains('\0') {
            return Err(CuratorError::Validation(
                "Collection name cannot contain null bytes".to_string(),
            ));
        }

        if name.starts_with("system.") {
            return Err(CuratorError::Validation(format!(
                "Collection name cannot start with 'system.' (reserved): '{}'",
                name
            )));
        }

        if name.contains('$') {
            return Err(CuratorError::Validation(format!(
                "Collection name cannot contain '$' character: '{}'",
                name
            )));
        }

        if name.contains("..") || name.contains("//") {
            tracing::warn!(collection = name, "collection name contains suspicious pattern");
        }

        Ok(ValidatedCollectionName {
            name: name.to_string(),
        })
    }

    /// Returns the validated collection name as a string slice
    pub fn as_str(&self) -> &str {
        &self.name
    }
}

/// Checks a database name against the server's naming rules.
pub fn validate_database_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CuratorError::Validation(
            "Database name cannot be empty".to_string(),
        ));
    }

    if name.len() > MAX_DATABASE_NAME_LENGTH {
        return Err(CuratorError::Validation(format!(
            "Database name exceeds maximum length of {} bytes: '{}'",
            MAX_DATABASE_NAME_LENGTH, name
        )));
    }

    if let Some(c) = name.chars().find(|c| FORBIDDEN_DATABASE_CHARS.contains(c)) {
        return Err(CuratorError::Validation(format!(
            "Database name cannot contain {:?}: '{}'",
            c, name
        )));
    }

    Ok(())
}

/// Checks an index key document.
///
/// Each key must map to an ascending (1) or descending (-1) direction, or to
/// one of the special index types the server understands.
pub fn validate_index_keys(keys: &BsonDocument) -> Result<()> {
    const SPECIAL_INDEX_TYPES: &[&str] = &["text", "hashed", "2d", "2dsphere"];

    if keys.is_empty() {
        return Err(CuratorError::Validation(
            "Index must have at least one key".to_string(),
        ));
    }

    for (field, direction) in keys {
        if field.is_empty() || field.starts_with('$') {
            return Err(CuratorError::Validation(format!(
                "Invalid index field name: '{}'",
                field
            )));
        }

        let valid = match direction {
            Bson::Int32(d) => *d == 1 || *d == -1,
            Bson::Int64(d) => *d == 1 || *d == -1,
            Bson::String(kind) => SPECIAL_INDEX_TYPES.contains(&kind.as_str()),
            _ => false,
        };

        if !valid {
            return Err(CuratorError::Validation(format!(
                "Invalid direction for index field '{}': {}",
                field, direction
            )));
        }
    }

    Ok(())
}
