//! The mutation commands a script can declare

use std::fmt;

use bson::{doc, Bson, Document as BsonDocument};
use serde::Serialize;

use crate::index::IndexSpec;
use crate::store::DocumentStore;
use crate::validation::ValidatedCollectionName;
use crate::Result;

/// What a command does to its collection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Operation {
    CreateIndex { spec: IndexSpec },
    InsertMany { documents: Vec<BsonDocument> },
    UpdateMany { filter: BsonDocument, update: BsonDocument },
    DeleteOne { filter: BsonDocument },
}

/// One fixed-parameter command against a named collection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    pub collection: String,
    #[serde(flatten)]
    pub operation: Operation,
}

impl Command {
    pub fn create_index(collection: impl Into<String>, spec: IndexSpec) -> Self {
        Self {
            collection: collection.into(),
            operation: Operation::CreateIndex { spec },
        }
    }

    pub fn insert_many(collection: impl Into<String>, documents: Vec<BsonDocument>) -> Self {
        Self {
            collection: collection.into(),
            operation: Operation::InsertMany { documents },
        }
    }

    pub fn update_many(
        collection: impl Into<String>,
        filter: BsonDocument,
        update: BsonDocument,
    ) -> Self {
        Self {
            collection: collection.into(),
            operation: Operation::UpdateMany { filter, update },
        }
    }

    pub fn delete_one(collection: impl Into<String>, filter: BsonDocument) -> Self {
        Self {
            collection: collection.into(),
            operation: Operation::DeleteOne { filter },
        }
    }

    /// Convenience for `deleteOne({_id: id})`
    pub fn delete_by_id(collection: impl Into<String>, id: impl Into<Bson>) -> Self {
        Self::delete_one(collection, doc! { "_id": id.into() })
    }

    /// Issue the command. The result is returned untouched for the caller to log.
    pub async fn execute<S>(&self, store: &S) -> Result<CommandOutcome>
    where
        S: DocumentStore + ?Sized,
    {
        let collection = ValidatedCollectionName::new(&self.collection)?;
        let collection = collection.as_str();

        match &self.operation {
            Operation::CreateIndex { spec } => {
                spec.validate()?;
                let name = store.create_index(collection, spec).await?;
                Ok(CommandOutcome::IndexCreated {
                    name,
                    unique: spec.unique,
                })
            }
            Operation::InsertMany { documents } => {
                let outcome = store.insert_many(collection, documents.clone()).await?;
                Ok(CommandOutcome::Inserted {
                    ids: outcome.inserted_ids,
                })
            }
            Operation::UpdateMany { filter, update } => {
                let outcome = store
                    .update_many(collection, filter.clone(), update.clone())
                    .await?;
                Ok(CommandOutcome::Updated {
                    matched: outcome.matched_count,
                    modified: outcome.modified_count,
                })
            }
            Operation::DeleteOne { filter } => {
                let outcome = store.delete_one(collection, filter.clone()).await?;
                Ok(CommandOutcome::Deleted {
                    count: outcome.deleted_count,
                })
            }
        }
    }

    /// Operator-facing label used in error summaries
    pub fn failure_label(&self) -> &'static str {
        match &self.operation {
            Operation::CreateIndex { spec } if spec.unique => "creating unique index",
            Operation::CreateIndex { .. } => "creating index",
            Operation::InsertMany { .. } => "inserting documents",
            Operation::UpdateMany { .. } => "updating documents",
            Operation::DeleteOne { .. } => "deleting document",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operation {
            Operation::CreateIndex { spec } => {
                write!(f, "{}.createIndex({}", self.collection, spec.keys)?;
                if spec.unique {
                    write!(f, ", unique")?;
                }
                write!(f, ")")
            }
            Operation::InsertMany { documents } => {
                write!(f, "{}.insertMany([{} docs])", self.collection, documents.len())
            }
            Operation::UpdateMany { filter, update } => {
                write!(f, "{}.updateMany({}, {})", self.collection, filter, update)
            }
            Operation::DeleteOne { filter } => {
                write!(f, "{}.deleteOne({})", self.collection, filter)
            }
        }
    }
}

/// What the store reported back for a successful command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    IndexCreated { name: String, unique: bool },
    Inserted { ids: Vec<Bson> },
    Updated { matched: u64, modified: u64 },
    Deleted { count: u64 },
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutcome::IndexCreated { name, unique: true } => {
                write!(f, "✅ Unique index created: {}", name)
            }
            CommandOutcome::IndexCreated { name, unique: false } => {
                write!(f, "✅ Index created: {}", name)
            }
            CommandOutcome::Inserted { ids } => {
                let ids = ids.iter().map(ToString::to_string).collect::<Vec<_>>();
                write!(f, "✅ {} documents inserted: [{}]", ids.len(), ids.join(", "))
            }
            CommandOutcome::Updated { matched, modified } => {
                write!(
                    f,
                    "✅ {} documents modified ({} matched)",
                    modified, matched
                )
            }
            CommandOutcome::Deleted { count } => write!(f, "{} document deleted", count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_summaries() {
        let created = CommandOutcome::IndexCreated {
            name: "email_1".to_string(),
            unique: true,
        };
        assert_eq!(created.to_string(), "✅ Unique index created: email_1");

        let deleted = CommandOutcome::Deleted { count: 0 };
        assert_eq!(deleted.to_string(), "0 document deleted");

        let inserted = CommandOutcome::Inserted {
            ids: vec![Bson::String("a".into()), Bson::String("b".into())],
        };
        assert_eq!(inserted.to_string(), "✅ 2 documents inserted: [\"a\", \"b\"]");

        let updated = CommandOutcome::Updated {
            matched: 3,
            modified: 2,
        };
        assert_eq!(updated.to_string(), "✅ 2 documents modified (3 matched)");
    }

    #[test]
    fn test_command_display() {
        let cmd = Command::delete_by_id("titles", "tt0117060");
        assert_eq!(cmd.to_string(), "titles.deleteOne({ \"_id\": \"tt0117060\" })");
        assert_eq!(cmd.failure_label(), "deleting document");
    }

    #[test]
    fn test_failure_label_distinguishes_unique_indexes() {
        let unique = Command::create_index(
            "ratings",
            IndexSpec::new(doc! { "userId": 1 }).unique(true),
        );
        let plain = Command::create_index("comments", IndexSpec::new(doc! { "title_id": 1 }));
        assert_eq!(unique.failure_label(), "creating unique index");
        assert_eq!(plain.failure_label(), "creating index");
    }

    #[test]
    fn test_command_serializes_with_op_tag() {
        let cmd = Command::update_many("titles", doc! {}, doc! { "$set": { "watched": false } });
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["collection"], "titles");
        assert_eq!(json["op"], "updateMany");
        assert_eq!(json["update"]["$set"]["watched"], false);
    }
}
