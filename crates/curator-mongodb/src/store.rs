//! The document-store seam
//!
//! [`DocumentStore`] is the narrow slice of a database client the runner
//! needs: one method per command kind plus the index listing used by the
//! ensure/drop helpers. [`crate::MongoStore`] talks to a real server and
//! [`crate::MemoryStore`] is the in-process fake used by tests.

use async_trait::async_trait;
use bson::{Bson, Document as BsonDocument};

use crate::index::IndexSpec;
use crate::Result;

/// Name of the index every collection has on `_id`; it can never be dropped
pub const ID_INDEX_NAME: &str = "_id_";

/// Identifiers assigned to an insert-many, in input order
#[derive(Debug, Clone, PartialEq)]
pub struct InsertManyOutcome {
    pub inserted_ids: Vec<Bson>,
}

impl InsertManyOutcome {
    pub fn inserted_count(&self) -> usize {
        self.inserted_ids.len()
    }
}

/// Counts reported by an update-many
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateOutcome {
    pub matched_count: u64,
    pub modified_count: u64,
}

/// Count reported by a delete-one; zero when nothing matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeleteOutcome {
    pub deleted_count: u64,
}

/// A database handle that has already been connected by someone else.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Name of the database commands are issued against
    fn database_name(&self) -> &str;

    /// Create an index and return its name.
    async fn create_index(&self, collection: &str, spec: &IndexSpec) -> Result<String>;

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<BsonDocument>,
    ) -> Result<InsertManyOutcome>;

    async fn update_many(
        &self,
        collection: &str,
        filter: BsonDocument,
        update: BsonDocument,
    ) -> Result<UpdateOutcome>;

    async fn delete_one(&self, collection: &str, filter: BsonDocument) -> Result<DeleteOutcome>;

    /// Names of every index on `collection`, including `_id_`
    async fn list_index_names(&self, collection: &str) -> Result<Vec<String>>;

    async fn drop_index(&self, collection: &str, name: &str) -> Result<()>;

    async fn list_collection_names(&self) -> Result<Vec<String>>;
}
