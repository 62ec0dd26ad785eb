//! [`DocumentStore`] backed by the official MongoDB driver

use async_trait::async_trait;
use bson::{Bson, Document as BsonDocument};
use mongodb::{Collection, Database};

use crate::index::IndexSpec;
use crate::store::{DeleteOutcome, DocumentStore, InsertManyOutcome, UpdateOutcome};
use crate::Result;

/// Issues commands against one database of a connected client
#[derive(Clone, Debug)]
pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    fn collection(&self, name: &str) -> Collection<BsonDocument> {
        self.database.collection(name)
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn database_name(&self) -> &str {
        self.database.name()
    }

    async fn create_index(&self, collection: &str, spec: &IndexSpec) -> Result<String> {
        let result = self
            .collection(collection)
            .create_index(spec.to_index_model())
            .await?;
        Ok(result.index_name)
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<BsonDocument>,
    ) -> Result<InsertManyOutcome> {
        let result = self.collection(collection).insert_many(documents).await?;

        let mut ids: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
        ids.sort_by_key(|(position, _)| *position);

        Ok(InsertManyOutcome {
            inserted_ids: ids.into_iter().map(|(_, id)| id).collect(),
        })
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: BsonDocument,
        update: BsonDocument,
    ) -> Result<UpdateOutcome> {
        let result = self
            .collection(collection)
            .update_many(filter, update)
            .await?;
        Ok(UpdateOutcome {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
        })
    }

    async fn delete_one(&self, collection: &str, filter: BsonDocument) -> Result<DeleteOutcome> {
        let result = self.collection(collection).delete_one(filter).await?;
        Ok(DeleteOutcome {
            deleted_count: result.deleted_count,
        })
    }

    async fn list_index_names(&self, collection: &str) -> Result<Vec<String>> {
        let names = self.collection(collection).list_index_names().await?;
        Ok(names)
    }

    async fn drop_index(&self, collection: &str, name: &str) -> Result<()> {
        self.collection(collection).drop_index(name).await?;
        Ok(())
    }

    async fn list_collection_names(&self) -> Result<Vec<String>> {
        let names = self.database.list_collection_names().await?;
        Ok(names)
    }
}
