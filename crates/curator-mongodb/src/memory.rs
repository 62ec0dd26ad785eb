//! In-process [`DocumentStore`] for tests and dry runs
//!
//! Behaves like a single-node server for the commands the scripts issue:
//! it keeps documents per collection, assigns `_id`s, enforces unique
//! indexes (honoring partial filters and case-insensitive collation) and
//! records every call so tests can assert on exactly what was sent.
//! A failure can be queued for the next call of a given kind.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use bson::{oid::ObjectId, Bson, Document as BsonDocument};
use curator_common::CuratorError;
use parking_lot::Mutex;

use crate::filter::{apply_update, matches, values_equal};
use crate::index::IndexSpec;
use crate::store::{
    DeleteOutcome, DocumentStore, InsertManyOutcome, UpdateOutcome, ID_INDEX_NAME,
};
use crate::Result;

/// The store method a queued failure applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    CreateIndex,
    InsertMany,
    UpdateMany,
    DeleteOne,
    ListIndexNames,
    DropIndex,
    ListCollectionNames,
}

/// A call as the store received it
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    CreateIndex {
        collection: String,
        spec: IndexSpec,
    },
    InsertMany {
        collection: String,
        documents: Vec<BsonDocument>,
    },
    UpdateMany {
        collection: String,
        filter: BsonDocument,
        update: BsonDocument,
    },
    DeleteOne {
        collection: String,
        filter: BsonDocument,
    },
    ListIndexNames {
        collection: String,
    },
    DropIndex {
        collection: String,
        name: String,
    },
    ListCollectionNames,
}

impl RecordedCall {
    pub fn kind(&self) -> CallKind {
        match self {
            RecordedCall::CreateIndex { .. } => CallKind::CreateIndex,
            RecordedCall::InsertMany { .. } => CallKind::InsertMany,
            RecordedCall::UpdateMany { .. } => CallKind::UpdateMany,
            RecordedCall::DeleteOne { .. } => CallKind::DeleteOne,
            RecordedCall::ListIndexNames { .. } => CallKind::ListIndexNames,
            RecordedCall::DropIndex { .. } => CallKind::DropIndex,
            RecordedCall::ListCollectionNames => CallKind::ListCollectionNames,
        }
    }
}

#[derive(Debug, Default)]
struct CollectionState {
    documents: Vec<BsonDocument>,
    indexes: Vec<IndexSpec>,
}

#[derive(Debug, Default)]
struct State {
    collections: BTreeMap<String, CollectionState>,
    calls: Vec<RecordedCall>,
    queued_failures: HashMap<CallKind, CuratorError>,
}

impl State {
    /// Record the call and hand back a queued failure for its kind, if any
    fn begin(&mut self, call: RecordedCall) -> Result<()> {
        let kind = call.kind();
        self.calls.push(call);
        match self.queued_failures.remove(&kind) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Fake database holding everything in memory
#[derive(Debug)]
pub struct MemoryStore {
    database_name: String,
    state: Mutex<State>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("test")
    }
}

impl MemoryStore {
    pub fn new(database_name: impl Into<String>) -> Self {
        Self {
            database_name: database_name.into(),
            state: Mutex::new(State::default()),
        }
    }

    /// Put documents into a collection without recording a call.
    ///
    /// Documents without `_id` get a fresh ObjectId.
    pub fn seed(&self, collection: &str, documents: impl IntoIterator<Item = BsonDocument>) {
        let mut state = self.state.lock();
        let coll = state.collections.entry(collection.to_string()).or_default();
        coll.documents
            .extend(documents.into_iter().map(|mut doc| {
                ensure_id(&mut doc);
                doc
            }));
    }

    /// Make the next call of `kind` fail with `error`
    pub fn fail_next(&self, kind: CallKind, error: CuratorError) {
        self.state.lock().queued_failures.insert(kind, error);
    }

    /// Every call received so far, in arrival order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    pub fn calls_of(&self, kind: CallKind) -> Vec<RecordedCall> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn documents(&self, collection: &str) -> Vec<BsonDocument> {
        self.state
            .lock()
            .collections
            .get(collection)
            .map(|coll| coll.documents.clone())
            .unwrap_or_default()
    }

    /// The spec an index was created with, looked up by name
    pub fn index(&self, collection: &str, name: &str) -> Option<IndexSpec> {
        self.state
            .lock()
            .collections
            .get(collection)?
            .indexes
            .iter()
            .find(|spec| spec.resolved_name() == name)
            .cloned()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn database_name(&self) -> &str {
        &self.database_name
    }

    async fn create_index(&self, collection: &str, spec: &IndexSpec) -> Result<String> {
        let mut state = self.state.lock();
        state.begin(RecordedCall::CreateIndex {
            collection: collection.to_string(),
            spec: spec.clone(),
        })?;
        spec.validate()?;

        let name = spec.resolved_name();
        let coll = state.collections.entry(collection.to_string()).or_default();

        if let Some(existing) = coll.indexes.iter().find(|i| i.resolved_name() == name) {
            if existing == spec {
                return Ok(name);
            }
            return Err(CuratorError::MongoDB(format!(
                "An existing index has the same name as the requested index. \
                 Requested index: {}, existing index: {}",
                name, name
            )));
        }

        if let Some(existing) = coll.indexes.iter().find(|i| same_definition(i, spec)) {
            return Err(CuratorError::MongoDB(format!(
                "IndexOptionsConflict: Index already exists with a different name: {}",
                existing.resolved_name()
            )));
        }

        if spec.unique {
            if let Some(key) = first_duplicate(spec, &coll.documents) {
                return Err(duplicate_key_error(
                    &self.database_name,
                    collection,
                    &name,
                    &key,
                ));
            }
        }

        coll.indexes.push(spec.clone());
        Ok(name)
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<BsonDocument>,
    ) -> Result<InsertManyOutcome> {
        let mut state = self.state.lock();
        state.begin(RecordedCall::InsertMany {
            collection: collection.to_string(),
            documents: documents.clone(),
        })?;

        if documents.is_empty() {
            return Err(CuratorError::Validation(
                "insert_many requires at least one document".to_string(),
            ));
        }

        let coll = state.collections.entry(collection.to_string()).or_default();
        let mut inserted_ids = Vec::with_capacity(documents.len());

        // Ordered insert: stop at the first violation, keep what went in before it
        for mut doc in documents {
            let id = ensure_id(&mut doc);

            if coll
                .documents
                .iter()
                .any(|existing| existing.get("_id").is_some_and(|e| values_equal(e, &id)))
            {
                return Err(duplicate_key_error(
                    &self.database_name,
                    collection,
                    ID_INDEX_NAME,
                    &[id],
                ));
            }

            let mut candidate = coll.documents.clone();
            candidate.push(doc.clone());
            if let Some((name, key)) = violated_unique_index(&coll.indexes, &candidate) {
                return Err(duplicate_key_error(
                    &self.database_name,
                    collection,
                    &name,
                    &key,
                ));
            }

            coll.documents.push(doc);
            inserted_ids.push(id);
        }

        Ok(InsertManyOutcome { inserted_ids })
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: BsonDocument,
        update: BsonDocument,
    ) -> Result<UpdateOutcome> {
        let mut state = self.state.lock();
        state.begin(RecordedCall::UpdateMany {
            collection: collection.to_string(),
            filter: filter.clone(),
            update: update.clone(),
        })?;

        let Some(coll) = state.collections.get_mut(collection) else {
            return Ok(UpdateOutcome::default());
        };

        let mut updated = coll.documents.clone();
        let mut outcome = UpdateOutcome::default();
        for doc in updated.iter_mut().filter(|doc| matches(doc, &filter)) {
            outcome.matched_count += 1;
            if apply_update(doc, &update)? {
                outcome.modified_count += 1;
            }
        }

        if let Some((name, key)) = violated_unique_index(&coll.indexes, &updated) {
            return Err(duplicate_key_error(
                &self.database_name,
                collection,
                &name,
                &key,
            ));
        }

        coll.documents = updated;
        Ok(outcome)
    }

    async fn delete_one(&self, collection: &str, filter: BsonDocument) -> Result<DeleteOutcome> {
        let mut state = self.state.lock();
        state.begin(RecordedCall::DeleteOne {
            collection: collection.to_string(),
            filter: filter.clone(),
        })?;

        let Some(coll) = state.collections.get_mut(collection) else {
            return Ok(DeleteOutcome::default());
        };

        match coll.documents.iter().position(|doc| matches(doc, &filter)) {
            Some(position) => {
                coll.documents.remove(position);
                Ok(DeleteOutcome { deleted_count: 1 })
            }
            None => Ok(DeleteOutcome::default()),
        }
    }

    async fn list_index_names(&self, collection: &str) -> Result<Vec<String>> {
        let mut state = self.state.lock();
        state.begin(RecordedCall::ListIndexNames {
            collection: collection.to_string(),
        })?;

        Ok(match state.collections.get(collection) {
            Some(coll) => std::iter::once(ID_INDEX_NAME.to_string())
                .chain(coll.indexes.iter().map(IndexSpec::resolved_name))
                .collect(),
            None => Vec::new(),
        })
    }

    async fn drop_index(&self, collection: &str, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.begin(RecordedCall::DropIndex {
            collection: collection.to_string(),
            name: name.to_string(),
        })?;

        if name == ID_INDEX_NAME {
            return Err(CuratorError::MongoDB(
                "cannot drop _id index".to_string(),
            ));
        }

        let coll = state.collections.get_mut(collection).ok_or_else(|| {
            CuratorError::MongoDB(format!(
                "ns not found {}.{}",
                self.database_name, collection
            ))
        })?;

        let position = coll
            .indexes
            .iter()
            .position(|spec| spec.resolved_name() == name)
            .ok_or_else(|| {
                CuratorError::MongoDB(format!("index not found with name [{}]", name))
            })?;
        coll.indexes.remove(position);
        Ok(())
    }

    async fn list_collection_names(&self) -> Result<Vec<String>> {
        let mut state = self.state.lock();
        state.begin(RecordedCall::ListCollectionNames)?;
        Ok(state.collections.keys().cloned().collect())
    }
}

/// Returns the document's `_id`, generating an ObjectId placed first if absent
fn ensure_id(doc: &mut BsonDocument) -> Bson {
    if let Some(id) = doc.get("_id") {
        return id.clone();
    }
    let id = Bson::ObjectId(ObjectId::new());
    let mut with_id = BsonDocument::new();
    with_id.insert("_id", id.clone());
    for (key, value) in std::mem::take(doc) {
        with_id.insert(key, value);
    }
    *doc = with_id;
    id
}

/// Index key of `doc` under `spec`, normalized for the spec's collation.
/// Missing fields index as null.
fn index_key(spec: &IndexSpec, doc: &BsonDocument) -> Vec<Bson> {
    let fold_case = spec.collation.as_ref().is_some_and(|c| c.ignores_case());
    spec.fields()
        .into_iter()
        .map(|field| match crate::filter::get_path(doc, field) {
            Some(Bson::String(s)) if fold_case => Bson::String(s.to_lowercase()),
            Some(value) => value.clone(),
            None => Bson::Null,
        })
        .collect()
}

fn keys_equal(a: &[Bson], b: &[Bson]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
}

/// First key that two indexed documents share, if the unique spec is violated
fn first_duplicate(spec: &IndexSpec, documents: &[BsonDocument]) -> Option<Vec<Bson>> {
    let keys: Vec<Vec<Bson>> = documents
        .iter()
        .filter(|doc| {
            spec.partial_filter
                .as_ref()
                .map_or(true, |filter| matches(doc, filter))
        })
        .map(|doc| index_key(spec, doc))
        .collect();

    keys.iter().enumerate().find_map(|(i, key)| {
        keys[i + 1..]
            .iter()
            .any(|other| keys_equal(key, other))
            .then(|| key.clone())
    })
}

/// Same ordered keys and options, ignoring the name
fn same_definition(a: &IndexSpec, b: &IndexSpec) -> bool {
    a.keys.iter().eq(b.keys.iter())
        && a.unique == b.unique
        && a.collation == b.collation
        && a.partial_filter == b.partial_filter
}

fn violated_unique_index(
    indexes: &[IndexSpec],
    documents: &[BsonDocument],
) -> Option<(String, Vec<Bson>)> {
    indexes
        .iter()
        .filter(|spec| spec.unique)
        .find_map(|spec| first_duplicate(spec, documents).map(|key| (spec.resolved_name(), key)))
}

fn duplicate_key_error(
    database: &str,
    collection: &str,
    index: &str,
    key: &[Bson],
) -> CuratorError {
    let key = key
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    CuratorError::DuplicateKey(format!(
        "E11000 duplicate key error collection: {}.{} index: {} dup key: {{ {} }}",
        database, collection, index, key
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{exists_filter, CollationSpec};
    use bson::doc;

    fn email_index() -> IndexSpec {
        IndexSpec::new(doc! { "email": 1 })
            .unique(true)
            .collation(CollationSpec::case_insensitive_en())
            .partial_filter(exists_filter("email"))
    }

    #[tokio::test]
    async fn test_insert_assigns_object_ids() {
        let store = MemoryStore::default();
        let outcome = store
            .insert_many("users", vec![doc! { "name": "Renan" }])
            .await
            .unwrap();

        assert_eq!(outcome.inserted_count(), 1);
        assert!(matches!(outcome.inserted_ids[0], Bson::ObjectId(_)));
        let stored = store.documents("users");
        assert_eq!(stored[0].keys().next().map(String::as_str), Some("_id"));
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_id() {
        let store = MemoryStore::default();
        store.seed("users", [doc! { "_id": "u1" }]);

        let err = store
            .insert_many("users", vec![doc! { "_id": "u2" }, doc! { "_id": "u1" }])
            .await
            .unwrap_err();

        assert!(err.is_duplicate_key());
        // Ordered: the first document made it in
        assert_eq!(store.documents("users").len(), 2);
    }

    #[tokio::test]
    async fn test_unique_index_is_case_insensitive_under_strength_two() {
        let store = MemoryStore::default();
        store.seed(
            "users",
            [doc! { "email": "Renan@Example.com" }, doc! { "email": "renan@example.com" }],
        );

        let err = store.create_index("users", &email_index()).await.unwrap_err();
        assert!(err.is_duplicate_key());
        assert!(err.to_string().contains("E11000"));
        assert!(store.index("users", "email_1").is_none());
    }

    #[tokio::test]
    async fn test_unique_index_ignores_documents_outside_partial_filter() {
        let store = MemoryStore::default();
        store.seed("users", [doc! { "name": "Renan" }, doc! { "name": "Bruna" }]);

        let name = store.create_index("users", &email_index()).await.unwrap();
        assert_eq!(name, "email_1");

        // Neither document has an email, so a third without one is fine too
        store
            .insert_many("users", vec![doc! { "name": "Third" }])
            .await
            .unwrap();

        let err = store
            .insert_many(
                "users",
                vec![doc! { "email": "a@b.c" }, doc! { "email": "A@B.C" }],
            )
            .await
            .unwrap_err();
        assert!(err.is_duplicate_key());
    }

    #[tokio::test]
    async fn test_create_same_index_twice_is_a_no_op() {
        let store = MemoryStore::default();
        store.create_index("users", &email_index()).await.unwrap();
        store.create_index("users", &email_index()).await.unwrap();
        assert_eq!(
            store.list_index_names("users").await.unwrap(),
            vec!["_id_".to_string(), "email_1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_same_definition_under_another_name_rejected() {
        let store = MemoryStore::default();
        let keys = doc! { "userId": 1, "titleId": 1 };
        store
            .create_index("comments", &IndexSpec::new(keys.clone()).unique(true))
            .await
            .unwrap();

        let renamed = IndexSpec::new(keys)
            .unique(true)
            .name("userId_and_titleId_unique");
        let err = store.create_index("comments", &renamed).await.unwrap_err();
        assert!(err.to_string().contains("IndexOptionsConflict"));
        assert!(store.index("comments", "userId_and_titleId_unique").is_none());

        // Reversed key order is a different index
        store
            .create_index("comments", &IndexSpec::new(doc! { "titleId": 1, "userId": 1 }))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_conflicting_index_options_rejected() {
        let store = MemoryStore::default();
        store.create_index("users", &email_index()).await.unwrap();
        let plain = IndexSpec::new(doc! { "email": 1 });
        assert!(store.create_index("users", &plain).await.is_err());
    }

    #[tokio::test]
    async fn test_queued_failure_fires_once() {
        let store = MemoryStore::default();
        store.fail_next(
            CallKind::DeleteOne,
            CuratorError::Connection("socket closed".to_string()),
        );

        assert!(store.delete_one("titles", doc! {}).await.is_err());
        assert!(store.delete_one("titles", doc! {}).await.is_ok());
        assert_eq!(store.calls_of(CallKind::DeleteOne).len(), 2);
    }

    #[tokio::test]
    async fn test_drop_index() {
        let store = MemoryStore::default();
        store.create_index("users", &email_index()).await.unwrap();

        assert!(store.drop_index("users", "_id_").await.is_err());
        assert!(store.drop_index("users", "nope").await.is_err());
        store.drop_index("users", "email_1").await.unwrap();
        assert_eq!(store.list_index_names("users").await.unwrap(), vec!["_id_"]);
    }

    #[tokio::test]
    async fn test_update_on_missing_collection_matches_nothing() {
        let store = MemoryStore::default();
        let outcome = store
            .update_many("titles", doc! {}, doc! { "$set": { "watched": false } })
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::default());
    }
}
