//! MongoDB driver for the document backend (synchronous client).

use log::info;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::FindOptions as MongoFindOptions;
use mongodb::sync::{Client, Database};
use serde_json::Value;

use crate::config::EngineConfig;
use crate::db::document::{DocumentDatasource, DocumentQuery, DocumentStore};
use crate::error::{EngineError, Result};
use crate::types::Record;

pub fn connect(uri: &str, database: &str, engine: &EngineConfig) -> Result<DocumentDatasource<MongoStore>> {
    let store = MongoStore::new(uri, database)?;
    Ok(DocumentDatasource::new(store, engine.clone()))
}

pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri)
            .map_err(|e| EngineError::connection(format!("Failed to connect to MongoDB: {e}")))?;
        info!("Connected to MongoDB database {}", database);
        Ok(Self {
            db: client.database(database),
        })
    }

    fn collection(&self, name: &str) -> mongodb::sync::Collection<Document> {
        self.db.collection::<Document>(name)
    }
}

/// Extended JSON to BSON; `{"$oid": ..}` and `{"$date": ..}` become native values.
fn to_bson_document(record: &Record) -> Result<Document> {
    match Bson::try_from(Value::Object(record.clone())) {
        Ok(Bson::Document(document)) => Ok(document),
        Ok(other) => Err(EngineError::execution(format!(
            "expected a document, got {other}"
        ))),
        Err(e) => Err(EngineError::execution(format!("invalid document: {e}"))),
    }
}

fn from_bson_document(document: Document) -> Record {
    match Bson::Document(document).into_relaxed_extjson() {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

fn sort_document(sort: &[(String, i32)]) -> Document {
    let mut document = Document::new();
    for (field, direction) in sort {
        document.insert(field.clone(), *direction);
    }
    document
}

impl DocumentStore for MongoStore {
    fn ping(&self) -> Result<()> {
        self.db
            .run_command(doc! { "ping": 1 }, None)
            .map(|_| ())
            .map_err(EngineError::connection)
    }

    fn list_collections(&self) -> Result<Vec<String>> {
        self.db
            .list_collection_names(None)
            .map_err(EngineError::execution)
    }

    fn find(&self, query: &DocumentQuery) -> Result<Vec<Record>> {
        let mut options = MongoFindOptions::default();
        if !query.sort.is_empty() {
            options.sort = Some(sort_document(&query.sort));
        }
        if !query.projection.is_empty() {
            let mut projection = Document::new();
            for field in &query.projection {
                projection.insert(field.clone(), 1);
            }
            options.projection = Some(projection);
        }
        if query.skip > 0 {
            options.skip = Some(query.skip);
        }
        if query.limit > 0 {
            options.limit = Some(i64::try_from(query.limit).unwrap_or(i64::MAX));
        }

        let filter = to_bson_document(&query.filter)?;
        let cursor = self
            .collection(&query.collection)
            .find(filter, options)
            .map_err(EngineError::execution)?;
        let mut records = Vec::new();
        for document in cursor {
            let document = document.map_err(EngineError::execution)?;
            records.push(from_bson_document(document));
        }
        Ok(records)
    }

    fn count(&self, collection: &str, filter: &Record) -> Result<u64> {
        let filter = to_bson_document(filter)?;
        self.collection(collection)
            .count_documents(filter, None)
            .map_err(EngineError::execution)
    }

    fn insert_one(&self, collection: &str, document: Record) -> Result<Value> {
        let document = to_bson_document(&document)?;
        let result = self
            .collection(collection)
            .insert_one(document, None)
            .map_err(EngineError::execution)?;
        Ok(result.inserted_id.into_relaxed_extjson())
    }

    fn update_one(&self, collection: &str, filter: &Record, set: Record) -> Result<u64> {
        let filter = to_bson_document(filter)?;
        let set = to_bson_document(&set)?;
        let result = self
            .collection(collection)
            .update_one(filter, doc! { "$set": set }, None)
            .map_err(EngineError::execution)?;
        Ok(result.matched_count)
    }

    fn delete_one(&self, collection: &str, filter: &Record) -> Result<u64> {
        let filter = to_bson_document(filter)?;
        let result = self
            .collection(collection)
            .delete_one(filter, None)
            .map_err(EngineError::execution)?;
        Ok(result.deleted_count)
    }

    fn delete_many(&self, collection: &str, filter: &Record) -> Result<u64> {
        let filter = to_bson_document(filter)?;
        let result = self
            .collection(collection)
            .delete_many(filter, None)
            .map_err(EngineError::execution)?;
        Ok(result.deleted_count)
    }

    fn create_collection(&self, name: &str) -> Result<()> {
        self.db
            .create_collection(name, None)
            .map_err(EngineError::execution)
    }
}
