use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use super::{
    matches_filters, resolve_server_timestamps, set_field_path, DeltaKind, Document, DocumentDelta,
    DocumentStore, Filter, StoreError, CHANGE_FEED_CAPACITY,
};

/// Document store backed by process memory. Used in tests and anywhere the
/// engine runs without a database.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Value>>>,
    channels: Mutex<HashMap<String, broadcast::Sender<DocumentDelta>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, collection: &str) -> broadcast::Sender<DocumentDelta> {
        let mut channels = match self.channels.lock() {
            Ok(channels) => channels,
            Err(poisoned) => poisoned.into_inner(),
        };
        channels
            .entry(collection.to_string())
            .or_insert_with(|| broadcast::channel(CHANGE_FEED_CAPACITY).0)
            .clone()
    }

    fn emit(&self, kind: DeltaKind, collection: &str, document: Document) {
        // Send failures just mean nobody is watching.
        let _ = self.sender(collection).send(DocumentDelta {
            kind,
            collection: collection.to_string(),
            document,
        });
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|documents| documents.get(id))
            .map(|data| Document { id: id.to_string(), data: data.clone() }))
    }

    async fn add(&self, collection: &str, mut data: Value) -> Result<Document, StoreError> {
        resolve_server_timestamps(&mut data, Utc::now());
        let id = Uuid::new_v4().to_string();

        let mut collections = self.collections.write().await;
        collections.entry(collection.to_string()).or_default().insert(id.clone(), data.clone());
        drop(collections);

        let document = Document { id, data };
        self.emit(DeltaKind::Added, collection, document.clone());
        Ok(document)
    }

    async fn set(&self, collection: &str, id: &str, mut data: Value) -> Result<(), StoreError> {
        resolve_server_timestamps(&mut data, Utc::now());

        let mut collections = self.collections.write().await;
        let documents = collections.entry(collection.to_string()).or_default();
        let existed = documents.insert(id.to_string(), data.clone()).is_some();
        drop(collections);

        let kind = if existed { DeltaKind::Modified } else { DeltaKind::Added };
        self.emit(kind, collection, Document { id: id.to_string(), data });
        Ok(())
    }

    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        fields: &[(String, Value)],
    ) -> Result<(), StoreError> {
        let now = Utc::now();

        let mut collections = self.collections.write().await;
        let data = collections
            .get_mut(collection)
            .and_then(|documents| documents.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        for (path, value) in fields {
            let mut value = value.clone();
            resolve_server_timestamps(&mut value, now);
            set_field_path(data, path, value);
        }
        let snapshot = data.clone();
        drop(collections);

        self.emit(DeltaKind::Modified, collection, Document { id: id.to_string(), data: snapshot });
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|(_, data)| matches_filters(data, filters))
                    .map(|(id, data)| Document { id: id.clone(), data: data.clone() })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let removed = collections.get_mut(collection).and_then(|documents| documents.remove(id));
        drop(collections);

        let data = removed.ok_or_else(|| StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        })?;
        self.emit(DeltaKind::Removed, collection, Document { id: id.to_string(), data });
        Ok(())
    }

    fn watch(&self, collection: &str) -> broadcast::Receiver<DocumentDelta> {
        self.sender(collection).subscribe()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::InMemoryDocumentStore;
    use crate::store::{DeltaKind, DocumentStore, Filter, SERVER_TIMESTAMP};

    #[tokio::test]
    async fn add_get_round_trip_with_server_assigned_id() {
        let store = InMemoryDocumentStore::new();
        let document =
            store.add("quotes", json!({"status": "draft"})).await.expect("add document");

        let found = store.get("quotes", &document.id).await.expect("get document");
        assert_eq!(found, Some(document));
    }

    #[tokio::test]
    async fn update_fields_patches_dot_paths_and_requires_existence() {
        let store = InMemoryDocumentStore::new();
        let claim = store
            .add("claims", json!({"status": "submitted"}))
            .await
            .expect("add claim");

        store
            .update_fields(
                "claims",
                &claim.id,
                &[
                    ("status".to_string(), json!("acknowledged")),
                    ("workflow.acknowledgment.status".to_string(), json!("completed")),
                    ("updatedAt".to_string(), json!(SERVER_TIMESTAMP)),
                ],
            )
            .await
            .expect("patch claim");

        let found = store.get("claims", &claim.id).await.expect("get claim").expect("claim exists");
        assert_eq!(found.data["status"], "acknowledged");
        assert_eq!(found.data["workflow"]["acknowledgment"]["status"], "completed");
        assert_ne!(found.data["updatedAt"], SERVER_TIMESTAMP);

        let missing = store
            .update_fields("claims", "nope", &[("status".to_string(), json!("x"))])
            .await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn query_applies_equality_and_inequality_filters() {
        let store = InMemoryDocumentStore::new();
        store
            .add("policies", json!({"status": "active", "paymentStatus": "late"}))
            .await
            .expect("add policy");
        store
            .add("policies", json!({"status": "active", "paymentStatus": "current"}))
            .await
            .expect("add policy");
        store
            .add("policies", json!({"status": "expired", "paymentStatus": "late"}))
            .await
            .expect("add policy");

        let matches = store
            .query(
                "policies",
                &[
                    Filter::eq("status", json!("active")),
                    Filter::ne("paymentStatus", json!("current")),
                ],
            )
            .await
            .expect("query policies");

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].data["paymentStatus"], "late");
    }

    #[tokio::test]
    async fn watch_receives_added_modified_and_removed_deltas() {
        let store = InMemoryDocumentStore::new();
        let mut feed = store.watch("quotes");

        let quote = store.add("quotes", json!({"status": "draft"})).await.expect("add");
        store.set("quotes", &quote.id, json!({"status": "quoted"})).await.expect("set");
        store.delete("quotes", &quote.id).await.expect("delete");

        let added = feed.recv().await.expect("added delta");
        assert_eq!(added.kind, DeltaKind::Added);
        let modified = feed.recv().await.expect("modified delta");
        assert_eq!(modified.kind, DeltaKind::Modified);
        assert_eq!(modified.document.data["status"], "quoted");
        let removed = feed.recv().await.expect("removed delta");
        assert_eq!(removed.kind, DeltaKind::Removed);
    }
}
