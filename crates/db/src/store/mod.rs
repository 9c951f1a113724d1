//! Document-store contract consumed by the automation engine.
//!
//! Collections are schemaless JSON documents. Writes resolve a
//! server-timestamp sentinel, `update_fields` patches dot-paths without
//! replacing the document, and `watch` exposes a per-collection change feed
//! of added/modified/removed deltas.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::broadcast;

pub use memory::InMemoryDocumentStore;
pub use sqlite::SqlDocumentStore;

use brokerflow_core::conditions::field_value;

/// Sentinel resolved to the store's wall clock at write time.
pub const SERVER_TIMESTAMP: &str = "__server_timestamp__";

/// Change-feed buffer per collection; slow receivers lag rather than block
/// writers.
pub(crate) const CHANGE_FEED_CAPACITY: usize = 256;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaKind {
    Added,
    Modified,
    Removed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DocumentDelta {
    pub kind: DeltaKind,
    pub collection: String,
    pub document: Document,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self { field: field.into(), op: FilterOp::Eq, value }
    }

    pub fn ne(field: impl Into<String>, value: Value) -> Self {
        Self { field: field.into(), op: FilterOp::Ne, value }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("invalid field path `{0}`")]
    InvalidField(String),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Insert with a server-assigned id; returns the stored document.
    async fn add(&self, collection: &str, data: Value) -> Result<Document, StoreError>;

    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<(), StoreError>;

    /// Patch individual dot-path fields, creating intermediate objects as
    /// needed. The document must already exist.
    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        fields: &[(String, Value)],
    ) -> Result<(), StoreError>;

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> Result<Vec<Document>, StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Subscribe to this collection's change feed. Only deltas broadcast
    /// after subscription are received.
    fn watch(&self, collection: &str) -> broadcast::Receiver<DocumentDelta>;
}

/// Set a dot-path field, converting non-object intermediates into objects.
pub fn set_field_path(data: &mut Value, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            ensure_object(data);
            if let Some(map) = data.as_object_mut() {
                map.insert(path.to_string(), value);
            }
        }
        Some((head, rest)) => {
            ensure_object(data);
            if let Some(map) = data.as_object_mut() {
                let child = map.entry(head.to_string()).or_insert(Value::Null);
                set_field_path(child, rest, value);
            }
        }
    }
}

fn ensure_object(data: &mut Value) {
    if !data.is_object() {
        *data = Value::Object(Map::new());
    }
}

/// Replace every server-timestamp sentinel in the value tree with `now`.
pub fn resolve_server_timestamps(value: &mut Value, now: DateTime<Utc>) {
    match value {
        Value::String(raw) if raw == SERVER_TIMESTAMP => {
            *value = Value::String(now.to_rfc3339());
        }
        Value::Object(map) => {
            for child in map.values_mut() {
                resolve_server_timestamps(child, now);
            }
        }
        Value::Array(items) => {
            for child in items.iter_mut() {
                resolve_server_timestamps(child, now);
            }
        }
        _ => {}
    }
}

/// In-process filter evaluation. `Ne` requires the field to be present,
/// matching the managed store's inequality semantics.
pub(crate) fn matches_filters(data: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| {
        let field = field_value(data, &filter.field);
        match filter.op {
            FilterOp::Eq => field == Some(&filter.value),
            FilterOp::Ne => field.is_some_and(|value| value != &filter.value),
        }
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::{
        matches_filters, resolve_server_timestamps, set_field_path, Filter, SERVER_TIMESTAMP,
    };

    #[test]
    fn set_field_path_creates_intermediate_objects() {
        let mut data = json!({"status": "submitted"});
        set_field_path(&mut data, "workflow.acknowledgment.status", json!("completed"));
        set_field_path(&mut data, "status", json!("acknowledged"));

        assert_eq!(data["workflow"]["acknowledgment"]["status"], "completed");
        assert_eq!(data["status"], "acknowledged");
    }

    #[test]
    fn set_field_path_overwrites_non_object_intermediates() {
        let mut data = json!({"workflow": "none"});
        set_field_path(&mut data, "workflow.investigation.status", json!("in_progress"));
        assert_eq!(data["workflow"]["investigation"]["status"], "in_progress");
    }

    #[test]
    fn server_timestamps_resolve_recursively() {
        let now = Utc::now();
        let mut data = json!({
            "updatedAt": SERVER_TIMESTAMP,
            "workflow": {"acknowledgment": {"date": SERVER_TIMESTAMP}},
            "tags": [SERVER_TIMESTAMP],
            "status": "acknowledged"
        });

        resolve_server_timestamps(&mut data, now);

        let expected = now.to_rfc3339();
        assert_eq!(data["updatedAt"], json!(expected));
        assert_eq!(data["workflow"]["acknowledgment"]["date"], json!(expected));
        assert_eq!(data["tags"][0], json!(expected));
        assert_eq!(data["status"], "acknowledged");
    }

    #[test]
    fn inequality_filters_require_the_field_to_exist() {
        let with_field = json!({"status": "active", "paymentStatus": "late"});
        let without_field = json!({"status": "active"});
        let filters =
            [Filter::eq("status", json!("active")), Filter::ne("paymentStatus", json!("current"))];

        assert!(matches_filters(&with_field, &filters));
        assert!(!matches_filters(&without_field, &filters));
    }
}
