use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{
    resolve_server_timestamps, set_field_path, DeltaKind, Document, DocumentDelta, DocumentStore,
    Filter, FilterOp, StoreError, CHANGE_FEED_CAPACITY,
};
use crate::DbPool;

/// SQLite-backed document store. Filters compile to JSON1 `json_extract`
/// predicates; the change feed covers writes made through this process.
pub struct SqlDocumentStore {
    pool: DbPool,
    channels: Mutex<HashMap<String, broadcast::Sender<DocumentDelta>>>,
}

impl SqlDocumentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool, channels: Mutex::new(HashMap::new()) }
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
        let _ = self.sender(collection).send(DocumentDelta {
            kind,
            collection: collection.to_string(),
            document,
        });
    }

    async fn fetch_data(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Value>, StoreError> {
        let row = sqlx::query("SELECT data FROM document WHERE collection_name = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| decode_data(&row)).transpose()
    }
}

#[async_trait]
impl DocumentStore for SqlDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .fetch_data(collection, id)
            .await?
            .map(|data| Document { id: id.to_string(), data }))
    }

    async fn add(&self, collection: &str, mut data: Value) -> Result<Document, StoreError> {
        let now = Utc::now();
        resolve_server_timestamps(&mut data, now);
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO document (collection_name, id, data, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(collection)
        .bind(&id)
        .bind(data.to_string())
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        let document = Document { id, data };
        self.emit(DeltaKind::Added, collection, document.clone());
        Ok(document)
    }

    async fn set(&self, collection: &str, id: &str, mut data: Value) -> Result<(), StoreError> {
        let now = Utc::now();
        resolve_server_timestamps(&mut data, now);
        let existed = self.fetch_data(collection, id).await?.is_some();

        sqlx::query(
            "INSERT INTO document (collection_name, id, data, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(collection_name, id) DO UPDATE SET
                data = excluded.data,
                updated_at = excluded.updated_at",
        )
        .bind(collection)
        .bind(id)
        .bind(data.to_string())
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

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
        let mut data =
            self.fetch_data(collection, id).await?.ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        for (path, value) in fields {
            let mut value = value.clone();
            resolve_server_timestamps(&mut value, now);
            set_field_path(&mut data, path, value);
        }

        sqlx::query(
            "UPDATE document SET data = ?, updated_at = ? WHERE collection_name = ? AND id = ?",
        )
        .bind(data.to_string())
        .bind(now.to_rfc3339())
        .bind(collection)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.emit(DeltaKind::Modified, collection, Document { id: id.to_string(), data });
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> Result<Vec<Document>, StoreError> {
        let mut sql = String::from("SELECT id, data FROM document WHERE collection_name = ?");
        for filter in filters {
            let path = json_path(&filter.field)?;
            match filter.op {
                FilterOp::Eq => {
                    sql.push_str(&format!(" AND json_extract(data, '{path}') = ?"));
                }
                FilterOp::Ne => {
                    sql.push_str(&format!(
                        " AND json_extract(data, '{path}') IS NOT NULL \
                         AND json_extract(data, '{path}') <> ?"
                    ));
                }
            }
        }
        sql.push_str(" ORDER BY id ASC");

        let mut query = sqlx::query(&sql).bind(collection);
        for filter in filters {
            query = bind_filter_value(query, &filter.value)?;
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| {
                let data = decode_data(&row)?;
                Ok(Document { id: row.try_get("id")?, data })
            })
            .collect()
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let data =
            self.fetch_data(collection, id).await?.ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        sqlx::query("DELETE FROM document WHERE collection_name = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.emit(DeltaKind::Removed, collection, Document { id: id.to_string(), data });
        Ok(())
    }

    fn watch(&self, collection: &str) -> broadcast::Receiver<DocumentDelta> {
        self.sender(collection).subscribe()
    }
}

fn decode_data(row: &SqliteRow) -> Result<Value, StoreError> {
    let raw: String = row.try_get("data")?;
    serde_json::from_str(&raw)
        .map_err(|error| StoreError::Decode(format!("invalid document payload: {error}")))
}

/// Field paths come from rule definitions and engine code; restrict them to
/// identifier characters so they can be inlined into a JSON1 path.
fn json_path(field: &str) -> Result<String, StoreError> {
    if field.is_empty()
        || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return Err(StoreError::InvalidField(field.to_string()));
    }
    Ok(format!("$.{field}"))
}

type SqliteQuery<'q> =
    sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

fn bind_filter_value<'q>(
    query: SqliteQuery<'q>,
    value: &Value,
) -> Result<SqliteQuery<'q>, StoreError> {
    match value {
        Value::String(raw) => Ok(query.bind(raw.clone())),
        Value::Bool(flag) => Ok(query.bind(i64::from(*flag))),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                Ok(query.bind(int))
            } else if let Some(float) = number.as_f64() {
                Ok(query.bind(float))
            } else {
                Err(StoreError::Decode(format!("unsupported filter number: {number}")))
            }
        }
        other => Err(StoreError::Decode(format!("unsupported filter value: {other}"))),
    }
}
