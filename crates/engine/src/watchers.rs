//! Live change subscriptions over the watched entity collections.

use std::sync::Arc;

use brokerflow_core::chrono::Utc;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use brokerflow_core::domain::event::{EntityType, WorkflowEventInput};
use brokerflow_db::{DeltaKind, DocumentDelta, DocumentStore};

use crate::queue::IngestHandle;

const WATCHED_COLLECTIONS: &[(&str, EntityType)] = &[
    ("quotes", EntityType::Quote),
    ("claims", EntityType::Claim),
    ("policies", EntityType::Policy),
    ("users", EntityType::Customer),
];

/// Owns one watch task per collection. Added/modified deltas become
/// `<entity>_updated` events; removed deltas are ignored (no deletion
/// trigger exists in the rule vocabulary).
pub struct ChangeSubscriptionManager {
    store: Arc<dyn DocumentStore>,
    ingest: IngestHandle,
    tasks: Vec<JoinHandle<()>>,
}

impl ChangeSubscriptionManager {
    pub fn new(store: Arc<dyn DocumentStore>, ingest: IngestHandle) -> Self {
        Self { store, ingest, tasks: Vec::new() }
    }

    /// Open every subscription. Calling twice is a no-op.
    pub fn start(&mut self) {
        if !self.tasks.is_empty() {
            return;
        }

        for (collection, entity_type) in WATCHED_COLLECTIONS {
            let mut feed = self.store.watch(collection);
            let ingest = self.ingest.clone();
            let entity_type = *entity_type;
            let collection = *collection;

            self.tasks.push(tokio::spawn(async move {
                loop {
                    match feed.recv().await {
                        Ok(delta) => handle_delta(delta, entity_type, &ingest),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(collection, skipped, "change feed lagged, deltas dropped");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }));
        }
        info!(collections = WATCHED_COLLECTIONS.len(), "change subscriptions started");
    }

    /// Cancel every subscription. Idempotent and safe before `start()`.
    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for ChangeSubscriptionManager {
    fn drop(&mut self) {
        self.stop();
    }
}

fn handle_delta(delta: DocumentDelta, entity_type: EntityType, ingest: &IngestHandle) {
    match delta.kind {
        DeltaKind::Added | DeltaKind::Modified => {}
        DeltaKind::Removed => return,
    }

    // The users collection mixes roles; only customers feed automation.
    if entity_type == EntityType::Customer
        && delta.document.data.get("role").and_then(Value::as_str) != Some("customer")
    {
        return;
    }

    let mut data = delta.document.data;
    if let Some(map) = data.as_object_mut() {
        map.insert("id".to_string(), Value::String(delta.document.id.clone()));
    }

    ingest.submit(WorkflowEventInput {
        event_type: format!("{}_updated", entity_type.as_str()),
        entity_id: delta.document.id,
        entity_type,
        data,
        occurred_at: Utc::now(),
    });
}
