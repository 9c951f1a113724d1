//! Producer-to-orchestrator handoff.
//!
//! Producers never await the pipeline: `submit` enqueues and returns, and
//! the worker spawns a detached task per event, so events process
//! concurrently and a slow rule never blocks a subscription callback.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use brokerflow_core::domain::event::WorkflowEventInput;

use crate::orchestrator::AutomationOrchestrator;

#[derive(Clone)]
pub struct IngestHandle {
    tx: mpsc::UnboundedSender<WorkflowEventInput>,
}

impl IngestHandle {
    pub fn submit(&self, event: WorkflowEventInput) {
        if self.tx.send(event).is_err() {
            warn!("ingest worker is gone, dropping event");
        }
    }
}

pub fn spawn_ingest_worker(
    orchestrator: Arc<AutomationOrchestrator>,
) -> (IngestHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<WorkflowEventInput>();

    let worker = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                orchestrator.ingest(event).await;
            });
        }
    });

    (IngestHandle { tx }, worker)
}
