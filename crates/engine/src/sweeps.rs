//! Periodic sweeps over current store state.
//!
//! Unlike the live watchers, sweeps manufacture events from what the store
//! holds right now: policies nearing expiration, policies with overdue
//! payments, and claims sitting in `submitted` past the acknowledgment
//! window. Every match routes through the same ingest queue as live
//! changes.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use brokerflow_core::chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{info, warn};

use brokerflow_core::conditions::{field_value, parse_date};
use brokerflow_core::config::SweepConfig;
use brokerflow_core::domain::event::{EntityType, WorkflowEventInput};
use brokerflow_db::{Document, DocumentStore, Filter, StoreError, SERVER_TIMESTAMP};

use crate::queue::IngestHandle;

/// Owns the three sweep timers. A sweep that fails logs and waits for its
/// next tick; the timer is never cancelled by failure.
pub struct PeriodicSweepScheduler {
    store: Arc<dyn DocumentStore>,
    ingest: IngestHandle,
    config: SweepConfig,
    tasks: Vec<JoinHandle<()>>,
}

impl PeriodicSweepScheduler {
    pub fn new(store: Arc<dyn DocumentStore>, ingest: IngestHandle, config: SweepConfig) -> Self {
        Self { store, ingest, config, tasks: Vec::new() }
    }

    /// Start all three timers. Calling twice is a no-op. The first run of
    /// each sweep happens one full period after start.
    pub fn start(&mut self) {
        if !self.tasks.is_empty() {
            return;
        }

        self.tasks.push(spawn_sweep(
            "expiring_policies",
            self.config.expiring_policies_interval_secs,
            self.store.clone(),
            self.ingest.clone(),
            {
                let lookahead = self.config.policy_expiry_lookahead_days;
                move |store, ingest| sweep_expiring_policies(store, ingest, lookahead)
            },
        ));
        self.tasks.push(spawn_sweep(
            "overdue_payments",
            self.config.overdue_payments_interval_secs,
            self.store.clone(),
            self.ingest.clone(),
            sweep_overdue_payments,
        ));
        self.tasks.push(spawn_sweep(
            "stale_claims",
            self.config.stale_claims_interval_secs,
            self.store.clone(),
            self.ingest.clone(),
            {
                let age_hours = self.config.stale_claim_age_hours;
                move |store, ingest| sweep_stale_claims(store, ingest, age_hours)
            },
        ));

        info!("periodic sweep timers started");
    }

    /// Cancel all timers. Idempotent and safe before `start()`.
    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for PeriodicSweepScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_sweep<F, Fut>(
    name: &'static str,
    interval_secs: u64,
    store: Arc<dyn DocumentStore>,
    ingest: IngestHandle,
    sweep: F,
) -> JoinHandle<()>
where
    F: Fn(Arc<dyn DocumentStore>, IngestHandle) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<(), StoreError>> + Send,
{
    let period = StdDuration::from_secs(interval_secs.max(1));
    let mut timer = interval_at(Instant::now() + period, period);

    tokio::spawn(async move {
        loop {
            timer.tick().await;
            if let Err(error) = sweep(store.clone(), ingest.clone()).await {
                warn!(sweep = name, error = %error, "sweep failed, will retry next tick");
            }
        }
    })
}

/// Active policies expiring within the lookahead window (exclusive of
/// already-passed expirations) each produce one `policy_expiring` event.
pub async fn sweep_expiring_policies(
    store: Arc<dyn DocumentStore>,
    ingest: IngestHandle,
    lookahead_days: i64,
) -> Result<(), StoreError> {
    let now = Utc::now();
    let horizon = now + Duration::days(lookahead_days);

    let policies = store.query("policies", &[Filter::eq("status", json!("active"))]).await?;
    for policy in policies {
        let Some(expiration) =
            field_value(&policy.data, "dates.expiration").and_then(parse_date)
        else {
            continue;
        };
        if expiration > now && expiration <= horizon {
            ingest.submit(sweep_event("policy_expiring", EntityType::Policy, policy, now));
        }
    }
    Ok(())
}

/// Active policies whose payment status is not current and whose next due
/// date has passed each produce one `payment_overdue` event.
pub async fn sweep_overdue_payments(
    store: Arc<dyn DocumentStore>,
    ingest: IngestHandle,
) -> Result<(), StoreError> {
    let now = Utc::now();

    let policies = store
        .query(
            "policies",
            &[
                Filter::eq("status", json!("active")),
                Filter::ne("paymentStatus", json!("current")),
            ],
        )
        .await?;
    for policy in policies {
        let Some(due) = field_value(&policy.data, "payment.nextDueDate").and_then(parse_date)
        else {
            continue;
        };
        if due < now {
            ingest.submit(sweep_event("payment_overdue", EntityType::Policy, policy, now));
        }
    }
    Ok(())
}

/// Claims stuck in `submitted` past the acknowledgment window are
/// auto-acknowledged (workflow fields stamped) and then emitted as
/// `claim_acknowledged` events.
pub async fn sweep_stale_claims(
    store: Arc<dyn DocumentStore>,
    ingest: IngestHandle,
    stale_age_hours: i64,
) -> Result<(), StoreError> {
    let now = Utc::now();
    let cutoff = now - Duration::hours(stale_age_hours);

    let claims = store.query("claims", &[Filter::eq("status", json!("submitted"))]).await?;
    for claim in claims {
        let Some(submitted_at) = field_value(&claim.data, "submittedAt").and_then(parse_date)
        else {
            continue;
        };
        if submitted_at >= cutoff {
            continue;
        }

        store
            .update_fields(
                "claims",
                &claim.id,
                &[
                    ("status".to_string(), json!("acknowledged")),
                    ("workflow.acknowledgment.date".to_string(), json!(SERVER_TIMESTAMP)),
                    ("workflow.acknowledgment.status".to_string(), json!("completed")),
                    ("workflow.investigation.status".to_string(), json!("in_progress")),
                    ("updatedAt".to_string(), json!(SERVER_TIMESTAMP)),
                ],
            )
            .await?;
        info!(claim_id = %claim.id, "auto-acknowledged stale claim");

        ingest.submit(sweep_event("claim_acknowledged", EntityType::Claim, claim, now));
    }
    Ok(())
}

fn sweep_event(
    event_type: &str,
    entity_type: EntityType,
    document: Document,
    now: DateTime<Utc>,
) -> WorkflowEventInput {
    let mut data = document.data;
    if let Some(map) = data.as_object_mut() {
        map.insert("id".to_string(), Value::String(document.id.clone()));
    }

    WorkflowEventInput {
        event_type: event_type.to_string(),
        entity_id: document.id,
        entity_type,
        data,
        occurred_at: now,
    }
}
