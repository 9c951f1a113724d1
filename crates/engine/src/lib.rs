//! Workflow automation engine.
//!
//! Events about insurance entities (quotes, policies, claims, customers)
//! flow through one pipeline: persist, match against enabled automation
//! rules, execute the matching rules' actions, record per-rule results back
//! onto the event.
//!
//! # Architecture
//!
//! 1. **Producers** - `watchers` (live document change feeds) and `sweeps`
//!    (periodic scans) synthesize `WorkflowEventInput`s
//! 2. **Queue handoff** (`queue`) - producers submit without blocking; a
//!    worker spawns one detached task per event
//! 3. **Orchestration** (`orchestrator`) - rule matching and result
//!    recording
//! 4. **Actions** (`actions`) - the side-effect handlers behind each rule
//!
//! The `AutomationService` façade composes all of it and is constructed
//! once per process; there is no global state.
//!
//! # Failure principle
//!
//! Nothing in the pipeline propagates errors to producers. Each step
//! catches, logs, and moves on; a failed action only fails its own rule's
//! result, and there are no automatic retries.

pub mod actions;
pub mod orchestrator;
pub mod queue;
pub mod service;
pub mod sweeps;
pub mod watchers;

pub use actions::ActionExecutor;
pub use orchestrator::AutomationOrchestrator;
pub use queue::{spawn_ingest_worker, IngestHandle};
pub use service::{AutomationService, ServiceError};
pub use sweeps::PeriodicSweepScheduler;
pub use watchers::ChangeSubscriptionManager;
