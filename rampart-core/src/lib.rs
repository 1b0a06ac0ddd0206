//! # Rampart Core
//!
//! Engine of the Rampart assessment pipeline: durable job records, queue
//! brokers, assessment capabilities, risk scoring, and the worker runtime
//! that ties them together.
//!
//! ## Overview
//!
//! `rampart-core` implements the full submit-to-verdict path:
//!
//! - **Dispatch**: validate a target, persist a `queued` job, publish its
//!   ID to the queue
//! - **Brokers**: an in-process queue for single-node deployments and a
//!   Redis-backed one for shared deployments, both with at-least-once
//!   delivery and stale-delivery recovery
//! - **Workers**: claim jobs through a conditional state transition, run
//!   the kind's capability under a hard timeout, and write exactly one
//!   terminal state
//! - **Scoring**: weighted multi-term risk scores, categories, and
//!   treatment recommendations folded into a per-job report
//! - **Housekeeping**: sweeps for unacknowledged deliveries and for jobs
//!   orphaned by dead workers
//!
//! ## Architecture
//!
//! - [`target`]: submission-time target validation
//! - [`store`]: the durable job ledger (SQLite)
//! - [`broker`]: queue transport implementations
//! - [`capability`]: pluggable assessment providers
//! - [`scoring`]: the risk model
//! - [`dispatcher`]: intake path
//! - [`controller`] / [`runtime`]: consumer control and the worker pool
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use rampart_core::broker::memory::InProcessBroker;
//! use rampart_core::dispatcher::JobDispatcher;
//! use rampart_core::store::sqlite::SqliteJobStore;
//! use rampart_model::JobKind;
//!
//! async fn submit_one() -> rampart_core::error::Result<()> {
//!     let store = Arc::new(SqliteJobStore::connect("sqlite:rampart.db").await?);
//!     let broker = Arc::new(InProcessBroker::new());
//!     let dispatcher = JobDispatcher::new(store, broker);
//!     let record = dispatcher
//!         .dispatch("203.0.113.9", JobKind::NetworkScan)
//!         .await?;
//!     println!("submitted {}", record.id);
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

/// Queue transports with at-least-once delivery.
pub mod broker;

/// Pluggable assessment providers, keyed by job kind.
pub mod capability;

/// Pipeline tuning knobs.
pub mod config;

/// Start/stop control surface for the consumer pool.
pub mod controller;

/// Intake path: validate, persist, enqueue.
pub mod dispatcher;

/// Error types shared across the pipeline.
pub mod error;

/// Worker pool and housekeeping runtime.
pub mod runtime;

/// Risk scoring: weighted terms, categories, treatments.
pub mod scoring;

/// Durable job ledger.
pub mod store;

/// Submission-time target validation.
pub mod target;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub use broker::{Delivery, QueueBroker, QueueMessage};
pub use capability::{AssessmentCapability, CapabilityRegistry};
pub use config::PipelineConfig;
pub use controller::ConsumerController;
pub use dispatcher::JobDispatcher;
pub use error::{PipelineError, Result};
pub use runtime::{WorkerRuntime, WorkerRuntimeBuilder};
pub use store::JobStore;
