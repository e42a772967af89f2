//! Distributed background job scheduler for the DataFlux platform.
//!
//! The scheduler registers recurring work units, derives fire times from
//! human-readable schedule expressions, and runs a fixed-interval loop
//! that dispatches due jobs onto their own tasks. Mutual exclusion across
//! scheduler processes sharing one store goes through TTL-bounded locks;
//! inter-job dependencies gate on the dependency's latest persisted
//! result; failures get a bounded number of deferred retries; every
//! attempt is recorded to the result history.
//!
//! # Example
//!
//! ```ignore
//! use dataflux_scheduler::{work_fn, Scheduler, SchedulerConfig};
//! use dataflux_store::RedisKv;
//! use dataflux_types::JobSpec;
//! use std::sync::Arc;
//!
//! let kv = Arc::new(RedisKv::connect("redis://127.0.0.1:6379").await?);
//! let scheduler = Scheduler::new(kv, SchedulerConfig::default())?;
//!
//! scheduler.register(
//!     JobSpec::new("crypto_quotes", "Crypto Quotes Collection", "every 1 minutes"),
//!     work_fn(|_cancel| async move { collect_crypto_quotes().await }),
//! ).await?;
//!
//! scheduler.start().await?;
//! ```
//!
//! Timeouts are cooperative: the executor stops waiting once the ceiling
//! elapses and cancels the work unit's token, but a work unit that ignores
//! its token keeps its background task alive. See [`executor`].

pub mod clock;
pub mod config;
pub mod deps;
pub mod error;
pub mod executor;
pub mod jitter;
pub mod registry;
pub mod retry;
pub mod schedule;
pub mod scheduler;
pub mod work;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SchedulerConfig;
pub use deps::DependencyResolver;
pub use error::SchedulerError;
pub use executor::Executor;
pub use jitter::JitterConfig;
pub use registry::{JobRegistry, JobSnapshot, JobStatusInfo};
pub use retry::RetryPolicy;
pub use schedule::{IntervalUnit, Schedule, ScheduleParseError};
pub use scheduler::Scheduler;
pub use work::{work_fn, WorkFn, WorkFuture};
