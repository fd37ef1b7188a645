//! # TeaFlow Core Library
//!
//! Brew engine for gongfu-style tea: it turns a tea profile plus vessel,
//! leaf and water parameters into a per-steep schedule, and learns from
//! post-brew ratings to correct future schedules. The `teaflow` CLI is a
//! thin layer over the same library.
//!
//! ## Architecture
//!
//! - **Scheduler**: ratio and temperature multipliers over the tea's base
//!   schedule, corrected by learned offsets
//! - **Learning**: smoothed, clamped per-tea/per-vessel offsets
//! - **Feedback**: capped rating log, per-tea analytics, recommendations
//! - **Storage**: key-value persistence (SQLite or in-memory) and TOML config
//! - **Sync**: offline-first action queue with retries and cache bookkeeping
//!
//! ## Key Components
//!
//! - [`TeaFlow`]: engine context wiring everything onto one store
//! - [`ScheduleComputer`]: schedule computation
//! - [`PersonalizationStore`]: learned offsets
//! - [`FeedbackAnalytics`]: rating log and analytics
//! - [`OfflineSync`]: offline action queue

pub mod buckets;
pub mod engine;
pub mod error;
pub mod events;
pub mod feedback;
pub mod learning;
pub mod library;
mod numeric;
pub mod scheduler;
pub mod storage;
pub mod sync;
pub mod tea;

pub use buckets::{bucket, snap_vessel, VesselBucket, VESSEL_STEPS};
pub use engine::TeaFlow;
pub use error::{ConfigError, CoreError, StorageError, SyncError, ValidationError};
pub use events::Event;
pub use feedback::{
    BrewFeedback, FeedbackAnalytics, NewBrewFeedback, Recommendation, Strength, TeaAnalytics,
    TempAdjustment, TimeAdjustment,
};
pub use learning::PersonalizationStore;
pub use library::{LastSteep, TeaLibrary, TeaPrefs};
pub use scheduler::{BrewParams, ScheduleBreakdown, ScheduleComputer};
pub use storage::{Config, Database, KvStore, MemoryStore};
pub use sync::{LogSink, OfflineSync, SyncSink};
pub use tea::{TeaProfile, TeaType};
