//! Streaming statistics engine
//!
//! This crate maintains running statistics over timestamped values
//! arriving for named metric streams: it resolves requested function
//! sets into their dependency closure, updates per-function state on
//! every observation, and archives/resets the accumulators on a
//! calendar-like schedule, optionally phase-aligned to an anchor date.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod group;
pub mod resolver;
pub mod scheduler;
pub mod slots;

// Re-export commonly used types
pub use config::{EngineConfig, RetryConfig};

pub use coordinator::{ChannelTimers, StreamCoordinator, StreamEvent};

pub use error::{
    FunctionFailure, ProcessorError, Result as ProcessorResult, ScheduleError, ScheduleResult,
    SlotError, SlotResult,
};

pub use group::{buckets::BucketArray, AggregateGroup, GroupState};

pub use resolver::{resolve, FunctionParams, ResolvedFunction, ResolvedSet};

pub use scheduler::{next_fire_delay, GroupKey, ResetScheduler, TimerService};

pub use slots::{slot_label, slot_name, MemoryPlatform, PlatformClient, SlotProfile};
