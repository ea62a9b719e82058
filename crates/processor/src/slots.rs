//! Output slots and the platform client interface
//!
//! Every active function publishes its current value to a named output
//! slot on the IoT platform; groups with a reset period also keep
//! `...History` slots holding the previous window's final values. The
//! platform itself is an external collaborator, modeled here as the
//! [`PlatformClient`] trait. [`MemoryPlatform`] is the in-process
//! implementation used by tests and embedders.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use statistician_types::{Observation, ValueKind};

use crate::error::{SlotError, SlotResult};

/// Build the deterministic slot name for a function output
///
/// Spaces in the group name collapse to dashes so the name stays
/// addressable: `{stream}-{group}-{suffix}`.
pub fn slot_name(stream: &str, group: &str, suffix: &str) -> String {
    format!("{}-{}-{}", stream, group.replace(' ', "-"), suffix)
}

/// Build the human-readable label for a slot
pub fn slot_label(stream: &str, group: &str, suffix: &str) -> String {
    format!("{}-{}-{}", stream, group, suffix)
}

/// Declared shape of a slot's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotProfile {
    /// Whole-number results (`count`)
    Integer,
    /// Floating-point results (`avg`, `std`, `devSum`)
    Number,
    /// The monitored stream's own value shape (`min`, `max`, deltas)
    Stream,
    /// Occurrence counts per bucket (`dist`)
    IntegerArray,
    /// Percentages or dwell seconds per bucket
    NumberArray,
    /// A `{ value, timestamp }` pair (`distsumtimeprev`)
    TimedValue,
}

/// The platform surface the engine consumes
///
/// All operations are fallible async calls against the external value
/// store. The engine treats them as ordinary blocking collaborator
/// calls; there is no special cancellation handling.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Declare an output slot, creating it if it does not exist
    async fn declare_slot(
        &self,
        name: &str,
        label: &str,
        description: &str,
        profile: SlotProfile,
    ) -> SlotResult<()>;

    /// Read the current value of a named slot
    ///
    /// Returns `Ok(None)` when the slot exists but holds no value yet.
    async fn read_slot(&self, name: &str) -> SlotResult<Option<Value>>;

    /// Write a new value to a named slot
    async fn write_slot(&self, name: &str, value: Value) -> SlotResult<()>;

    /// The declared value kind of a monitored stream
    async fn stream_kind(&self, stream: &str) -> SlotResult<ValueKind>;

    /// Live value and timestamp of a monitored stream
    async fn stream_value(&self, stream: &str) -> SlotResult<Observation>;
}

/// In-memory platform backed by concurrent maps
///
/// Used by the test suites and by embedders that do not talk to a real
/// platform. Slot writes overwrite; reads of undeclared slots fail the
/// same way the platform would.
#[derive(Debug, Default)]
pub struct MemoryPlatform {
    slots: DashMap<String, Value>,
    declared: DashMap<String, SlotProfile>,
    streams: DashMap<String, (ValueKind, Option<Observation>)>,
    denied: DashMap<String, ()>,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a monitored stream and its value kind
    pub fn add_stream(&self, stream: impl Into<String>, kind: ValueKind) {
        self.streams.insert(stream.into(), (kind, None));
    }

    /// Update the live value of a monitored stream
    pub fn set_stream_value(&self, stream: &str, observation: Observation) {
        if let Some(mut entry) = self.streams.get_mut(stream) {
            entry.1 = Some(observation);
        } else {
            self.streams
                .insert(stream.to_string(), (observation.value.kind(), Some(observation)));
        }
    }

    /// Deny all access to a slot name, simulating missing authorization
    pub fn deny_slot(&self, name: impl Into<String>) {
        self.denied.insert(name.into(), ());
    }

    /// Current value of a slot, for assertions
    pub fn slot(&self, name: &str) -> Option<Value> {
        self.slots.get(name).map(|v| v.value().clone())
    }

    /// Declared profile of a slot, for assertions
    pub fn profile(&self, name: &str) -> Option<SlotProfile> {
        self.declared.get(name).map(|p| *p)
    }

    /// Number of declared slots
    pub fn declared_count(&self) -> usize {
        self.declared.len()
    }

    fn check_access(&self, name: &str) -> SlotResult<()> {
        if self.denied.contains_key(name) {
            return Err(SlotError::Unauthorized {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PlatformClient for MemoryPlatform {
    async fn declare_slot(
        &self,
        name: &str,
        _label: &str,
        _description: &str,
        profile: SlotProfile,
    ) -> SlotResult<()> {
        self.check_access(name)?;
        self.declared.insert(name.to_string(), profile);
        Ok(())
    }

    async fn read_slot(&self, name: &str) -> SlotResult<Option<Value>> {
        self.check_access(name)?;
        if !self.declared.contains_key(name) {
            return Err(SlotError::NotFound {
                name: name.to_string(),
            });
        }
        Ok(self.slots.get(name).map(|v| v.value().clone()))
    }

    async fn write_slot(&self, name: &str, value: Value) -> SlotResult<()> {
        self.check_access(name)?;
        if !self.declared.contains_key(name) {
            return Err(SlotError::NotFound {
                name: name.to_string(),
            });
        }
        self.slots.insert(name.to_string(), value);
        Ok(())
    }

    async fn stream_kind(&self, stream: &str) -> SlotResult<ValueKind> {
        self.streams
            .get(stream)
            .map(|entry| entry.0)
            .ok_or_else(|| SlotError::NotFound {
                name: stream.to_string(),
            })
    }

    async fn stream_value(&self, stream: &str) -> SlotResult<Observation> {
        self.streams
            .get(stream)
            .and_then(|entry| entry.1)
            .ok_or_else(|| SlotError::NotFound {
                name: stream.to_string(),
            })
    }
}
