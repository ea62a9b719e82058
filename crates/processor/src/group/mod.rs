//! Aggregate groups: per-stream running statistics
//!
//! An [`AggregateGroup`] owns the running state for one group of
//! statistical functions bound to one monitored stream. Every new
//! observation flows through [`AggregateGroup::observe`], which updates
//! each resolved function in a fixed order (later functions read
//! results computed earlier in the same call) and publishes changed
//! values to their output slots. When the group has a reset period,
//! [`AggregateGroup::reset_window`] archives live values to history
//! slots and clears the accumulators.
//!
//! The group is a private state machine for exactly one stream: callers
//! must serialize `observe` and `reset_window` per group. Different
//! groups are fully independent.

pub mod buckets;

use anyhow::{anyhow, bail};
use serde_json::{json, Value};
use tracing::{debug, warn};

use statistician_types::{
    DefinitionError, GroupDefinition, Observation, StatFunction, StreamValue, ValueKind,
};

use crate::error::{FunctionFailure, ProcessorError, Result, SlotResult};
use crate::resolver::{resolve, ResolvedSet};
use crate::scheduler::GroupKey;
use crate::slots::{slot_label, slot_name, PlatformClient, SlotProfile};

use buckets::BucketArray;

/// Running accumulator state for one group
///
/// `count` only ever moves up between resets; the extrema remember
/// their pre-update values so the bucket arrays can grow; the bucket
/// arrays themselves never shrink.
#[derive(Debug, Clone, Default)]
pub struct GroupState {
    pub count: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub prev_min: Option<f64>,
    pub prev_max: Option<f64>,
    pub avg: Option<f64>,
    /// Running deviation accumulator feeding `std`; `None` until the
    /// first observation seeds it
    pub dev_sum: Option<f64>,
    pub std: Option<f64>,
    pub dist: Option<BucketArray>,
    pub dist_sum_time: Option<BucketArray>,
    /// Last observed (value, timestamp) pair for `distsumtime`
    pub dist_sum_prev: Option<Observation>,
    /// Value at the end of the previous delta step
    pub delta_prev_total: Option<f64>,
    pub delta_current: Option<f64>,
    /// Value at the end of the previous window, for the history delta
    pub delta_history_prev_total: Option<f64>,
}

/// One group of statistical functions bound to one stream
pub struct AggregateGroup {
    stream: String,
    name: String,
    kind: ValueKind,
    functions: ResolvedSet,
    windowed: bool,
    state: GroupState,
}

impl AggregateGroup {
    /// Build a group from its definition
    ///
    /// Resolves the requested functions into their dependency closure
    /// and sets up bucket arrays from the resolved parameters. Distribution
    /// functions on numeric streams must carry a bucket size.
    pub fn new(
        stream: impl Into<String>,
        definition: &GroupDefinition,
        kind: ValueKind,
    ) -> std::result::Result<Self, DefinitionError> {
        let stream = stream.into();
        let functions = resolve(&definition.calculate, kind);

        let mut state = GroupState::default();
        for function in [StatFunction::Dist, StatFunction::DistSumTime] {
            if !functions.contains(function) {
                continue;
            }
            let array = match kind {
                ValueKind::Boolean => BucketArray::boolean(),
                ValueKind::Numeric => {
                    let params = functions.params(function);
                    let size = params.bucketsize.ok_or_else(|| {
                        DefinitionError::MissingBucketSize {
                            function: function.to_string(),
                            group: definition.name.clone(),
                        }
                    })?;
                    BucketArray::new(size, params.min, params.max)
                }
            };
            match function {
                StatFunction::Dist => state.dist = Some(array),
                _ => state.dist_sum_time = Some(array),
            }
        }

        Ok(Self {
            stream,
            name: definition.name.clone(),
            kind,
            functions,
            windowed: definition.reset.is_some(),
            state,
        })
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> GroupKey {
        GroupKey::new(&self.stream, &self.name)
    }

    /// The resolved function set this group maintains
    pub fn functions(&self) -> &ResolvedSet {
        &self.functions
    }

    /// Read-only view of the running state
    pub fn state(&self) -> &GroupState {
        &self.state
    }

    fn slot(&self, suffix: &str) -> String {
        slot_name(&self.stream, &self.name, suffix)
    }

    async fn write<C: PlatformClient + ?Sized>(
        &self,
        client: &C,
        suffix: &str,
        value: Value,
    ) -> SlotResult<()> {
        client.write_slot(&self.slot(suffix), value).await
    }

    /// Declare every output slot this group publishes to
    ///
    /// History variants are declared only when the group has a reset
    /// period. The first platform failure aborts the declaration; the
    /// caller abandons the group and moves on to the next one.
    pub async fn declare_slots<C: PlatformClient + ?Sized>(&self, client: &C) -> SlotResult<()> {
        const DESC: &str = "generated by the statistician";

        let declare = |suffix: &'static str, profile: SlotProfile, description: String| {
            let name = self.slot(suffix);
            let label = slot_label(&self.stream, &self.name, suffix);
            async move { client.declare_slot(&name, &label, &description, profile).await }
        };
        let history_desc =
            |function: &str| format!("{}. {} of previous time windows", DESC, function);

        for (function, _) in self.functions.iter() {
            match function {
                StatFunction::Count => {
                    declare("count", SlotProfile::Integer, DESC.to_string()).await?;
                    if self.windowed {
                        declare("countHistory", SlotProfile::Integer, history_desc("count"))
                            .await?;
                    }
                }
                StatFunction::Min => {
                    declare("min", SlotProfile::Stream, DESC.to_string()).await?;
                    if self.windowed {
                        declare("minHistory", SlotProfile::Stream, history_desc("min")).await?;
                    }
                }
                StatFunction::Max => {
                    declare("max", SlotProfile::Stream, DESC.to_string()).await?;
                    if self.windowed {
                        declare("maxHistory", SlotProfile::Stream, history_desc("max")).await?;
                    }
                }
                StatFunction::Avg => {
                    declare("avg", SlotProfile::Number, DESC.to_string()).await?;
                    if self.windowed {
                        declare("avgHistory", SlotProfile::Number, history_desc("avg")).await?;
                    }
                }
                StatFunction::Std => {
                    declare("devSum", SlotProfile::Number, DESC.to_string()).await?;
                    declare("std", SlotProfile::Number, DESC.to_string()).await?;
                    if self.windowed {
                        declare("stdHistory", SlotProfile::Number, history_desc("std")).await?;
                    }
                }
                StatFunction::Dist => {
                    declare("dist", SlotProfile::IntegerArray, DESC.to_string()).await?;
                    if self.windowed {
                        declare("distHistory", SlotProfile::IntegerArray, history_desc("dist"))
                            .await?;
                    }
                }
                StatFunction::DistProcent => {
                    declare(
                        "distprocent",
                        SlotProfile::NumberArray,
                        format!("{}. Distribution expressed in percentages", DESC),
                    )
                    .await?;
                }
                StatFunction::DistSumTime => {
                    declare("distsumtime", SlotProfile::NumberArray, DESC.to_string()).await?;
                    declare("distsumtimeprev", SlotProfile::TimedValue, DESC.to_string())
                        .await?;
                    if self.windowed {
                        declare(
                            "distsumtimeHistory",
                            SlotProfile::NumberArray,
                            history_desc("dist sum time"),
                        )
                        .await?;
                    }
                }
                StatFunction::DistSumTimeProcent => {
                    declare(
                        "distsumtimeprocent",
                        SlotProfile::NumberArray,
                        format!("{}. Dwell time expressed in percentages", DESC),
                    )
                    .await?;
                }
                StatFunction::Delta => {
                    declare("deltaCurrentPeriod", SlotProfile::Stream, DESC.to_string()).await?;
                    declare(
                        "deltaPrevTotal",
                        SlotProfile::Stream,
                        format!("{}. The value of the stream at the end of the previous delta step", DESC),
                    )
                    .await?;
                    if self.windowed {
                        declare("deltaHistory", SlotProfile::Stream, history_desc("delta"))
                            .await?;
                        declare(
                            "deltaHistoryPrevTotal",
                            SlotProfile::Stream,
                            format!("{}. The stream value at the end of the previous window", DESC),
                        )
                        .await?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Feed one observation through every resolved function
    ///
    /// The update order is fixed because later functions read results
    /// computed earlier in the same call (`std` reads the fresh `avg`,
    /// the distributions read the fresh extrema). A failing function is
    /// recorded and the remaining functions still run; failures come
    /// back aggregated per group.
    pub async fn observe<C: PlatformClient + ?Sized>(
        &mut self,
        client: &C,
        observation: Observation,
    ) -> Result<()> {
        let mut failures = Vec::new();
        let value = observation.value;
        let v = value.as_f64();

        const ORDER: [StatFunction; 10] = [
            StatFunction::Count,
            StatFunction::Min,
            StatFunction::Max,
            StatFunction::Avg,
            StatFunction::Std,
            StatFunction::Dist,
            StatFunction::DistProcent,
            StatFunction::DistSumTime,
            StatFunction::DistSumTimeProcent,
            StatFunction::Delta,
        ];
        for function in ORDER {
            if !self.functions.contains(function) {
                continue;
            }
            let outcome = match function {
                StatFunction::Count => self.update_count(client).await,
                StatFunction::Min => self.update_min(client, v).await,
                StatFunction::Max => self.update_max(client, v).await,
                StatFunction::Avg => self.update_avg(client, v).await,
                StatFunction::Std => self.update_std(client, v).await,
                StatFunction::Dist => self.update_dist(client, value).await,
                StatFunction::DistProcent => self.update_dist_procent(client).await,
                StatFunction::DistSumTime => self.update_dist_sum_time(client, observation).await,
                StatFunction::DistSumTimeProcent => {
                    self.update_dist_sum_time_procent(client).await
                }
                StatFunction::Delta => self.update_delta(client, v).await,
            };
            if let Err(err) = outcome {
                warn!(
                    stream = %self.stream,
                    group = %self.name,
                    function = %function,
                    error = %err,
                    "function update failed"
                );
                failures.push(FunctionFailure::new(function, err));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ProcessorError::Observe {
                group: self.name.clone(),
                failures,
            })
        }
    }

    async fn update_count<C: PlatformClient + ?Sized>(&mut self, client: &C) -> anyhow::Result<()> {
        self.state.count += 1;
        self.write(client, "count", json!(self.state.count)).await?;
        Ok(())
    }

    async fn update_min<C: PlatformClient + ?Sized>(
        &mut self,
        client: &C,
        v: f64,
    ) -> anyhow::Result<()> {
        self.state.prev_min = self.state.min;
        let is_new_extreme = match self.state.min {
            None => true,
            Some(current) => v < current,
        };
        if is_new_extreme {
            self.state.min = Some(v);
            self.write(client, "min", json!(v)).await?;
        }
        Ok(())
    }

    async fn update_max<C: PlatformClient + ?Sized>(
        &mut self,
        client: &C,
        v: f64,
    ) -> anyhow::Result<()> {
        self.state.prev_max = self.state.max;
        let is_new_extreme = match self.state.max {
            None => true,
            Some(current) => v > current,
        };
        if is_new_extreme {
            self.state.max = Some(v);
            self.write(client, "max", json!(v)).await?;
        }
        Ok(())
    }

    // The running mean is the engine's own decaying-weight recurrence,
    // `avg - avg/count + value/count`, not the arithmetic mean. It is
    // preserved as-is; downstream consumers depend on these exact values.
    async fn update_avg<C: PlatformClient + ?Sized>(
        &mut self,
        client: &C,
        v: f64,
    ) -> anyhow::Result<()> {
        let avg = match self.state.avg {
            None => v,
            Some(avg) => {
                let count = self.state.count as f64;
                if count == 0.0 {
                    bail!("avg requires a running count");
                }
                avg - avg / count + v / count
            }
        };
        self.state.avg = Some(avg);
        self.write(client, "avg", json!(avg)).await?;
        Ok(())
    }

    // `std` builds on a plain running deviation sum against the fresh
    // `avg`: `sqrt(devSum^2 / count)`. Like `avg`, preserved as-is.
    async fn update_std<C: PlatformClient + ?Sized>(
        &mut self,
        client: &C,
        v: f64,
    ) -> anyhow::Result<()> {
        match self.state.dev_sum {
            None => {
                // first observation only seeds the accumulator
                self.state.dev_sum = Some(0.0);
                self.write(client, "devSum", json!(0.0)).await?;
            }
            Some(dev_sum) => {
                let avg = self
                    .state
                    .avg
                    .ok_or_else(|| anyhow!("std requires a running avg"))?;
                let count = self.state.count as f64;
                if count == 0.0 {
                    bail!("std requires a running count");
                }
                let dev_sum = dev_sum + (v - avg);
                let std = (dev_sum * dev_sum / count).sqrt();
                self.state.dev_sum = Some(dev_sum);
                self.state.std = Some(std);
                self.write(client, "devSum", json!(dev_sum)).await?;
                self.write(client, "std", json!(std)).await?;
            }
        }
        Ok(())
    }

    /// Layout extrema for the bucket arrays: the live extrema after
    /// this call's min/max update, falling back to the value itself
    /// when the extrema are not maintained (explicit bounds freeze the
    /// layout anyway)
    fn layout_extrema(&self, v: f64) -> (f64, f64) {
        match self.kind {
            ValueKind::Boolean => (0.0, 1.0),
            ValueKind::Numeric => (
                self.state.min.unwrap_or(v),
                self.state.max.unwrap_or(v),
            ),
        }
    }

    async fn update_dist<C: PlatformClient + ?Sized>(
        &mut self,
        client: &C,
        value: StreamValue,
    ) -> anyhow::Result<()> {
        let v = value.as_f64();
        let (lo, hi) = self.layout_extrema(v);
        let array = self
            .state
            .dist
            .as_mut()
            .ok_or_else(|| anyhow!("dist has no bucket array"))?;
        array.prepare(lo, hi);
        if array.add(v, 1.0) {
            let counts = integer_counts(array);
            self.write(client, "dist", counts).await?;
        } else {
            debug!(stream = %self.stream, group = %self.name, value = v, "value outside dist bounds, dropped");
        }
        Ok(())
    }

    async fn update_dist_procent<C: PlatformClient + ?Sized>(
        &mut self,
        client: &C,
    ) -> anyhow::Result<()> {
        let percentages = self
            .state
            .dist
            .as_ref()
            .ok_or_else(|| anyhow!("distprocent has no dist array"))?
            .percentages();
        // an all-zero distribution has no percentage view
        if !percentages.is_empty() {
            self.write(client, "distprocent", json!(percentages)).await?;
        }
        Ok(())
    }

    // Dwell time is attributed to the *previous* value: the stream held
    // that value from the previous timestamp until now.
    async fn update_dist_sum_time<C: PlatformClient + ?Sized>(
        &mut self,
        client: &C,
        observation: Observation,
    ) -> anyhow::Result<()> {
        if let Some(prev) = self.state.dist_sum_prev {
            let prev_v = prev.value.as_f64();
            let (lo, hi) = self.layout_extrema(prev_v);
            let array = self
                .state
                .dist_sum_time
                .as_mut()
                .ok_or_else(|| anyhow!("distsumtime has no bucket array"))?;
            array.prepare(lo, hi);
            let seconds =
                (observation.timestamp - prev.timestamp).num_milliseconds() as f64 / 1000.0;
            if !array.add(prev_v, seconds) {
                debug!(stream = %self.stream, group = %self.name, value = prev_v, "previous value outside distsumtime bounds, dropped");
            }
            let counts = json!(array.counts());
            self.write(client, "distsumtime", counts).await?;
        }
        self.state.dist_sum_prev = Some(observation);
        self.write(
            client,
            "distsumtimeprev",
            json!({
                "value": observation.value,
                "timestamp": observation.timestamp.to_rfc3339(),
            }),
        )
        .await?;
        Ok(())
    }

    async fn update_dist_sum_time_procent<C: PlatformClient + ?Sized>(
        &mut self,
        client: &C,
    ) -> anyhow::Result<()> {
        let percentages = self
            .state
            .dist_sum_time
            .as_ref()
            .ok_or_else(|| anyhow!("distsumtimeprocent has no distsumtime array"))?
            .percentages();
        if !percentages.is_empty() {
            self.write(client, "distsumtimeprocent", json!(percentages))
                .await?;
        }
        Ok(())
    }

    async fn update_delta<C: PlatformClient + ?Sized>(
        &mut self,
        client: &C,
        v: f64,
    ) -> anyhow::Result<()> {
        if let Some(prev_total) = self.state.delta_prev_total {
            let delta = v - prev_total;
            self.state.delta_current = Some(delta);
            self.write(client, "deltaCurrentPeriod", json!(delta)).await?;
        }
        self.state.delta_prev_total = Some(v);
        self.write(client, "deltaPrevTotal", json!(v)).await?;
        Ok(())
    }

    /// Archive live values to history slots and clear the accumulators
    ///
    /// Called on every window boundary. Functions reset independently
    /// of each other (no cross-function ordering at reset time); a
    /// failing function is recorded and the rest still reset. The
    /// extrema and the history delta reseed from the live stream value,
    /// not from zero.
    pub async fn reset_window<C: PlatformClient + ?Sized>(&mut self, client: &C) -> Result<()> {
        let mut failures = Vec::new();

        let live = match client.stream_value(&self.stream).await {
            Ok(observation) => Some(observation.value.as_f64()),
            Err(err) => {
                warn!(
                    stream = %self.stream,
                    group = %self.name,
                    error = %err,
                    "live stream value unavailable during reset"
                );
                None
            }
        };
        let live_or = |function: StatFunction| {
            live.ok_or_else(|| anyhow!("{} reseed needs the live stream value", function))
        };

        let functions: Vec<StatFunction> = self.functions.iter().map(|(f, _)| f).collect();
        for function in functions {
            let outcome = match function {
                StatFunction::Count => self.reset_count(client).await,
                StatFunction::Min => match live_or(function) {
                    Ok(v) => self.reset_min(client, v).await,
                    Err(err) => Err(err),
                },
                StatFunction::Max => match live_or(function) {
                    Ok(v) => self.reset_max(client, v).await,
                    Err(err) => Err(err),
                },
                StatFunction::Avg => self.reset_avg(client).await,
                StatFunction::Std => self.reset_std(client).await,
                StatFunction::Dist => self.reset_dist(client).await,
                StatFunction::DistProcent => {
                    // percentages carry no history across windows
                    self.write(client, "distprocent", json!([]))
                        .await
                        .map_err(Into::into)
                }
                StatFunction::DistSumTime => self.reset_dist_sum_time(client).await,
                StatFunction::DistSumTimeProcent => self
                    .write(client, "distsumtimeprocent", json!([]))
                    .await
                    .map_err(Into::into),
                StatFunction::Delta => match live_or(function) {
                    Ok(v) => self.reset_delta(client, v).await,
                    Err(err) => Err(err),
                },
            };
            if let Err(err) = outcome {
                warn!(
                    stream = %self.stream,
                    group = %self.name,
                    function = %function,
                    error = %err,
                    "function reset failed"
                );
                failures.push(FunctionFailure::new(function, err));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ProcessorError::Reset {
                group: self.name.clone(),
                failures,
            })
        }
    }

    async fn reset_count<C: PlatformClient + ?Sized>(&mut self, client: &C) -> anyhow::Result<()> {
        self.write(client, "countHistory", json!(self.state.count))
            .await?;
        self.state.count = 0;
        self.write(client, "count", json!(0)).await?;
        Ok(())
    }

    async fn reset_min<C: PlatformClient + ?Sized>(
        &mut self,
        client: &C,
        live: f64,
    ) -> anyhow::Result<()> {
        self.write(client, "minHistory", json!(self.state.min)).await?;
        self.state.min = Some(live);
        self.state.prev_min = None;
        self.write(client, "min", json!(live)).await?;
        Ok(())
    }

    async fn reset_max<C: PlatformClient + ?Sized>(
        &mut self,
        client: &C,
        live: f64,
    ) -> anyhow::Result<()> {
        self.write(client, "maxHistory", json!(self.state.max)).await?;
        self.state.max = Some(live);
        self.state.prev_max = None;
        self.write(client, "max", json!(live)).await?;
        Ok(())
    }

    async fn reset_avg<C: PlatformClient + ?Sized>(&mut self, client: &C) -> anyhow::Result<()> {
        self.write(client, "avgHistory", json!(self.state.avg)).await?;
        // the recurrence restarts from zero together with count
        self.state.avg = Some(0.0);
        self.write(client, "avg", json!(0.0)).await?;
        Ok(())
    }

    async fn reset_std<C: PlatformClient + ?Sized>(&mut self, client: &C) -> anyhow::Result<()> {
        self.write(client, "stdHistory", json!(self.state.std)).await?;
        self.state.dev_sum = Some(0.0);
        self.state.std = Some(0.0);
        self.write(client, "devSum", json!(0.0)).await?;
        self.write(client, "std", json!(0.0)).await?;
        Ok(())
    }

    async fn reset_dist<C: PlatformClient + ?Sized>(&mut self, client: &C) -> anyhow::Result<()> {
        let array = self
            .state
            .dist
            .as_mut()
            .ok_or_else(|| anyhow!("dist has no bucket array"))?;
        let history = integer_counts(array);
        array.reset();
        self.write(client, "distHistory", history).await?;
        self.write(client, "dist", json!([])).await?;
        Ok(())
    }

    async fn reset_dist_sum_time<C: PlatformClient + ?Sized>(
        &mut self,
        client: &C,
    ) -> anyhow::Result<()> {
        let array = self
            .state
            .dist_sum_time
            .as_mut()
            .ok_or_else(|| anyhow!("distsumtime has no bucket array"))?;
        let history = json!(array.counts());
        array.reset();
        self.state.dist_sum_prev = None;
        self.write(client, "distsumtimeHistory", history).await?;
        self.write(client, "distsumtime", json!([])).await?;
        self.write(
            client,
            "distsumtimeprev",
            json!({ "value": null, "timestamp": null }),
        )
        .await?;
        Ok(())
    }

    async fn reset_delta<C: PlatformClient + ?Sized>(
        &mut self,
        client: &C,
        live: f64,
    ) -> anyhow::Result<()> {
        // the first window has no baseline to diff against
        if let Some(baseline) = self.state.delta_history_prev_total {
            self.write(client, "deltaHistory", json!(live - baseline))
                .await?;
        }
        self.state.delta_history_prev_total = Some(live);
        self.write(client, "deltaHistoryPrevTotal", json!(live))
            .await?;
        Ok(())
    }
}

/// Distribution counts as a JSON integer array
fn integer_counts(array: &BucketArray) -> Value {
    Value::Array(
        array
            .counts()
            .iter()
            .map(|c| json!(c.round() as u64))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::MemoryPlatform;
    use chrono::{TimeZone, Utc};
    use statistician_types::FunctionRequest;

    fn definition(requests: Vec<FunctionRequest>) -> GroupDefinition {
        GroupDefinition::new("daily", requests)
    }

    fn windowed_definition(requests: Vec<FunctionRequest>) -> GroupDefinition {
        GroupDefinition::new("daily", requests).with_reset("0:0:0:1:0:0".parse().unwrap())
    }

    async fn group_on(
        platform: &MemoryPlatform,
        definition: &GroupDefinition,
        kind: ValueKind,
    ) -> AggregateGroup {
        platform.add_stream("sensor-1", kind);
        let group = AggregateGroup::new("sensor-1", definition, kind).unwrap();
        group.declare_slots(platform).await.unwrap();
        group
    }

    fn at(seconds: i64) -> Observation {
        Observation::new(
            0.0,
            Utc.timestamp_opt(seconds, 0).unwrap(),
        )
    }

    fn numeric_at(value: f64, seconds: i64) -> Observation {
        Observation::new(value, Utc.timestamp_opt(seconds, 0).unwrap())
    }

    fn bool_at(value: bool, seconds: i64) -> Observation {
        Observation::new(value, Utc.timestamp_opt(seconds, 0).unwrap())
    }

    #[tokio::test]
    async fn test_count_min_max_avg_over_sequence() {
        let platform = MemoryPlatform::new();
        let def = definition(vec![
            FunctionRequest::new(StatFunction::Count),
            FunctionRequest::new(StatFunction::Min),
            FunctionRequest::new(StatFunction::Max),
            FunctionRequest::new(StatFunction::Avg),
        ]);
        let mut group = group_on(&platform, &def, ValueKind::Numeric).await;

        for (i, v) in [1.0, 5.0, 3.0].into_iter().enumerate() {
            group
                .observe(&platform, numeric_at(v, i as i64))
                .await
                .unwrap();
        }

        assert_eq!(group.state().count, 3);
        assert_eq!(group.state().min, Some(1.0));
        assert_eq!(group.state().max, Some(5.0));

        // the engine's own recurrence, not the arithmetic mean:
        // avg1 = 1, avg2 = 1 - 1/2 + 5/2 = 3, avg3 = 3 - 3/3 + 3/3 = 3
        assert_eq!(group.state().avg, Some(3.0));

        assert_eq!(platform.slot("sensor-1-daily-count"), Some(json!(3)));
        assert_eq!(platform.slot("sensor-1-daily-min"), Some(json!(1.0)));
        assert_eq!(platform.slot("sensor-1-daily-max"), Some(json!(5.0)));
        assert_eq!(platform.slot("sensor-1-daily-avg"), Some(json!(3.0)));
    }

    #[tokio::test]
    async fn test_avg_recurrence_differs_from_arithmetic_mean() {
        let platform = MemoryPlatform::new();
        let def = definition(vec![FunctionRequest::new(StatFunction::Avg)]);
        let mut group = group_on(&platform, &def, ValueKind::Numeric).await;

        for (i, v) in [10.0, 20.0, 30.0, 40.0].into_iter().enumerate() {
            group
                .observe(&platform, numeric_at(v, i as i64))
                .await
                .unwrap();
        }

        // 10 -> 10 - 5 + 10 = 15 -> 15 - 5 + 10 = 20 -> 20 - 5 + 10 = 25
        assert_eq!(group.state().avg, Some(25.0));
    }

    #[tokio::test]
    async fn test_std_seeds_then_tracks() {
        let platform = MemoryPlatform::new();
        let def = definition(vec![FunctionRequest::new(StatFunction::Std)]);
        let mut group = group_on(&platform, &def, ValueKind::Numeric).await;

        group.observe(&platform, numeric_at(10.0, 0)).await.unwrap();
        // first observation seeds devSum only
        assert_eq!(group.state().dev_sum, Some(0.0));
        assert_eq!(group.state().std, None);

        group.observe(&platform, numeric_at(16.0, 1)).await.unwrap();
        // avg after 2nd obs: 10 - 5 + 8 = 13; devSum = 16 - 13 = 3
        // std = sqrt(3*3 / 2)
        assert_eq!(group.state().dev_sum, Some(3.0));
        let expected = (9.0_f64 / 2.0).sqrt();
        assert_eq!(group.state().std, Some(expected));
        assert_eq!(
            platform.slot("sensor-1-daily-std"),
            Some(json!(expected))
        );
    }

    #[tokio::test]
    async fn test_boolean_dist_buckets() {
        let platform = MemoryPlatform::new();
        let def = definition(vec![FunctionRequest::new(StatFunction::Dist)]);
        let mut group = group_on(&platform, &def, ValueKind::Boolean).await;

        for (i, v) in [true, false, true].into_iter().enumerate() {
            group
                .observe(&platform, bool_at(v, i as i64))
                .await
                .unwrap();
        }

        // index 0 counts false, index 1 counts true
        assert_eq!(
            platform.slot("sensor-1-daily-dist"),
            Some(json!([1, 2]))
        );
    }

    #[tokio::test]
    async fn test_numeric_dist_grows_with_extrema() {
        let platform = MemoryPlatform::new();
        let def = definition(vec![
            FunctionRequest::new(StatFunction::Dist).with_bucketsize(10.0)
        ]);
        let mut group = group_on(&platform, &def, ValueKind::Numeric).await;

        group.observe(&platform, numeric_at(25.0, 0)).await.unwrap();
        assert_eq!(platform.slot("sensor-1-daily-dist"), Some(json!([1])));

        group.observe(&platform, numeric_at(45.0, 1)).await.unwrap();
        assert_eq!(
            platform.slot("sensor-1-daily-dist"),
            Some(json!([1, 0, 1]))
        );

        group.observe(&platform, numeric_at(5.0, 2)).await.unwrap();
        assert_eq!(
            platform.slot("sensor-1-daily-dist"),
            Some(json!([1, 0, 1, 0, 1]))
        );
    }

    #[tokio::test]
    async fn test_bounded_dist_drops_out_of_range() {
        let platform = MemoryPlatform::new();
        let def = definition(vec![FunctionRequest::new(StatFunction::Dist)
            .with_bucketsize(10.0)
            .with_min(0.0)
            .with_max(19.0)]);
        let mut group = group_on(&platform, &def, ValueKind::Numeric).await;

        group.observe(&platform, numeric_at(5.0, 0)).await.unwrap();
        group.observe(&platform, numeric_at(500.0, 1)).await.unwrap();

        // the out-of-range value left the buckets untouched
        assert_eq!(
            platform.slot("sensor-1-daily-dist"),
            Some(json!([1, 0]))
        );
        // no implicit min/max maintained for a fully bounded dist
        assert!(!group.functions().contains(StatFunction::Min));
    }

    #[tokio::test]
    async fn test_distprocent_sums_to_hundred() {
        let platform = MemoryPlatform::new();
        let def = definition(vec![FunctionRequest::new(StatFunction::DistProcent)
            .with_bucketsize(10.0)
            .with_min(0.0)
            .with_max(19.0)]);
        let mut group = group_on(&platform, &def, ValueKind::Numeric).await;

        for (i, v) in [5.0, 15.0, 16.0, 17.0].into_iter().enumerate() {
            group
                .observe(&platform, numeric_at(v, i as i64))
                .await
                .unwrap();
        }

        assert_eq!(
            platform.slot("sensor-1-daily-distprocent"),
            Some(json!([25.0, 75.0]))
        );
    }

    #[tokio::test]
    async fn test_distprocent_empty_on_zero_total() {
        let platform = MemoryPlatform::new();
        let def = definition(vec![FunctionRequest::new(StatFunction::DistProcent)
            .with_bucketsize(10.0)
            .with_min(0.0)
            .with_max(19.0)]);
        let mut group = group_on(&platform, &def, ValueKind::Numeric).await;

        // every observation lands outside the bounds: total stays zero
        group
            .observe(&platform, numeric_at(100.0, 0))
            .await
            .unwrap();
        assert_eq!(platform.slot("sensor-1-daily-distprocent"), None);
    }

    #[tokio::test]
    async fn test_distsumtime_buckets_previous_value() {
        let platform = MemoryPlatform::new();
        let def = definition(vec![FunctionRequest::new(StatFunction::DistSumTime)
            .with_bucketsize(10.0)
            .with_min(0.0)
            .with_max(29.0)]);
        let mut group = group_on(&platform, &def, ValueKind::Numeric).await;

        // first observation seeds state only
        group.observe(&platform, numeric_at(10.0, 0)).await.unwrap();
        assert_eq!(platform.slot("sensor-1-daily-distsumtime"), None);
        assert!(group.state().dist_sum_prev.is_some());

        // second observation attributes 5 seconds to the bucket of the
        // previous value (10)
        group.observe(&platform, numeric_at(20.0, 5)).await.unwrap();
        assert_eq!(
            platform.slot("sensor-1-daily-distsumtime"),
            Some(json!([0.0, 5.0, 0.0]))
        );
    }

    #[tokio::test]
    async fn test_delta_tracks_previous_total() {
        let platform = MemoryPlatform::new();
        let def = definition(vec![FunctionRequest::new(StatFunction::Delta)]);
        let mut group = group_on(&platform, &def, ValueKind::Numeric).await;

        group.observe(&platform, numeric_at(100.0, 0)).await.unwrap();
        // no previous total yet, only the seed write
        assert_eq!(platform.slot("sensor-1-daily-deltaCurrentPeriod"), None);
        assert_eq!(
            platform.slot("sensor-1-daily-deltaPrevTotal"),
            Some(json!(100.0))
        );

        group.observe(&platform, numeric_at(140.0, 1)).await.unwrap();
        assert_eq!(
            platform.slot("sensor-1-daily-deltaCurrentPeriod"),
            Some(json!(40.0))
        );
    }

    #[tokio::test]
    async fn test_failed_function_does_not_stop_the_rest() {
        let platform = MemoryPlatform::new();
        let def = definition(vec![
            FunctionRequest::new(StatFunction::Count),
            FunctionRequest::new(StatFunction::Max),
        ]);
        let mut group = group_on(&platform, &def, ValueKind::Numeric).await;

        // break the count slot after declaration
        platform.deny_slot("sensor-1-daily-count");

        let err = group
            .observe(&platform, numeric_at(7.0, 0))
            .await
            .unwrap_err();
        match err {
            ProcessorError::Observe { group: name, failures } => {
                assert_eq!(name, "daily");
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].function, StatFunction::Count);
            }
            other => panic!("unexpected error: {other}"),
        }

        // max still ran and published
        assert_eq!(group.state().max, Some(7.0));
        assert_eq!(platform.slot("sensor-1-daily-max"), Some(json!(7.0)));
    }

    #[tokio::test]
    async fn test_reset_archives_and_reseeds() {
        let platform = MemoryPlatform::new();
        let def = windowed_definition(vec![
            FunctionRequest::new(StatFunction::Count),
            FunctionRequest::new(StatFunction::Min),
            FunctionRequest::new(StatFunction::Max),
            FunctionRequest::new(StatFunction::Avg),
        ]);
        let mut group = group_on(&platform, &def, ValueKind::Numeric).await;

        for (i, v) in [1.0, 5.0, 3.0].into_iter().enumerate() {
            let obs = numeric_at(v, i as i64);
            platform.set_stream_value("sensor-1", obs);
            group.observe(&platform, obs).await.unwrap();
        }

        group.reset_window(&platform).await.unwrap();

        // history slots hold the pre-reset values
        assert_eq!(platform.slot("sensor-1-daily-countHistory"), Some(json!(3)));
        assert_eq!(platform.slot("sensor-1-daily-minHistory"), Some(json!(1.0)));
        assert_eq!(platform.slot("sensor-1-daily-maxHistory"), Some(json!(5.0)));
        assert_eq!(platform.slot("sensor-1-daily-avgHistory"), Some(json!(3.0)));

        // live accumulators are back at their reset baseline; the
        // extrema reseed from the latest live value (3.0), not zero
        assert_eq!(group.state().count, 0);
        assert_eq!(group.state().min, Some(3.0));
        assert_eq!(group.state().max, Some(3.0));
        assert_eq!(group.state().avg, Some(0.0));
        assert_eq!(platform.slot("sensor-1-daily-count"), Some(json!(0)));
        assert_eq!(platform.slot("sensor-1-daily-min"), Some(json!(3.0)));
    }

    #[tokio::test]
    async fn test_reset_clears_distributions_without_percent_history() {
        let platform = MemoryPlatform::new();
        let def = windowed_definition(vec![
            FunctionRequest::new(StatFunction::DistProcent)
                .with_bucketsize(10.0)
                .with_min(0.0)
                .with_max(19.0),
            FunctionRequest::new(StatFunction::DistSumTime)
                .with_bucketsize(10.0)
                .with_min(0.0)
                .with_max(19.0),
        ]);
        let mut group = group_on(&platform, &def, ValueKind::Numeric).await;

        for (i, v) in [5.0, 15.0].into_iter().enumerate() {
            let obs = numeric_at(v, (i * 10) as i64);
            platform.set_stream_value("sensor-1", obs);
            group.observe(&platform, obs).await.unwrap();
        }

        group.reset_window(&platform).await.unwrap();

        assert_eq!(
            platform.slot("sensor-1-daily-distHistory"),
            Some(json!([1, 1]))
        );
        assert_eq!(
            platform.slot("sensor-1-daily-distsumtimeHistory"),
            Some(json!([10.0, 0.0]))
        );
        assert_eq!(platform.slot("sensor-1-daily-dist"), Some(json!([])));
        assert_eq!(platform.slot("sensor-1-daily-distsumtime"), Some(json!([])));
        assert_eq!(platform.slot("sensor-1-daily-distprocent"), Some(json!([])));
        assert!(group.state().dist_sum_prev.is_none());
        // percent history slots are never declared
        assert_eq!(platform.profile("sensor-1-daily-distprocentHistory"), None);
    }

    #[tokio::test]
    async fn test_reset_delta_diffs_live_against_window_baseline() {
        let platform = MemoryPlatform::new();
        let def = windowed_definition(vec![FunctionRequest::new(StatFunction::Delta)]);
        let mut group = group_on(&platform, &def, ValueKind::Numeric).await;

        let obs = numeric_at(100.0, 0);
        platform.set_stream_value("sensor-1", obs);
        group.observe(&platform, obs).await.unwrap();

        // first window only seeds the baseline
        group.reset_window(&platform).await.unwrap();
        assert_eq!(platform.slot("sensor-1-daily-deltaHistory"), None);
        assert_eq!(
            platform.slot("sensor-1-daily-deltaHistoryPrevTotal"),
            Some(json!(100.0))
        );

        let obs = numeric_at(175.0, 60);
        platform.set_stream_value("sensor-1", obs);
        group.observe(&platform, obs).await.unwrap();

        group.reset_window(&platform).await.unwrap();
        assert_eq!(
            platform.slot("sensor-1-daily-deltaHistory"),
            Some(json!(75.0))
        );
    }

    #[tokio::test]
    async fn test_count_continues_after_reset() {
        let platform = MemoryPlatform::new();
        let def = windowed_definition(vec![FunctionRequest::new(StatFunction::Count)]);
        let mut group = group_on(&platform, &def, ValueKind::Numeric).await;

        group.observe(&platform, at(0)).await.unwrap();
        group.observe(&platform, at(1)).await.unwrap();
        group.reset_window(&platform).await.unwrap();
        group.observe(&platform, at(2)).await.unwrap();

        assert_eq!(group.state().count, 1);
        assert_eq!(platform.slot("sensor-1-daily-countHistory"), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_declares_history_slots_only_when_windowed() {
        let platform = MemoryPlatform::new();
        platform.add_stream("sensor-1", ValueKind::Numeric);

        let plain = AggregateGroup::new(
            "sensor-1",
            &definition(vec![FunctionRequest::new(StatFunction::Count)]),
            ValueKind::Numeric,
        )
        .unwrap();
        plain.declare_slots(&platform).await.unwrap();
        assert!(platform.profile("sensor-1-daily-count").is_some());
        assert!(platform.profile("sensor-1-daily-countHistory").is_none());

        let windowed = AggregateGroup::new(
            "sensor-1",
            &windowed_definition(vec![FunctionRequest::new(StatFunction::Count)]),
            ValueKind::Numeric,
        )
        .unwrap();
        windowed.declare_slots(&platform).await.unwrap();
        assert!(platform.profile("sensor-1-daily-countHistory").is_some());
    }
}
