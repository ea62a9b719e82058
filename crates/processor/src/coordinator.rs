//! Stream coordinator: binds definitions to the event stream
//!
//! The coordinator owns every registered definition's aggregate groups
//! and routes external events to them: a value-changed event reaches
//! every group bound to that stream, a timer-fired event reaches the
//! one group whose reset boundary passed. Calls into a single group are
//! serialized through its own mutex; different groups never contend.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use statistician_types::{Observation, StatsDefinition};

use crate::config::EngineConfig;
use crate::error::{Result, ScheduleResult};
use crate::group::AggregateGroup;
use crate::scheduler::{GroupKey, ResetScheduler, TimerService};
use crate::slots::PlatformClient;

/// An external event delivered to the coordinator
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// The monitored stream reported a new value
    ValueChanged {
        stream: String,
        observation: Observation,
    },
    /// A reset timer for one group fired
    TimerFired { key: GroupKey },
}

/// Timer service that fires through the coordinator's event channel
///
/// Each registration spawns a task that sleeps for the delay and then
/// enqueues a [`StreamEvent::TimerFired`]. A fire whose receiver is
/// gone is dropped silently; a fire whose group was removed is dropped
/// by the dispatcher.
#[derive(Debug, Clone)]
pub struct ChannelTimers {
    tx: mpsc::Sender<StreamEvent>,
}

impl ChannelTimers {
    pub fn new(tx: mpsc::Sender<StreamEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait::async_trait]
impl TimerService for ChannelTimers {
    async fn register(&self, key: GroupKey, delay: Duration) -> ScheduleResult<()> {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(StreamEvent::TimerFired { key }).await.is_err() {
                debug!("event channel closed, dropping timer fire");
            }
        });
        Ok(())
    }
}

/// One group bound to the event stream, with its optional scheduler
struct BoundGroup {
    key: GroupKey,
    group: Mutex<AggregateGroup>,
    scheduler: Option<ResetScheduler>,
}

/// All groups registered for one stream
struct RegisteredStream {
    definition: String,
    groups: Vec<Arc<BoundGroup>>,
}

/// Routes external events to aggregate groups
pub struct StreamCoordinator<C, T> {
    client: Arc<C>,
    timers: Arc<T>,
    config: EngineConfig,
    registry: DashMap<String, RegisteredStream>,
}

impl<C, T> StreamCoordinator<C, T>
where
    C: PlatformClient,
    T: TimerService,
{
    pub fn new(client: Arc<C>, timers: Arc<T>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client,
            timers,
            config,
            registry: DashMap::new(),
        })
    }

    /// Register a definition, replacing any previous registration for
    /// the same stream
    ///
    /// The definition is validated up front — a duplicate group name
    /// fails the whole definition before anything is registered. After
    /// that, each group stands alone: a group whose slot declaration
    /// fails is logged and abandoned while the remaining groups
    /// continue. Groups with a reset period get their first timer armed
    /// here, retrying until registration succeeds.
    ///
    /// Returns the number of groups that came up.
    pub async fn register(&self, definition: &StatsDefinition) -> Result<usize> {
        let kind = self.client.stream_kind(&definition.asset).await?;
        definition.validate(kind)?;

        let mut bound = Vec::new();
        for group_def in &definition.groups {
            let anchor = group_def.anchor()?;
            let group = AggregateGroup::new(&definition.asset, group_def, kind)?;
            let key = group.key();

            if let Err(err) = group.declare_slots(self.client.as_ref()).await {
                error!(
                    key = %key,
                    definition = %definition.name,
                    error = %err,
                    "slot declaration failed, abandoning group"
                );
                continue;
            }

            let scheduler = group_def.reset.map(|period| {
                ResetScheduler::new(key.clone(), period, anchor, self.config.retry.clone())
            });
            if let Some(scheduler) = &scheduler {
                scheduler.arm(self.timers.as_ref()).await?;
            }

            bound.push(Arc::new(BoundGroup {
                key,
                group: Mutex::new(group),
                scheduler,
            }));
        }

        let registered = bound.len();
        info!(
            stream = %definition.asset,
            definition = %definition.name,
            groups = registered,
            "definition registered"
        );
        self.registry.insert(
            definition.asset.clone(),
            RegisteredStream {
                definition: definition.name.clone(),
                groups: bound,
            },
        );
        Ok(registered)
    }

    /// Discard every group registered for a stream
    ///
    /// Pending timers are not cancelled; their fires arrive for a key
    /// that no longer resolves and are dropped.
    pub fn remove(&self, stream: &str) -> bool {
        match self.registry.remove(stream) {
            Some((_, entry)) => {
                info!(
                    stream,
                    definition = %entry.definition,
                    groups = entry.groups.len(),
                    "definition removed"
                );
                true
            }
            None => false,
        }
    }

    /// Number of live groups for a stream
    pub fn group_count(&self, stream: &str) -> usize {
        self.registry
            .get(stream)
            .map(|entry| entry.groups.len())
            .unwrap_or(0)
    }

    /// Route one event to its groups
    ///
    /// Per-group failures are logged, not returned: one group's broken
    /// slot must not stall the others.
    pub async fn dispatch(&self, event: StreamEvent) -> Result<()> {
        match event {
            StreamEvent::ValueChanged {
                stream,
                observation,
            } => {
                let groups = self
                    .registry
                    .get(&stream)
                    .map(|entry| entry.groups.clone());
                let Some(groups) = groups else {
                    debug!(stream, "value change for unknown stream, ignored");
                    return Ok(());
                };

                for bound in groups {
                    let mut group = bound.group.lock().await;
                    if let Err(err) = group.observe(self.client.as_ref(), observation).await {
                        warn!(key = %bound.key, error = %err, "observe reported failures");
                    }
                }
                Ok(())
            }
            StreamEvent::TimerFired { key } => {
                let bound = self.registry.get(&key.stream).and_then(|entry| {
                    entry.groups.iter().find(|b| b.key == key).cloned()
                });
                let Some(bound) = bound else {
                    warn!(key = %key, "timer fired for removed group, dropped");
                    return Ok(());
                };

                // rearm before resetting so reset work never skews the cadence
                if let Some(scheduler) = &bound.scheduler {
                    scheduler.arm(self.timers.as_ref()).await?;
                }

                let mut group = bound.group.lock().await;
                if let Err(err) = group.reset_window(self.client.as_ref()).await {
                    warn!(key = %key, error = %err, "reset reported failures");
                }
                Ok(())
            }
        }
    }

    /// Drain the event channel until it closes
    pub async fn run(&self, mut events: mpsc::Receiver<StreamEvent>) {
        info!("stream coordinator running");
        while let Some(event) = events.recv().await {
            if let Err(err) = self.dispatch(event).await {
                error!(error = %err, "event dispatch failed");
            }
        }
        info!("event channel closed, stream coordinator stopping");
    }
}

impl<C: PlatformClient> StreamCoordinator<C, ChannelTimers> {
    /// Coordinator wired to its own event channel
    ///
    /// Timers registered by schedulers fire back into the returned
    /// receiver; feed value-changed events through the sender and drive
    /// everything with [`StreamCoordinator::run`].
    pub fn with_channel(
        client: Arc<C>,
        config: EngineConfig,
    ) -> Result<(
        Self,
        mpsc::Sender<StreamEvent>,
        mpsc::Receiver<StreamEvent>,
    )> {
        let (tx, rx) = mpsc::channel(config.event_buffer.max(1));
        let timers = Arc::new(ChannelTimers::new(tx.clone()));
        let coordinator = Self::new(client, timers, config)?;
        Ok((coordinator, tx, rx))
    }
}
