//! Event fan-out to external observers.
//!
//! The simulator publishes every [`SimEvent`] to an [`EventBus`], which
//! keeps the full event log and forwards each event to the subscribed
//! [`SimObserver`]s in subscription order.

use parley_types::{AgentId, SimEvent, SimEventKind};
use tracing::{debug, info};

/// Something that wants to hear about simulation events.
pub trait SimObserver {
    /// Called once per published event.
    fn notify(&mut self, event: &SimEvent);
}

/// Writes every event to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SimObserver for TracingObserver {
    fn notify(&mut self, event: &SimEvent) {
        match &event.kind {
            SimEventKind::Hint { agent, text } => {
                info!(time_step = event.time_step, agent_id = %agent, %text, "Hint");
            }
            SimEventKind::Collision { agents } => {
                info!(time_step = event.time_step, ?agents, "Collision");
            }
            SimEventKind::CommunicationCut { undelivered } => {
                info!(time_step = event.time_step, undelivered, "Communication cut short");
            }
            kind => {
                debug!(time_step = event.time_step, ?kind, "Simulation event");
            }
        }
    }
}

/// Keeps the event log and forwards events to subscribers.
#[derive(Default)]
pub struct EventBus {
    history: Vec<SimEvent>,
    observers: Vec<Box<dyn SimObserver>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("events", &self.history.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl EventBus {
    /// Create a bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer for all future events.
    pub fn subscribe(&mut self, observer: Box<dyn SimObserver>) {
        self.observers.push(observer);
    }

    /// Number of subscribed observers.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Record `event` and deliver it to every observer. Returns the
    /// number of observers notified.
    pub fn publish(&mut self, event: SimEvent) -> usize {
        for observer in &mut self.observers {
            observer.notify(&event);
        }
        self.history.push(event);
        self.observers.len()
    }

    /// Every event published so far, oldest first.
    pub fn events(&self) -> &[SimEvent] {
        &self.history
    }

    /// Net score change per agent over the whole log.
    pub fn score_of(&self, agent: AgentId) -> i64 {
        self.history
            .iter()
            .filter_map(|event| match event.kind {
                SimEventKind::ScoreChanged { agent: a, delta } if a == agent => {
                    Some(i64::from(delta))
                }
                _ => None,
            })
            .fold(0_i64, i64::saturating_add)
    }

    /// Export the event log as a JSON array.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if an event cannot be encoded.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.history)
    }
}
