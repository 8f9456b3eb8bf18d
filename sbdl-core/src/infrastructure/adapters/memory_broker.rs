// sbdl-core/src/infrastructure/adapters/memory_broker.rs
//
// Broker en mémoire : un log par (topic, partition), plus de quoi scénariser
// des pannes (erreurs transitoires, rejets, cluster injoignable) dans les tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::partitioner::partition_for;
use crate::ports::broker::{BrokerError, BrokerRecord, DeliveryAck, MessageBroker};

#[derive(Default)]
struct BrokerState {
    logs: HashMap<(String, u32), Vec<BrokerRecord>>,
    scripted: HashMap<String, VecDeque<BrokerError>>,
    always: HashMap<String, BrokerError>,
    down: Option<String>,
    attempts: HashMap<String, u32>,
}

pub struct InMemoryBroker {
    partitions: u32,
    latency: Duration,
    state: Mutex<BrokerState>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    flushes: AtomicUsize,
}

/// Decrements the in-flight gauge even when the send future is dropped mid-way.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl InMemoryBroker {
    pub fn new(partitions: u32) -> Self {
        Self {
            partitions: partitions.max(1),
            latency: Duration::ZERO,
            state: Mutex::new(BrokerState::default()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            flushes: AtomicUsize::new(0),
        }
    }

    /// Every send waits this long before being acknowledged.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn state(&self) -> MutexGuard<'_, BrokerState> {
        // Un test qui panique ne doit pas empoisonner les assertions suivantes
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The next sends for `key` fail with these errors, in order.
    pub fn fail_next<I>(&self, key: &str, errors: I)
    where
        I: IntoIterator<Item = BrokerError>,
    {
        self.state()
            .scripted
            .entry(key.to_string())
            .or_default()
            .extend(errors);
    }

    /// Every send for `key` fails with `error`.
    pub fn fail_always(&self, key: &str, error: BrokerError) {
        self.state().always.insert(key.to_string(), error);
    }

    /// The whole cluster becomes unreachable.
    pub fn take_down(&self, reason: &str) {
        self.state().down = Some(reason.to_string());
    }

    /// Send attempts seen for `key`, successful or not.
    pub fn attempts(&self, key: &str) -> u32 {
        self.state().attempts.get(key).copied().unwrap_or(0)
    }

    /// Acknowledged records of `topic`, partition by partition.
    pub fn records(&self, topic: &str) -> Vec<BrokerRecord> {
        let state = self.state();
        (0..self.partitions)
            .filter_map(|p| state.logs.get(&(topic.to_string(), p)))
            .flatten()
            .cloned()
            .collect()
    }

    pub fn partition_log(&self, topic: &str, partition: u32) -> Vec<BrokerRecord> {
        self.state()
            .logs
            .get(&(topic.to_string(), partition))
            .cloned()
            .unwrap_or_default()
    }

    pub fn delivered_count(&self) -> usize {
        self.state().logs.values().map(Vec::len).sum()
    }

    /// Highest number of sends that were awaiting an acknowledgment at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn send(&self, record: BrokerRecord) -> Result<DeliveryAck, BrokerError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut state = self.state();
        *state.attempts.entry(record.key.clone()).or_insert(0) += 1;

        if let Some(reason) = &state.down {
            return Err(BrokerError::Unreachable(reason.clone()));
        }
        if let Some(err) = state
            .scripted
            .get_mut(&record.key)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        if let Some(err) = state.always.get(&record.key) {
            return Err(err.clone());
        }

        let partition = partition_for(&record.key, self.partitions);
        let log = state
            .logs
            .entry((record.topic.clone(), partition))
            .or_default();
        log.push(record);

        Ok(DeliveryAck {
            partition,
            offset: (log.len() - 1) as u64,
        })
    }

    async fn flush(&self) -> Result<(), BrokerError> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        match &self.state().down {
            Some(reason) => Err(BrokerError::Unreachable(reason.clone())),
            None => Ok(()),
        }
    }

    fn broker_name(&self) -> &str {
        "memory"
    }
}
