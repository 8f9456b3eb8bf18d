// sbdl-core/src/application/publisher.rs
//
// Livraison at-least-once des enveloppes :
// - fenêtre d'admission bornée (max_in_flight envois non acquittés),
// - retry exponentiel sur erreurs transitoires,
// - ledger en mémoire pour le rapport de fin de run.

use futures::stream::{FuturesUnordered, StreamExt};
use miette::Diagnostic;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::application::cancel::CancelSignal;
use crate::application::retry::RetryPolicy;
use crate::domain::envelope::Envelope;
use crate::domain::project::{ProjectConfig, PublisherSettings};
use crate::ports::broker::{BrokerError, BrokerRecord, DeliveryAck, MessageBroker};

#[derive(Error, Debug, Diagnostic)]
pub enum PublishError {
    #[error("Broker '{broker}' unreachable: {source}")]
    #[diagnostic(
        code(sbdl::publish::broker_unreachable),
        help("The run was aborted. Envelopes already acknowledged stay published.")
    )]
    BrokerUnreachable {
        broker: String,
        #[source]
        source: BrokerError,
        /// Ledger settled up to the failure, everything else marked incomplete.
        outcome: Box<PublishOutcome>,
    },
}

impl PublishError {
    pub fn outcome(&self) -> &PublishOutcome {
        match self {
            Self::BrokerUnreachable { outcome, .. } => outcome,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub topic: String,
    /// Key entry whose value becomes the broker partition key.
    pub key_field: String,
    pub max_in_flight: usize,
    pub retry: RetryPolicy,
    pub drain_on_cancel: bool,
}

impl PublisherConfig {
    pub fn new(topic: impl Into<String>) -> Self {
        let defaults = PublisherSettings::default();
        Self {
            topic: topic.into(),
            key_field: "contractIdentifier".to_string(),
            max_in_flight: defaults.max_in_flight,
            retry: RetryPolicy::from_settings(&defaults),
            drain_on_cancel: defaults.drain_on_cancel,
        }
    }

    pub fn from_project(config: &ProjectConfig) -> Self {
        Self {
            topic: config.broker.topic.clone(),
            key_field: config.broker.partition_key_field.clone(),
            max_in_flight: config.publisher.max_in_flight.max(1),
            retry: RetryPolicy::from_settings(&config.publisher),
            drain_on_cancel: config.publisher.drain_on_cancel,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDelivery {
    pub contract_identifier: String,
    pub reason: String,
    pub attempts: u32,
}

/// Delivery ledger of one publish call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    pub succeeded: usize,
    pub failed: Vec<FailedDelivery>,
    /// Never acknowledged because the run was cancelled or aborted, in admission order.
    pub incomplete: Vec<String>,
    /// Extra attempts beyond the first, summed over all records.
    pub retries: u32,
    pub cancelled: bool,
    /// Stopped by a systemic broker failure.
    pub aborted: bool,
}

impl PublishOutcome {
    pub fn considered(&self) -> usize {
        self.succeeded + self.failed.len() + self.incomplete.len()
    }
}

struct Delivery {
    seq: u64,
    contract_identifier: String,
    attempts: u32,
    result: Result<DeliveryAck, BrokerError>,
}

pub struct Publisher {
    broker: Arc<dyn MessageBroker>,
    config: PublisherConfig,
}

impl Publisher {
    pub fn new(broker: Arc<dyn MessageBroker>, config: PublisherConfig) -> Self {
        Self { broker, config }
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Delivers every envelope yielded by `envelopes`.
    ///
    /// Per-record failures land in the outcome; only a systemic broker failure
    /// returns `Err`, carrying the partial ledger. The source is pulled lazily: at most `max_in_flight`
    /// envelopes are waiting for an acknowledgment at any time.
    #[instrument(skip_all, fields(topic = %self.config.topic, broker = self.broker.broker_name()))]
    pub async fn publish<I>(
        &self,
        envelopes: I,
        cancel: &CancelSignal,
    ) -> Result<PublishOutcome, PublishError>
    where
        I: IntoIterator<Item = Envelope>,
    {
        let mut source = envelopes.into_iter().fuse();
        let mut in_flight = FuturesUnordered::new();
        let mut pending: BTreeMap<u64, String> = BTreeMap::new();
        let mut outcome = PublishOutcome::default();
        let mut next_seq = 0u64;
        let window = self.config.max_in_flight.max(1);
        let mut systemic: Option<BrokerError> = None;

        loop {
            // 1. Admission tant que la fenêtre a de la place
            while !outcome.cancelled && in_flight.len() < window {
                if cancel.is_cancelled() {
                    outcome.cancelled = true;
                    break;
                }
                let Some(envelope) = source.next() else {
                    break;
                };
                match self.to_record(&envelope) {
                    Ok((contract_identifier, record)) => {
                        pending.insert(next_seq, contract_identifier.clone());
                        in_flight.push(self.deliver(next_seq, contract_identifier, record));
                        next_seq += 1;
                    }
                    Err(failure) => {
                        error!(contract = %failure.contract_identifier, "❌ {}", failure.reason);
                        outcome.failed.push(failure);
                    }
                }
            }

            if in_flight.is_empty() {
                break;
            }
            if outcome.cancelled && !self.config.drain_on_cancel {
                warn!(in_flight = in_flight.len(), "Cancelled, aborting in-flight sends");
                break;
            }

            // 2. Attente d'un acquittement (ou de l'annulation)
            tokio::select! {
                Some(delivery) = in_flight.next() => {
                    if let Err(err) = self.settle(delivery, &mut pending, &mut outcome) {
                        error!(error = %err, in_flight = in_flight.len(), "💥 Broker unreachable, aborting publication");
                        systemic = Some(err);
                        break;
                    }
                }
                _ = cancel.cancelled(), if !outcome.cancelled => {
                    info!("🛑 Cancellation requested, no more envelopes admitted");
                    outcome.cancelled = true;
                }
                else => break,
            }
        }
        drop(in_flight);

        // Ni acquitté ni échoué : rien n'est perdu en silence
        if outcome.cancelled || systemic.is_some() {
            outcome.incomplete.extend(pending.into_values());
            outcome
                .incomplete
                .extend(source.map(|e| self.contract_identifier(&e)));
        }

        if let Some(err) = systemic {
            return Err(self.unreachable(err, outcome));
        }

        if let Err(err) = self.broker.flush().await {
            if err.is_systemic() {
                return Err(self.unreachable(err, outcome));
            }
            warn!(error = %err, "Broker flush failed");
        }

        info!(
            succeeded = outcome.succeeded,
            failed = outcome.failed.len(),
            incomplete = outcome.incomplete.len(),
            retries = outcome.retries,
            "Publication finished"
        );
        Ok(outcome)
    }

    fn contract_identifier(&self, envelope: &Envelope) -> String {
        envelope
            .key_value(&self.config.key_field)
            .or_else(|| envelope.keys().first().map(|k| k.key_value.as_str()))
            .unwrap_or(envelope.header().event_identifier.as_str())
            .to_string()
    }

    fn to_record(&self, envelope: &Envelope) -> Result<(String, BrokerRecord), FailedDelivery> {
        let contract_identifier = self.contract_identifier(envelope);
        let fail = |reason: String| FailedDelivery {
            contract_identifier: contract_identifier.clone(),
            reason,
            attempts: 0,
        };

        let key = envelope.key_value(&self.config.key_field).ok_or_else(|| {
            fail(format!(
                "envelope has no key entry '{}'",
                self.config.key_field
            ))
        })?;
        let payload = envelope
            .to_json()
            .map_err(|e| fail(format!("serialization failed: {}", e)))?;

        let record = BrokerRecord {
            topic: self.config.topic.clone(),
            key: key.to_string(),
            payload,
        };
        Ok((contract_identifier, record))
    }

    async fn deliver(&self, seq: u64, contract_identifier: String, record: BrokerRecord) -> Delivery {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.broker.send(record.clone()).await {
                Ok(ack) => {
                    return Delivery {
                        seq,
                        contract_identifier,
                        attempts,
                        result: Ok(ack),
                    };
                }
                Err(err) if self.config.retry.should_retry(&err, attempts) => {
                    let pause = self.config.retry.backoff(attempts);
                    warn!(
                        contract = %contract_identifier,
                        attempt = attempts,
                        backoff_ms = pause.as_millis() as u64,
                        error = %err,
                        "Transient delivery error, retrying"
                    );
                    tokio::time::sleep(pause).await;
                }
                Err(err) => {
                    return Delivery {
                        seq,
                        contract_identifier,
                        attempts,
                        result: Err(err),
                    };
                }
            }
        }
    }

    /// Records one finished delivery. A systemic error is handed back and the
    /// record stays pending.
    fn settle(
        &self,
        delivery: Delivery,
        pending: &mut BTreeMap<u64, String>,
        outcome: &mut PublishOutcome,
    ) -> Result<(), BrokerError> {
        outcome.retries += delivery.attempts.saturating_sub(1);

        match delivery.result {
            Err(err) if err.is_systemic() => Err(err),
            Ok(ack) => {
                pending.remove(&delivery.seq);
                debug!(
                    contract = %delivery.contract_identifier,
                    partition = ack.partition,
                    offset = ack.offset,
                    "Acknowledged"
                );
                outcome.succeeded += 1;
                Ok(())
            }
            Err(err) => {
                pending.remove(&delivery.seq);
                error!(
                    contract = %delivery.contract_identifier,
                    attempts = delivery.attempts,
                    error = %err,
                    "❌ Delivery failed"
                );
                outcome.failed.push(FailedDelivery {
                    contract_identifier: delivery.contract_identifier,
                    reason: err.to_string(),
                    attempts: delivery.attempts,
                });
                Ok(())
            }
        }
    }

    fn unreachable(&self, source: BrokerError, mut outcome: PublishOutcome) -> PublishError {
        outcome.aborted = true;
        PublishError::BrokerUnreachable {
            broker: self.broker.broker_name().to_string(),
            source,
            outcome: Box::new(outcome),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::application::cancel::cancellation;
    use crate::domain::envelope::EnvelopeBuilder;
    use crate::domain::join::JoinAggregateEngine;
    use crate::domain::model::{AccountRecord, PartitionInput};
    use crate::infrastructure::adapters::InMemoryBroker;
    use anyhow::Result;
    use std::time::Duration;

    const TOPIC: &str = "sbdl_kafka_cloud";

    fn envelopes(ids: &[&str]) -> Vec<Envelope> {
        let mut input = PartitionInput::default();
        for id in ids {
            input.accounts.push(AccountRecord::new(
                *id,
                "COH",
                "2018-03-24T13:56:45.000+05:30",
            ));
        }
        let (aggregates, _) = JoinAggregateEngine::default().aggregate(&input);
        let builder = EnvelopeBuilder::default();
        aggregates
            .iter()
            .map(|a| builder.build(a).expect("valid aggregate"))
            .collect()
    }

    fn fast_config() -> PublisherConfig {
        PublisherConfig {
            retry: RetryPolicy::new(
                3,
                Duration::from_millis(1),
                Duration::from_millis(5),
                2.0,
            ),
            ..PublisherConfig::new(TOPIC)
        }
    }

    #[tokio::test]
    async fn test_every_envelope_published_with_contract_key() -> Result<()> {
        let broker = Arc::new(InMemoryBroker::new(6));
        let publisher = Publisher::new(broker.clone(), fast_config());

        let outcome = publisher
            .publish(envelopes(&["A", "B", "C"]), &CancelSignal::never())
            .await?;

        assert_eq!(outcome.succeeded, 3);
        assert!(outcome.failed.is_empty());
        assert_eq!(outcome.retries, 0);

        let mut keys: Vec<String> = broker.records(TOPIC).into_iter().map(|r| r.key).collect();
        keys.sort();
        assert_eq!(keys, vec!["A", "B", "C"]);
        assert_eq!(broker.flush_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_transient_twice_then_success_counts_two_retries() -> Result<()> {
        let broker = Arc::new(InMemoryBroker::new(1));
        broker.fail_next(
            "A",
            [
                BrokerError::Timeout,
                BrokerError::LeaderNotAvailable(TOPIC.into()),
            ],
        );
        let publisher = Publisher::new(broker.clone(), fast_config());

        let outcome = publisher
            .publish(envelopes(&["A"]), &CancelSignal::never())
            .await?;

        assert_eq!(outcome.succeeded, 1);
        assert_eq!(outcome.retries, 2);
        assert_eq!(broker.attempts("A"), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_one_record_only() -> Result<()> {
        let broker = Arc::new(InMemoryBroker::new(1));
        broker.fail_next("B", std::iter::repeat_n(BrokerError::QueueFull, 10));
        let publisher = Publisher::new(broker.clone(), fast_config());

        let outcome = publisher
            .publish(envelopes(&["A", "B", "C"]), &CancelSignal::never())
            .await?;

        assert_eq!(outcome.succeeded, 2);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].contract_identifier, "B");
        assert_eq!(outcome.failed[0].attempts, 3);
        assert_eq!(broker.attempts("B"), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_permanent_rejection_not_retried_and_batch_continues() -> Result<()> {
        let broker = Arc::new(InMemoryBroker::new(1));
        broker.fail_always("A", BrokerError::Rejected("message too large".into()));
        let publisher = Publisher::new(broker.clone(), fast_config());

        let outcome = publisher
            .publish(envelopes(&["A", "B"]), &CancelSignal::never())
            .await?;

        assert_eq!(outcome.succeeded, 1);
        assert_eq!(outcome.failed[0].attempts, 1);
        assert_eq!(outcome.retries, 0);
        assert_eq!(broker.attempts("A"), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_unreachable_broker_aborts() -> Result<()> {
        let broker = Arc::new(InMemoryBroker::new(1));
        broker.take_down("connection refused");
        let publisher = Publisher::new(broker.clone(), fast_config());

        let err = publisher
            .publish(envelopes(&["A", "B"]), &CancelSignal::never())
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::BrokerUnreachable { .. }));
        // Pas de retry sur une panne systémique
        assert_eq!(broker.attempts("A"), 1);
        assert!(err.outcome().aborted);
        assert_eq!(err.outcome().incomplete, vec!["A", "B"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_unreachable_mid_batch_keeps_settled_ledger() -> Result<()> {
        let broker = Arc::new(InMemoryBroker::new(1));
        broker.fail_next("B", [BrokerError::QueueFull]);
        broker.fail_always("C", BrokerError::Unreachable("connection reset".into()));
        let config = PublisherConfig {
            max_in_flight: 1,
            ..fast_config()
        };
        let publisher = Publisher::new(broker.clone(), config);

        let err = publisher
            .publish(envelopes(&["A", "B", "C", "D"]), &CancelSignal::never())
            .await
            .unwrap_err();

        let outcome = err.outcome();
        assert!(outcome.aborted);
        assert_eq!(outcome.succeeded, 2);
        assert_eq!(outcome.retries, 1);
        assert_eq!(outcome.incomplete, vec!["C", "D"]);
        assert_eq!(outcome.considered(), 4);
        assert_eq!(broker.attempts("D"), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_key_field_is_a_record_failure() -> Result<()> {
        let broker = Arc::new(InMemoryBroker::new(1));
        let config = PublisherConfig {
            key_field: "accountNumber".to_string(),
            ..fast_config()
        };
        let publisher = Publisher::new(broker.clone(), config);

        let outcome = publisher
            .publish(envelopes(&["A"]), &CancelSignal::never())
            .await?;

        assert_eq!(outcome.succeeded, 0);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].contract_identifier, "A");
        assert_eq!(broker.delivered_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_in_flight_window_is_respected() -> Result<()> {
        let broker = Arc::new(InMemoryBroker::new(3).with_latency(Duration::from_millis(5)));
        let config = PublisherConfig {
            max_in_flight: 3,
            ..fast_config()
        };
        let publisher = Publisher::new(broker.clone(), config);

        let ids: Vec<String> = (0..12).map(|i| format!("C{:02}", i)).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let outcome = publisher
            .publish(envelopes(&refs), &CancelSignal::never())
            .await?;

        assert_eq!(outcome.succeeded, 12);
        assert_eq!(broker.peak_in_flight(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_before_start_marks_everything_incomplete() -> Result<()> {
        let broker = Arc::new(InMemoryBroker::new(1));
        let publisher = Publisher::new(broker.clone(), fast_config());
        let (handle, signal) = cancellation();
        handle.cancel();

        let outcome = publisher.publish(envelopes(&["A", "B", "C"]), &signal).await?;

        assert!(outcome.cancelled);
        assert_eq!(outcome.succeeded, 0);
        assert_eq!(outcome.incomplete, vec!["A", "B", "C"]);
        assert_eq!(outcome.considered(), 3);
        assert_eq!(broker.delivered_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_with_drain_finishes_in_flight_sends() -> Result<()> {
        let broker = Arc::new(InMemoryBroker::new(1).with_latency(Duration::from_millis(50)));
        let config = PublisherConfig {
            max_in_flight: 2,
            drain_on_cancel: true,
            ..fast_config()
        };
        let publisher = Publisher::new(broker.clone(), config);
        let (handle, signal) = cancellation();

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.cancel();
        });
        let outcome = publisher
            .publish(envelopes(&["A", "B", "C", "D", "E"]), &signal)
            .await?;
        canceller.await?;

        assert!(outcome.cancelled);
        assert_eq!(outcome.succeeded, 2);
        assert_eq!(outcome.incomplete, vec!["C", "D", "E"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_without_drain_aborts_in_flight_sends() -> Result<()> {
        let broker = Arc::new(InMemoryBroker::new(1).with_latency(Duration::from_millis(200)));
        let config = PublisherConfig {
            max_in_flight: 2,
            drain_on_cancel: false,
            ..fast_config()
        };
        let publisher = Publisher::new(broker.clone(), config);
        let (handle, signal) = cancellation();

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.cancel();
        });
        let outcome = publisher
            .publish(envelopes(&["A", "B", "C"]), &signal)
            .await?;
        canceller.await?;

        assert!(outcome.cancelled);
        assert_eq!(outcome.succeeded, 0);
        assert_eq!(outcome.incomplete, vec!["A", "B", "C"]);
        assert_eq!(broker.delivered_count(), 0);
        Ok(())
    }
}
