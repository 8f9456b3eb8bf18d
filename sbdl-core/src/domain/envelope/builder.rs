// sbdl-core/src/domain/envelope/builder.rs

use chrono::SecondsFormat;
use std::sync::Arc;

use crate::domain::envelope::cdc::PayloadObject;
use crate::domain::envelope::wire::{Envelope, EventHeader, KeyEntry};
use crate::domain::error::DomainError;
use crate::domain::ports::{Clock, EventIdSource, RandomEventIds, SystemClock};

/// An entity family that can be published as an envelope.
/// Each family brings its own event type, key field and schema version.
pub trait EventEntity {
    const EVENT_TYPE: &'static str;
    const KEY_FIELD: &'static str;
    /// Bump on any payload shape change.
    const MAJOR_SCHEMA_VERSION: u32;
    const MINOR_SCHEMA_VERSION: u32;

    fn key_value(&self) -> &str;

    fn to_payload(&self) -> Result<PayloadObject, DomainError>;
}

/// Maps entities to envelopes. Holds no mutable state; one instance can be
/// shared by any number of workers.
#[derive(Clone)]
pub struct EnvelopeBuilder {
    clock: Arc<dyn Clock>,
    ids: Arc<dyn EventIdSource>,
}

impl Default for EnvelopeBuilder {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock), Arc::new(RandomEventIds))
    }
}

impl EnvelopeBuilder {
    pub fn new(clock: Arc<dyn Clock>, ids: Arc<dyn EventIdSource>) -> Self {
        Self { clock, ids }
    }

    pub fn build<E: EventEntity>(&self, entity: &E) -> Result<Envelope, DomainError> {
        let key_value = entity.key_value().trim();
        if key_value.is_empty() {
            return Err(DomainError::EmptyContractIdentifier);
        }

        let payload = entity.to_payload()?;

        let header = EventHeader {
            event_identifier: self.ids.next_id(),
            event_type: E::EVENT_TYPE.to_string(),
            major_schema_version: E::MAJOR_SCHEMA_VERSION,
            minor_schema_version: E::MINOR_SCHEMA_VERSION,
            // Captured per envelope, e.g. 2024-05-01T09:12:44.913+00:00
            event_date_time: self
                .clock
                .now()
                .to_rfc3339_opts(SecondsFormat::Millis, false),
        };

        let key = KeyEntry {
            key_field: E::KEY_FIELD.to_string(),
            key_value: key_value.to_string(),
        };

        Ok(Envelope::new(header, key, payload))
    }
}
