// sbdl-core/src/domain/envelope/wire.rs
//
// Wire shape: {"eventHeader": {...}, "keys": [...], "payload": {...}}

use serde::Serialize;

use crate::domain::envelope::cdc::PayloadObject;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHeader {
    pub event_identifier: String,
    pub event_type: String,
    pub major_schema_version: u32,
    pub minor_schema_version: u32,
    pub event_date_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyEntry {
    pub key_field: String,
    pub key_value: String,
}

/// Published unit for one entity. Only the builder constructs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    event_header: EventHeader,
    keys: Vec<KeyEntry>,
    payload: PayloadObject,
}

impl Envelope {
    pub(crate) fn new(event_header: EventHeader, key: KeyEntry, payload: PayloadObject) -> Self {
        Self {
            event_header,
            keys: vec![key],
            payload,
        }
    }

    pub fn header(&self) -> &EventHeader {
        &self.event_header
    }

    pub fn keys(&self) -> &[KeyEntry] {
        &self.keys
    }

    pub fn payload(&self) -> &PayloadObject {
        &self.payload
    }

    /// Value of the key entry named `key_field`, if any.
    pub fn key_value(&self, key_field: &str) -> Option<&str> {
        self.keys
            .iter()
            .find(|k| k.key_field == key_field)
            .map(|k| k.key_value.as_str())
    }

    /// Canonical compact encoding sent to the broker.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
