// sbdl-core/src/domain/envelope/contract.rs
//
// The SBDL-Contract entity family: ContractAggregate -> payload.

use chrono::{DateTime, SecondsFormat};
use std::collections::HashSet;

use crate::domain::envelope::builder::EventEntity;
use crate::domain::envelope::cdc::{FieldValue, PayloadObject};
use crate::domain::error::DomainError;
use crate::domain::model::{ContractAggregate, PartyAddress, PartyRelation};

/// Re-renders an RFC 3339 timestamp with millisecond precision, keeping its offset.
fn normalize_timestamp(field: &'static str, value: &str) -> Result<String, DomainError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, false))
        .map_err(|_| DomainError::InvalidTimestamp {
            field,
            value: value.to_string(),
        })
}

fn address_value(address: &PartyAddress) -> FieldValue {
    let mut fields = vec![(
        "addressLine1",
        FieldValue::text(&address.address_line1),
    )];
    if let Some(line2) = &address.address_line2 {
        fields.push(("addressLine2", FieldValue::text(line2)));
    }
    fields.push(("addressCity", FieldValue::text(&address.address_city)));
    if let Some(postal) = &address.postal_code {
        fields.push(("addressPostalCode", FieldValue::text(postal)));
    }
    fields.push(("addressCountry", FieldValue::text(&address.address_country)));
    if let Some(start) = &address.address_start_date {
        fields.push(("addressStartDate", FieldValue::text(start)));
    }
    FieldValue::Struct(fields)
}

fn relation_record(relation: &PartyRelation) -> Result<PayloadObject, DomainError> {
    let start = relation
        .relation_start_date_time
        .as_deref()
        .map(|ts| normalize_timestamp("partyRelationStartDateTime", ts))
        .transpose()?;

    let mut record = PayloadObject::new();
    record
        .insert_text("partyIdentifier", &relation.party_identifier)?
        .insert_text("partyRelationshipType", &relation.relationship_type)?
        .insert_optional("partyRelationStartDateTime", start.map(FieldValue::Text))?
        .insert_optional("partyAddress", relation.address.as_ref().map(address_value))?;
    Ok(record)
}

impl EventEntity for ContractAggregate {
    const EVENT_TYPE: &'static str = "SBDL-Contract";
    const KEY_FIELD: &'static str = "contractIdentifier";
    const MAJOR_SCHEMA_VERSION: u32 = 1;
    const MINOR_SCHEMA_VERSION: u32 = 0;

    fn key_value(&self) -> &str {
        &self.contract_identifier
    }

    fn to_payload(&self) -> Result<PayloadObject, DomainError> {
        let titles = self
            .title_lines
            .iter()
            .map(|t| {
                FieldValue::Struct(vec![
                    ("contractTitleLineType", FieldValue::text(&t.line_type)),
                    ("contractTitleLine", FieldValue::text(&t.line)),
                ])
            })
            .collect();

        let tax = self.tax_identifier.as_ref().map(|tax| {
            FieldValue::Struct(vec![
                ("taxIdType", FieldValue::text(&tax.tax_id_type)),
                ("taxId", FieldValue::text(&tax.tax_id)),
            ])
        });

        let mut seen = HashSet::new();
        let mut relations = Vec::with_capacity(self.party_relations.len());
        for relation in &self.party_relations {
            if !seen.insert(relation.party_identifier.as_str()) {
                return Err(DomainError::DuplicatePartyRelation {
                    contract_id: self.contract_identifier.clone(),
                    party_id: relation.party_identifier.clone(),
                });
            }
            relations.push(relation_record(relation)?);
        }

        let mut payload = PayloadObject::new();
        payload
            .insert_text("contractIdentifier", self.contract_identifier.trim())?
            .insert_text("sourceSystemIdentifier", &self.source_system_id)?
            .insert_text(
                "contractStartDateTime",
                normalize_timestamp("contractStartDateTime", &self.start_date_time)?,
            )?
            .insert_change("contractTitle", FieldValue::List(titles))?
            .insert_optional("taxIdentifier", tax)?
            .insert_optional("contractBranchCode", self.branch_code.clone().map(FieldValue::Text))?
            .insert_optional("contractCountry", self.country.clone().map(FieldValue::Text))?
            .insert_records("partyRelations", relations);
        Ok(payload)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::envelope::builder::EnvelopeBuilder;
    use crate::domain::join::JoinAggregateEngine;
    use crate::domain::model::{AccountRecord, AddressRecord, PartitionInput, PartyRecord};
    use crate::domain::ports::{Clock, EventIdSource};
    use anyhow::{Context, Result};
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::Value;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    struct FixedId(&'static str);

    impl EventIdSource for FixedId {
        fn next_id(&self) -> String {
            self.0.to_string()
        }
    }

    /// Advances one millisecond per call.
    struct SteppingClock(AtomicU64);

    impl Clock for SteppingClock {
        fn now(&self) -> DateTime<Utc> {
            let step = self.0.fetch_add(1, Ordering::SeqCst);
            Utc.timestamp_millis_opt(1_700_000_000_000 + step as i64)
                .single()
                .unwrap_or_default()
        }
    }

    fn pinned_builder() -> EnvelopeBuilder {
        let clock = Utc.with_ymd_and_hms(2022, 8, 2, 10, 0, 0).single().unwrap();
        EnvelopeBuilder::new(
            Arc::new(FixedClock(clock)),
            Arc::new(FixedId("00000000-0000-4000-8000-000000000000")),
        )
    }

    fn scenario_input() -> PartitionInput {
        PartitionInput {
            load_date: None,
            accounts: vec![
                AccountRecord::new("6982391060", "COH", "2018-03-24T13:56:45.000+05:30")
                    .with_title("lgl_ttl_ln_2", "Matthew Davies")
                    .with_title("lgl_ttl_ln_1", "Tiffany Riley"),
            ],
            parties: vec![PartyRecord::new("9823462810", "6982391060", "F-N")],
            addresses: vec![AddressRecord::new(
                "9823462810",
                "45229 Drake Route",
                "Shanefort",
                "Canada",
            )],
        }
    }

    fn envelope_json(input: &PartitionInput, builder: &EnvelopeBuilder) -> Result<Vec<Value>> {
        let (aggregates, _) = JoinAggregateEngine::default().aggregate(input);
        aggregates
            .iter()
            .map(|a| -> Result<Value> { Ok(serde_json::to_value(builder.build(a)?)?) })
            .collect()
    }

    fn walk(value: &Value, visit: &mut dyn FnMut(&serde_json::Map<String, Value>)) {
        match value {
            Value::Object(map) => {
                visit(map);
                map.values().for_each(|v| walk(v, visit));
            }
            Value::Array(items) => items.iter().for_each(|v| walk(v, visit)),
            _ => {}
        }
    }

    #[test]
    fn test_scenario_contract_6982391060() -> Result<()> {
        let envelopes = envelope_json(&scenario_input(), &EnvelopeBuilder::default())?;
        let env = envelopes.first().context("no envelope")?;

        assert_eq!(
            env["keys"],
            serde_json::json!([{"keyField": "contractIdentifier", "keyValue": "6982391060"}])
        );
        assert_eq!(env["eventHeader"]["eventType"], "SBDL-Contract");
        assert_eq!(env["eventHeader"]["majorSchemaVersion"], 1);
        assert_eq!(env["eventHeader"]["minorSchemaVersion"], 0);
        assert_eq!(
            env["payload"]["contractTitle"]["newValue"],
            serde_json::json!([
                {"contractTitleLineType": "lgl_ttl_ln_1", "contractTitleLine": "Tiffany Riley"},
                {"contractTitleLineType": "lgl_ttl_ln_2", "contractTitleLine": "Matthew Davies"}
            ])
        );
        assert_eq!(
            env["payload"]["contractStartDateTime"]["newValue"],
            "2018-03-24T13:56:45.000+05:30"
        );

        let relations = env["payload"]["partyRelations"]
            .as_array()
            .context("partyRelations not an array")?;
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0]["partyIdentifier"]["newValue"], "9823462810");
        assert_eq!(relations[0]["partyRelationshipType"]["newValue"], "F-N");
        assert_eq!(
            relations[0]["partyAddress"],
            serde_json::json!({
                "operation": "INSERT",
                "newValue": {
                    "addressLine1": "45229 Drake Route",
                    "addressCity": "Shanefort",
                    "addressCountry": "Canada"
                }
            })
        );
        Ok(())
    }

    #[test]
    fn test_missing_address_omits_party_address_key() -> Result<()> {
        let mut input = scenario_input();
        input.addresses.clear();
        let envelopes = envelope_json(&input, &EnvelopeBuilder::default())?;

        let relation = &envelopes[0]["payload"]["partyRelations"][0];
        let object = relation.as_object().context("relation not an object")?;
        assert!(!object.contains_key("partyAddress"));
        assert!(object.contains_key("partyIdentifier"));
        Ok(())
    }

    #[test]
    fn test_contract_only_account_has_empty_relations_array() -> Result<()> {
        let mut input = scenario_input();
        input.parties.clear();
        let envelopes = envelope_json(&input, &EnvelopeBuilder::default())?;

        assert_eq!(
            envelopes[0]["payload"]["partyRelations"],
            serde_json::json!([])
        );
        Ok(())
    }

    #[test]
    fn test_every_leaf_is_insert_without_old_value() -> Result<()> {
        let mut input = scenario_input();
        input.accounts[0].branch_code = Some("ACXMGBA5".into());
        input.parties.push(PartyRecord::new("9823462811", "6982391060", "F-S"));
        let envelopes = envelope_json(&input, &EnvelopeBuilder::default())?;

        let mut triplets = 0;
        walk(&envelopes[0]["payload"], &mut |map| {
            assert!(!map.contains_key("oldValue"), "oldValue leaked: {:?}", map);
            if let Some(op) = map.get("operation") {
                assert_eq!(op, "INSERT");
                triplets += 1;
            }
        });
        // 5 contract leaves + 2 relations (2 leaves each) + 1 address
        assert_eq!(triplets, 10);
        Ok(())
    }

    #[test]
    fn test_pinned_clock_and_id_give_identical_bytes() -> Result<()> {
        let (aggregates, _) = JoinAggregateEngine::default().aggregate(&scenario_input());
        let builder = pinned_builder();

        let first = builder.build(&aggregates[0])?.to_json()?;
        let second = builder.build(&aggregates[0])?.to_json()?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_header_fields_differ_per_build() -> Result<()> {
        let (aggregates, _) = JoinAggregateEngine::default().aggregate(&scenario_input());
        let builder = EnvelopeBuilder::new(
            Arc::new(SteppingClock(AtomicU64::new(0))),
            Arc::new(crate::domain::ports::RandomEventIds),
        );

        let a = builder.build(&aggregates[0])?;
        let b = builder.build(&aggregates[0])?;

        assert_ne!(a.header().event_identifier, b.header().event_identifier);
        assert_ne!(a.header().event_date_time, b.header().event_date_time);
        assert_eq!(a.keys(), b.keys());
        assert_eq!(a.payload(), b.payload());
        assert_eq!(
            serde_json::to_string(a.payload())?,
            serde_json::to_string(b.payload())?
        );
        Ok(())
    }

    #[test]
    fn test_event_date_time_has_millis_and_utc_offset() -> Result<()> {
        let envelopes = envelope_json(&scenario_input(), &EnvelopeBuilder::default())?;
        let ts = envelopes[0]["eventHeader"]["eventDateTime"]
            .as_str()
            .context("eventDateTime missing")?;
        let re = regex::Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}\+00:00$")?;
        assert!(re.is_match(ts), "unexpected format: {}", ts);
        Ok(())
    }

    #[test]
    fn test_payload_field_order_is_fixed() -> Result<()> {
        let (aggregates, _) = JoinAggregateEngine::default().aggregate(&scenario_input());
        let envelope = pinned_builder().build(&aggregates[0])?;
        let names: Vec<&str> = envelope.payload().field_names().collect();
        assert_eq!(
            names,
            vec![
                "contractIdentifier",
                "sourceSystemIdentifier",
                "contractStartDateTime",
                "contractTitle",
                "partyRelations"
            ]
        );
        Ok(())
    }

    #[test]
    fn test_invalid_start_timestamp_is_build_error() {
        let mut input = scenario_input();
        input.accounts[0].start_date_time = "24/03/2018".into();
        let (aggregates, _) = JoinAggregateEngine::default().aggregate(&input);

        let res = EnvelopeBuilder::default().build(&aggregates[0]);
        assert!(matches!(
            res,
            Err(DomainError::InvalidTimestamp { field: "contractStartDateTime", .. })
        ));
    }

    #[test]
    fn test_duplicate_party_in_aggregate_is_build_error() {
        let (mut aggregates, _) = JoinAggregateEngine::default().aggregate(&scenario_input());
        let dup = aggregates[0].party_relations[0].clone();
        aggregates[0].party_relations.push(dup);

        let res = EnvelopeBuilder::default().build(&aggregates[0]);
        assert!(matches!(res, Err(DomainError::DuplicatePartyRelation { .. })));
    }

    #[test]
    fn test_blank_key_is_build_error() {
        let (mut aggregates, _) = JoinAggregateEngine::default().aggregate(&scenario_input());
        aggregates[0].contract_identifier = "   ".into();

        let res = EnvelopeBuilder::default().build(&aggregates[0]);
        assert_eq!(res, Err(DomainError::EmptyContractIdentifier));
    }
}
