use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use sbdl_core::domain::envelope::EnvelopeBuilder;
use sbdl_core::domain::join::JoinAggregateEngine;
use sbdl_core::domain::model::{AccountRecord, AddressRecord, PartitionInput, PartyRecord};
use sbdl_core::domain::ports::{Clock, EventIdSource};
use std::sync::Arc;

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

struct FixedId;

impl EventIdSource for FixedId {
    fn next_id(&self) -> String {
        "00000000-0000-4000-8000-000000000000".to_string()
    }
}

#[test]
fn test_contract_envelope_wire_shape() -> Result<()> {
    let mut input = PartitionInput::default();
    input.accounts.push(
        AccountRecord::new("6982391060", "COH", "2018-03-24T13:56:45.000+05:30")
            .with_title("lgl_ttl_ln_2", "Matthew Davies")
            .with_title("lgl_ttl_ln_1", "Tiffany Riley"),
    );
    input
        .parties
        .push(PartyRecord::new("9823462810", "6982391060", "F-N"));
    input.addresses.push(AddressRecord::new(
        "9823462810",
        "45229 Drake Route",
        "Shanefort",
        "Canada",
    ));

    let clock = Utc
        .with_ymd_and_hms(2024, 1, 15, 9, 30, 0)
        .single()
        .context("valid date")?;
    let builder = EnvelopeBuilder::new(Arc::new(FixedClock(clock)), Arc::new(FixedId));

    let (aggregates, issues) = JoinAggregateEngine::default().aggregate(&input);
    assert!(issues.is_empty());
    let envelope = builder.build(aggregates.first().context("one aggregate")?)?;

    insta::assert_snapshot!("contract_envelope", envelope.to_json_pretty()?);
    Ok(())
}
