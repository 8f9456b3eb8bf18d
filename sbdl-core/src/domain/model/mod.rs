// sbdl-core/src/domain/model/mod.rs

pub mod aggregate;
pub mod records;

pub use aggregate::{ContractAggregate, PartyAddress, PartyRelation};
pub use records::{
    AccountRecord, AddressRecord, PartitionInput, PartyRecord, TaxIdentifier, TitleLine,
};
