// sbdl-core/src/domain/model/aggregate.rs

use crate::domain::model::records::{TaxIdentifier, TitleLine};

/// Canonical address of a party after the duplicate tie-break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartyAddress {
    pub address_line1: String,
    pub address_city: String,
    pub address_country: String,
    pub address_line2: Option<String>,
    pub postal_code: Option<String>,
    pub address_start_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartyRelation {
    pub party_identifier: String,
    pub relationship_type: String,
    pub relation_start_date_time: Option<String>,
    /// `None` when no address row matched the party.
    pub address: Option<PartyAddress>,
}

/// One contract with its parties resolved. Lives only between the
/// join engine and the envelope builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractAggregate {
    pub contract_identifier: String,
    pub source_system_id: String,
    pub start_date_time: String,
    pub active_indicator: bool,
    /// Sorted by line index.
    pub title_lines: Vec<TitleLine>,
    pub tax_identifier: Option<TaxIdentifier>,
    pub branch_code: Option<String>,
    pub country: Option<String>,
    /// First-seen join order.
    pub party_relations: Vec<PartyRelation>,
}
