// sbdl-core/src/domain/error.rs

use miette::Diagnostic;
use thiserror::Error;

/// Build errors: fatal for one aggregate, never for the partition.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Contract identifier is empty")]
    #[diagnostic(
        code(sbdl::domain::empty_key),
        help("Accounts without account_id should have been rejected by the join engine.")
    )]
    EmptyContractIdentifier,

    #[error("Invalid timestamp in '{field}': '{value}'")]
    #[diagnostic(
        code(sbdl::domain::timestamp),
        help("Expected RFC 3339 with an explicit offset, e.g. 2018-03-24T13:56:45.000+05:30")
    )]
    InvalidTimestamp { field: &'static str, value: String },

    #[error("Party '{party_id}' appears twice in contract '{contract_id}'")]
    #[diagnostic(code(sbdl::domain::duplicate_party))]
    DuplicatePartyRelation {
        contract_id: String,
        party_id: String,
    },

    #[error("Inconsistent nested shape in '{field}': {detail}")]
    #[diagnostic(
        code(sbdl::domain::shape),
        help("Every element of an array of structs must carry the same fields.")
    )]
    InconsistentShape { field: String, detail: String },
}
