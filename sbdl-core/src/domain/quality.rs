// sbdl-core/src/domain/quality.rs
//
// Data-quality findings raised while joining a partition.
// None of them abort the partition: the offending row is skipped or a
// deterministic tie-break is applied, and the finding is kept for the report.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataQualityIssue {
    /// Account row with a null or blank `account_id` (row = position in the input).
    MissingAccountId { row: usize },
    /// Second account row for an id already seen. First row wins.
    DuplicateAccount { account_id: String, row: usize },
    /// Party row with a null or blank `party_id`.
    MissingPartyId { account_id: String, row: usize },
    /// Several address rows for one party; `kept` is the selected tuple.
    DuplicateAddress {
        party_id: String,
        kept: String,
        discarded: Vec<String>,
    },
    /// Party rows pointing at accounts absent from the partition.
    OrphanParties { count: usize },
}

impl DataQualityIssue {
    /// Rejections remove an account from the output; the rest are warnings.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::MissingAccountId { .. } | Self::DuplicateAccount { .. }
        )
    }
}

impl fmt::Display for DataQualityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingAccountId { row } => {
                write!(f, "account row #{} has no account_id", row)
            }
            Self::DuplicateAccount { account_id, row } => {
                write!(f, "account '{}' repeated at row #{}", account_id, row)
            }
            Self::MissingPartyId { account_id, row } => write!(
                f,
                "party row #{} of account '{}' has no party_id",
                row, account_id
            ),
            Self::DuplicateAddress {
                party_id,
                kept,
                discarded,
            } => write!(
                f,
                "party '{}' has {} address rows, kept [{}], discarded [{}]",
                party_id,
                discarded.len() + 1,
                kept,
                discarded.join("; ")
            ),
            Self::OrphanParties { count } => {
                write!(f, "{} party rows reference unknown accounts", count)
            }
        }
    }
}
