// sbdl-core/src/domain/model/records.rs
//
// Normalized source rows, exactly as the Source Reader hands them over.

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

fn re_line_index() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+)$").unwrap_or_else(|_| {
            // Hardcoded pattern, cannot fail.
            Regex::new("$^").unwrap_or_else(|_| unreachable!())
        })
    })
}

/// One legal title line of a contract (`lgl_ttl_ln_1`, `lgl_ttl_ln_2`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleLine {
    pub line_type: String,
    pub line: String,
}

impl TitleLine {
    pub fn new(line_type: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            line_type: line_type.into(),
            line: line.into(),
        }
    }

    /// Line number embedded at the end of the line type.
    /// `None` when the type carries no trailing digits.
    pub fn line_index(&self) -> Option<u32> {
        re_line_index()
            .captures(&self.line_type)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxIdentifier {
    pub tax_id_type: String,
    pub tax_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Empty when the source row had a null key. The engine rejects such rows.
    pub account_id: String,
    pub source_system_id: String,
    pub start_date_time: String,
    pub title_lines: Vec<TitleLine>,
    pub active_indicator: bool,
    #[serde(default)]
    pub tax_identifier: Option<TaxIdentifier>,
    #[serde(default)]
    pub branch_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl AccountRecord {
    /// Minimal active account, the optional attributes left empty.
    pub fn new(
        account_id: impl Into<String>,
        source_system_id: impl Into<String>,
        start_date_time: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            source_system_id: source_system_id.into(),
            start_date_time: start_date_time.into(),
            title_lines: Vec::new(),
            active_indicator: true,
            tax_identifier: None,
            branch_code: None,
            country: None,
        }
    }

    pub fn with_title(mut self, line_type: impl Into<String>, line: impl Into<String>) -> Self {
        self.title_lines.push(TitleLine::new(line_type, line));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRecord {
    pub party_id: String,
    pub account_id: String,
    pub relationship_type: String,
    #[serde(default)]
    pub relation_start_date_time: Option<String>,
}

impl PartyRecord {
    pub fn new(
        party_id: impl Into<String>,
        account_id: impl Into<String>,
        relationship_type: impl Into<String>,
    ) -> Self {
        Self {
            party_id: party_id.into(),
            account_id: account_id.into(),
            relationship_type: relationship_type.into(),
            relation_start_date_time: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub party_id: String,
    pub address_line1: String,
    pub address_city: String,
    pub address_country: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub address_start_date: Option<String>,
}

impl AddressRecord {
    pub fn new(
        party_id: impl Into<String>,
        address_line1: impl Into<String>,
        address_city: impl Into<String>,
        address_country: impl Into<String>,
    ) -> Self {
        Self {
            party_id: party_id.into(),
            address_line1: address_line1.into(),
            address_city: address_city.into(),
            address_country: address_country.into(),
            address_line2: None,
            postal_code: None,
            address_start_date: None,
        }
    }
}

/// The three record sets of one load-date partition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PartitionInput {
    pub load_date: Option<NaiveDate>,
    pub accounts: Vec<AccountRecord>,
    pub parties: Vec<PartyRecord>,
    pub addresses: Vec<AddressRecord>,
}

impl PartitionInput {
    pub fn new(load_date: NaiveDate) -> Self {
        Self {
            load_date: Some(load_date),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
