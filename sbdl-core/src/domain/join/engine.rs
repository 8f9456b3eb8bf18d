// sbdl-core/src/domain/join/engine.rs
//
// Account ⟕ Party ⟕ Address, grouped by account.
//
// The shuffle/group-by is an in-memory hash index built once per partition:
// parties are bucketed by account_id, addresses by party_id. Accounts are then
// walked in input order, so aggregates come out lazily and in a stable order.

use std::collections::{HashMap, HashSet};
use std::iter::Enumerate;
use std::slice;

use tracing::{debug, warn};

use crate::domain::join::address::AddressIndex;
use crate::domain::model::{
    AccountRecord, ContractAggregate, PartitionInput, PartyRecord, PartyRelation, TitleLine,
};
use crate::domain::project::EngineSettings;
use crate::domain::quality::DataQualityIssue;

#[derive(Debug, Clone, Default)]
pub struct JoinAggregateEngine {
    settings: EngineSettings,
}

impl JoinAggregateEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    /// Builds the join indexes for one partition.
    pub fn prepare<'a>(&self, input: &'a PartitionInput) -> PreparedPartition<'a> {
        let mut warnings = Vec::new();

        let (addresses, address_issues) = AddressIndex::build(&input.addresses);
        warnings.extend(address_issues);

        let known_accounts: HashSet<&str> = input
            .accounts
            .iter()
            .map(|a| a.account_id.trim())
            .filter(|id| !id.is_empty())
            .collect();

        let mut parties_by_account: HashMap<&'a str, Vec<&'a PartyRecord>> = HashMap::new();
        let mut linked: HashSet<(&'a str, &'a str)> = HashSet::new();
        let mut orphans = 0usize;

        for (row, party) in input.parties.iter().enumerate() {
            let account_id = party.account_id.trim();
            let party_id = party.party_id.trim();
            if party_id.is_empty() {
                warnings.push(DataQualityIssue::MissingPartyId {
                    account_id: account_id.to_string(),
                    row,
                });
                continue;
            }
            if !known_accounts.contains(account_id) {
                orphans += 1;
                continue;
            }

            // One relation per distinct party: a repeated junction row keeps its first position.
            if !linked.insert((account_id, party_id)) {
                debug!(account_id, party_id, "Repeated party link ignored");
                continue;
            }
            parties_by_account.entry(account_id).or_default().push(party);
        }

        if orphans > 0 {
            warnings.push(DataQualityIssue::OrphanParties { count: orphans });
        }

        for issue in &warnings {
            warn!(load_date = ?input.load_date, "⚠️  Data quality: {}", issue);
        }

        PreparedPartition {
            input,
            parties_by_account,
            addresses,
            warnings,
            skip_inactive: self.settings.skip_inactive,
        }
    }

    /// Eager variant: every aggregate plus every finding (warnings first, then rejections).
    pub fn aggregate(
        &self,
        input: &PartitionInput,
    ) -> (Vec<ContractAggregate>, Vec<DataQualityIssue>) {
        let prepared = self.prepare(input);
        let mut issues = prepared.warnings().to_vec();
        let mut aggregates = Vec::with_capacity(input.accounts.len());

        for item in prepared.aggregates() {
            match item {
                Ok(aggregate) => aggregates.push(aggregate),
                Err(issue) => issues.push(issue),
            }
        }
        (aggregates, issues)
    }
}

pub struct PreparedPartition<'a> {
    input: &'a PartitionInput,
    parties_by_account: HashMap<&'a str, Vec<&'a PartyRecord>>,
    addresses: AddressIndex<'a>,
    warnings: Vec<DataQualityIssue>,
    skip_inactive: bool,
}

impl<'a> PreparedPartition<'a> {
    /// Non-fatal findings raised while indexing (duplicates, orphans).
    pub fn warnings(&self) -> &[DataQualityIssue] {
        &self.warnings
    }

    pub fn account_rows(&self) -> usize {
        self.input.accounts.len()
    }

    /// Lazy sequence of aggregates. Rejected account rows surface as `Err`.
    pub fn aggregates(&self) -> ContractAggregates<'_, 'a> {
        ContractAggregates {
            prepared: self,
            rows: self.input.accounts.iter().enumerate(),
            seen: HashSet::new(),
        }
    }

    fn assemble(&self, account: &AccountRecord, account_id: &str) -> ContractAggregate {
        let party_relations = self
            .parties_by_account
            .get(account_id)
            .map(|parties| {
                parties
                    .iter()
                    .map(|party| {
                        let party_id = party.party_id.trim();
                        PartyRelation {
                            party_identifier: party_id.to_string(),
                            relationship_type: party.relationship_type.clone(),
                            relation_start_date_time: party.relation_start_date_time.clone(),
                            address: self.addresses.resolve(party_id),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        ContractAggregate {
            contract_identifier: account_id.to_string(),
            source_system_id: account.source_system_id.clone(),
            start_date_time: account.start_date_time.clone(),
            active_indicator: account.active_indicator,
            title_lines: ordered_titles(&account.title_lines),
            tax_identifier: account.tax_identifier.clone(),
            branch_code: account.branch_code.clone(),
            country: account.country.clone(),
            party_relations,
        }
    }
}

/// Title lines by ascending line index; blank lines dropped,
/// lines without an index kept last in their input order.
fn ordered_titles(lines: &[TitleLine]) -> Vec<TitleLine> {
    let mut ordered: Vec<TitleLine> = lines
        .iter()
        .filter(|t| !t.line.trim().is_empty())
        .cloned()
        .collect();
    ordered.sort_by_key(|t| t.line_index().unwrap_or(u32::MAX));
    ordered
}

pub struct ContractAggregates<'p, 'a> {
    prepared: &'p PreparedPartition<'a>,
    rows: Enumerate<slice::Iter<'a, AccountRecord>>,
    seen: HashSet<&'a str>,
}

impl Iterator for ContractAggregates<'_, '_> {
    type Item = Result<ContractAggregate, DataQualityIssue>;

    fn next(&mut self) -> Option<Self::Item> {
        for (row, account) in self.rows.by_ref() {
            let account_id = account.account_id.trim();

            if account_id.is_empty() {
                let issue = DataQualityIssue::MissingAccountId { row };
                warn!("⚠️  Rejected: {}", issue);
                return Some(Err(issue));
            }
            if !self.seen.insert(account_id) {
                let issue = DataQualityIssue::DuplicateAccount {
                    account_id: account_id.to_string(),
                    row,
                };
                warn!("⚠️  Rejected: {}", issue);
                return Some(Err(issue));
            }
            if self.prepared.skip_inactive && !account.active_indicator {
                debug!(account_id, "Inactive account skipped");
                continue;
            }

            return Some(Ok(self.prepared.assemble(account, account_id)));
        }
        None
    }
}
