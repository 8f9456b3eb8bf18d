// sbdl-core/src/domain/join/address.rs
//
// Address side of the join: one canonical address per party.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::domain::model::{AddressRecord, PartyAddress};
use crate::domain::quality::DataQualityIssue;

/// Tie-break order: (country, city, line1), then the optional columns so that
/// rows equal on the main tuple still resolve the same way on every run.
fn tie_break(a: &AddressRecord, b: &AddressRecord) -> Ordering {
    (
        a.address_country.as_str(),
        a.address_city.as_str(),
        a.address_line1.as_str(),
        a.address_line2.as_deref(),
        a.postal_code.as_deref(),
        a.address_start_date.as_deref(),
    )
        .cmp(&(
            b.address_country.as_str(),
            b.address_city.as_str(),
            b.address_line1.as_str(),
            b.address_line2.as_deref(),
            b.postal_code.as_deref(),
            b.address_start_date.as_deref(),
        ))
}

fn describe(address: &AddressRecord) -> String {
    format!(
        "{}, {}, {}",
        address.address_line1, address.address_city, address.address_country
    )
}

pub(crate) struct AddressIndex<'a> {
    by_party: HashMap<&'a str, &'a AddressRecord>,
}

impl<'a> AddressIndex<'a> {
    /// Indexes addresses by party and resolves duplicates.
    /// Findings come out in first-seen party order.
    pub(crate) fn build(addresses: &'a [AddressRecord]) -> (Self, Vec<DataQualityIssue>) {
        let mut slots: HashMap<&'a str, usize> = HashMap::new();
        let mut groups: Vec<(&'a str, Vec<&'a AddressRecord>)> = Vec::new();

        for address in addresses {
            let party_id = address.party_id.trim();
            if party_id.is_empty() {
                continue;
            }
            match slots.get(party_id) {
                Some(&slot) => groups[slot].1.push(address),
                None => {
                    slots.insert(party_id, groups.len());
                    groups.push((party_id, vec![address]));
                }
            }
        }

        let mut by_party = HashMap::with_capacity(groups.len());
        let mut issues = Vec::new();

        for (party_id, mut candidates) in groups {
            candidates.sort_by(|a, b| tie_break(a, b));
            let kept = candidates[0];
            if candidates.len() > 1 {
                issues.push(DataQualityIssue::DuplicateAddress {
                    party_id: party_id.to_string(),
                    kept: describe(kept),
                    discarded: candidates[1..].iter().map(|a| describe(a)).collect(),
                });
            }
            by_party.insert(party_id, kept);
        }

        (Self { by_party }, issues)
    }

    pub(crate) fn resolve(&self, party_id: &str) -> Option<PartyAddress> {
        self.by_party.get(party_id).map(|a| PartyAddress {
            address_line1: a.address_line1.clone(),
            address_city: a.address_city.clone(),
            address_country: a.address_country.clone(),
            address_line2: a.address_line2.clone(),
            postal_code: a.postal_code.clone(),
            address_start_date: a.address_start_date.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn test_single_row_has_no_finding() -> Result<()> {
        let rows = vec![AddressRecord::new("p1", "1 Main St", "Lyon", "France")];
        let (index, issues) = AddressIndex::build(&rows);

        assert!(issues.is_empty());
        let resolved = index.resolve("p1").context("address missing")?;
        assert_eq!(resolved.address_city, "Lyon");
        Ok(())
    }

    #[test]
    fn test_duplicate_rows_keep_smallest_city() -> Result<()> {
        let rows = vec![
            AddressRecord::new("p1", "1 Main St", "Paris", "France"),
            AddressRecord::new("p1", "1 Main St", "Lyon", "France"),
        ];

        for _ in 0..3 {
            let (index, issues) = AddressIndex::build(&rows);
            let resolved = index.resolve("p1").context("address missing")?;
            assert_eq!(resolved.address_city, "Lyon");
            assert_eq!(issues.len(), 1);
            assert!(matches!(
                &issues[0],
                DataQualityIssue::DuplicateAddress { discarded, .. } if discarded == &vec!["1 Main St, Paris, France".to_string()]
            ));
        }
        Ok(())
    }

    #[test]
    fn test_country_dominates_city() -> Result<()> {
        let rows = vec![
            AddressRecord::new("p1", "9 Elm", "Aachen", "Germany"),
            AddressRecord::new("p1", "9 Elm", "Zurich", "Canada"),
        ];
        let (index, _) = AddressIndex::build(&rows);
        let resolved = index.resolve("p1").context("address missing")?;
        assert_eq!(resolved.address_country, "Canada");
        Ok(())
    }
}
