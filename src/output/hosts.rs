//! Rank to host label resolution for rendered output

use crate::models::RunResults;
use crate::session::short_hostname;
use crate::types::Rank;
use std::collections::{BTreeMap, HashMap};

/// Display labels for the worker ranks of a run.
///
/// Labels come from the host names the ranks reported in their records.
/// When several ranks share a host, each of them is shown as `host/rank`.
#[derive(Debug, Clone, Default)]
pub struct HostDirectory {
    labels: BTreeMap<Rank, String>,
}

impl HostDirectory {
    pub fn from_results(results: &RunResults) -> Self {
        let mut hosts: BTreeMap<Rank, String> = BTreeMap::new();
        for record in results.records() {
            hosts
                .entry(record.sender)
                .or_insert_with(|| short_hostname(&record.hostname).to_string());
        }
        Self::from_hosts(hosts)
    }

    /// Build from raw `rank -> hostname` pairs
    pub fn from_hosts(hosts: BTreeMap<Rank, String>) -> Self {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for host in hosts.values() {
            *seen.entry(host.as_str()).or_default() += 1;
        }

        let labels = hosts
            .iter()
            .map(|(&rank, host)| {
                let label = if host.is_empty() {
                    format!("rank{}", rank)
                } else if seen.get(host.as_str()).copied().unwrap_or(0) > 1 {
                    format!("{}/{}", host, rank)
                } else {
                    host.clone()
                };
                (rank, label)
            })
            .collect();

        Self { labels }
    }

    /// Label for `rank`; ranks that never reported get `rank<k>`
    pub fn label(&self, rank: Rank) -> String {
        self.labels
            .get(&rank)
            .cloned()
            .unwrap_or_else(|| format!("rank{}", rank))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PairResult, ResultMatrix};

    #[test]
    fn test_distinct_hosts_keep_plain_names() {
        let hosts = BTreeMap::from([
            (1, "alpha".to_string()),
            (2, "beta".to_string()),
            (3, "gamma".to_string()),
        ]);
        let directory = HostDirectory::from_hosts(hosts);
        assert_eq!(directory.label(2), "beta");
        assert_eq!(directory.label(7), "rank7");
        assert_eq!(directory.len(), 3);
    }

    #[test]
    fn test_shared_hosts_are_disambiguated() {
        let hosts = BTreeMap::from([
            (1, "box".to_string()),
            (2, "box".to_string()),
            (3, "other".to_string()),
            (4, String::new()),
        ]);
        let directory = HostDirectory::from_hosts(hosts);
        assert_eq!(directory.label(1), "box/1");
        assert_eq!(directory.label(2), "box/2");
        assert_eq!(directory.label(3), "other");
        assert_eq!(directory.label(4), "rank4");
    }

    #[test]
    fn test_from_results_uses_short_names() {
        let mut matrix = ResultMatrix::new(3);
        matrix.insert(1, 2, PairResult::unmeasured(1, Some(2), "n1.cluster")).unwrap();
        matrix.insert(2, 1, PairResult::unmeasured(2, Some(1), "n2.cluster")).unwrap();

        let directory = HostDirectory::from_results(&RunResults::Matrix(matrix));
        assert_eq!(directory.label(1), "n1");
        assert_eq!(directory.label(2), "n2");
    }
}
