//! YAML export of run results

use super::hosts::HostDirectory;
use crate::error::{AppError, Result};
use crate::models::{PairResult, RunResults};
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
struct PairValues {
    latency: Option<f64>,
    throughput: Option<f64>,
}

impl From<&PairResult> for PairValues {
    fn from(result: &PairResult) -> Self {
        let measured = result.is_measured();
        Self {
            latency: measured.then_some(result.latency),
            throughput: measured.then_some(result.throughput),
        }
    }
}

#[derive(Debug, Serialize)]
struct BisectionEntry {
    sender: String,
    receiver: String,
    latency: f64,
    throughput: f64,
}

/// Writes results as YAML.
///
/// Matrix runs become `sender -> receiver -> {latency, throughput}`, with
/// `null` for pairs that were never measured. Bisection runs become a list of
/// measured pairs.
pub struct YamlWriter {
    path: PathBuf,
}

impl YamlWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn render(results: &RunResults, hosts: &HostDirectory) -> Result<String> {
        let document = match results {
            RunResults::Matrix(matrix) => {
                let mut senders = Mapping::new();
                for sender in matrix.worker_ranks() {
                    let mut receivers = Mapping::new();
                    for receiver in matrix.worker_ranks().filter(|&r| r != sender) {
                        let values = match matrix.get(sender, receiver) {
                            Some(result) => PairValues::from(result),
                            None => PairValues { latency: None, throughput: None },
                        };
                        receivers.insert(Value::String(hosts.label(receiver)), serde_yaml::to_value(values)?);
                    }
                    senders.insert(Value::String(hosts.label(sender)), Value::Mapping(receivers));
                }
                Value::Mapping(senders)
            }
            RunResults::Bisection(bisection) => {
                let entries: Vec<BisectionEntry> = bisection
                    .measured()
                    .filter_map(|entry| {
                        entry.receiver.map(|receiver| BisectionEntry {
                            sender: hosts.label(entry.sender),
                            receiver: hosts.label(receiver),
                            latency: entry.latency,
                            throughput: entry.throughput,
                        })
                    })
                    .collect();
                serde_yaml::to_value(entries)?
            }
        };

        Ok(serde_yaml::to_string(&document)?)
    }

    /// Render and write the file, replacing any previous content
    pub async fn write(&self, results: &RunResults, hosts: &HostDirectory) -> Result<()> {
        let text = Self::render(results, hosts)?;
        tokio::fs::write(&self.path, text).await.map_err(|e| {
            AppError::output(format!("Can't write the yaml file {}: {}", self.path.display(), e))
        })
    }
}
