use crate::config::Config;
use crate::engine::CycleRecord;
use crate::opinion::Commitment;
use crate::stats::Accumulator;
use anyhow::{Context, Result};
use std::{fs::File, io::BufWriter, path::Path};

pub trait Obs {
    fn update(&mut self, record: &CycleRecord);
    fn report(&self) -> serde_json::Value;
}

/// Mean linear and absolute angular speed over the agents of a cycle.
pub struct Speed {
    linear: Accumulator,
    angular: Accumulator,
}

impl Speed {
    pub fn new() -> Self {
        Self {
            linear: Accumulator::new(),
            angular: Accumulator::new(),
        }
    }
}

impl Obs for Speed {
    fn update(&mut self, record: &CycleRecord) {
        if record.agents.is_empty() {
            return;
        }
        let n_agents = record.agents.len() as f64;
        let (linear_sum, angular_sum) = record
            .agents
            .values()
            .fold((0.0, 0.0), |(lin, ang), report| {
                (lin + report.command.linear.norm(), ang + report.command.angular.abs())
            });
        self.linear.add(linear_sum / n_agents);
        self.angular.add(angular_sum / n_agents);
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({
            "linear_speed": self.linear.report(),
            "angular_speed": self.angular.report(),
        })
    }
}

/// Fraction of agents uncommitted (index 0) and committed to each option.
pub struct CommitmentShare {
    acc_vec: Vec<Accumulator>,
}

impl CommitmentShare {
    pub fn new(cfg: &Config) -> Self {
        let mut acc_vec = Vec::new();
        acc_vec.resize_with(cfg.agent.num_options + 1, Accumulator::new);
        Self { acc_vec }
    }
}

impl Obs for CommitmentShare {
    fn update(&mut self, record: &CycleRecord) {
        if record.agents.is_empty() {
            return;
        }
        let mut counts = vec![0usize; self.acc_vec.len()];
        for report in record.agents.values() {
            let idx = match report.commitment {
                Commitment::Uncommitted => 0,
                Commitment::Committed(option) => option,
            };
            if let Some(count) = counts.get_mut(idx) {
                *count += 1;
            }
        }
        let n_agents = record.agents.len() as f64;
        for (acc, count) in self.acc_vec.iter_mut().zip(counts) {
            acc.add(count as f64 / n_agents);
        }
    }

    fn report(&self) -> serde_json::Value {
        let reports: Vec<_> = self.acc_vec.iter().map(|acc| acc.report()).collect();
        serde_json::json!({ "commitment_share": reports })
    }
}

pub struct Analyzer {
    obs_ptr_vec: Vec<Box<dyn Obs>>,
    n_cycles: usize,
}

impl Analyzer {
    pub fn new(cfg: &Config) -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> =
            vec![Box::new(Speed::new()), Box::new(CommitmentShare::new(cfg))];
        Self {
            obs_ptr_vec,
            n_cycles: 0,
        }
    }

    pub fn add_record(&mut self, record: &CycleRecord) {
        for obs in &mut self.obs_ptr_vec {
            obs.update(record);
        }
        self.n_cycles += 1;
    }

    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let record = CycleRecord::load(file).context("failed to load cycle record")?;
        self.add_record(&record);
        Ok(())
    }

    pub fn results(&self) -> serde_json::Value {
        let reports: Vec<_> = self.obs_ptr_vec.iter().map(|obs| obs.report()).collect();
        serde_json::json!({ "n_cycles": self.n_cycles, "observables": reports })
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &self.results())
            .context("failed to serialize results")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentReport;
    use crate::config::tests::test_config;
    use crate::forces::ForceSet;
    use crate::velocity::VelocityCommand;
    use nalgebra::Vector3;
    use std::collections::BTreeMap;

    fn report(speed: f64, commitment: Commitment) -> AgentReport {
        AgentReport {
            command: VelocityCommand {
                linear: Vector3::new(speed, 0.0, 0.0),
                angular: -0.5,
            },
            commitment,
            n_obstacles: 0,
            forces: ForceSet {
                interaction: Vector3::zeros(),
                avoidance: Vector3::zeros(),
                migration: Vector3::zeros(),
            },
        }
    }

    #[test]
    fn summarizes_speed_and_commitment() {
        let cfg = test_config();
        let mut analyzer = Analyzer::new(&cfg);
        let record = CycleRecord {
            cycle: 0,
            agents: BTreeMap::from([
                ("cf1".to_string(), report(0.2, Commitment::Uncommitted)),
                ("cf2".to_string(), report(0.4, Commitment::Committed(2))),
            ]),
        };
        analyzer.add_record(&record);

        let results = analyzer.results();
        assert_eq!(results["n_cycles"], 1);
        let speed = &results["observables"][0]["linear_speed"]["mean"];
        assert!((speed.as_f64().unwrap() - 0.3).abs() < 1e-12);
        let share = &results["observables"][1]["commitment_share"];
        assert_eq!(share[0]["mean"], 0.5);
        assert_eq!(share[1]["mean"], 0.0);
        assert_eq!(share[2]["mean"], 0.5);
    }
}
