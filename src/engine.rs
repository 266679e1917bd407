use crate::agent::{Agent, AgentReport, SwarmView};
use crate::config::Config;
use crate::opinion::{Commitment, OpinionDynamics};
use crate::state::AgentState;
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Commands and diagnostics emitted for one control cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub cycle: usize,
    pub agents: BTreeMap<String, AgentReport>,
}

impl CycleRecord {
    pub fn save<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, self).context("failed to serialize cycle record")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let record = decode::from_read(&mut reader).context("failed to deserialize cycle record")?;
        Ok(record)
    }
}

/// Swarm harness.
///
/// Holds the configuration, every agent seen so far and the random number
/// generator that seeds new agents, and fans each cycle's state feed out to
/// the agents.
#[derive(Serialize, Deserialize)]
pub struct Swarm {
    cfg: Config,
    agents: BTreeMap<String, Agent>,
    rng: ChaCha12Rng,
    cycle: usize,
}

impl Swarm {
    /// Create a new `Swarm` seeded from the operating system.
    pub fn new(cfg: Config) -> Result<Self> {
        let rng = ChaCha12Rng::try_from_os_rng()?;
        Ok(Self::with_rng(cfg, rng))
    }

    /// Create a new `Swarm` with a reproducible seed.
    pub fn with_seed(cfg: Config, seed: u64) -> Self {
        Self::with_rng(cfg, ChaCha12Rng::seed_from_u64(seed))
    }

    fn with_rng(cfg: Config, rng: ChaCha12Rng) -> Self {
        Self {
            cfg,
            agents: BTreeMap::new(),
            rng,
            cycle: 0,
        }
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    /// Index of the next cycle to run.
    pub fn cycle(&self) -> usize {
        self.cycle
    }

    pub fn commitments(&self) -> BTreeMap<String, Commitment> {
        self.agents
            .iter()
            .map(|(name, agent)| (name.clone(), agent.commitment()))
            .collect()
    }

    /// Run one control cycle for every agent in `states`.
    ///
    /// All agents read the commitments held before this cycle. If any agent
    /// fails the whole cycle fails and the cycle counter is not advanced.
    pub fn step(&mut self, states: &BTreeMap<String, AgentState>) -> Result<CycleRecord> {
        for name in states.keys() {
            if !self.agents.contains_key(name) {
                let rng = ChaCha12Rng::from_rng(&mut self.rng);
                self.agents.insert(name.clone(), Agent::new(name.clone(), rng));
                log::info!("added agent {name}");
            }
        }

        let dynamics =
            OpinionDynamics::new(&self.cfg.agent).context("failed to construct opinion dynamics")?;
        let commitments = self.commitments();
        let view = SwarmView {
            states,
            commitments: &commitments,
        };

        let mut updated = self.agents.clone();
        let mut reports = BTreeMap::new();
        for name in states.keys() {
            let agent = updated
                .get_mut(name)
                .with_context(|| format!("agent {name} was not registered"))?;
            let report = agent
                .compute_velocities(&self.cfg, &dynamics, view)
                .with_context(|| format!("failed to compute velocities of agent {name}"))?;
            reports.insert(name.clone(), report);
        }

        self.agents = updated;
        let record = CycleRecord {
            cycle: self.cycle,
            agents: reports,
        };
        self.cycle += 1;

        Ok(record)
    }

    /// Save a checkpoint of the entire swarm.
    ///
    /// Can be used to resume later with identical random streams.
    pub fn save_checkpoint<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &self).context("failed to serialize swarm")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    /// Load a previously saved swarm checkpoint.
    pub fn load_checkpoint<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let swarm = decode::from_read(&mut reader).context("failed to deserialize swarm")?;
        Ok(swarm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;
    use crate::state::RangeReadings;
    use nalgebra::Vector3;

    fn states(names: &[&str]) -> BTreeMap<String, AgentState> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let pos = Vector3::new(i as f64, 0.0, 1.0);
                let state = AgentState::at_rest(pos, 0.0, RangeReadings::clear(4.0));
                (name.to_string(), state)
            })
            .collect()
    }

    #[test]
    fn step_reports_every_agent_in_feed() {
        let mut swarm = Swarm::with_seed(test_config(), 3);
        let record = swarm.step(&states(&["cf1", "cf2", "cf3"])).unwrap();
        assert_eq!(record.cycle, 0);
        assert_eq!(record.agents.len(), 3);
        assert_eq!(swarm.cycle(), 1);

        let record = swarm.step(&states(&["cf1", "cf2"])).unwrap();
        assert_eq!(record.cycle, 1);
        assert_eq!(record.agents.keys().collect::<Vec<_>>(), ["cf1", "cf2"]);
    }

    #[test]
    fn identical_seeds_give_identical_runs() {
        let mut cfg = test_config();
        cfg.mission.decision_cycle = 1;
        cfg.agent.k = 0.5;
        let feed = states(&["cf1", "cf2", "cf3"]);

        let mut a = Swarm::with_seed(cfg.clone(), 42);
        let mut b = Swarm::with_seed(cfg, 42);
        for _ in 0..20 {
            assert_eq!(a.step(&feed).unwrap(), b.step(&feed).unwrap());
        }
    }

    #[test]
    fn checkpoint_resumes_identically() {
        let mut cfg = test_config();
        cfg.mission.decision_cycle = 1;
        let feed = states(&["cf1", "cf2"]);
        let mut swarm = Swarm::with_seed(cfg, 5);
        swarm.step(&feed).unwrap();

        let dir = std::env::temp_dir().join(format!("flocking-ckpt-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("checkpoint.msgpack");
        swarm.save_checkpoint(&file).unwrap();
        let mut resumed = Swarm::load_checkpoint(&file).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(resumed.cycle(), swarm.cycle());
        assert_eq!(resumed.cfg(), swarm.cfg());
        for _ in 0..5 {
            assert_eq!(swarm.step(&feed).unwrap(), resumed.step(&feed).unwrap());
        }
    }
}
