use crate::config::Config;
use crate::error::FeedError;
use crate::forces::{ForceField, ForceSet};
use crate::opinion::{Commitment, OpinionDynamics, option_value};
use crate::sensing::{classify_obstacles, detect_obstacles};
use crate::state::AgentState;
use crate::velocity::{VelocityCommand, VelocityController};
use nalgebra::Vector3;
use rand_chacha::ChaCha12Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Read-only view of the swarm for one control cycle.
#[derive(Debug, Clone, Copy)]
pub struct SwarmView<'a> {
    /// Latest state of every agent, self included.
    pub states: &'a BTreeMap<String, AgentState>,
    /// Latest commitment of every agent, as seen before this cycle's updates.
    pub commitments: &'a BTreeMap<String, Commitment>,
}

/// Output of one agent's control cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentReport {
    pub command: VelocityCommand,
    pub commitment: Commitment,
    pub n_obstacles: usize,
    pub forces: ForceSet,
}

/// One flying agent: its name and the state it carries across cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    name: String,
    commitment: Commitment,
    decision_counter: usize,
    rng: ChaCha12Rng,
}

impl Agent {
    pub fn new<S: Into<String>>(name: S, rng: ChaCha12Rng) -> Self {
        Self {
            name: name.into(),
            commitment: Commitment::Uncommitted,
            decision_counter: 0,
            rng,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn commitment(&self) -> Commitment {
        self.commitment
    }

    /// Run one control cycle: sense, update the opinion if due, compute the
    /// forces and reduce them to a velocity command.
    ///
    /// # Errors
    /// Fails if this agent is absent from the state feed or, when the agent
    /// takes part in the opinion dynamics, if a neighbour has no commitment
    /// in the decision feed.
    pub fn compute_velocities(
        &mut self,
        cfg: &Config,
        dynamics: &OpinionDynamics,
        view: SwarmView<'_>,
    ) -> Result<AgentReport, FeedError> {
        let state = view
            .states
            .get(&self.name)
            .ok_or_else(|| FeedError::MissingAgent(self.name.clone()))?;

        let neighbors: Vec<(&str, &AgentState)> = view
            .states
            .iter()
            .filter(|(name, _)| **name != self.name)
            .map(|(name, state)| (name.as_str(), state))
            .collect();
        let neighbor_states: Vec<&AgentState> = neighbors.iter().map(|&(_, s)| s).collect();

        let mut obstacles = detect_obstacles(state);
        classify_obstacles(&mut obstacles, neighbor_states.iter().copied());

        let [tx, ty] = cfg.mission.target;
        let target = Vector3::new(tx, ty, state.position().z);

        let mut migration = Vector3::zeros();
        if cfg.agent.is_influenced {
            let neighbor_commitments = neighbors
                .iter()
                .map(|&(name, _)| {
                    view.commitments
                        .get(name)
                        .copied()
                        .ok_or_else(|| FeedError::MissingCommitment(name.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?;

            self.decision_counter += 1;
            if self.decision_counter >= cfg.mission.decision_cycle {
                self.decision_counter = 0;

                let draw = dynamics.draw(&mut self.rng);
                let num_options = cfg.agent.num_options;
                let position = state.position();
                let next = dynamics.decide(self.commitment, draw, &neighbor_commitments, |option| {
                    option_value(option, num_options, &position, &obstacles, &target)
                });
                if next != self.commitment {
                    log::debug!(
                        "{}: {:?} -> {:?} (p = {:.3})",
                        self.name,
                        self.commitment,
                        next,
                        draw.p
                    );
                }
                self.commitment = next;
            }

            migration = self
                .commitment
                .migration(cfg.agent.num_options, cfg.mission.migration_speed);
        }

        let forces =
            ForceField::new(cfg).compute_forces(state, &neighbor_states, &obstacles, &migration);
        let command =
            VelocityController::new(cfg).command(&forces, state, &neighbor_states, &target);

        log::debug!("agent {}: {state}", self.name);
        log::debug!(
            "agent {}: {} obstacles, interaction {:.2?}, avoidance {:.2?}, migration {:.2?}",
            self.name,
            obstacles.len(),
            forces.interaction.as_slice(),
            forces.avoidance.as_slice(),
            forces.migration.as_slice(),
        );
        log::debug!(
            "agent {}: v {:.2?}, omega {:.2}",
            self.name,
            command.linear.as_slice(),
            command.angular
        );

        Ok(AgentReport {
            command,
            commitment: self.commitment,
            n_obstacles: obstacles.len(),
            forces,
        })
    }
}
