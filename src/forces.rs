//! Force-field model: inter-agent interaction, obstacle avoidance, migration.

use crate::config::Config;
use crate::sensing::Obstacle;
use crate::state::AgentState;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Distances below this are treated as coincident points.
const MIN_DISTANCE: f64 = 1e-9;

/// The three force contributions, kept apart for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForceSet {
    pub interaction: Vector3<f64>,
    pub avoidance: Vector3<f64>,
    pub migration: Vector3<f64>,
}

impl ForceSet {
    pub fn total(&self) -> Vector3<f64> {
        self.interaction + self.avoidance + self.migration
    }
}

pub struct ForceField<'a> {
    cfg: &'a Config,
}

impl<'a> ForceField<'a> {
    pub fn new(cfg: &'a Config) -> Self {
        Self { cfg }
    }

    pub fn compute_forces(
        &self,
        state: &AgentState,
        neighbors: &[&AgentState],
        obstacles: &[Obstacle],
        migration: &Vector3<f64>,
    ) -> ForceSet {
        ForceSet {
            interaction: self.interaction(state, neighbors),
            avoidance: self.avoidance(state, obstacles),
            migration: self.cfg.gains.k_m * migration,
        }
    }

    /// Spring-like spacing term toward `d_eq` plus velocity alignment, over
    /// the nearest `max_vis_objs` neighbours within `radius`.
    fn interaction(&self, state: &AgentState, neighbors: &[&AgentState]) -> Vector3<f64> {
        let dims = &self.cfg.dimensions;
        let gains = &self.cfg.gains;

        let mut visible: Vec<(f64, Vector3<f64>, &AgentState)> = neighbors
            .iter()
            .map(|&neighbor| {
                let offset = neighbor.position() - state.position();
                (offset.norm(), offset, neighbor)
            })
            .filter(|&(dist, _, _)| dist > MIN_DISTANCE && dist <= dims.radius)
            .collect();
        if visible.is_empty() {
            return Vector3::zeros();
        }
        visible.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        visible.truncate(dims.max_vis_objs);

        let mut spacing = Vector3::zeros();
        let mut vel_sum = Vector3::zeros();
        for (dist, offset, neighbor) in &visible {
            spacing += gains.k_r * (dist - dims.d_eq) * (offset / *dist);
            vel_sum += neighbor.linear_velocity;
        }
        let vel_mean = vel_sum / visible.len() as f64;
        let alignment = gains.k_al * (vel_mean - state.linear_velocity);

        spacing + alignment
    }

    /// Inverse-square repulsion from every generic obstacle.
    fn avoidance(&self, state: &AgentState, obstacles: &[Obstacle]) -> Vector3<f64> {
        obstacles
            .iter()
            .filter(|obstacle| obstacle.is_generic())
            .filter_map(|obstacle| {
                let away = state.position() - obstacle.world;
                let dist = away.norm();
                (dist > MIN_DISTANCE).then(|| self.cfg.gains.k_o * away / dist.powi(3))
            })
            .sum()
    }
}
