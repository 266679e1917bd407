//! Reduction of the combined force into a bounded velocity command.

use crate::config::Config;
use crate::forces::ForceSet;
use crate::state::AgentState;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

/// Command for the velocity sink.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VelocityCommand {
    pub linear: Vector3<f64>,
    pub angular: f64,
}

pub struct VelocityController<'a> {
    cfg: &'a Config,
}

impl<'a> VelocityController<'a> {
    pub fn new(cfg: &'a Config) -> Self {
        Self { cfg }
    }

    /// Sum of the force terms, clipped per axis to `force_max`.
    pub fn overall_force(&self, forces: &ForceSet) -> Vector3<f64> {
        let force_max = self.cfg.bounds.force_max;
        forces.total().map(|ele| ele.clamp(-force_max, force_max))
    }

    pub fn command(
        &self,
        forces: &ForceSet,
        state: &AgentState,
        neighbors: &[&AgentState],
        target: &Vector3<f64>,
    ) -> VelocityCommand {
        let force = self.overall_force(forces);
        if self.cfg.agent.is_omnidirectional {
            self.omnidirectional(&force, state, neighbors, target)
        } else {
            self.heading_constrained(&force, state)
        }
    }

    /// Free linear motion; yaw turns toward the circular mean of own yaw,
    /// neighbour yaws and the bearing to the target.
    fn omnidirectional(
        &self,
        force: &Vector3<f64>,
        state: &AgentState,
        neighbors: &[&AgentState],
        target: &Vector3<f64>,
    ) -> VelocityCommand {
        let gains = &self.cfg.gains;
        let bounds = &self.cfg.bounds;

        let linear = (gains.k_l * force).map(|ele| ele.clamp(-bounds.v_max, bounds.v_max));

        let to_target = target - state.position();
        let bearing = to_target.y.atan2(to_target.x);
        let yaws = std::iter::once(state.yaw())
            .chain(neighbors.iter().map(|neighbor| neighbor.yaw()))
            .chain(std::iter::once(bearing));
        let (sin_sum, cos_sum) = yaws
            .fold((0.0, 0.0), |(s, c), yaw| (s + yaw.sin(), c + yaw.cos()));
        let yaw_error = if sin_sum == 0.0 && cos_sum == 0.0 {
            0.0
        } else {
            wrap_angle(sin_sum.atan2(cos_sum) - state.yaw())
        };
        let angular = (gains.k_a * yaw_error).clamp(-bounds.omega_max, bounds.omega_max);

        VelocityCommand { linear, angular }
    }

    /// Motion only along the current heading; turning from the lateral force.
    fn heading_constrained(&self, force: &Vector3<f64>, state: &AgentState) -> VelocityCommand {
        let gains = &self.cfg.gains;
        let bounds = &self.cfg.bounds;

        let u = state.heading();
        let u_orth = Vector3::z().cross(&u);

        let speed = (gains.k_l * force.dot(&u)).clamp(bounds.v_min, bounds.v_max);
        let angular = (-gains.k_a * force.dot(&u_orth)).clamp(bounds.omega_min, bounds.omega_max);

        VelocityCommand {
            linear: speed * u,
            angular,
        }
    }
}

/// Wrap an angle into `(-pi, pi]`.
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped == -PI { PI } else { wrapped }
}
