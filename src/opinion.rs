//! Decentralized opinion dynamics over a discrete set of headings.
//!
//! Each agent holds a [`Commitment`] to one of `num_options` equally spaced
//! headings, or none. Every decision cycle it draws one uniform sample and
//! either commits by itself, is recruited by a committed neighbour, abandons
//! its option, or is cross-inhibited by a neighbour committed elsewhere. The
//! transition itself is [`OpinionDynamics::decide`], a pure function of the
//! sample, so it can be tested without a random source.

use crate::config::AgentConfig;
use crate::sensing::Obstacle;
use nalgebra::Vector3;
use rand::prelude::*;
use rand_distr::{Uniform, uniform};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Clearance assumed when no obstacle lies ahead.
pub const DEFAULT_CLEARANCE: f64 = 100.0;
/// Offset assumed when the target lies behind.
pub const DEFAULT_TARGET_OFFSET: f64 = 50.0;
/// Floor of the option value; values appear as a denominator.
pub const MIN_VALUE: f64 = 1e-5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Commitment {
    #[default]
    Uncommitted,
    /// Option index in `1..=num_options`.
    Committed(usize),
}

impl Commitment {
    pub fn option(self) -> Option<usize> {
        match self {
            Commitment::Uncommitted => None,
            Commitment::Committed(option) => Some(option),
        }
    }

    /// Migration vector fed to the force field: the committed heading scaled
    /// to `speed`, or zero when uncommitted.
    pub fn migration(self, num_options: usize, speed: f64) -> Vector3<f64> {
        match self {
            Commitment::Uncommitted => Vector3::zeros(),
            Commitment::Committed(option) => speed * heading(option, num_options),
        }
    }
}

/// Horizontal unit vector of option `option`, at angle `option * 2pi / num_options`.
pub fn heading(option: usize, num_options: usize) -> Vector3<f64> {
    let angle = option as f64 * TAU / num_options as f64;
    let (sin, cos) = angle.sin_cos();
    Vector3::new(cos, sin, 0.0)
}

/// Distance from `point` to the line through `origin` along the unit vector `dir`.
pub fn point_line_distance(point: &Vector3<f64>, origin: &Vector3<f64>, dir: &Vector3<f64>) -> f64 {
    (point - origin).cross(dir).norm()
}

/// Score of an option: clearance of generic obstacles ahead along its
/// heading times alignment of the heading with the target.
///
/// Always strictly positive.
pub fn option_value(
    option: usize,
    num_options: usize,
    position: &Vector3<f64>,
    obstacles: &[Obstacle],
    target: &Vector3<f64>,
) -> f64 {
    let dir = heading(option, num_options);

    let clearance = obstacles
        .iter()
        .filter(|obstacle| obstacle.is_generic())
        .filter(|obstacle| (obstacle.world - position).dot(&dir) >= 0.0)
        .map(|obstacle| point_line_distance(&obstacle.world, position, &dir))
        .fold(DEFAULT_CLEARANCE, f64::min);

    let target_offset = if (target - position).dot(&dir) >= 0.0 {
        point_line_distance(target, position, &dir).min(DEFAULT_TARGET_OFFSET)
    } else {
        DEFAULT_TARGET_OFFSET
    };

    let value = clearance / DEFAULT_CLEARANCE * (1.0 - target_offset / DEFAULT_TARGET_OFFSET);
    if value > 0.0 { value } else { MIN_VALUE }
}

pub fn commitment_probability(value: f64, k: f64) -> f64 {
    value * k
}

pub fn recruitment_probability(value: f64, h: f64) -> f64 {
    value * h
}

pub fn abandonment_probability(value: f64, k: f64) -> f64 {
    k / value
}

pub fn inhibition_probability(value: f64, h: f64) -> f64 {
    h * value
}

/// Random inputs of one opinion update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Draw {
    /// Uniform sample in `[0, 1)`.
    pub p: f64,
    /// Option considered for self-commitment, in `1..=num_options`.
    pub candidate: usize,
}

#[derive(Debug, Clone)]
pub struct OpinionDynamics {
    k: f64,
    h: f64,
    p_dist: Uniform<f64>,
    option_dist: Uniform<usize>,
}

impl OpinionDynamics {
    pub fn new(cfg: &AgentConfig) -> Result<Self, uniform::Error> {
        Ok(Self {
            k: cfg.k,
            h: cfg.h,
            p_dist: Uniform::new(0.0, 1.0)?,
            option_dist: Uniform::new_inclusive(1, cfg.num_options)?,
        })
    }

    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Draw {
        Draw {
            p: self.p_dist.sample(rng),
            candidate: self.option_dist.sample(rng),
        }
    }

    /// Next commitment given the current one, one draw, the neighbours'
    /// commitments in a fixed order, and the option value function.
    ///
    /// Recruitment and cross-inhibition windows start where the
    /// self-commitment (resp. abandonment) window ends; the first neighbour
    /// whose window contains `p` decides.
    pub fn decide<F>(
        &self,
        current: Commitment,
        draw: Draw,
        neighbors: &[Commitment],
        value_of: F,
    ) -> Commitment
    where
        F: Fn(usize) -> f64,
    {
        let p = draw.p;
        match current {
            Commitment::Uncommitted => {
                let p_self = commitment_probability(value_of(draw.candidate), self.k);
                if p < p_self {
                    return Commitment::Committed(draw.candidate);
                }
                for option in neighbors.iter().filter_map(|n| n.option()) {
                    let p_recruit = recruitment_probability(value_of(option), self.h);
                    if p < p_self + p_recruit {
                        return Commitment::Committed(option);
                    }
                }
                Commitment::Uncommitted
            }
            Commitment::Committed(own) => {
                let p_abandon = abandonment_probability(value_of(own), self.k);
                if p < p_abandon {
                    return Commitment::Uncommitted;
                }
                for option in neighbors
                    .iter()
                    .filter_map(|n| n.option())
                    .filter(|&option| option != own)
                {
                    let p_inhibit = inhibition_probability(value_of(option), self.h);
                    if p < p_abandon + p_inhibit {
                        return Commitment::Uncommitted;
                    }
                }
                current
            }
        }
    }
}
