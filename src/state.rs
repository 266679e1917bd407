//! Agent kinematic state and the per-cycle state feed.

use anyhow::{Context, Result, bail};
use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, fs, path::Path};

/// Body-frame range readings of the multiranger deck.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RangeReadings {
    pub front: f64,
    pub right: f64,
    pub back: f64,
    pub left: f64,
    pub up: f64,
}

impl RangeReadings {
    /// Readings that see nothing in any direction.
    pub fn clear(range: f64) -> Self {
        Self {
            front: range,
            right: range,
            back: range,
            left: range,
            up: range,
        }
    }
}

/// Snapshot of one agent, read-only within a control cycle.
///
/// Orientation is `(roll, pitch, yaw)` in radians.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentState {
    pub position: Vector3<f64>,
    pub orientation: Vector3<f64>,
    pub linear_velocity: Vector3<f64>,
    pub angular_velocity: Vector3<f64>,
    pub ranges: RangeReadings,
    pub initial_position: Vector3<f64>,
}

impl AgentState {
    /// Agent at rest at `position`, level, launched from `position`.
    pub fn at_rest(position: Vector3<f64>, yaw: f64, ranges: RangeReadings) -> Self {
        Self {
            position,
            orientation: Vector3::new(0.0, 0.0, yaw),
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            ranges,
            initial_position: position,
        }
    }

    pub fn position(&self) -> Vector3<f64> {
        self.position
    }

    pub fn initial_position(&self) -> Vector3<f64> {
        self.initial_position
    }

    pub fn yaw(&self) -> f64 {
        self.orientation.z
    }

    /// Body-to-world rotation `R_yaw * R_pitch * R_roll`.
    pub fn rotation(&self) -> Rotation3<f64> {
        let o = &self.orientation;
        Rotation3::from_euler_angles(o.x, o.y, o.z)
    }

    /// World position of a body-frame offset.
    pub fn relative_to_global(&self, rel: &Vector3<f64>) -> Vector3<f64> {
        self.position + self.rotation() * rel
    }

    /// Horizontal unit vector along the current heading.
    pub fn heading(&self) -> Vector3<f64> {
        let (sin_yaw, cos_yaw) = self.yaw().sin_cos();
        Vector3::new(cos_yaw, sin_yaw, 0.0)
    }

    fn validate(&self) -> Result<()> {
        let vectors = [
            ("position", &self.position),
            ("orientation", &self.orientation),
            ("linear velocity", &self.linear_velocity),
            ("angular velocity", &self.angular_velocity),
            ("initial position", &self.initial_position),
        ];
        for (name, vec) in vectors {
            if vec.iter().any(|ele| !ele.is_finite()) {
                bail!("{name} must be finite, but is {vec:?}");
            }
        }
        let r = &self.ranges;
        for reading in [r.front, r.right, r.back, r.left, r.up] {
            if !(reading.is_finite() && reading >= 0.0) {
                bail!("range readings must be finite and non-negative, but are {r:?}");
            }
        }
        Ok(())
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (p, o, v, r) = (
            &self.position,
            &self.orientation,
            &self.linear_velocity,
            &self.ranges,
        );
        write!(
            f,
            "pos ({:.2}, {:.2}, {:.2}) rpy ({:.2}, {:.2}, {:.2}) vel ({:.2}, {:.2}, {:.2}) \
             ranges [f {:.2} r {:.2} b {:.2} l {:.2} u {:.2}]",
            p.x, p.y, p.z, o.x, o.y, o.z, v.x, v.y, v.z, r.front, r.right, r.back, r.left, r.up
        )
    }
}

/// Latest known state of every agent for one control cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Snapshot {
    pub agents: BTreeMap<String, AgentState>,
}

impl Snapshot {
    /// Load a [`Snapshot`] from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if any agent
    /// state holds non-finite values or negative range readings.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        let snapshot: Snapshot =
            toml::from_str(&contents).context("failed to deserialize snapshot")?;

        for (name, state) in &snapshot.agents {
            state
                .validate()
                .with_context(|| format!("invalid state of agent {name}"))?;
        }

        Ok(snapshot)
    }
}
