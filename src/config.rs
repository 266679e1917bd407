use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Swarm controller configuration.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub dimensions: DimensionsConfig,
    pub gains: GainsConfig,
    pub velocities: VelocitiesConfig,
    pub bounds: BoundsConfig,
    pub agent: AgentConfig,
    pub mission: MissionConfig,
}

/// Spatial scales of the interaction model.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DimensionsConfig {
    /// Equilibrium inter-agent distance.
    pub d_eq: f64,
    /// Sensing radius for neighbours.
    pub radius: f64,
    /// Maximum number of neighbours taken into account.
    pub max_vis_objs: usize,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GainsConfig {
    /// Inter-agent spacing gain.
    pub k_r: f64,
    /// Obstacle avoidance gain.
    pub k_o: f64,
    /// Migration gain.
    pub k_m: f64,
    /// Velocity alignment gain.
    pub k_al: f64,
    /// Linear velocity gain.
    pub k_l: f64,
    /// Angular velocity gain.
    pub k_a: f64,
}

/// Nominal velocity envelope of the vehicle.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VelocitiesConfig {
    pub v_min: f64,
    pub v_max: f64,
    pub omega_min: f64,
    pub omega_max: f64,
    pub a_max: f64,
}

/// Clipping bounds applied to forces and commands.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoundsConfig {
    pub force_max: f64,
    pub v_min: f64,
    pub v_max: f64,
    pub omega_min: f64,
    pub omega_max: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Number of equally spaced heading options.
    pub num_options: usize,
    /// Commitment rate.
    pub k: f64,
    /// Cross-inhibition (recruitment) rate.
    pub h: f64,
    /// Whether the agent takes part in the opinion dynamics.
    pub is_influenced: bool,
    /// Omnidirectional steering if set, heading-constrained otherwise.
    pub is_omnidirectional: bool,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MissionConfig {
    /// Target point in the horizontal plane.
    pub target: [f64; 2],
    /// Control cycles between two opinion updates.
    pub decision_cycle: usize,
    /// Magnitude of the migration vector of a committed agent.
    pub migration_speed: f64,
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed,
    /// or if any parameter is missing, non-finite or out of range.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a [`Config`] from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.dimensions.validate().context("invalid dimensions")?;
        self.gains.validate().context("invalid gains")?;
        self.velocities.validate().context("invalid velocities")?;
        self.bounds.validate(&self.velocities).context("invalid bounds")?;
        self.agent.validate().context("invalid agent parameters")?;
        self.mission.validate().context("invalid mission parameters")?;
        Ok(())
    }
}

impl DimensionsConfig {
    fn validate(&self) -> Result<()> {
        check_num(self.d_eq, 0.0..1e3).context("invalid equilibrium distance")?;
        check_num(self.radius, 0.0..1e3).context("invalid sensing radius")?;
        check_num(self.max_vis_objs, 1..1_000).context("invalid number of visible objects")?;
        Ok(())
    }
}

impl GainsConfig {
    fn validate(&self) -> Result<()> {
        let gains = [
            ("k_r", self.k_r),
            ("k_o", self.k_o),
            ("k_m", self.k_m),
            ("k_al", self.k_al),
            ("k_l", self.k_l),
            ("k_a", self.k_a),
        ];
        for (name, gain) in gains {
            check_num(gain, 0.0..1e6).with_context(|| format!("invalid gain {name}"))?;
        }
        Ok(())
    }
}

impl VelocitiesConfig {
    fn validate(&self) -> Result<()> {
        check_num(self.v_max, 0.0..1e3).context("invalid maximum linear velocity")?;
        check_num(self.v_min, -self.v_max..=self.v_max)
            .context("invalid minimum linear velocity")?;
        check_num(self.omega_max, 0.0..1e3).context("invalid maximum angular velocity")?;
        check_num(self.omega_min, -self.omega_max..=self.omega_max)
            .context("invalid minimum angular velocity")?;
        check_num(self.a_max, 0.0..1e3).context("invalid maximum acceleration")?;
        if self.a_max == 0.0 {
            bail!("maximum acceleration must be positive");
        }
        Ok(())
    }
}

impl BoundsConfig {
    fn validate(&self, envelope: &VelocitiesConfig) -> Result<()> {
        check_num(self.force_max, 0.0..1e6).context("invalid maximum force")?;
        check_num(self.v_max, 0.0..=envelope.v_max).context("invalid maximum linear velocity")?;
        check_num(self.v_min, envelope.v_min..=self.v_max)
            .context("invalid minimum linear velocity")?;
        check_num(self.omega_max, 0.0..=envelope.omega_max)
            .context("invalid maximum angular velocity")?;
        check_num(self.omega_min, envelope.omega_min..=self.omega_max)
            .context("invalid minimum angular velocity")?;
        Ok(())
    }
}

impl AgentConfig {
    fn validate(&self) -> Result<()> {
        check_num(self.num_options, 1..1_000).context("invalid number of options")?;
        check_num(self.k, 0.0..1e3).context("invalid commitment rate")?;
        check_num(self.h, 0.0..1e3).context("invalid cross-inhibition rate")?;
        Ok(())
    }
}

impl MissionConfig {
    fn validate(&self) -> Result<()> {
        for (axis, coord) in ["x", "y"].into_iter().zip(self.target) {
            check_num(coord, -1e6..1e6).with_context(|| format!("invalid target {axis}"))?;
        }
        check_num(self.decision_cycle, 1..100_000).context("invalid decision cycle")?;
        check_num(self.migration_speed, 0.0..1e3).context("invalid migration speed")?;
        Ok(())
    }
}

/// Check that `num` lies in `range`.
///
/// NaN is never contained in a range, so non-finite floats are rejected
/// whenever the range is bounded.
pub fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const CONFIG_TOML: &str = r#"
[dimensions]
d_eq = 1.0
radius = 3.0
max_vis_objs = 6

[gains]
k_r = 1.0
k_o = 1.0
k_m = 1.0
k_al = 0.5
k_l = 1.0
k_a = 1.0

[velocities]
v_min = -0.5
v_max = 0.5
omega_min = -1.0
omega_max = 1.0
a_max = 1.0

[bounds]
force_max = 2.0
v_min = 0.0
v_max = 0.5
omega_min = -1.0
omega_max = 1.0

[agent]
num_options = 4
k = 0.1
h = 0.2
is_influenced = true
is_omnidirectional = true

[mission]
target = [5.0, 0.0]
decision_cycle = 10
migration_speed = 1.0
"#;

    pub(crate) fn test_config() -> Config {
        Config::from_toml(CONFIG_TOML).expect("test config must be valid")
    }

    #[test]
    fn parses_all_groups() {
        let cfg = test_config();
        assert_eq!(cfg.dimensions.max_vis_objs, 6);
        assert_eq!(cfg.agent.num_options, 4);
        assert_eq!(cfg.mission.decision_cycle, 10);
        assert!(cfg.agent.is_omnidirectional);
    }

    #[test]
    fn missing_parameter_fails() {
        let toml = CONFIG_TOML.replace("k_o = 1.0\n", "");
        let err = Config::from_toml(&toml).unwrap_err();
        assert!(format!("{err:#}").contains("k_o"), "{err:#}");
    }

    #[test]
    fn non_finite_parameter_fails() {
        let toml = CONFIG_TOML.replace("k_m = 1.0", "k_m = nan");
        assert!(Config::from_toml(&toml).is_err());

        let toml = CONFIG_TOML.replace("force_max = 2.0", "force_max = inf");
        assert!(Config::from_toml(&toml).is_err());
    }

    #[test]
    fn unknown_parameter_fails() {
        let toml = CONFIG_TOML.replace("k_a = 1.0", "k_a = 1.0\nk_x = 3.0");
        assert!(Config::from_toml(&toml).is_err());
    }

    #[test]
    fn bounds_must_stay_inside_envelope() {
        let toml = CONFIG_TOML.replace(
            "force_max = 2.0\nv_min = 0.0\nv_max = 0.5",
            "force_max = 2.0\nv_min = 0.0\nv_max = 0.8",
        );
        let err = Config::from_toml(&toml).unwrap_err();
        assert!(format!("{err:#}").contains("invalid bounds"), "{err:#}");
    }

    #[test]
    fn zero_options_fails() {
        let toml = CONFIG_TOML.replace("num_options = 4", "num_options = 0");
        assert!(Config::from_toml(&toml).is_err());
    }

    #[test]
    fn check_num_reports_range() {
        assert!(check_num(0.5, 0.0..1.0).is_ok());
        let err = check_num(2.0, 0.0..1.0).unwrap_err();
        assert!(err.to_string().contains("0.0..1.0"));
        assert!(check_num(f64::NAN, 0.0..1.0).is_err());
    }
}
