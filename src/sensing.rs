//! Obstacle detection from range readings and obstacle classification.

use crate::state::AgentState;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Readings at or above this distance see nothing.
pub const OBSTACLE_THRESHOLD: f64 = 2.0;
/// Obstacles below this altitude are the floor.
pub const FLOOR_HEIGHT: f64 = 0.05;
/// Obstacles closer than this to a neighbour are that neighbour.
pub const PEER_THRESHOLD: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Front,
    Left,
    Back,
    Right,
    Up,
}

impl Direction {
    pub const ALL: [Direction; 5] = [
        Direction::Front,
        Direction::Left,
        Direction::Back,
        Direction::Right,
        Direction::Up,
    ];

    /// Body-frame unit vector of the sensing direction.
    pub fn unit(self) -> Vector3<f64> {
        match self {
            Direction::Front => Vector3::new(1.0, 0.0, 0.0),
            Direction::Left => Vector3::new(0.0, 1.0, 0.0),
            Direction::Back => Vector3::new(-1.0, 0.0, 0.0),
            Direction::Right => Vector3::new(0.0, -1.0, 0.0),
            Direction::Up => Vector3::new(0.0, 0.0, 1.0),
        }
    }

    fn reading(self, state: &AgentState) -> f64 {
        let ranges = &state.ranges;
        match self {
            Direction::Front => ranges.front,
            Direction::Left => ranges.left,
            Direction::Back => ranges.back,
            Direction::Right => ranges.right,
            Direction::Up => ranges.up,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObstacleKind {
    Unclassified,
    Floor,
    Peer,
    Generic,
}

/// An obstacle seen during the current control cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Obstacle {
    pub world: Vector3<f64>,
    pub relative: Vector3<f64>,
    pub direction: Direction,
    pub kind: ObstacleKind,
}

impl Obstacle {
    pub fn is_generic(&self) -> bool {
        self.kind == ObstacleKind::Generic
    }
}

/// Emit one unclassified obstacle per direction whose reading is below
/// [`OBSTACLE_THRESHOLD`].
pub fn detect_obstacles(state: &AgentState) -> Vec<Obstacle> {
    Direction::ALL
        .into_iter()
        .filter_map(|direction| {
            let reading = direction.reading(state);
            if reading >= OBSTACLE_THRESHOLD {
                return None;
            }
            let relative = reading * direction.unit();
            Some(Obstacle {
                world: state.relative_to_global(&relative),
                relative,
                direction,
                kind: ObstacleKind::Unclassified,
            })
        })
        .collect()
}

/// Tag every obstacle as floor, peer or generic.
///
/// A neighbour matches when `world + initial - position` falls within
/// [`PEER_THRESHOLD`] of the origin, i.e. the obstacle is compared in the
/// neighbour's launch frame. Previous tags are ignored, so classifying twice
/// gives the same result.
pub fn classify_obstacles<'a, I>(obstacles: &mut [Obstacle], neighbors: I)
where
    I: IntoIterator<Item = &'a AgentState>,
    I::IntoIter: Clone,
{
    let neighbors = neighbors.into_iter();
    for obstacle in obstacles.iter_mut() {
        obstacle.kind = if obstacle.world.z < FLOOR_HEIGHT {
            ObstacleKind::Floor
        } else if neighbors.clone().any(|neighbor| {
            let offset = obstacle.world + neighbor.initial_position() - neighbor.position();
            offset.norm() < PEER_THRESHOLD
        }) {
            ObstacleKind::Peer
        } else {
            ObstacleKind::Generic
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RangeReadings;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn state(ranges: RangeReadings) -> AgentState {
        AgentState::at_rest(Vector3::new(0.0, 0.0, 1.0), 0.0, ranges)
    }

    #[test]
    fn clear_readings_detect_nothing() {
        let s = state(RangeReadings::clear(OBSTACLE_THRESHOLD));
        assert!(detect_obstacles(&s).is_empty());
    }

    #[test]
    fn each_close_reading_yields_one_obstacle() {
        let ranges = RangeReadings {
            front: 1.0,
            right: 5.0,
            back: 0.5,
            left: 2.0,
            up: 1.5,
        };
        let obstacles = detect_obstacles(&state(ranges));
        let directions: Vec<_> = obstacles.iter().map(|o| o.direction).collect();
        assert_eq!(
            directions,
            vec![Direction::Front, Direction::Back, Direction::Up]
        );
        assert_relative_eq!(obstacles[0].relative, Vector3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(obstacles[1].world, Vector3::new(-0.5, 0.0, 1.0));
        assert!(obstacles.iter().all(|o| o.kind == ObstacleKind::Unclassified));
    }

    #[test]
    fn obstacle_near_neighbor_is_peer() {
        let me = state(RangeReadings {
            front: 1.0,
            ..RangeReadings::clear(3.0)
        });
        let mut obstacles = detect_obstacles(&me);

        // Neighbour flew from its launch point (0, 0, 0) to (1, 0, 1).
        let mut neighbor = AgentState::at_rest(Vector3::new(1.0, 0.0, 1.0), 0.0, me.ranges);
        neighbor.initial_position = Vector3::zeros();
        let far = AgentState::at_rest(Vector3::new(10.0, 0.0, 1.0), 0.0, me.ranges);

        // Obstacle at (1, 0, 1) maps onto the neighbour's launch origin.
        classify_obstacles(&mut obstacles, [&far, &neighbor]);
        assert_eq!(obstacles[0].kind, ObstacleKind::Peer);
    }

    #[test]
    fn obstacle_without_neighbors_is_generic() {
        let me = state(RangeReadings {
            left: 0.8,
            ..RangeReadings::clear(3.0)
        });
        let mut obstacles = detect_obstacles(&me);
        classify_obstacles(&mut obstacles, [] as [&AgentState; 0]);
        assert_eq!(obstacles[0].kind, ObstacleKind::Generic);
    }

    #[test]
    fn classification_is_idempotent() {
        let me = state(RangeReadings {
            front: 1.0,
            back: 0.3,
            ..RangeReadings::clear(3.0)
        });
        let neighbor = AgentState::at_rest(Vector3::new(1.0, 0.0, 1.0), 0.0, me.ranges);
        let mut obstacles = detect_obstacles(&me);
        classify_obstacles(&mut obstacles, [&neighbor]);
        let first = obstacles.clone();
        classify_obstacles(&mut obstacles, [&neighbor]);
        assert_eq!(first, obstacles);
    }

    proptest! {
        #[test]
        fn low_obstacles_are_floor(
            z in -1.0..FLOOR_HEIGHT,
            nx in -1.0f64..1.0,
            ny in -1.0f64..1.0,
        ) {
            let mut obstacles = vec![Obstacle {
                world: Vector3::new(nx, ny, z),
                relative: Vector3::new(0.0, 0.0, -1.0),
                direction: Direction::Up,
                kind: ObstacleKind::Unclassified,
            }];
            // Neighbour sitting exactly on the obstacle, launched from the origin.
            let mut neighbor = AgentState::at_rest(
                Vector3::new(nx, ny, z),
                0.0,
                RangeReadings::clear(3.0),
            );
            neighbor.initial_position = Vector3::zeros();
            classify_obstacles(&mut obstacles, [&neighbor]);
            prop_assert_eq!(obstacles[0].kind, ObstacleKind::Floor);
        }

        #[test]
        fn detection_matches_readings(front in 0.0..4.0f64, up in 0.0..4.0f64) {
            let s = state(RangeReadings { front, up, ..RangeReadings::clear(3.0) });
            let obstacles = detect_obstacles(&s);
            let expected = [front, up].iter().filter(|&&r| r < OBSTACLE_THRESHOLD).count();
            prop_assert_eq!(obstacles.len(), expected);
            for o in &obstacles {
                let reading = if o.direction == Direction::Front { front } else { up };
                prop_assert!((o.relative.norm() - reading).abs() < 1e-12);
            }
        }
    }
}
