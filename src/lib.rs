//! Decentralized flocking controller for multi-robot swarms.
//!
//! Every control cycle each agent turns its range readings into classified
//! obstacles, optionally updates its heading opinion from its neighbours'
//! commitments, combines interaction, avoidance and migration forces, and
//! reduces them to a bounded velocity command.

pub mod agent;
pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod forces;
pub mod manager;
pub mod opinion;
pub mod sensing;
pub mod state;
pub mod stats;
pub mod velocity;

pub use agent::{Agent, AgentReport, SwarmView};
pub use config::Config;
pub use engine::{CycleRecord, Swarm};
pub use error::FeedError;
pub use opinion::Commitment;
pub use state::{AgentState, RangeReadings, Snapshot};
