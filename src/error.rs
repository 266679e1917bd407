use thiserror::Error;

/// Precondition failures on the state and decision feeds.
///
/// Either one aborts the control cycle of the affected agent; no command is
/// emitted for it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("agent {0} is missing from the state feed")]
    MissingAgent(String),

    #[error("neighbour {0} is missing from the decision feed")]
    MissingCommitment(String),
}
