use thiserror::Error;

/// A status change rejected by one of the lifecycle transition tables.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot move {entity} from '{from}' to '{to}'")]
pub struct TransitionError {
    pub entity: &'static str,
    pub from: &'static str,
    pub to: &'static str,
}
