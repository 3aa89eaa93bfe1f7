use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Session {session_id} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        session_id: String,
        from: String,
        to: String,
    },

    #[error("Phase {0} was already recorded for this session")]
    DuplicatePhase(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
