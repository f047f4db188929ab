use thiserror::Error;

use crate::step::ActorId;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("bug trace is empty")]
    EmptyTrace,

    #[error("no dequeue step recorded for actor {actor}")]
    MissingDequeue { actor: ActorId },

    #[error("unsupported trace version {found}: max supported is {max}")]
    UnsupportedVersion { found: u32, max: u32 },

    #[error("replay diverged at step {index}: {reason}")]
    ReplayDiverged { index: usize, reason: String },

    #[error("replay exhausted: no recorded choice left for actor {actor}")]
    ReplayExhausted { actor: ActorId },

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}
