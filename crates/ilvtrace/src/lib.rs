pub mod error;
pub mod replay;
pub mod step;
#[cfg(test)]
mod tests;
pub mod trace;

pub use error::TraceError;
pub use replay::{ChoiceReplayer, ReplayEngine, ReplayResult};
pub use step::{ActorId, Choice, EventSnapshot, StepKind, StepRecord};
pub use trace::{BugTrace, TRACE_FORMAT_VERSION};
