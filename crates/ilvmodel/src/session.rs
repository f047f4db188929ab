use interleave_trace::{ActorId, BugTrace};

use crate::config::ModelConfig;
use crate::error::ModelError;
use crate::model::ProgramModel;

/// Recording state of one test iteration: the bug trace plus the program
/// model. Owned by the search driver and reused across iterations.
#[derive(Debug)]
pub struct IterationSession {
    trace: BugTrace,
    model: ProgramModel,
    iteration: u64,
}

impl IterationSession {
    pub fn new(config: ModelConfig) -> Self {
        IterationSession {
            trace: BugTrace::new(),
            model: ProgramModel::with_config(config),
            iteration: 0,
        }
    }

    /// Prepare for the next iteration and return its number (starting at 1).
    ///
    /// The trace is always cleared; the tree follows the configured retention.
    pub fn begin_iteration(&mut self) -> u64 {
        if self.iteration > 0 {
            self.model.reset();
        }
        self.trace.clear();
        self.iteration += 1;
        tracing::debug!(iteration = self.iteration, "iteration started");
        self.iteration
    }

    /// Hand over the iteration's trace, e.g. to persist it as a counterexample.
    pub fn finish_iteration(&mut self) -> BugTrace {
        tracing::debug!(
            iteration = self.iteration,
            steps = self.trace.len(),
            nodes = self.model.tree().len(),
            "iteration finished"
        );
        std::mem::take(&mut self.trace)
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn trace(&self) -> &BugTrace {
        &self.trace
    }

    pub fn trace_mut(&mut self) -> &mut BugTrace {
        &mut self.trace
    }

    pub fn model(&self) -> &ProgramModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut ProgramModel {
        &mut self.model
    }

    /// Record a boolean choice made by the running handler in both the trace
    /// and the tree node in progress.
    pub fn record_boolean_choice(
        &mut self,
        actor: &ActorId,
        state: &str,
        choice: bool,
    ) -> Result<(), ModelError> {
        self.model.record_boolean_choice(choice)?;
        self.trace.add_random_bool_choice_step(actor, state, choice);
        Ok(())
    }

    pub fn record_integer_choice(
        &mut self,
        actor: &ActorId,
        state: &str,
        choice: i64,
    ) -> Result<(), ModelError> {
        self.model.record_integer_choice(choice)?;
        self.trace.add_random_int_choice_step(actor, state, choice);
        Ok(())
    }

    /// Back-patch the state the actor's latest dequeue handler ended in.
    pub fn complete_dequeue(&mut self, actor: &ActorId, state: &str) -> Result<(), ModelError> {
        self.trace.replace_dequeued_actor_state_info(actor, state)?;
        Ok(())
    }
}
