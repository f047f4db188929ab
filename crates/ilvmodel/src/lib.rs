pub mod config;
pub mod error;
pub mod model;
pub mod node;
pub mod operation;
pub mod session;
pub mod tree;

pub use config::{ModelConfig, TreeRetention};
pub use error::ModelError;
pub use model::ProgramModel;
pub use node::{NodeId, OperationType, TreeNode};
pub use operation::{Candidate, NextOperation, Schedulable};
pub use session::IterationSession;
pub use tree::{Completion, EventTree};
