pub mod engine;
pub mod states;

pub use engine::{evaluate, ApprovalEngine, ApprovalFlow, PercentageFlow, SequentialFlow};
pub use states::{FlowEvent, FlowMode, TransitionOutcome};
