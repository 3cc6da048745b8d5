//! The four-stage voice turn and its building blocks.

pub mod context;
pub mod stage;
pub mod turn;

pub use stage::{Stage, StageError};
pub use turn::{PipelinePorts, Publish, TurnPipeline, no_publish};
