//! Per-turn accumulator and state machine.

pub mod machine;
pub mod state;
