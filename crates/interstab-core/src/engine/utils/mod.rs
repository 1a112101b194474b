//! Helpers shared by the engine tasks and the workflows.

pub mod energetics;
