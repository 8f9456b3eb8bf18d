// sbdl/src/commands/mod.rs

pub mod clean;
pub mod preview;
pub mod run;
