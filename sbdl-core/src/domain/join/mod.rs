// sbdl-core/src/domain/join/mod.rs

mod address;
pub mod engine;

pub use engine::{ContractAggregates, JoinAggregateEngine, PreparedPartition};
