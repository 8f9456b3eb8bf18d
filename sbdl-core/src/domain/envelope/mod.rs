// sbdl-core/src/domain/envelope/mod.rs

pub mod builder;
pub mod cdc;
pub mod contract;
pub mod wire;

pub use builder::{EnvelopeBuilder, EventEntity};
pub use cdc::{ChangeTriplet, FieldValue, Operation, PayloadNode, PayloadObject};
pub use wire::{Envelope, EventHeader, KeyEntry};
