// sbdl-core/src/ports/mod.rs

pub mod broker;
pub mod source;

pub use broker::{BrokerError, BrokerRecord, DeliveryAck, MessageBroker};
pub use source::SourceReader;
